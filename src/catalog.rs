//! Static syllabus: topics, per-difficulty question styles and per-topic
//! sub-topic focus lists.

use crate::question::{DifficultyLevel, Topic};

struct TopicEntry {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    icon: &'static str,
    subtopics: &'static [&'static str],
}

const SYLLABUS: &[TopicEntry] = &[
    TopicEntry {
        id: "GEN1",
        name: "Língua Portuguesa",
        description: "Ortografia, Morfologia, Sintaxe, Pontuação, Crase, Concordância, Regência e Interpretação de Texto.",
        icon: "menu_book",
        subtopics: &[
            "Crase",
            "Concordância Verbal",
            "Regência (Assistir/Visar)",
            "Pontuação",
            "Colocação Pronominal",
            "Conjunções",
            "Interpretação",
        ],
    },
    TopicEntry {
        id: "GEN2",
        name: "Raciocínio Lógico e Matemático",
        description: "Lógica Proposicional, Conjuntos, Análise Combinatória, Probabilidade, Regra de Três, Porcentagem e Geometria.",
        icon: "calculate",
        subtopics: &[
            "Lógica Proposicional",
            "Silogismos",
            "Análise Combinatória",
            "Probabilidade",
            "Regra de Três",
            "Conjuntos",
        ],
    },
    TopicEntry {
        id: "GEN3",
        name: "Informática para Concursos",
        description: "Hardware, Windows/Linux, Word/Excel/Calc, Redes, Internet, Segurança da Informação e Nuvem.",
        icon: "computer",
        subtopics: &[
            "Excel (Funções SE/PROCV)",
            "Segurança (Phishing/Ransomware)",
            "Redes (Protocolos)",
            "Windows (Atalhos)",
            "Nuvem",
        ],
    },
    TopicEntry {
        id: "GEN4",
        name: "Direito Constitucional",
        description: "Direitos Fundamentais (Art. 5º), Nacionalidade, Organização do Estado e Administração Pública (Art. 37).",
        icon: "gavel",
        subtopics: &[
            "Art. 5º (Direitos)",
            "Nacionalidade",
            "Art. 37 (Adm Pública)",
            "Competências",
            "Remédios Constitucionais",
        ],
    },
    TopicEntry {
        id: "GEN5",
        name: "Direito Administrativo",
        description: "Princípios, Poderes, Atos Administrativos, Organização Administrativa, Responsabilidade Civil e Licitações.",
        icon: "account_balance",
        subtopics: &[
            "Atos (Elementos/Atributos)",
            "Poderes",
            "Adm Indireta",
            "Responsabilidade Civil",
            "Improbidade",
        ],
    },
    TopicEntry {
        id: "GEN6",
        name: "Atualidades e Conhecimentos Gerais",
        description: "Política, Economia, Sociedade, Cultura, Meio Ambiente e Tecnologia (Brasil e Mundo).",
        icon: "public",
        subtopics: &["Geopolítica", "Meio Ambiente", "Tecnologia/IA", "Sociedade"],
    },
];

const BEGINNER_STYLES: &[&str] = &[
    "DEFINIÇÃO: Pergunte o conceito direto.",
    "ERRO ÓBVIO: Frase com erro gramatical ou lógico claro.",
    "LEI SECA: Texto exato da norma.",
];

const INTERMEDIATE_STYLES: &[&str] = &[
    "CASO PRÁTICO: Aplicação da regra em situação cotidiana.",
    "LACUNAS: Preencher corretamente.",
    "MÚLTIPLA ESCOLHA: Padrão bancas IBFC/Vunesp.",
];

const ADVANCED_STYLES: &[&str] = &[
    "INTERDISCIPLINAR: Misture conceitos.",
    "JURISPRUDÊNCIA: Entendimento sumulado (STF/STJ) ou exceções.",
    "INTERPRETAÇÃO: Texto denso exigindo inferência.",
];

impl From<&TopicEntry> for Topic {
    fn from(entry: &TopicEntry) -> Self {
        Topic {
            id: entry.id.to_string(),
            name: entry.name.to_string(),
            description: entry.description.to_string(),
            icon: entry.icon.to_string(),
        }
    }
}

/// All topics, in display order.
pub fn syllabus() -> Vec<Topic> {
    SYLLABUS.iter().map(Topic::from).collect()
}

/// Look a topic up by id (`GEN1`) or by name, case-insensitively.
pub fn find_topic(key: &str) -> Option<Topic> {
    let key = key.trim();
    SYLLABUS
        .iter()
        .find(|entry| entry.id.eq_ignore_ascii_case(key) || entry.name.to_lowercase() == key.to_lowercase())
        .map(Topic::from)
}

/// Question styles suited to a difficulty level.
pub fn styles_for(difficulty: DifficultyLevel) -> &'static [&'static str] {
    match difficulty {
        DifficultyLevel::Beginner => BEGINNER_STYLES,
        DifficultyLevel::Intermediate => INTERMEDIATE_STYLES,
        DifficultyLevel::Advanced => ADVANCED_STYLES,
    }
}

/// Registered sub-topics for a topic id; empty for unknown topics.
pub fn subtopics_for(topic_id: &str) -> &'static [&'static str] {
    SYLLABUS
        .iter()
        .find(|entry| entry.id == topic_id)
        .map(|entry| entry.subtopics)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syllabus_ids_are_unique() {
        let topics = syllabus();
        let mut ids: Vec<_> = topics.iter().map(|t| t.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), topics.len());
    }

    #[test]
    fn finds_topic_by_id_or_name() {
        assert_eq!(find_topic("gen1").unwrap().name, "Língua Portuguesa");
        assert_eq!(find_topic("língua portuguesa").unwrap().id, "GEN1");
        assert!(find_topic("GEN99").is_none());
    }

    #[test]
    fn every_difficulty_has_styles() {
        for level in DifficultyLevel::ALL {
            assert!(!styles_for(level).is_empty());
        }
    }

    #[test]
    fn unknown_topic_has_no_subtopics() {
        assert!(subtopics_for("XYZ").is_empty());
        assert!(!subtopics_for("GEN4").is_empty());
    }
}
