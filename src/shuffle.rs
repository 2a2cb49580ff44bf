//! Answer shuffling and positional-leak sanitizing.
//!
//! Generated records always put the correct answer first. Before a question is
//! shown its options are permuted uniformly, the correct index is recomputed,
//! distractor explanations are realigned to their new positions, and any
//! explanation text that names a fixed letter ("Gabarito: letra A") is removed.

use crate::error::DataShapeError;
use crate::question::{option_letter, Question, RawQuestion, OPTION_COUNT};
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Explanation used when the model did not explain a distractor.
pub const MISSING_EXPLANATION: &str = "Incorrect.";

/// Phrases that introduce a letter, per language. Each is followed by an
/// optional "letra"/"letter" and the letter itself.
const LEAD_INS: &[(&str, &[&str])] = &[
    (
        "letra",
        &[
            r"a alternativa correta é a\s+",
            r"o gabarito é a\s+",
            r"gabarito:\s*",
            r"a resposta (?:certa|correta) é a\s+",
        ],
    ),
    (
        "letter",
        &[
            r"the correct (?:alternative|answer|option) is\s+",
            r"the answer key is\s+",
            r"answer key:\s*",
        ],
    ),
];

/// Case-insensitive patterns, letters included.
fn build_patterns() -> Vec<String> {
    let mut patterns = Vec::new();
    for (word, lead_ins) in LEAD_INS {
        for lead_in in *lead_ins {
            patterns.push(format!(r"(?i){lead_in}(?:{word}\s?)?[a-e]\b\.?"));
        }
        patterns.push(format!(r"(?im)^{word}\s[a-e]\."));
        patterns.push(format!(r"(?i)\({word}\s[a-e]\)"));
    }
    patterns
}

fn positional_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        build_patterns()
            .iter()
            .map(|p| Regex::new(p).expect("positional pattern must compile"))
            .collect()
    })
}

fn repeated_spaces() -> &'static Regex {
    static SPACES: OnceLock<Regex> = OnceLock::new();
    SPACES.get_or_init(|| Regex::new(r"[ \t]{2,}").expect("space pattern must compile"))
}

/// Strip phrases that point at a fixed alternative, then trim and capitalize.
pub fn sanitize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut cleaned = text.to_string();
    let mut stripped = false;
    for pattern in positional_patterns() {
        if pattern.is_match(&cleaned) {
            cleaned = pattern.replace_all(&cleaned, "").into_owned();
            stripped = true;
        }
    }
    if stripped {
        cleaned = repeated_spaces().replace_all(&cleaned, " ").into_owned();
    }

    capitalize_first(cleaned.trim())
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Check the distractor/option alignment of a raw record.
pub fn check_shape(raw: &RawQuestion) -> Result<(), DataShapeError> {
    if raw.options.len() != OPTION_COUNT {
        return Err(DataShapeError::OptionCount(raw.options.len()));
    }
    let expected = raw.options.len() - 1;
    if raw.distractor_analysis.len() != expected {
        return Err(DataShapeError::DistractorCountMismatch {
            options: raw.options.len(),
            got: raw.distractor_analysis.len(),
        });
    }
    Ok(())
}

#[derive(Debug)]
struct OptionRecord {
    text: String,
    is_correct: bool,
    explanation: String,
}

/// Shuffle with the thread-local generator.
pub fn shuffle_question(raw: RawQuestion) -> Result<Question, DataShapeError> {
    shuffle_question_with(raw, &mut rand::thread_rng())
}

/// Permute the options of `raw` and realign its explanations.
///
/// Only a record without exactly four options is rejected; a short or long
/// `distractor_analysis` degrades to [`MISSING_EXPLANATION`] per entry.
pub fn shuffle_question_with<R: Rng + ?Sized>(
    raw: RawQuestion,
    rng: &mut R,
) -> Result<Question, DataShapeError> {
    match check_shape(&raw) {
        Err(e @ DataShapeError::OptionCount(_)) => return Err(e),
        Err(mismatch) => warn!(error = %mismatch, "Degrading malformed distractor analysis"),
        Ok(()) => {}
    }

    if raw.correct_answer_index != 0 {
        debug!(index = raw.correct_answer_index, "Ignoring non-zero correctAnswerIndex; first option is correct");
    }

    let RawQuestion {
        question,
        options,
        correct_explanation,
        distractor_analysis,
        concept_explanation,
        legal_basis,
        study_tip,
        topic_ref,
        difficulty,
        ..
    } = raw;

    let mut records: Vec<OptionRecord> = options
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            if i == 0 {
                return OptionRecord { text, is_correct: true, explanation: String::new() };
            }
            let explanation = distractor_analysis
                .get(i - 1)
                .map(|e| sanitize_text(e))
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| MISSING_EXPLANATION.to_string());
            OptionRecord { text, is_correct: false, explanation }
        })
        .collect();

    records.shuffle(rng);

    let correct_option_index = records.iter().position(|r| r.is_correct).unwrap_or(0);
    let distractor_explanations = records
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.is_correct)
        .map(|(pos, r)| format!("Alternative {}: {}", option_letter(pos), r.explanation))
        .collect();

    Ok(Question {
        text: question,
        options: records.into_iter().map(|r| r.text).collect(),
        correct_option_index,
        correct_explanation: sanitize_text(&correct_explanation),
        distractor_explanations,
        concept_explanation: sanitize_text(&concept_explanation),
        legal_basis,
        study_tip,
        topic_ref: topic_ref.unwrap_or_default(),
        difficulty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::DifficultyLevel;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn raw() -> RawQuestion {
        RawQuestion {
            question: "Qual frase segue a norma-padrão?".to_string(),
            options: vec![
                "Todos assistiram ao filme.".to_string(),
                "O aluno obedeceu o regulamento.".to_string(),
                "Eu namoro com a Maria.".to_string(),
                "Chegamos no aeroporto.".to_string(),
            ],
            correct_answer_index: 0,
            correct_explanation: "A alternativa correta é a letra A. Assistir exige a preposição.".to_string(),
            distractor_analysis: vec![
                "Obedecer exige preposição.".to_string(),
                "Namorar é transitivo direto.".to_string(),
                "Chegar exige a preposição a.".to_string(),
            ],
            concept_explanation: "regência verbal (Letra A) trata da relação entre verbo e complemento.".to_string(),
            legal_basis: "Gramática normativa".to_string(),
            study_tip: "Revise verbos de regência dupla.".to_string(),
            topic_ref: None,
            difficulty: DifficultyLevel::Intermediate,
        }
    }

    #[test]
    fn strips_english_positional_phrases() {
        assert_eq!(
            sanitize_text("The correct alternative is letter B. The verb needs a preposition."),
            "The verb needs a preposition."
        );
        assert_eq!(sanitize_text("Answer key: Letter A"), "");
        assert_eq!(sanitize_text("(Letter C) only this one agrees."), "Only this one agrees.");
        assert_eq!(sanitize_text("it agrees with the subject (Letter C)"), "It agrees with the subject");
        assert_eq!(sanitize_text("The correct alternative is letter b. Rest."), "Rest.");
        assert_eq!(sanitize_text("answer key: c"), "");
        assert_eq!(sanitize_text("(letter d) the verb agrees."), "The verb agrees.");
    }

    #[test]
    fn strips_portuguese_positional_phrases() {
        assert_eq!(sanitize_text("O gabarito é a letra D. Crase antes de palavra feminina."), "Crase antes de palavra feminina.");
        assert_eq!(sanitize_text("Gabarito: Letra B"), "");
        assert_eq!(sanitize_text("Letra C. Vírgula separa o aposto."), "Vírgula separa o aposto.");
        assert_eq!(sanitize_text("A resposta certa é a E."), "");
        assert_eq!(sanitize_text("Gabarito: letra c"), "");
        assert_eq!(sanitize_text("A alternativa correta é a letra b. Crase."), "Crase.");
        assert_eq!(sanitize_text("(Letra d) texto"), "Texto");
        assert_eq!(sanitize_text("letra a. Sujeito composto."), "Sujeito composto.");
    }

    #[test]
    fn leaves_clean_text_unchanged() {
        let text = "The answer is a noun phrase acting as subject.";
        assert_eq!(sanitize_text(text), text);
        assert_eq!(sanitize_text("A alternativa correta é a que respeita a regência."), "A alternativa correta é a que respeita a regência.");
        assert_eq!(sanitize_text(""), "");
    }

    #[test]
    fn correct_index_tracks_original_first_option() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let original = raw();
            let correct_text = original.options[0].clone();
            let q = shuffle_question_with(original, &mut rng).unwrap();
            assert_eq!(q.options[q.correct_option_index], correct_text);
            assert_eq!(q.distractor_explanations.len(), q.options.len() - 1);
        }
    }

    #[test]
    fn labels_follow_ascending_distractor_positions() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let q = shuffle_question_with(raw(), &mut rng).unwrap();
            let expected: Vec<String> = (0..q.options.len())
                .filter(|i| *i != q.correct_option_index)
                .map(|i| format!("Alternative {}: ", option_letter(i)))
                .collect();
            for (entry, prefix) in q.distractor_explanations.iter().zip(&expected) {
                assert!(entry.starts_with(prefix), "{entry} should start with {prefix}");
            }
        }
    }

    #[test]
    fn explanations_follow_their_options() {
        let mut rng = StdRng::seed_from_u64(3);
        let q = shuffle_question_with(raw(), &mut rng).unwrap();
        let pairs = [
            ("O aluno obedeceu o regulamento.", "Obedecer exige preposição."),
            ("Eu namoro com a Maria.", "Namorar é transitivo direto."),
            ("Chegamos no aeroporto.", "Chegar exige a preposição a."),
        ];
        for (option, explanation) in pairs {
            let pos = q.options.iter().position(|o| o == option).unwrap();
            let label = format!("Alternative {}: {}", option_letter(pos), explanation);
            assert!(q.distractor_explanations.contains(&label), "missing {label}");
        }
    }

    #[test]
    fn permutation_is_uniform() {
        let mut rng = StdRng::seed_from_u64(2024);
        let mut counts: HashMap<Vec<String>, usize> = HashMap::new();
        let trials = 24_000;
        for _ in 0..trials {
            let q = shuffle_question_with(raw(), &mut rng).unwrap();
            *counts.entry(q.options).or_default() += 1;
        }
        assert_eq!(counts.len(), 24);
        for count in counts.values() {
            assert!((750..=1250).contains(count), "skewed permutation count {count}");
        }
    }

    #[test]
    fn sanitizes_explanations_during_shuffle() {
        let q = shuffle_question(raw()).unwrap();
        assert_eq!(q.correct_explanation, "Assistir exige a preposição.");
        assert_eq!(q.concept_explanation, "Regência verbal trata da relação entre verbo e complemento.");
        assert!(!q.concept_explanation.contains("Letra A"));
    }

    #[test]
    fn missing_distractor_explanations_degrade() {
        let mut short = raw();
        short.distractor_analysis = vec!["Obedecer exige preposição.".to_string()];
        assert!(matches!(check_shape(&short), Err(DataShapeError::DistractorCountMismatch { options: 4, got: 1 })));
        let q = shuffle_question(short).unwrap();
        assert_eq!(q.distractor_explanations.len(), 3);
        let fallbacks = q
            .distractor_explanations
            .iter()
            .filter(|e| e.ends_with(MISSING_EXPLANATION))
            .count();
        assert_eq!(fallbacks, 2);
    }

    #[test]
    fn positional_only_distractor_falls_back() {
        let mut leaky = raw();
        leaky.distractor_analysis[0] = "Gabarito: letra B".to_string();
        let q = shuffle_question(leaky).unwrap();
        assert!(q.distractor_explanations.iter().any(|e| e.ends_with(MISSING_EXPLANATION)));
    }

    #[test]
    fn rejects_question_without_four_options() {
        let mut empty = raw();
        empty.options.clear();
        assert_eq!(shuffle_question(empty).unwrap_err(), DataShapeError::OptionCount(0));

        let mut five = raw();
        five.options.push("Assisti o filme.".to_string());
        five.distractor_analysis.push("Assistir pede preposição.".to_string());
        assert_eq!(shuffle_question(five).unwrap_err(), DataShapeError::OptionCount(5));
    }

    #[test]
    fn all_patterns_compile() {
        assert_eq!(positional_patterns().len(), 11);
    }
}
