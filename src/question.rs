//! Quiz data model: topics, difficulty levels, the raw records produced by the
//! generation service and the normalized questions served to the user.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// A syllabus subject. `id` is the key used for mastery lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
}

/// Number of alternatives every question carries.
pub const OPTION_COUNT: usize = 4;

/// Serialized with the Portuguese labels; deserialized through [`FromStr`], so
/// unaccented and English spellings are accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, JsonSchema)]
pub enum DifficultyLevel {
    #[serde(rename = "Iniciante")]
    Beginner,
    #[default]
    #[serde(rename = "Intermediário")]
    Intermediate,
    #[serde(rename = "Avançado")]
    Advanced,
}

impl DifficultyLevel {
    pub const ALL: [DifficultyLevel; 3] = [Self::Beginner, Self::Intermediate, Self::Advanced];

    /// Label used in prompts and on screen.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Beginner => "Iniciante",
            Self::Intermediate => "Intermediário",
            Self::Advanced => "Avançado",
        }
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DifficultyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "iniciante" | "beginner" => Ok(Self::Beginner),
            "intermediário" | "intermediario" | "intermediate" => Ok(Self::Intermediate),
            "avançado" | "avancado" | "advanced" => Ok(Self::Advanced),
            _ => Err(format!(
                "Unknown difficulty: '{}'. Supported: iniciante, intermediario, avancado",
                s
            )),
        }
    }
}

impl<'de> Deserialize<'de> for DifficultyLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        label.parse().map_err(serde::de::Error::custom)
    }
}

/// One record as returned by the generation service.
///
/// Option 0 is always the correct answer and `distractor_analysis[i]`
/// explains `options[i + 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[schemars(title = "Quiz Question", description = "One multiple-choice exam question")]
pub struct RawQuestion {
    /// The question statement
    pub question: String,
    /// Exactly 4 alternatives; the first one is the correct answer
    #[schemars(description = "4 alternatives, the FIRST one is always the correct answer")]
    pub options: Vec<String>,
    /// Always 0
    pub correct_answer_index: usize,
    /// Why the correct alternative satisfies the rule
    pub correct_explanation: String,
    /// Why each incorrect alternative is wrong, in option order
    #[schemars(description = "One explanation per incorrect alternative, in the same order as options[1..]")]
    pub distractor_analysis: Vec<String>,
    /// A complete, didactic explanation of the underlying theory
    pub concept_explanation: String,
    /// Law, article or reference work backing the answer
    pub legal_basis: String,
    /// A short study tip
    pub study_tip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_ref: Option<String>,
    pub difficulty: DifficultyLevel,
}

/// A normalized question: options shuffled, explanations realigned and sanitized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
    pub correct_option_index: usize,
    pub correct_explanation: String,
    /// One entry per incorrect option, ascending by position, labelled `Alternative <Letter>: `.
    pub distractor_explanations: Vec<String>,
    pub concept_explanation: String,
    pub legal_basis: String,
    pub study_tip: String,
    pub topic_ref: String,
    pub difficulty: DifficultyLevel,
}

impl Question {
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_option_index
    }

    pub fn correct_option(&self) -> Option<&str> {
        self.options.get(self.correct_option_index).map(String::as_str)
    }
}

/// Letter label for an option position (0 → 'A').
pub fn option_letter(index: usize) -> char {
    char::from(b'A' + (index % 26) as u8)
}
