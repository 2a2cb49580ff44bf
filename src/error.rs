use thiserror::Error;

/// Top-level error returned across the UI-facing contract.
#[derive(Error, Debug)]
pub enum QuizError {
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl QuizError {
    /// True when the user can fix the failure by entering a new credential.
    pub fn is_credential(&self) -> bool {
        matches!(self, QuizError::Credential(_))
    }
}

impl From<AIError> for QuizError {
    fn from(err: AIError) -> Self {
        match err {
            AIError::Gemini(GeminiError::Authentication) => {
                QuizError::Credential(CredentialError::Rejected)
            }
            AIError::Gemini(GeminiError::MissingCredential) => {
                QuizError::Credential(CredentialError::Missing)
            }
            other => QuizError::Generation(GenerationError::Ai(other)),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("No API key configured")]
    Missing,
    #[error("API key is too short ({0} characters, need at least 10)")]
    TooShort(usize),
    #[error("API key was rejected by the generation service")]
    Rejected,
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("AI error: {0}")]
    Ai(#[from] AIError),
    #[error("Empty response from generation service")]
    EmptyResponse,
    #[error("JSON deserialization error: {0}. Raw response: {1}")]
    JsonDeserialization(#[source] serde_json::Error, String),
    #[error("Expected {expected} questions, got {got}")]
    TooFewQuestions { expected: usize, got: usize },
}

#[derive(Error, Debug)]
pub enum AIError {
    #[error("Gemini API error: {0}")]
    Gemini(#[from] GeminiError),
    #[error("Mock error: {0}")]
    Mock(String),
}

#[derive(Error, Debug)]
pub enum GeminiError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limit exceeded")]
    RateLimit,
    #[error("Authentication failed")]
    Authentication,
    #[error("No API key available")]
    MissingCredential,
}

/// Malformed per-question data. Recovered locally by the shuffler and only logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataShapeError {
    #[error("{got} distractor explanations for {options} options")]
    DistractorCountMismatch { options: usize, got: usize },
    #[error("expected 4 options, got {0}")]
    OptionCount(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No active session")]
    NoActiveSession,
    #[error("Session is still loading")]
    NotReady,
    #[error("Question index {index} out of range (queue length {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Option {option} out of range ({count} options)")]
    InvalidOption { option: usize, count: usize },
    #[error("Question {0} was already answered")]
    AlreadyAnswered(usize),
    #[error("Session was replaced before its first question arrived")]
    Superseded,
    #[error("Unknown topic: '{0}'")]
    UnknownTopic(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
