use crate::clients::gemini::{GeminiClient, GeminiConfig};
use crate::clients::mock::{MockClient, MockHandle};
use crate::config::CredentialStore;
use crate::core::LowLevelClient;
use crate::error::AIError;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Backend selection for the question generator. Gemini unless the mock is
/// asked for by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientType {
    #[default]
    Gemini,
    Mock,
}

impl FromStr for ClientType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown client type: '{}'. Supported: gemini, mock", s)),
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientType::Gemini => write!(f, "Gemini"),
            ClientType::Mock => write!(f, "Mock"),
        }
    }
}

/// Client wrapper whose backend is chosen at startup.
#[derive(Debug, Clone)]
pub struct FlexibleClient {
    inner: Box<dyn LowLevelClient>,
}

impl FlexibleClient {
    pub fn new(client: Box<dyn LowLevelClient>) -> Self {
        Self { inner: client }
    }

    pub fn gemini(config: GeminiConfig, credentials: CredentialStore) -> Self {
        Self::new(Box::new(GeminiClient::new(config, credentials)))
    }

    /// Demo mock answering with sample questions, plus its handle.
    pub fn mock() -> (Self, Arc<MockHandle>) {
        let (client, handle) = MockClient::demo();
        (Self::new(Box::new(client)), handle)
    }

    pub fn from_type(client_type: ClientType, config: GeminiConfig, credentials: CredentialStore) -> Self {
        info!(client = %client_type, "Selecting generation backend");
        match client_type {
            ClientType::Gemini => Self::gemini(config, credentials),
            ClientType::Mock => Self::mock().0,
        }
    }
}

#[async_trait]
impl LowLevelClient for FlexibleClient {
    async fn ask_raw(&self, prompt: String) -> Result<String, AIError> {
        self.inner.ask_raw(prompt).await
    }

    fn clone_box(&self) -> Box<dyn LowLevelClient> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::mock::SAMPLE_BATCH;
    use crate::error::GeminiError;
    use crate::storage::MemoryStore;

    #[test]
    fn parses_client_names() {
        assert_eq!("GEMINI".parse::<ClientType>().unwrap(), ClientType::Gemini);
        assert_eq!("mock".parse::<ClientType>().unwrap(), ClientType::Mock);
        assert!("offline".parse::<ClientType>().is_err());
        assert_eq!(ClientType::default(), ClientType::Gemini);
    }

    #[tokio::test]
    async fn gemini_backend_without_key_reports_missing_credential() {
        let credentials = CredentialStore::new(Arc::new(MemoryStore::new()), None);
        let client = FlexibleClient::from_type(ClientType::Gemini, GeminiConfig::default(), credentials);
        let err = client.ask_raw("p".to_string()).await.unwrap_err();
        assert!(matches!(err, AIError::Gemini(GeminiError::MissingCredential)));
    }

    #[tokio::test]
    async fn mock_backend_answers_with_samples() {
        let credentials = CredentialStore::new(Arc::new(MemoryStore::new()), None);
        let client = FlexibleClient::from_type(ClientType::Mock, GeminiConfig::default(), credentials);
        assert_eq!(client.ask_raw("p".to_string()).await.unwrap(), SAMPLE_BATCH);
    }
}
