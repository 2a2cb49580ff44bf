use crate::error::CredentialError;
use crate::scheduler::SchedulerConfig;
use crate::storage::{KeyValueStore, CREDENTIAL_KEY};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Shortest credential accepted from the configuration surface.
pub const MIN_CREDENTIAL_LEN: usize = 10;

/// Trait for types that can retrieve their configuration key from environment variables
pub trait KeyFromEnv {
    /// The environment variable name for this client's API key
    const KEY_NAME: &'static str;

    /// Find the API key by checking environment variables first, then .env file
    fn find_key() -> Option<String> {
        // Missing .env is fine
        let _ = dotenvy::dotenv();

        env::var(Self::KEY_NAME)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

/// Trim and length-check a user-submitted credential.
pub fn validate_credential(key: &str) -> Result<String, CredentialError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(CredentialError::Missing);
    }
    if key.chars().count() < MIN_CREDENTIAL_LEN {
        return Err(CredentialError::TooShort(key.chars().count()));
    }
    Ok(key.to_string())
}

/// Resolves the generation credential: stored value first, configured default second.
///
/// Read at generation time, so a newly saved key applies to the next request.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
    fallback: Option<String>,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("store", &self.store)
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>, fallback: Option<String>) -> Self {
        Self { store, fallback }
    }

    pub fn resolve(&self) -> Option<String> {
        match self.store.get(CREDENTIAL_KEY) {
            Ok(Some(key)) if !key.trim().is_empty() => return Some(key),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to read stored credential; using fallback"),
        }
        self.fallback.clone()
    }

    pub fn require(&self) -> Result<String, CredentialError> {
        self.resolve().ok_or(CredentialError::Missing)
    }

    pub fn has_credential(&self) -> bool {
        self.resolve().is_some()
    }

    /// Validate and persist a credential submitted by the user.
    pub fn save(&self, key: &str) -> Result<(), crate::error::QuizError> {
        let key = validate_credential(key)?;
        self.store.set(CREDENTIAL_KEY, &key)?;
        info!("Stored new API credential");
        Ok(())
    }
}

/// Process-level settings, read from the environment (and `.env`).
#[derive(Clone)]
pub struct AppConfig {
    /// Directory holding the JSON store file
    pub data_dir: PathBuf,
    pub model: String,
    pub scheduler: SchedulerConfig,
    /// Credential used when none was saved through the configuration surface
    pub default_credential: Option<String>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("data_dir", &self.data_dir)
            .field("model", &self.model)
            .field("scheduler", &self.scheduler)
            .field("has_default_credential", &self.default_credential.is_some())
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".concurso-quiz"),
            model: crate::clients::gemini::DEFAULT_MODEL.to_string(),
            scheduler: SchedulerConfig::default(),
            default_credential: None,
        }
    }
}

impl AppConfig {
    /// Read `QUIZ_DATA_DIR`, `GEMINI_MODEL`, `QUIZ_LOOKAHEAD`, `QUIZ_SEED_BATCH`
    /// and the `GEMINI_API_KEY` fallback credential.
    pub fn from_env() -> Self {
        use crate::clients::gemini::GeminiClient;

        let mut config = Self::default();
        let _ = dotenvy::dotenv();

        if let Ok(dir) = env::var("QUIZ_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(model) = env::var("GEMINI_MODEL") {
            if !model.trim().is_empty() {
                config.model = model.trim().to_string();
            }
        }
        if let Some(lookahead) = parse_env_usize("QUIZ_LOOKAHEAD") {
            config.scheduler.lookahead = lookahead;
        }
        if let Some(seed) = parse_env_usize("QUIZ_SEED_BATCH") {
            config.scheduler.seed_batch = seed;
        }
        config.default_credential = GeminiClient::find_key();

        info!(
            data_dir = %config.data_dir.display(),
            model = %config.model,
            lookahead = config.scheduler.lookahead,
            seed_batch = config.scheduler.seed_batch,
            has_default_credential = config.default_credential.is_some(),
            "Loaded configuration"
        );
        config
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }
}

fn parse_env_usize(name: &str) -> Option<usize> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(variable = name, value = %raw, "Ignoring non-numeric setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn rejects_short_and_empty_credentials() {
        assert_eq!(validate_credential("   "), Err(CredentialError::Missing));
        assert_eq!(validate_credential("short"), Err(CredentialError::TooShort(5)));
        assert_eq!(validate_credential("  AIzaSy-long-enough  ").unwrap(), "AIzaSy-long-enough");
    }

    #[test]
    fn stored_credential_wins_over_fallback() {
        let store = Arc::new(MemoryStore::new());
        let creds = CredentialStore::new(store.clone(), Some("fallback-key-123".to_string()));
        assert_eq!(creds.resolve().as_deref(), Some("fallback-key-123"));

        creds.save("stored-key-4567").unwrap();
        assert_eq!(creds.resolve().as_deref(), Some("stored-key-4567"));
    }

    #[test]
    fn missing_everywhere_is_a_credential_error() {
        let creds = CredentialStore::new(Arc::new(MemoryStore::new()), None);
        assert!(!creds.has_credential());
        assert_eq!(creds.require(), Err(CredentialError::Missing));
        assert!(creds.save("tiny").unwrap_err().is_credential());
    }
}
