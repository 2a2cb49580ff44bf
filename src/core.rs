//! Low-level model client abstraction and prompt helpers shared by all clients.

use crate::error::AIError;
use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use std::fmt::Debug;

/// Low-level model client abstraction.
///
/// Implementors provide `ask_raw`, which executes a prompt and returns the raw
/// model text. Parsing and normalization happen in the question generator.
#[async_trait]
pub trait LowLevelClient: Send + Sync + Debug {
    /// The only method that implementations must provide
    async fn ask_raw(&self, prompt: String) -> Result<String, AIError>;

    /// Clone this client into a boxed trait object
    fn clone_box(&self) -> Box<dyn LowLevelClient>;
}

impl Clone for Box<dyn LowLevelClient> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[async_trait]
impl LowLevelClient for Box<dyn LowLevelClient> {
    async fn ask_raw(&self, prompt: String) -> Result<String, AIError> {
        self.as_ref().ask_raw(prompt).await
    }

    fn clone_box(&self) -> Box<dyn LowLevelClient> {
        self.as_ref().clone_box()
    }
}

/// Append JSON schema guidance for `Vec<T>` to a prompt.
pub fn add_schema_guidance<T>(prompt: String) -> String
where
    T: JsonSchema,
{
    let schema = schema_for!(Vec<T>);
    let schema_json = serde_json::to_string_pretty(&schema)
        .unwrap_or_else(|_| "Schema serialization failed".to_string());

    format!(
        "{}\n\n## Formato da resposta\nResponda SOMENTE com um array JSON válido neste schema:\n```json\n{}\n```",
        prompt, schema_json
    )
}

/// JSON Schema for a reply holding `Vec<T>`, for backends with structured output.
pub fn response_schema<T>() -> serde_json::Value
where
    T: JsonSchema,
{
    serde_json::to_value(schema_for!(Vec<T>)).unwrap_or_default()
}
