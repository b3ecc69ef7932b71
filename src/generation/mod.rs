//! Marketing-copy generation.
//!
//! [`DescriptionGenerator`] is the seam the product service depends on; the production
//! implementation is [`ReplicateGenerator`], tests substitute their own.

pub mod replicate;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use replicate::ReplicateGenerator;

/// Message surfaced when the remote service gives no usable error text.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Failed to generate description";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Error text reported by the generation service
    #[error("{0}")]
    Remote(String),

    #[error("generation service responded with {0}")]
    Status(reqwest::StatusCode),

    #[error("generation service returned no text")]
    EmptyOutput,

    #[error("generation did not finish within {0:?}")]
    Timeout(Duration),

    #[error("generation API token is not configured")]
    NotConfigured,

    #[error("prediction poll URL {0} is outside the configured API origin")]
    ForeignPollUrl(String),
}

impl GenerationError {
    /// Message returned to API callers.
    ///
    /// Remote error text passes through unchanged. Local conditions describe themselves;
    /// anything else collapses to the generic failure message.
    pub fn message(&self) -> String {
        match self {
            Self::Remote(message) if !message.trim().is_empty() => message.clone(),
            Self::Timeout(_) | Self::NotConfigured => self.to_string(),
            _ => DEFAULT_FAILURE_MESSAGE.to_string(),
        }
    }
}

#[async_trait]
pub trait DescriptionGenerator: Send + Sync {
    /// Produces description text for a product. The result is trimmed and never empty.
    async fn generate(&self, name: &str, attributes: &str) -> Result<String, GenerationError>;
}

/// Prompt sent to the model. Name and attributes are embedded verbatim.
pub fn build_prompt(name: &str, attributes: &str) -> String {
    format!(
        "You are an experienced e-commerce copywriter. Write a persuasive, professional \
         product description in English for the product below.\n\
         Product name: {name}\n\
         Product attributes: {attributes}\n\
         Use two to three short paragraphs, highlight the key features and benefits, \
         and respond with the description text only."
    )
}

/// Joins streamed fragments with no separator and trims the result.
pub fn assemble_output<I, S>(fragments: I) -> Result<String, GenerationError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined: String = fragments
        .into_iter()
        .map(|fragment| fragment.as_ref().to_owned())
        .collect();
    let text = joined.trim();
    if text.is_empty() {
        return Err(GenerationError::EmptyOutput);
    }
    Ok(text.to_string())
}
