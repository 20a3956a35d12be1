//! Structured error types for the column flow engine.
//!
//! Malformed markup is never an error: the tree builder degrades instead.
//! What remains are usage errors, configuration input, image loading and
//! file I/O and output for the CLI.

use thiserror::Error;

/// The unified error type returned by all public colflow API functions.
#[derive(Debug, Error)]
pub enum FlowError {
    /// `render` was called before any markup was loaded.
    #[error("No markup to render. Call load() before render()")]
    NotInitialized,

    /// Configuration JSON failed to parse.
    #[error("Failed to parse configuration: {source}{hint}")]
    Config {
        #[source]
        source: serde_json::Error,
        /// Preformatted hint line, empty when there is nothing to add.
        hint: String,
    },

    /// Layout output could not be written as JSON.
    #[error("Failed to serialize output: {0}")]
    Output(serde_json::Error),

    /// An image could not be read or its header decoded.
    #[error("Image error: {0}")]
    Image(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for FlowError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters."
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the configuration schema. Check field names and types."
            }
            serde_json::error::Category::Eof => "Unexpected end of input. Is the JSON truncated?",
            serde_json::error::Category::Io => "",
        };
        let hint = if hint.is_empty() {
            String::new()
        } else {
            format!("\n  Hint: {}", hint)
        };
        FlowError::Config { source: e, hint }
    }
}
