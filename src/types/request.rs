//! Request-side types.

use std::fmt;

/// Question and schema for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    question: String,
    schema_description: String,
}

impl GenerationRequest {
    /// Create request from a question and a schema description.
    pub fn new(question: impl Into<String>, schema_description: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            schema_description: schema_description.into(),
        }
    }

    /// Natural language question, as the user typed it.
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Textual schema description given to the model.
    pub fn schema_description(&self) -> &str {
        &self.schema_description
    }
}

/// Text returned by a completion provider.
///
/// Untrusted: may hold markdown fences, commentary or several statements.
/// Only the validator turns it into something executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawModelOutput(String);

impl RawModelOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RawModelOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
