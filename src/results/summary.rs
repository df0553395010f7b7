//! Natural-language answer for shaped results.

use crate::llm::{ModelClient, PromptBuilder};
use crate::results::ShapedTable;
use std::sync::Arc;
use tracing::warn;

pub const NO_RESULTS_SUMMARY: &str = "The query returned no results.";

/// Asks the model to summarize query results.
pub struct Summarizer {
    model: Arc<ModelClient>,
    prompts: PromptBuilder,
}

impl Summarizer {
    pub fn new(model: Arc<ModelClient>, prompts: PromptBuilder) -> Self {
        Self { model, prompts }
    }

    /// Summarize a table.
    ///
    /// Never fails: an empty table gets a fixed answer without a model call,
    /// and a model failure is logged and yields `None`.
    pub async fn summarize(&self, question: &str, table: &ShapedTable) -> Option<String> {
        if table.rows.is_empty() {
            return Some(NO_RESULTS_SUMMARY.to_string());
        }

        let prompt = self.prompts.build_summary(question, table);
        match self.model.complete(&prompt).await {
            Ok(output) => {
                let text = output.into_inner().trim().to_string();
                (!text.is_empty()).then_some(text)
            }
            Err(e) => {
                warn!(error = %e, "Summary generation failed, omitting summary");
                None
            }
        }
    }
}
