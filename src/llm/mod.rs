//! LLM-powered SQL generation: prompts, providers and the retrying client.

pub mod client;
pub mod gemini;
pub mod openai;
pub mod prompt;
pub mod provider;

pub use client::{ModelClient, ModelClientOptions, MAX_ATTEMPTS};
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use prompt::PromptBuilder;
pub use provider::{CompletionProvider, ProviderError};
