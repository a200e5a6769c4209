//! Concrete LLM provider implementations.

mod anthropic;
mod llamacpp;
mod ollama;
mod openai;

pub use anthropic::AnthropicProvider;
pub use llamacpp::LlamaCppProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
