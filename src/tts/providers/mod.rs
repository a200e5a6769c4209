//! Concrete TTS provider implementations.

mod openai;
mod piper;

pub use openai::OpenAiTtsProvider;
pub use piper::PiperProvider;
