//! Language model clients behind `blendrag_core::traits::Generator`.

pub mod ollama;

pub use ollama::OllamaGenerator;
