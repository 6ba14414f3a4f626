//! LLM provider implementations
//!
//! Concrete implementations of the LlmProvider trait. The assistant is
//! local-only, so the Ollama adapter is the sole production backend.

pub mod ollama;

pub use ollama::*;
