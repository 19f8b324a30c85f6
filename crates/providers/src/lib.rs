//! LLM Provider implementations for Parley.
//!
//! All providers implement the `parley_core::Provider` trait. Parley talks to
//! a single OpenAI-compatible backend; the base URL selects the vendor.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
