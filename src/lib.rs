//! YouMatch bot: questionnaire onboarding, retrieval chat and follow-ups.

pub mod bot;
pub mod channels;
pub mod config;
pub mod engine;
pub mod error;
pub mod followup;
pub mod knowledge;
pub mod llm;
pub mod memory;
pub mod prompts;
pub mod questionnaire;
pub mod session;
pub mod store;
