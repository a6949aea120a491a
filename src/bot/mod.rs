//! Bot composition root.

mod dispatch;
mod orchestrator;

pub use orchestrator::{BotDeps, Route, TurnOrchestrator};
