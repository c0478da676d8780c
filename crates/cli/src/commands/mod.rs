//! Command handlers for the prosearch CLI.

pub mod ask;
pub mod history;
pub mod knowledge;

pub use ask::AskCommand;
pub use history::HistoryCommand;
pub use knowledge::KnowledgeCommand;
