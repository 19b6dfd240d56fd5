//! Project chat: keyword intents that can move task status, with every turn logged.

pub mod orchestrator;
pub mod parser;

pub use orchestrator::{compose_reply, handle_incoming, list_chat, ChatExchange, ChatOutcome};
pub use parser::{parse, ChatSignal, Intent, TaskDirectory};
