pub mod auth;
pub mod chat;
pub mod endpoint;
pub mod eval;
pub mod fetch;
pub mod llm;
pub mod retrieve;
