//! Local-LLM terminal copilot: natural language in, vetted shell commands out.

pub mod commands;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod executor;
pub mod fallback;
pub mod gate;
pub mod llm;
pub mod lookup;
pub mod parser;
pub mod planner;
pub mod repl;
pub mod safety;
pub mod signal;
pub mod stream;
pub mod types;
pub mod ui;
