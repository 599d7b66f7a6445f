//! Handlers that perform the real work behind executed step kinds

mod file_ops;
mod script;
mod types;
mod web_scraper;

pub use file_ops::LocalFileOperations;
pub use script::SandboxedScripts;
pub use types::{
    FileOperations, HandlerError, Outcome, ScriptRunner, TransferMode, WebScraper,
};

#[cfg(test)]
pub use types::HandlerResult;
pub use web_scraper::HttpScraper;
