pub mod app;
pub mod config;
pub mod delete;
pub mod engine;
pub mod error;
pub mod hash;
pub mod index;
pub mod ingest;
pub mod parsers;
pub mod progress;
pub mod search;
pub mod store;

pub use app::{ApiResponse, App};
pub use config::Config;
pub use error::{DocdexError, Result};
pub use progress::{ParseProgress, ProgressSink, ProgressStatus};
