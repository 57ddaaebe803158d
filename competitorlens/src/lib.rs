// Library interface for competitorlens modules
// This allows tests and the binary to import modules

pub mod cancel;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod report;
pub mod scraping;
pub mod server;

pub use error::{LensError, Result};
