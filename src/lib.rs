//! convertd - file conversion tools over HTTP.
//!
//! Each tool (PDF to Word, merge PDF, text to speech, ...) owns a storage
//! partition: `<root>/uploads/<tool>` and `<root>/outputs/<tool>`. Outputs
//! are named after the upload or a fixed base and never overwrite an earlier
//! output: `report.pdf`, then `report(1).pdf`, `report(2).pdf`, ...
//!
//! # Features
//!
//! - Collision-free output naming, as a scan or an atomic reservation
//! - Streaming upload persistence
//! - Office, PDF, image and speech converters driving external programs
//! - An axum router exposing every tool
//!
//! # Example
//!
//! ```no_run
//! use convertd::fs::Storage;
//!
//! # fn main() -> convertd::Result<()> {
//! let storage = Storage::new("storage", 10_000);
//! let path = storage.reserve_output_path("report", ".pdf", "pdf_to_word")?;
//! println!("writing to {}", path.display());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod convert;
pub mod error;
pub mod fs;
pub mod output;
pub mod server;

// Re-exports for convenience
pub use config::{Config, Tool};
pub use convert::{Converter, ConverterRegistry, Job, JobOptions, Outcome};
pub use error::{Error, Result};
pub use fs::{Storage, StoredUpload};
pub use server::{create_router, AppState};
