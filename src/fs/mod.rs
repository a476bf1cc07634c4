//! Filesystem module.
//!
//! Provides:
//! - Collision-free output naming
//! - Per-tool storage partitions and download links
//! - Upload persistence

pub mod naming;
pub mod paths;
pub mod storage;
pub mod upload;

pub use naming::{
    candidate_name, reserve_unique_filename, sanitize_filename, unique_filename,
    validate_path_component,
};
pub use paths::{download_url, ensure_dir, tool_dirs, work_dir, ToolDirs};
pub use storage::{Storage, StoredUpload, DEFAULT_MAX_NAME_ATTEMPTS};
pub use upload::write_upload;
