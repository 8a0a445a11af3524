//! gitsafe-core: shared configuration and .gitattributes handling
//!
//! Everything here is path and string plumbing; no cryptography. The
//! filter engine never classifies paths itself, it only sees the bytes
//! git hands it. Deciding which paths are filtered is this crate's job.

pub mod attributes;
pub mod config;

pub use config::{GitSafeConfig, CONFIG_FILE_NAME};
