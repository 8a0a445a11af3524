//! gitsafe-keys: key file storage and discovery
//!
//! Key discovery chain (in order of precedence):
//!   1. --key-file flag
//!   2. $GIT_SAFE_KEY_FILE env var (path to a key file)
//!   3. $GIT_SAFE_KEY env var (base64 of the raw key bytes, for CI)
//!   4. [keys] key_file in git-safe.toml
//!   5. .git/git-safe/key (canonical per-repo location)
//!   6. .git-safe-key at the work-tree root (legacy layout)

pub mod discovery;
pub mod keyfile;

pub use discovery::{find_key, repo_key_path, LoadedKey};
pub use keyfile::KEY_FILE_SIZE;
