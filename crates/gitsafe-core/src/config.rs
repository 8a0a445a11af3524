use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the optional per-repository config file, looked up at the
/// work-tree root.
pub const CONFIG_FILE_NAME: &str = "git-safe.toml";

/// Per-repository configuration (loaded from git-safe.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSafeConfig {
    pub keys: KeysConfig,
    pub init: InitConfig,
    pub filter: FilterConfig,
    /// Warn if the key file is group/world-readable (default: true)
    #[serde(default = "default_true")]
    pub key_file_mode_check: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Key file path override (relative paths resolve against the work tree)
    pub key_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InitConfig {
    /// Patterns seeded into .gitattributes by `git-safe init`
    /// (e.g. `["*.secret", "config/*.env"]`)
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Filter driver name used in .gitattributes and git config
    /// (default: git-safe)
    pub name: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            name: "git-safe".into(),
        }
    }
}

impl GitSafeConfig {
    /// Load the config file from a work-tree root, falling back to
    /// defaults when it does not exist.
    pub fn load(work_tree: &Path) -> Result<Self> {
        let path = work_tree.join(CONFIG_FILE_NAME);
        if !path.exists() {
            tracing::debug!("no {} found, using defaults", CONFIG_FILE_NAME);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
    }
}
