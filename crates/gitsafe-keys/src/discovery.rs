//! Key discovery chain

use anyhow::{Context, Result};
use base64::Engine;
use gitsafe_core::GitSafeConfig;
use gitsafe_crypto::KeyMaterial;
use std::path::{Path, PathBuf};
use zeroize::Zeroize;

use crate::keyfile;

/// Environment variable naming a key file path.
pub const KEY_FILE_ENV: &str = "GIT_SAFE_KEY_FILE";

/// Environment variable carrying the base64-encoded key bytes.
pub const KEY_ENV: &str = "GIT_SAFE_KEY";

/// Directory under the git dir holding per-repo state.
pub const KEY_DIR_NAME: &str = "git-safe";

/// Key file name inside that directory.
pub const KEY_FILE_NAME: &str = "key";

/// Legacy key file name at the work-tree root.
pub const LEGACY_KEY_FILE: &str = ".git-safe-key";

/// A loaded key with its provenance, for status output and diagnostics.
#[derive(Debug)]
pub struct LoadedKey {
    pub material: KeyMaterial,
    pub source: String,
}

/// Canonical key location for a repository: `<git_dir>/git-safe/key`.
pub fn repo_key_path(git_dir: &Path) -> PathBuf {
    git_dir.join(KEY_DIR_NAME).join(KEY_FILE_NAME)
}

/// Discover and load the repository key using the priority chain:
///   1. explicit `--key-file` flag
///   2. $GIT_SAFE_KEY_FILE  (path to a key file)
///   3. $GIT_SAFE_KEY  (base64 key content, for CI)
///   4. `[keys] key_file` from git-safe.toml
///   5. `<git_dir>/git-safe/key`
///   6. `<work_tree>/.git-safe-key`  (legacy layout)
pub fn find_key(
    override_path: Option<&Path>,
    config: &GitSafeConfig,
    git_dir: &Path,
    work_tree: &Path,
) -> Result<LoadedKey> {
    // 1. Explicit flag
    if let Some(path) = override_path {
        return Ok(LoadedKey {
            material: load_checked(path, config)?,
            source: format!("flag:{}", path.display()),
        });
    }

    // 2. GIT_SAFE_KEY_FILE env var
    if let Ok(key_file) = std::env::var(KEY_FILE_ENV) {
        let path = PathBuf::from(&key_file);
        if path.exists() {
            return Ok(LoadedKey {
                material: load_checked(&path, config)?,
                source: format!("{KEY_FILE_ENV}:{}", path.display()),
            });
        }
    }

    // 3. GIT_SAFE_KEY env var (base64 key content)
    if let Ok(encoded) = std::env::var(KEY_ENV) {
        if !encoded.is_empty() {
            let mut bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .with_context(|| format!("decoding ${KEY_ENV}: not valid base64"))?;
            let result = keyfile::parse(&bytes).with_context(|| format!("decoding ${KEY_ENV}"));
            bytes.zeroize();
            return Ok(LoadedKey {
                material: result?,
                source: format!("{KEY_ENV} (env)"),
            });
        }
    }

    // 4. Config path (relative paths resolve against the work tree)
    if let Some(config_path) = &config.keys.key_file {
        let path = if config_path.is_absolute() {
            config_path.clone()
        } else {
            work_tree.join(config_path)
        };
        if path.exists() {
            return Ok(LoadedKey {
                material: load_checked(&path, config)?,
                source: format!("config:{}", path.display()),
            });
        }
    }

    // 5. Canonical location under the git dir
    let repo_key = repo_key_path(git_dir);
    if repo_key.exists() {
        return Ok(LoadedKey {
            material: load_checked(&repo_key, config)?,
            source: format!("repo:{}", repo_key.display()),
        });
    }

    // 6. Legacy work-tree location
    let legacy = work_tree.join(LEGACY_KEY_FILE);
    if legacy.exists() {
        tracing::warn!(
            "using legacy key file {}; it must stay gitignored",
            legacy.display()
        );
        return Ok(LoadedKey {
            material: load_checked(&legacy, config)?,
            source: format!("legacy:{}", legacy.display()),
        });
    }

    anyhow::bail!(
        "no key found. Tried: --key-file, ${KEY_FILE_ENV}, ${KEY_ENV}, config key_file, {}, and {}.\n\
         Run: git-safe init (new key) or git-safe unlock --key-file <key> (existing key)",
        repo_key.display(),
        legacy.display()
    )
}

fn load_checked(path: &Path, config: &GitSafeConfig) -> Result<KeyMaterial> {
    if config.key_file_mode_check {
        keyfile::check_mode(path);
    }
    keyfile::load(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_key(path: &Path) -> KeyMaterial {
        keyfile::generate_to(path).unwrap()
    }

    #[test]
    fn test_repo_key_path_layout() {
        let path = repo_key_path(Path::new("/repo/.git"));
        assert_eq!(path, PathBuf::from("/repo/.git/git-safe/key"));
    }

    #[test]
    fn test_override_flag_wins() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path().join(".git");
        let flag_key = dir.path().join("elsewhere.key");
        let generated = write_key(&flag_key);
        write_key(&repo_key_path(&git_dir));

        let loaded = find_key(
            Some(&flag_key),
            &GitSafeConfig::default(),
            &git_dir,
            dir.path(),
        )
        .unwrap();

        assert!(loaded.source.starts_with("flag:"));
        assert_eq!(loaded.material.cipher_key(), generated.cipher_key());
    }

    #[test]
    fn test_repo_key_found() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path().join(".git");
        write_key(&repo_key_path(&git_dir));

        let loaded = find_key(None, &GitSafeConfig::default(), &git_dir, dir.path()).unwrap();
        assert!(loaded.source.starts_with("repo:"));
    }

    #[test]
    fn test_config_path_beats_repo_key() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path().join(".git");
        write_key(&repo_key_path(&git_dir));
        let config_key = write_key(&dir.path().join("team.key"));

        let mut config = GitSafeConfig::default();
        config.keys.key_file = Some(PathBuf::from("team.key"));

        let loaded = find_key(None, &config, &git_dir, dir.path()).unwrap();
        assert!(loaded.source.starts_with("config:"));
        assert_eq!(loaded.material.cipher_key(), config_key.cipher_key());
    }

    #[test]
    fn test_legacy_key_found_last() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path().join(".git");
        std::fs::create_dir_all(&git_dir).unwrap();
        write_key(&dir.path().join(LEGACY_KEY_FILE));

        let loaded = find_key(None, &GitSafeConfig::default(), &git_dir, dir.path()).unwrap();
        assert!(loaded.source.starts_with("legacy:"));
    }

    #[test]
    fn test_repo_key_beats_legacy() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path().join(".git");
        let repo = write_key(&repo_key_path(&git_dir));
        write_key(&dir.path().join(LEGACY_KEY_FILE));

        let loaded = find_key(None, &GitSafeConfig::default(), &git_dir, dir.path()).unwrap();
        assert!(loaded.source.starts_with("repo:"));
        assert_eq!(loaded.material.cipher_key(), repo.cipher_key());
    }

    #[test]
    fn test_no_key_anywhere() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path().join(".git");
        std::fs::create_dir_all(&git_dir).unwrap();

        let err = find_key(None, &GitSafeConfig::default(), &git_dir, dir.path()).unwrap_err();
        assert!(err.to_string().contains("git-safe init"));
    }

    #[test]
    fn test_override_flag_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_key(
            Some(&dir.path().join("missing.key")),
            &GitSafeConfig::default(),
            &dir.path().join(".git"),
            dir.path(),
        )
        .unwrap_err();

        assert!(err.to_string().contains("reading key file"));
    }
}
