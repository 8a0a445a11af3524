//! The raw key file: 96 bytes, cipher key then MAC key

use anyhow::{bail, Context, Result};
use gitsafe_crypto::{KeyMaterial, CIPHER_KEY_SIZE, MAC_KEY_SIZE};
use std::path::Path;
use zeroize::Zeroize;

/// Exact size of a key file: cipher key (32) followed by MAC key (64).
pub const KEY_FILE_SIZE: usize = CIPHER_KEY_SIZE + MAC_KEY_SIZE;

/// Read and validate a key file.
pub fn load(path: &Path) -> Result<KeyMaterial> {
    let mut bytes =
        std::fs::read(path).with_context(|| format!("reading key file: {}", path.display()))?;
    let result = parse(&bytes).with_context(|| format!("invalid key file: {}", path.display()));
    bytes.zeroize();
    result
}

/// Split raw key file bytes into key material.
pub fn parse(bytes: &[u8]) -> Result<KeyMaterial> {
    if bytes.len() != KEY_FILE_SIZE {
        bail!(
            "key data must be exactly {} bytes (cipher key {} + MAC key {}), got {}",
            KEY_FILE_SIZE,
            CIPHER_KEY_SIZE,
            MAC_KEY_SIZE,
            bytes.len()
        );
    }
    let (cipher, mac) = bytes.split_at(CIPHER_KEY_SIZE);
    Ok(KeyMaterial::load(cipher, mac)?)
}

/// Write key material to `path`, mode 0600, atomically (tmp + rename so a
/// concurrent filter invocation never sees a partial key).
pub fn save(path: &Path, keys: &KeyMaterial) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let parent_existed = parent.exists();
    std::fs::create_dir_all(parent)
        .with_context(|| format!("creating key directory: {}", parent.display()))?;

    #[cfg(unix)]
    if !parent_existed {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))
            .with_context(|| format!("setting key directory mode: {}", parent.display()))?;
    }
    #[cfg(not(unix))]
    let _ = parent_existed;

    let mut bytes = Vec::with_capacity(KEY_FILE_SIZE);
    bytes.extend_from_slice(keys.cipher_key());
    bytes.extend_from_slice(keys.mac_key());

    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));
    let write_result = std::fs::write(&tmp_path, &bytes)
        .with_context(|| format!("writing key file: {}", tmp_path.display()));
    bytes.zeroize();
    write_result?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("setting key file mode: {}", tmp_path.display()))?;
    }

    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("installing key file: {}", path.display()))?;

    tracing::info!("key file written: {}", path.display());
    Ok(())
}

/// Generate a fresh key pair and write it to `path`.
pub fn generate_to(path: &Path) -> Result<KeyMaterial> {
    let keys = KeyMaterial::generate();
    save(path, &keys)?;
    Ok(keys)
}

/// Warn when a key file is readable by group or others.
pub fn check_mode(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = std::fs::metadata(path) {
            let mode = meta.permissions().mode() & 0o777;
            if mode & 0o077 != 0 {
                tracing::warn!(
                    "key file {} is mode {:03o}, readable beyond the owner; run: chmod 600 {}",
                    path.display(),
                    mode,
                    path.display()
                );
            }
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}
