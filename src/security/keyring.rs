//! Keyring integration for the chat provider API key
//! Falls back to file storage if keyring is unavailable

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SERVICE_NAME: &str = "lingua-coach";
const API_KEY_USERNAME: &str = "chat-api-key";
const API_KEY_FILE: &str = "api_key.txt";

/// Get the path for the fallback API key file
fn api_key_file_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "lingua-coach", "lingua-coach")
        .context("Failed to get project directories")?;
    let dir = base.config_dir();
    fs::create_dir_all(dir).context("Failed to create config directory")?;
    Ok(dir.join(API_KEY_FILE))
}

/// Set API key - tries keyring first, falls back to file
pub fn set_api_key(key: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("API key must not be empty");
    }

    if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, API_KEY_USERNAME) {
        if entry.set_password(key).is_ok() {
            // Backup copy in case keyring retrieval fails later
            if let Err(e) = write_key_file(&api_key_file_path()?, key) {
                debug!("Could not write API key backup file: {}", e);
            }
            return Ok(());
        }
    }

    warn!("Keyring unavailable, storing API key in a private file");
    write_key_file(&api_key_file_path()?, key)
}

/// Get API key - tries keyring first, falls back to file
pub fn get_api_key() -> Result<String> {
    if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, API_KEY_USERNAME) {
        if let Ok(key) = entry.get_password() {
            return Ok(key);
        }
    }

    read_key_file(&api_key_file_path()?)
        .context("No API key set. Run 'lingua-coach config --set-api-key YOUR_KEY' first.")
}

/// Delete API key from both keyring and file
pub fn delete_api_key() -> Result<()> {
    if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, API_KEY_USERNAME) {
        let _ = entry.delete_credential();
    }

    let path = api_key_file_path()?;
    if path.exists() {
        fs::remove_file(&path).context("Failed to delete API key file")?;
    }
    Ok(())
}

pub fn has_api_key() -> bool {
    get_api_key().is_ok()
}

/// Write `key` readable only by the owner
fn write_key_file(path: &Path, key: &str) -> Result<()> {
    fs::write(path, key).context("Failed to write API key file")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .context("Failed to set file permissions")?;
    }

    Ok(())
}

fn read_key_file(path: &Path) -> Result<String> {
    let key = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("API key file {} is empty", path.display());
    }
    Ok(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_key_file_roundtrip_trims() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(API_KEY_FILE);
        write_key_file(&path, "sk-test\n").unwrap();
        assert_eq!(read_key_file(&path).unwrap(), "sk-test");
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let path = dir.path().join(API_KEY_FILE);
        write_key_file(&path, "sk-test").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_empty_key_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(API_KEY_FILE);
        fs::write(&path, "  \n").unwrap();
        assert!(read_key_file(&path).is_err());
        assert!(read_key_file(&dir.path().join("missing")).is_err());
    }
}
