//! File-backed token storage.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use super::crypto::{
    decrypt_entries, encrypt_entries, file_salt, looks_encrypted, EncryptedTokenFile, MachineKey,
};
use super::storage::TokenStorage;
use crate::error::StoreError;

/// Token entries persisted as one JSON document.
///
/// Plaintext files are a flat object of string entries. With `encrypt` on,
/// each entry is sealed and plaintext files found on disk are rewritten
/// encrypted on first read.
pub struct FileStorage {
    path: PathBuf,
    encrypt: bool,
    key: Mutex<Option<MachineKey>>,
    io: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>, encrypt: bool) -> Self {
        Self {
            path: path.into(),
            encrypt,
            key: Mutex::new(None),
            io: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new())
            }
            Err(err) => return Err(StoreError::Io(err)),
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let value: serde_json::Value = serde_json::from_str(&text).map_err(|err| {
            StoreError::Invalid(format!(
                "failed to parse token file `{}`: {err}",
                self.path.display()
            ))
        })?;

        if looks_encrypted(&value) {
            let file: EncryptedTokenFile = serde_json::from_value(value).map_err(|err| {
                StoreError::Invalid(format!(
                    "failed to parse encrypted token file `{}`: {err}",
                    self.path.display()
                ))
            })?;
            let key = self.key_for_salt(file_salt(&file)?)?;
            return decrypt_entries(&key, &file);
        }

        let entries: BTreeMap<String, String> = serde_json::from_value(value).map_err(|err| {
            StoreError::Invalid(format!(
                "failed to parse token file `{}`: {err}",
                self.path.display()
            ))
        })?;
        if self.encrypt && !entries.is_empty() {
            // Keep serving plaintext if the rewrite fails.
            if let Err(err) = self.write(&entries) {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "failed to encrypt plaintext token file; it stays unencrypted on disk"
                );
            }
        }
        Ok(entries)
    }

    fn write(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700));
            }
        }

        let serialized = if self.encrypt {
            let key = self.write_key()?;
            serde_json::to_string_pretty(&encrypt_entries(&key, entries)?)
        } else {
            serde_json::to_string_pretty(entries)
        };
        let text = serialized
            .map_err(|err| StoreError::Invalid(format!("failed to serialize token file: {err}")))?;

        let mut options = std::fs::OpenOptions::new();
        options.create(true).truncate(true).write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        file.write_all(text.as_bytes())?;
        file.flush()?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600));
        }
        Ok(())
    }

    fn update<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _io = self.io.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut entries = self.load()?;
        apply(&mut entries);
        self.write(&entries)
    }

    fn key_for_salt(&self, salt: [u8; 16]) -> Result<MachineKey, StoreError> {
        let mut cached = self.key.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(key) = cached.as_ref().filter(|key| key.salt() == salt) {
            return Ok(key.clone());
        }
        let key = MachineKey::derive(salt)?;
        *cached = Some(key.clone());
        Ok(key)
    }

    fn write_key(&self) -> Result<MachineKey, StoreError> {
        let mut cached = self.key.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(key) = cached.as_ref() {
            return Ok(key.clone());
        }
        let key = MachineKey::generate()?;
        *cached = Some(key.clone());
        Ok(key)
    }
}

impl TokenStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _io = self.io.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(self.load()?.remove(key))
    }

    fn set_items(&self, items: &[(&str, &str)]) -> Result<(), StoreError> {
        self.update(|entries| {
            for (key, value) in items {
                entries.insert((*key).to_string(), (*value).to_string());
            }
        })
    }

    fn remove_items(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.update(|entries| {
            for key in keys {
                entries.remove(*key);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::TestTempDir;

    #[test]
    fn plaintext_layout_uses_three_string_entries() {
        let tmp = TestTempDir::new("file-storage-plain");
        let storage = FileStorage::new(tmp.child("tokens.json"), false);
        storage
            .set_items(&[
                ("access_token", "a1"),
                ("refresh_token", "r1"),
                ("expires_at", "1700000000000"),
            ])
            .unwrap();

        let text = std::fs::read_to_string(storage.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["access_token"], "a1");
        assert_eq!(value["refresh_token"], "r1");
        assert_eq!(value["expires_at"], "1700000000000");
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let tmp = TestTempDir::new("file-storage-missing");
        let storage = FileStorage::new(tmp.child("nested/tokens.json"), false);
        assert_eq!(storage.get_item("access_token").unwrap(), None);
    }

    #[test]
    fn encrypted_entries_survive_reopen_without_plaintext_on_disk() {
        let tmp = TestTempDir::new("file-storage-encrypted");
        let path = tmp.child("tokens.json");
        FileStorage::new(&path, true)
            .set_items(&[("access_token", "secret-access"), ("refresh_token", "secret-refresh")])
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("secret-access"));
        assert!(!text.contains("secret-refresh"));

        let reopened = FileStorage::new(&path, true);
        assert_eq!(
            reopened.get_item("refresh_token").unwrap().as_deref(),
            Some("secret-refresh")
        );
    }

    #[test]
    fn plaintext_file_is_migrated_when_encryption_enabled() {
        let tmp = TestTempDir::new("file-storage-migrate");
        let path = tmp.write_text("tokens.json", r#"{"access_token":"legacy-access"}"#);

        let storage = FileStorage::new(&path, true);
        assert_eq!(
            storage.get_item("access_token").unwrap().as_deref(),
            Some("legacy-access")
        );
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("legacy-access"), "file was not migrated: {text}");
    }

    #[cfg(unix)]
    #[test]
    fn failed_migration_still_serves_plaintext_entries() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TestTempDir::new("file-storage-migrate-readonly");
        let path = tmp.write_text("tokens.json", r#"{"refresh_token":"legacy-refresh"}"#);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o400)).unwrap();
        if std::fs::OpenOptions::new().write(true).open(&path).is_ok() {
            // Permissions are not enforced for this user; the rewrite cannot be made to fail.
            return;
        }

        let storage = FileStorage::new(&path, true);
        assert_eq!(
            storage.get_item("refresh_token").unwrap().as_deref(),
            Some("legacy-refresh")
        );
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("legacy-refresh"));
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();
    }

    #[test]
    fn remove_items_keeps_other_entries() {
        let tmp = TestTempDir::new("file-storage-remove");
        let storage = FileStorage::new(tmp.child("tokens.json"), false);
        storage
            .set_items(&[("access_token", "a"), ("refresh_token", "r")])
            .unwrap();
        storage.remove_items(&["access_token"]).unwrap();
        assert_eq!(storage.get_item("access_token").unwrap(), None);
        assert_eq!(storage.get_item("refresh_token").unwrap().as_deref(), Some("r"));
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TestTempDir::new("file-storage-perms");
        let storage = FileStorage::new(tmp.child("tokens.json"), false);
        storage.set_items(&[("access_token", "a")]).unwrap();
        let mode = std::fs::metadata(storage.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
