//! Machine-bound encryption at rest for the token file.
//!
//! A random data key encrypts each entry; the data key itself is wrapped by a
//! key-encryption key derived from host identity and a per-file salt.

use aes_gcm_siv::aead::{Aead, KeyInit};
use aes_gcm_siv::{Aes256GcmSiv, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use rand::RngCore;
use scrypt::{scrypt, Params as ScryptParams};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::error::StoreError;

pub(crate) const TOKEN_FILE_VERSION_ENCRYPTED: u32 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const MACHINE_KEY_CONTEXT: &str = "tokenflow-token-file-kek-v1";
const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct EncryptedTokenFile {
    #[serde(default)]
    pub(crate) version: u32,
    #[serde(default)]
    pub(crate) encryption: KeyEnvelope,
    #[serde(default)]
    pub(crate) entries: BTreeMap<String, EncryptedEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct KeyEnvelope {
    #[serde(default)]
    pub(crate) salt: String,
    #[serde(default)]
    pub(crate) wrapped_key_nonce: String,
    #[serde(default)]
    pub(crate) wrapped_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct EncryptedEntry {
    #[serde(default)]
    pub(crate) nonce: String,
    #[serde(default)]
    pub(crate) ciphertext: String,
}

/// Key-encryption key plus the salt it was derived with.
///
/// Derivation is slow; `FileStorage` caches one of these.
#[derive(Clone)]
pub(crate) struct MachineKey {
    salt: [u8; SALT_LEN],
    kek: [u8; KEY_LEN],
}

impl MachineKey {
    /// Derive a key for a fresh random salt.
    pub(crate) fn generate() -> Result<Self, StoreError> {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        Self::derive(salt)
    }

    pub(crate) fn derive(salt: [u8; SALT_LEN]) -> Result<Self, StoreError> {
        let mut hashed = Sha256::new();
        hashed.update(MACHINE_KEY_CONTEXT.as_bytes());
        hashed.update(machine_identity().as_bytes());
        hashed.update(salt);
        let seed = hashed.finalize();

        let params = ScryptParams::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LEN)
            .map_err(|err| StoreError::Invalid(format!("invalid scrypt parameters: {err}")))?;
        let mut kek = [0u8; KEY_LEN];
        scrypt(&seed, &salt, &params, &mut kek).map_err(|err| {
            StoreError::Invalid(format!("failed to derive token file key: {err}"))
        })?;
        Ok(Self { salt, kek })
    }

    pub(crate) fn salt(&self) -> [u8; SALT_LEN] {
        self.salt
    }
}

pub(crate) fn looks_encrypted(value: &serde_json::Value) -> bool {
    value
        .get("encryption")
        .and_then(|inner| inner.as_object())
        .is_some()
}

/// Salt recorded in an encrypted token file.
pub(crate) fn file_salt(file: &EncryptedTokenFile) -> Result<[u8; SALT_LEN], StoreError> {
    decode_fixed::<SALT_LEN>(&file.encryption.salt, "salt")
}

pub(crate) fn encrypt_entries(
    key: &MachineKey,
    entries: &BTreeMap<String, String>,
) -> Result<EncryptedTokenFile, StoreError> {
    let mut data_key = [0u8; KEY_LEN];
    rand::thread_rng().fill_bytes(&mut data_key);
    let (wrapped_nonce, wrapped_key) = encrypt_blob(&key.kek, &data_key)?;

    let mut encrypted = BTreeMap::new();
    for (name, value) in entries {
        let (nonce, ciphertext) = encrypt_blob(&data_key, value.as_bytes())?;
        encrypted.insert(
            name.clone(),
            EncryptedEntry {
                nonce: B64.encode(nonce),
                ciphertext: B64.encode(ciphertext),
            },
        );
    }

    Ok(EncryptedTokenFile {
        version: TOKEN_FILE_VERSION_ENCRYPTED,
        encryption: KeyEnvelope {
            salt: B64.encode(key.salt),
            wrapped_key_nonce: B64.encode(wrapped_nonce),
            wrapped_key: B64.encode(wrapped_key),
        },
        entries: encrypted,
    })
}

pub(crate) fn decrypt_entries(
    key: &MachineKey,
    file: &EncryptedTokenFile,
) -> Result<BTreeMap<String, String>, StoreError> {
    let wrapped_nonce =
        decode_fixed::<NONCE_LEN>(&file.encryption.wrapped_key_nonce, "wrapped_key_nonce")?;
    let wrapped_key = decode_bytes(&file.encryption.wrapped_key, "wrapped_key")?;
    let raw_key = decrypt_blob(&key.kek, &wrapped_nonce, &wrapped_key).map_err(|_| {
        StoreError::Invalid(
            "failed to unlock token file (machine identity may have changed); log in again"
                .to_string(),
        )
    })?;
    if raw_key.len() != KEY_LEN {
        return Err(StoreError::Invalid(
            "invalid key material in token file".to_string(),
        ));
    }
    let mut data_key = [0u8; KEY_LEN];
    data_key.copy_from_slice(&raw_key);

    let mut entries = BTreeMap::new();
    for (name, entry) in &file.entries {
        let nonce = decode_fixed::<NONCE_LEN>(&entry.nonce, "nonce")?;
        let ciphertext = decode_bytes(&entry.ciphertext, "ciphertext")?;
        let plaintext = decrypt_blob(&data_key, &nonce, &ciphertext)
            .map_err(|_| StoreError::Invalid(format!("failed to decrypt token entry `{name}`")))?;
        let value = String::from_utf8(plaintext).map_err(|_| {
            StoreError::Invalid(format!("token entry `{name}` is not valid UTF-8"))
        })?;
        entries.insert(name.clone(), value);
    }
    Ok(entries)
}

fn machine_identity() -> String {
    let host = hostname::get()
        .map(|value| value.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown-host".to_string());
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown-user".to_string());
    let home = dirs::home_dir()
        .map(|path| path.display().to_string())
        .unwrap_or_default();
    let machine_id = read_machine_id().unwrap_or_default();
    format!(
        "os={}|host={host}|user={user}|home={home}|machine_id={machine_id}",
        std::env::consts::OS
    )
}

fn read_machine_id() -> Option<String> {
    ["/etc/machine-id", "/var/lib/dbus/machine-id", "/etc/hostid"]
        .iter()
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn encrypt_blob(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>), StoreError> {
    let cipher = Aes256GcmSiv::new_from_slice(key)
        .map_err(|_| StoreError::Invalid("invalid encryption key length".to_string()))?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| StoreError::Invalid("failed to encrypt token data".to_string()))?;
    Ok((nonce.to_vec(), ciphertext))
}

fn decrypt_blob(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, StoreError> {
    let cipher = Aes256GcmSiv::new_from_slice(key)
        .map_err(|_| StoreError::Invalid("invalid encryption key length".to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| StoreError::Invalid("failed to decrypt token data".to_string()))
}

fn decode_bytes(value: &str, field: &str) -> Result<Vec<u8>, StoreError> {
    B64.decode(value).map_err(|err| {
        StoreError::Invalid(format!("failed to decode token file field `{field}`: {err}"))
    })
}

fn decode_fixed<const N: usize>(value: &str, field: &str) -> Result<[u8; N], StoreError> {
    let bytes = decode_bytes(value, field)?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| {
        StoreError::Invalid(format!(
            "invalid token file field `{field}` length: expected {N}, got {}",
            bytes.len()
        ))
    })
}
