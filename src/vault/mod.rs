//! Credential vault
//!
//! Registry credentials are sealed with AES-256-GCM under a local master key
//! (`vault.key`, created on first use) and kept in `vault.store`, both owner
//! readable only. The registry name is bound in as associated data, so a
//! sealed entry moved under another name fails to open.
//!
//! Nothing decrypted is cached: every [`Vault::retrieve`] reads, opens and
//! hands the credential to the caller, which drops it when its request is done.

mod credential;

pub use credential::{Credential, Secret};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use serde::{Deserialize, Serialize};

use crate::common::fs::{FileLock, write_private};
use crate::context::Context;
use crate::error::codec::encoding;
use crate::error::registry::{authentication, credential_not_found, validation};
use crate::error::{NccError, Result};
use crate::serializer;

const KEY_FILE: &str = "vault.key";
const STORE_FILE: &str = "vault.store";
const GUARD_FILE: &str = "vault.lock";
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedEntry {
    #[serde(with = "crate::serializer::bytes")]
    nonce: Vec<u8>,
    #[serde(with = "crate::serializer::bytes")]
    ciphertext: Vec<u8>,
}

type Store = BTreeMap<String, SealedEntry>;

pub struct Vault {
    key_path: PathBuf,
    store_path: PathBuf,
    guard_path: PathBuf,
}

impl Vault {
    pub fn new(context: &Context) -> Self {
        let dir = &context.user_config_dir;
        Self {
            key_path: dir.join(KEY_FILE),
            store_path: dir.join(STORE_FILE),
            guard_path: dir.join(GUARD_FILE),
        }
    }

    /// Seal and store the credential for `registry`, replacing any previous one
    pub fn store(&self, registry: &str, credential: &Credential) -> Result<()> {
        let registry = normalize(registry)?;
        let _lock = FileLock::acquire(&self.guard_path)?;

        let cipher = self.cipher(&registry, true)?;
        let plaintext = serializer::to_bytes(credential)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: &plaintext,
                    aad: registry.as_bytes(),
                },
            )
            .map_err(|_| encoding("credential", "encryption failed"))?;

        let mut store = self.read_store()?;
        store.insert(
            registry.clone(),
            SealedEntry {
                nonce: nonce.to_vec(),
                ciphertext,
            },
        );
        self.write_store(&store)?;
        tracing::info!(registry = %registry, kind = credential.kind(), "Credential stored");
        Ok(())
    }

    /// Open the credential stored for `registry`
    pub fn retrieve(&self, registry: &str) -> Result<Credential> {
        self.try_retrieve(registry)?
            .ok_or_else(|| credential_not_found(registry.trim().to_ascii_lowercase()))
    }

    /// Like [`Vault::retrieve`], with `None` when no credential is stored
    pub fn try_retrieve(&self, registry: &str) -> Result<Option<Credential>> {
        let registry = normalize(registry)?;
        let store = self.read_store()?;
        let Some(entry) = store.get(&registry) else {
            return Ok(None);
        };
        if entry.nonce.len() != NONCE_LEN {
            return Err(authentication(&registry, "sealed credential is corrupt"));
        }

        let cipher = self.cipher(&registry, false)?;
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(&entry.nonce),
                Payload {
                    msg: &entry.ciphertext,
                    aad: registry.as_bytes(),
                },
            )
            .map_err(|_| authentication(&registry, "credential could not be decrypted with the vault key"))?;
        tracing::debug!(registry = %registry, "Credential opened");
        serializer::from_bytes(&plaintext).map(Some)
    }

    pub fn delete(&self, registry: &str) -> Result<()> {
        let registry = normalize(registry)?;
        let _lock = FileLock::acquire(&self.guard_path)?;

        let mut store = self.read_store()?;
        if store.remove(&registry).is_none() {
            return Err(credential_not_found(registry));
        }
        self.write_store(&store)?;
        tracing::info!(registry = %registry, "Credential removed");
        Ok(())
    }

    /// Names of registries with a stored credential
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(self.read_store()?.into_keys().collect())
    }

    fn cipher(&self, registry: &str, create: bool) -> Result<Aes256Gcm> {
        let key = if self.key_path.exists() {
            std::fs::read(&self.key_path).map_err(|e| NccError::io(&self.key_path, e))?
        } else if create {
            let key = Aes256Gcm::generate_key(OsRng);
            write_private(&self.key_path, &key)?;
            tracing::info!(path = %self.key_path.display(), "Vault key created");
            key.to_vec()
        } else {
            return Err(authentication(registry, "vault key is missing"));
        };

        if key.len() != KEY_LEN {
            return Err(authentication(registry, "vault key is corrupt"));
        }
        Aes256Gcm::new_from_slice(&key).map_err(|_| authentication(registry, "vault key is corrupt"))
    }

    fn read_store(&self) -> Result<Store> {
        read_store(&self.store_path)
    }

    fn write_store(&self, store: &Store) -> Result<()> {
        write_private(&self.store_path, &serializer::to_bytes(store)?)
    }
}

fn read_store(path: &Path) -> Result<Store> {
    if !path.exists() {
        return Ok(Store::new());
    }
    let bytes = std::fs::read(path).map_err(|e| NccError::io(path, e))?;
    if bytes.is_empty() {
        return Ok(Store::new());
    }
    serializer::from_bytes(&bytes)
}

fn normalize(registry: &str) -> Result<String> {
    let registry = registry.trim().to_ascii_lowercase();
    if registry.is_empty() {
        return Err(validation("registry name must not be empty"));
    }
    Ok(registry)
}
