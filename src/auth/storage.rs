use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

/// Storage key for the bearer token
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Storage key for the serialized profile
pub const USER_DATA_KEY: &str = "user_data";

const STORE_FILE: &str = "credentials.json";

/// Persistent key-value store for the auth session.
///
/// A single JSON document on disk holding two fixed keys: the bearer token
/// and the serialized profile. Both are cleared together on logout or
/// refresh failure. Readers re-read on every call (through the in-memory
/// mirror), writers rewrite the whole file; there is one store per process.
pub struct CredentialStore {
    path: PathBuf,
    cache: RwLock<BTreeMap<String, String>>,
}

impl CredentialStore {
    /// Open (or create) the store under the given directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create storage directory {}", dir.display()))?;

        let path = dir.join(STORE_FILE);
        let cache = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<BTreeMap<String, String>>(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    warn!("Credential file unreadable, starting empty: {}", e);
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        debug!("Credential store at {}", path.display());

        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    pub fn access_token(&self) -> Option<String> {
        self.get(ACCESS_TOKEN_KEY)
    }

    pub fn set_access_token(&self, token: &str) -> Result<()> {
        self.set(ACCESS_TOKEN_KEY, token)
    }

    /// Raw serialized profile, as stored at login
    pub fn user_data(&self) -> Option<String> {
        self.get(USER_DATA_KEY)
    }

    pub fn set_user_data(&self, data: &str) -> Result<()> {
        self.set(USER_DATA_KEY, data)
    }

    /// Drop both keys together
    pub fn clear(&self) -> Result<()> {
        let mut cache = self
            .cache
            .write()
            .map_err(|_| anyhow!("Credential store lock poisoned"))?;
        cache.remove(ACCESS_TOKEN_KEY);
        cache.remove(USER_DATA_KEY);
        self.persist(&cache)
    }

    fn get(&self, key: &str) -> Option<String> {
        self.cache.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut cache = self
            .cache
            .write()
            .map_err(|_| anyhow!("Credential store lock poisoned"))?;
        cache.insert(key.to_string(), value.to_string());
        self.persist(&cache)
    }

    fn persist(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(map)?;
        fs::write(&self.path, bytes)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}
