//! Master key loading.
//!
//! Key is either:
//! - Loaded from the `DATAPORT_MASTER_KEY` env var (persistent mode)
//! - Generated randomly at startup (ephemeral mode)
//!
//! Ephemeral keys cannot decrypt anything encrypted by an earlier process, so
//! loading one is logged as a warning.

use super::{decode_key, generate_master_key, CryptoResult, KEY_LENGTH};

/// Environment variable holding the base64-encoded master key.
pub const MASTER_KEY_ENV: &str = "DATAPORT_MASTER_KEY";

/// A master key and whether it survives restarts.
#[derive(Clone)]
pub struct MasterKey {
    key: [u8; KEY_LENGTH],
    persistent: bool,
}

impl MasterKey {
    pub fn new(key: [u8; KEY_LENGTH]) -> Self {
        Self {
            key,
            persistent: true,
        }
    }

    /// Load from `DATAPORT_MASTER_KEY`, falling back to an ephemeral key when
    /// the variable is unset or invalid.
    pub fn from_env() -> CryptoResult<Self> {
        Self::from_encoded(std::env::var(MASTER_KEY_ENV).ok().as_deref())
    }

    /// Load from an optional base64 value.
    pub fn from_encoded(encoded: Option<&str>) -> CryptoResult<Self> {
        match encoded.map(decode_key) {
            Some(Ok(key)) => Ok(Self::new(key)),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "invalid {}, using ephemeral key", MASTER_KEY_ENV);
                Self::ephemeral()
            }
            None => {
                tracing::warn!("{} not set, using ephemeral key", MASTER_KEY_ENV);
                Self::ephemeral()
            }
        }
    }

    pub fn ephemeral() -> CryptoResult<Self> {
        Ok(Self {
            key: generate_master_key()?,
            persistent: false,
        })
    }

    /// Get the master key bytes.
    pub fn key(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Whether the key is persistent (from env var).
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("persistent", &self.persistent)
            .finish_non_exhaustive()
    }
}
