//! AES-256-GCM sealing for the persisted wallet state.
//!
//! The key is the keccak256 digest of the wallet-provider secret, so the
//! file can only be opened by a process configured with the same
//! credentials. Sealed values look like `vault:<base64(nonce || ciphertext)>`.
//! Values without the prefix are treated as plaintext, which lets a
//! hand-written wallet file be imported once and sealed on the next save.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use alloy::primitives::keccak256;
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use rand::RngCore;

const VAULT_PREFIX: &str = "vault:";

/// AES-GCM nonce length (96 bits).
const NONCE_LEN: usize = 12;

pub struct Vault {
    cipher: Aes256Gcm,
}

impl Vault {
    pub fn from_secret(secret: &str) -> Self {
        let digest = keccak256(secret.as_bytes());
        let key = Key::<Aes256Gcm>::from(digest.0);
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    pub fn seal(&self, plaintext: &[u8]) -> anyhow::Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        #[allow(deprecated)]
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| anyhow::anyhow!("encrypt: {}", e))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(format!("{}{}", VAULT_PREFIX, B64.encode(&combined)))
    }

    pub fn open(&self, value: &str) -> anyhow::Result<Vec<u8>> {
        let value = value.trim();
        let Some(encoded) = value.strip_prefix(VAULT_PREFIX) else {
            return Ok(value.as_bytes().to_vec());
        };

        let combined = B64
            .decode(encoded)
            .map_err(|e| anyhow::anyhow!("base64 decode: {}", e))?;
        if combined.len() < NONCE_LEN {
            anyhow::bail!("sealed value too short");
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        #[allow(deprecated)]
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| anyhow::anyhow!("decrypt: {} (wallet credentials changed?)", e))
    }
}

pub fn is_sealed(value: &str) -> bool {
    value.trim_start().starts_with(VAULT_PREFIX)
}
