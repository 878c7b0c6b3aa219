//! FHE key management with TFHE-rs
//!
//! - ClientKey: decryption; held by the key management role only
//! - ServerKey: homomorphic evaluation; installed on the engine thread
//! - PublicKey: client-side encryption of external inputs

use crate::capability::ClearValue;
use crate::input::ExternalInput;
use crate::{FHEConfig, FHEError, FHEResult};
use tfhe::prelude::*;
use tfhe::{generate_keys, CompactPublicKey, Config, ConfigBuilder};
use tfhe::{ClientKey as TfheClientKey, ServerKey as TfheServerKey};

fn tfhe_config(config: &FHEConfig) -> Config {
    if config.security_bits >= 128 {
        ConfigBuilder::default().build()
    } else {
        // Lower security for tests
        ConfigBuilder::default_with_small_encryption().build()
    }
}

/// Key identifier, derived from the parameter choice
fn config_hash(config: &FHEConfig) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"veilcast/fhe-config/v1");
    hasher.update(&config.security_bits.to_le_bytes());
    *hasher.finalize().as_bytes()
}

/// Client key for encryption and decryption
#[derive(Clone)]
pub struct ClientKey {
    pub(crate) inner: TfheClientKey,
    config_hash: [u8; 32],
}

impl ClientKey {
    pub fn inner(&self) -> &TfheClientKey {
        &self.inner
    }

    pub fn config_hash(&self) -> [u8; 32] {
        self.config_hash
    }

    pub fn to_bytes(&self) -> FHEResult<Vec<u8>> {
        bincode::serialize(&self.inner).map_err(|e| FHEError::SerializationError(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8], config: &FHEConfig) -> FHEResult<Self> {
        let inner: TfheClientKey = bincode::deserialize(bytes)
            .map_err(|e| FHEError::SerializationError(e.to_string()))?;
        Ok(Self {
            inner,
            config_hash: config_hash(config),
        })
    }
}

impl std::fmt::Debug for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientKey")
            .field("config_hash", &hex::encode(&self.config_hash[..8]))
            .finish()
    }
}

/// Server key for homomorphic operations
#[derive(Clone)]
pub struct ServerKey {
    pub(crate) inner: TfheServerKey,
    config_hash: [u8; 32],
}

impl ServerKey {
    pub fn verify_config(&self, config: &FHEConfig) -> bool {
        config_hash(config) == self.config_hash
    }

    pub fn config_hash(&self) -> [u8; 32] {
        self.config_hash
    }

    /// Install as the TFHE-rs server key of the calling thread
    pub fn install(&self) {
        tfhe::set_server_key(self.inner.clone());
    }

    /// Serialize to bytes (large, tens of MB)
    pub fn to_bytes(&self) -> FHEResult<Vec<u8>> {
        bincode::serialize(&self.inner).map_err(|e| FHEError::SerializationError(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8], config: &FHEConfig) -> FHEResult<Self> {
        let inner: TfheServerKey = bincode::deserialize(bytes)
            .map_err(|e| FHEError::SerializationError(e.to_string()))?;
        Ok(Self {
            inner,
            config_hash: config_hash(config),
        })
    }
}

impl std::fmt::Debug for ServerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerKey")
            .field("config_hash", &hex::encode(&self.config_hash[..8]))
            .finish()
    }
}

/// Public key used by clients to produce external inputs
#[derive(Clone)]
pub struct PublicKey {
    inner: CompactPublicKey,
}

impl PublicKey {
    pub fn inner(&self) -> &CompactPublicKey {
        &self.inner
    }

    /// Encrypt a clear value into an external input the TFHE backend can expand
    pub fn encrypt_input(&self, value: ClearValue) -> FHEResult<ExternalInput> {
        let ciphertext = match value {
            ClearValue::Uint64(v) => {
                bincode::serialize(&tfhe::CompactFheUint64::encrypt(v, &self.inner))
            }
            ClearValue::Uint8(v) => {
                bincode::serialize(&tfhe::CompactFheUint8::encrypt(v, &self.inner))
            }
            ClearValue::Bool(_) => {
                return Err(FHEError::EncryptionFailed(
                    "boolean inputs are not supported".into(),
                ))
            }
        }
        .map_err(|e| FHEError::SerializationError(e.to_string()))?;

        Ok(ExternalInput::new(value.secure_type(), ciphertext))
    }

    pub fn encrypt_u64(&self, value: u64) -> FHEResult<ExternalInput> {
        self.encrypt_input(ClearValue::Uint64(value))
    }

    pub fn encrypt_u8(&self, value: u8) -> FHEResult<ExternalInput> {
        self.encrypt_input(ClearValue::Uint8(value))
    }

    pub fn to_bytes(&self) -> FHEResult<Vec<u8>> {
        bincode::serialize(&self.inner).map_err(|e| FHEError::SerializationError(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> FHEResult<Self> {
        let inner: CompactPublicKey = bincode::deserialize(bytes)
            .map_err(|e| FHEError::SerializationError(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey").finish()
    }
}

/// Complete key set for one deployment
#[derive(Clone)]
pub struct KeySet {
    pub client: ClientKey,
    pub server: ServerKey,
    pub public: PublicKey,
}

impl KeySet {
    /// Generate a fresh key set
    ///
    /// Slow: expect tens of seconds at 128-bit security.
    pub fn generate(config: &FHEConfig) -> FHEResult<Self> {
        let (client_key, server_key) = generate_keys(tfhe_config(config));
        let public_key = CompactPublicKey::new(&client_key);
        let hash = config_hash(config);

        Ok(Self {
            client: ClientKey {
                inner: client_key,
                config_hash: hash,
            },
            server: ServerKey {
                inner: server_key,
                config_hash: hash,
            },
            public: PublicKey { inner: public_key },
        })
    }
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySet")
            .field("config_hash", &hex::encode(&self.client.config_hash[..8]))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> FHEConfig {
        FHEConfig { security_bits: 64 }
    }

    #[test]
    #[ignore = "TFHE key generation is slow"]
    fn test_key_generation() {
        let config = test_config();
        let keys = KeySet::generate(&config).unwrap();
        assert!(keys.server.verify_config(&config));
        assert!(!keys.server.verify_config(&FHEConfig::default()));
    }

    #[test]
    #[ignore = "TFHE key generation is slow"]
    fn test_public_encryption_tags_type() {
        use crate::handle::SecureType;

        let keys = KeySet::generate(&test_config()).unwrap();
        let input = keys.public.encrypt_u8(2).unwrap();
        assert_eq!(input.value_type, SecureType::Uint8);
        assert!(keys.public.encrypt_input(ClearValue::Bool(true)).is_err());
    }
}
