//! FHE Error types

use thiserror::Error;

use crate::handle::SecureType;

/// Errors that can occur during FHE operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FHEError {
    /// Key generation failed
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Invalid ciphertext
    #[error("Invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    /// Input proof did not verify against the trusted attestors
    #[error("Invalid input proof: {0}")]
    InvalidInputProof(String),

    /// Handle refers to no stored value
    #[error("Unknown handle: {0}")]
    UnknownHandle(String),

    /// Operand type does not match what the operation expects
    #[error("Type mismatch: expected {expected:?}, got {got:?}")]
    TypeMismatch { expected: SecureType, got: SecureType },

    /// Handle is not usable by the requesting account
    #[error("Access denied on handle {handle} for {account}")]
    AccessDenied { handle: String, account: String },

    /// Homomorphic operation failed
    #[error("Homomorphic operation failed: {0}")]
    OperationFailed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Invalid key
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl FHEError {
    /// Whether this error rejects a caller-supplied external input
    pub fn is_input_rejection(&self) -> bool {
        matches!(
            self,
            FHEError::InvalidInputProof(_)
                | FHEError::InvalidCiphertext(_)
                | FHEError::TypeMismatch { .. }
        )
    }
}
