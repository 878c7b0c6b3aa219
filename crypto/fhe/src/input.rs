//! External inputs and their proofs
//!
//! A client encrypts a value off-engine and obtains an attestation from the
//! input proof service. The attestation binds the ciphertext to the host it is
//! destined for, the sender, and the declared type, so a ciphertext cannot be
//! replayed by another account or under another type.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::handle::{Account, SecureType};
use crate::{FHEError, FHEResult};

/// Domain separator for input attestations
const INPUT_DOMAIN: &[u8] = b"veilcast/input/v1";

/// Ciphertext supplied by a caller, with its declared type
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalInput {
    pub value_type: SecureType,
    pub ciphertext: Vec<u8>,
}

impl ExternalInput {
    pub fn new(value_type: SecureType, ciphertext: Vec<u8>) -> Self {
        Self { value_type, ciphertext }
    }

    /// Digest covered by the input proof
    pub fn attestation_digest(&self, host: &Account, sender: &Account) -> [u8; 32] {
        let ct_hash = blake3::hash(&self.ciphertext);

        let mut hasher = blake3::Hasher::new();
        hasher.update(INPUT_DOMAIN);
        hasher.update(host.as_bytes());
        hasher.update(sender.as_bytes());
        hasher.update(&[self.value_type.tag()]);
        hasher.update(ct_hash.as_bytes());
        *hasher.finalize().as_bytes()
    }
}

impl std::fmt::Debug for ExternalInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalInput")
            .field("type", &self.value_type)
            .field("size", &self.ciphertext.len())
            .finish()
    }
}

/// Attestation over an [`ExternalInput`]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputProof {
    /// Verifying key of the attestor
    pub attestor: [u8; 32],
    /// ed25519 signature over the attestation digest
    pub signature: Vec<u8>,
}

/// Signing side of the input proof service
pub struct InputAttestor {
    signing_key: SigningKey,
}

impl InputAttestor {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn verifying_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Attest that `input` was produced by `sender` for `host`
    pub fn attest(&self, input: &ExternalInput, host: &Account, sender: &Account) -> InputProof {
        let digest = input.attestation_digest(host, sender);
        let signature = self.signing_key.sign(&digest);
        InputProof {
            attestor: self.verifying_key(),
            signature: signature.to_bytes().to_vec(),
        }
    }
}

impl std::fmt::Debug for InputAttestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputAttestor")
            .field("key", &hex::encode(&self.verifying_key()[..8]))
            .finish()
    }
}

/// Verifying side: the set of trusted attestors
#[derive(Clone, Debug, Default)]
pub struct InputVerifier {
    trusted: Vec<VerifyingKey>,
}

impl InputVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attestor(mut self, key: [u8; 32]) -> FHEResult<Self> {
        self.trust(key)?;
        Ok(self)
    }

    pub fn trust(&mut self, key: [u8; 32]) -> FHEResult<()> {
        let vk = VerifyingKey::from_bytes(&key)
            .map_err(|e| FHEError::InvalidKey(e.to_string()))?;
        if !self.trusted.contains(&vk) {
            self.trusted.push(vk);
        }
        Ok(())
    }

    pub fn attestor_count(&self) -> usize {
        self.trusted.len()
    }

    /// Check `proof` over `input` for the given host and sender
    pub fn verify(
        &self,
        input: &ExternalInput,
        proof: &InputProof,
        host: &Account,
        sender: &Account,
    ) -> FHEResult<()> {
        let vk = self
            .trusted
            .iter()
            .find(|vk| vk.to_bytes() == proof.attestor)
            .ok_or_else(|| FHEError::InvalidInputProof("untrusted attestor".into()))?;

        let sig_bytes: [u8; 64] = proof
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| FHEError::InvalidInputProof("malformed signature".into()))?;
        let signature = Signature::from_bytes(&sig_bytes);

        let digest = input.attestation_digest(host, sender);
        vk.verify(&digest, &signature)
            .map_err(|_| FHEError::InvalidInputProof("signature mismatch".into()))
    }
}
