//! TFHE ciphertext backend for the coprocessor
//!
//! TFHE-rs keeps the server key per thread. The backend installs its key
//! lazily on whichever thread first evaluates, and again if that thread
//! has since been handed a different key.

use std::cell::Cell;

use tracing::debug;

use super::ciphertext::FHEValue;
use super::keys::{ClientKey, ServerKey};
use super::operations::FHEOps;
use crate::capability::{CiphertextBackend, ClearValue};
use crate::handle::SecureType;
use crate::input::ExternalInput;
use crate::{FHEError, FHEResult};

thread_local! {
    static INSTALLED_KEY: Cell<Option<[u8; 32]>> = const { Cell::new(None) };
}

pub struct TfheBackend {
    server_key: ServerKey,
    /// Distinguishes backends sharing a thread
    key_id: [u8; 32],
    /// Present only where the key management role runs alongside the engine
    client_key: Option<ClientKey>,
}

impl TfheBackend {
    pub fn new(server_key: ServerKey) -> Self {
        Self {
            server_key,
            key_id: rand::random(),
            client_key: None,
        }
    }

    /// Attach the client key so granted handles can be decrypted
    pub fn with_decryption(mut self, client_key: ClientKey) -> Self {
        self.client_key = Some(client_key);
        self
    }

    pub fn server_key(&self) -> &ServerKey {
        &self.server_key
    }

    fn ensure_installed(&self) {
        INSTALLED_KEY.with(|installed| {
            if installed.get() != Some(self.key_id) {
                debug!(key = %hex::encode(&self.key_id[..8]), "Installing TFHE server key on thread");
                self.server_key.install();
                installed.set(Some(self.key_id));
            }
        });
    }
}

impl CiphertextBackend for TfheBackend {
    type Value = FHEValue;

    fn name(&self) -> &'static str {
        "tfhe"
    }

    fn expand_input(&self, input: &ExternalInput) -> FHEResult<FHEValue> {
        self.ensure_installed();
        FHEValue::expand_compact(input.value_type, &input.ciphertext)
    }

    fn trivial(&self, clear: ClearValue) -> FHEResult<FHEValue> {
        self.ensure_installed();
        Ok(FHEValue::trivial(clear))
    }

    fn value_type(&self, value: &FHEValue) -> SecureType {
        value.secure_type()
    }

    fn add(&self, lhs: &FHEValue, rhs: &FHEValue) -> FHEResult<FHEValue> {
        self.ensure_installed();
        FHEOps::add(lhs, rhs)
    }

    fn gt(&self, lhs: &FHEValue, rhs: &FHEValue) -> FHEResult<FHEValue> {
        self.ensure_installed();
        FHEOps::gt(lhs, rhs)
    }

    fn lt(&self, lhs: &FHEValue, rhs: &FHEValue) -> FHEResult<FHEValue> {
        self.ensure_installed();
        FHEOps::lt(lhs, rhs)
    }

    fn eq(&self, lhs: &FHEValue, rhs: &FHEValue) -> FHEResult<FHEValue> {
        self.ensure_installed();
        FHEOps::eq(lhs, rhs)
    }

    fn and(&self, lhs: &FHEValue, rhs: &FHEValue) -> FHEResult<FHEValue> {
        self.ensure_installed();
        FHEOps::and(lhs, rhs)
    }

    fn or(&self, lhs: &FHEValue, rhs: &FHEValue) -> FHEResult<FHEValue> {
        self.ensure_installed();
        FHEOps::or(lhs, rhs)
    }

    fn select(
        &self,
        cond: &FHEValue,
        if_true: &FHEValue,
        if_false: &FHEValue,
    ) -> FHEResult<FHEValue> {
        self.ensure_installed();
        FHEOps::select(cond, if_true, if_false)
    }

    fn decrypt(&self, value: &FHEValue) -> FHEResult<ClearValue> {
        let key = self.client_key.as_ref().ok_or_else(|| {
            FHEError::DecryptionFailed("no client key attached to this backend".into())
        })?;
        Ok(value.decrypt(key))
    }
}

impl std::fmt::Debug for TfheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TfheBackend")
            .field("key", &hex::encode(&self.key_id[..8]))
            .field("decryption", &self.client_key.is_some())
            .finish()
    }
}
