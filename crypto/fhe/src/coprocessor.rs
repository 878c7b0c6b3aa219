//! Handle-addressed coprocessor
//!
//! Owns every ciphertext the host has produced or admitted, enforces the
//! access lists, and delegates arithmetic to a [`CiphertextBackend`].

use std::collections::HashMap;

use tracing::debug;

use crate::acl::AccessControlList;
use crate::capability::{CiphertextBackend, ClearValue, SecureCompute};
use crate::handle::{Account, Handle, HandleDeriver, SecureType};
use crate::input::{ExternalInput, InputProof, InputVerifier};
use crate::{FHEError, FHEResult};

pub struct Coprocessor<B: CiphertextBackend> {
    host: Account,
    backend: B,
    values: HashMap<Handle, B::Value>,
    acl: AccessControlList,
    deriver: HandleDeriver,
    verifier: InputVerifier,
    /// Undo log of the open transaction
    created: Vec<Handle>,
    granted: Vec<(Handle, Account)>,
    released: Vec<Handle>,
    tx_start: u64,
}

impl<B: CiphertextBackend> Coprocessor<B> {
    pub fn new(host: Account, backend: B, verifier: InputVerifier) -> Self {
        Self {
            host,
            backend,
            values: HashMap::new(),
            acl: AccessControlList::new(),
            deriver: HandleDeriver::new(host),
            verifier,
            created: Vec::new(),
            granted: Vec::new(),
            released: Vec::new(),
            tx_start: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn acl(&self) -> &AccessControlList {
        &self.acl
    }

    /// Number of stored ciphertexts
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Number of handles allocated, including the open transaction's
    pub fn handles_allocated(&self) -> u64 {
        self.deriver.counter()
    }

    /// Decrypt `handle` on behalf of `requester`
    ///
    /// Only accounts holding a persistent grant may recover the plaintext.
    pub fn user_decrypt(&self, handle: Handle, requester: Account) -> FHEResult<ClearValue> {
        if !self.acl.is_allowed(&handle, &requester) {
            return Err(FHEError::AccessDenied {
                handle: handle.to_hex(),
                account: requester.to_hex(),
            });
        }
        let value = self
            .values
            .get(&handle)
            .ok_or_else(|| FHEError::UnknownHandle(handle.to_hex()))?;
        self.backend.decrypt(value)
    }

    fn store(&mut self, op: &str, parts: &[&[u8]], value: B::Value) -> Handle {
        let ty = self.backend.value_type(&value);
        let handle = self.deriver.next(op, parts, ty);
        self.values.insert(handle, value);
        self.acl.allow_transient(handle);
        self.created.push(handle);
        debug!(op, handle = %handle, backend = self.backend.name(), "Stored secure value");
        handle
    }

    fn operand(&self, handle: Handle) -> FHEResult<(&B::Value, SecureType)> {
        let ty = handle
            .secure_type()
            .ok_or_else(|| FHEError::UnknownHandle(handle.to_hex()))?;
        let value = self
            .values
            .get(&handle)
            .ok_or_else(|| FHEError::UnknownHandle(handle.to_hex()))?;
        if !self.acl.is_usable_by(&handle, &self.host) {
            return Err(FHEError::AccessDenied {
                handle: handle.to_hex(),
                account: self.host.to_hex(),
            });
        }
        Ok((value, ty))
    }

    fn binary_operands(
        &self,
        lhs: Handle,
        rhs: Handle,
        allowed: &[SecureType],
    ) -> FHEResult<(B::Value, B::Value)> {
        let (a, ta) = self.operand(lhs)?;
        let (b, tb) = self.operand(rhs)?;
        if !allowed.contains(&ta) {
            return Err(FHEError::TypeMismatch { expected: allowed[0], got: ta });
        }
        if ta != tb {
            return Err(FHEError::TypeMismatch { expected: ta, got: tb });
        }
        Ok((a.clone(), b.clone()))
    }
}

const INTEGERS: &[SecureType] = &[SecureType::Uint64, SecureType::Uint8];
const ANY: &[SecureType] = &[SecureType::Uint64, SecureType::Uint8, SecureType::Bool];
const BOOLS: &[SecureType] = &[SecureType::Bool];

impl<B: CiphertextBackend> SecureCompute for Coprocessor<B> {
    fn host(&self) -> Account {
        self.host
    }

    fn verify_input(
        &mut self,
        input: &ExternalInput,
        proof: &InputProof,
        sender: Account,
    ) -> FHEResult<Handle> {
        self.verifier.verify(input, proof, &self.host, &sender)?;

        let value = self.backend.expand_input(input)?;
        let got = self.backend.value_type(&value);
        if got != input.value_type {
            return Err(FHEError::TypeMismatch { expected: input.value_type, got });
        }

        let ct_hash = blake3::hash(&input.ciphertext);
        Ok(self.store("input", &[sender.as_bytes(), ct_hash.as_bytes()], value))
    }

    fn trivial_u64(&mut self, value: u64) -> FHEResult<Handle> {
        let v = self.backend.trivial(ClearValue::Uint64(value))?;
        Ok(self.store("trivial", &[&value.to_le_bytes()], v))
    }

    fn trivial_u8(&mut self, value: u8) -> FHEResult<Handle> {
        let v = self.backend.trivial(ClearValue::Uint8(value))?;
        Ok(self.store("trivial", &[&[value]], v))
    }

    fn add(&mut self, lhs: Handle, rhs: Handle) -> FHEResult<Handle> {
        let (a, b) = self.binary_operands(lhs, rhs, INTEGERS)?;
        let v = self.backend.add(&a, &b)?;
        Ok(self.store("add", &[lhs.as_bytes(), rhs.as_bytes()], v))
    }

    fn gt(&mut self, lhs: Handle, rhs: Handle) -> FHEResult<Handle> {
        let (a, b) = self.binary_operands(lhs, rhs, INTEGERS)?;
        let v = self.backend.gt(&a, &b)?;
        Ok(self.store("gt", &[lhs.as_bytes(), rhs.as_bytes()], v))
    }

    fn lt(&mut self, lhs: Handle, rhs: Handle) -> FHEResult<Handle> {
        let (a, b) = self.binary_operands(lhs, rhs, INTEGERS)?;
        let v = self.backend.lt(&a, &b)?;
        Ok(self.store("lt", &[lhs.as_bytes(), rhs.as_bytes()], v))
    }

    fn eq(&mut self, lhs: Handle, rhs: Handle) -> FHEResult<Handle> {
        let (a, b) = self.binary_operands(lhs, rhs, ANY)?;
        let v = self.backend.eq(&a, &b)?;
        Ok(self.store("eq", &[lhs.as_bytes(), rhs.as_bytes()], v))
    }

    fn and(&mut self, lhs: Handle, rhs: Handle) -> FHEResult<Handle> {
        let (a, b) = self.binary_operands(lhs, rhs, BOOLS)?;
        let v = self.backend.and(&a, &b)?;
        Ok(self.store("and", &[lhs.as_bytes(), rhs.as_bytes()], v))
    }

    fn or(&mut self, lhs: Handle, rhs: Handle) -> FHEResult<Handle> {
        let (a, b) = self.binary_operands(lhs, rhs, BOOLS)?;
        let v = self.backend.or(&a, &b)?;
        Ok(self.store("or", &[lhs.as_bytes(), rhs.as_bytes()], v))
    }

    fn select(&mut self, cond: Handle, if_true: Handle, if_false: Handle) -> FHEResult<Handle> {
        let (c, tc) = self.operand(cond)?;
        if tc != SecureType::Bool {
            return Err(FHEError::TypeMismatch { expected: SecureType::Bool, got: tc });
        }
        let c = c.clone();
        let (a, b) = self.binary_operands(if_true, if_false, ANY)?;
        let v = self.backend.select(&c, &a, &b)?;
        Ok(self.store(
            "select",
            &[cond.as_bytes(), if_true.as_bytes(), if_false.as_bytes()],
            v,
        ))
    }

    fn allow(&mut self, handle: Handle, account: Account) -> FHEResult<()> {
        // Only values the host may itself use can be shared onward
        self.operand(handle)?;
        if !self.acl.is_allowed(&handle, &account) {
            self.acl.allow(handle, account);
            self.granted.push((handle, account));
        }
        Ok(())
    }

    fn is_allowed(&self, handle: Handle, account: Account) -> bool {
        self.acl.is_allowed(&handle, &account)
    }

    fn release(&mut self, handle: Handle) -> FHEResult<()> {
        if !self.values.contains_key(&handle) {
            return Err(FHEError::UnknownHandle(handle.to_hex()));
        }
        if !self.released.contains(&handle) {
            self.released.push(handle);
        }
        Ok(())
    }

    fn end_transaction(&mut self, commit: bool) {
        if commit {
            for handle in &self.released {
                self.acl.remove(handle);
                self.values.remove(handle);
            }
            let before = self.values.len();
            for handle in &self.created {
                if !self.acl.has_grants(handle) {
                    self.values.remove(handle);
                }
            }
            debug!(
                released = self.released.len(),
                freed = before - self.values.len(),
                "Freed unreferenced secure values"
            );
        } else {
            for (handle, account) in self.granted.iter().rev() {
                self.acl.revoke(handle, account);
            }
            for handle in &self.created {
                self.values.remove(handle);
            }
            self.deriver.rewind(self.tx_start);
            debug!(discarded = self.created.len(), "Rolled back secure values");
        }
        self.created.clear();
        self.granted.clear();
        self.released.clear();
        self.tx_start = self.deriver.counter();
        self.acl.clear_transient();
    }
}

impl<B: CiphertextBackend> std::fmt::Debug for Coprocessor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coprocessor")
            .field("host", &self.host)
            .field("backend", &self.backend.name())
            .field("values", &self.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clear::{ClearBackend, ClearInput};
    use crate::input::InputAttestor;

    const HOST: Account = Account::ZERO;

    fn host() -> Account {
        Account::repeat(0xEE)
    }

    fn setup() -> (Coprocessor<ClearBackend>, InputAttestor) {
        let attestor = InputAttestor::from_seed([5u8; 32]);
        let verifier = InputVerifier::new()
            .with_attestor(attestor.verifying_key())
            .unwrap();
        (Coprocessor::new(host(), ClearBackend, verifier), attestor)
    }

    #[test]
    fn test_select_is_oblivious_to_caller() {
        let (mut cp, _) = setup();
        let a = cp.trivial_u64(10).unwrap();
        let b = cp.trivial_u64(3).unwrap();
        let zero = cp.trivial_u64(0).unwrap();

        let cond = cp.gt(a, b).unwrap();
        let picked = cp.select(cond, a, zero).unwrap();
        cp.allow_this(picked).unwrap();

        assert_eq!(
            cp.user_decrypt(picked, host()).unwrap(),
            ClearValue::Uint64(10)
        );
    }

    #[test]
    fn test_operands_expire_with_transaction() {
        let (mut cp, _) = setup();
        let a = cp.trivial_u64(1).unwrap();
        let kept = cp.trivial_u64(2).unwrap();
        cp.allow_this(kept).unwrap();
        cp.end_transaction(true);

        // `a` was never granted, so the commit freed it
        let err = cp.add(a, kept).unwrap_err();
        assert!(matches!(err, FHEError::UnknownHandle(_)));
        assert!(cp.add(kept, kept).is_ok());
    }

    #[test]
    fn test_rollback_discards_transaction() {
        let (mut cp, _) = setup();
        let alice = Account::repeat(1);
        let kept = cp.trivial_u64(2).unwrap();
        cp.allow(kept, alice).unwrap();
        cp.end_transaction(true);
        let allocated = cp.handles_allocated();

        let dropped = cp.add(kept, kept).unwrap();
        cp.allow(dropped, alice).unwrap();
        cp.end_transaction(false);

        assert_eq!(cp.handles_allocated(), allocated);
        assert_eq!(cp.value_count(), 1);
        assert!(!cp.is_allowed(dropped, alice));
        assert!(cp.is_allowed(kept, alice));

        // The next allocation reuses the rolled back slot
        let again = cp.add(kept, kept).unwrap();
        assert_eq!(again, dropped);
    }

    #[test]
    fn test_commit_frees_unreferenced_values() {
        let (mut cp, _) = setup();
        let alice = Account::repeat(1);
        let old = cp.trivial_u64(1).unwrap();
        cp.allow(old, alice).unwrap();
        cp.end_transaction(true);
        assert_eq!(cp.value_count(), 1);

        let step = cp.trivial_u64(2).unwrap();
        let new = cp.add(old, step).unwrap();
        cp.allow(new, alice).unwrap();
        cp.release(old).unwrap();
        cp.end_transaction(true);

        // Only the granted result survives
        assert_eq!(cp.value_count(), 1);
        assert_eq!(cp.user_decrypt(new, alice).unwrap(), ClearValue::Uint64(3));
        assert!(!cp.is_allowed(old, alice));
        assert!(matches!(cp.user_decrypt(step, alice), Err(FHEError::AccessDenied { .. })));
        assert!(matches!(cp.release(old), Err(FHEError::UnknownHandle(_))));
    }

    #[test]
    fn test_rollback_keeps_released_value() {
        let (mut cp, _) = setup();
        let alice = Account::repeat(1);
        let kept = cp.trivial_u64(9).unwrap();
        cp.allow(kept, alice).unwrap();
        cp.end_transaction(true);

        cp.release(kept).unwrap();
        cp.end_transaction(false);

        assert_eq!(cp.value_count(), 1);
        assert_eq!(cp.user_decrypt(kept, alice).unwrap(), ClearValue::Uint64(9));
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let (mut cp, _) = setup();
        let a = cp.trivial_u64(1).unwrap();
        let b = cp.trivial_u8(1).unwrap();
        assert!(matches!(
            cp.add(a, b).unwrap_err(),
            FHEError::TypeMismatch { .. }
        ));

        let flag = cp.eq(a, a).unwrap();
        assert!(cp.and(a, flag).is_err());
    }

    #[test]
    fn test_user_decrypt_requires_grant() {
        let (mut cp, _) = setup();
        let alice = Account::repeat(1);
        let h = cp.trivial_u64(42).unwrap();

        assert!(cp.user_decrypt(h, alice).is_err());
        cp.allow(h, alice).unwrap();
        assert_eq!(cp.user_decrypt(h, alice).unwrap().as_u64(), Some(42));
        assert!(cp.user_decrypt(h, HOST).is_err());
    }

    #[test]
    fn test_verify_input_checks_declared_type() {
        let (mut cp, attestor) = setup();
        let alice = Account::repeat(1);

        // Declared Uint8 but carries a u64 payload
        let input = ExternalInput::new(SecureType::Uint8, ClearInput::Uint64(7).encode());
        let proof = attestor.attest(&input, &host(), &alice);
        assert!(cp.verify_input(&input, &proof, alice).is_err());

        let input = ClearInput::Uint8(2).into_external();
        let proof = attestor.attest(&input, &host(), &alice);
        let h = cp.verify_input(&input, &proof, alice).unwrap();
        assert_eq!(h.secure_type(), Some(SecureType::Uint8));
    }
}
