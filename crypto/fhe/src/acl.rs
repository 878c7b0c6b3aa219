//! Access control lists for secure values
//!
//! Persistent grants survive across invocations and are what the user
//! decryption workflow consults. Transient grants cover intermediate results
//! inside one invocation and are dropped by [`AccessControlList::clear_transient`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::handle::{Account, Handle};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccessControlList {
    persistent: BTreeMap<Handle, BTreeSet<Account>>,
    #[serde(skip)]
    transient: HashSet<Handle>,
}

impl AccessControlList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persistently allow `account` to use and decrypt `handle`
    pub fn allow(&mut self, handle: Handle, account: Account) {
        self.persistent.entry(handle).or_default().insert(account);
    }

    pub fn revoke(&mut self, handle: &Handle, account: &Account) {
        if let Some(accounts) = self.persistent.get_mut(handle) {
            accounts.remove(account);
            if accounts.is_empty() {
                self.persistent.remove(handle);
            }
        }
    }

    /// Drop every persistent grant on `handle`
    pub fn remove(&mut self, handle: &Handle) {
        self.persistent.remove(handle);
    }

    /// Whether any account holds a persistent grant on `handle`
    pub fn has_grants(&self, handle: &Handle) -> bool {
        self.persistent.contains_key(handle)
    }

    /// Allow the host to use `handle` until the current invocation ends
    pub fn allow_transient(&mut self, handle: Handle) {
        self.transient.insert(handle);
    }

    pub fn is_allowed(&self, handle: &Handle, account: &Account) -> bool {
        self.persistent
            .get(handle)
            .map(|accounts| accounts.contains(account))
            .unwrap_or(false)
    }

    /// Whether `host` may use `handle` as an operand right now
    pub fn is_usable_by(&self, handle: &Handle, host: &Account) -> bool {
        self.transient.contains(handle) || self.is_allowed(handle, host)
    }

    /// Accounts holding a persistent grant on `handle`
    pub fn grantees(&self, handle: &Handle) -> Vec<Account> {
        self.persistent
            .get(handle)
            .map(|accounts| accounts.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn clear_transient(&mut self) {
        self.transient.clear();
    }

    pub fn transient_len(&self) -> usize {
        self.transient.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistent_grant() {
        let mut acl = AccessControlList::new();
        let h = Handle::from_bytes([3u8; 32]);
        let alice = Account::repeat(1);
        let bob = Account::repeat(2);

        acl.allow(h, alice);
        assert!(acl.is_allowed(&h, &alice));
        assert!(!acl.is_allowed(&h, &bob));
        assert_eq!(acl.grantees(&h), vec![alice]);

        acl.allow(h, bob);
        acl.revoke(&h, &alice);
        assert_eq!(acl.grantees(&h), vec![bob]);
        assert!(acl.has_grants(&h));

        acl.remove(&h);
        assert!(acl.grantees(&h).is_empty());
        assert!(!acl.has_grants(&h));
    }

    #[test]
    fn test_transient_grant_is_cleared() {
        let mut acl = AccessControlList::new();
        let h = Handle::from_bytes([4u8; 32]);
        let host = Account::repeat(9);

        acl.allow_transient(h);
        assert!(acl.is_usable_by(&h, &host));
        // Transient grants never authorize decryption
        assert!(!acl.is_allowed(&h, &host));

        acl.clear_transient();
        assert!(!acl.is_usable_by(&h, &host));
    }
}
