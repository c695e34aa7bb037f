use std::collections::HashMap;

use kianda_utils::SecretString;
use parking_lot::RwLock;

use super::{CredentialStore, TokenKind, TokenPair};
use crate::error::CredentialError;

/// In-process credential store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tokens: RwLock<HashMap<TokenKind, SecretString>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a token pair.
    #[must_use]
    pub fn with_pair(pair: TokenPair) -> Self {
        let mut tokens = HashMap::with_capacity(2);
        tokens.insert(TokenKind::Access, pair.access);
        tokens.insert(TokenKind::Refresh, pair.refresh);
        Self {
            tokens: RwLock::new(tokens),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, kind: TokenKind) -> Result<Option<SecretString>, CredentialError> {
        Ok(self.tokens.read().get(&kind).cloned())
    }

    fn set(&self, kind: TokenKind, token: SecretString) -> Result<(), CredentialError> {
        self.tokens.write().insert(kind, token);
        Ok(())
    }

    fn clear(&self, kind: TokenKind) -> Result<(), CredentialError> {
        self.tokens.write().remove(&kind);
        Ok(())
    }

    fn set_pair(&self, pair: TokenPair) -> Result<(), CredentialError> {
        let mut tokens = self.tokens.write();
        tokens.insert(TokenKind::Access, pair.access);
        tokens.insert(TokenKind::Refresh, pair.refresh);
        Ok(())
    }

    fn clear_all(&self) -> Result<(), CredentialError> {
        self.tokens.write().clear();
        Ok(())
    }

    fn replace_access(
        &self,
        used_refresh: &SecretString,
        access: SecretString,
    ) -> Result<bool, CredentialError> {
        let mut tokens = self.tokens.write();
        let current = tokens
            .get(&TokenKind::Refresh)
            .is_some_and(|stored| stored.expose() == used_refresh.expose());
        if current {
            tokens.insert(TokenKind::Access, access);
        }
        Ok(current)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn exposed(store: &MemoryCredentialStore, kind: TokenKind) -> Option<String> {
        store
            .get(kind)
            .unwrap()
            .map(|t| t.expose().to_owned())
    }

    #[test]
    fn empty_store_has_no_tokens() {
        let store = MemoryCredentialStore::new();
        assert!(store.get(TokenKind::Access).unwrap().is_none());
        assert!(!store.has_session().unwrap());
    }

    #[test]
    fn set_get_clear() {
        let store = MemoryCredentialStore::new();
        store.set(TokenKind::Access, "T1".into()).unwrap();
        assert_eq!(exposed(&store, TokenKind::Access).as_deref(), Some("T1"));

        store.set(TokenKind::Access, "T2".into()).unwrap();
        assert_eq!(exposed(&store, TokenKind::Access).as_deref(), Some("T2"));

        store.clear(TokenKind::Access).unwrap();
        assert!(exposed(&store, TokenKind::Access).is_none());
        // clearing twice is fine
        store.clear(TokenKind::Access).unwrap();
    }

    #[test]
    fn pair_and_clear_all() {
        let store = MemoryCredentialStore::new();
        store.set_pair(TokenPair::new("T1", "R1")).unwrap();
        assert!(store.has_session().unwrap());
        assert_eq!(exposed(&store, TokenKind::Refresh).as_deref(), Some("R1"));

        store.clear_all().unwrap();
        assert!(exposed(&store, TokenKind::Access).is_none());
        assert!(exposed(&store, TokenKind::Refresh).is_none());
    }

    #[test]
    fn replace_access_requires_the_same_refresh_token() {
        let store = MemoryCredentialStore::with_pair(TokenPair::new("T1", "R1"));
        assert!(store.replace_access(&"R1".into(), "T2".into()).unwrap());
        assert_eq!(exposed(&store, TokenKind::Access).as_deref(), Some("T2"));

        store.set_pair(TokenPair::new("T3", "R3")).unwrap();
        assert!(!store.replace_access(&"R1".into(), "T4".into()).unwrap());
        assert_eq!(exposed(&store, TokenKind::Access).as_deref(), Some("T3"));

        store.clear_all().unwrap();
        assert!(!store.replace_access(&"R3".into(), "T5".into()).unwrap());
        assert!(exposed(&store, TokenKind::Access).is_none());
    }

    #[test]
    fn concurrent_writers_never_leave_partial_pair() {
        let store = Arc::new(MemoryCredentialStore::with_pair(TokenPair::new("T0", "R0")));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        if i % 2 == 0 {
                            store.clear_all().unwrap();
                        } else {
                            store.set_pair(TokenPair::new("T", "R")).unwrap();
                        }
                        let snapshot = store.tokens.read();
                        assert_eq!(
                            snapshot.contains_key(&TokenKind::Access),
                            snapshot.contains_key(&TokenKind::Refresh)
                        );
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
