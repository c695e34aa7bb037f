//! Credential persistence.
//!
//! A [`CredentialStore`] holds at most one access token and one refresh token.
//! Two-key operations ([`set_pair`](CredentialStore::set_pair),
//! [`clear_all`](CredentialStore::clear_all) and
//! [`replace_access`](CredentialStore::replace_access)) are atomic in every
//! store this crate ships, so readers never observe one token without the
//! other after a login, a renewal or a failed renewal.

mod file;
mod memory;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

use kianda_utils::SecretString;

use crate::error::CredentialError;

/// Which of the two stored credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Short-lived bearer credential attached to every request.
    Access,
    /// Longer-lived credential used only for renewal.
    Refresh,
}

/// Access and refresh token written together on login.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: SecretString,
    pub refresh: SecretString,
}

impl TokenPair {
    #[must_use]
    pub fn new(access: impl Into<SecretString>, refresh: impl Into<SecretString>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

/// Storage for the access/refresh token pair.
///
/// Implementations must be cheap to call on every request; `get` runs once
/// per outbound request and twice more on a 401.
pub trait CredentialStore: Send + Sync {
    /// Read a token. `Ok(None)` when it is not stored.
    ///
    /// # Errors
    /// Returns [`CredentialError`] if the backing storage cannot be read.
    fn get(&self, kind: TokenKind) -> Result<Option<SecretString>, CredentialError>;

    /// Overwrite a token.
    ///
    /// # Errors
    /// Returns [`CredentialError`] if the backing storage cannot be written.
    fn set(&self, kind: TokenKind, token: SecretString) -> Result<(), CredentialError>;

    /// Remove a token. Removing an absent token is not an error.
    ///
    /// # Errors
    /// Returns [`CredentialError`] if the backing storage cannot be written.
    fn clear(&self, kind: TokenKind) -> Result<(), CredentialError>;

    /// Store both tokens.
    ///
    /// The provided implementation writes them one after the other; stores
    /// that can do better override it.
    ///
    /// # Errors
    /// Returns [`CredentialError`] if the backing storage cannot be written.
    fn set_pair(&self, pair: TokenPair) -> Result<(), CredentialError> {
        let TokenPair { access, refresh } = pair;
        self.set(TokenKind::Access, access)?;
        self.set(TokenKind::Refresh, refresh)
    }

    /// Remove both tokens.
    ///
    /// # Errors
    /// Returns [`CredentialError`] if the backing storage cannot be written.
    fn clear_all(&self) -> Result<(), CredentialError> {
        self.clear(TokenKind::Access)?;
        self.clear(TokenKind::Refresh)
    }

    /// Store `access` only if the stored refresh token is still `used_refresh`.
    ///
    /// Returns `false`, leaving the store untouched, when the refresh token
    /// was cleared or replaced in the meantime. The provided implementation
    /// reads then writes; stores that can do better override it.
    ///
    /// # Errors
    /// Returns [`CredentialError`] if the backing storage cannot be read or written.
    fn replace_access(
        &self,
        used_refresh: &SecretString,
        access: SecretString,
    ) -> Result<bool, CredentialError> {
        match self.get(TokenKind::Refresh)? {
            Some(current) if current.expose() == used_refresh.expose() => {
                self.set(TokenKind::Access, access)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// `true` if both tokens are stored.
    ///
    /// # Errors
    /// Returns [`CredentialError`] if the backing storage cannot be read.
    fn has_session(&self) -> Result<bool, CredentialError> {
        Ok(self.get(TokenKind::Access)?.is_some() && self.get(TokenKind::Refresh)?.is_some())
    }
}
