use std::io::Write as _;
use std::path::{Path, PathBuf};

use kianda_utils::SecretString;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::{CredentialStore, TokenKind, TokenPair};
use crate::error::CredentialError;

const APP_DIR: &str = "kianda";
const FILE_NAME: &str = "credentials.json";

/// On-disk layout, keyed like the web portal's local storage.
#[derive(Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct CredentialDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

impl CredentialDocument {
    fn slot(&mut self, kind: TokenKind) -> &mut Option<String> {
        match kind {
            TokenKind::Access => &mut self.access_token,
            TokenKind::Refresh => &mut self.refresh_token,
        }
    }
}

/// Credential store backed by a JSON file.
///
/// The file is read on every `get`, so a login performed by another process
/// is picked up immediately. Every write replaces the whole file through a
/// temporary file in the same directory; `set_pair` and `clear_all` are a
/// single replace. The file is created with owner-only permissions on Unix.
/// A missing file means no tokens.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    // serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Store at an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store at `<data_dir>/kianda/credentials.json`.
    ///
    /// # Errors
    /// Returns [`CredentialError::NoDataDir`] if the platform has no data directory.
    pub fn default_location() -> Result<Self, CredentialError> {
        Self::default_path().map(Self::new)
    }

    /// `<data_dir>/kianda/credentials.json`, if the platform has a data directory.
    ///
    /// # Errors
    /// Returns [`CredentialError::NoDataDir`] if the platform has no data directory.
    pub fn default_path() -> Result<PathBuf, CredentialError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR).join(FILE_NAME))
            .ok_or(CredentialError::NoDataDir)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CredentialError {
        CredentialError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn load(&self) -> Result<CredentialDocument, CredentialError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => Zeroizing::new(raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CredentialDocument::default());
            }
            Err(e) => return Err(self.io_error(e)),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(CredentialDocument::default());
        }
        serde_json::from_slice(&raw).map_err(|source| CredentialError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, doc: &CredentialDocument) -> Result<(), CredentialError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;

        let bytes = Zeroizing::new(serde_json::to_vec_pretty(doc).map_err(|source| {
            CredentialError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?);

        // NamedTempFile is created 0600 on Unix
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(&bytes).map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        tracing::debug!(path = %self.path.display(), "credential file updated");
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut CredentialDocument)) -> Result<(), CredentialError> {
        let _guard = self.write_lock.lock();
        let mut doc = self.load()?;
        apply(&mut doc);
        self.save(&doc)
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, kind: TokenKind) -> Result<Option<SecretString>, CredentialError> {
        let mut doc = self.load()?;
        Ok(doc.slot(kind).take().map(SecretString::from))
    }

    fn set(&self, kind: TokenKind, token: SecretString) -> Result<(), CredentialError> {
        self.update(|doc| *doc.slot(kind) = Some(token.expose().to_owned()))
    }

    fn clear(&self, kind: TokenKind) -> Result<(), CredentialError> {
        self.update(|doc| *doc.slot(kind) = None)
    }

    fn set_pair(&self, pair: TokenPair) -> Result<(), CredentialError> {
        self.update(|doc| {
            doc.access_token = Some(pair.access.expose().to_owned());
            doc.refresh_token = Some(pair.refresh.expose().to_owned());
        })
    }

    fn clear_all(&self) -> Result<(), CredentialError> {
        let _guard = self.write_lock.lock();
        self.save(&CredentialDocument::default())
    }

    fn replace_access(
        &self,
        used_refresh: &SecretString,
        access: SecretString,
    ) -> Result<bool, CredentialError> {
        let _guard = self.write_lock.lock();
        let mut doc = self.load()?;
        if doc.refresh_token.as_deref() != Some(used_refresh.expose()) {
            return Ok(false);
        }
        doc.access_token = Some(access.expose().to_owned());
        self.save(&doc)?;
        Ok(true)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> FileCredentialStore {
        FileCredentialStore::new(dir.path().join("nested").join(FILE_NAME))
    }

    #[test]
    fn missing_file_means_no_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.get(TokenKind::Access).unwrap().is_none());
        assert!(store.get(TokenKind::Refresh).unwrap().is_none());
    }

    #[test]
    fn pair_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        store_in(&dir).set_pair(TokenPair::new("T1", "R1")).unwrap();

        let reopened = store_in(&dir);
        assert_eq!(
            reopened.get(TokenKind::Access).unwrap().unwrap().expose(),
            "T1"
        );
        assert_eq!(
            reopened.get(TokenKind::Refresh).unwrap().unwrap().expose(),
            "R1"
        );
    }

    #[test]
    fn file_uses_portal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.set_pair(TokenPair::new("T1", "R1")).unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(json["access_token"], "T1");
        assert_eq!(json["refresh_token"], "R1");
    }

    #[test]
    fn set_only_touches_one_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.set_pair(TokenPair::new("T1", "R1")).unwrap();
        store.set(TokenKind::Access, "T2".into()).unwrap();

        assert_eq!(store.get(TokenKind::Access).unwrap().unwrap().expose(), "T2");
        assert_eq!(store.get(TokenKind::Refresh).unwrap().unwrap().expose(), "R1");
    }

    #[test]
    fn replace_access_after_logout_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.set_pair(TokenPair::new("T1", "R1")).unwrap();
        assert!(store.replace_access(&"R1".into(), "T2".into()).unwrap());
        assert_eq!(store.get(TokenKind::Access).unwrap().unwrap().expose(), "T2");

        store.clear_all().unwrap();
        assert!(!store.replace_access(&"R1".into(), "T3".into()).unwrap());
        assert!(store.get(TokenKind::Access).unwrap().is_none());
        assert!(store.get(TokenKind::Refresh).unwrap().is_none());
    }

    #[test]
    fn clear_all_removes_both() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.set_pair(TokenPair::new("T1", "R1")).unwrap();
        store.clear_all().unwrap();

        assert!(!store.has_session().unwrap());
        assert!(store.path().exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join(FILE_NAME));
        std::fs::write(store.path(), b"not json").unwrap();

        assert!(matches!(
            store.get(TokenKind::Access),
            Err(CredentialError::Corrupt { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.set(TokenKind::Access, "T1".into()).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
