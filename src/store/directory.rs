use crate::cert::ClientCredential;
use crate::constants::{
    DEFAULT_MACHINE_STORE_DIR, DEFAULT_USER_STORE_SUBDIR, MACHINE_STORE_ENV, MACHINE_STORE_NAME,
    USER_STORE_ENV, USER_STORE_NAME,
};
use crate::error::LoadErrorKind;
use crate::prelude::debug;
use crate::source::read_credential_file;
use crate::store::{CertificateStore, StoreEntry, StoreError, StoreSession};
use std::env;
use std::ffi::OsString;
use std::fs::{self, ReadDir};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CREDENTIAL_EXTENSIONS: &[&str] = &["pem", "crt", "cer"];

/// A certificate store backed by a directory of credential files.
///
/// Every `*.pem`, `*.crt` or `*.cer` file directly inside the directory is one
/// entry: a certificate chain, optionally followed by an unencrypted PKCS#8
/// key. Files that cannot be parsed are skipped. Entries are listed in file
/// name order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryStore {
    name: String,
    // None when no location could be determined; such a store never opens.
    dir: Option<PathBuf>,
}

impl DirectoryStore {
    /// Creates a store named `name` over the directory `dir`.
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: Some(dir.into()),
        }
    }

    /// The current-user personal store.
    ///
    /// Located at `$MTLS_CREDENTIAL_USER_STORE` if set, otherwise at
    /// `$HOME/.mtls-credential/my`. If neither variable is set the store has no
    /// location and fails to open, so searches skip it.
    pub fn current_user() -> Self {
        Self {
            name: USER_STORE_NAME.to_owned(),
            dir: user_store_dir(env::var_os(USER_STORE_ENV), env::var_os("HOME")),
        }
    }

    /// The machine-wide personal store.
    ///
    /// Located at `$MTLS_CREDENTIAL_MACHINE_STORE` if set, otherwise at
    /// `/etc/mtls-credential/my`.
    pub fn local_machine() -> Self {
        let dir = env::var_os(MACHINE_STORE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MACHINE_STORE_DIR));
        Self::new(MACHINE_STORE_NAME, dir)
    }

    /// Returns the directory backing the store, if one could be determined.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }
}

impl CertificateStore for DirectoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<Box<dyn StoreSession + '_>, StoreError> {
        let dir = self.dir.as_deref().ok_or_else(|| {
            StoreError::Open(io::Error::new(
                io::ErrorKind::NotFound,
                "store directory is not configured",
            ))
        })?;
        let reader = fs::read_dir(dir).map_err(StoreError::Open)?;
        Ok(Box::new(DirectorySession {
            store: self,
            reader: Some(reader),
        }))
    }
}

/// The stores searched by [`CertificateSource::store`](crate::CertificateSource::store):
/// the current-user personal store, then the machine-wide personal store.
pub fn default_stores() -> Vec<Arc<dyn CertificateStore>> {
    vec![
        Arc::new(DirectoryStore::current_user()),
        Arc::new(DirectoryStore::local_machine()),
    ]
}

fn user_store_dir(overridden: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    overridden
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            home.filter(|home| !home.is_empty())
                .map(|home| PathBuf::from(home).join(DEFAULT_USER_STORE_SUBDIR))
        })
}

struct DirectorySession<'a> {
    store: &'a DirectoryStore,
    reader: Option<ReadDir>,
}

impl StoreSession for DirectorySession<'_> {
    fn entries(&mut self) -> Result<Vec<StoreEntry>, StoreError> {
        let reader = self
            .reader
            .take()
            .ok_or_else(|| StoreError::Enumerate(io::Error::other("store session already read")))?;

        let mut paths = Vec::new();
        for entry in reader {
            let path = entry.map_err(StoreError::Enumerate)?.path();
            if has_credential_extension(&path) && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            match load_entry(&path) {
                Ok(entry) => entries.push(entry),
                Err(error) => debug!(
                    "Skipping store entry; store={}, path={}, error={}",
                    self.store.name,
                    path.display(),
                    error
                ),
            }
        }

        Ok(entries)
    }

    fn close(&mut self) {
        self.reader = None;
    }
}

fn has_credential_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            CREDENTIAL_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

fn load_entry(path: &Path) -> Result<StoreEntry, LoadErrorKind> {
    let data = read_credential_file(path)?;
    let credential = ClientCredential::from_pem(&data, None)?;
    Ok(StoreEntry::new(credential))
}
