//! Certificate stores and the thumbprint scanner.
//!
//! A [`CertificateStore`] is a read-only capability: it can be opened, its
//! entries enumerated, and the resulting [`StoreSession`] closed. [`find`]
//! searches an ordered list of stores and returns the first credential whose
//! thumbprint matches. The list itself is configuration; [`default_stores`]
//! returns the conventional current-user then machine-wide order.

use crate::cert::ClientCredential;
use crate::error::{CredentialError, LoadErrorKind, UnavailableStore};
use crate::prelude::{debug, info, warn};
use std::fmt;
use std::io;
use std::sync::Arc;
use thiserror::Error;

mod directory;

pub use directory::{default_stores, DirectoryStore};

/// A source of fingerprinted credentials, such as a platform certificate
/// store, an HSM-backed keychain, or a test double.
///
/// Implementations must be shareable across threads; the scanner only ever
/// reads from them.
pub trait CertificateStore: Send + Sync + fmt::Debug {
    /// Name used in diagnostics and errors, e.g. `CurrentUser/My`.
    fn name(&self) -> &str;

    /// Opens the store read-only.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store is absent or not accessible.
    fn open(&self) -> Result<Box<dyn StoreSession + '_>, StoreError>;
}

/// An open, read-only view of a [`CertificateStore`].
pub trait StoreSession {
    /// Enumerates the entries of the store.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the entries cannot be listed.
    fn entries(&mut self) -> Result<Vec<StoreEntry>, StoreError>;

    /// Releases whatever the session holds. The scanner calls this exactly
    /// once per opened session, whether or not a match was found.
    fn close(&mut self) {}
}

/// A credential held by a store, indexed by thumbprint.
#[derive(Debug, Clone)]
pub struct StoreEntry {
    thumbprint: String,
    credential: ClientCredential,
}

impl StoreEntry {
    /// Creates an entry indexed by the credential's own thumbprint.
    pub fn new(credential: ClientCredential) -> Self {
        Self {
            thumbprint: credential.thumbprint().to_string(),
            credential,
        }
    }

    /// Creates an entry indexed by a thumbprint reported by the store.
    ///
    /// Entries with an empty thumbprint are never matched.
    pub fn with_thumbprint(thumbprint: impl Into<String>, credential: ClientCredential) -> Self {
        Self {
            thumbprint: thumbprint.into(),
            credential,
        }
    }

    /// Returns the thumbprint the entry is indexed by.
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    /// Returns the credential.
    pub fn credential(&self) -> &ClientCredential {
        &self.credential
    }

    /// Consumes the entry and returns the credential.
    pub fn into_credential(self) -> ClientCredential {
        self.credential
    }
}

/// Errors reported by a [`CertificateStore`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The store is absent or not accessible.
    #[error("store could not be opened")]
    Open(#[source] io::Error),

    /// The store was opened but its entries could not be listed.
    #[error("store entries could not be enumerated")]
    Enumerate(#[source] io::Error),
}

/// Outcome of a [`find`] over an ordered list of stores.
#[derive(Debug, Default)]
pub struct ScanReport {
    credential: Option<ClientCredential>,
    searched: Vec<String>,
    unavailable: Vec<UnavailableStore>,
}

impl ScanReport {
    /// Returns the matching credential, if any.
    pub fn credential(&self) -> Option<&ClientCredential> {
        self.credential.as_ref()
    }

    /// Consumes the report and returns the matching credential, if any.
    pub fn into_credential(self) -> Option<ClientCredential> {
        self.credential
    }

    /// Names of the stores that were opened and searched, in order.
    pub fn searched(&self) -> &[String] {
        &self.searched
    }

    /// Stores that were skipped because they could not be opened or listed.
    pub fn unavailable(&self) -> &[UnavailableStore] {
        &self.unavailable
    }

    /// Maps the report to the result of resolving a store-backed source.
    ///
    /// A match wins. Otherwise, if at least one store was searched the lookup
    /// is `NotFound`; if every configured store was unavailable it is a `Load`
    /// error naming each of them.
    pub(crate) fn into_resolution(
        self,
        thumbprint: &str,
        description: &str,
    ) -> Result<ClientCredential, CredentialError> {
        if let Some(credential) = self.credential {
            return Ok(credential);
        }

        if self.searched.is_empty() && !self.unavailable.is_empty() {
            return Err(CredentialError::load(
                description,
                LoadErrorKind::StoresUnavailable {
                    failures: self.unavailable,
                },
            ));
        }

        Err(CredentialError::NotFound {
            thumbprint: thumbprint.to_owned(),
            searched: self.searched,
        })
    }
}

/// Searches `stores` in order for a credential whose thumbprint matches
/// `thumbprint`, ignoring ASCII case.
///
/// Stops at the first match: later stores are never opened. A store that
/// cannot be opened or listed is skipped and recorded in
/// [`ScanReport::unavailable`]. Every session that was opened is closed before
/// this function returns.
pub fn find(thumbprint: &str, stores: &[Arc<dyn CertificateStore>]) -> ScanReport {
    let mut report = ScanReport::default();

    for store in stores {
        match search_store(store.as_ref(), thumbprint) {
            Ok(found) => {
                report.searched.push(store.name().to_owned());
                if let Some(credential) = found {
                    info!(
                        "Found client certificate in store; store={}, thumbprint={}",
                        store.name(),
                        thumbprint
                    );
                    report.credential = Some(credential);
                    break;
                }
                debug!(
                    "No matching certificate in store; store={}, thumbprint={}",
                    store.name(),
                    thumbprint
                );
            }
            Err(error) => {
                warn!(
                    "Skipping certificate store; store={}, error={}",
                    store.name(),
                    error
                );
                report.unavailable.push(UnavailableStore {
                    name: store.name().to_owned(),
                    error,
                });
            }
        }
    }

    report
}

fn search_store(
    store: &dyn CertificateStore,
    thumbprint: &str,
) -> Result<Option<ClientCredential>, StoreError> {
    let mut session = OpenSession(store.open()?);
    let entries = session.0.entries()?;

    Ok(entries
        .into_iter()
        .filter(|entry| !entry.thumbprint.is_empty())
        .find(|entry| entry.thumbprint.eq_ignore_ascii_case(thumbprint))
        .map(StoreEntry::into_credential))
}

/// Closes the wrapped session when dropped, on every exit path.
struct OpenSession<'a>(Box<dyn StoreSession + 'a>);

impl Drop for OpenSession<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const OTHER_PEM: &[u8] = include_bytes!("../../tests/testdata/other.pem");
    const CLIENT_CRT: &[u8] = include_bytes!("../../tests/testdata/client.crt");

    /// In-memory store that counts opens and closes.
    #[derive(Debug, Default)]
    struct StubStore {
        name: &'static str,
        entries: Vec<StoreEntry>,
        fail_open: bool,
        fail_enumerate: bool,
        opened: AtomicUsize,
        closed: Arc<AtomicUsize>,
    }

    impl StubStore {
        fn with_entries(name: &'static str, entries: Vec<StoreEntry>) -> Self {
            Self {
                name,
                entries,
                ..Self::default()
            }
        }

        fn failing_open(name: &'static str) -> Self {
            Self {
                name,
                fail_open: true,
                ..Self::default()
            }
        }
    }

    struct StubSession<'a> {
        store: &'a StubStore,
    }

    impl StoreSession for StubSession<'_> {
        fn entries(&mut self) -> Result<Vec<StoreEntry>, StoreError> {
            if self.store.fail_enumerate {
                return Err(StoreError::Enumerate(io::Error::other("listing failed")));
            }
            Ok(self.store.entries.clone())
        }

        fn close(&mut self) {
            self.store.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl CertificateStore for StubStore {
        fn name(&self) -> &str {
            self.name
        }

        fn open(&self) -> Result<Box<dyn StoreSession + '_>, StoreError> {
            if self.fail_open {
                return Err(StoreError::Open(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "access denied",
                )));
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StubSession { store: self }))
        }
    }

    fn other_credential() -> ClientCredential {
        ClientCredential::from_pem(OTHER_PEM, None).unwrap()
    }

    fn client_certificate() -> ClientCredential {
        ClientCredential::from_pem(CLIENT_CRT, None).unwrap()
    }

    #[test]
    fn test_first_store_match_skips_later_stores() {
        let credential = other_credential();
        let thumbprint = credential.thumbprint().to_string();

        let first = Arc::new(StubStore::with_entries(
            "first",
            vec![StoreEntry::new(credential.clone())],
        ));
        let second = Arc::new(StubStore::with_entries(
            "second",
            vec![StoreEntry::new(credential.clone())],
        ));
        let stores: Vec<Arc<dyn CertificateStore>> = vec![first.clone(), second.clone()];

        let report = find(&thumbprint.to_lowercase(), &stores);

        assert_eq!(report.credential(), Some(&credential));
        assert_eq!(report.searched(), ["first".to_owned()]);
        assert_eq!(first.opened.load(Ordering::SeqCst), 1);
        assert_eq!(first.closed.load(Ordering::SeqCst), 1);
        assert_eq!(second.opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_first_match_within_store_wins() {
        let credential = other_credential();
        let decoy = client_certificate();
        let thumbprint = credential.thumbprint().to_string();

        let store = Arc::new(StubStore::with_entries(
            "only",
            vec![
                StoreEntry::new(decoy),
                StoreEntry::with_thumbprint("", credential.clone()),
                StoreEntry::new(credential.clone()),
            ],
        ));
        let stores: Vec<Arc<dyn CertificateStore>> = vec![store];

        let found = find(&thumbprint, &stores).into_credential().unwrap();
        assert_eq!(found, credential);
    }

    #[test]
    fn test_no_match_closes_every_store() {
        let first = Arc::new(StubStore::with_entries(
            "first",
            vec![StoreEntry::new(client_certificate())],
        ));
        let second = Arc::new(StubStore::with_entries("second", Vec::new()));
        let stores: Vec<Arc<dyn CertificateStore>> = vec![first.clone(), second.clone()];

        let report = find("0000000000000000000000000000000000000000", &stores);

        assert!(report.credential().is_none());
        assert_eq!(report.searched(), ["first".to_owned(), "second".to_owned()]);
        assert_eq!(first.closed.load(Ordering::SeqCst), 1);
        assert_eq!(second.closed.load(Ordering::SeqCst), 1);

        let err = report
            .into_resolution("0000000000000000000000000000000000000000", "thumbprint=0000")
            .unwrap_err();
        match err {
            CredentialError::NotFound { searched, .. } => {
                assert_eq!(searched, vec!["first".to_owned(), "second".to_owned()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unavailable_store_is_skipped() {
        let credential = other_credential();
        let thumbprint = credential.thumbprint().to_string();

        let broken = Arc::new(StubStore::failing_open("broken"));
        let good = Arc::new(StubStore::with_entries(
            "good",
            vec![StoreEntry::new(credential.clone())],
        ));
        let stores: Vec<Arc<dyn CertificateStore>> = vec![broken, good];

        let report = find(&thumbprint, &stores);

        assert_eq!(report.credential(), Some(&credential));
        assert_eq!(report.unavailable().len(), 1);
        assert_eq!(report.unavailable()[0].name, "broken");
    }

    #[test]
    fn test_enumerate_failure_still_closes_session() {
        let store = Arc::new(StubStore {
            name: "flaky",
            fail_enumerate: true,
            ..StubStore::default()
        });
        let stores: Vec<Arc<dyn CertificateStore>> = vec![store.clone()];

        let report = find("ABCD", &stores);

        assert!(report.searched().is_empty());
        assert_eq!(report.unavailable().len(), 1);
        assert_eq!(store.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_all_stores_unavailable_is_load_error() {
        let stores: Vec<Arc<dyn CertificateStore>> = vec![
            Arc::new(StubStore::failing_open("a")),
            Arc::new(StubStore::failing_open("b")),
        ];

        let err = find("ABCD", &stores)
            .into_resolution("ABCD", "thumbprint=ABCD")
            .unwrap_err();

        match err.load_kind() {
            Some(LoadErrorKind::StoresUnavailable { failures }) => {
                let names: Vec<_> = failures.iter().map(|f| f.name.as_str()).collect();
                assert_eq!(names, ["a", "b"]);
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "failed to get client certificate from thumbprint=ABCD"
        );
    }

    #[test]
    fn test_empty_store_list_is_not_found() {
        let err = find("ABCD", &[])
            .into_resolution("ABCD", "thumbprint=ABCD")
            .unwrap_err();
        assert!(matches!(err, CredentialError::NotFound { searched, .. } if searched.is_empty()));
    }
}
