//! Ownership of a resolved client credential.

use crate::cert::ClientCredential;
use crate::error::CredentialError;
use crate::prelude::debug;
use crate::source::CertificateSource;
use std::fmt;

/// Binds one resolved [`ClientCredential`] to the [`CertificateSource`] that
/// produced it.
///
/// A handle either exists with both parts populated or was never created.
/// Keeping the source lets [`CredentialHandle::duplicate`] produce a new,
/// independent handle (for a failover or parallel connection) without the
/// caller supplying the path, secret or thumbprint again.
///
/// Dropping the handle, or calling [`CredentialHandle::release`], releases the
/// credential and then the source.
#[derive(Debug)]
pub struct CredentialHandle {
    // Fields drop in declaration order: credential first, then source.
    credential: ClientCredential,
    source: CertificateSource,
}

impl CredentialHandle {
    /// Resolves `source` once and takes ownership of it and of the result.
    ///
    /// The source is always consumed. If resolution fails it is released
    /// before the error is returned.
    ///
    /// # Errors
    ///
    /// Propagates the [`CredentialError`] returned by [`CertificateSource::resolve`].
    pub fn new(mut source: CertificateSource) -> Result<Self, CredentialError> {
        match source.resolve() {
            Ok(credential) => {
                debug!(
                    "Client certificate resolved; source={}, thumbprint={}",
                    source,
                    credential.thumbprint()
                );
                Ok(Self { credential, source })
            }
            Err(e) => {
                source.release();
                Err(e)
            }
        }
    }

    /// Creates an independent handle by duplicating the source and resolving it
    /// again.
    ///
    /// The new handle shares no state with this one; either can be released
    /// or used on another thread without affecting the other.
    ///
    /// # Errors
    ///
    /// Propagates the [`CredentialError`] returned by the new resolution, which
    /// reflects the current state of the file or stores.
    pub fn duplicate(&self) -> Result<Self, CredentialError> {
        debug!("Duplicating client certificate handle; source={}", self.source);
        Self::new(self.source.duplicate())
    }

    /// Returns the resolved credential.
    pub fn certificate(&self) -> &ClientCredential {
        &self.credential
    }

    /// Returns the source the credential was resolved from.
    pub fn source(&self) -> &CertificateSource {
        &self.source
    }

    /// A label for diagnostics, forwarded from [`CertificateSource::describe`].
    pub fn describe(&self) -> String {
        self.source.describe()
    }

    /// Releases the credential, then the source.
    ///
    /// Consuming `self` rules out a second release.
    pub fn release(self) {
        debug!("Releasing client certificate handle; source={}", self.source);
        drop(self);
    }
}

impl fmt::Display for CredentialHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::SecretBuffer;
    use crate::store::{CertificateStore, StoreEntry, StoreError, StoreSession};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const OTHER_PEM: &[u8] = include_bytes!("../tests/testdata/other.pem");

    #[derive(Debug, Default)]
    struct CountingStore {
        entries: Vec<StoreEntry>,
        opened: AtomicUsize,
    }

    struct CountingSession<'a>(&'a CountingStore);

    impl StoreSession for CountingSession<'_> {
        fn entries(&mut self) -> Result<Vec<StoreEntry>, StoreError> {
            Ok(self.0.entries.clone())
        }
    }

    impl CertificateStore for CountingStore {
        fn name(&self) -> &str {
            "counting"
        }

        fn open(&self) -> Result<Box<dyn StoreSession + '_>, StoreError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingSession(self)))
        }
    }

    #[test]
    fn test_new_resolves_exactly_once() {
        let credential = ClientCredential::from_pem(OTHER_PEM, None).unwrap();
        let store = Arc::new(CountingStore {
            entries: vec![StoreEntry::new(credential.clone())],
            ..CountingStore::default()
        });
        let source = CertificateSource::store_in(
            credential.thumbprint().to_string(),
            vec![store.clone() as Arc<dyn CertificateStore>],
        );

        let handle = CredentialHandle::new(source).unwrap();
        assert_eq!(store.opened.load(Ordering::SeqCst), 1);
        assert_eq!(handle.certificate(), &credential);

        let duplicate = handle.duplicate().unwrap();
        assert_eq!(store.opened.load(Ordering::SeqCst), 2);
        assert_eq!(duplicate.certificate(), &credential);
    }

    #[test]
    fn test_new_failure_produces_no_handle() {
        let source = CertificateSource::file("does/not/exist.pem", SecretBuffer::from("test123"));

        let err = CredentialHandle::new(source).unwrap_err();
        assert!(matches!(err, CredentialError::Load { .. }));
        assert_eq!(
            err.to_string(),
            "failed to get client certificate from file=does/not/exist.pem"
        );
    }

    #[test]
    fn test_display_forwards_to_source() {
        let credential = ClientCredential::from_pem(OTHER_PEM, None).unwrap();
        let handle = CredentialHandle::new(CertificateSource::in_memory(&credential)).unwrap();

        assert_eq!(
            handle.describe(),
            format!("thumbprint={}", credential.thumbprint())
        );
        assert_eq!(handle.to_string(), handle.describe());
    }

    #[test]
    fn test_handle_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CredentialHandle>();
        assert_send_sync::<CertificateSource>();
        assert_send_sync::<SecretBuffer>();
    }
}
