//! Where a client credential comes from.
//!
//! [`CertificateSource`] has one variant per supply strategy. Each variant
//! knows how to resolve a fresh [`ClientCredential`], how to duplicate itself
//! without sharing state with the original, and how to release whatever
//! sensitive material it holds.

use crate::cert::ClientCredential;
use crate::cert::Thumbprint;
use crate::constants::MAX_CREDENTIAL_FILE_BYTES;
use crate::error::{CredentialError, LoadErrorKind};
use crate::prelude::debug;
use crate::secret::SecretBuffer;
use crate::store::{self, default_stores, CertificateStore};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zeroize::Zeroizing;

const DATA_DESCRIPTION: &str = "data";

/// The strategy that supplies a client credential.
///
/// Exactly one variant is active. Variants are immutable after construction,
/// apart from [`CertificateSource::release`].
#[derive(Debug)]
pub enum CertificateSource {
    /// A credential file unlocked with a secret.
    File(FileSource),
    /// A credential looked up by thumbprint across an ordered list of stores.
    Store(StoreSource),
    /// A credential the caller already holds; the source keeps a private copy.
    InMemory(InMemorySource),
}

impl CertificateSource {
    /// A PEM or DER credential file whose private key is unlocked with `secret`.
    ///
    /// The source takes ownership of the secret and zeroizes it on release.
    pub fn file(path: impl Into<PathBuf>, secret: SecretBuffer) -> Self {
        CertificateSource::File(FileSource {
            path: path.into(),
            secret,
        })
    }

    /// A credential looked up by thumbprint in the [default stores](store::default_stores):
    /// the current-user personal store, then the machine-wide personal store.
    pub fn store(thumbprint: impl Into<String>) -> Self {
        Self::store_in(thumbprint, default_stores())
    }

    /// A credential looked up by thumbprint in `stores`, searched in order.
    pub fn store_in(thumbprint: impl Into<String>, stores: Vec<Arc<dyn CertificateStore>>) -> Self {
        CertificateSource::Store(StoreSource {
            thumbprint: thumbprint.into(),
            stores,
        })
    }

    /// A credential the caller already holds. The source keeps its own copy, so
    /// the caller remains free to drop `credential`.
    pub fn in_memory(credential: &ClientCredential) -> Self {
        CertificateSource::InMemory(InMemorySource {
            thumbprint: credential.thumbprint().clone(),
            credential: Some(credential.clone()),
        })
    }

    /// Decodes credential bytes the caller already holds, e.g. the content of a
    /// credential file obtained out of band, into an in-memory source.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Load`] if the data cannot be decoded or the
    /// secret does not unlock the key.
    pub fn from_pem_data(
        data: &[u8],
        secret: Option<&SecretBuffer>,
    ) -> Result<Self, CredentialError> {
        if secret.is_some_and(SecretBuffer::is_released) {
            return Err(CredentialError::load(
                DATA_DESCRIPTION,
                LoadErrorKind::SecretReleased,
            ));
        }
        let credential = ClientCredential::from_pem(data, secret)
            .map_err(|e| CredentialError::load(DATA_DESCRIPTION, e))?;

        Ok(CertificateSource::InMemory(InMemorySource {
            thumbprint: credential.thumbprint().clone(),
            credential: Some(credential),
        }))
    }

    /// Materializes the credential.
    ///
    /// Every call reflects the current state of the file or stores.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::Load`] if the file is missing, unreadable or
    ///   malformed, the secret does not unlock the key, every store fails to
    ///   open, or the source was released.
    /// - [`CredentialError::NotFound`] if no store holds the thumbprint.
    pub fn resolve(&self) -> Result<ClientCredential, CredentialError> {
        debug!("Resolving client certificate; source={}", self);
        match self {
            CertificateSource::File(source) => source.resolve(),
            CertificateSource::Store(source) => source.resolve(),
            CertificateSource::InMemory(source) => source.resolve(),
        }
    }

    /// Returns an independent source of the same variant.
    ///
    /// The file variant copies its secret into a new buffer, the store variant
    /// copies its thumbprint and store list, and the in-memory variant copies
    /// its credential. Releasing either source does not affect the other.
    pub fn duplicate(&self) -> Self {
        match self {
            CertificateSource::File(source) => CertificateSource::File(source.duplicate()),
            CertificateSource::Store(source) => CertificateSource::Store(source.duplicate()),
            CertificateSource::InMemory(source) => {
                CertificateSource::InMemory(source.duplicate())
            }
        }
    }

    /// Releases sensitive material: the file variant zeroizes its secret, the
    /// in-memory variant drops its credential, the store variant holds nothing.
    ///
    /// Idempotent. Dropping the source has the same effect.
    pub fn release(&mut self) {
        match self {
            CertificateSource::File(source) => source.release(),
            CertificateSource::Store(_) => {}
            CertificateSource::InMemory(source) => source.release(),
        }
    }

    /// A label for diagnostics that never includes the secret, e.g.
    /// `file=client.pem` or `thumbprint=2C40...`.
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CertificateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateSource::File(source) => write!(f, "file={}", source.path.display()),
            CertificateSource::Store(source) => write!(f, "thumbprint={}", source.thumbprint),
            CertificateSource::InMemory(source) => write!(f, "thumbprint={}", source.thumbprint),
        }
    }
}

/// A credential file plus the secret that unlocks its private key.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    secret: SecretBuffer,
}

impl FileSource {
    /// Returns the path of the credential file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn resolve(&self) -> Result<ClientCredential, CredentialError> {
        let description = || format!("file={}", self.path.display());

        if self.secret.is_released() {
            return Err(CredentialError::load(
                description(),
                LoadErrorKind::SecretReleased,
            ));
        }

        let data =
            read_credential_file(&self.path).map_err(|e| CredentialError::load(description(), e))?;
        ClientCredential::from_pem(&data, Some(&self.secret))
            .map_err(|e| CredentialError::load(description(), e))
    }

    fn duplicate(&self) -> Self {
        Self {
            path: self.path.clone(),
            secret: self.secret.duplicate(),
        }
    }

    fn release(&mut self) {
        self.secret.release();
    }
}

/// A thumbprint and the ordered stores to search for it.
#[derive(Debug, Clone)]
pub struct StoreSource {
    thumbprint: String,
    stores: Vec<Arc<dyn CertificateStore>>,
}

impl StoreSource {
    /// Returns the thumbprint being looked up.
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    /// Returns the names of the configured stores, in search order.
    pub fn store_names(&self) -> Vec<&str> {
        self.stores.iter().map(|store| store.name()).collect()
    }

    fn resolve(&self) -> Result<ClientCredential, CredentialError> {
        let description = format!("thumbprint={}", self.thumbprint);
        store::find(&self.thumbprint, &self.stores).into_resolution(&self.thumbprint, &description)
    }

    fn duplicate(&self) -> Self {
        self.clone()
    }
}

/// A private copy of a credential supplied by the caller.
#[derive(Debug)]
pub struct InMemorySource {
    thumbprint: Thumbprint,
    credential: Option<ClientCredential>,
}

impl InMemorySource {
    /// Returns the thumbprint of the held credential.
    pub fn thumbprint(&self) -> &Thumbprint {
        &self.thumbprint
    }

    fn resolve(&self) -> Result<ClientCredential, CredentialError> {
        self.credential.clone().ok_or_else(|| {
            CredentialError::load(
                format!("thumbprint={}", self.thumbprint),
                LoadErrorKind::Released,
            )
        })
    }

    fn duplicate(&self) -> Self {
        Self {
            thumbprint: self.thumbprint.clone(),
            credential: self.credential.clone(),
        }
    }

    fn release(&mut self) {
        self.credential = None;
    }
}

/// Reads a credential file of at most [`MAX_CREDENTIAL_FILE_BYTES`] bytes.
///
/// The buffer is allocated once at its full size, so a file that grows while it
/// is read never causes a reallocation that would leave a copy behind. It is
/// zeroized on drop since it may contain key material.
pub(crate) fn read_credential_file(path: &Path) -> Result<Zeroizing<Vec<u8>>, LoadErrorKind> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() > MAX_CREDENTIAL_FILE_BYTES {
        return Err(LoadErrorKind::FileTooLarge {
            max: MAX_CREDENTIAL_FILE_BYTES,
        });
    }

    let mut data = Zeroizing::new(vec![0u8; MAX_CREDENTIAL_FILE_BYTES as usize + 1]);
    let mut filled = 0;
    loop {
        match file.read(&mut data[filled..]) {
            Ok(0) => break,
            Ok(n) => {
                filled += n;
                if filled as u64 > MAX_CREDENTIAL_FILE_BYTES {
                    return Err(LoadErrorKind::FileTooLarge {
                        max: MAX_CREDENTIAL_FILE_BYTES,
                    });
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    data.truncate(filled);

    Ok(data)
}
