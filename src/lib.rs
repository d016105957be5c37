#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

//! This crate resolves and owns the client certificate a process presents when
//! authenticating to a remote service over mutual TLS.
//!
//! It separates *where* the credential comes from (a file protected by a
//! passphrase, a certificate store searched by thumbprint, or a credential the
//! caller already holds) from *how* it is used by the connection layer. The
//! primary entry points are [`CertificateSource`], which describes where the
//! credential comes from, and [`CredentialHandle`], which binds a resolved
//! [`ClientCredential`] to the source that produced it.
//!
//! ```no_run
//! use mtls_credential::{CertificateSource, CredentialHandle, SecretBuffer};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let secret = SecretBuffer::from("passphrase");
//! let handle = CredentialHandle::new(CertificateSource::file("client.pem", secret))?;
//!
//! let credential = handle.certificate();
//! println!("{} ({})", handle.describe(), credential.thumbprint());
//!
//! // A failover connection gets its own handle; the file is read again and the
//! // passphrase is copied, not shared.
//! let failover = handle.duplicate()?;
//!
//! handle.release();
//! assert!(failover.certificate().has_private_key());
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **`logging`** (default): diagnostics are emitted through the `log` crate.
//! - **`tracing`**: diagnostics are emitted as `tracing` events instead.
//!
//! Neither feature ever receives secret material; only source descriptions
//! (`file=...`, `thumbprint=...`) and store names are logged.

mod observability;
mod prelude;

pub mod cert;
pub mod constants;
pub mod error;
pub mod handle;
pub mod secret;
pub mod source;
pub mod store;

// -----------------------
// Re-exports
// -----------------------

pub use crate::{
    cert::{ClientCredential, Thumbprint},
    error::{CredentialError, LoadErrorKind},
    handle::CredentialHandle,
    secret::SecretBuffer,
    source::CertificateSource,
    store::{CertificateStore, DirectoryStore, StoreEntry, StoreError, StoreSession},
};
