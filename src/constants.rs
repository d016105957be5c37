//! Constants and configuration names used by the crate.

/// Name of the environment variable that overrides the directory backing the
/// current-user personal certificate store.
///
/// Defaults to `$HOME/.mtls-credential/my` when unset.
pub const USER_STORE_ENV: &str = "MTLS_CREDENTIAL_USER_STORE";

/// Name of the environment variable that overrides the directory backing the
/// machine-wide personal certificate store.
///
/// Defaults to [`DEFAULT_MACHINE_STORE_DIR`] when unset.
pub const MACHINE_STORE_ENV: &str = "MTLS_CREDENTIAL_MACHINE_STORE";

/// Directory under `$HOME` used for the current-user store when [`USER_STORE_ENV`] is unset.
pub const DEFAULT_USER_STORE_SUBDIR: &str = ".mtls-credential/my";

/// Directory used for the machine-wide store when [`MACHINE_STORE_ENV`] is unset.
pub const DEFAULT_MACHINE_STORE_DIR: &str = "/etc/mtls-credential/my";

/// Store name reported in diagnostics for the current-user personal store.
pub const USER_STORE_NAME: &str = "CurrentUser/My";

/// Store name reported in diagnostics for the machine-wide personal store.
pub const MACHINE_STORE_NAME: &str = "LocalMachine/My";

/// Largest credential file (in bytes) that will be read and parsed.
pub const MAX_CREDENTIAL_FILE_BYTES: u64 = 1024 * 1024;
