// Internal logging facade.
// Provides `debug!`, `info!` and `warn!` macros backed by
// either `tracing`, `log`, or no-op depending on enabled features.

#[allow(unused_imports, reason = "not every macro is used in every module")]
pub(crate) use crate::observability::{log_debug as debug, log_info as info, log_warn as warn};
