//! Tracing configuration and initialization.

use tracing_subscriber::util::{SubscriberInitExt as _, TryInitError};
use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber.
///
/// The filter comes from `SRVFS_LOG`, falling back to `RUST_LOG`, falling
/// back to `info`.
pub fn init() -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_env("SRVFS_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .finish()
        .try_init()
}
