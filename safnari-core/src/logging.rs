//! Logger initialization. A named external-collaborator concern per spec §1
//! ("logger initialization" is out of scope as a platform/telemetry
//! integration), but the ambient `tracing` wiring itself is carried like the
//! rest of the pack does it.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber. `verbosity` is additive: 0 is
/// warn-level, each further step drops to info, debug, then trace. Safe to
/// call once; subsequent calls are no-ops.
pub fn init(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
