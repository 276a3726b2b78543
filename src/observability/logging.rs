//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for the binaries
//! - Honour `RUST_LOG` first, then the configured level
//!
//! # Design Decisions
//! - The library only emits events; installing a subscriber is the host's call
//! - Initialization is idempotent so tests and binaries can both call it

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global fmt subscriber. `default_directive` is used when
/// `RUST_LOG` is unset, e.g. `"liveconf=info"`.
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive.into());
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Filter directive for a bare level such as `"debug"`, scoped to this crate.
pub fn directive_for(level: &str) -> String {
    format!("liveconf={level},kv_import={level}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_for_level() {
        assert_eq!(directive_for("warn"), "liveconf=warn,kv_import=warn");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init("liveconf=debug");
        init("liveconf=info");
    }
}
