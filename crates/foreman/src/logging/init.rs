//! Subscriber installation.

use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Output profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable output, `foreman=debug` unless `RUST_LOG` says otherwise.
    Development,
    /// JSON lines, `foreman=info` unless `RUST_LOG` says otherwise.
    Production,
    /// A bare registry. Tests that assert on events install their own layer.
    Test,
}

impl Profile {
    fn default_filter(&self) -> &'static str {
        match self {
            Profile::Development => "foreman=debug,foreman_domain=debug",
            Profile::Production | Profile::Test => "foreman=info,foreman_domain=info",
        }
    }
}

static INIT_ONCE: Once = Once::new();

/// Installs the global subscriber for `profile`.
///
/// Only the first call has any effect. If another subscriber is already
/// installed the call is a no-op.
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(profile.default_filter()));
        let installed = match profile {
            Profile::Development => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .finish()
                .try_init(),
            Profile::Production => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .finish()
                .try_init(),
            Profile::Test => tracing_subscriber::registry().try_init(),
        };
        if installed.is_err() {
            tracing::debug!(
                component = module_path!(),
                op = "init_logging",
                "subscriber already installed"
            );
        }
    });
}
