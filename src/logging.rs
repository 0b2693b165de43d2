//! Tracing setup for the `fa` binary.
//!
//! Log output goes to stderr so reports and plots on stdout stay pipeable.
//! The filter is read from `FA_LOG` (also honored from a `.env` file), e.g.
//! `FA_LOG=fa_binding=debug`.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable holding the tracing filter directive.
pub const LOG_ENV: &str = "FA_LOG";

const DEFAULT_FILTER: &str = "fa_binding=warn";

static INIT: Once = Once::new();

/// Install the global subscriber. Safe to call more than once.
pub fn init() {
    INIT.call_once(|| {
        let _ = dotenvy::dotenv();
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .with(filter)
            .try_init();
    });
}
