//! Tracing subscriber setup for binaries and demos embedding the engine.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Variable read for the log filter, e.g. `ROOTSEEK_LOG=rootseek_engine=debug`.
pub const LOG_ENV: &str = "ROOTSEEK_LOG";

static INIT: Once = Once::new();

/// Install a fmt subscriber filtered by [`LOG_ENV`], defaulting to `info`.
///
/// Safe to call more than once; only the first call has an effect, and an
/// already installed global subscriber is left alone.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init_tracing();
        init_tracing();
        tracing::info!("still logging");
    }
}
