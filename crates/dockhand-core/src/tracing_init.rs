//! Tracing subscriber setup for the daemon binary.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_filter` (e.g. `"dockhand_daemon=info"`).
/// An unparsable `RUST_LOG` falls back to `default_filter` and is reported
/// once the subscriber is up. `log_json` selects JSON lines over the
/// human-readable format.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    let env = std::env::var("RUST_LOG").ok();
    let (filter, rejected) = resolve_filter(env.as_deref(), default_filter);
    let registry = tracing_subscriber::registry().with(filter);
    if log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    if let Some(reason) = rejected {
        tracing::warn!(default_filter, "Ignoring invalid RUST_LOG: {reason}");
    }
}

/// Pick the filter: `env` when it parses, else `default_filter`. The second
/// element carries the parse error of a rejected `env`.
fn resolve_filter(env: Option<&str>, default_filter: &str) -> (EnvFilter, Option<String>) {
    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => match EnvFilter::try_new(directives) {
            Ok(filter) => (filter, None),
            Err(e) => (
                EnvFilter::new(default_filter),
                Some(format!("{directives:?}: {e}")),
            ),
        },
        None => (EnvFilter::new(default_filter), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_env_filter_is_used() {
        let (_, rejected) = resolve_filter(Some("dockhand_daemon=debug,hyper=warn"), "info");
        assert!(rejected.is_none());
    }

    #[test]
    fn blank_env_uses_default() {
        assert!(resolve_filter(None, "dockhand_daemon=info").1.is_none());
        assert!(resolve_filter(Some("  "), "dockhand_daemon=info").1.is_none());
    }

    #[test]
    fn invalid_env_falls_back_and_reports() {
        let (_, rejected) = resolve_filter(Some("dockhand_daemon=loud"), "dockhand_daemon=info");
        let reason = rejected.unwrap_or_default();
        assert!(reason.contains("dockhand_daemon=loud"), "{reason}");
    }
}
