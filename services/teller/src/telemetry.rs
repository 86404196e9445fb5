use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging with JSON formatting (configurable via env)
///
/// `LOG_FORMAT=json` (the default) emits one JSON object per event; anything else
/// gives human-readable lines. Filtering follows `RUST_LOG`, defaulting to `teller=info`.
/// Both may come from `.env`, which is loaded here before either is read.
pub fn init_tracing() -> bool {
    dotenvy::dotenv().ok();

    let use_json = wants_json(std::env::var("LOG_FORMAT").ok().as_deref());

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "teller=info".into());

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    use_json
}

fn wants_json(log_format: Option<&str>) -> bool {
    log_format.map_or(true, |format| format.trim().eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_selection() {
        assert!(wants_json(None));
        assert!(wants_json(Some("json")));
        assert!(wants_json(Some(" JSON ")));
        assert!(!wants_json(Some("text")));
        assert!(!wants_json(Some("")));
    }
}
