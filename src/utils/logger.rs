use crate::config::toml_config::LogFormat;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "course_registry=debug,info"
    } else {
        "course_registry=info,warn"
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `verbose` when set.
pub fn init_logger(format: LogFormat, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let layer = tracing_subscriber::fmt::layer()
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Compact => registry.with(layer.with_target(false).compact()).init(),
        // One object per line for log shippers.
        LogFormat::Json => registry.with(layer.with_target(true).json()).init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_raises_crate_level_only() {
        assert_eq!(default_directive(true), "course_registry=debug,info");
        assert_eq!(default_directive(false), "course_registry=info,warn");
        assert!(EnvFilter::try_new(default_directive(true)).is_ok());
    }
}
