use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Maps a configured level name onto a filter level. Unknown names log at info.
pub fn normalize_level(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}

fn default_directives(level: &str) -> String {
    format!(
        "warn,pvc_plumber={level},pvc_plumber_backends={level},pvc_plumber_core={level}",
        level = normalize_level(level)
    )
}

/// JSON logs on stdout. `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let subscriber = FmtSubscriber::builder()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Setting default subscriber failed")
}
