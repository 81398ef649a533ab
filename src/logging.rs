//! Logging configuration with journald support on Linux.
//!
//! Sets up tracing-based logging. With a log directory configured, events
//! go to a daily rolling file; otherwise journald is tried on Linux and
//! stderr is the fallback.

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system.
///
/// Log level can be controlled via the `NATURELOG_LOG` environment variable
/// using `EnvFilter` directives, e.g. `NATURELOG_LOG=debug` or
/// `NATURELOG_LOG=naturelog=debug,tower_http=info`. Defaults to `info`.
pub fn init(log_dir: Option<PathBuf>) -> Result<()> {
    let env_filter = EnvFilter::try_from_env("NATURELOG_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(log_dir) = log_dir {
        std::fs::create_dir_all(&log_dir)?;

        let file_appender = tracing_appender::rolling::daily(&log_dir, "naturelog.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // The worker flushes until the guard drops; keep it for the process lifetime.
        static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
            std::sync::OnceLock::new();
        let _ = GUARD.set(guard);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
            .try_init()?;

        tracing::info!("Logging initialized with file backend at {:?}", log_dir);
        return Ok(());
    }

    #[cfg(target_os = "linux")]
    {
        // Only use journald when running under systemd
        if std::env::var_os("JOURNAL_STREAM").is_some() {
            if let Ok(journald_layer) = tracing_journald::layer() {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(journald_layer)
                    .try_init()?;

                tracing::info!("Logging initialized with journald backend");
                return Ok(());
            }
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    Ok(())
}
