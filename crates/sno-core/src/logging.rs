use crate::config::LoggingConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Build the env filter: `RUST_LOG` wins, otherwise `sno=<level>` plus the
/// configured per-module directives.
pub fn build_filter(config: &LoggingConfig) -> anyhow::Result<EnvFilter> {
    let mut filter = EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("sno={}", config.level)),
    );
    for (module, level) in &config.module_filters {
        filter = filter.add_directive(format!("{}={}", module, level).parse()?);
    }
    Ok(filter)
}

/// Initialize the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::registry().with(build_filter(config)?);

    let file = match &config.file_output {
        Some(path) => Some(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?,
        ),
        None => None,
    };

    match config.format.as_str() {
        "json" => {
            let json_layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true);
            let file_layer = file.map(|f| fmt::layer().json().with_writer(f).with_ansi(false));
            subscriber.with(json_layer).with(file_layer).try_init()?;
        }
        "compact" => {
            let compact_layer = fmt::layer()
                .compact()
                .with_target(false)
                .with_line_number(false)
                .with_file(false);
            let file_layer = file.map(|f| fmt::layer().compact().with_writer(f).with_ansi(false));
            subscriber.with(compact_layer).with(file_layer).try_init()?;
        }
        _ => {
            let show_location = matches!(config.level.as_str(), "debug" | "trace");
            let pretty_layer = fmt::layer()
                .with_target(show_location)
                .with_line_number(show_location)
                .with_file(show_location);
            let file_layer = file.map(|f| fmt::layer().with_writer(f).with_ansi(false));
            subscriber.with(pretty_layer).with(file_layer).try_init()?;
        }
    }

    Ok(())
}
