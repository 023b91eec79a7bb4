use tracing::{Subscriber, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, fmt, fmt::MakeWriter};

use crate::config::{LogFormat, LoggingConfig};

/// Installs the global tracing subscriber. Events go to stderr so command
/// output on stdout stays clean.
///
/// Returns the configured level. A second call is a no-op, which keeps tests
/// that share a process from panicking.
pub fn initialize_tracing(config: &LoggingConfig) -> String {
    let _ = tracing::subscriber::set_global_default(build_subscriber(config, std::io::stderr));
    config.level.clone()
}

/// Builds the subscriber `initialize_tracing` installs, writing to `writer`.
pub fn build_subscriber<W>(config: &LoggingConfig, writer: W) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let builder = fmt::fmt()
        .with_env_filter(build_env_filter(config))
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(writer);

    if matches!(config.format, LogFormat::Json) {
        Box::new(builder.json().with_ansi(false).finish())
    } else {
        Box::new(builder.with_ansi(false).finish())
    }
}

fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    let default_level = config
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .parse_lossy("")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::{
        io::{self, Write},
        sync::{Arc, Mutex},
    };
    use tracing::{debug, info};

    #[derive(Clone)]
    struct BufferMakeWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    struct BufferWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl<'a> MakeWriter<'a> for BufferMakeWriter {
        type Writer = BufferWriter;

        fn make_writer(&'a self) -> Self::Writer {
            BufferWriter {
                buffer: Arc::clone(&self.buffer),
            }
        }
    }

    impl Write for BufferWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffer.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(config: &LoggingConfig, emit: impl FnOnce()) -> String {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let subscriber = build_subscriber(
            config,
            BufferMakeWriter {
                buffer: Arc::clone(&buffer),
            },
        );
        let dispatch = tracing::dispatcher::Dispatch::new(subscriber);
        tracing::dispatcher::with_default(&dispatch, emit);
        let bytes = buffer.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn initialize_tracing_returns_configured_level() {
        let config = LoggingConfig::default();
        assert_eq!(initialize_tracing(&config), "info");
        assert_eq!(initialize_tracing(&config), "info");
    }

    #[test]
    fn json_format_produces_json_lines() {
        let config = LoggingConfig {
            level: "info".into(),
            format: LogFormat::Json,
        };

        let contents = capture(&config, || info!(topic = "chat:1:a:b", "joined channel"));
        let line = contents.lines().find(|l| !l.trim().is_empty()).unwrap();
        let value: Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["fields"]["message"], "joined channel");
        assert_eq!(value["fields"]["topic"], "chat:1:a:b");
    }

    #[test]
    fn text_format_emits_plain_lines() {
        let contents = capture(&LoggingConfig::default(), || info!("snapshot loaded"));
        let line = contents.lines().find(|l| !l.trim().is_empty()).unwrap();
        assert!(serde_json::from_str::<Value>(line).is_err());
        assert!(line.contains("snapshot loaded"));
    }

    #[test]
    fn configured_level_filters_lower_events() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig {
            level: "warn".into(),
            format: LogFormat::Text,
        };
        let contents = capture(&config, || debug!("hidden"));
        assert!(!contents.contains("hidden"));
    }
}
