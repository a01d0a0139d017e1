use std::{
    fmt::{self, Write as _},
    sync::{Arc, OnceLock},
};

use tracing::{
    field::{Field, Visit},
    Event, Level, Subscriber,
};
use tracing_subscriber::{layer::Context, prelude::*, EnvFilter, Layer};

use crate::host::Host;

/// Installs the process-wide subscriber once: stderr output filtered by
/// `RUST_LOG` (or `default_filter`), plus forwarding to the host's log when
/// one is given.
pub fn init_tracing(default_filter: &str, host: Option<Arc<dyn Host>>) {
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_names(true),
            )
            .with(host.map(HostLogLayer::new))
            .try_init();
    });
}

/// Sends every event, rendered as a single line, to [`Host::log_message`].
pub struct HostLogLayer<H: ?Sized> {
    host: Arc<H>,
}

impl<H: Host + ?Sized> HostLogLayer<H> {
    pub fn new(host: Arc<H>) -> Self {
        Self { host }
    }
}

impl<S, H> Layer<S> for HostLogLayer<H>
where
    S: Subscriber,
    H: Host + ?Sized,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut line = LogLine::default();
        event.record(&mut line);
        let metadata = event.metadata();
        self.host
            .log_message(&line.render(*metadata.level(), metadata.target()));
    }
}

#[derive(Default)]
struct LogLine {
    message: String,
    fields: String,
}

impl LogLine {
    fn render(self, level: Level, target: &str) -> String {
        format!("{level} {target}: {}{}", self.message, self.fields)
    }
}

impl Visit for LogLine {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
