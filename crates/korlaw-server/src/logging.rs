use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tracing::Level;

/// Minimum severity forwarded to the client, settable via `logging/setLevel`.
#[derive(Clone)]
pub(crate) struct LogThreshold(Arc<AtomicU8>);

impl Default for LogThreshold {
    fn default() -> Self {
        Self(Arc::new(AtomicU8::new(rank(&Level::WARN))))
    }
}

impl LogThreshold {
    /// Apply an MCP level name. Returns false for names MCP does not define.
    pub fn set(&self, mcp_level: &str) -> bool {
        let r = match mcp_level {
            "debug" => 0,
            "info" | "notice" => 1,
            "warning" => 2,
            "error" | "critical" | "alert" | "emergency" => 3,
            _ => return false,
        };
        self.0.store(r, Ordering::Relaxed);
        true
    }

    fn allows(&self, level: &Level) -> bool {
        rank(level) >= self.0.load(Ordering::Relaxed)
    }
}

fn rank(level: &Level) -> u8 {
    match *level {
        Level::ERROR => 3,
        Level::WARN => 2,
        Level::INFO => 1,
        _ => 0,
    }
}

fn mcp_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "error",
        Level::WARN => "warning",
        Level::INFO => "info",
        _ => "debug",
    }
}

/// Forwards events to the client as `notifications/message` lines on the
/// outbound channel. Holds a weak sender so it never keeps the writer alive.
pub(crate) struct NotificationLayer {
    tx: mpsc::WeakUnboundedSender<String>,
    threshold: LogThreshold,
}

impl NotificationLayer {
    pub fn new(tx: mpsc::WeakUnboundedSender<String>, threshold: LogThreshold) -> Self {
        Self { tx, threshold }
    }
}

struct FieldVisitor<'a> {
    fields: &'a mut Map<String, Value>,
}

impl tracing::field::Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        // `message` arrives as fmt::Arguments, whose Debug output is unquoted.
        self.fields
            .insert(field.name().to_string(), Value::from(format!("{value:?}")));
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for NotificationLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let level = event.metadata().level();
        if !self.threshold.allows(level) {
            return;
        }
        let Some(tx) = self.tx.upgrade() else {
            return;
        };

        let mut fields = Map::new();
        event.record(&mut FieldVisitor {
            fields: &mut fields,
        });

        let notification = json!({
            "jsonrpc": "2.0",
            "method": "notifications/message",
            "params": {
                "level": mcp_name(level),
                "logger": event.metadata().target(),
                "data": fields,
            },
        });
        let _ = tx.send(notification.to_string());
    }
}
