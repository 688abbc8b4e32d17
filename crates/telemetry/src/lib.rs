//! Structured telemetry events for the compute marketplace.
//!
//! Every component reports `category`/`action`/`label`/`value` events through
//! a [`TelemetrySink`]. Telemetry is diagnostic, not protocol-critical:
//! `track` never returns a `Result` and the default sink cannot fail.

/// A single structured telemetry event.
#[derive(Debug, Clone)]
pub struct TelemetryEvent {
    pub category: &'static str,
    pub action: &'static str,
    pub label: Option<String>,
    pub value: Option<f64>,
}

impl TelemetryEvent {
    pub fn new(category: &'static str, action: &'static str) -> Self {
        Self {
            category,
            action,
            label: None,
            value: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }
}

/// Severity used to pick the tracing level an event is logged at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// Sink for telemetry events. Object-safe so the runtime's degraded bootstrap
/// stages can substitute a no-op implementation.
pub trait TelemetrySink: Send + Sync {
    fn track(&self, event: TelemetryEvent);

    /// Convenience for the common case of an info-level event with no label/value.
    fn track_simple(&self, category: &'static str, action: &'static str) {
        self.track(TelemetryEvent::new(category, action));
    }
}

/// Default sink: emits a `tracing` event per telemetry event. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn track(&self, event: TelemetryEvent) {
        track_with_severity(event, Severity::Info);
    }
}

/// Emit a telemetry event at an explicit severity. Error-class events (job
/// failures, relay disconnects) should use [`Severity::Error`] so they are
/// visible without changing the event's shape.
pub fn track_with_severity(event: TelemetryEvent, severity: Severity) {
    let TelemetryEvent {
        category,
        action,
        label,
        value,
    } = event;
    match severity {
        Severity::Info => {
            tracing::info!(category, action, label = ?label, value = ?value, "telemetry");
        }
        Severity::Warn => {
            tracing::warn!(category, action, label = ?label, value = ?value, "telemetry");
        }
        Severity::Error => {
            tracing::error!(category, action, label = ?label, value = ?value, "telemetry");
        }
    }
}

/// A sink that discards every event. Used by the runtime's emergency/empty
/// service graph stages, where even tracing initialization may not have
/// succeeded yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetrySink;

impl TelemetrySink for NoopTelemetrySink {
    fn track(&self, _event: TelemetryEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_sink_does_not_panic() {
        let sink = TracingTelemetrySink;
        sink.track(
            TelemetryEvent::new("job", "completed")
                .with_label("kind:5050")
                .with_value(1.0),
        );
        sink.track_simple("relay", "connected");
    }

    #[test]
    fn noop_sink_discards_silently() {
        let sink = NoopTelemetrySink;
        sink.track(TelemetryEvent::new("job", "failed"));
    }
}
