//! In-memory capture of lifecycle log events.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// A captured event with its fields rendered as strings.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub component: Option<String>,
    pub op: Option<String>,
    pub event: Option<String>,
    pub fields: HashMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

#[derive(Default)]
struct FieldVisitor {
    fields: HashMap<String, String>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.fields
            .insert(field.name().to_string(), format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields
            .insert(field.name().to_string(), value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), value.to_string());
    }
}

type Events = Arc<Mutex<Vec<CapturedEvent>>>;

struct CaptureLayer {
    events: Events,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        self.events.lock().push(CapturedEvent {
            level: *event.metadata().level(),
            component: visitor.fields.get("component").cloned(),
            op: visitor.fields.get("op").cloned(),
            event: visitor.fields.get("event").cloned(),
            fields: visitor.fields,
        });
    }
}

static GLOBAL_EVENTS: OnceLock<Events> = OnceLock::new();

/// Handle to captured events.
///
/// [`LogCapture::start`] captures on the current thread only and stops when
/// the handle drops. [`LogCapture::global`] captures every thread, which
/// multi-threaded runtimes need; tests using it share one buffer and should
/// be marked [`serial`](crate::serial).
pub struct LogCapture {
    events: Events,
    _guard: Option<DefaultGuard>,
}

impl LogCapture {
    /// Captures events emitted on this thread until the handle drops.
    pub fn start() -> Self {
        let events = Events::default();
        let layer = CaptureLayer {
            events: events.clone(),
        };
        let guard = tracing_subscriber::registry().with(layer).set_default();
        Self {
            events,
            _guard: Some(guard),
        }
    }

    /// Installs the process-wide capture on first use and clears it.
    ///
    /// If another global subscriber was installed first, nothing is
    /// captured through this handle.
    pub fn global() -> Self {
        let events = GLOBAL_EVENTS
            .get_or_init(|| {
                let events = Events::default();
                let layer = CaptureLayer {
                    events: events.clone(),
                };
                let _ = tracing_subscriber::registry().with(layer).try_init();
                events
            })
            .clone();
        events.lock().clear();
        Self {
            events,
            _guard: None,
        }
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().clone()
    }

    /// Events with the given `op` field.
    pub fn events_for(&self, op: &str) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.op.as_deref() == Some(op))
            .cloned()
            .collect()
    }

    /// # Panics
    ///
    /// Panics if no event has both the given `op` and `event` fields.
    #[track_caller]
    pub fn assert_event_exists(&self, op: &str, event: &str) {
        let events = self.events();
        let found = events
            .iter()
            .any(|e| e.op.as_deref() == Some(op) && e.event.as_deref() == Some(event));
        assert!(
            found,
            "expected event op={} event={} not found in {} captured events",
            op,
            event,
            events.len()
        );
    }

    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&CapturedEvent) -> bool,
    {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}
