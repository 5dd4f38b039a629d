//! Resolution tracing boundary.
//!
//! Tracing is optional, injected by the caller, and must not affect
//! resolution semantics. The default resolve path carries no sink and pays
//! nothing.

///
/// BindingSource
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BindingSource {
    Supplied,
    Default,
}

///
/// ResolveTraceEvent
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResolveTraceEvent {
    /// A parameter was bound to a concrete value.
    ParameterBound {
        name: String,
        source: BindingSource,
    },
    /// The embedded filter tree was rewritten parameter-free.
    FilterSubstituted { parameters: usize },
    /// Resolution stopped on its first failure.
    ResolveFailed { message: String },
}

///
/// ResolveTraceSink
///

pub trait ResolveTraceSink {
    fn on_event(&self, event: ResolveTraceEvent);
}

/// Collects events in order; test and diagnostics helper.
#[derive(Debug, Default)]
pub struct RecordingTraceSink {
    events: std::cell::RefCell<Vec<ResolveTraceEvent>>,
}

impl RecordingTraceSink {
    #[must_use]
    pub fn events(&self) -> Vec<ResolveTraceEvent> {
        self.events.borrow().clone()
    }
}

impl ResolveTraceSink for RecordingTraceSink {
    fn on_event(&self, event: ResolveTraceEvent) {
        self.events.borrow_mut().push(event);
    }
}
