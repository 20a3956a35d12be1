//! # Events
//!
//! The renderer announces a finished layout through an [`EventSink`].
//! [`Listeners`] is the subscription hub hosts usually hand in: persistent
//! and fire-once registrations, removable by id. Any `FnMut(&FlowEvent)` is
//! a sink as well.

use serde::Serialize;

/// Payload of the "rendering complete" notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedEvent {
    /// Realized width of the container holding all columns.
    pub width: f64,
    pub columns: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FlowEvent {
    Rendered(RenderedEvent),
}

impl FlowEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            FlowEvent::Rendered(_) => EventKind::Rendered,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    Rendered,
}

pub trait EventSink {
    fn fire(&mut self, event: &FlowEvent);
}

impl<F> EventSink for F
where
    F: FnMut(&FlowEvent),
{
    fn fire(&mut self, event: &FlowEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    kind: EventKind,
    once: bool,
    callback: Box<dyn FnMut(&FlowEvent)>,
}

#[derive(Default)]
pub struct Listeners {
    next_id: u64,
    registrations: Vec<Registration>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `callback` every time an event of `kind` fires.
    pub fn on(
        &mut self,
        kind: EventKind,
        callback: impl FnMut(&FlowEvent) + 'static,
    ) -> ListenerId {
        self.register(kind, false, Box::new(callback))
    }

    /// Call `callback` the next time an event of `kind` fires, then drop it.
    pub fn once(
        &mut self,
        kind: EventKind,
        callback: impl FnMut(&FlowEvent) + 'static,
    ) -> ListenerId {
        self.register(kind, true, Box::new(callback))
    }

    /// Remove a registration. Returns false if it was already gone.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.id != id);
        self.registrations.len() != before
    }

    /// Remove every registration for `kind`.
    pub fn off_all(&mut self, kind: EventKind) {
        self.registrations.retain(|r| r.kind != kind);
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    fn register(
        &mut self,
        kind: EventKind,
        once: bool,
        callback: Box<dyn FnMut(&FlowEvent)>,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.registrations.push(Registration {
            id,
            kind,
            once,
            callback,
        });
        id
    }
}

impl EventSink for Listeners {
    fn fire(&mut self, event: &FlowEvent) {
        let kind = event.kind();
        for registration in self.registrations.iter_mut().filter(|r| r.kind == kind) {
            (registration.callback)(event);
        }
        self.registrations.retain(|r| !(r.once && r.kind == kind));
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("registrations", &self.registrations.len())
            .finish()
    }
}
