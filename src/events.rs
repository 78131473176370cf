//! Typed change notifications
//!
//! Listeners subscribe to one [`EventKind`] and receive every
//! [`SettingsEvent`] of that kind synchronously, in registration order.

use serde::Serialize;
use serde_json::Value;

use crate::models::BackupId;

/// One key's transition inside a change notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingChange {
    pub key: String,
    pub value: Value,
    pub previous: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettingsEvent {
    Initialized { count: usize },
    Changed(SettingChange),
    BatchChanged { changes: Vec<SettingChange> },
    Preview { key: String, value: Value },
    PreviewCleared { key: String, expired: bool },
    Reset { key: String, value: Value },
    Imported { count: usize },
    Error { key: Option<String>, message: String },
    AutoBackupCreated { id: BackupId },
    AutoBackupFailed { message: String },
}

impl SettingsEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Initialized { .. } => EventKind::Initialized,
            Self::Changed(_) => EventKind::Changed,
            Self::BatchChanged { .. } => EventKind::BatchChanged,
            Self::Preview { .. } => EventKind::Preview,
            Self::PreviewCleared { .. } => EventKind::PreviewCleared,
            Self::Reset { .. } => EventKind::Reset,
            Self::Imported { .. } => EventKind::Imported,
            Self::Error { .. } => EventKind::Error,
            Self::AutoBackupCreated { .. } => EventKind::AutoBackupCreated,
            Self::AutoBackupFailed { .. } => EventKind::AutoBackupFailed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Initialized,
    Changed,
    BatchChanged,
    Preview,
    PreviewCleared,
    Reset,
    Imported,
    Error,
    AutoBackupCreated,
    AutoBackupFailed,
}

/// Handle returned by [`EventBus::on`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Box<dyn FnMut(&SettingsEvent) + Send>;

struct Subscription {
    id: ListenerId,
    kind: EventKind,
    once: bool,
    listener: Listener,
}

#[derive(Default)]
pub struct EventBus {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event of `kind`
    pub fn on(&mut self, kind: EventKind, listener: Listener) -> ListenerId {
        self.subscribe(kind, false, listener)
    }

    /// Subscribe to the next event of `kind` only
    pub fn once(&mut self, kind: EventKind, listener: Listener) -> ListenerId {
        self.subscribe(kind, true, listener)
    }

    /// Remove a listener; returns whether it was still registered
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| sub.id != id);
        self.subscriptions.len() != before
    }

    /// Deliver `event` to its listeners in registration order
    pub fn emit(&mut self, event: &SettingsEvent) {
        let kind = event.kind();
        self.subscriptions.retain_mut(|sub| {
            if sub.kind != kind {
                return true;
            }
            (sub.listener)(event);
            !sub.once
        });
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.subscriptions.iter().filter(|sub| sub.kind == kind).count()
    }

    fn subscribe(&mut self, kind: EventKind, once: bool, listener: Listener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.subscriptions.push(Subscription {
            id,
            kind,
            once,
            listener,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Listener) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let make = move |tag: &'static str| -> Listener {
            let sink = sink.clone();
            Box::new(move |_event: &SettingsEvent| sink.lock().unwrap().push(tag.to_string()))
        };
        (log, make)
    }

    fn changed() -> SettingsEvent {
        SettingsEvent::Changed(SettingChange {
            key: "a".into(),
            value: json!(1),
            previous: None,
        })
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let (log, make) = recorder();
        let mut bus = EventBus::new();
        bus.on(EventKind::Changed, make("first"));
        bus.on(EventKind::Changed, make("second"));
        bus.on(EventKind::Reset, make("other"));

        bus.emit(&changed());
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_once_fires_a_single_time() {
        let (log, make) = recorder();
        let mut bus = EventBus::new();
        bus.once(EventKind::Changed, make("once"));

        bus.emit(&changed());
        bus.emit(&changed());
        assert_eq!(log.lock().unwrap().len(), 1);
        assert_eq!(bus.listener_count(EventKind::Changed), 0);
    }

    #[test]
    fn test_off_removes_only_that_listener() {
        let (log, make) = recorder();
        let mut bus = EventBus::new();
        let gone = bus.on(EventKind::Changed, make("gone"));
        bus.on(EventKind::Changed, make("kept"));

        assert!(bus.off(gone));
        assert!(!bus.off(gone));
        bus.emit(&changed());
        assert_eq!(*log.lock().unwrap(), vec!["kept"]);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(SettingsEvent::Imported { count: 3 }).unwrap();
        assert_eq!(json, json!({"type": "imported", "count": 3}));
    }
}
