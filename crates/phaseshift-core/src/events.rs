use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::session::{Phase, PomodoroSettings};
use crate::timer::{isolate, lock};

/// Every state change of a session produces an Event.
///
/// Events are delivered after the operation that caused them has released
/// its locks, in the order they happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        phase: Phase,
        work_units_completed: u32,
        at: DateTime<Utc>,
    },
    TimerStopped {
        phase: Phase,
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    /// A phase ended, naturally or by skip. `next_phase` is `None` when the
    /// phase finished the session.
    PhaseCompleted {
        phase: Phase,
        next_phase: Option<Phase>,
        was_skipped: bool,
        work_units_completed: u32,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        work_units_completed: u32,
        total_work_units: u32,
        at: DateTime<Utc>,
    },
    PhaseReset {
        phase: Phase,
        at: DateTime<Utc>,
    },
    SessionReset {
        at: DateTime<Utc>,
    },
    SettingsUpdated {
        settings: PomodoroSettings,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::TimerStarted { at, .. }
            | Event::TimerStopped { at, .. }
            | Event::PhaseCompleted { at, .. }
            | Event::SessionCompleted { at, .. }
            | Event::PhaseReset { at, .. }
            | Event::SessionReset { at }
            | Event::SettingsUpdated { at, .. } => *at,
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    observers: Vec<(SubscriptionId, Observer)>,
    channels: Vec<mpsc::UnboundedSender<Event>>,
}

/// Fan-out of session events to callbacks and channels.
#[derive(Default)]
pub(crate) struct EventBus {
    registry: Mutex<Registry>,
}

impl EventBus {
    pub(crate) fn subscribe(&self, observer: Observer) -> SubscriptionId {
        let mut registry = lock(&self.registry);
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry.observers.push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = lock(&self.registry);
        let before = registry.observers.len();
        registry.observers.retain(|(existing, _)| *existing != id);
        registry.observers.len() != before
    }

    pub(crate) fn channel(&self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.registry).channels.push(tx);
        rx
    }

    /// Delivers `events` in order. Observers run without the registry lock
    /// held, so they may subscribe or unsubscribe.
    pub(crate) fn emit(&self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        let observers: Vec<Observer> = {
            let mut registry = lock(&self.registry);
            registry.channels.retain(|tx| !tx.is_closed());
            for event in &events {
                for tx in &registry.channels {
                    let _ = tx.send(event.clone());
                }
            }
            registry.observers.iter().map(|(_, o)| Arc::clone(o)).collect()
        };
        for event in &events {
            for observer in &observers {
                isolate("event observer", || observer(event));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reset_event() -> Event {
        Event::SessionReset { at: Utc::now() }
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event::PhaseCompleted {
            phase: Phase::Work,
            next_phase: Some(Phase::ShortBreak),
            was_skipped: true,
            work_units_completed: 1,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PhaseCompleted");
        assert_eq!(json["phase"], "work");
        assert_eq!(json["next_phase"], "short_break");
        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn observers_and_channels_receive_in_order() {
        let bus = EventBus::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(Arc::new(move |e: &Event| sink.lock().unwrap().push(e.clone())));
        let mut rx = bus.channel();

        let first = reset_event();
        let second = Event::PhaseReset {
            phase: Phase::Work,
            at: Utc::now(),
        };
        bus.emit(vec![first.clone(), second.clone()]);

        assert_eq!(*seen.lock().unwrap(), vec![first.clone(), second.clone()]);
        assert_eq!(rx.try_recv().unwrap(), first);
        assert_eq!(rx.try_recv().unwrap(), second);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::default();
        let count = Arc::new(Mutex::new(0));
        let c = Arc::clone(&count);
        let id = bus.subscribe(Arc::new(move |_: &Event| *c.lock().unwrap() += 1));
        bus.emit(vec![reset_event()]);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(vec![reset_event()]);
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let bus = EventBus::default();
        drop(bus.channel());
        bus.emit(vec![reset_event()]);
        assert!(lock(&bus.registry).channels.is_empty());
    }

    #[test]
    fn panicking_observer_does_not_block_others() {
        let bus = EventBus::default();
        bus.subscribe(Arc::new(|_: &Event| panic!("observer failed")));
        let hit = Arc::new(Mutex::new(false));
        let h = Arc::clone(&hit);
        bus.subscribe(Arc::new(move |_: &Event| *h.lock().unwrap() = true));
        bus.emit(vec![reset_event()]);
        assert!(*hit.lock().unwrap());
    }
}
