//! Series change events and the explicit observer registry.
//!
//! Observers are owned by whoever registered them: an owner tears its
//! subscriptions down with [`Observers::remove_observers_of`].

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::indicator::IndicatorId;
use crate::ser::SerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SerEventKind {
    /// Rows changed from outside the indicator engine (feed, composer, caller).
    Updated,
    /// An indicator finished writing its result rows.
    FinishedComputing,
    /// All rows were dropped.
    Cleared,
    /// Indicator options changed and history is being recomputed.
    OptsChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerEvent {
    pub kind: SerEventKind,
    /// Series whose rows changed.
    pub source: SerId,
    /// Indicator that wrote the rows, if any.
    pub origin: Option<IndicatorId>,
    pub from_time: i64,
    pub to_time: i64,
}

impl SerEvent {
    pub fn updated(source: SerId, from_time: i64, to_time: i64) -> Self {
        Self {
            kind: SerEventKind::Updated,
            source,
            origin: None,
            from_time,
            to_time,
        }
    }

    pub fn finished(source: SerId, origin: IndicatorId, from_time: i64, to_time: i64) -> Self {
        Self {
            kind: SerEventKind::FinishedComputing,
            source,
            origin: Some(origin),
            from_time,
            to_time,
        }
    }

    pub fn cleared(source: SerId) -> Self {
        Self {
            kind: SerEventKind::Cleared,
            source,
            origin: None,
            from_time: 0,
            to_time: 0,
        }
    }

    pub fn opts_changed(source: SerId, origin: IndicatorId) -> Self {
        Self {
            kind: SerEventKind::OptsChanged,
            source,
            origin: Some(origin),
            from_time: 0,
            to_time: 0,
        }
    }

    /// True when `indicator` produced this event itself. Such events must not
    /// re-trigger that indicator.
    pub fn is_caused_by(&self, indicator: IndicatorId) -> bool {
        self.kind == SerEventKind::FinishedComputing && self.origin == Some(indicator)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Which events a subscription receives. Empty `kinds` means every kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub source: Option<SerId>,
    pub kinds: Vec<SerEventKind>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_ser(source: SerId) -> Self {
        Self {
            source: Some(source),
            kinds: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: SerEventKind) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn matches(&self, ev: &SerEvent) -> bool {
        self.source.map_or(true, |s| s == ev.source)
            && (self.kinds.is_empty() || self.kinds.contains(&ev.kind))
    }
}

type Callback = Box<dyn FnMut(&SerEvent) + Send>;

struct Subscription {
    id: SubscriptionId,
    owner: OwnerId,
    filter: EventFilter,
    callback: Callback,
}

#[derive(Default)]
pub struct Observers {
    next_id: u64,
    subs: Vec<Subscription>,
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("subscriptions", &self.subs.len())
            .finish()
    }
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, owner: OwnerId, filter: EventFilter, callback: F) -> SubscriptionId
    where
        F: FnMut(&SerEvent) + Send + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subs.push(Subscription {
            id,
            owner,
            filter,
            callback: Box::new(callback),
        });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subs.len();
        self.subs.retain(|s| s.id != id);
        self.subs.len() != before
    }

    /// Drops every subscription registered by `owner`; returns how many.
    pub fn remove_observers_of(&mut self, owner: OwnerId) -> usize {
        let before = self.subs.len();
        self.subs.retain(|s| s.owner != owner);
        before - self.subs.len()
    }

    pub fn notify(&mut self, ev: &SerEvent) {
        for sub in self.subs.iter_mut().filter(|s| s.filter.matches(ev)) {
            (sub.callback)(ev);
        }
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn filtered_delivery_and_owner_teardown() {
        let mut obs = Observers::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s1 = seen.clone();
        obs.subscribe(OwnerId(1), EventFilter::for_ser(SerId(0)), move |ev| {
            s1.lock().unwrap().push(ev.kind)
        });
        let s2 = seen.clone();
        let sub = obs.subscribe(
            OwnerId(2),
            EventFilter::all().with_kind(SerEventKind::Cleared),
            move |ev| s2.lock().unwrap().push(ev.kind),
        );

        obs.notify(&SerEvent::updated(SerId(0), 1, 2));
        obs.notify(&SerEvent::updated(SerId(1), 1, 2));
        obs.notify(&SerEvent::cleared(SerId(1)));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![SerEventKind::Updated, SerEventKind::Cleared]
        );

        assert!(obs.unsubscribe(sub));
        assert!(!obs.unsubscribe(sub));
        assert_eq!(obs.remove_observers_of(OwnerId(1)), 1);
        assert!(obs.is_empty());
    }

    #[test]
    fn self_caused_events_are_tagged() {
        let ev = SerEvent::finished(SerId(0), IndicatorId(3), 0, 10);
        assert!(ev.is_caused_by(IndicatorId(3)));
        assert!(!ev.is_caused_by(IndicatorId(4)));
        assert!(!SerEvent::updated(SerId(0), 0, 10).is_caused_by(IndicatorId(3)));
    }
}
