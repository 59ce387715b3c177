use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// What a subscriber listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Reservation created / status changed / cancelled / deleted.
    Reservations,
    /// Override and private-event changes.
    Calendar,
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::ReservationCreated { .. }
            | Event::ReservationStatusChanged { .. }
            | Event::ReservationCancelled { .. }
            | Event::ReservationDeleted { .. } => Topic::Reservations,
            Event::OverrideSet { .. }
            | Event::OverrideCleared { .. }
            | Event::PrivateEventSet { .. }
            | Event::PrivateEventRemoved { .. } => Topic::Calendar,
        }
    }
}

/// Fire-and-forget broadcast of applied events to sync and notification collaborators.
pub struct NotifyHub {
    channels: DashMap<Topic, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a topic. Creates the channel if needed.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(topic)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send to the event's topic. No-op if nobody is listening; a lagging
    /// receiver loses old messages, the sender never waits.
    pub fn send(&self, event: &Event) {
        if let Some(sender) = self.channels.get(&event.topic()) {
            let _ = sender.send(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 10).unwrap()
    }

    #[tokio::test]
    async fn subscriber_gets_own_topic_only() {
        let hub = NotifyHub::new();
        let mut calendar = hub.subscribe(Topic::Calendar);
        let mut reservations = hub.subscribe(Topic::Reservations);

        let cleared = Event::OverrideCleared { room: 1, date: date() };
        hub.send(&cleared);
        let deleted = Event::ReservationDeleted {
            id: Ulid::new(),
            released: vec![],
        };
        hub.send(&deleted);

        assert_eq!(calendar.recv().await.unwrap(), cleared);
        assert_eq!(reservations.recv().await.unwrap(), deleted);
        assert!(calendar.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        hub.send(&Event::PrivateEventRemoved { date: date() });
    }

    #[tokio::test]
    async fn dropped_receiver_does_not_break_sender() {
        let hub = NotifyHub::new();
        drop(hub.subscribe(Topic::Calendar));
        hub.send(&Event::OverrideCleared { room: 2, date: date() });
    }
}
