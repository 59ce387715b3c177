use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;

use crate::config::BookingConfig;
use crate::model::*;

/// Per room/date overrides plus per-date private events. No logic beyond get/set/delete.
#[derive(Debug, Default)]
pub struct CalendarState {
    /// Keyed date-major so range scans stay ordered by day.
    overrides: BTreeMap<(NaiveDate, RoomId), CalendarOverride>,
    private_events: BTreeMap<NaiveDate, PrivateEvent>,
}

impl CalendarState {
    pub fn get_override(&self, room: RoomId, date: NaiveDate) -> Option<&CalendarOverride> {
        self.overrides.get(&(date, room))
    }

    pub fn set_override(&mut self, room: RoomId, date: NaiveDate, entry: CalendarOverride) {
        self.overrides.insert((date, room), entry);
    }

    pub fn clear_override(&mut self, room: RoomId, date: NaiveDate) -> Option<CalendarOverride> {
        self.overrides.remove(&(date, room))
    }

    /// Overrides dated within the range, ordered by date then room.
    pub fn overrides_in(
        &self,
        range: &DateRange,
    ) -> impl Iterator<Item = (NaiveDate, RoomId, &CalendarOverride)> {
        self.overrides
            .range((range.from, RoomId::MIN)..=(range.to, RoomId::MAX))
            .map(|((date, room), entry)| (*date, *room, entry))
    }

    pub fn overrides(&self) -> impl Iterator<Item = (NaiveDate, RoomId, &CalendarOverride)> {
        self.overrides
            .iter()
            .map(|((date, room), entry)| (*date, *room, entry))
    }

    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    pub fn private_event(&self, date: NaiveDate) -> Option<&PrivateEvent> {
        self.private_events.get(&date)
    }

    pub fn private_events_in(
        &self,
        range: &DateRange,
    ) -> impl Iterator<Item = (NaiveDate, &PrivateEvent)> {
        self.private_events
            .range(range.from..=range.to)
            .map(|(date, event)| (*date, event))
    }

    pub fn private_events(&self) -> impl Iterator<Item = (NaiveDate, &PrivateEvent)> {
        self.private_events.iter().map(|(date, event)| (*date, event))
    }

    pub fn set_private_event(&mut self, date: NaiveDate, event: PrivateEvent) {
        self.private_events.insert(date, event);
    }

    pub fn remove_private_event(&mut self, date: NaiveDate) -> Option<PrivateEvent> {
        self.private_events.remove(&date)
    }
}

/// Reservation rows plus the explicit room → reservation association.
#[derive(Debug, Default)]
pub struct Ledger {
    reservations: HashMap<ReservationId, Reservation>,
    room_index: BTreeMap<RoomId, BTreeSet<ReservationId>>,
}

impl Ledger {
    pub fn get(&self, id: &ReservationId) -> Option<&Reservation> {
        self.reservations.get(id)
    }

    pub fn contains(&self, id: &ReservationId) -> bool {
        self.reservations.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }

    pub fn insert(&mut self, reservation: Reservation) {
        for room in &reservation.room_ids {
            self.room_index.entry(*room).or_default().insert(reservation.id);
        }
        self.reservations.insert(reservation.id, reservation);
    }

    pub fn set_status(&mut self, id: &ReservationId, status: ReservationStatus) {
        if let Some(r) = self.reservations.get_mut(id) {
            r.status = status;
        }
    }

    /// Remove the row and its room association together.
    pub fn remove(&mut self, id: &ReservationId) -> Option<Reservation> {
        let reservation = self.reservations.remove(id)?;
        for room in &reservation.room_ids {
            if let Some(ids) = self.room_index.get_mut(room) {
                ids.remove(id);
                if ids.is_empty() {
                    self.room_index.remove(room);
                }
            }
        }
        Some(reservation)
    }

    /// Reservations explicitly holding `room`, any status.
    pub fn reservations_for_room(&self, room: RoomId) -> Vec<ReservationId> {
        self.room_index
            .get(&room)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Pending or paid reservations with at least one night inside the range.
    pub fn active_in<'a>(&'a self, range: &'a DateRange) -> impl Iterator<Item = &'a Reservation> {
        self.reservations
            .values()
            .filter(move |r| r.status.is_active() && r.stay.intersects(range))
    }

    /// Every reservation with at least one night inside the range.
    pub fn in_range<'a>(&'a self, range: &'a DateRange) -> impl Iterator<Item = &'a Reservation> {
        self.reservations
            .values()
            .filter(move |r| r.stay.intersects(range))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reservation> {
        self.reservations.values()
    }
}

/// Everything a validate+commit must see atomically.
pub struct BookingState {
    pub calendar: CalendarState,
    pub ledger: Ledger,
    pub config: Arc<BookingConfig>,
}

impl BookingState {
    pub fn new(config: Arc<BookingConfig>) -> Self {
        Self {
            calendar: CalendarState::default(),
            ledger: Ledger::default(),
            config,
        }
    }

    /// Apply an event. The caller holds the write guard.
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::ReservationCreated { reservation } => {
                self.ledger.insert(reservation.clone());
            }
            Event::ReservationStatusChanged { id, status } => {
                self.ledger.set_status(id, *status);
            }
            Event::ReservationCancelled { id, released } => {
                self.ledger.set_status(id, ReservationStatus::Cancelled);
                for (room, date) in released {
                    self.calendar.clear_override(*room, *date);
                }
            }
            Event::ReservationDeleted { id, released } => {
                for (room, date) in released {
                    self.calendar.clear_override(*room, *date);
                }
                self.ledger.remove(id);
            }
            Event::OverrideSet { room, date, entry } => {
                self.calendar.set_override(*room, *date, entry.clone());
            }
            Event::OverrideCleared { room, date } => {
                self.calendar.clear_override(*room, *date);
            }
            Event::PrivateEventSet { date, event } => {
                self.calendar.set_private_event(*date, event.clone());
            }
            Event::PrivateEventRemoved { date } => {
                self.calendar.remove_private_event(*date);
            }
        }
    }

    /// Overrides stamped for `id` within its stay; these go away with the reservation.
    pub fn attributed_overrides(&self, id: &ReservationId) -> Vec<(RoomId, NaiveDate)> {
        let Some(reservation) = self.ledger.get(id) else {
            return Vec::new();
        };
        self.calendar
            .overrides_in(&DateRange::from(reservation.stay))
            .filter(|(_, _, entry)| entry.attribution.as_ref() == Some(id))
            .map(|(date, room, _)| (room, date))
            .collect()
    }

    /// Minimal event list that recreates this state.
    pub fn snapshot_events(&self) -> Vec<Event> {
        let mut events = Vec::with_capacity(
            self.ledger.len() + self.calendar.override_count(),
        );
        let mut reservations: Vec<&Reservation> = self.ledger.iter().collect();
        reservations.sort_by_key(|r| r.id);
        events.extend(reservations.into_iter().map(|r| Event::ReservationCreated {
            reservation: r.clone(),
        }));
        events.extend(self.calendar.overrides().map(|(date, room, entry)| Event::OverrideSet {
            room,
            date,
            entry: entry.clone(),
        }));
        events.extend(self.calendar.private_events().map(|(date, event)| Event::PrivateEventSet {
            date,
            event: event.clone(),
        }));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use ulid::Ulid;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn reservation(rooms: &[RoomId], check_in: &str, check_out: &str) -> Reservation {
        Reservation {
            id: Ulid::new(),
            status: ReservationStatus::Pending,
            stay: Stay::new(d(check_in), d(check_out)),
            rooms_qty: rooms.len() as u32,
            room_ids: rooms.iter().copied().collect(),
            private_all: false,
            total_amount: Decimal::from(100),
            deposit_amount: Decimal::from(30),
            currency: "EUR".into(),
            guest: GuestInfo::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn overrides_in_range_are_date_ordered() {
        let mut cal = CalendarState::default();
        cal.set_override(2, d("2026-01-11"), CalendarOverride::blocked("a"));
        cal.set_override(1, d("2026-01-11"), CalendarOverride::blocked("b"));
        cal.set_override(1, d("2026-01-09"), CalendarOverride::blocked("c"));
        cal.set_override(1, d("2026-01-13"), CalendarOverride::blocked("d"));

        let hits: Vec<_> = cal
            .overrides_in(&DateRange::new(d("2026-01-10"), d("2026-01-12")))
            .map(|(date, room, _)| (date, room))
            .collect();
        assert_eq!(hits, vec![(d("2026-01-11"), 1), (d("2026-01-11"), 2)]);
    }

    #[test]
    fn ledger_room_index_follows_rows() {
        let mut ledger = Ledger::default();
        let r = reservation(&[1, 2], "2026-01-10", "2026-01-12");
        let id = r.id;
        ledger.insert(r);
        assert_eq!(ledger.reservations_for_room(1), vec![id]);
        assert_eq!(ledger.reservations_for_room(2), vec![id]);

        ledger.remove(&id).unwrap();
        assert!(ledger.reservations_for_room(1).is_empty());
        assert!(ledger.is_empty());
    }

    #[test]
    fn active_in_skips_cancelled_and_disjoint() {
        let mut ledger = Ledger::default();
        let live = reservation(&[1], "2026-01-10", "2026-01-12");
        let live_id = live.id;
        let mut gone = reservation(&[2], "2026-01-10", "2026-01-12");
        gone.status = ReservationStatus::Cancelled;
        let later = reservation(&[3], "2026-02-10", "2026-02-12");
        ledger.insert(live);
        ledger.insert(gone);
        ledger.insert(later);

        let range = DateRange::new(d("2026-01-11"), d("2026-01-31"));
        let ids: Vec<_> = ledger.active_in(&range).map(|r| r.id).collect();
        assert_eq!(ids, vec![live_id]);
        assert_eq!(ledger.in_range(&range).count(), 2);
    }

    #[test]
    fn cancel_event_releases_only_listed_overrides() {
        let mut state = BookingState::new(Arc::new(BookingConfig::default()));
        let r = reservation(&[1], "2026-01-10", "2026-01-12");
        let id = r.id;
        state.apply(&Event::ReservationCreated { reservation: r });
        state.apply(&Event::OverrideSet {
            room: 1,
            date: d("2026-01-10"),
            entry: CalendarOverride::blocked("order").attributed_to(id),
        });
        state.apply(&Event::OverrideSet {
            room: 1,
            date: d("2026-01-11"),
            entry: CalendarOverride::blocked("owner"),
        });

        let released = state.attributed_overrides(&id);
        assert_eq!(released, vec![(1, d("2026-01-10"))]);

        state.apply(&Event::ReservationCancelled { id, released });
        assert_eq!(state.ledger.get(&id).unwrap().status, ReservationStatus::Cancelled);
        assert!(state.calendar.get_override(1, d("2026-01-10")).is_none());
        assert!(state.calendar.get_override(1, d("2026-01-11")).is_some());
    }

    #[test]
    fn snapshot_replays_to_same_state() {
        let mut state = BookingState::new(Arc::new(BookingConfig::default()));
        state.apply(&Event::ReservationCreated {
            reservation: reservation(&[1], "2026-01-10", "2026-01-12"),
        });
        state.apply(&Event::OverrideSet {
            room: 1,
            date: d("2026-03-01"),
            entry: CalendarOverride::price_only(Decimal::from(70)),
        });
        state.apply(&Event::PrivateEventSet {
            date: d("2026-03-02"),
            event: PrivateEvent {
                mode: PrivateEventMode::SpecialPricing,
                name: "Festival".into(),
                price: Decimal::from(150),
            },
        });

        let mut rebuilt = BookingState::new(state.config.clone());
        for e in state.snapshot_events() {
            rebuilt.apply(&e);
        }
        assert_eq!(rebuilt.ledger.len(), 1);
        assert_eq!(rebuilt.calendar.override_count(), 1);
        assert_eq!(
            rebuilt.calendar.private_event(d("2026-03-02")).unwrap().name,
            "Festival"
        );
    }
}
