use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::config::BookingConfig;
use crate::model::*;

use super::store::{BookingState, CalendarState, Ledger};

// ── Availability Algorithm ────────────────────────────────────────

/// Rooms consumed per day by pending/paid reservations.
///
/// Quantity based: a private-all reservation counts `total_rooms`, anything
/// else counts its `rooms_qty`, whether or not explicit rooms were chosen.
pub fn booked_counts(ledger: &Ledger, range: &DateRange, total_rooms: u32) -> BTreeMap<NaiveDate, u32> {
    let mut counts: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for reservation in ledger.active_in(range) {
        let consumed = reservation.rooms_consumed(total_rooms);
        for date in reservation.stay.dates().filter(|d| range.contains(*d)) {
            let slot = counts.entry(date).or_default();
            *slot = slot.saturating_add(consumed);
        }
    }
    counts
}

/// Distinct rooms per day carrying an occupying override. Rooms outside
/// `1..=total_rooms` are ignored.
pub fn blocked_rooms(
    calendar: &CalendarState,
    range: &DateRange,
    total_rooms: u32,
) -> BTreeMap<NaiveDate, BTreeSet<RoomId>> {
    let mut blocked: BTreeMap<NaiveDate, BTreeSet<RoomId>> = BTreeMap::new();
    for (date, room, entry) in calendar.overrides_in(range) {
        if entry.occupies() && room >= 1 && room <= total_rooms {
            blocked.entry(date).or_default().insert(room);
        }
    }
    blocked
}

/// Advertised price for a day.
///
/// Precedence: cheapest override price set on any room that day; then a
/// special-pricing event's price; then the "starting from" price. A
/// private-only event's price is a whole-property price and never shown here.
pub fn resolve_day_price(calendar: &CalendarState, config: &BookingConfig, date: NaiveDate) -> Money {
    let day = DateRange::new(date, date);
    let cheapest_override = calendar
        .overrides_in(&day)
        .filter_map(|(_, _, entry)| entry.price)
        .filter(|p| !p.is_sign_negative())
        .min();
    if let Some(price) = cheapest_override {
        return price;
    }
    match calendar.private_event(date) {
        Some(event) if event.mode == PrivateEventMode::SpecialPricing => event.price,
        _ => config.starting_price(),
    }
}

/// Occupancy, prices and private events for every day in the range.
/// A day is occupied once booked + blocked rooms reach `total_rooms`.
pub fn compute_availability(state: &BookingState, range: &DateRange, detailed: bool) -> Availability {
    let total_rooms = state.config.total_rooms;
    let booked = booked_counts(&state.ledger, range, total_rooms);
    let blocked = blocked_rooms(&state.calendar, range, total_rooms);

    let mut result = Availability::default();
    for date in range.dates() {
        let booked_today = booked.get(&date).copied().unwrap_or(0);
        let blocked_today = blocked.get(&date).map_or(0, |rooms| rooms.len() as u32);
        let used = booked_today.saturating_add(blocked_today);
        if used >= total_rooms {
            result.occupied_dates.push(date);
        }
        result.occupancy.insert(
            date,
            DayOccupancy {
                booked: booked_today,
                blocked: blocked_today,
                available: total_rooms.saturating_sub(used),
            },
        );
        result
            .daily_prices
            .insert(date, resolve_day_price(&state.calendar, &state.config, date));
    }

    result.private_events = state
        .calendar
        .private_events_in(range)
        .map(|(date, event)| (date, event.clone()))
        .collect();

    if detailed {
        let mut rooms: BTreeMap<RoomId, BTreeMap<NaiveDate, CalendarOverride>> = BTreeMap::new();
        for (date, room, entry) in state.calendar.overrides_in(range) {
            rooms.entry(room).or_default().insert(date, entry.clone());
        }
        result.blocked_rooms = Some(rooms);
    }
    result
}
