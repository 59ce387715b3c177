use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::config::BookingConfig;
use crate::limits::*;
use crate::model::*;

use super::availability::{blocked_rooms, booked_counts};
use super::pricing::compute_total;
use super::store::{BookingState, CalendarState};
use super::BookingError;

/// A hold that passed every check, priced against the same state snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValidatedHold {
    pub stay: Stay,
    pub selection: RoomSelection,
    pub total: Money,
}

pub(crate) fn parse_date(field: &str, value: &str) -> Result<NaiveDate, BookingError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(BookingError::InvalidInput(format!("{field} is required")));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        BookingError::InvalidInput(format!("{field} must be a YYYY-MM-DD date, got {value:?}"))
    })
}

pub(crate) fn parse_stay(check_in: &str, check_out: &str) -> Result<Stay, BookingError> {
    let check_in = parse_date("check_in", check_in)?;
    let check_out = parse_date("check_out", check_out)?;
    if check_in >= check_out {
        return Err(BookingError::InvalidInput(
            "check_out must be after check_in".into(),
        ));
    }
    let stay = Stay::new(check_in, check_out);
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(BookingError::LimitExceeded("stay too long"));
    }
    Ok(stay)
}

/// Explicit rooms win over a quantity; private-all wins over both.
pub(crate) fn normalize_selection(
    config: &BookingConfig,
    rooms_qty: u32,
    room_ids: &[RoomId],
    private_all: bool,
) -> Result<RoomSelection, BookingError> {
    if private_all {
        return Ok(RoomSelection::All);
    }
    if !room_ids.is_empty() {
        if let Some(bad) = room_ids.iter().find(|r| !config.contains_room(**r)) {
            return Err(BookingError::InvalidInput(format!(
                "room {bad} does not exist (rooms are 1..={})",
                config.total_rooms
            )));
        }
        return Ok(RoomSelection::Rooms(room_ids.iter().copied().collect()));
    }
    if rooms_qty == 0 {
        return Err(BookingError::InvalidInput("select at least one room".into()));
    }
    Ok(RoomSelection::Quantity(rooms_qty))
}

pub(crate) fn validate_guest(guest: &GuestInfo) -> Result<(), BookingError> {
    if guest.name.trim().is_empty() {
        return Err(BookingError::InvalidInput("guest name is required".into()));
    }
    let email = guest.email.trim();
    let well_formed = email
        .split_once('@')
        .is_some_and(|(user, host)| !user.is_empty() && host.contains('.') && !host.ends_with('.'));
    if !well_formed {
        return Err(BookingError::InvalidInput(format!("invalid guest email {email:?}")));
    }
    let too_long = [Some(&guest.name), Some(&guest.email), guest.phone.as_ref(), guest.notes.as_ref()]
        .into_iter()
        .flatten()
        .any(|field| field.len() > MAX_GUEST_FIELD_LEN);
    if too_long {
        return Err(BookingError::LimitExceeded("guest field too long"));
    }
    Ok(())
}

/// A private-only event on any night forces a whole-property booking.
pub(crate) fn check_private_events(
    calendar: &CalendarState,
    stay: &Stay,
    selection: &RoomSelection,
) -> Result<(), BookingError> {
    if selection.is_all() {
        return Ok(());
    }
    for date in stay.dates() {
        if let Some(event) = calendar.private_event(date)
            && event.mode == PrivateEventMode::PrivateOnly
        {
            return Err(BookingError::PrivateEventOnly {
                date,
                event_name: event.name.clone(),
            });
        }
    }
    Ok(())
}

/// Explicitly chosen rooms must carry no occupying override on any night.
pub(crate) fn check_rooms_free(
    calendar: &CalendarState,
    stay: &Stay,
    rooms: &BTreeSet<RoomId>,
) -> Result<(), BookingError> {
    for date in stay.dates() {
        for room in rooms {
            if calendar
                .get_override(*room, date)
                .is_some_and(CalendarOverride::occupies)
            {
                return Err(BookingError::RoomUnavailable { room: *room, date });
            }
        }
    }
    Ok(())
}

/// Blocked plus booked plus requested rooms must fit in the pool every night.
pub(crate) fn check_capacity(
    state: &BookingState,
    stay: &Stay,
    requested: u32,
) -> Result<(), BookingError> {
    let total_rooms = state.config.total_rooms;
    let nights = DateRange::from(*stay);
    let booked = booked_counts(&state.ledger, &nights, total_rooms);
    let blocked = blocked_rooms(&state.calendar, &nights, total_rooms);

    for date in stay.dates() {
        let booked_today = booked.get(&date).copied().unwrap_or(0);
        let blocked_today = blocked.get(&date).map_or(0, |rooms| rooms.len() as u32);
        let available = total_rooms
            .saturating_sub(blocked_today)
            .saturating_sub(booked_today);
        if available < requested {
            return Err(BookingError::InsufficientCapacity {
                date,
                available,
                requested,
            });
        }
    }
    Ok(())
}

/// Private events, room overrides and capacity, short-circuiting on the first failure.
pub(crate) fn check_stay(
    state: &BookingState,
    stay: &Stay,
    selection: &RoomSelection,
) -> Result<(), BookingError> {
    check_private_events(&state.calendar, stay, selection)?;
    if let RoomSelection::Rooms(rooms) = selection {
        check_rooms_free(&state.calendar, stay, rooms)?;
    }
    check_capacity(state, stay, selection.rooms_requested(state.config.total_rooms))
}

/// Full hold validation: input, private events, rooms, capacity, price.
/// Must run under the same write guard as the commit that follows it.
pub(crate) fn validate_hold(
    state: &BookingState,
    request: &HoldRequest,
) -> Result<ValidatedHold, BookingError> {
    let stay = parse_stay(&request.check_in, &request.check_out)?;
    let selection = normalize_selection(
        &state.config,
        request.rooms_qty,
        &request.room_ids,
        request.private_all,
    )?;
    validate_guest(&request.guest)?;

    check_stay(state, &stay, &selection)?;

    let total = compute_total(&state.calendar, &state.config, &selection, Some(&stay), None)?;
    Ok(ValidatedHold {
        stay,
        selection,
        total,
    })
}
