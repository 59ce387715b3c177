use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::config::BookingConfig;
use crate::model::*;

use super::store::CalendarState;
use super::BookingError;

/// Price of one concrete room for one night.
///
/// Precedence: non-negative override price for the room/date, special-pricing
/// event price, the room's configured price, the global default.
pub fn room_night_price(
    calendar: &CalendarState,
    config: &BookingConfig,
    room: RoomId,
    date: NaiveDate,
) -> Money {
    if let Some(price) = calendar
        .get_override(room, date)
        .and_then(|entry| entry.price)
        .filter(|p| !p.is_sign_negative())
    {
        return price;
    }
    if let Some(event) = special_pricing(calendar, date) {
        return event.price;
    }
    config.room_price(room)
}

/// Price of one unassigned room (quantity selection) for one night. No
/// concrete room is known, so only the special-pricing event and the global
/// default apply.
fn unassigned_night_price(calendar: &CalendarState, config: &BookingConfig, date: NaiveDate) -> Money {
    special_pricing(calendar, date)
        .map(|event| event.price)
        .unwrap_or(config.default_room_price)
}

fn special_pricing(calendar: &CalendarState, date: NaiveDate) -> Option<&PrivateEvent> {
    calendar
        .private_event(date)
        .filter(|event| event.mode == PrivateEventMode::SpecialPricing)
}

/// Add up prices, failing with `InvalidTotal` (carrying the sum so far) on overflow.
fn checked_sum(prices: impl IntoIterator<Item = Money>) -> Result<Money, BookingError> {
    prices.into_iter().try_fold(Decimal::ZERO, |acc, price| {
        acc.checked_add(price).ok_or(BookingError::InvalidTotal(acc))
    })
}

fn checked_times(price: Money, count: u32) -> Result<Money, BookingError> {
    price
        .checked_mul(Decimal::from(count))
        .ok_or(BookingError::InvalidTotal(price))
}

/// Total for one night of the selection.
pub fn night_total(
    calendar: &CalendarState,
    config: &BookingConfig,
    selection: &RoomSelection,
    date: NaiveDate,
) -> Result<Money, BookingError> {
    if let Some(event) = calendar.private_event(date)
        && event.mode == PrivateEventMode::PrivateOnly
        && selection.is_all()
    {
        // Whole-property price, not summed per room.
        return Ok(event.price);
    }
    match selection {
        RoomSelection::All => checked_sum(
            (1..=config.total_rooms).map(|room| room_night_price(calendar, config, room, date)),
        ),
        RoomSelection::Rooms(rooms) => checked_sum(
            rooms
                .iter()
                .map(|room| room_night_price(calendar, config, *room, date)),
        ),
        RoomSelection::Quantity(qty) => {
            checked_times(unassigned_night_price(calendar, config, date), *qty)
        }
    }
}

/// Total cost of a stay. Nights are `[check_in, check_out)`.
///
/// Without a stay, the legacy flat path applies: rooms × default price, or for
/// a private-all request the price of `fallback_event` when the caller names one.
/// Overflow fails with `InvalidTotal` like a non-positive total does.
pub fn compute_total(
    calendar: &CalendarState,
    config: &BookingConfig,
    selection: &RoomSelection,
    stay: Option<&Stay>,
    fallback_event: Option<&PrivateEvent>,
) -> Result<Money, BookingError> {
    let total: Money = match stay {
        Some(stay) => {
            let nights = stay
                .dates()
                .map(|date| night_total(calendar, config, selection, date))
                .collect::<Result<Vec<_>, _>>()?;
            checked_sum(nights)?
        }
        None => match (selection, fallback_event) {
            (RoomSelection::All, Some(event)) => event.price,
            _ => checked_times(
                config.default_room_price,
                selection.rooms_requested(config.total_rooms),
            )?,
        },
    };
    if total <= Decimal::ZERO {
        return Err(BookingError::InvalidTotal(total));
    }
    Ok(total)
}
