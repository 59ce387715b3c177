use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::config::BookingConfig;
use crate::limits::*;
use crate::model::*;

use super::availability::compute_availability;
use super::pricing::compute_total;
use super::validate::{check_stay, normalize_selection, parse_stay};
use super::{BookingError, Engine};

impl Engine {
    /// Occupied dates, daily prices, private events and per-day occupancy for
    /// `[from, to]` inclusive. `detailed` adds the raw override map.
    pub async fn get_availability(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        detailed: bool,
    ) -> Result<Availability, BookingError> {
        let range = checked_range(from, to)?;
        let state = self.state.read().await;
        Ok(compute_availability(&state, &range, detailed))
    }

    /// Same as `get_availability` for ISO `YYYY-MM-DD` inputs. Unparseable
    /// dates fail with `InvalidDateRange`.
    pub async fn get_availability_iso(
        &self,
        from: &str,
        to: &str,
        detailed: bool,
    ) -> Result<Availability, BookingError> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| BookingError::InvalidDateRange)
        };
        self.get_availability(parse(from)?, parse(to)?, detailed).await
    }

    /// Validate and price without committing anything.
    ///
    /// With both dates, the full hold checks run against the current state.
    /// With neither, the flat fallback applies: rooms × default price, or the
    /// price of the private event on `event_date` for a whole-property quote.
    pub async fn quote(&self, request: QuoteRequest) -> Result<Quote, BookingError> {
        let state = self.state.read().await;
        let selection = normalize_selection(
            &state.config,
            request.rooms_qty,
            &request.room_ids,
            request.private_all,
        )?;

        let (total, nights) = match (request.check_in.as_deref(), request.check_out.as_deref()) {
            (Some(check_in), Some(check_out)) => {
                let stay = parse_stay(check_in, check_out)?;
                check_stay(&state, &stay, &selection)?;
                let total = compute_total(&state.calendar, &state.config, &selection, Some(&stay), None)?;
                (total, Some(stay.nights()))
            }
            (None, None) => {
                let event = request
                    .event_date
                    .and_then(|date| state.calendar.private_event(date));
                let total = compute_total(&state.calendar, &state.config, &selection, None, event)?;
                (total, None)
            }
            _ => {
                return Err(BookingError::InvalidInput(
                    "check_in and check_out must be given together".into(),
                ));
            }
        };

        Ok(Quote {
            total,
            deposit: state.config.deposit_for(total)?,
            currency: state.config.currency.clone(),
            nights,
        })
    }

    pub async fn get_reservation(&self, id: &ReservationId) -> Option<Reservation> {
        self.state.read().await.ledger.get(id).cloned()
    }

    /// Reservations of any status with a night inside `[from, to]`, by check-in.
    pub async fn list_reservations(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Reservation>, BookingError> {
        let range = checked_range(from, to)?;
        let state = self.state.read().await;
        let mut result: Vec<Reservation> = state.ledger.in_range(&range).cloned().collect();
        result.sort_by_key(|r| (r.stay.check_in, r.id));
        Ok(result)
    }

    /// Reservations that chose `room` explicitly, any status, by check-in.
    /// Quantity and whole-property reservations are not tied to a room.
    pub async fn reservations_for_room(&self, room: RoomId) -> Vec<Reservation> {
        let state = self.state.read().await;
        let mut result: Vec<Reservation> = state
            .ledger
            .reservations_for_room(room)
            .iter()
            .filter_map(|id| state.ledger.get(id).cloned())
            .collect();
        result.sort_by_key(|r| (r.stay.check_in, r.id));
        result
    }

    pub async fn get_override(&self, room: RoomId, date: NaiveDate) -> Option<CalendarOverride> {
        self.state.read().await.calendar.get_override(room, date).cloned()
    }

    pub async fn get_private_event(&self, date: NaiveDate) -> Option<PrivateEvent> {
        self.state.read().await.calendar.private_event(date).cloned()
    }

    pub async fn config(&self) -> Arc<BookingConfig> {
        self.state.read().await.config.clone()
    }

    /// Pending holds created more than `pending_hold_ttl_minutes` before `now`.
    /// Empty when no TTL is configured.
    pub async fn collect_stale_holds(&self, now: DateTime<Utc>) -> Vec<ReservationId> {
        let state = self.state.read().await;
        let Some(ttl) = state.config.pending_hold_ttl_minutes else {
            return Vec::new();
        };
        let Some(cutoff) = i64::try_from(ttl)
            .ok()
            .and_then(Duration::try_minutes)
            .and_then(|ttl| now.checked_sub_signed(ttl))
        else {
            return Vec::new();
        };
        state
            .ledger
            .iter()
            .filter(|r| r.status == ReservationStatus::Pending && r.created_at <= cutoff)
            .map(|r| r.id)
            .collect()
    }
}

fn checked_range(from: NaiveDate, to: NaiveDate) -> Result<DateRange, BookingError> {
    if from > to {
        return Err(BookingError::InvalidDateRange);
    }
    let range = DateRange::new(from, to);
    if range.days() > MAX_QUERY_DAYS {
        return Err(BookingError::LimitExceeded("date range too wide"));
    }
    Ok(range)
}
