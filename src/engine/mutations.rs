use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::sync::oneshot;
use tracing::{info, warn};
use ulid::Ulid;

use crate::config::{BookingConfig, price_in_bounds};
use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::store::BookingState;
use super::validate::validate_hold;
use super::{BookingError, Engine, WalCommand};

const DEFAULT_BLOCK_REASON: &str = "Blocked by admin";

impl Engine {
    /// Validate, price and commit a hold as one unit under the write guard.
    ///
    /// The new reservation occupies capacity through the ledger only; no
    /// calendar override is written. `ReservationCreated` is broadcast after
    /// the commit and never waited on.
    pub async fn create_hold(&self, request: HoldRequest) -> Result<HoldReceipt, BookingError> {
        let mut state = self.state.write().await;

        let validated = match validate_hold(&state, &request) {
            Ok(v) => v,
            Err(e) => {
                warn!("hold rejected ({} → {}): {e}", request.check_in, request.check_out);
                metrics::counter!(observability::HOLDS_TOTAL, "outcome" => observability::rejection_label(&e))
                    .increment(1);
                return Err(e);
            }
        };

        let config = state.config.clone();
        let deposit = match config.deposit_for(validated.total) {
            Ok(deposit) => deposit,
            Err(e) => {
                metrics::counter!(observability::HOLDS_TOTAL, "outcome" => observability::rejection_label(&e))
                    .increment(1);
                return Err(e);
            }
        };
        let (rooms_qty, room_ids, private_all) = match validated.selection {
            RoomSelection::All => (config.total_rooms, Default::default(), true),
            RoomSelection::Rooms(rooms) => (rooms.len() as u32, rooms, false),
            RoomSelection::Quantity(qty) => (qty, Default::default(), false),
        };
        let reservation = Reservation {
            id: Ulid::new(),
            status: ReservationStatus::Pending,
            stay: validated.stay,
            rooms_qty,
            room_ids,
            private_all,
            total_amount: validated.total,
            deposit_amount: deposit,
            currency: config.currency.clone(),
            guest: request.guest,
            created_at: Utc::now(),
        };
        let receipt = HoldReceipt {
            reservation_id: reservation.id,
            total: reservation.total_amount,
            deposit,
            currency: reservation.currency.clone(),
        };

        if let Err(e) = self
            .persist_and_apply(&mut state, Event::ReservationCreated { reservation })
            .await
        {
            metrics::counter!(observability::HOLDS_TOTAL, "outcome" => observability::rejection_label(&e))
                .increment(1);
            return Err(e);
        }
        metrics::counter!(observability::HOLDS_TOTAL, "outcome" => "created").increment(1);
        info!(
            "hold {} created: {} → {}, total {} {}",
            receipt.reservation_id,
            validated.stay.check_in,
            validated.stay.check_out,
            receipt.total,
            receipt.currency
        );
        Ok(receipt)
    }

    /// Payment captured: pending → paid.
    pub async fn mark_paid(&self, id: ReservationId) -> Result<(), BookingError> {
        self.transition(id, ReservationStatus::Paid).await
    }

    /// Payment failed or abandoned: pending → failed.
    pub async fn mark_failed(&self, id: ReservationId) -> Result<(), BookingError> {
        self.transition(id, ReservationStatus::Failed).await
    }

    async fn transition(&self, id: ReservationId, next: ReservationStatus) -> Result<(), BookingError> {
        let mut state = self.state.write().await;
        check_transition(&state, id, next)?;
        self.persist_and_apply(&mut state, Event::ReservationStatusChanged { id, status: next })
            .await?;
        info!("reservation {id} is now {next}");
        Ok(())
    }

    /// Cancel a pending or paid reservation and drop the overrides stamped for it.
    /// Overrides on the same rooms/dates that belong to nobody, or to another
    /// reservation, survive.
    pub async fn cancel(&self, id: ReservationId) -> Result<(), BookingError> {
        let mut state = self.state.write().await;
        check_transition(&state, id, ReservationStatus::Cancelled)?;
        let released = state.attributed_overrides(&id);
        let count = released.len();
        self.persist_and_apply(&mut state, Event::ReservationCancelled { id, released })
            .await?;
        metrics::counter!(observability::CANCELLATIONS_TOTAL).increment(1);
        info!("reservation {id} cancelled, {count} attributed override(s) released");
        Ok(())
    }

    /// Same override cleanup as `cancel`, then remove the row and its room association.
    pub async fn delete(&self, id: ReservationId) -> Result<(), BookingError> {
        let mut state = self.state.write().await;
        if !state.ledger.contains(&id) {
            return Err(BookingError::NotFound(id));
        }
        let released = state.attributed_overrides(&id);
        let count = released.len();
        self.persist_and_apply(&mut state, Event::ReservationDeleted { id, released })
            .await?;
        metrics::counter!(observability::DELETIONS_TOTAL).increment(1);
        info!("reservation {id} deleted, {count} attributed override(s) released");
        Ok(())
    }

    /// Admin block toggle for one room/date. Idempotent.
    ///
    /// `blocked = true` stores a blocked override carrying the given price, or
    /// the price already set on that room/date when none is given;
    /// `blocked = false` keeps a price-only override when a price is given and
    /// otherwise removes the override.
    pub async fn toggle_block(
        &self,
        room: RoomId,
        date: NaiveDate,
        blocked: bool,
        reason: Option<String>,
        price: Option<Money>,
    ) -> Result<(), BookingError> {
        let mut state = self.state.write().await;
        check_room(&state.config, room)?;
        check_price(price)?;

        let event = match (blocked, price) {
            (true, _) => {
                let reason = reason
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_BLOCK_REASON.to_string());
                check_reason(&reason)?;
                let price = price.or_else(|| {
                    state
                        .calendar
                        .get_override(room, date)
                        .and_then(|existing| existing.price)
                });
                Event::OverrideSet {
                    room,
                    date,
                    entry: CalendarOverride::blocked(reason).with_price(price),
                }
            }
            (false, Some(price)) => Event::OverrideSet {
                room,
                date,
                entry: CalendarOverride::price_only(price),
            },
            (false, None) => {
                if state.calendar.get_override(room, date).is_none() {
                    return Ok(());
                }
                Event::OverrideCleared { room, date }
            }
        };
        self.persist_and_apply(&mut state, event).await?;
        metrics::counter!(observability::OVERRIDE_WRITES_TOTAL).increment(1);
        info!("room {room} on {date}: blocked={blocked}");
        Ok(())
    }

    /// Write an override verbatim (operator or external-sync origin). An
    /// attribution must name an existing reservation.
    pub async fn set_override(
        &self,
        room: RoomId,
        date: NaiveDate,
        entry: CalendarOverride,
    ) -> Result<(), BookingError> {
        let mut state = self.state.write().await;
        check_room(&state.config, room)?;
        check_price(entry.price)?;
        check_reason(&entry.reason)?;
        if let Some(owner) = entry.attribution
            && !state.ledger.contains(&owner)
        {
            return Err(BookingError::NotFound(owner));
        }
        self.persist_and_apply(&mut state, Event::OverrideSet { room, date, entry })
            .await?;
        metrics::counter!(observability::OVERRIDE_WRITES_TOTAL).increment(1);
        Ok(())
    }

    /// Remove an override. Returns whether one existed.
    pub async fn clear_override(&self, room: RoomId, date: NaiveDate) -> Result<bool, BookingError> {
        let mut state = self.state.write().await;
        if state.calendar.get_override(room, date).is_none() {
            return Ok(false);
        }
        self.persist_and_apply(&mut state, Event::OverrideCleared { room, date })
            .await?;
        metrics::counter!(observability::OVERRIDE_WRITES_TOTAL).increment(1);
        Ok(true)
    }

    pub async fn set_private_event(&self, date: NaiveDate, event: PrivateEvent) -> Result<(), BookingError> {
        if event.name.trim().is_empty() {
            return Err(BookingError::InvalidInput("private event name is required".into()));
        }
        if event.name.len() > MAX_EVENT_NAME_LEN {
            return Err(BookingError::LimitExceeded("event name too long"));
        }
        check_price(Some(event.price))?;
        let mut state = self.state.write().await;
        info!("private event \"{}\" ({:?}) set on {date}", event.name, event.mode);
        self.persist_and_apply(&mut state, Event::PrivateEventSet { date, event })
            .await
    }

    /// Returns whether an event existed on that date.
    pub async fn remove_private_event(&self, date: NaiveDate) -> Result<bool, BookingError> {
        let mut state = self.state.write().await;
        if state.calendar.private_event(date).is_none() {
            return Ok(false);
        }
        self.persist_and_apply(&mut state, Event::PrivateEventRemoved { date })
            .await?;
        Ok(true)
    }

    /// Swap in a newer configuration. Existing reservations keep their stored
    /// totals and currency.
    pub async fn reconfigure(&self, config: BookingConfig) -> Result<(), BookingError> {
        config.validate()?;
        let mut state = self.state.write().await;
        if config.version <= state.config.version {
            return Err(BookingError::InvalidInput(format!(
                "config version {} is not newer than active version {}",
                config.version, state.config.version
            )));
        }
        info!(
            "config v{} → v{}: {} rooms",
            state.config.version, config.version, config.total_rooms
        );
        state.config = Arc::new(config);
        Ok(())
    }

    /// Rewrite the WAL as the minimal event list recreating the current state.
    /// Holds the read guard so no mutation interleaves with the snapshot.
    pub async fn compact_wal(&self) -> Result<(), BookingError> {
        let state = self.state.read().await;
        let events = state.snapshot_events();
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| BookingError::Persistence("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::Persistence("WAL writer dropped response".into()))?
            .map_err(|e| BookingError::Persistence(e.to_string()))?;
        info!("WAL compacted to {count} events");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

fn check_transition(
    state: &BookingState,
    id: ReservationId,
    next: ReservationStatus,
) -> Result<(), BookingError> {
    let current = state
        .ledger
        .get(&id)
        .ok_or(BookingError::NotFound(id))?
        .status;
    if !current.can_transition_to(next) {
        return Err(BookingError::InvalidTransition { from: current, to: next });
    }
    Ok(())
}

fn check_room(config: &BookingConfig, room: RoomId) -> Result<(), BookingError> {
    if !config.contains_room(room) {
        return Err(BookingError::InvalidInput(format!(
            "room {room} does not exist (rooms are 1..={})",
            config.total_rooms
        )));
    }
    Ok(())
}

fn check_price(price: Option<Money>) -> Result<(), BookingError> {
    if price.is_some_and(|p| !price_in_bounds(p)) {
        return Err(BookingError::InvalidInput(format!(
            "price must be between 0 and {MAX_PRICE}"
        )));
    }
    Ok(())
}

fn check_reason(reason: &str) -> Result<(), BookingError> {
    if reason.len() > MAX_REASON_LEN {
        return Err(BookingError::LimitExceeded("reason too long"));
    }
    Ok(())
}
