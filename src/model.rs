use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// 1-based room number, never above `total_rooms`.
pub type RoomId = u32;

pub type ReservationId = Ulid;

pub type Money = Decimal;

/// Half-open night range `[check_in, check_out)`. The checkout day is not occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stay {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl Stay {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        debug_assert!(check_in < check_out, "Stay check_in must be before check_out");
        Self { check_in, check_out }
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// Every occupied date, checkout excluded.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.check_out;
        self.check_in.iter_days().take_while(move |d| *d < end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.check_in <= date && date < self.check_out
    }

    pub fn intersects(&self, range: &DateRange) -> bool {
        self.check_in <= range.to && range.from < self.check_out
    }
}

/// Closed date range `[from, to]` used for calendar queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        debug_assert!(from <= to, "DateRange from must not be after to");
        Self { from, to }
    }

    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.to;
        self.from.iter_days().take_while(move |d| *d <= end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

impl From<Stay> for DateRange {
    /// The nights of a stay as a closed range (last night = day before checkout).
    fn from(stay: Stay) -> Self {
        let last_night = stay.check_out.pred_opt().unwrap_or(stay.check_in);
        Self::new(stay.check_in, last_night.max(stay.check_in))
    }
}

// ── Reservations ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Paid,
    Cancelled,
    Failed,
}

impl ReservationStatus {
    /// Pending and paid reservations consume capacity.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Paid)
    }

    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Pending, Paid) | (Pending, Cancelled) | (Pending, Failed) | (Paid, Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guest details. Opaque to the engine apart from the required-field checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuestInfo {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub age: Option<u32>,
    pub notes: Option<String>,
}

/// Which rooms a request asks for, after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomSelection {
    /// Any `n` rooms.
    Quantity(u32),
    /// These concrete rooms.
    Rooms(BTreeSet<RoomId>),
    /// The whole property.
    All,
}

impl RoomSelection {
    /// Rooms consumed per night for capacity accounting.
    pub fn rooms_requested(&self, total_rooms: u32) -> u32 {
        match self {
            Self::Quantity(n) => *n,
            Self::Rooms(rooms) => rooms.len() as u32,
            Self::All => total_rooms,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub status: ReservationStatus,
    pub stay: Stay,
    /// Rooms consumed per night. Equals `room_ids.len()` when explicit rooms were chosen.
    pub rooms_qty: u32,
    pub room_ids: BTreeSet<RoomId>,
    pub private_all: bool,
    pub total_amount: Money,
    pub deposit_amount: Money,
    pub currency: String,
    pub guest: GuestInfo,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// Ledger contribution to a night's booked-room counter. Quantity based,
    /// explicit room ids are not consulted.
    pub fn rooms_consumed(&self, total_rooms: u32) -> u32 {
        if self.private_all {
            total_rooms
        } else {
            self.rooms_qty
        }
    }

    pub fn selection(&self) -> RoomSelection {
        if self.private_all {
            RoomSelection::All
        } else if !self.room_ids.is_empty() {
            RoomSelection::Rooms(self.room_ids.clone())
        } else {
            RoomSelection::Quantity(self.rooms_qty)
        }
    }
}

// ── Calendar overrides ───────────────────────────────────────────

/// Administrative or synced occupancy of a single room/date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideStatus {
    Blocked,
    Booked,
    Pending,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarOverride {
    /// `None` marks a price-only override; the room stays free.
    pub status: Option<OverrideStatus>,
    pub reason: String,
    pub price: Option<Money>,
    /// Reservation this entry was stamped for, if any. Only attributed entries
    /// are removed when that reservation is cancelled or deleted.
    pub attribution: Option<ReservationId>,
}

impl CalendarOverride {
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            status: Some(OverrideStatus::Blocked),
            reason: reason.into(),
            price: None,
            attribution: None,
        }
    }

    pub fn price_only(price: Money) -> Self {
        Self {
            status: None,
            reason: String::new(),
            price: Some(price),
            attribution: None,
        }
    }

    pub fn with_price(mut self, price: Option<Money>) -> Self {
        self.price = price;
        self
    }

    pub fn attributed_to(mut self, id: ReservationId) -> Self {
        self.attribution = Some(id);
        self
    }

    pub fn occupies(&self) -> bool {
        self.status.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivateEventMode {
    /// Only whole-property bookings may cover the date; `price` is the whole-property price.
    PrivateOnly,
    /// Individual rooms stay bookable at `price` per room.
    SpecialPricing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateEvent {
    pub mode: PrivateEventMode,
    pub name: String,
    pub price: Money,
}

// ── WAL records ──────────────────────────────────────────────────

/// Flat event types. This is the WAL record format and the
/// payload broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ReservationCreated {
        reservation: Reservation,
    },
    ReservationStatusChanged {
        id: ReservationId,
        status: ReservationStatus,
    },
    /// Status becomes cancelled and the listed attributed overrides go away.
    ReservationCancelled {
        id: ReservationId,
        released: Vec<(RoomId, NaiveDate)>,
    },
    ReservationDeleted {
        id: ReservationId,
        released: Vec<(RoomId, NaiveDate)>,
    },
    OverrideSet {
        room: RoomId,
        date: NaiveDate,
        entry: CalendarOverride,
    },
    OverrideCleared {
        room: RoomId,
        date: NaiveDate,
    },
    PrivateEventSet {
        date: NaiveDate,
        event: PrivateEvent,
    },
    PrivateEventRemoved {
        date: NaiveDate,
    },
}

// ── Requests ─────────────────────────────────────────────────────

/// Raw hold request as submitted by the booking form. Dates are ISO `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoldRequest {
    pub check_in: String,
    pub check_out: String,
    pub rooms_qty: u32,
    pub room_ids: Vec<RoomId>,
    pub private_all: bool,
    pub guest: GuestInfo,
}

/// Price request without commitment. Absent dates select the legacy flat pricing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteRequest {
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub rooms_qty: u32,
    pub room_ids: Vec<RoomId>,
    pub private_all: bool,
    /// Private event whose price applies to an undated whole-property quote.
    pub event_date: Option<NaiveDate>,
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoldReceipt {
    pub reservation_id: ReservationId,
    pub total: Money,
    pub deposit: Money,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub total: Money,
    pub deposit: Money,
    pub currency: String,
    pub nights: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DayOccupancy {
    /// Rooms consumed by pending/paid reservations.
    pub booked: u32,
    /// Distinct rooms carrying an occupying override.
    pub blocked: u32,
    pub available: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub occupied_dates: Vec<NaiveDate>,
    pub daily_prices: BTreeMap<NaiveDate, Money>,
    pub private_events: BTreeMap<NaiveDate, PrivateEvent>,
    pub occupancy: BTreeMap<NaiveDate, DayOccupancy>,
    /// Raw override map, only for detailed queries.
    pub blocked_rooms: Option<BTreeMap<RoomId, BTreeMap<NaiveDate, CalendarOverride>>>,
}
