use std::path::PathBuf;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::engine::BookingError;
use crate::limits::{MAX_PRICE, MAX_ROOMS};
use crate::model::{Money, RoomId};

/// Per-room rate card entry. Index `i` in [`BookingConfig::rooms`] describes room `i + 1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomRate {
    pub name: Option<String>,
    pub price: Option<Money>,
    /// Advisory display price; never charged by the engine.
    pub earlybird_price: Option<Money>,
}

/// Property settings injected into the engine. Replaced wholesale, never mutated
/// in place; `version` must grow with every replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    pub version: u64,
    pub total_rooms: u32,
    pub default_room_price: Money,
    pub rooms: Vec<RoomRate>,
    pub deposit_percent: Decimal,
    pub earlybird_days: u32,
    pub currency: String,
    /// Pending holds older than this are failed by the reaper. `None` keeps them forever.
    pub pending_hold_ttl_minutes: Option<u64>,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            version: 1,
            total_rooms: 1,
            default_room_price: Decimal::ZERO,
            rooms: Vec::new(),
            deposit_percent: Decimal::from(30),
            earlybird_days: 30,
            currency: "EUR".into(),
            pending_hold_ttl_minutes: None,
        }
    }
}

impl BookingConfig {
    /// Parse the JSON settings blob. Monetary values are decimal strings.
    pub fn from_json(json: &str) -> Result<Self, BookingError> {
        let config: BookingConfig = serde_json::from_str(json)
            .map_err(|e| BookingError::InvalidInput(format!("config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BookingError> {
        if self.total_rooms > MAX_ROOMS {
            return Err(BookingError::LimitExceeded("too many rooms"));
        }
        if self.rooms.len() > self.total_rooms as usize {
            return Err(BookingError::InvalidInput(format!(
                "{} room rates configured for {} rooms",
                self.rooms.len(),
                self.total_rooms
            )));
        }
        if self.deposit_percent < Decimal::ZERO || self.deposit_percent > Decimal::ONE_HUNDRED {
            return Err(BookingError::InvalidInput(
                "deposit_percent must be between 0 and 100".into(),
            ));
        }
        if !price_in_bounds(self.default_room_price) {
            return Err(BookingError::InvalidInput(format!(
                "default_room_price must be between 0 and {MAX_PRICE}"
            )));
        }
        let bad_rate = self.rooms.iter().any(|r| {
            r.price.is_some_and(|p| !price_in_bounds(p))
                || r.earlybird_price.is_some_and(|p| !price_in_bounds(p))
        });
        if bad_rate {
            return Err(BookingError::InvalidInput(format!(
                "room prices must be between 0 and {MAX_PRICE}"
            )));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(BookingError::InvalidInput(format!(
                "currency must be a 3-letter ISO code, got {:?}",
                self.currency
            )));
        }
        Ok(())
    }

    pub fn contains_room(&self, room: RoomId) -> bool {
        room >= 1 && room <= self.total_rooms
    }

    fn rate(&self, room: RoomId) -> Option<&RoomRate> {
        let idx = usize::try_from(room).ok()?.checked_sub(1)?;
        self.rooms.get(idx)
    }

    /// The room's own standard price, if it has one.
    pub fn configured_room_price(&self, room: RoomId) -> Option<Money> {
        self.rate(room).and_then(|r| r.price)
    }

    /// Standard price for a room, falling back to the global default.
    pub fn room_price(&self, room: RoomId) -> Money {
        self.configured_room_price(room)
            .unwrap_or(self.default_room_price)
    }

    /// "Starting from" price: cheapest configured standard price, else the default.
    pub fn starting_price(&self) -> Money {
        self.rooms
            .iter()
            .filter_map(|r| r.price)
            .min()
            .unwrap_or(self.default_room_price)
    }

    /// `round(total × deposit_percent / 100, 2)`, midpoint away from zero.
    pub fn deposit_for(&self, total: Money) -> Result<Money, BookingError> {
        total
            .checked_mul(self.deposit_percent)
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            .map(|v| v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
            .ok_or(BookingError::InvalidTotal(total))
    }

    pub fn earlybird_applies(&self, check_in: NaiveDate, today: NaiveDate) -> bool {
        (check_in - today).num_days() >= i64::from(self.earlybird_days)
    }

    /// Price to show for a room. Uses the early-bird price when booking far enough ahead.
    pub fn display_price(&self, room: RoomId, check_in: NaiveDate, today: NaiveDate) -> Money {
        if self.earlybird_applies(check_in, today)
            && let Some(eb) = self.rate(room).and_then(|r| r.earlybird_price)
        {
            return eb;
        }
        self.room_price(room)
    }
}

/// Non-negative and no higher than `MAX_PRICE`.
pub fn price_in_bounds(price: Money) -> bool {
    !price.is_sign_negative() && price <= Decimal::from(MAX_PRICE)
}

/// Where and how the engine persists its log, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        let data_dir = std::env::var("ROOMHOLD_DATA_DIR").unwrap_or_else(|_| "./data".into());
        let compact_threshold: u64 = std::env::var("ROOMHOLD_COMPACT_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000);
        let metrics_port: Option<u16> = std::env::var("ROOMHOLD_METRICS_PORT")
            .ok()
            .and_then(|s| s.parse().ok());
        Self {
            data_dir: PathBuf::from(data_dir),
            compact_threshold,
            metrics_port,
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("roomhold.wal")
    }
}
