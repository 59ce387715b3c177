pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod reaper;
pub mod wal;

pub use config::{BookingConfig, RoomRate, StoreConfig};
pub use engine::{BookingError, Engine};
pub use notify::{NotifyHub, Topic};
