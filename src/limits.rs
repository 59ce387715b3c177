/// Widest calendar window a single availability query may span (two years).
pub const MAX_QUERY_DAYS: i64 = 732;

/// Longest stay a hold may request.
pub const MAX_STAY_NIGHTS: i64 = 365;

/// Upper bound on the configured room pool.
pub const MAX_ROOMS: u32 = 10_000;

pub const MAX_REASON_LEN: usize = 512;

pub const MAX_EVENT_NAME_LEN: usize = 256;

/// Applies to each guest text field (name, email, phone, notes).
pub const MAX_GUEST_FIELD_LEN: usize = 1024;

/// Highest nightly price an override, event or configured rate may carry, in
/// currency units.
pub const MAX_PRICE: i64 = 1_000_000_000;
