use chrono::{DateTime, Utc};

use crate::models::Room;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Nights between two instants: whole days, rounded up, never less than one.
///
/// The range is measured by absolute distance, so swapped dates count the
/// same as ordered ones. This follows the `ceil(|out - in|)` formula rather
/// than the looser reading that any inverted range is a single night; only a
/// zero-length range is floored to 1.
pub fn calculate_nights(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> u32 {
    let seconds = (check_out - check_in).num_seconds().unsigned_abs();
    let nights = seconds.div_ceil(SECONDS_PER_DAY).max(1);
    u32::try_from(nights).unwrap_or(u32::MAX)
}

pub fn calculate_total_price(price_per_night: f64, nights: u32) -> f64 {
    price_per_night * f64::from(nights)
}

pub fn is_room_full(room: &Room) -> bool {
    room.available == 0
}
