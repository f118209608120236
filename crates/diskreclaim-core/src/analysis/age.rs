/// File age helpers used by age-threshold filters.
use std::time::{Duration, SystemTime};

const SECS_PER_DAY: u64 = 24 * 3600;

/// Whole days elapsed between `modified` and `now`.
///
/// `None` when the timestamp is missing or lies in the future.
pub fn age_days(modified: Option<SystemTime>, now: SystemTime) -> Option<u64> {
    let age = now.duration_since(modified?).ok()?;
    Some(age.as_secs() / SECS_PER_DAY)
}

/// `true` if `modified` is at least `min_days` days before `now`.
///
/// Entries without a timestamp never qualify: an unknown age is not an old one.
pub fn is_older_than(modified: Option<SystemTime>, min_days: u64, now: SystemTime) -> bool {
    let Some(modified) = modified else {
        return false;
    };
    match now.duration_since(modified) {
        Ok(age) => age >= Duration::from_secs(min_days.saturating_mul(SECS_PER_DAY)),
        Err(_) => min_days == 0,
    }
}
