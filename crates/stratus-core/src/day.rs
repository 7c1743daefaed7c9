//! Calendar-day keys for the usage ledger.
//!
//! The DayKey is the only temporal dimension of ledger state; rollover
//! correctness comes from the date embedded in the key, not from TTL
//! precision.

use chrono::{Datelike, Local, TimeZone, Utc};

/// Time zone used to derive the DayKey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayZone {
    /// Server-local calendar day (matches the original deployment).
    Local,
    /// UTC calendar day for fleets spanning zones.
    Utc,
}

/// Produces `YYYY-MM-DD` keys and midnight-rollover hints.
#[derive(Debug, Clone, Copy)]
pub struct DayClock {
    zone: DayZone,
}

impl DayClock {
    pub fn new(zone: DayZone) -> Self {
        DayClock { zone }
    }

    /// Current DayKey, e.g. `2026-08-02`.
    pub fn today(&self) -> String {
        match self.zone {
            DayZone::Local => Local::now().format("%Y-%m-%d").to_string(),
            DayZone::Utc => Utc::now().format("%Y-%m-%d").to_string(),
        }
    }

    /// Seconds until the next midnight in the configured zone. Used as
    /// the Retry-After hint when the credential pool is exhausted.
    pub fn secs_until_rollover(&self) -> u64 {
        match self.zone {
            DayZone::Local => {
                let now = Local::now();
                let tomorrow = now.date_naive() + chrono::Days::new(1);
                let Some(midnight) = tomorrow.and_hms_opt(0, 0, 0) else {
                    return 3600;
                };
                match Local.from_local_datetime(&midnight).earliest() {
                    Some(next) => (next - now).num_seconds().max(1) as u64,
                    // DST gap at midnight; one hour is a safe hint.
                    None => 3600,
                }
            },
            DayZone::Utc => {
                let now = Utc::now();
                let tomorrow = now.date_naive() + chrono::Days::new(1);
                let Some(midnight) = tomorrow.and_hms_opt(0, 0, 0) else {
                    return 3600;
                };
                let next = Utc.from_utc_datetime(&midnight);
                (next - now).num_seconds().max(1) as u64
            },
        }
    }
}

/// Validates that a string is a plausible DayKey. Test fixtures inject
/// explicit keys; this guards against malformed ones.
pub fn is_day_key(candidate: &str) -> bool {
    chrono::NaiveDate::parse_from_str(candidate, "%Y-%m-%d")
        .map(|d| d.year() >= 2000)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_today_is_a_day_key() {
        assert!(is_day_key(&DayClock::new(DayZone::Local).today()));
        assert!(is_day_key(&DayClock::new(DayZone::Utc).today()));
    }

    #[test]
    fn test_rollover_hint_is_within_a_day() {
        for zone in [DayZone::Local, DayZone::Utc] {
            let secs = DayClock::new(zone).secs_until_rollover();
            assert!(secs >= 1);
            assert!(secs <= 86_400 + 3600, "got {secs}");
        }
    }

    #[test]
    fn test_is_day_key_rejects_garbage() {
        assert!(is_day_key("2026-08-02"));
        assert!(!is_day_key("2026-13-02"));
        assert!(!is_day_key("today"));
        assert!(!is_day_key("1999-01-01"));
    }
}
