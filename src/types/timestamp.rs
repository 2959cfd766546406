use chrono::{DateTime, Local, TimeZone};

/// Wall-clock timestamp expressed in milliseconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Local::now().timestamp_millis())
    }

    /// Human readable local time, e.g. `2024-05-01 10:12:33.123 +02:00`.
    pub fn to_local_string(&self) -> String {
        match Local.timestamp_millis_opt(self.0).single() {
            Some(dt) => format_local(&dt),
            None => self.0.to_string(),
        }
    }
}

fn format_local(dt: &DateTime<Local>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.3f %:z").to_string()
}

impl From<i64> for Timestamp {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Timestamp> for i64 {
    fn from(value: Timestamp) -> Self {
        value.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_local_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_monotonic_enough() {
        let a = Timestamp::now();
        let b = Timestamp::now();
        assert!(b >= a);
        assert!(i64::from(a) > 0);
    }

    #[test]
    fn millis_round_trip() {
        let ts = Timestamp::from(1_700_000_000_000);
        assert_eq!(i64::from(ts), 1_700_000_000_000);
        assert!(ts.to_local_string().starts_with("2023-11-1"));
    }
}
