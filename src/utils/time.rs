use std::time::Duration;

use chrono::{DateTime, Utc};

/// Current wall-clock time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time in milliseconds since the epoch.
pub fn time_millis() -> i64 {
    now().timestamp_millis()
}

/// Render a duration the way trace and history lines show it.
pub fn format_elapsed(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    if millis > 0 {
        format!("{}ms", millis)
    } else {
        format!("{}us", elapsed.as_micros())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(12)), "12ms");
        assert_eq!(format_elapsed(Duration::from_micros(250)), "250us");
    }
}
