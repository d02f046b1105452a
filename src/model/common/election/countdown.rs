use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time remaining until an election closes, broken into display units.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Countdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub has_ended: bool,
}

impl Countdown {
    /// The countdown from `now` to `end_time`. Never negative.
    pub fn until(end_time: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let remaining = (end_time - now).num_seconds().max(0);
        Self {
            days: remaining / 86_400,
            hours: remaining % 86_400 / 3_600,
            minutes: remaining % 3_600 / 60,
            seconds: remaining % 60,
            has_ended: now >= end_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    #[test]
    fn splits_into_units() {
        let now = Utc::now();
        let end = now + Duration::days(2) + Duration::hours(3) + Duration::minutes(4) + Duration::seconds(5);
        let countdown = Countdown::until(end, now);
        assert_eq!(
            countdown,
            Countdown {
                days: 2,
                hours: 3,
                minutes: 4,
                seconds: 5,
                has_ended: false,
            }
        );
    }

    #[test]
    fn last_fraction_of_a_second_is_still_running() {
        let now = Utc::now();
        let countdown = Countdown::until(now + Duration::milliseconds(400), now);
        assert_eq!(countdown.seconds, 0);
        assert!(!countdown.has_ended);
        assert!(Countdown::until(now, now).has_ended);
    }

    #[test]
    fn past_end_time_is_zero() {
        let now = Utc::now();
        let countdown = Countdown::until(now - Duration::hours(1), now);
        assert_eq!(countdown.days + countdown.hours + countdown.minutes + countdown.seconds, 0);
        assert!(countdown.has_ended);
    }
}
