use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::delivery::{ChatId, Delivery};
use crate::services::messages::MARKET_CLOSE_TEXT;

/// Daily close time of the tracked market, in the exchange's timezone.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketCloseSchedule {
    pub close_time: NaiveTime,
    pub timezone: Tz,
    pub weekdays_only: bool,
}

impl MarketCloseSchedule {
    pub fn from_config(config: &Config) -> Self {
        Self {
            close_time: config.close_time,
            timezone: config.timezone,
            weekdays_only: config.weekdays_only,
        }
    }

    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }

    /// True once the local time has reached the close on a trading day.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.timezone);
        if self.weekdays_only && matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        local.time() >= self.close_time
    }
}

/// Fires at most once per local trading day.
pub struct MarketCloseWatcher {
    schedule: MarketCloseSchedule,
    last_notified: Option<NaiveDate>,
}

impl MarketCloseWatcher {
    pub fn new(schedule: MarketCloseSchedule) -> Self {
        Self {
            schedule,
            last_notified: None,
        }
    }

    /// Returns true when a notification should go out now, and records it.
    pub fn poll(&mut self, now: DateTime<Utc>) -> bool {
        if !self.schedule.is_due(now) {
            return false;
        }
        let today = self.schedule.local_date(now);
        if self.last_notified == Some(today) {
            return false;
        }
        self.last_notified = Some(today);
        true
    }
}

/// Polls the schedule forever, sending the close notice to `chat` once a day.
///
/// Runs in its own task: it shares only the delivery collaborator with the
/// report pipeline and never waits on an in-flight request.
pub async fn watch_market_close(
    schedule: MarketCloseSchedule,
    delivery: Arc<dyn Delivery + Send + Sync>,
    chat: ChatId,
    poll_interval: Duration,
) {
    info!(
        "Watching for market close at {} {} (weekdays only: {})",
        schedule.close_time, schedule.timezone, schedule.weekdays_only
    );
    let mut watcher = MarketCloseWatcher::new(schedule);
    let mut ticker = tokio::time::interval(poll_interval);

    loop {
        ticker.tick().await;
        if watcher.poll(Utc::now()) {
            info!("Market closed, notifying chat {}", chat);
            if let Err(e) = delivery.send_text(&chat, MARKET_CLOSE_TEXT).await {
                error!("Market close notification failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn schedule() -> MarketCloseSchedule {
        MarketCloseSchedule {
            close_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            timezone: chrono_tz::America::New_York,
            weekdays_only: true,
        }
    }

    fn new_york(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        chrono_tz::America::New_York
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn due_only_after_close_on_weekdays() {
        let schedule = schedule();
        // Wednesday 2024-10-16
        assert!(!schedule.is_due(new_york(2024, 10, 16, 15, 59)));
        assert!(schedule.is_due(new_york(2024, 10, 16, 16, 0)));
        // Saturday 2024-10-19
        assert!(!schedule.is_due(new_york(2024, 10, 19, 17, 0)));
    }

    #[test]
    fn weekends_allowed_when_configured() {
        let schedule = MarketCloseSchedule { weekdays_only: false, ..schedule() };
        assert!(schedule.is_due(new_york(2024, 10, 19, 17, 0)));
    }

    #[test]
    fn watcher_fires_once_per_day() {
        let mut watcher = MarketCloseWatcher::new(schedule());
        assert!(!watcher.poll(new_york(2024, 10, 16, 10, 0)));
        assert!(watcher.poll(new_york(2024, 10, 16, 16, 1)));
        assert!(!watcher.poll(new_york(2024, 10, 16, 17, 0)));
        assert!(watcher.poll(new_york(2024, 10, 17, 16, 5)));
    }
}
