//! Notifier that writes to the log

use super::Notifier;
use crate::clock::Clock;
use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Logs notifications, suppressing repeats of the same message within a cooldown
pub struct LogNotifier {
    clock: Arc<dyn Clock>,
    cooldown: Duration,
    enabled: bool,
    last_sent: Mutex<HashMap<String, NaiveDateTime>>,
}

impl LogNotifier {
    /// Create a notifier with a 10 minute duplicate cooldown
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            cooldown: Duration::minutes(10),
            enabled: true,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Silence all notifications (used for backtests)
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether `message` would be delivered now, recording it if so
    async fn should_send(&self, message: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let now = self.clock.now();
        let mut last_sent = self.last_sent.lock().await;
        last_sent.retain(|_, sent| now - *sent < self.cooldown);
        if last_sent.contains_key(message) {
            return false;
        }
        last_sent.insert(message.to_string(), now);
        true
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_notification(&self, message: &str, title: Option<&str>) {
        if !self.should_send(message).await {
            tracing::debug!(text = message, "Notification suppressed");
            return;
        }
        tracing::info!(title = title.unwrap_or("tradedesk"), text = message, "Notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_duplicate_suppressed_within_cooldown() {
        let clock = Arc::new(VirtualClock::new(at("2024-03-04 09:00:00")));
        let notifier = LogNotifier::new(clock.clone());

        tokio_test::block_on(async {
            assert!(notifier.should_send("target reached").await);
            assert!(!notifier.should_send("target reached").await);
            assert!(notifier.should_send("other message").await);

            clock.set(at("2024-03-04 09:10:00"));
            assert!(notifier.should_send("target reached").await);
        });
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let clock = Arc::new(VirtualClock::new(at("2024-03-04 09:00:00")));
        let notifier = LogNotifier::new(clock.clone());

        tokio_test::block_on(async {
            for i in 0..5 {
                assert!(notifier.should_send(&format!("event {i}")).await);
            }
            assert_eq!(notifier.last_sent.lock().await.len(), 5);

            clock.set(at("2024-03-04 09:15:00"));
            assert!(notifier.should_send("fresh").await);
            let last_sent = notifier.last_sent.lock().await;
            assert_eq!(last_sent.len(), 1);
            assert!(last_sent.contains_key("fresh"));
        });
    }

    #[test]
    fn test_disabled_sends_nothing() {
        let clock = Arc::new(VirtualClock::new(at("2024-03-04 09:00:00")));
        let notifier = LogNotifier::new(clock).disabled();
        tokio_test::block_on(async {
            assert!(!notifier.should_send("anything").await);
        });
    }
}
