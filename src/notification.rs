use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    /// How many times this message arrived back to back
    pub repeats: usize,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl Notification {
    pub fn new(message: impl Into<String>, level: NotificationLevel, duration: Duration) -> Self {
        let now = Instant::now();
        Self {
            message: message.into(),
            level,
            repeats: 1,
            created_at: now,
            expires_at: now + duration,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Text as shown on the notification line
    pub fn display_text(&self) -> String {
        if self.repeats > 1 {
            format!("{} (x{})", self.message, self.repeats)
        } else {
            self.message.clone()
        }
    }
}

/// Non-blocking toasts; the newest is shown first
#[derive(Debug, Default)]
pub struct NotificationManager {
    notifications: Vec<Notification>,
    default_duration: Duration,
}

impl NotificationManager {
    pub fn new() -> Self {
        Self::with_default_duration(Duration::from_secs(5))
    }

    pub fn with_default_duration(default_duration: Duration) -> Self {
        Self {
            notifications: Vec::new(),
            default_duration,
        }
    }

    pub fn notify(&mut self, message: impl Into<String>, level: NotificationLevel) {
        let message = message.into();
        let expires_at = Instant::now() + self.default_duration;

        // Entry errors arrive in bursts; fold them into the visible toast
        if let Some(current) = self.notifications.first_mut() {
            if current.level == level && current.message == message && !current.is_expired() {
                current.repeats += 1;
                current.expires_at = expires_at;
                return;
            }
        }

        let notification = Notification::new(message, level, self.default_duration);
        self.notifications.insert(0, notification);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationLevel::Info);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationLevel::Warning);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationLevel::Error);
    }

    /// Remove expired notifications, returns true if any were removed
    pub fn update(&mut self) -> bool {
        let initial_len = self.notifications.len();
        self.notifications.retain(|n| !n.is_expired());
        self.notifications.len() != initial_len
    }

    pub fn current(&self) -> Option<&Notification> {
        self.notifications.first()
    }

    pub fn all(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn clear(&mut self) {
        self.notifications.clear();
    }

    pub fn dismiss_current(&mut self) -> bool {
        if self.notifications.is_empty() {
            false
        } else {
            self.notifications.remove(0);
            true
        }
    }

    pub fn count(&self) -> usize {
        self.notifications.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn notification_expiration() {
        let notification =
            Notification::new("test", NotificationLevel::Info, Duration::from_millis(50));
        assert!(!notification.is_expired());

        thread::sleep(Duration::from_millis(60));
        assert!(notification.is_expired());
    }

    #[test]
    fn newest_is_current() {
        let mut manager = NotificationManager::new();

        manager.info("Opening");
        manager.error("No Images Found");

        assert_eq!(manager.count(), 2);
        let current = manager.current().unwrap();
        assert_eq!(current.message, "No Images Found");
        assert_eq!(current.level, NotificationLevel::Error);
    }

    #[test]
    fn repeated_errors_collapse() {
        let mut manager = NotificationManager::new();

        manager.error("Error Reading Entry");
        manager.error("Error Reading Entry");
        manager.error("Error Reading Entry");

        assert_eq!(manager.count(), 1);
        assert_eq!(
            manager.current().unwrap().display_text(),
            "Error Reading Entry (x3)"
        );

        manager.warn("Error Reading Entry");
        assert_eq!(manager.count(), 2);
    }

    #[test]
    fn expired_are_removed() {
        let mut manager = NotificationManager::with_default_duration(Duration::from_millis(50));

        manager.info("Short-lived");
        thread::sleep(Duration::from_millis(60));

        assert!(manager.update());
        assert_eq!(manager.count(), 0);
    }

    #[test]
    fn dismiss_reveals_previous() {
        let mut manager = NotificationManager::new();

        manager.info("First");
        manager.info("Second");

        assert!(manager.dismiss_current());
        assert_eq!(manager.current().unwrap().message, "First");
        manager.clear();
        assert!(!manager.dismiss_current());
    }
}
