use anyhow::Result;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::audio::{CoordinatorSignal, Role};
use crate::config::NotificationConfig;

/// Trait for sending notifications - allows for testing without system calls
pub trait NotificationSender: Send + Sync {
    fn send(&self, title: &str, body: &str) -> Result<()>;
}

/// Production notification sender using macOS osascript
#[derive(Debug, Clone, Copy, Default)]
pub struct MacOSNotificationSender;

impl NotificationSender for MacOSNotificationSender {
    fn send(&self, title: &str, body: &str) -> Result<()> {
        send_native_macos_notification(title, body)
    }
}

/// Keeps every notification instead of showing it. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotificationSender {
    sent_notifications: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingNotificationSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_sent_notifications(&self) -> Vec<(String, String)> {
        self.sent_notifications
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl NotificationSender for RecordingNotificationSender {
    fn send(&self, title: &str, body: &str) -> Result<()> {
        debug!("Recorded notification: {} - {}", title, body);
        self.sent_notifications
            .lock()
            .map_err(|_| anyhow::anyhow!("Notification record poisoned"))?
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}

/// Desktop notifications for switches made (or attempted) on the user's behalf
pub struct NotificationManager<T: NotificationSender = MacOSNotificationSender> {
    enabled: bool,
    show_switching_actions: bool,
    show_failures: bool,
    sender: T,
}

impl NotificationManager {
    pub fn new(config: &NotificationConfig) -> Self {
        Self::with_sender(config, MacOSNotificationSender)
    }
}

impl<T: NotificationSender> NotificationManager<T> {
    pub fn with_sender(config: &NotificationConfig, sender: T) -> Self {
        Self {
            enabled: config.enabled,
            show_switching_actions: config.show_switching_actions,
            show_failures: config.show_failures,
            sender,
        }
    }

    /// Pick up changed settings after a config reload
    pub fn update_config(&mut self, config: &NotificationConfig) {
        self.enabled = config.enabled;
        self.show_switching_actions = config.show_switching_actions;
        self.show_failures = config.show_failures;
    }

    /// Send notification when automatic switching occurs
    pub fn device_switched(&self, role: Role, device_name: &str) -> Result<()> {
        if !self.enabled || !self.show_switching_actions {
            return Ok(());
        }

        let body = format!("{} switched to {}", role_label(role), device_name);
        self.sender.send("Audio Device Switched", &body)?;

        info!("Sent device switched notification: {} -> {}", role, device_name);
        Ok(())
    }

    /// Send notification when switching fails
    pub fn switch_failed(&self, role: Role, device_name: &str, error: &str) -> Result<()> {
        if !self.enabled || !self.show_failures {
            return Ok(());
        }

        let body = format!(
            "Failed to switch {} to {}: {}",
            role.as_str(),
            device_name,
            error
        );
        self.sender.send("Audio Device Switch Failed", &body)?;

        warn!("Sent switch failed notification for: {}", device_name);
        Ok(())
    }

    /// Present one coordinator signal. Refresh requests have nothing to show.
    pub fn handle_signal(&self, signal: &CoordinatorSignal) -> Result<()> {
        match signal {
            CoordinatorSignal::RefreshRequested => Ok(()),
            CoordinatorSignal::Switched { role, device_name } => {
                self.device_switched(*role, device_name)
            }
            CoordinatorSignal::SwitchFailed {
                role,
                device_name,
                error,
            } => self.switch_failed(*role, device_name, error),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn sender(&self) -> &T {
        &self.sender
    }

    /// Send one notification regardless of settings, to check the system lets us
    pub fn test_notification(&self) -> Result<()> {
        info!("Sending test notification...");

        if let Err(e) = self
            .sender
            .send("AirPods Sanity", "Notification system is working correctly!")
        {
            error!("Failed to send notification: {}", e);
            error!("Check Do Not Disturb and whether osascript may post notifications");
            return Err(anyhow::anyhow!("Failed to send notification: {}", e));
        }

        info!("Test notification sent successfully");
        Ok(())
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::Input => "🎤 Input",
        Role::Output => "🔊 Output",
    }
}

/// Send notification using native macOS osascript (works for unsigned binaries)
fn send_native_macos_notification(title: &str, body: &str) -> Result<()> {
    use std::process::Command;

    let script = format!(
        r#"display notification "{}" with title "{}""#,
        escape_applescript(body),
        escape_applescript(title)
    );

    let output = Command::new("osascript").args(["-e", &script]).output()?;

    if output.status.success() {
        Ok(())
    } else {
        let error = String::from_utf8_lossy(&output.stderr);
        Err(anyhow::anyhow!("osascript failed: {}", error))
    }
}

fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(config: NotificationConfig) -> NotificationManager<RecordingNotificationSender> {
        NotificationManager::with_sender(&config, RecordingNotificationSender::new())
    }

    #[test]
    fn switch_notification_names_role_and_device() {
        let notifications = manager(NotificationConfig::default());

        notifications.device_switched(Role::Input, "MacBook Pro Microphone").unwrap();

        let sent = notifications.sender().get_sent_notifications();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "Audio Device Switched");
        assert!(sent[0].1.contains("Input switched to MacBook Pro Microphone"));
    }

    #[test]
    fn toggles_suppress_their_notifications() {
        let notifications = manager(NotificationConfig {
            enabled: true,
            show_switching_actions: false,
            show_failures: true,
        });

        notifications.device_switched(Role::Output, "AirPods Pro").unwrap();
        notifications
            .switch_failed(Role::Output, "AirPods Pro", "device busy")
            .unwrap();

        let sent = notifications.sender().get_sent_notifications();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "Audio Device Switch Failed");
    }

    #[test]
    fn refresh_signal_sends_nothing() {
        let notifications = manager(NotificationConfig::default());

        notifications
            .handle_signal(&CoordinatorSignal::RefreshRequested)
            .unwrap();

        assert!(notifications.sender().get_sent_notifications().is_empty());
    }

    #[test]
    fn applescript_quotes_are_escaped() {
        assert_eq!(escape_applescript(r#"My "Pods""#), r#"My \"Pods\""#);
    }
}
