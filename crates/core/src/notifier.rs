use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use serde_json::json;

use crate::logger;

const PUSH_URL: &str = "https://api.line.me/v2/bot/message/push";
const TOKEN_VAR: &str = "BTNSPRITE_LINE_TOKEN";
const USER_VAR: &str = "BTNSPRITE_LINE_USER";

/// Outbound channel used to tell the operator the loop stopped.
pub trait Notifier: Send + Sync {
    /// Deliver a free-form message. Returns whether it was delivered.
    fn send_message(&self, message: &str) -> bool;

    fn notify(&self, reason: &str) -> bool {
        self.send_message(&stop_message(reason, Local::now()))
    }
}

pub fn stop_message(reason: &str, at: DateTime<Local>) -> String {
    format!(
        "btnsprite notice\nTime: {}\nStatus: stopped ({})",
        at.format(logger::TIMESTAMP_FORMAT),
        reason
    )
}

/// Credentials for the LINE Messaging API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineConfig {
    pub token: String,
    pub user_id: String,
}

impl LineConfig {
    /// Read credentials from the environment. `None` if either is unset or empty.
    pub fn from_env() -> Option<Self> {
        Self::from_values(std::env::var(TOKEN_VAR).ok(), std::env::var(USER_VAR).ok())
    }

    fn from_values(token: Option<String>, user_id: Option<String>) -> Option<Self> {
        let token = token.filter(|t| !t.trim().is_empty())?;
        let user_id = user_id.filter(|u| !u.trim().is_empty())?;
        Some(Self { token, user_id })
    }
}

/// Pushes text messages to one LINE user.
pub struct LineNotifier {
    config: LineConfig,
    client: reqwest::blocking::Client,
}

impl LineNotifier {
    pub fn new(config: LineConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { config, client })
    }

    fn push(&self, message: &str) -> Result<()> {
        let body = json!({
            "to": self.config.user_id,
            "messages": [{ "type": "text", "text": message }],
        });
        let resp = self
            .client
            .post(PUSH_URL)
            .bearer_auth(&self.config.token)
            .json(&body)
            .send()
            .context("LINE push request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().unwrap_or_default();
            bail!("LINE push rejected: {} {}", status, detail.trim());
        }
        Ok(())
    }
}

impl Notifier for LineNotifier {
    fn send_message(&self, message: &str) -> bool {
        match self.push(message) {
            Ok(()) => {
                logger::info(&format!("LINE message sent: {}", message.replace('\n', " | ")));
                true
            }
            Err(e) => {
                logger::error(&format!("failed to send LINE message: {:#}", e));
                false
            }
        }
    }
}

/// Stand-in when no credentials are configured.
pub struct Unconfigured;

impl Notifier for Unconfigured {
    fn send_message(&self, _message: &str) -> bool {
        logger::warn(&format!(
            "notification not sent: set {} and {} to enable LINE messages",
            TOKEN_VAR, USER_VAR
        ));
        false
    }
}

/// Build the notifier from environment credentials.
pub fn from_env() -> Arc<dyn Notifier> {
    match LineConfig::from_env() {
        Some(config) => match LineNotifier::new(config) {
            Ok(n) => Arc::new(n),
            Err(e) => {
                logger::error(&format!("LINE notifier unavailable: {:#}", e));
                Arc::new(Unconfigured)
            }
        },
        None => Arc::new(Unconfigured),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[test]
    fn stop_message_carries_time_and_reason() {
        let at = Local.with_ymd_and_hms(2024, 11, 2, 23, 59, 8).unwrap();
        assert_eq!(
            stop_message("stop image detected", at),
            "btnsprite notice\nTime: 2024-11-02 23:59:08\nStatus: stopped (stop image detected)"
        );
    }

    #[test]
    fn credentials_require_both_values() {
        assert!(LineConfig::from_values(None, Some("u".into())).is_none());
        assert!(LineConfig::from_values(Some("t".into()), None).is_none());
        assert!(LineConfig::from_values(Some("  ".into()), Some("u".into())).is_none());
        assert_eq!(
            LineConfig::from_values(Some("t".into()), Some("u".into())),
            Some(LineConfig { token: "t".into(), user_id: "u".into() })
        );
    }

    #[test]
    fn unconfigured_never_delivers() {
        assert!(!Unconfigured.notify("manual stop"));
        assert!(!Unconfigured.send_message("hello"));
    }

    struct Capture(Mutex<Vec<String>>);

    impl Notifier for Capture {
        fn send_message(&self, message: &str) -> bool {
            self.0.lock().unwrap().push(message.to_string());
            true
        }
    }

    #[test]
    fn notify_formats_through_send_message() {
        let n = Capture(Mutex::new(Vec::new()));
        assert!(n.notify("manual stop"));
        let sent = n.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("btnsprite notice\nTime: "));
        assert!(sent[0].ends_with("Status: stopped (manual stop)"));
    }
}
