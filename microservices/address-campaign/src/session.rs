//! Messaging session state

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Link to the messaging account the campaigns are sent from.
///
/// Lives only in process memory; a restart starts disconnected.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub is_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    pub requests_count: u64,
}

/// Session as reported to clients, with a rendered uptime
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    #[serde(flatten)]
    pub session: Session,
    pub uptime: String,
}

impl Session {
    pub fn connect(&mut self, phone_number: &str) {
        self.is_connected = true;
        self.phone_number = Some(phone_number.to_string());
        self.connected_at = Some(Utc::now());
    }

    pub fn disconnect(&mut self) {
        self.is_connected = false;
    }

    pub fn record_request(&mut self) {
        self.requests_count += 1;
    }

    /// `HH:MM:SS` since the link came up, `00:00:00` while disconnected
    pub fn uptime_at(&self, now: DateTime<Utc>) -> String {
        match (self.is_connected, self.connected_at) {
            (true, Some(since)) => format_duration((now - since).num_seconds().max(0)),
            _ => format_duration(0),
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            session: self.clone(),
            uptime: self.uptime_at(Utc::now()),
        }
    }
}

fn format_duration(total_secs: i64) -> String {
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_connect_keeps_request_count() {
        let mut session = Session::default();
        session.record_request();
        session.record_request();
        session.connect("+212 661-001122");
        assert!(session.is_connected);
        assert_eq!(session.requests_count, 2);
        assert_eq!(session.phone_number.as_deref(), Some("+212 661-001122"));
    }

    #[test]
    fn test_disconnect_keeps_phone() {
        let mut session = Session::default();
        session.connect("+212 661-001122");
        session.disconnect();
        assert!(!session.is_connected);
        assert!(session.phone_number.is_some());
        assert_eq!(session.uptime_at(Utc::now()), "00:00:00");
    }

    #[test]
    fn test_uptime_format() {
        let mut session = Session::default();
        session.connect("+1 555 0100");
        let since = session.connected_at.unwrap();
        let later = since + Duration::seconds(3 * 3600 + 25 * 60 + 7);
        assert_eq!(session.uptime_at(later), "03:25:07");
    }

    #[test]
    fn test_uptime_past_a_day() {
        assert_eq!(format_duration(26 * 3600), "26:00:00");
    }
}
