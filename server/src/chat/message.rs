//! Canonical chat message record.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Serialize, Serializer};

/// An immutable chat message as persisted and delivered.
///
/// Sender and timestamp always come from the authenticated session and the
/// server clock; nothing here is ever copied from a client payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub from: String,
    pub to: String,
    pub content: String,
    #[serde(serialize_with = "serialize_rfc3339")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Stamp a new message from `from` to `to` with the current server time.
    ///
    /// Truncated to milliseconds so the stored and delivered forms agree.
    pub fn stamped(from: &str, to: &str, content: String) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            content,
            timestamp: Utc::now().trunc_subsecs(3),
        }
    }

    /// Timestamp in the wire/storage form, e.g. `2026-10-18T09:12:45.120Z`.
    pub fn timestamp_rfc3339(&self) -> String {
        format_timestamp(&self.timestamp)
    }
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialize_rfc3339<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_timestamp(ts))
}
