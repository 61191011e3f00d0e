use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

pub type MailId = i64;
pub type CharacterId = i64;

/// The signed-in character, as reported by the SSO verify endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    #[serde(rename = "CharacterID")]
    pub id: CharacterId,
    #[serde(rename = "CharacterName")]
    pub name: String,
}

/// One entry of the inbox listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MailHeader {
    #[serde(rename = "mail_id")]
    pub id: MailId,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Sender character/corporation/alliance id, 0 when ESI leaves it out
    #[serde(default)]
    pub from: i64,
}

/// Stand-in for mail ESI lists without a timestamp.
pub const UNKNOWN_TIMESTAMP: &str = "0001-01-01T00:00:00Z";

impl MailHeader {
    /// RFC 3339 with second precision and a `Z` suffix, e.g. `2024-01-01T00:00:00Z`.
    pub fn timestamp_rfc3339(&self) -> String {
        match self.timestamp {
            Some(ts) => ts.to_rfc3339_opts(SecondsFormat::Secs, true),
            None => UNKNOWN_TIMESTAMP.to_string(),
        }
    }
}

/// Body payload of the single-mail endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct MailBody {
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub subject: String,
}

#[derive(Debug, Clone)]
pub struct Mail {
    pub header: MailHeader,
    /// Raw HTML as served by ESI
    pub body: String,
    pub subject: String,
}

impl Mail {
    /// Combine a fetched body with the header it was listed under.
    pub fn from_parts(header: MailHeader, body: MailBody) -> Self {
        Self {
            header,
            body: body.body,
            subject: body.subject,
        }
    }
}
