//! Session payload as handed over by the HTTP session middleware.
//!
//! The store only interprets `cookie.expires`; every other attribute is
//! carried verbatim through a flattened JSON map.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Longest session identifier the session table accepts.
pub const MAX_SESSION_ID_LEN: usize = 128;

/// Session payload stored as JSON text in the data column.
///
/// A `null` cookie (or cookie expiry) is kept verbatim in the attribute
/// map so that it is written back exactly as received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct SessionData {
    /// Session cookie settings, if the middleware sent any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie: Option<SessionCookie>,

    /// All remaining session attributes.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Cookie section of a session payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct SessionCookie {
    /// Absolute cookie expiry. Accepts an RFC 3339 string or epoch
    /// milliseconds; always written back as RFC 3339.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "cookie_expiry::serialize"
    )]
    pub expires: Option<DateTime<Utc>>,

    /// Remaining cookie fields (`path`, `httpOnly`, `originalMaxAge`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TryFrom<Map<String, Value>> for SessionData {
    type Error = serde_json::Error;

    fn try_from(mut attributes: Map<String, Value>) -> Result<Self, Self::Error> {
        let cookie = match attributes.get("cookie") {
            None | Some(Value::Null) => None,
            Some(_) => attributes
                .remove("cookie")
                .map(serde_json::from_value)
                .transpose()?,
        };
        Ok(Self { cookie, attributes })
    }
}

impl TryFrom<Map<String, Value>> for SessionCookie {
    type Error = serde_json::Error;

    fn try_from(mut extra: Map<String, Value>) -> Result<Self, Self::Error> {
        let expires = match extra.get("expires") {
            None | Some(Value::Null) => None,
            Some(_) => extra
                .remove("expires")
                .map(cookie_expiry::deserialize)
                .transpose()?
                .flatten(),
        };
        Ok(Self { expires, extra })
    }
}

impl SessionData {
    /// Decodes the data column.
    ///
    /// A stored JSON `null` is no session.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when `raw` is neither `null` nor a JSON
    /// object with a well-formed cookie.
    pub fn from_stored(raw: &str) -> Result<Option<Self>, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Returns the explicit cookie expiry, if any.
    #[must_use]
    pub fn cookie_expiry(&self) -> Option<DateTime<Utc>> {
        self.cookie.as_ref().and_then(|c| c.expires)
    }

    /// Computes the stored expiry in whole epoch seconds.
    ///
    /// Uses the cookie expiry when present, otherwise `now + lifetime`.
    /// Milliseconds are rounded half-up; sub-second precision is dropped.
    #[must_use]
    pub fn expires_at(&self, now: DateTime<Utc>, lifetime: Duration) -> i64 {
        let expiry = self.cookie_expiry().unwrap_or_else(|| {
            TimeDelta::from_std(lifetime)
                .ok()
                .and_then(|delta| now.checked_add_signed(delta))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
        round_to_epoch_seconds(expiry.timestamp_millis())
    }
}

/// Rounds epoch milliseconds to the nearest second, halves upward.
#[must_use]
pub const fn round_to_epoch_seconds(millis: i64) -> i64 {
    millis.saturating_add(500).div_euclid(1000)
}

mod cookie_expiry {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawExpiry {
        Millis(i64),
        Text(DateTime<Utc>),
    }

    pub(super) fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(at) => serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<RawExpiry>::deserialize(deserializer)? {
            None => Ok(None),
            Some(RawExpiry::Text(at)) => Ok(Some(at)),
            Some(RawExpiry::Millis(ms)) => DateTime::<Utc>::from_timestamp_millis(ms)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom("cookie expiry out of range")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn at_millis(ms: i64) -> DateTime<Utc> {
        let Some(at) = DateTime::<Utc>::from_timestamp_millis(ms) else {
            panic!("valid timestamp");
        };
        at
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(round_to_epoch_seconds(1_499), 1);
        assert_eq!(round_to_epoch_seconds(1_500), 2);
        assert_eq!(round_to_epoch_seconds(2_000), 2);
        assert_eq!(round_to_epoch_seconds(-1_500), -1);
    }

    #[test]
    fn cookie_expiry_wins_over_lifetime() {
        let data = SessionData {
            cookie: Some(SessionCookie {
                expires: Some(at_millis(100_600)),
                extra: Map::new(),
            }),
            attributes: Map::new(),
        };
        let expires = data.expires_at(at_millis(0), Duration::from_secs(3_600));
        assert_eq!(expires, 101);
    }

    #[test]
    fn missing_cookie_uses_lifetime() {
        let data = SessionData::default();
        let expires = data.expires_at(at_millis(10_000), Duration::from_millis(86_400_000));
        assert_eq!(expires, 10 + 86_400);
    }

    #[test]
    fn cookie_without_expires_uses_lifetime() {
        let Ok(data) = serde_json::from_str::<SessionData>(
            r#"{ "cookie": { "expires": null, "path": "/" }, "user": 7 }"#,
        ) else {
            panic!("payload should parse");
        };
        assert_eq!(data.cookie_expiry(), None);
        assert_eq!(data.expires_at(at_millis(0), Duration::from_secs(60)), 60);
    }

    #[test]
    fn expires_accepts_string_and_millis() {
        let Ok(text) = serde_json::from_str::<SessionData>(
            r#"{ "cookie": { "expires": "2024-01-01T00:00:00.000Z" } }"#,
        ) else {
            panic!("rfc3339 expiry should parse");
        };
        let Ok(millis) =
            serde_json::from_str::<SessionData>(r#"{ "cookie": { "expires": 1704067200000 } }"#)
        else {
            panic!("millisecond expiry should parse");
        };
        assert_eq!(text.cookie_expiry(), millis.cookie_expiry());
        assert_eq!(text.expires_at(at_millis(0), Duration::ZERO), 1_704_067_200);
    }

    #[test]
    fn unknown_attributes_survive_serialization() {
        let raw = r#"{"cookie":{"expires":"2024-01-01T00:00:00.000Z","httpOnly":true,"path":"/"},"cart":[1,2],"user":{"name":"ada"}}"#;
        let Ok(data) = serde_json::from_str::<SessionData>(raw) else {
            panic!("payload should parse");
        };
        let Ok(written) = serde_json::to_value(&data) else {
            panic!("payload should serialize");
        };
        let Ok(original) = serde_json::from_str::<Value>(raw) else {
            panic!("raw json");
        };
        assert_eq!(written, original);
    }

    #[test]
    fn explicit_nulls_survive_serialization() {
        for raw in [
            r#"{"cookie":null,"user":7}"#,
            r#"{"cookie":{"expires":null,"path":"/"},"user":7}"#,
        ] {
            let Ok(data) = serde_json::from_str::<SessionData>(raw) else {
                panic!("payload should parse: {raw}");
            };
            assert_eq!(data.cookie_expiry(), None);
            let Ok(written) = serde_json::to_string(&data) else {
                panic!("payload should serialize");
            };
            assert_eq!(written, raw);
        }
    }

    #[test]
    fn malformed_cookie_is_rejected() {
        assert!(serde_json::from_str::<SessionData>(r#"{"cookie":5}"#).is_err());
        assert!(serde_json::from_str::<SessionData>(r#"{"cookie":{"expires":true}}"#).is_err());
    }

    #[test]
    fn stored_null_is_no_session() {
        let Ok(decoded) = SessionData::from_stored("null") else {
            panic!("null should decode");
        };
        assert_eq!(decoded, None);

        let Ok(Some(data)) = SessionData::from_stored(r#"{"n":1}"#) else {
            panic!("object should decode");
        };
        assert_eq!(data.attributes.get("n"), Some(&Value::from(1)));

        assert!(SessionData::from_stored("[1,2]").is_err());
        assert!(SessionData::from_stored("{not json").is_err());
    }
}
