//! Cached Response Module
//!
//! Immutable response values held by the durable store, plus the freshness
//! stamp carried in the `x-cached-at` header.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Header carrying the epoch-millisecond time an entry was stored.
pub const CACHED_AT_HEADER: &str = "x-cached-at";

/// Body of every synthetic unavailable response.
pub const OFFLINE_BODY: &str = "Offline - resource not available";

// == Missing Timestamp Policy ==
/// How a cached data entry without a `x-cached-at` header is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingTimestampPolicy {
    /// Unknown age counts as fresh; the entry is served without refetching
    #[default]
    TreatAsFresh,
    /// Unknown age counts as expired; the network is tried first
    TreatAsStale,
}

impl FromStr for MissingTimestampPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fresh" => Ok(Self::TreatAsFresh),
            "stale" => Ok(Self::TreatAsStale),
            other => Err(format!("unknown missing timestamp policy: {}", other)),
        }
    }
}

impl fmt::Display for MissingTimestampPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TreatAsFresh => write!(f, "fresh"),
            Self::TreatAsStale => write!(f, "stale"),
        }
    }
}

// == Cached Response ==
/// A complete HTTP response held as a plain value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    /// HTTP status code
    pub status: u16,
    /// Header pairs in arrival order; names are lowercase
    pub headers: Vec<(String, String)>,
    /// Raw body bytes, base64 in snapshots
    #[serde(with = "body_base64")]
    pub body: Vec<u8>,
}

mod body_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(body: T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(D::Error::custom)
    }
}

impl CachedResponse {
    // == Constructor ==
    /// Creates a response, normalizing header names to lowercase.
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: headers
                .into_iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value))
                .collect(),
            body: body.into(),
        }
    }

    /// Creates a `text/plain` response.
    pub fn text(status: u16, body: &str) -> Self {
        Self::new(
            status,
            vec![(
                "content-type".to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            body.as_bytes().to_vec(),
        )
    }

    /// The synthetic 503 returned when nothing else is available.
    pub fn offline() -> Self {
        Self::text(503, OFFLINE_BODY)
    }

    /// True for the synthetic offline response.
    pub fn is_offline_fallback(&self) -> bool {
        self.status == 503 && self.body == OFFLINE_BODY.as_bytes()
    }

    /// True for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Storage time carried by the entry, if present and well formed.
    pub fn cached_at(&self) -> Option<u64> {
        self.header(CACHED_AT_HEADER)
            .and_then(|v| v.trim().parse().ok())
    }

    // == Freshness ==
    /// Checks whether the entry is younger than `ttl_ms` at `now_ms`.
    ///
    /// A stamp in the future counts as age zero.
    pub fn is_fresh(&self, now_ms: u64, ttl_ms: u64, policy: MissingTimestampPolicy) -> bool {
        match self.cached_at() {
            Some(stored) => now_ms.saturating_sub(stored) < ttl_ms,
            None => policy == MissingTimestampPolicy::TreatAsFresh,
        }
    }
}

/// Returns a copy of `response` stamped with `now_ms`.
///
/// Any previous stamp is replaced; the input is left untouched.
pub fn with_timestamp(response: &CachedResponse, now_ms: u64) -> CachedResponse {
    let mut headers: Vec<(String, String)> = response
        .headers
        .iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case(CACHED_AT_HEADER))
        .cloned()
        .collect();
    headers.push((CACHED_AT_HEADER.to_string(), now_ms.to_string()));

    CachedResponse {
        status: response.status,
        headers,
        body: response.body.clone(),
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_serializes_as_base64() {
        let resp = CachedResponse::new(200, Vec::new(), b"hello".to_vec());

        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""body":"aGVsbG8=""#));

        let back: CachedResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, resp);
    }

    #[test]
    fn test_body_rejects_invalid_base64() {
        let json = r#"{"status":200,"headers":[],"body":"!!not base64!!"}"#;
        assert!(serde_json::from_str::<CachedResponse>(json).is_err());
    }

    fn json_response() -> CachedResponse {
        CachedResponse::new(
            200,
            vec![("Content-Type".to_string(), "application/json".to_string())],
            br#"{"ok":true}"#.to_vec(),
        )
    }

    #[test]
    fn test_header_names_are_lowercased() {
        let resp = json_response();
        assert_eq!(resp.headers[0].0, "content-type");
        assert_eq!(resp.header("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn test_with_timestamp_is_pure() {
        let original = json_response();
        let stamped = with_timestamp(&original, 1_000);

        assert_eq!(original.cached_at(), None);
        assert_eq!(stamped.cached_at(), Some(1_000));
        assert_eq!(stamped.body, original.body);
        assert_eq!(stamped.status, original.status);
    }

    #[test]
    fn test_with_timestamp_replaces_previous_stamp() {
        let once = with_timestamp(&json_response(), 1_000);
        let twice = with_timestamp(&once, 2_000);

        assert_eq!(twice.cached_at(), Some(2_000));
        let stamps = twice
            .headers
            .iter()
            .filter(|(n, _)| n == CACHED_AT_HEADER)
            .count();
        assert_eq!(stamps, 1);
    }

    #[test]
    fn test_freshness_boundary() {
        let stamped = with_timestamp(&json_response(), 0);
        let policy = MissingTimestampPolicy::TreatAsFresh;

        assert!(stamped.is_fresh(899_999, 900_000, policy));
        // Age equal to the TTL is expired
        assert!(!stamped.is_fresh(900_000, 900_000, policy));
    }

    #[test]
    fn test_future_stamp_counts_as_fresh() {
        let stamped = with_timestamp(&json_response(), 5_000);
        assert!(stamped.is_fresh(1_000, 10, MissingTimestampPolicy::TreatAsStale));
    }

    #[test]
    fn test_missing_stamp_follows_policy() {
        let resp = json_response();
        assert!(resp.is_fresh(u64::MAX, 1, MissingTimestampPolicy::TreatAsFresh));
        assert!(!resp.is_fresh(0, 1, MissingTimestampPolicy::TreatAsStale));
    }

    #[test]
    fn test_malformed_stamp_is_missing() {
        let resp = CachedResponse::new(
            200,
            vec![(CACHED_AT_HEADER.to_string(), "yesterday".to_string())],
            Vec::new(),
        );
        assert_eq!(resp.cached_at(), None);
    }

    #[test]
    fn test_offline_response() {
        let resp = CachedResponse::offline();
        assert_eq!(resp.status, 503);
        assert!(resp.is_offline_fallback());
        assert!(!resp.is_success());
        // A real origin 503 is not the synthetic one
        assert!(!CachedResponse::text(503, "maintenance").is_offline_fallback());
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            "Stale".parse::<MissingTimestampPolicy>(),
            Ok(MissingTimestampPolicy::TreatAsStale)
        );
        assert!("sometimes".parse::<MissingTimestampPolicy>().is_err());
        assert_eq!(MissingTimestampPolicy::TreatAsFresh.to_string(), "fresh");
    }
}
