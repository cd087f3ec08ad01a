//! Sync data models: the wire format shared by client and server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single record in transport form.
///
/// `variant` is optional on the wire so that a peer sending an unknown or
/// missing payload is reported by [`crate::Record::from_wire`] rather than
/// silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRecord {
    pub id: String,
    /// RFC 3339 with nanoseconds, so the LWW ordering survives the trip.
    pub last_update_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<WireVariant>,
}

/// Exactly one populated payload per record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireVariant {
    Credential {
        login: String,
        secret: String,
    },
    Text {
        body: String,
    },
    Binary {
        #[serde(with = "base64_bytes")]
        payload: Vec<u8>,
    },
    PaymentCard {
        number: String,
        month: u32,
        day: u32,
        code: u32,
    },
}

/// Request body for `SignUp` and `SignIn`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsRequest {
    pub login: String,
    pub password: String,
}

/// Response carrying a freshly issued bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Request body for pushing records to the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddRecordsRequest {
    pub records: Vec<WireRecord>,
}

/// Server response after a push.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRecordsResponse {
    /// Records inserted or replaced.
    pub accepted: u64,
    /// Records older than (or as old as) the stored copy.
    pub stale: u64,
}

/// Server response with the caller's full record set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllRecordsResponse {
    pub records: Vec<WireRecord>,
}

/// Error body returned by the server for any failed call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Custom base64 serialization for `Vec<u8>`.
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Vec<u8>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
