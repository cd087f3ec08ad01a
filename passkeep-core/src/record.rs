//! Secret records: the four kinds of item a vault holds.
//!
//! A [`Record`] pairs the fields every kind shares (`id`, `last_update_date`)
//! with a closed [`Secret`] enum holding the kind-specific payload. Code that
//! needs per-kind behaviour matches on [`Secret`] exhaustively.

use crate::sync::models::{WireRecord, WireVariant};
use crate::{PassKeepError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Discriminant of a record's secret payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Credential,
    Text,
    Binary,
    PaymentCard,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Credential,
        RecordKind::Text,
        RecordKind::Binary,
        RecordKind::PaymentCard,
    ];

    /// Convert the kind to its string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credential => "credential",
            Self::Text => "text",
            Self::Binary => "binary",
            Self::PaymentCard => "payment_card",
        }
    }

    /// Parse a kind from its string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "credential" => Some(Self::Credential),
            "text" => Some(Self::Text),
            "binary" => Some(Self::Binary),
            "payment_card" => Some(Self::PaymentCard),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment card details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCard {
    pub number: String,
    /// 1-12
    pub expiry_month: u8,
    /// 1-31
    pub expiry_day: u8,
    /// 1-999
    pub security_code: u16,
}

impl PaymentCard {
    /// Build a card, checking every numeric field against its range.
    pub fn new(number: impl Into<String>, month: u32, day: u32, code: u32) -> Result<Self> {
        let number = number.into();
        if number.is_empty() {
            return Err(PassKeepError::InvalidInput(
                "card number should not be empty".to_string(),
            ));
        }

        Ok(Self {
            number,
            expiry_month: in_range("month", month, 1, 12)? as u8,
            expiry_day: in_range("day", day, 1, 31)? as u8,
            security_code: in_range("security code", code, 1, 999)? as u16,
        })
    }
}

fn in_range(name: &str, value: u32, from: u32, to: u32) -> Result<u32> {
    if value < from || value > to {
        return Err(PassKeepError::InvalidInput(format!(
            "{} should be a number between {} and {} inclusively, got {}",
            name, from, to, value
        )));
    }
    Ok(value)
}

/// Kind-specific payload of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Secret {
    Credential { login: String, secret: String },
    Text { text: String },
    Binary { payload: Vec<u8> },
    PaymentCard(PaymentCard),
}

impl Secret {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Credential { .. } => RecordKind::Credential,
            Self::Text { .. } => RecordKind::Text,
            Self::Binary { .. } => RecordKind::Binary,
            Self::PaymentCard(_) => RecordKind::PaymentCard,
        }
    }
}

/// One secret item in a user's vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    id: String,
    last_update_date: DateTime<Utc>,
    secret: Secret,
}

/// What [`Record::reveal`] did with the secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revealed {
    Printed,
    Exported(PathBuf),
}

impl Record {
    /// A login/password pair. The login doubles as the record id.
    pub fn credential(login: impl Into<String>, secret: impl Into<String>) -> Result<Self> {
        let login = login.into();
        let secret = Secret::Credential {
            login: login.clone(),
            secret: secret.into(),
        };
        Self::new(login, secret)
    }

    /// Free text stored under `key`.
    pub fn text(key: impl Into<String>, text: impl Into<String>) -> Result<Self> {
        Self::new(key.into(), Secret::Text { text: text.into() })
    }

    /// Arbitrary bytes stored under `key`.
    pub fn binary(key: impl Into<String>, payload: Vec<u8>) -> Result<Self> {
        Self::new(key.into(), Secret::Binary { payload })
    }

    /// A payment card. The card number doubles as the record id.
    pub fn payment_card(number: impl Into<String>, month: u32, day: u32, code: u32) -> Result<Self> {
        let card = PaymentCard::new(number, month, day, code)?;
        Self::new(card.number.clone(), Secret::PaymentCard(card))
    }

    fn new(id: String, secret: Secret) -> Result<Self> {
        Self::from_parts(id, Utc::now(), secret)
    }

    /// Reassemble a record from stored parts, keeping the given timestamp.
    pub fn from_parts(
        id: impl Into<String>,
        last_update_date: DateTime<Utc>,
        secret: Secret,
    ) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(PassKeepError::InvalidInput(format!(
                "{} record id should not be empty",
                secret.kind()
            )));
        }

        // Credentials are keyed by their login, cards by their number.
        let key = match &secret {
            Secret::Credential { login, .. } => Some(login),
            Secret::PaymentCard(card) => Some(&card.number),
            Secret::Text { .. } | Secret::Binary { .. } => None,
        };
        if let Some(key) = key {
            if *key != id {
                return Err(PassKeepError::InvalidInput(format!(
                    "{} record id {:?} does not match {:?}",
                    secret.kind(),
                    id,
                    key
                )));
            }
        }

        Ok(Self {
            id,
            last_update_date,
            secret,
        })
    }

    /// Replace the last update timestamp.
    pub fn with_last_update_date(mut self, last_update_date: DateTime<Utc>) -> Self {
        self.last_update_date = last_update_date;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn last_update_date(&self) -> DateTime<Utc> {
        self.last_update_date
    }

    pub fn kind(&self) -> RecordKind {
        self.secret.kind()
    }

    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    /// Convert to the tagged wire form.
    pub fn to_wire(&self) -> WireRecord {
        let variant = match &self.secret {
            Secret::Credential { login, secret } => WireVariant::Credential {
                login: login.clone(),
                secret: secret.clone(),
            },
            Secret::Text { text } => WireVariant::Text { body: text.clone() },
            Secret::Binary { payload } => WireVariant::Binary {
                payload: payload.clone(),
            },
            Secret::PaymentCard(card) => WireVariant::PaymentCard {
                number: card.number.clone(),
                month: card.expiry_month as u32,
                day: card.expiry_day as u32,
                code: card.security_code as u32,
            },
        };

        WireRecord {
            id: self.id.clone(),
            last_update_date: self.last_update_date,
            variant: Some(variant),
        }
    }

    /// Rebuild a record from its wire form.
    ///
    /// Fails with [`PassKeepError::UnknownRecordVariant`] when the peer sent no
    /// variant, and with [`PassKeepError::InvalidInput`] when the id is empty,
    /// differs from a credential's login or a card's number, or a card field
    /// is out of range.
    pub fn from_wire(wire: WireRecord) -> Result<Self> {
        let WireRecord {
            id,
            last_update_date,
            variant,
        } = wire;

        let secret = match variant {
            Some(WireVariant::Credential { login, secret }) => Secret::Credential { login, secret },
            Some(WireVariant::Text { body }) => Secret::Text { text: body },
            Some(WireVariant::Binary { payload }) => Secret::Binary { payload },
            Some(WireVariant::PaymentCard {
                number,
                month,
                day,
                code,
            }) => Secret::PaymentCard(PaymentCard::new(number, month, day, code)?),
            None => return Err(PassKeepError::UnknownRecordVariant(id)),
        };

        Self::from_parts(id, last_update_date, secret)
    }

    /// Show the secret to the user.
    ///
    /// Text-like kinds are written to `out`. Binary payloads are written to
    /// `<export_dir>/<id>` and only the destination is reported on `out`.
    pub fn reveal<W: Write>(&self, out: &mut W, export_dir: &Path) -> Result<Revealed> {
        match &self.secret {
            Secret::Credential { secret, .. } => {
                writeln!(out, "Password: {}", secret)?;
            }
            Secret::Text { text } => {
                writeln!(out, "Text:\n{}", text)?;
            }
            Secret::PaymentCard(card) => {
                writeln!(
                    out,
                    "Card Number: {}\nDate: {:02}/{:02}   Code: {:03}",
                    card.number, card.expiry_month, card.expiry_day, card.security_code
                )?;
            }
            Secret::Binary { payload } => {
                let path = self.export_path(export_dir)?;
                std::fs::write(&path, payload)?;
                writeln!(out, "Saved {} bytes to {}", payload.len(), path.display())?;
                return Ok(Revealed::Exported(path));
            }
        }

        Ok(Revealed::Printed)
    }

    fn export_path(&self, export_dir: &Path) -> Result<PathBuf> {
        if self.id == "." || self.id == ".." || self.id.contains(['/', '\\']) {
            return Err(PassKeepError::InvalidInput(format!(
                "record id {:?} can not be used as a file name",
                self.id
            )));
        }
        Ok(export_dir.join(&self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_records() -> Vec<Record> {
        vec![
            Record::credential("alice@example.com", "hunter2").unwrap(),
            Record::text("wifi", "ssid: home\npass: 12345").unwrap(),
            Record::binary("id_rsa", vec![0, 1, 2, 254, 255]).unwrap(),
            Record::payment_card("4111111111111111", 12, 31, 7).unwrap(),
        ]
    }

    #[test]
    fn ids_follow_the_kind() {
        let records = sample_records();
        assert_eq!(records[0].id(), "alice@example.com");
        assert_eq!(records[1].id(), "wifi");
        assert_eq!(records[2].id(), "id_rsa");
        assert_eq!(records[3].id(), "4111111111111111");
    }

    #[test]
    fn kind_roundtrip() {
        for kind in RecordKind::ALL {
            assert_eq!(RecordKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RecordKind::parse("totp"), None);
    }

    #[test]
    fn empty_id_rejected() {
        assert!(matches!(
            Record::credential("", "secret"),
            Err(PassKeepError::InvalidInput(_))
        ));
        assert!(matches!(
            Record::text("", "body"),
            Err(PassKeepError::InvalidInput(_))
        ));
    }

    #[test]
    fn card_fields_out_of_range_rejected() {
        assert!(Record::payment_card("4111", 0, 1, 1).is_err());
        assert!(Record::payment_card("4111", 13, 1, 1).is_err());
        assert!(Record::payment_card("4111", 1, 32, 1).is_err());
        assert!(Record::payment_card("4111", 1, 1, 0).is_err());
        assert!(Record::payment_card("4111", 1, 1, 1000).is_err());
        assert!(Record::payment_card("4111", 1, 1, 999).is_ok());
    }

    #[test]
    fn wire_roundtrip_preserves_everything() {
        let at = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        for record in sample_records() {
            let record = record.with_last_update_date(at);
            let back = Record::from_wire(record.to_wire()).unwrap();
            assert_eq!(back, record);
            assert_eq!(back.last_update_date(), at);
        }
    }

    #[test]
    fn wire_without_variant_is_rejected() {
        let mut wire = Record::text("note", "body").unwrap().to_wire();
        wire.variant = None;
        assert!(matches!(
            Record::from_wire(wire),
            Err(PassKeepError::UnknownRecordVariant(id)) if id == "note"
        ));
    }

    #[test]
    fn wire_card_out_of_range_rejected() {
        let mut wire = Record::payment_card("4111", 1, 1, 1).unwrap().to_wire();
        if let Some(WireVariant::PaymentCard { month, .. }) = wire.variant.as_mut() {
            *month = 14;
        }
        assert!(matches!(
            Record::from_wire(wire),
            Err(PassKeepError::InvalidInput(_))
        ));
    }

    #[test]
    fn wire_id_must_match_the_natural_key() {
        let mut credential = Record::credential("github", "pw").unwrap().to_wire();
        credential.id = "gitlab".to_string();
        assert!(matches!(
            Record::from_wire(credential),
            Err(PassKeepError::InvalidInput(_))
        ));

        let mut card = Record::payment_card("4111", 1, 1, 1).unwrap().to_wire();
        card.id = "5500".to_string();
        assert!(matches!(
            Record::from_wire(card),
            Err(PassKeepError::InvalidInput(_))
        ));

        // Text and binary ids are free-form keys.
        let text = Record::text("note", "body").unwrap().to_wire();
        assert!(Record::from_wire(text).is_ok());
    }

    #[test]
    fn reveal_prints_text_kinds() {
        let dir = tempfile::tempdir().unwrap();

        let mut out = Vec::new();
        let revealed = Record::credential("bob", "s3cret")
            .unwrap()
            .reveal(&mut out, dir.path())
            .unwrap();
        assert_eq!(revealed, Revealed::Printed);
        assert_eq!(String::from_utf8(out).unwrap(), "Password: s3cret\n");

        let mut out = Vec::new();
        Record::payment_card("4111", 3, 9, 42)
            .unwrap()
            .reveal(&mut out, dir.path())
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Card Number: 4111\nDate: 03/09   Code: 042\n"
        );
    }

    #[test]
    fn reveal_exports_binary_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let payload = vec![9u8, 8, 7, 6];
        let record = Record::binary("blob.bin", payload.clone()).unwrap();

        let mut out = Vec::new();
        let revealed = record.reveal(&mut out, dir.path()).unwrap();

        let path = dir.path().join("blob.bin");
        assert_eq!(revealed, Revealed::Exported(path.clone()));
        assert_eq!(std::fs::read(&path).unwrap(), payload);
    }

    #[test]
    fn reveal_refuses_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let record = Record::binary("../escape", vec![1]).unwrap();
        let mut out = Vec::new();
        assert!(record.reveal(&mut out, dir.path()).is_err());
    }
}
