//! Reading raw award ledgers from disk.

use std::{fmt, path::Path};

use serde::{Deserialize, Deserializer, de};

/// One raw ledger record. Every field is optional here; the pipeline
/// decides what is required.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct LedgerRow {
    #[serde(default)]
    pub film: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub year_film: Option<i32>,
    #[serde(default)]
    pub year_ceremony: Option<i32>,
    #[serde(default, deserialize_with = "flag")]
    pub winner: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("failed to read ledger: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed csv record: {0}")]
    Csv(#[from] csv::Error),
    #[error("malformed json ledger: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported ledger format: {0}")]
    UnsupportedFormat(String),
}

/// Loads a ledger file. CSV records that fail to decode are returned as
/// errors in place so the pipeline can count them; a JSON file must parse
/// as a whole.
pub fn read_ledger(path: &Path) -> Result<Vec<Result<LedgerRow, LedgerError>>, LedgerError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "csv" => {
            let reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
            Ok(parse_csv(reader))
        },
        "json" => {
            let bytes = std::fs::read(path)?;
            let rows: Vec<LedgerRow> = serde_json::from_slice(&bytes)?;
            Ok(rows.into_iter().map(Ok).collect())
        },
        other => Err(LedgerError::UnsupportedFormat(other.to_string())),
    }
}

pub fn parse_csv<R: std::io::Read>(mut reader: csv::Reader<R>) -> Vec<Result<LedgerRow, LedgerError>> {
    reader.deserialize::<LedgerRow>().map(|r| r.map_err(LedgerError::from)).collect()
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlagVisitor;

    impl de::Visitor<'_> for FlagVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a boolean, 0/1 or true/false text")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
            match v.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" | "" => Ok(false),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }

        fn visit_unit<E: de::Error>(self) -> Result<bool, E> {
            Ok(false)
        }

        fn visit_none<E: de::Error>(self) -> Result<bool, E> {
            Ok(false)
        }
    }

    deserializer.deserialize_any(FlagVisitor)
}
