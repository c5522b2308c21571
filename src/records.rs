use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// A customer record. Immutable once the directory is built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Record {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub last_transaction: NaiveDate,
    /// Minor units (cents).
    pub balance_cents: i64,
    pub opened_on: NaiveDate,
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub cross_sell: Vec<String>,
}

impl Record {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn balance(&self) -> Balance {
        Balance(self.balance_cents)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balance(pub i64);

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Username-keyed view over the loaded records.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    records: Vec<Record>,
    index: HashMap<String, usize>,
}

impl Directory {
    /// Indexes each record under its id and its first name. Two records
    /// claiming the same key is an error.
    pub fn new(records: Vec<Record>) -> Result<Self> {
        let mut index = HashMap::new();
        for (position, record) in records.iter().enumerate() {
            let mut keys = vec![normalize_key(&record.id)];
            let name_key = normalize_key(&record.first_name);
            if name_key != keys[0] {
                keys.push(name_key);
            }

            for key in keys {
                if key.is_empty() {
                    bail!("record at position {} has an empty id or first name", position);
                }
                if let Some(existing) = index.insert(key.clone(), position) {
                    bail!(
                        "duplicate record key '{}' (records {} and {})",
                        key,
                        records[existing].id,
                        record.id
                    );
                }
            }
        }

        Ok(Self { records, index })
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let records: Vec<Record> =
            serde_json::from_str(raw).context("Failed to parse records JSON")?;
        Self::new(records)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read records file '{}'", path.display()))?;
        let directory = Self::from_json_str(&raw)
            .with_context(|| format!("Invalid records file '{}'", path.display()))?;
        if directory.is_empty() {
            warn!(
                path = %path.display(),
                "records file has no entries; every lookup will report User not found"
            );
        } else {
            info!(
                path = %path.display(),
                record_count = directory.len(),
                "loaded records from file"
            );
        }
        Ok(directory)
    }

    pub fn seeded() -> Result<Self> {
        Self::new(seed_records())
    }

    pub fn lookup(&self, username: &str) -> Option<&Record> {
        self.index
            .get(&normalize_key(username))
            .map(|&position| &self.records[position])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

fn codes(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

fn seed_records() -> Vec<Record> {
    vec![
        Record {
            id: "C1001".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Moreau".to_string(),
            last_transaction: date(2023, 3, 14),
            balance_cents: 254_075,
            opened_on: date(2015, 6, 2),
            products: codes(&["CHK-01", "SAV-02"]),
            cross_sell: codes(&["CC-GOLD", "INS-HOME"]),
        },
        Record {
            id: "C1002".to_string(),
            first_name: "Bilal".to_string(),
            last_name: "Haddad".to_string(),
            last_transaction: date(2023, 2, 27),
            balance_cents: 18_230,
            opened_on: date(2019, 11, 20),
            products: codes(&["CHK-01"]),
            cross_sell: codes(&["SAV-02", "LN-AUTO"]),
        },
        Record {
            id: "C1003".to_string(),
            first_name: "Chen".to_string(),
            last_name: "Wei".to_string(),
            last_transaction: date(2023, 3, 1),
            balance_cents: 1_204_500,
            opened_on: date(2011, 1, 9),
            products: codes(&["CHK-02", "INV-01", "MTG-30"]),
            cross_sell: codes(&["WM-ADV"]),
        },
        Record {
            id: "C1004".to_string(),
            first_name: "Dana".to_string(),
            last_name: "Okafor".to_string(),
            last_transaction: date(2022, 12, 19),
            balance_cents: -4_210,
            opened_on: date(2021, 8, 30),
            products: codes(&["CHK-01", "CC-STD"]),
            cross_sell: Vec::new(),
        },
    ]
}
