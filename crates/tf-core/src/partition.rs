//! Daily partition keys and partitioning flags

use crate::error::{CoreError, CoreResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const PARTITION_FORMAT: &str = "%Y-%m-%d";
const COMPACT_FORMAT: &str = "%Y%m%d";

/// Whether a stage runs once per day or against a single "latest" snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partitioning {
    /// One run per calendar date
    Daily,
    /// Master/reference data, always the latest snapshot
    Unpartitioned,
}

impl Partitioning {
    /// A pipeline is date-partitioned iff it declares a date column
    pub fn from_date_column(date_column: Option<&str>) -> Self {
        match date_column {
            Some(col) if !col.trim().is_empty() => Partitioning::Daily,
            _ => Partitioning::Unpartitioned,
        }
    }

    pub fn is_partitioned(self) -> bool {
        self == Partitioning::Daily
    }
}

impl fmt::Display for Partitioning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partitioning::Daily => write!(f, "daily"),
            Partitioning::Unpartitioned => write!(f, "unpartitioned"),
        }
    }
}

/// A `YYYY-MM-DD` partition identifier supplied by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey(NaiveDate);

impl PartitionKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Parse a partition key, rejecting anything that is not a calendar date
    pub fn parse(value: &str) -> CoreResult<Self> {
        NaiveDate::parse_from_str(value.trim(), PARTITION_FORMAT)
            .map(Self)
            .map_err(|_| CoreError::InvalidPartition {
                value: value.to_string(),
            })
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// `YYYYMMDD`, used in storage paths
    pub fn compact(&self) -> String {
        self.0.format(COMPACT_FORMAT).to_string()
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(PARTITION_FORMAT))
    }
}

impl FromStr for PartitionKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PartitionKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PartitionKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PartitionKey::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format() {
        let key = PartitionKey::parse("2024-06-01").unwrap();
        assert_eq!(key.to_string(), "2024-06-01");
        assert_eq!(key.compact(), "20240601");
    }

    #[test]
    fn test_parse_rejects_non_dates() {
        assert!(PartitionKey::parse("2024-13-01").is_err());
        assert!(PartitionKey::parse("latest").is_err());
        assert!(PartitionKey::parse("2024-06-01' OR '1'='1").is_err());
    }

    #[test]
    fn test_partitioning_from_date_column() {
        assert_eq!(
            Partitioning::from_date_column(Some("DATE(created_at)")),
            Partitioning::Daily
        );
        assert_eq!(
            Partitioning::from_date_column(None),
            Partitioning::Unpartitioned
        );
        assert_eq!(
            Partitioning::from_date_column(Some("  ")),
            Partitioning::Unpartitioned
        );
    }
}
