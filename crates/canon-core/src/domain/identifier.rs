//! arXiv identifiers.
//!
//! Two shapes are accepted: old-style `archive[.sub]/YYMMNNN` (used
//! through March 2007) and new-style `YYMM.NNNNN` (4-digit incremental
//! part before 2015, 5-digit from 2015 on). Ordering is total and
//! chronological by `(year, month, numeric_part)`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::DomainError;

/// An arXiv e-print identifier.
#[derive(Debug, Clone)]
pub struct Identifier {
    year: i32,
    month: u32,
    /// Incremental part: NNN for old-style, NNNN/NNNNN for new-style.
    number: u32,
    /// `archive[.sub]` for old-style identifiers; `None` for new-style.
    category: Option<String>,
}

impl Identifier {
    /// Generate a new-style identifier from its parts.
    pub fn from_parts(year: i32, month: u32, number: u32) -> Self {
        Identifier {
            year,
            month,
            number,
            category: None,
        }
    }

    /// The four-digit year in which the e-print was submitted.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// The month (1–12) in which the e-print was submitted.
    pub fn month(&self) -> u32 {
        self.month
    }

    /// The incremental part of the identifier (NNN / NNNNN).
    pub fn incremental_part(&self) -> u32 {
        self.number
    }

    /// All digits of the identifier, concatenated: `YYMMNNN` for
    /// old-style, `YYMMNNNNN` for new-style.
    pub fn numeric_part(&self) -> u64 {
        let yymm = (self.year % 100) as u64 * 100 + u64::from(self.month);
        if self.is_old_style() {
            yymm * 1_000 + u64::from(self.number)
        } else {
            yymm * 10u64.pow(self.number_width()) + u64::from(self.number)
        }
    }

    /// The `archive[.sub]` part of an old-style identifier.
    pub fn category_part(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn is_old_style(&self) -> bool {
        self.category.is_some()
    }

    fn number_width(&self) -> u32 {
        if self.is_old_style() {
            3
        } else if self.year >= 2015 {
            5
        } else {
            4
        }
    }

    pub(crate) fn yymm(&self) -> (u32, u32) {
        ((self.year % 100) as u32, self.month)
    }

    fn full_year(yy: u32) -> i32 {
        // The scheme started in 1991; two-digit years above 90 are 19xx.
        if yy > 90 {
            1900 + yy as i32
        } else {
            2000 + yy as i32
        }
    }

    fn parse_numeric(digits: &str, category: Option<String>, original: &str) -> Result<Self, DomainError> {
        let invalid = || DomainError::InvalidIdentifier {
            value: original.to_string(),
        };
        let yy: u32 = digits[0..2].parse().map_err(|_| invalid())?;
        let mm: u32 = digits[2..4].parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&mm) {
            return Err(invalid());
        }
        let number: u32 = digits[4..].parse().map_err(|_| invalid())?;
        Ok(Identifier {
            year: Self::full_year(yy),
            month: mm,
            number,
            category,
        })
    }
}

impl FromStr for Identifier {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::InvalidIdentifier {
            value: value.to_string(),
        };
        if let Some((category, numeric)) = value.split_once('/') {
            // Old style: archive[.sub]/YYMMNNN
            if numeric.len() != 7 || !numeric.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            if category.is_empty()
                || !category
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.')
            {
                return Err(invalid());
            }
            return Self::parse_numeric(numeric, Some(category.to_string()), value);
        }
        // New style: YYMM.NNNN or YYMM.NNNNN
        let (yymm, number) = value.split_once('.').ok_or_else(invalid)?;
        if yymm.len() != 4
            || !(4..=5).contains(&number.len())
            || !yymm.bytes().all(|b| b.is_ascii_digit())
            || !number.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        Self::parse_numeric(&format!("{yymm}{number}"), None, value)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (yy, mm) = self.yymm();
        match &self.category {
            Some(category) => write!(f, "{category}/{yy:02}{mm:02}{:03}", self.number),
            None => {
                let width = self.number_width() as usize;
                write!(f, "{yy:02}{mm:02}.{:0width$}", self.number)
            }
        }
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Identifier {}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.year, self.month, self.number, &self.category).cmp(&(
            other.year,
            other.month,
            other.number,
            &other.category,
        ))
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::hash::Hash for Identifier {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (self.year, self.month, self.number, &self.category).hash(state);
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// An [`Identifier`] plus a positive version number; renders `<id>v<n>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionedIdentifier {
    pub arxiv_id: Identifier,
    pub version: u32,
}

impl VersionedIdentifier {
    pub fn new(arxiv_id: Identifier, version: u32) -> Self {
        VersionedIdentifier { arxiv_id, version }
    }

    pub fn year(&self) -> i32 {
        self.arxiv_id.year()
    }

    pub fn month(&self) -> u32 {
        self.arxiv_id.month()
    }
}

impl FromStr for VersionedIdentifier {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::InvalidVersionedIdentifier {
            value: value.to_string(),
        };
        // The version suffix is the rightmost `v` followed only by digits.
        let at = value.rfind('v').ok_or_else(invalid)?;
        let (id_part, v_part) = (&value[..at], &value[at + 1..]);
        if v_part.is_empty() || !v_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let version: u32 = v_part.parse().map_err(|_| invalid())?;
        if version < 1 {
            return Err(invalid());
        }
        Ok(VersionedIdentifier {
            arxiv_id: id_part.parse()?,
            version,
        })
    }
}

impl fmt::Display for VersionedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.arxiv_id, self.version)
    }
}

impl Serialize for VersionedIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionedIdentifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Addresses one listing file: a date plus a shard name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListingIdentifier {
    pub date: NaiveDate,
    pub shard: String,
}

impl ListingIdentifier {
    pub fn from_parts(date: NaiveDate, shard: impl Into<String>) -> Self {
        ListingIdentifier {
            date,
            shard: shard.into(),
        }
    }
}

impl fmt::Display for ListingIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.date.format("%Y-%m-%d"), self.shard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_new_style() {
        let id: Identifier = "2901.00345".parse().unwrap();
        assert_eq!(id.year(), 2029);
        assert_eq!(id.month(), 1);
        assert_eq!(id.incremental_part(), 345);
        assert!(!id.is_old_style());
        assert_eq!(id.to_string(), "2901.00345");
    }

    #[test]
    fn parses_four_digit_new_style() {
        let id: Identifier = "0704.0123".parse().unwrap();
        assert_eq!(id.year(), 2007);
        assert_eq!(id.incremental_part(), 123);
        assert_eq!(id.to_string(), "0704.0123");
    }

    #[test]
    fn parses_old_style() {
        let id: Identifier = "hep-lat/9912001".parse().unwrap();
        assert_eq!(id.year(), 1999);
        assert_eq!(id.month(), 12);
        assert_eq!(id.incremental_part(), 1);
        assert_eq!(id.category_part(), Some("hep-lat"));
        assert!(id.is_old_style());
        assert_eq!(id.to_string(), "hep-lat/9912001");
    }

    #[test]
    fn parses_old_style_with_subject_class() {
        let id: Identifier = "math.GT/0309136".parse().unwrap();
        assert_eq!(id.category_part(), Some("math.GT"));
        assert_eq!(id.to_string(), "math.GT/0309136");
    }

    #[test]
    fn numeric_part() {
        let old: Identifier = "hep-lat/9912001".parse().unwrap();
        assert_eq!(old.numeric_part(), 9_912_001);
        let new: Identifier = "2901.00345".parse().unwrap();
        assert_eq!(new.numeric_part(), 290_100_345);
    }

    #[test]
    fn ordering_is_chronological() {
        let a: Identifier = "hep-lat/9912001".parse().unwrap();
        let b: Identifier = "0704.0001".parse().unwrap();
        let c: Identifier = "2901.00345".parse().unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn rejects_garbage() {
        assert!("not-an-id".parse::<Identifier>().is_err());
        assert!("29.00345".parse::<Identifier>().is_err());
        assert!("2913.00345".parse::<Identifier>().is_err()); // month 13
        assert!("hep-lat/99120".parse::<Identifier>().is_err());
    }

    #[test]
    fn versioned_round_trip() {
        let vid: VersionedIdentifier = "2901.00345v2".parse().unwrap();
        assert_eq!(vid.version, 2);
        assert_eq!(vid.to_string(), "2901.00345v2");

        // Old-style archives may contain a `v` of their own.
        let vid: VersionedIdentifier = "solv-int/9912001v1".parse().unwrap();
        assert_eq!(vid.version, 1);
        assert_eq!(vid.arxiv_id.category_part(), Some("solv-int"));
    }

    #[test]
    fn versioned_rejects_version_zero() {
        assert!("2901.00345v0".parse::<VersionedIdentifier>().is_err());
        assert!("2901.00345".parse::<VersionedIdentifier>().is_err());
    }

    #[test]
    fn listing_identifier_display() {
        let lid = ListingIdentifier::from_parts(
            NaiveDate::from_ymd_opt(2029, 1, 29).unwrap(),
            "listing",
        );
        assert_eq!(lid.to_string(), "2029-01-29-listing");
    }
}
