use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_with::{DeserializeFromStr, SerializeDisplay};

use std::{
    fmt::{Debug, Display},
    str::FromStr,
};

use crate::error::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Represents the timestamp of a sale.
///
/// Parses from `YYYY-MM-DD` (midnight), or from an ISO date-time, whose time
/// is kept: two sales at different times of one day are different dates
/// for grouping and for the report window. The [`Display`] implementation
/// formats midnight as `YYYY-MM-DD` and anything else as
/// `YYYY-MM-DD HH:MM:SS`.
#[derive(
    Clone, Copy, DeserializeFromStr, SerializeDisplay, Eq, PartialEq, Hash, Ord, PartialOrd,
)]
pub struct SaleDate(NaiveDateTime);

impl SaleDate {
    #[must_use]
    pub fn naive(self) -> NaiveDateTime {
        self.0
    }
}

impl Debug for SaleDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for SaleDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.time() == NaiveTime::MIN {
            write!(f, "{}", self.0.format(DATE_FORMAT))
        } else {
            write!(f, "{}", self.0.format(DATETIME_FORMAT))
        }
    }
}

impl FromStr for SaleDate {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, DATE_FORMAT) {
            return Ok(Self(date.and_time(NaiveTime::MIN)));
        }
        DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .map(Self)
            .ok_or_else(|| Error::InvalidDate(s.to_string()))
    }
}
