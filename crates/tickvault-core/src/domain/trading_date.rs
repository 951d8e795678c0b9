use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::ValidationError;

const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const DAY_MONTH_YEAR: &[BorrowedFormatItem<'static>] = format_description!("[day]-[month]-[year]");

/// Calendar date used to key daily rows.
///
/// Accepts ISO (`2024-03-05`) and day-first (`05-03-2024`) spellings, the
/// two formats holdings disclosures and provider payloads actually use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TradingDate(Date);

impl TradingDate {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        Date::parse(trimmed, ISO_DATE)
            .or_else(|_| Date::parse(trimmed, DAY_MONTH_YEAR))
            .map(Self)
            .map_err(|_| ValidationError::InvalidDate {
                value: input.to_owned(),
            })
    }

    /// Calendar date of a UTC epoch-second instant.
    pub fn from_unix_timestamp(seconds: i64) -> Result<Self, ValidationError> {
        let instant =
            OffsetDateTime::from_unix_timestamp(seconds).map_err(|_| ValidationError::InvalidDate {
                value: seconds.to_string(),
            })?;
        Ok(Self(instant.date()))
    }

    pub fn from_date(value: Date) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> Date {
        self.0
    }

    pub fn format_iso(self) -> String {
        self.0
            .format(ISO_DATE)
            .expect("TradingDate must be ISO formattable")
    }
}

impl Display for TradingDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_iso())
    }
}

impl Serialize for TradingDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_iso())
    }
}

impl<'de> Deserialize<'de> for TradingDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}
