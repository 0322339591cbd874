use crate::error::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_YEAR: u16 = 1000;
pub const MAX_YEAR: u16 = 9999;
pub const MONTHS: u8 = 12;

const FEBRUARY: u8 = 2;
const FEBRUARY_DAYS_LEAP: u8 = 29;
const DAYS_IN_MONTH: [u8; 13] = [0, 31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// A calendar date with a four digit year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "(u16, u8, u8)", into = "(u16, u8, u8)")]
pub struct DateTuple {
    year: u16,
    month: u8,
    day: u8,
}

impl DateTuple {
    /// # Errors
    /// Returns `InvalidYear`, `InvalidMonth` or `InvalidDay` when a component
    /// is out of range for the Gregorian calendar.
    pub fn new(year: u16, month: u8, day: u8) -> Result<Self> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(Error::InvalidYear(year));
        }
        if month == 0 || month > MONTHS {
            return Err(Error::InvalidMonth(month));
        }
        if day == 0 || day > days_in_month(year, month) {
            return Err(Error::InvalidDay { year, month, day });
        }
        Ok(Self { year, month, day })
    }

    #[inline]
    pub const fn year(self) -> u16 {
        self.year
    }

    #[inline]
    pub const fn month(self) -> u8 {
        self.month
    }

    #[inline]
    pub const fn day(self) -> u8 {
        self.day
    }

    /// The following calendar day, or `None` after 9999-12-31.
    pub fn succ(self) -> Option<Self> {
        if self.day < days_in_month(self.year, self.month) {
            return Some(Self {
                day: self.day + 1,
                ..self
            });
        }
        if self.month < MONTHS {
            return Some(Self {
                month: self.month + 1,
                day: 1,
                ..self
            });
        }
        if self.year < MAX_YEAR {
            return Some(Self {
                year: self.year + 1,
                month: 1,
                day: 1,
            });
        }
        None
    }

    /// A random date whose year lies in `min_year..max_year`.
    ///
    /// # Errors
    /// Returns `InvalidYearRange` unless `min_year < max_year`, and
    /// `InvalidYear` when the range leaves `1000..=9999`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, min_year: u16, max_year: u16) -> Result<Self> {
        check_year_range(min_year, max_year)?;
        let year = rng.gen_range(min_year..max_year);
        let month = rng.gen_range(1..=MONTHS);
        let day = rng.gen_range(1..=days_in_month(year, month));
        Self::new(year, month, day)
    }
}

impl TryFrom<(u16, u8, u8)> for DateTuple {
    type Error = Error;

    fn try_from((year, month, day): (u16, u8, u8)) -> Result<Self> {
        Self::new(year, month, day)
    }
}

impl From<DateTuple> for (u16, u8, u8) {
    fn from(date: DateTuple) -> Self {
        (date.year, date.month, date.day)
    }
}

impl fmt::Display for DateTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Parses the ISO rendering `YYYY-MM-DD`.
impl FromStr for DateTuple {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::NotIsoFormat(s.to_string());
        let parts: Vec<&str> = s.split('-').collect();
        let [year, month, day] = parts.as_slice() else {
            return Err(invalid());
        };
        let well_formed = [(year, 4), (month, 2), (day, 2)]
            .iter()
            .all(|(part, len)| part.len() == *len && part.bytes().all(|b| b.is_ascii_digit()));
        if !well_formed {
            return Err(invalid());
        }
        Self::new(
            year.parse().map_err(|_| invalid())?,
            month.parse().map_err(|_| invalid())?,
            day.parse().map_err(|_| invalid())?,
        )
    }
}

pub const fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub const fn days_in_month(year: u16, month: u8) -> u8 {
    debug_assert!(month != 0 && month <= MONTHS);

    if month == FEBRUARY && is_leap_year(year) {
        FEBRUARY_DAYS_LEAP
    } else {
        DAYS_IN_MONTH[month as usize]
    }
}

fn check_year_range(min_year: u16, max_year: u16) -> Result<()> {
    if min_year >= max_year {
        return Err(Error::InvalidYearRange { min_year, max_year });
    }
    if min_year < MIN_YEAR {
        return Err(Error::InvalidYear(min_year));
    }
    // max_year itself is exclusive, so 10000 is still a valid bound
    if max_year > MAX_YEAR + 1 {
        return Err(Error::InvalidYear(max_year));
    }
    Ok(())
}

/// Every day from `min_year-01-01` up to, not including, `max_year-01-01`.
///
/// # Errors
/// Returns `InvalidYearRange` unless `min_year < max_year`.
pub fn ordered_dates(min_year: u16, max_year: u16) -> Result<Vec<DateTuple>> {
    check_year_range(min_year, max_year)?;

    let mut dates = Vec::new();
    let mut current = Some(DateTuple::new(min_year, 1, 1)?);
    while let Some(date) = current {
        if date.year() >= max_year {
            break;
        }
        dates.push(date);
        current = date.succ();
    }
    Ok(dates)
}
