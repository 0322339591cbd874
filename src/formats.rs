//! The date renderings the models learn to read.
//!
//! Each [`DateFormat`] is a pure function of a [`DateTuple`]. The order of
//! [`INPUT_FORMATS`] is significant: dataset rows are laid out format by
//! format in exactly this order.

use crate::date::DateTuple;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MONTH_NAMES_3LETTER: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateFormat {
    /// `20JAN2019`
    DdMmmYyyy,
    /// `012019`
    MmDdYy,
    /// `01/20/19`
    MmSlashDdSlashYy,
    /// `01/20/2019`
    MmSlashDdSlashYyyy,
    /// `1/20/2019`
    MSlashDSlashYyyy,
    /// `20-01-2019`
    DdDashMmDashYyyy,
    /// `20-1-2019`
    DDashMDashYyyy,
    /// `JAN 20 19`
    MmmSpaceDdSpaceYy,
    /// `1/20/19`
    MSlashDSlashYy,
    /// `JAN 20 2019`
    MmmSpaceDdSpaceYyyy,
    /// `JAN 20, 19`
    MmmSpaceDdCommaSpaceYy,
    /// `JAN 20, 2019`
    MmmSpaceDdCommaSpaceYyyy,
    /// `20.01.2019`
    DdDotMmDotYyyy,
    /// `20.1.2019`
    DDotMDotYyyy,
    /// `2019.01.20`
    YyyyDotMmDotDd,
    /// `2019.1.20`
    YyyyDotMDotD,
    /// `20190120`
    YyyyMmDd,
    /// `2019-1-20`
    YyyyDashMDashD,
    /// `20 JAN 2019`
    DSpaceMmmSpaceYyyy,
    /// `2019-01-20`, the conversion target
    Iso,
}

pub const INPUT_FORMATS: [DateFormat; 20] = [
    DateFormat::DdMmmYyyy,
    DateFormat::MmDdYy,
    DateFormat::MmSlashDdSlashYy,
    DateFormat::MmSlashDdSlashYyyy,
    DateFormat::MSlashDSlashYyyy,
    DateFormat::DdDashMmDashYyyy,
    DateFormat::DDashMDashYyyy,
    DateFormat::MmmSpaceDdSpaceYy,
    DateFormat::MSlashDSlashYy,
    DateFormat::MmmSpaceDdSpaceYyyy,
    DateFormat::MmmSpaceDdCommaSpaceYy,
    DateFormat::MmmSpaceDdCommaSpaceYyyy,
    DateFormat::DdDotMmDotYyyy,
    DateFormat::DDotMDotYyyy,
    DateFormat::YyyyDotMmDotDd,
    DateFormat::YyyyDotMDotD,
    DateFormat::YyyyMmDd,
    DateFormat::YyyyDashMDashD,
    DateFormat::DSpaceMmmSpaceYyyy,
    DateFormat::Iso,
];

impl DateFormat {
    /// Human readable layout, e.g. `MMM DD, YYYY`.
    pub const fn pattern(self) -> &'static str {
        match self {
            Self::DdMmmYyyy => "DDMMMYYYY",
            Self::MmDdYy => "MMDDYY",
            Self::MmSlashDdSlashYy => "MM/DD/YY",
            Self::MmSlashDdSlashYyyy => "MM/DD/YYYY",
            Self::MSlashDSlashYyyy => "M/D/YYYY",
            Self::DdDashMmDashYyyy => "DD-MM-YYYY",
            Self::DDashMDashYyyy => "D-M-YYYY",
            Self::MmmSpaceDdSpaceYy => "MMM DD YY",
            Self::MSlashDSlashYy => "M/D/YY",
            Self::MmmSpaceDdSpaceYyyy => "MMM DD YYYY",
            Self::MmmSpaceDdCommaSpaceYy => "MMM DD, YY",
            Self::MmmSpaceDdCommaSpaceYyyy => "MMM DD, YYYY",
            Self::DdDotMmDotYyyy => "DD.MM.YYYY",
            Self::DDotMDotYyyy => "D.M.YYYY",
            Self::YyyyDotMmDotDd => "YYYY.MM.DD",
            Self::YyyyDotMDotD => "YYYY.M.D",
            Self::YyyyMmDd => "YYYYMMDD",
            Self::YyyyDashMDashD => "YYYY-M-D",
            Self::DSpaceMmmSpaceYyyy => "D MMM YYYY",
            Self::Iso => "YYYY-MM-DD",
        }
    }

    pub fn render(self, date: DateTuple) -> String {
        let (y, m, d) = (date.year(), date.month(), date.day());
        let mmm = month_abbreviation(m);
        let yy = y % 100;
        match self {
            Self::DdMmmYyyy => format!("{d:02}{mmm}{y}"),
            Self::MmDdYy => format!("{m:02}{d:02}{yy:02}"),
            Self::MmSlashDdSlashYy => format!("{m:02}/{d:02}/{yy:02}"),
            Self::MmSlashDdSlashYyyy => format!("{m:02}/{d:02}/{y}"),
            Self::MSlashDSlashYyyy => format!("{m}/{d}/{y}"),
            Self::DdDashMmDashYyyy => format!("{d:02}-{m:02}-{y}"),
            Self::DDashMDashYyyy => format!("{d}-{m}-{y}"),
            Self::MmmSpaceDdSpaceYy => format!("{mmm} {d:02} {yy:02}"),
            Self::MSlashDSlashYy => format!("{m}/{d}/{yy:02}"),
            Self::MmmSpaceDdSpaceYyyy => format!("{mmm} {d:02} {y}"),
            Self::MmmSpaceDdCommaSpaceYy => format!("{mmm} {d:02}, {yy:02}"),
            Self::MmmSpaceDdCommaSpaceYyyy => format!("{mmm} {d:02}, {y}"),
            Self::DdDotMmDotYyyy => format!("{d:02}.{m:02}.{y}"),
            Self::DDotMDotYyyy => format!("{d}.{m}.{y}"),
            Self::YyyyDotMmDotDd => format!("{y}.{m:02}.{d:02}"),
            Self::YyyyDotMDotD => format!("{y}.{m}.{d}"),
            Self::YyyyMmDd => format!("{y}{m:02}{d:02}"),
            Self::YyyyDashMDashD => format!("{y}-{m}-{d}"),
            Self::DSpaceMmmSpaceYyyy => format!("{d} {mmm} {y}"),
            Self::Iso => date.to_string(),
        }
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pattern())
    }
}

fn month_abbreviation(month: u8) -> &'static str {
    MONTH_NAMES_3LETTER[usize::from(month - 1)]
}

/// The target rendering, `YYYY-MM-DD`.
pub fn to_iso(date: DateTuple) -> String {
    DateFormat::Iso.render(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::ordered_dates;
    use crate::vocab::INPUT_LENGTH;

    fn jan_20_2019() -> DateTuple {
        DateTuple::new(2019, 1, 20).unwrap()
    }

    #[test]
    fn test_every_format_on_reference_date() {
        let expected = [
            "20JAN2019",
            "012019",
            "01/20/19",
            "01/20/2019",
            "1/20/2019",
            "20-01-2019",
            "20-1-2019",
            "JAN 20 19",
            "1/20/19",
            "JAN 20 2019",
            "JAN 20, 19",
            "JAN 20, 2019",
            "20.01.2019",
            "20.1.2019",
            "2019.01.20",
            "2019.1.20",
            "20190120",
            "2019-1-20",
            "20 JAN 2019",
            "2019-01-20",
        ];
        let date = jan_20_2019();
        for (format, want) in INPUT_FORMATS.iter().zip(expected) {
            assert_eq!(format.render(date), want, "format {format}");
        }
    }

    #[test]
    fn test_two_digit_year_keeps_leading_zero() {
        let date = DateTuple::new(2005, 10, 1).unwrap();
        assert_eq!(DateFormat::MmDdYy.render(date), "100105");
        assert_eq!(DateFormat::MSlashDSlashYy.render(date), "10/1/05");
        assert_eq!(DateFormat::MmmSpaceDdCommaSpaceYy.render(date), "OCT 01, 05");
        assert_eq!(DateFormat::DSpaceMmmSpaceYyyy.render(date), "1 OCT 2005");
    }

    #[test]
    fn test_renderings_fit_input_length() {
        for date in ordered_dates(2019, 2020).unwrap() {
            for format in INPUT_FORMATS {
                let rendered = format.render(date);
                assert!(rendered.len() <= INPUT_LENGTH, "{rendered}");
            }
            assert_eq!(to_iso(date).len(), 10);
        }
    }

    #[test]
    fn test_formats_are_deterministic() {
        let date = DateTuple::new(1987, 12, 3).unwrap();
        for format in INPUT_FORMATS {
            assert_eq!(format.render(date), format.render(date));
        }
    }

    #[test]
    fn test_patterns_are_unique() {
        let mut patterns: Vec<_> = INPUT_FORMATS.iter().map(|f| f.pattern()).collect();
        patterns.sort_unstable();
        patterns.dedup();
        assert_eq!(patterns.len(), INPUT_FORMATS.len());
    }
}
