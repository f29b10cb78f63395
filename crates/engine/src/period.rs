//! Month/year period labels used as payment bucket keys.

use serde::Deserialize;

/// Portuguese month abbreviations, January first.
pub const MONTH_ABBREV: [&str; 12] = [
    "JAN", "FEV", "MAR", "ABR", "MAI", "JUN", "JUL", "AGO", "SET", "OUT", "NOV", "DEZ",
];

/// Sentinel label for entries whose month token is unrecognized.
pub const UNKNOWN_PERIOD: &str = "???";

pub fn month_abbrev(month: u32) -> Option<&'static str> {
    MONTH_ABBREV.get(month.checked_sub(1)? as usize).copied()
}

/// "MAR/21"-style label; the sentinel when the month is out of range.
pub fn period_label(month: u32, year: i32) -> String {
    match month_abbrev(month) {
        Some(abbrev) => format!("{}/{:02}", abbrev, year.rem_euclid(100)),
        None => UNKNOWN_PERIOD.to_string(),
    }
}

/// Inclusive run of years covered by the consolidated output. The full
/// period list is fixed per run, independent of which periods carry data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct YearRange {
    #[serde(default = "default_first_year")]
    pub first: i32,
    #[serde(default = "default_last_year")]
    pub last: i32,
}

fn default_first_year() -> i32 {
    2021
}

fn default_last_year() -> i32 {
    2025
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            first: default_first_year(),
            last: default_last_year(),
        }
    }
}

impl YearRange {
    /// Every period label of the range, chronological.
    pub fn labels(&self) -> Vec<String> {
        let mut labels = Vec::new();
        for year in self.first..=self.last {
            for month in 1..=12 {
                labels.push(period_label(month, year));
            }
        }
        labels
    }

    /// The twelve labels of the final year, used for the year-total column.
    pub fn final_year_labels(&self) -> Vec<String> {
        (1..=12).map(|month| period_label(month, self.last)).collect()
    }
}
