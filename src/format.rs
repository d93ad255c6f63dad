use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
pub enum Locale {
    #[default]
    #[serde(rename = "pt-BR", alias = "pt-br", alias = "pt")]
    PtBr,
    #[serde(rename = "en-US", alias = "en-us", alias = "en")]
    EnUs,
}

impl Locale {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "pt-br" | "pt" => Some(Locale::PtBr),
            "en-us" | "en" => Some(Locale::EnUs),
            _ => None,
        }
    }

    fn decimal_separator(&self) -> char {
        match self {
            Locale::PtBr => ',',
            Locale::EnUs => '.',
        }
    }

    fn compact_suffixes(&self) -> [&'static str; 4] {
        match self {
            Locale::PtBr => [" mil", " mi", " bi", " tri"],
            Locale::EnUs => ["K", "M", "B", "T"],
        }
    }
}

const COMPACT_UNITS: [u64; 4] = [1_000, 1_000_000, 1_000_000_000, 1_000_000_000_000];

/// Formats a counter in the locale's compact notation (`1,2 mil`, `1.2K`).
///
/// One fractional digit is kept while the scaled value is below ten, and a
/// value that rounds up to a thousand of its unit is promoted to the next.
pub fn compact_number(value: i64, locale: Locale) -> String {
    let magnitude = value.unsigned_abs();
    if magnitude < COMPACT_UNITS[0] {
        return value.to_string();
    }

    let mut index = COMPACT_UNITS
        .iter()
        .rposition(|unit| magnitude >= *unit)
        .unwrap_or(0);
    let mut tenths = round_tenths(magnitude, COMPACT_UNITS[index]);
    if tenths >= 10_000 && index + 1 < COMPACT_UNITS.len() {
        index += 1;
        tenths = round_tenths(magnitude, COMPACT_UNITS[index]);
    }

    let mut digits = if tenths % 10 == 0 {
        format!("{}", tenths / 10)
    } else {
        format!("{}.{}", tenths / 10, tenths % 10)
    };
    if locale.decimal_separator() != '.' {
        digits = digits.replace('.', &locale.decimal_separator().to_string());
    }

    let sign = if value < 0 { "-" } else { "" };
    format!("{sign}{digits}{}", locale.compact_suffixes()[index])
}

// `magnitude / unit` in tenths, rounded half up: one decimal below 10,
// whole units above.
fn round_tenths(magnitude: u64, unit: u64) -> u128 {
    let (magnitude, unit) = (u128::from(magnitude), u128::from(unit));
    if magnitude < unit * 10 {
        (magnitude * 10 + unit / 2) / unit
    } else {
        (magnitude + unit / 2) / unit * 10
    }
}

pub fn published_on(date: NaiveDate, locale: Locale) -> String {
    match locale {
        Locale::PtBr => format!("Publicado em {}", date.format("%d/%m/%Y")),
        Locale::EnUs => format!("Published {}", date.format("%m/%d/%Y")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_are_left_alone() {
        assert_eq!(compact_number(0, Locale::PtBr), "0");
        assert_eq!(compact_number(999, Locale::EnUs), "999");
        assert_eq!(compact_number(-42, Locale::PtBr), "-42");
    }

    #[test]
    fn thousands_use_locale_suffix_and_separator() {
        assert_eq!(compact_number(1_200, Locale::PtBr), "1,2 mil");
        assert_eq!(compact_number(1_200, Locale::EnUs), "1.2K");
        assert_eq!(compact_number(1_000, Locale::PtBr), "1 mil");
        assert_eq!(compact_number(12_345, Locale::EnUs), "12K");
        assert_eq!(compact_number(123_456, Locale::PtBr), "123 mil");
    }

    #[test]
    fn larger_units() {
        assert_eq!(compact_number(1_500_000, Locale::PtBr), "1,5 mi");
        assert_eq!(compact_number(2_000_000_000, Locale::EnUs), "2B");
        assert_eq!(compact_number(3_000_000_000_000, Locale::PtBr), "3 tri");
    }

    #[test]
    fn rounding_promotes_to_next_unit() {
        assert_eq!(compact_number(9_960, Locale::EnUs), "10K");
        assert_eq!(compact_number(999_999, Locale::EnUs), "1M");
        assert_eq!(compact_number(999_999, Locale::PtBr), "1 mi");
    }

    #[test]
    fn midpoints_round_half_up() {
        assert_eq!(compact_number(1_150, Locale::EnUs), "1.2K");
        assert_eq!(compact_number(1_149, Locale::EnUs), "1.1K");
        assert_eq!(compact_number(2_050_000, Locale::PtBr), "2,1 mi");
        assert_eq!(compact_number(14_500, Locale::EnUs), "15K");
    }

    #[test]
    fn negative_values_keep_sign() {
        assert_eq!(compact_number(-1_200, Locale::EnUs), "-1.2K");
    }

    #[test]
    fn published_date_follows_locale() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(published_on(date, Locale::PtBr), "Publicado em 07/03/2026");
        assert_eq!(published_on(date, Locale::EnUs), "Published 03/07/2026");
    }

    #[test]
    fn locale_tags() {
        assert_eq!(Locale::from_tag("pt_BR"), Some(Locale::PtBr));
        assert_eq!(Locale::from_tag("EN"), Some(Locale::EnUs));
        assert_eq!(Locale::from_tag("fr"), None);
    }
}
