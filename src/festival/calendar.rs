//! Festival catalog and query resolution.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::FestivalError;

/// A catalog entry: canonical name, accepted aliases and the fixed calendar day
/// used when a model cannot say when the festival next happens.
#[derive(Debug, Clone, Copy)]
pub struct FestivalDef {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub month: u32,
    pub day: u32,
}

const fn def(
    name: &'static str,
    aliases: &'static [&'static str],
    month: u32,
    day: u32,
) -> FestivalDef {
    FestivalDef {
        name,
        aliases,
        month,
        day,
    }
}

/// Scanned in order when matching names; first match wins.
static CATALOG: &[FestivalDef] = &[
    def("New Year", &["new_year", "newyear", "new years"], 1, 1),
    def("Makar Sankranti", &["sankranti", "makar_sankranti"], 1, 14),
    def("Pongal", &[], 1, 15),
    def("Republic Day", &["republic_day"], 1, 26),
    def("Valentine's Day", &["valentine", "valentines"], 2, 14),
    def("Holi", &[], 3, 14),
    def("Eid", &["eid ul fitr", "ramzan", "ramadan"], 4, 10),
    def("Independence Day", &["independence_day"], 8, 15),
    def("Raksha Bandhan", &["rakhi"], 8, 19),
    def("Ganesh Chaturthi", &["ganesh", "ganeshotsav"], 9, 7),
    def("Navratri", &["navaratri"], 10, 3),
    def("Dussehra", &["dasara", "dussera", "vijayadashami"], 10, 12),
    def("Diwali", &["deepawali", "deepavali", "divali"], 11, 1),
    def("Black Friday", &["black_friday"], 11, 29),
    def("Christmas", &["xmas", "x-mas"], 12, 25),
];

/// Exact `(month, day)` table, inserted in order. Sankranti and Pongal share
/// 14 January in the source data; the later insert wins.
static EXACT_DATES: Lazy<HashMap<(u32, u32), &'static str>> = Lazy::new(|| {
    let entries: &[((u32, u32), &'static str)] = &[
        ((1, 1), "New Year"),
        ((1, 14), "Makar Sankranti"),
        ((1, 14), "Pongal"),
        ((1, 15), "Pongal"),
        ((1, 26), "Republic Day"),
        ((2, 14), "Valentine's Day"),
        ((3, 14), "Holi"),
        ((4, 10), "Eid"),
        ((8, 15), "Independence Day"),
        ((8, 19), "Raksha Bandhan"),
        ((9, 7), "Ganesh Chaturthi"),
        ((10, 3), "Navratri"),
        ((10, 12), "Dussehra"),
        ((11, 1), "Diwali"),
        ((11, 29), "Black Friday"),
        ((12, 25), "Christmas"),
        ((12, 31), "New Year"),
    ];
    let mut table = HashMap::new();
    for (key, festival) in entries {
        table.insert(*key, *festival);
    }
    table
});

/// Coarse fallback when the exact day is not a festival. May, June and July
/// have no entry.
static MONTH_FALLBACK: Lazy<HashMap<u32, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (1, "New Year"),
        (2, "Valentine's Day"),
        (3, "Holi"),
        (4, "Eid"),
        (8, "Raksha Bandhan"),
        (9, "Ganesh Chaturthi"),
        (10, "Navratri"),
        (11, "Diwali"),
        (12, "Christmas"),
    ])
});

static DATE_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{1,2}-\d{1,2}-\d{4}$").unwrap_or_else(|_| unreachable!("static pattern"))
});

/// The festival a query resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FestivalKey {
    /// Display name; catalog name, or the trimmed input for unknown festivals.
    pub name: String,
    pub aliases: Vec<String>,
    /// `(month, day)` for catalog festivals
    pub static_date: Option<(u32, u32)>,
    /// Parsed date when the query was a date
    pub requested_date: Option<NaiveDate>,
}

impl FestivalKey {
    fn from_def(def: &FestivalDef, requested_date: Option<NaiveDate>) -> Self {
        Self {
            name: def.name.to_string(),
            aliases: def.aliases.iter().map(|a| a.to_string()).collect(),
            static_date: Some((def.month, def.day)),
            requested_date,
        }
    }

    fn ad_hoc(name: &str) -> Self {
        Self {
            name: name.to_string(),
            aliases: Vec::new(),
            static_date: None,
            requested_date: None,
        }
    }

    pub fn is_cataloged(&self) -> bool {
        self.static_date.is_some()
    }
}

pub fn catalog() -> &'static [FestivalDef] {
    CATALOG
}

fn find_def(name: &str) -> Option<&'static FestivalDef> {
    CATALOG.iter().find(|d| d.name == name)
}

/// Lower-case, fold `_`, `-` and whitespace runs into single spaces, trim.
pub(crate) fn normalize(input: &str) -> String {
    input
        .to_lowercase()
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve a free-text query (festival name, alias or `DD-MM-YYYY`).
pub fn resolve(raw_input: &str) -> Result<FestivalKey, FestivalError> {
    let input = raw_input.trim();

    if DATE_SHAPE.is_match(input) {
        let date = NaiveDate::parse_from_str(input, "%d-%m-%Y")
            .map_err(|_| FestivalError::InputParse(input.to_string()))?;
        return resolve_date(date);
    }

    let needle = normalize(input);
    if needle.is_empty() {
        return Err(FestivalError::FestivalNotFound);
    }

    let matched = CATALOG.iter().find(|def| {
        std::iter::once(def.name)
            .chain(def.aliases.iter().copied())
            .any(|candidate| normalize(candidate).contains(&needle))
    });

    Ok(match matched {
        Some(def) => FestivalKey::from_def(def, None),
        None => FestivalKey::ad_hoc(input),
    })
}

fn resolve_date(date: NaiveDate) -> Result<FestivalKey, FestivalError> {
    let name = EXACT_DATES
        .get(&(date.month(), date.day()))
        .or_else(|| MONTH_FALLBACK.get(&date.month()))
        .ok_or(FestivalError::NoFestivalForDate(date))?;

    let def = find_def(name).ok_or(FestivalError::NoFestivalForDate(date))?;
    Ok(FestivalKey::from_def(def, Some(date)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[rstest]
    #[case("xmas", "Christmas")]
    #[case("Christmas", "Christmas")]
    #[case("CHRISTMAS ", "Christmas")]
    #[case("x-mas", "Christmas")]
    #[case("new_year", "New Year")]
    #[case("New-Year", "New Year")]
    #[case("deepawali", "Diwali")]
    #[case("rakhi", "Raksha Bandhan")]
    #[case("valentines", "Valentine's Day")]
    #[case("ganesh", "Ganesh Chaturthi")]
    fn names_and_aliases_resolve_to_canonical(#[case] input: &str, #[case] expected: &str) {
        let key = resolve(input).unwrap();
        assert_eq!(key.name, expected);
        assert!(key.requested_date.is_none());
    }

    #[rstest]
    #[case("25-12-2024", "Christmas")]
    #[case("1-11-2023", "Diwali")]
    #[case("31-12-2024", "New Year")]
    #[case("20-12-2024", "Christmas")]
    #[case("02-03-2025", "Holi")]
    fn dates_resolve_exact_then_by_month(#[case] input: &str, #[case] expected: &str) {
        let key = resolve(input).unwrap();
        assert_eq!(key.name, expected);
        assert!(key.requested_date.is_some());
    }

    #[test]
    fn duplicate_exact_date_keeps_last_entry() {
        assert_eq!(resolve("14-01-2025").unwrap().name, "Pongal");
    }

    #[test]
    fn month_without_festival_fails() {
        assert_matches!(
            resolve("15-06-2024"),
            Err(FestivalError::NoFestivalForDate(d)) if d == NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
        );
    }

    #[test]
    fn impossible_date_is_a_parse_error() {
        assert_matches!(resolve("31-02-2024"), Err(FestivalError::InputParse(_)));
        assert_matches!(resolve("12-13-2024"), Err(FestivalError::InputParse(_)));
    }

    #[test]
    fn unknown_name_becomes_ad_hoc_key() {
        let key = resolve("  Festivus ").unwrap();
        assert_eq!(key.name, "Festivus");
        assert!(!key.is_cataloged());
        assert!(key.aliases.is_empty());
    }

    #[test]
    fn blank_input_is_rejected() {
        assert_matches!(resolve("   "), Err(FestivalError::FestivalNotFound));
        assert_matches!(resolve("__--"), Err(FestivalError::FestivalNotFound));
    }

    #[test]
    fn substring_match_takes_first_catalog_entry() {
        // "day" appears in Republic Day before Valentine's Day and Independence Day
        assert_eq!(resolve("day").unwrap().name, "Republic Day");
    }

    #[test]
    fn every_table_entry_points_into_catalog() {
        for name in EXACT_DATES.values().chain(MONTH_FALLBACK.values()) {
            assert!(find_def(name).is_some(), "{name} missing from catalog");
        }
    }
}
