use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::slug::fold_accents;

/// Month names as printed on the site.
pub const PT_BR_MONTHS: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "março",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

static LONG_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,2})\s+de\s+(\p{L}+)\s+de\s+(\d{4})").expect("valid long date regex")
});

static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{2,4})\b").expect("valid numeric date regex")
});

/// `5 de março de 2024`
pub fn format_date_pt_br(date: NaiveDate) -> String {
    let month = PT_BR_MONTHS[date.month0() as usize];
    format!("{} de {} de {}", date.day(), month, date.year())
}

/// Parses dates as they appear in listings: `5 de março de 2024` (accents
/// optional) or `05/03/2024`. Two-digit years are taken as 20xx.
pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    if let Some(caps) = LONG_DATE.captures(text) {
        let day: u32 = caps[1].parse().ok()?;
        let month_name = fold_accents(&caps[2].to_lowercase());
        let month = PT_BR_MONTHS
            .iter()
            .position(|m| fold_accents(m) == month_name)?;
        let year: i32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month as u32 + 1, day);
    }

    let caps = NUMERIC_DATE.captures(text)?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let mut year: i32 = caps[3].parse().ok()?;
    if caps[3].len() == 2 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Accepts a bare `YYYY-MM-DD` or anything starting with one (RFC 3339
/// timestamps included).
pub fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    let head = text.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}
