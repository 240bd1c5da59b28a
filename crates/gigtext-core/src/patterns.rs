//! Pattern-based field extraction
//!
//! A fixed set of regex matchers that produce one raw candidate per
//! field (provider, date, time, amount, location, description),
//! independent of any learned weights. Matching is case-insensitive and
//! first-match-wins; there is no backtracking across alternative
//! interpretations. Dates are normalized to ISO `YYYY-MM-DD`, times to
//! 24-hour `HH:MM`.
//!
//! The `regex` crate has no lookahead, so terminators (commas, digits,
//! "a las") are consumed by non-capturing groups instead.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::normalizer::{clean_text, strip_diacritics};

/// Raw per-field candidates, before confidence gating.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldCandidates {
    pub provider: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    /// Already normalized to ISO `YYYY-MM-DD`.
    pub date: Option<String>,
    /// Already normalized to 24-hour `HH:MM`.
    pub time: Option<String>,
    pub amount: Option<f64>,
}

static PROVIDER_CON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\b[Cc]on\s+)([A-ZÁÉÍÓÚÑ][a-záéíóúüñ]+(?:\s+[A-ZÁÉÍÓÚÑ][a-záéíóúüñ]+)*)")
        .expect("valid regex")
});

static PROPER_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-ZÁÉÍÓÚÑ][a-záéíóúüñ]+(?:\s+[A-ZÁÉÍÓÚÑ][a-záéíóúüñ]+)*").expect("valid regex")
});

static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\b(?:este|el|pr[oó]ximo|siguiente)\s+)?\b(\d{1,2}/\d{1,2}/\d{4}|\d{4}-\d{2}-\d{2}|viernes|s[aá]bado|domingo|lunes|martes|mi[eé]rcoles|jueves|hoy|ma[ñn]ana)\b",
    )
    .expect("valid regex")
});

static TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\b(?:a las|desde las)\s+|@\s*)?\b(\d{1,2})(?::([0-5]\d))?\s*(am|pm|hrs|h)?\b")
        .expect("valid regex")
});

static AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\b(?:por|cobro|precio|costo|pago|pagan|son)\s+)?\$?\s*((?:\d{1,3}(?:[.,]\d{3})+|\d{3,})(?:[.,]\d{1,2})?)(?:\s*(?:d[oó]lares|pesos|usd|mxn|\$))?",
    )
    .expect("valid regex")
});

static LOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:en|lugar|local|sal[oó]n|hotel)\s+(?:(?:el|la|los|las)\s+)?([^,\.\d]+?)\s*(?:,|\.|\d|a las\b|por\s*\$|$)",
    )
    .expect("valid regex")
});

static AREA_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(restaurante?|lobby|terraza|piscina|jard[ií]n(?:es)?|sal[oó]n|sala)\b")
        .expect("valid regex")
});

static EVENT_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(boda|matrimonio|fiesta|ceremonia|evento|celebraci[oó]n|cumplea[ñn]os|aniversario|lobby|piscina)\b",
    )
    .expect("valid regex")
});

/// Generic words that never count as the proper name of an area
/// ("lobby Hotel" is just a lobby, not "lobby Hotel").
const EXCLUDED_NAMES: &[&str] = &[
    "hotel",
    "plaza",
    "centro",
    "events",
    "productions",
    "principal",
    "central",
    "exterior",
    "interior",
];

/// Words a bare capitalized phrase must not resolve to as a provider.
const PROVIDER_DENY: &[&str] = &[
    "lunes",
    "martes",
    "miercoles",
    "jueves",
    "viernes",
    "sabado",
    "domingo",
    "hoy",
    "manana",
];

/// Extract one raw candidate per field from `text`.
///
/// `today` anchors relative-date resolution so callers (and tests)
/// control the clock.
pub fn extract(text: &str, today: NaiveDate) -> FieldCandidates {
    let provider = extract_provider(text);
    let location = LOCATION
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| clean_text(m.as_str()));
    let date = DATE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| process_date(m.as_str(), today));
    let time = TIME.captures(text).map(|c| {
        process_time(
            c.get(1).map(|m| m.as_str()).unwrap_or("0"),
            c.get(2).map(|m| m.as_str()),
            c.get(3).map(|m| m.as_str()),
        )
    });
    let amount = AMOUNT
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| parse_amount(m.as_str()));
    let description = extract_description(text, provider.as_deref(), location.as_deref());

    FieldCandidates {
        provider,
        description,
        location,
        date,
        time,
        amount,
    }
}

/// Provider: prefer "con + capitalized phrase"; otherwise the first
/// bare capitalized phrase that is not a weekday or relative word.
fn extract_provider(text: &str) -> Option<String> {
    if let Some(c) = PROVIDER_CON.captures(text) {
        return Some(c[1].trim().to_string());
    }
    PROPER_NAME.find_iter(text).find_map(|m| {
        // A capitalized weekday can lead the phrase ("Viernes Maria
        // Gonzalez"); drop denied leading words and keep the rest.
        let rest: Vec<&str> = m
            .as_str()
            .split_whitespace()
            .skip_while(|w| is_denied_provider_word(w))
            .collect();
        if rest.is_empty() {
            None
        } else {
            Some(rest.join(" "))
        }
    })
}

fn is_denied_provider_word(word: &str) -> bool {
    let folded = strip_diacritics(word).to_lowercase();
    PROVIDER_DENY.contains(&folded.as_str())
}

/// Area keyword plus an optional trailing proper name ("terraza Maria"),
/// unless the name is a generic word or already claimed by the
/// provider/location candidate. Falls back to the bare keyword, then a
/// generic event-type keyword, then the literal "Evento".
fn extract_description(text: &str, provider: Option<&str>, location: Option<&str>) -> Option<String> {
    if let Some(m) = AREA_KEYWORD.find(text) {
        let area = m.as_str();
        let after = text[m.end()..].trim_start();
        if let Some(name) = PROPER_NAME.find(after) {
            // Only a name immediately following the keyword qualifies
            if name.start() == 0 && !is_excluded_name(name.as_str(), provider, location) {
                return Some(clean_text(&format!("{area} {}", name.as_str())));
            }
        }
        return Some(clean_text(area));
    }
    if let Some(c) = EVENT_TYPE.captures(text) {
        return Some(clean_text(&c[1]));
    }
    Some("Evento".to_string())
}

fn is_excluded_name(name: &str, provider: Option<&str>, location: Option<&str>) -> bool {
    let folded = strip_diacritics(name).to_lowercase();
    for claimed in [provider, location].into_iter().flatten() {
        if strip_diacritics(claimed).to_lowercase().contains(&folded) {
            return true;
        }
    }
    EXCLUDED_NAMES.iter().any(|w| folded.contains(w))
}

/// Normalize a matched date token to ISO `YYYY-MM-DD`.
///
/// Weekday names resolve to the next occurrence on or after `today`:
/// the weekday matching today's own name means today, not next week.
pub fn process_date(raw: &str, today: NaiveDate) -> Option<String> {
    let folded = strip_diacritics(raw).to_lowercase();
    match folded.as_str() {
        "hoy" => return Some(today.format("%Y-%m-%d").to_string()),
        "manana" => return Some((today + Duration::days(1)).format("%Y-%m-%d").to_string()),
        _ => {}
    }
    if let Some(weekday) = weekday_from_name(&folded) {
        let ahead = (weekday.num_days_from_sunday() + 7 - today.weekday().num_days_from_sunday())
            % 7;
        let target = today + Duration::days(i64::from(ahead));
        return Some(target.format("%Y-%m-%d").to_string());
    }
    if let Ok(date) = NaiveDate::parse_from_str(&folded, "%d/%m/%Y") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    if let Ok(date) = NaiveDate::parse_from_str(&folded, "%Y-%m-%d") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    None
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name {
        "domingo" => Some(Weekday::Sun),
        "lunes" => Some(Weekday::Mon),
        "martes" => Some(Weekday::Tue),
        "miercoles" => Some(Weekday::Wed),
        "jueves" => Some(Weekday::Thu),
        "viernes" => Some(Weekday::Fri),
        "sabado" => Some(Weekday::Sat),
        _ => None,
    }
}

/// Ungated relative-day pass over the raw text: "hoy" / "mañana" are
/// unambiguous lexical cues, so they bypass confidence scoring.
pub fn interpret_relative_day(text: &str, today: NaiveDate) -> Option<String> {
    let folded = strip_diacritics(text).to_lowercase();
    let tokens: Vec<&str> = folded.split_whitespace().collect();
    if tokens.contains(&"hoy") {
        return Some(today.format("%Y-%m-%d").to_string());
    }
    if tokens.contains(&"manana") {
        return Some((today + Duration::days(1)).format("%Y-%m-%d").to_string());
    }
    None
}

/// 12h -> 24h conversion: pm below 12 adds 12; am (or bare) 12 is 0.
fn process_time(hours: &str, minutes: Option<&str>, period: Option<&str>) -> String {
    let mut h: u32 = hours.parse().unwrap_or(0);
    let minutes = minutes.unwrap_or("00");
    match period.map(str::to_lowercase).as_deref() {
        Some("pm") if h < 12 => h += 12,
        Some("am") | None if h == 12 => h = 0,
        _ => {}
    }
    format!("{h:02}:{minutes:0>2}")
}

/// Strip grouping separators and currency leftovers, keep digits only.
fn parse_amount(raw: &str) -> Option<f64> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}
