//! Pure normalizers turning raw catalog text into typed values.

use crate::models::FuelType;

/// Partial update produced by classifying one technical token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TechUpdate {
    pub fuel: Option<FuelType>,
    pub year: Option<u32>,
    pub month: Option<u32>,
    pub engine_cc: Option<u32>,
    pub power_hp: Option<u32>,
    pub power_kw: Option<u32>,
    pub mileage_km: Option<u32>,
}

/// Turns a display price like "14 300 000 Ft" into 14300000.
///
/// Strips everything that is not a digit, so currency suffixes, thousands
/// separators and non-breaking spaces all fall away the same way. No digits
/// left means no price.
pub fn clean_price(text: &str) -> Option<u32> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

fn digits_of(text: &str) -> Option<u32> {
    clean_price(text)
}

/// One classification rule: name for logs, matcher producing a partial
/// update when the token is its kind.
struct TokenRule {
    name: &'static str,
    apply: fn(&str) -> Option<TechUpdate>,
}

/// Ordered rule table, first match wins. Ordering carries the semantics:
/// fuel keywords are substring matches and combined labels like
/// "Benzin/LPG" must hit the more specific LPG rule before the high-recall
/// Benzin rule, and "km-re" (distance to the seller) must never feed the
/// odometer field.
const TECH_RULES: &[TokenRule] = &[
    TokenRule { name: "year/month", apply: match_year_month },
    TokenRule { name: "year", apply: match_bare_year },
    TokenRule { name: "fuel:lpg", apply: |t| fuel_keyword(t, "lpg", FuelType::Lpg) },
    TokenRule { name: "fuel:cng", apply: |t| fuel_keyword(t, "cng", FuelType::Cng) },
    TokenRule { name: "fuel:hybrid", apply: |t| fuel_keyword(t, "hibrid", FuelType::Hybrid) },
    TokenRule { name: "fuel:diesel", apply: |t| fuel_keyword(t, "dízel", FuelType::Diesel) },
    TokenRule { name: "fuel:electric", apply: |t| fuel_keyword(t, "elektromos", FuelType::Electric) },
    TokenRule { name: "fuel:petrol", apply: |t| fuel_keyword(t, "benzin", FuelType::Petrol) },
    TokenRule { name: "engine_cc", apply: |t| unit_number(t, "cm³", |v| TechUpdate { engine_cc: Some(v), ..Default::default() }) },
    TokenRule { name: "power_kw", apply: |t| unit_number(t, "kW", |v| TechUpdate { power_kw: Some(v), ..Default::default() }) },
    TokenRule { name: "power_hp", apply: |t| unit_number(t, "LE", |v| TechUpdate { power_hp: Some(v), ..Default::default() }) },
    TokenRule { name: "mileage_km", apply: match_mileage },
];

fn match_year_month(token: &str) -> Option<TechUpdate> {
    let (y, m) = token.split_once('/')?;
    let y = y.trim();
    let m = m.trim();
    if y.len() != 4 || !y.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if m.is_empty() || m.len() > 2 || !m.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(TechUpdate {
        year: y.parse().ok(),
        month: m.parse().ok(),
        ..Default::default()
    })
}

fn match_bare_year(token: &str) -> Option<TechUpdate> {
    if token.len() == 4 && token.chars().all(|c| c.is_ascii_digit()) {
        Some(TechUpdate {
            year: token.parse().ok(),
            ..Default::default()
        })
    } else {
        None
    }
}

fn fuel_keyword(token: &str, keyword: &str, fuel: FuelType) -> Option<TechUpdate> {
    if token.to_lowercase().contains(keyword) {
        Some(TechUpdate {
            fuel: Some(fuel),
            ..Default::default()
        })
    } else {
        None
    }
}

fn unit_number(token: &str, unit: &str, build: fn(u32) -> TechUpdate) -> Option<TechUpdate> {
    let (before, _) = token.split_once(unit)?;
    digits_of(before).map(build)
}

fn match_mileage(token: &str) -> Option<TechUpdate> {
    // "3 km-re" is how far away the car is, not how far it has driven
    if token.contains("km-re") {
        return None;
    }
    unit_number(token, "km", |v| TechUpdate {
        mileage_km: Some(v),
        ..Default::default()
    })
}

/// Classifies one freeform technical token ("Benzin", "2024/10",
/// "1 199 cm³", "136 LE", "45 000 km"). Tokens matching no rule are
/// ignored, which keeps unseen label text harmless.
pub fn classify_tech_token(token: &str) -> TechUpdate {
    // The catalog pads tokens with non-breaking spaces
    let token = token.replace('\u{a0}', " ");
    let token = token.trim();
    for rule in TECH_RULES {
        if let Some(update) = (rule.apply)(token) {
            tracing::trace!(rule = rule.name, token, "token classified");
            return update;
        }
    }
    TechUpdate::default()
}

/// Drops blank entries, de-duplicates and sorts, so any permutation of the
/// same tag multiset renders identically.
pub fn dedup_sort_tags<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tags: Vec<String> = raw
        .into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}
