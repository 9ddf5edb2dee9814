//! Cell-level cleaning shared by all normalizers: numerals, currency strings,
//! commodity names and dates.

use chrono::NaiveDate;

/// Code point of the zero digit in each supported non-Latin decimal block.
const DIGIT_ZEROS: [u32; 5] = [
    0x0966, // Devanagari
    0x09E6, // Bengali
    0x0660, // Arabic-Indic
    0x06F0, // Extended Arabic-Indic
    0xFF10, // Full-width
];

/// Longest markers first so `Rs.` is removed before `Rs`.
const CURRENCY_MARKERS: [&str; 7] = ["रू", "रु", "NPR", "Rs.", "Rs", "₹", "$"];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];

/// Replace non-Latin decimal digit glyphs with their ASCII equivalents.
pub fn translate_digits(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            let cp = c as u32;
            DIGIT_ZEROS
                .iter()
                .find(|&&zero| (zero..=zero + 9).contains(&cp))
                .and_then(|&zero| char::from_digit(cp - zero, 10))
                .unwrap_or(c)
        })
        .collect()
}

/// Convert a currency/numeric string to a float.
///
/// `"रू १,२३४.५०"` and `"Rs. 1,234.50"` both yield `1234.5`. Returns `None`
/// for empty, non-numeric or non-finite input.
pub fn clean_number(raw: &str) -> Option<f64> {
    let mut s = translate_digits(raw);
    for marker in CURRENCY_MARKERS {
        s = s.replace(marker, "");
    }
    let s: String = s
        .chars()
        .filter(|c| *c != ',' && *c != '_' && !c.is_whitespace())
        .collect();
    let s = s
        .trim_start_matches(|c: char| !(c.is_ascii_digit() || c == '-' || c == '.'))
        .trim_end_matches(|c: char| !c.is_ascii_digit());
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Remove every `( ... )` qualifier from a name.
pub fn strip_parenthetical(name: &str) -> String {
    let mut out = name.to_string();
    while let Some(open) = out.find('(') {
        match out[open..].find(')') {
            Some(rel_close) => out.replace_range(open..=open + rel_close, ""),
            None => break,
        }
    }
    out.trim().to_string()
}

/// Ordered mapping from commodity-name fragments to canonical categories.
/// The first fragment contained in the cleaned name wins.
#[derive(Debug, Clone, PartialEq)]
pub struct CommodityAliases {
    pub entries: Vec<(String, String)>,
}

impl Default for CommodityAliases {
    fn default() -> Self {
        let pairs = [
            ("गोलभेडा ठूलो", "Tomato_Big"),
            ("गोलभेडा सानो", "Tomato_Small"),
            ("गोलभेडा", "Tomato"),
            ("Tomato Big", "Tomato_Big"),
            ("Tomato Small", "Tomato_Small"),
            ("Tomato", "Tomato"),
        ];
        Self {
            entries: pairs
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
        }
    }
}

impl CommodityAliases {
    /// Parse `fragment:Canonical` pairs separated by commas.
    pub fn parse(input: &str) -> Result<Self, String> {
        let mut entries = Vec::new();
        for token in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (pattern, canonical) = token
                .split_once(':')
                .ok_or_else(|| format!("alias '{token}' must be fragment:Canonical"))?;
            let (pattern, canonical) = (pattern.trim(), canonical.trim());
            if pattern.is_empty() || canonical.is_empty() {
                return Err(format!("alias '{token}' has an empty side"));
            }
            entries.push((pattern.to_string(), canonical.to_string()));
        }
        Ok(Self { entries })
    }

    /// Strip qualifiers and map to the canonical category, or return the
    /// cleaned name unchanged when no fragment matches.
    pub fn canonicalize(&self, raw: &str) -> String {
        let cleaned = strip_parenthetical(raw);
        self.entries
            .iter()
            .find(|(pattern, _)| cleaned.contains(pattern.as_str()))
            .map(|(_, canonical)| canonical.clone())
            .unwrap_or(cleaned)
    }
}

/// Parse a calendar date from the formats seen across the input files.
///
/// A trailing time component (`2024-01-05 00:00:00`, `2024-01-05T06:00`) is
/// ignored, and `YYYY-MM` resolves to the first of the month.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let translated = translate_digits(raw.trim());
    let date_part = translated
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or("");
    if date_part.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
        .or_else(|| NaiveDate::parse_from_str(&format!("{date_part}-01"), "%Y-%m-%d").ok())
}
