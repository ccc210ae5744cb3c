//! Field extractors: layered heuristics over normalized OCR text.
//!
//! Every extractor is a pure function over a [`NormalizedDocument`] that
//! returns `None` when its patterns do not match. Strategies per field run
//! in a fixed priority order and the first non-empty hit wins. This is a
//! best-effort extraction system, not a strict parser: nothing here
//! returns an error.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::normalize::NormalizedDocument;
use crate::types::{EquipmentSpecs, ExtractedFields};

/// Imperial size token: "3/4", "2-3/8", "1.75", "8".
const SIZE: &str = r"[0-9]+(?:-[0-9]+/[0-9]+|/[0-9]+|\.[0-9]+)?";

lazy_static! {
    // Well name strategies, tried in order.
    static ref WELL_LABEL_LINE: Regex = Regex::new(r"(?i)^well[:.\-]?$").unwrap();
    static ref WELL_INLINE: Regex =
        Regex::new(r#"(?i)\bwell\b[:\s\-]+([A-Za-z0-9 #"'&/.\-]{2,60})"#).unwrap();
    static ref WELL_LOOSE_SIGNAL: Regex = Regex::new(r"(?i)\d|unit|well").unwrap();
    static ref LEADING_WELL_TOKEN: Regex = Regex::new(r"(?i)^well\b[:\s\-]*").unwrap();
    static ref REPEATED_QUOTES: Regex = Regex::new(r#""{2,}"#).unwrap();

    static ref DATE_LABEL: Regex =
        Regex::new(r"(?i)\bdate\b[:\s]+(\d{1,2}/\d{1,2}/\d{4})\b").unwrap();

    // Work description block boundaries.
    static ref DESC_HEADER: Regex = Regex::new(r"(?i)contract\s+work\s+description").unwrap();
    static ref DESC_STOP: Regex =
        Regex::new(r"(?i)^(payment\b|balance\s+due\b|thank\s+you)").unwrap();
    static ref DESC_COLUMN_HEADER: Regex = Regex::new(r"(?i)^(hours|rate|amount)$").unwrap();
    static ref DESC_TOTALS: Regex = Regex::new(r"(?i)^(balance|total|subtotal|tax)\b").unwrap();
    static ref SEPARATOR_LINE: Regex = Regex::new(r"^[-_=*.•|\s]+$").unwrap();

    // Equipment heuristics. These scan the whole normalized text, not just
    // the description block: invoices scatter equipment lines everywhere.
    static ref RODS_SIZED: Regex = Regex::new(&format!(
        r#"(?i)\b(\d{{1,4}})(?:\s*x\s*|\s+)({SIZE})["']?s?\s*rods?\b"#
    ))
    .unwrap();
    static ref RODS_BARE: Regex = Regex::new(r"(?i)\b(\d{1,4})\s*rods?\b").unwrap();
    static ref TUBING_JOINTS: Regex = Regex::new(&format!(
        r#"(?i)\b(\d{{1,4}})\s*joints?\s*({SIZE})"?\s*tub(?:e|ing)\b"#
    ))
    .unwrap();
    static ref TUBING_BARE: Regex =
        Regex::new(&format!(r#"(?i)\b({SIZE})"\s*tub(?:e|ing)\b"#)).unwrap();
    static ref POLISH_FULL: Regex = Regex::new(&format!(
        r#"(?i)polish\s*rods?[^0-9]{{0,10}}({SIZE})"\s*x\s*(\d{{1,3}})'"#
    ))
    .unwrap();
    static ref POLISH_DIA_ONLY: Regex =
        Regex::new(&format!(r#"(?i)({SIZE})"\s*polish\s*rods?\b"#)).unwrap();
    static ref INSERT_PUMP: Regex =
        Regex::new(&format!(r#"(?i)\b({SIZE})["']?\s*insert\s*pump\b"#)).unwrap();
    static ref LINER_FULL: Regex = Regex::new(&format!(
        r#"(?i)\b(\d+)'\s*x\s*({SIZE})"\s*x\s*({SIZE})"\s*liner\b"#
    ))
    .unwrap();
    static ref LINER_BARE: Regex = Regex::new(r"(?i)\b(\d+)'\s*liner\b").unwrap();
    static ref PACKING_WORD: Regex = Regex::new(r"(?i)\bpacking\b").unwrap();
    // Guarded so date fragments like 02/19/2024 never read as an engine size.
    static ref ENGINE_SIZE: Regex =
        Regex::new(r"(?:^|[^0-9/])(\d{2,4}/\d{2,4})(?:[^0-9/]|$)").unwrap();

    // Label-based pickups for fields some invoices print as form rows.
    static ref UNIT_LABEL: Regex =
        Regex::new(r"(?i)\bunit(?:\s*\(make/model\))?\s*[:\-]\s*([^\n]+)").unwrap();
    static ref BRIDAL_CABLE_LABEL: Regex =
        Regex::new(r"(?i)\bbridal\s*cable(?:\s*size)?\s*[:\-]\s*([^\n]+)").unwrap();
    static ref VENDOR_LABEL: Regex =
        Regex::new(r"(?i)\b(?:vendor|supplier|from)\s*[:\-]\s*([^\n]+)").unwrap();
    static ref UPPERCASE_LINE: Regex = Regex::new(r"^[A-Z0-9][A-Z0-9 &.,'\-]{3,}$").unwrap();
    static ref SECTION_KEYWORD: Regex = Regex::new(
        r"(?i)\b(well|date|payment|contract|invoice|hours|rate|amount|balance|total|description)\b"
    )
    .unwrap();
    static ref LOCATION_LABEL: Regex =
        Regex::new(r"(?i)\blocation\s*[:\-]\s*([^\n]+)").unwrap();
    static ref PUMP_TYPE_LABEL: Regex =
        Regex::new(r"(?i)\b(?:pump\s*type|lift|method)\s*[:\-]\s*([^\n]+)").unwrap();
    static ref INVOICE_NO_LABEL: Regex =
        Regex::new(r"(?i)\b(?:invoice\s*(?:no\.?|#)|inv\.)\s*[:#\-]?\s*([A-Za-z0-9/\-]+)").unwrap();
    static ref AMOUNT_LABEL: Regex = Regex::new(
        r"(?i)\b(?:total|amount\s*due|grand\s*total)\s*[:\-]?\s*\$?\s*([\d,]+(?:\.\d{2})?)"
    )
    .unwrap();
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Strip leading/trailing label punctuation, collapse repeated quote
/// characters, drop trailing stray quotes.
fn clean_well_name(raw: &str) -> Option<String> {
    let s = raw
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '.' | '_' | '-'))
        .trim();
    let s = REPEATED_QUOTES.replace_all(s, "\"");
    let s = s.trim_end_matches('"').trim();
    non_empty(s)
}

/// Well name, three strategies in priority order.
pub fn extract_well_name(doc: &NormalizedDocument) -> Option<String> {
    // 1) "WELL" on its own line, value on the next line.
    for (i, line) in doc.lines.iter().enumerate() {
        if WELL_LABEL_LINE.is_match(line) {
            if let Some(next) = doc.lines.get(i + 1) {
                let stripped = LEADING_WELL_TOKEN.replace(next, "");
                if let Some(name) = clean_well_name(&stripped) {
                    return Some(name);
                }
            }
        }
    }

    // 2) Inline "WELL: Name" / "WELL Name".
    for line in &doc.lines {
        if let Some(caps) = WELL_INLINE.captures(line) {
            if let Some(name) = clean_well_name(&caps[1]) {
                return Some(name);
            }
        }
    }

    // 3) Naive fallback: a shortish line that at least smells like a well.
    doc.lines
        .iter()
        .find(|l| l.len() < 60 && WELL_LOOSE_SIGNAL.is_match(l))
        .and_then(|l| clean_well_name(l))
}

/// Invoice date from a "DATE mm/dd/yyyy" label, converted to yyyy-mm-dd.
/// Reports true absence; the "today" fallback is commit-time policy, not
/// an extractor guess. Impossible calendar dates are treated as no match.
pub fn extract_invoice_date(doc: &NormalizedDocument) -> Option<String> {
    for caps in DATE_LABEL.captures_iter(&doc.text) {
        if let Ok(date) = NaiveDate::parse_from_str(&caps[1], "%m/%d/%Y") {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    None
}

/// Itemized lines under "CONTRACT WORK DESCRIPTION", stopping at the
/// payment/totals area. Falls back to the first 8 non-empty lines when the
/// header is missing so a mangled scan still yields something reviewable.
pub fn extract_description_lines(doc: &NormalizedDocument) -> Vec<String> {
    if let Some(idx) = doc.lines.iter().position(|l| DESC_HEADER.is_match(l)) {
        let mut out = Vec::new();
        for line in &doc.lines[idx + 1..] {
            if DESC_STOP.is_match(line) {
                break;
            }
            if DESC_COLUMN_HEADER.is_match(line)
                || DESC_TOTALS.is_match(line)
                || SEPARATOR_LINE.is_match(line)
            {
                continue;
            }
            out.push(line.clone());
        }
        if !out.is_empty() {
            return out;
        }
    }

    doc.lines.iter().take(8).cloned().collect()
}

/// Bound for stored record notes; keeps them scannable in a history list.
const NOTES_MAX: usize = 400;

/// Join description lines into one short record note.
pub fn assemble_notes(lines: &[String]) -> Option<String> {
    let joined = lines.join(" • ");
    if joined.trim().is_empty() {
        return None;
    }
    if joined.chars().count() > NOTES_MAX {
        let cut: String = joined.chars().take(NOTES_MAX).collect();
        Some(format!("{}…", cut.trim_end()))
    } else {
        Some(joined)
    }
}

pub fn extract_rods(doc: &NormalizedDocument) -> Option<String> {
    if let Some(caps) = RODS_SIZED.captures(&doc.text) {
        return Some(format!("{} x {}\"", &caps[1], &caps[2]));
    }
    RODS_BARE
        .captures(&doc.text)
        .map(|caps| format!("{} rods", &caps[1]))
}

pub fn extract_tubing(doc: &NormalizedDocument) -> Option<String> {
    if let Some(caps) = TUBING_JOINTS.captures(&doc.text) {
        return Some(format!("{} joints {}\"", &caps[1], &caps[2]));
    }
    TUBING_BARE
        .captures(&doc.text)
        .map(|caps| format!("{}\"", &caps[1]))
}

pub fn extract_polish_rods(doc: &NormalizedDocument) -> Option<String> {
    if let Some(caps) = POLISH_FULL.captures(&doc.text) {
        return Some(format!("{}\" x {}'", &caps[1], &caps[2]));
    }
    if let Some(caps) = POLISH_DIA_ONLY.captures(&doc.text) {
        return Some(format!("{}\"", &caps[1]));
    }
    // An insert pump diameter stands in when no explicit polish rod is
    // listed on the invoice.
    INSERT_PUMP
        .captures(&doc.text)
        .map(|caps| format!("{}\" (insert)", &caps[1]))
}

pub fn extract_liner(doc: &NormalizedDocument) -> Option<String> {
    if let Some(caps) = LINER_FULL.captures(&doc.text) {
        return Some(format!("{}' x {}\" x {}\"", &caps[1], &caps[2], &caps[3]));
    }
    LINER_BARE
        .captures(&doc.text)
        .map(|caps| format!("{}'", &caps[1]))
}

/// Display threshold for the raw packing window; beyond it the note is
/// replaced with a generic marker.
const PACKING_WINDOW_MAX: usize = 60;

/// Packing is boolean-ish: when the word appears anywhere, keep a short
/// window of context around the first occurrence.
pub fn extract_packing(doc: &NormalizedDocument) -> Option<String> {
    let m = PACKING_WORD.find(&doc.text)?;
    let chars: Vec<char> = doc.text.chars().collect();
    let char_start = doc.text[..m.start()].chars().count();
    let from = char_start.saturating_sub(30);
    let to = (char_start + 50).min(chars.len());
    let window: String = chars[from..to]
        .iter()
        .map(|c| if *c == '\n' { ' ' } else { *c })
        .collect();
    let window = window.trim().to_string();
    if window.chars().count() > PACKING_WINDOW_MAX {
        Some("Packing / fittings noted".to_string())
    } else {
        non_empty(&window)
    }
}

/// Bare NNN/NNN token (e.g. "208/346"). Date fragments are excluded by
/// the guard in the pattern.
pub fn extract_engine_size(doc: &NormalizedDocument) -> Option<String> {
    ENGINE_SIZE
        .captures(&doc.text)
        .map(|caps| caps[1].to_string())
}

pub fn extract_unit_make_model(doc: &NormalizedDocument) -> Option<String> {
    UNIT_LABEL
        .captures(&doc.text)
        .and_then(|caps| non_empty(&caps[1]))
}

pub fn extract_bridal_cable(doc: &NormalizedDocument) -> Option<String> {
    BRIDAL_CABLE_LABEL
        .captures(&doc.text)
        .and_then(|caps| non_empty(&caps[1]))
}

/// Vendor: explicit label first, then the first uppercase-looking line
/// that is not a form section heading.
pub fn extract_vendor(doc: &NormalizedDocument) -> Option<String> {
    if let Some(caps) = VENDOR_LABEL.captures(&doc.text) {
        if let Some(v) = non_empty(&caps[1]) {
            return Some(v);
        }
    }
    doc.lines
        .iter()
        .find(|l| UPPERCASE_LINE.is_match(l) && !SECTION_KEYWORD.is_match(l))
        .and_then(|l| non_empty(l))
}

pub fn extract_location(doc: &NormalizedDocument) -> Option<String> {
    LOCATION_LABEL
        .captures(&doc.text)
        .and_then(|caps| non_empty(&caps[1]))
}

pub fn extract_pump_type(doc: &NormalizedDocument) -> Option<String> {
    PUMP_TYPE_LABEL
        .captures(&doc.text)
        .and_then(|caps| non_empty(&caps[1]))
}

pub fn extract_invoice_number(doc: &NormalizedDocument) -> Option<String> {
    INVOICE_NO_LABEL
        .captures(&doc.text)
        .and_then(|caps| non_empty(&caps[1]))
}

pub fn extract_amount(doc: &NormalizedDocument) -> Option<String> {
    AMOUNT_LABEL
        .captures(&doc.text)
        .and_then(|caps| non_empty(&caps[1]))
}

pub fn extract_equipment(doc: &NormalizedDocument) -> EquipmentSpecs {
    EquipmentSpecs {
        engine_size: extract_engine_size(doc),
        unit_make_model: extract_unit_make_model(doc),
        bridal_cable: extract_bridal_cable(doc),
        polish_rods: extract_polish_rods(doc),
        liner_size: extract_liner(doc),
        packing: extract_packing(doc),
        rods: extract_rods(doc),
        tubing: extract_tubing(doc),
    }
}

/// Run every extractor over one document.
pub fn extract_all(doc: &NormalizedDocument) -> ExtractedFields {
    let description = extract_description_lines(doc);
    ExtractedFields {
        well_name_candidate: extract_well_name(doc),
        invoice_date_iso: extract_invoice_date(doc),
        vendor: extract_vendor(doc),
        invoice_number: extract_invoice_number(doc),
        amount: extract_amount(doc),
        location: extract_location(doc),
        pump_type: extract_pump_type(doc),
        equipment: extract_equipment(doc),
        work_description_notes: assemble_notes(&description),
    }
}
