//! Point geometry extraction from the `.geo` column of raster exports.
//!
//! Exports serialise the geometry as JSON, but the column is frequently
//! re-quoted by spreadsheet tools (`"{""type"":""Point"", ...}"`) or written as
//! a Python literal (`{'type': 'Point', 'coordinates': (-79.5, 8.98)}`). Both
//! are accepted; anything else yields no coordinates and the row is dropped.

use serde_json::Value;

use crate::utils::coordinates::round_coordinate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lon: f64,
    pub lat: f64,
}

/// Counts reported after extracting a whole column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub total_rows: usize,
    pub valid_rows: usize,
}

impl ExtractionStats {
    pub fn dropped_rows(&self) -> usize {
        self.total_rows - self.valid_rows
    }

    pub fn record(&mut self, coordinates: Option<&Coordinates>) {
        self.total_rows += 1;
        if coordinates.is_some() {
            self.valid_rows += 1;
        }
    }
}

/// Extract `(lon, lat)` rounded to 7 decimals from a serialized point geometry
pub fn extract_coordinates(raw: &str) -> Option<Coordinates> {
    let normalized = normalize_geometry_string(raw);
    let geometry = parse_geometry(&normalized)?;

    let object = geometry.as_object()?;
    let coordinates = object.get("coordinates")?.as_array()?;

    let lon = coordinates.first().and_then(coerce_number)?;
    let lat = coordinates.get(1).and_then(coerce_number)?;

    Some(Coordinates {
        lon: round_coordinate(lon)?,
        lat: round_coordinate(lat)?,
    })
}

/// Collapse doubled quotes, trim, then strip one pair of enclosing quotes
fn normalize_geometry_string(raw: &str) -> String {
    let fixed = raw.replace("\"\"", "\"");
    let fixed = fixed.trim();

    if fixed.len() >= 2 && fixed.starts_with('"') && fixed.ends_with('"') {
        fixed[1..fixed.len() - 1].to_string()
    } else {
        fixed.to_string()
    }
}

fn parse_geometry(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    let rewritten = literal_to_json(text)?;
    serde_json::from_str::<Value>(&rewritten).ok()
}

/// `pd.to_numeric(errors="coerce")` semantics: numbers and numeric strings
fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Rewrite a Python-style literal into JSON: single-quoted strings, tuples,
/// `True`/`False`/`None` and trailing commas.
fn literal_to_json(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                out.push('"');
                let quote = c;
                let mut closed = false;
                while let Some(inner) = chars.next() {
                    match inner {
                        '\\' => {
                            let escaped = chars.next()?;
                            if escaped == '\'' {
                                out.push('\'');
                            } else {
                                out.push('\\');
                                out.push(escaped);
                            }
                        }
                        q if q == quote => {
                            closed = true;
                            break;
                        }
                        '"' => out.push_str("\\\""),
                        other => out.push(other),
                    }
                }
                if !closed {
                    return None;
                }
                out.push('"');
            }
            '(' => out.push('['),
            ')' | ']' | '}' => {
                let trimmed_len = out.trim_end().len();
                out.truncate(trimmed_len);
                if out.ends_with(',') {
                    out.pop();
                }
                out.push(if c == ')' { ']' } else { c });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.as_str() {
                    "True" | "true" => out.push_str("true"),
                    "False" | "false" => out.push_str("false"),
                    "None" | "null" => out.push_str("null"),
                    // exponent markers inside numbers, e.g. 1e-05
                    w if w.starts_with('e') || w.starts_with('E') => out.push_str(w),
                    _ => return None,
                }
            }
            other => out.push(other),
        }
    }

    Some(out)
}
