//! Small helpers.

pub fn sanitize_symbol(sym: &str) -> String {
    sym.trim().to_uppercase()
}

/// Case-insensitive substring match of any marker in `text`.
pub fn contains_any_marker(text: &str, markers: &[String]) -> bool {
    let t = text.to_lowercase();
    markers
        .iter()
        .map(|m| m.to_lowercase())
        .any(|needle| !needle.is_empty() && t.contains(&needle))
}

pub fn clamp_score(value: i64) -> u32 {
    value.clamp(0, 100) as u32
}
