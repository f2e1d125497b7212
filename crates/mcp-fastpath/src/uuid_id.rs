/// Normalize an ID to lowercase dashed UUID form (spec.md §4.3 "ID normalization").
///
/// Accepts either a 32-hex-char string or the canonical 8-4-4-4-12 dashed
/// form; rejects anything else.
#[must_use]
pub fn normalize_id(raw: &str) -> Option<String> {
    let is_hex = |c: char| c.is_ascii_hexdigit();

    if raw.len() == 32 && raw.chars().all(is_hex) {
        let lower = raw.to_ascii_lowercase();
        return Some(dash(&lower));
    }

    if raw.len() == 36 {
        let bytes: Vec<char> = raw.chars().collect();
        let dash_positions = [8, 13, 18, 23];
        let shape_ok = dash_positions.iter().all(|&i| bytes[i] == '-');
        let hex_ok = bytes
            .iter()
            .enumerate()
            .all(|(i, &c)| dash_positions.contains(&i) || is_hex(c));
        if shape_ok && hex_ok {
            return Some(raw.to_ascii_lowercase());
        }
    }

    None
}

fn dash(hex32: &str) -> String {
    format!(
        "{}-{}-{}-{}-{}",
        &hex32[0..8],
        &hex32[8..12],
        &hex32[12..16],
        &hex32[16..20],
        &hex32[20..32]
    )
}

/// Strip dashes from a normalized ID, for building Notion-style URLs.
#[must_use]
pub fn without_dashes(id: &str) -> String {
    id.replace('-', "")
}
