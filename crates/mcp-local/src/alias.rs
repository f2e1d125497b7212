use std::collections::HashMap;

const MAX_ALIAS_LEN: usize = 64;

/// Where a truncated alias resolves to (spec.md §4.4 "alias table").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasTarget {
    /// Exactly one canonical name truncates to this prefix.
    Canonical(String),
    /// Two or more canonical names truncate to the same prefix.
    Ambiguous,
}

/// Truncate `name` to at most 64 bytes, respecting UTF-8 char boundaries.
#[must_use]
pub fn truncate_64(name: &str) -> String {
    if name.len() <= MAX_ALIAS_LEN {
        return name.to_string();
    }
    let mut end = MAX_ALIAS_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

/// Build the truncated-name → canonical-name alias table. Names that fit
/// within 64 bytes unchanged are not aliased — direct lookup already
/// finds them.
#[must_use]
pub fn build_alias_table<'a>(canonical_names: impl Iterator<Item = &'a str>) -> HashMap<String, AliasTarget> {
    let mut table: HashMap<String, AliasTarget> = HashMap::new();
    for name in canonical_names {
        let truncated = truncate_64(name);
        if truncated == name {
            continue;
        }
        table
            .entry(truncated)
            .and_modify(|target| *target = AliasTarget::Ambiguous)
            .or_insert_with(|| AliasTarget::Canonical(name.to_string()));
    }
    table
}
