//! Agent name normalization.

/// Map an arbitrary display name to a symbolic identifier.
///
/// One output character per input code point, except a leading ASCII digit
/// which is prefixed with `_`. The result matches `[A-Za-z_][A-Za-z0-9_]*`.
pub fn normalize_agent_name(name: &str) -> String {
    if name.is_empty() {
        return "_".to_string();
    }

    let mut normalized = String::with_capacity(name.len() + 1);
    for (i, c) in name.chars().enumerate() {
        if i == 0 {
            if c.is_ascii_alphabetic() || c == '_' {
                normalized.push(c);
            } else if c.is_ascii_digit() {
                normalized.push('_');
                normalized.push(c);
            } else {
                normalized.push('_');
            }
        } else if c.is_ascii_alphanumeric() || c == '_' {
            normalized.push(c);
        } else {
            normalized.push('_');
        }
    }
    normalized
}
