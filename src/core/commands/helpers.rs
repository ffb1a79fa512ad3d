// src/core/commands/helpers.rs

//! Contains helper functions for parsing command arguments.

/// Everything after the 4-character token, trimmed.
///
/// Works on characters rather than bytes, so a token made of multi-byte
/// characters cannot split a code point.
pub fn argument(line: &str) -> &str {
    line.char_indices()
        .nth(4)
        .map(|(i, _)| line[i..].trim())
        .unwrap_or("")
}

/// Parses the path of `MAIL FROM:<...>` or `RCPT TO:<...>`.
///
/// `keyword` is `"FROM:"` or `"TO:"` and matches case-insensitively. Spaces
/// are tolerated after the colon and ESMTP parameters after the closing angle
/// bracket are ignored. Returns the address without brackets; the null path
/// `<>` yields an empty string.
pub fn parse_path(line: &str, keyword: &str) -> Option<String> {
    let arg = argument(line);
    let head = arg.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = arg[keyword.len()..].trim_start();
    let rest = rest.strip_prefix('<')?;
    let end = rest.find('>')?;
    let address = rest[..end].trim();
    if address.contains(char::is_whitespace) {
        return None;
    }
    Some(address.to_string())
}

/// Strips one pair of surrounding angle brackets, if present.
pub fn strip_brackets(address: &str) -> &str {
    address
        .strip_prefix('<')
        .and_then(|a| a.strip_suffix('>'))
        .unwrap_or(address)
}
