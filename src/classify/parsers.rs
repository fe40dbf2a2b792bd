pub(super) fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

pub(super) fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

pub(super) fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Case-insensitive whole-word match of `keyword` starting at `idx`.
pub(super) fn keyword_at(bytes: &[u8], idx: usize, keyword: &str) -> bool {
    let end = idx + keyword.len();
    if end > bytes.len() || !bytes[idx..end].eq_ignore_ascii_case(keyword.as_bytes()) {
        return false;
    }
    let before_ok = idx == 0 || !is_word_byte(bytes[idx - 1]);
    let after_ok = bytes.get(end).is_none_or(|b| !is_word_byte(*b));
    before_ok && after_ok
}

/// Split a column list on commas, stripping quotes and surrounding whitespace.
///
/// A lone `*` yields an empty list, meaning "every attribute of the returned record".
pub(super) fn parse_column_list(list: &str) -> Vec<String> {
    let trimmed = list.trim();
    if trimmed == "*" {
        return Vec::new();
    }
    trimmed
        .split(',')
        .map(|column| column.replace(['\'', '"'], "").trim().to_string())
        .collect()
}

/// Strip the double quotes around a table or index name.
pub(super) fn unquote(name: &str) -> String {
    name.trim().trim_matches('"').to_string()
}

/// Drop a trailing statement terminator and surrounding whitespace.
pub(super) fn trim_terminator(fragment: &str) -> &str {
    fragment.trim().trim_end_matches(';').trim_end()
}
