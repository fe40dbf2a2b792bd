use super::parsers::{
    is_block_comment_end, is_block_comment_start, is_line_comment_start, keyword_at,
};

#[derive(Clone, Copy, PartialEq, Eq)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
}

/// Walk `sql` and call `visit(idx, byte, depth)` for every byte that sits outside string
/// literals, quoted identifiers and comments. `depth` counts open `{`, `[` and `(`.
///
/// Returns the bracket depth at the end of input, or `None` if a closing bracket had no
/// matching opener or a literal was left unterminated.
pub(super) fn scan_code<F>(sql: &str, mut visit: F) -> Option<usize>
where
    F: FnMut(usize, u8, usize),
{
    let mut state = State::Normal;
    let mut depth: usize = 0;
    let mut idx = 0;
    let bytes = sql.as_bytes();

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'{' | b'[' | b'(' => {
                    visit(idx, b, depth);
                    depth += 1;
                }
                b'}' | b']' | b')' => {
                    depth = depth.checked_sub(1)?;
                    visit(idx, b, depth);
                }
                _ => visit(idx, b, depth),
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(level) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(level + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if level == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(level - 1)
                    };
                    idx += 1;
                }
            }
        }
        idx += 1;
    }

    match state {
        State::SingleQuoted | State::DoubleQuoted | State::BlockComment(_) => None,
        State::Normal | State::LineComment => Some(depth),
    }
}

/// Count `?` markers outside literals and comments.
pub(super) fn count_placeholders(fragment: &str) -> usize {
    let mut count = 0;
    let _ = scan_code(fragment, |_, b, _| {
        if b == b'?' {
            count += 1;
        }
    });
    count
}

/// True when every bracket opened in `fragment` is closed and no literal is left open.
pub(super) fn is_balanced(fragment: &str) -> bool {
    scan_code(fragment, |_, _, _| {}) == Some(0)
}

/// Byte offsets of every top-level occurrence of `keyword` (case-insensitive, whole word).
pub(super) fn keyword_positions(sql: &str, keyword: &str) -> Vec<usize> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let _ = scan_code(sql, |idx, _, depth| {
        if depth == 0 && keyword_at(bytes, idx, keyword) {
            found.push(idx);
        }
    });
    found
}

/// Offset of the first top-level `byte` in `sql`.
pub(super) fn find_top_level_byte(sql: &str, needle: u8) -> Option<usize> {
    let mut found = None;
    let _ = scan_code(sql, |idx, b, depth| {
        if found.is_none() && depth == 0 && b == needle {
            found = Some(idx);
        }
    });
    found
}
