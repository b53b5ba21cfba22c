//! Property name codecs.
//!
//! Two encodings are in use. The current one percent-escapes the characters a
//! repository item name may not contain (`%XX`, upper-case hex). The legacy
//! one is the ISO-9075 XML name encoding (`_xHHHH_`, lower-case hex), which
//! older writers applied to whole paths; it is still honoured on read.

use tracing::trace;

const ILLEGAL_JCR_CHARS: &str = "%/:[]*|\t\r\n";
const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Percent-escapes characters that are illegal in an item name.
///
/// Besides the always-illegal characters, a `.` is escaped in names shorter
/// than three characters (so `.` and `..` stay addressable) and a space is
/// escaped at either end of the name.
pub fn escape_illegal_jcr_chars(name: &str) -> String {
    let len = name.chars().count();
    let mut out = String::with_capacity(name.len() * 2);
    for (idx, ch) in name.chars().enumerate() {
        let escape = ILLEGAL_JCR_CHARS.contains(ch)
            || (ch == '.' && len < 3)
            || (ch == ' ' && (idx == 0 || idx + 1 == len));
        if escape {
            let byte = ch as u32 as u8;
            out.push('%');
            out.push(HEX_UPPER[usize::from(byte >> 4)] as char);
            out.push(HEX_UPPER[usize::from(byte & 0x0F)] as char);
        } else {
            out.push(ch);
        }
    }
    out
}

/// Reverses [`escape_illegal_jcr_chars`]. Malformed `%` sequences are kept
/// verbatim.
pub fn unescape_illegal_jcr_chars(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        let mut digits = tail.chars();
        match (
            digits.next().and_then(|c| c.to_digit(16)),
            digits.next().and_then(|c| c.to_digit(16)),
        ) {
            (Some(hi), Some(lo)) => {
                out.push(char::from((hi * 16 + lo) as u8));
                rest = &tail[2..];
            }
            _ => {
                out.push('%');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Escapes every segment of a relative path, keeping the separators.
pub fn escape_path_segments(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.is_empty() {
                String::new()
            } else {
                escape_illegal_jcr_chars(segment)
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_name_start_char(ch: char) -> bool {
    matches!(ch,
        ':' | 'A'..='Z' | '_' | 'a'..='z'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(ch: char) -> bool {
    is_name_start_char(ch)
        || matches!(ch,
            '-' | '.' | '0'..='9' | '\u{B7}'
            | '\u{300}'..='\u{36F}'
            | '\u{203F}'..='\u{2040}')
}

/// Whether `chars[at..]` starts with `_x` and four hex digits, which would
/// be read back as an escape.
fn looks_escaped(chars: &[char], at: usize) -> bool {
    chars.len() >= at + 6
        && chars[at] == '_'
        && chars[at + 1] == 'x'
        && chars[at + 2..at + 6].iter().all(char::is_ascii_hexdigit)
}

fn push_escaped(out: &mut String, ch: char) {
    out.push_str(&format!("_x{:04x}_", ch as u32));
}

/// ISO-9075 encodes one name.
pub fn iso9075_encode(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let valid = chars
        .first()
        .is_some_and(|first| is_name_start_char(*first))
        && chars.iter().all(|ch| is_name_char(*ch));
    if chars.is_empty() || (valid && !name.contains("_x")) {
        return name.to_owned();
    }
    let mut out = String::with_capacity(name.len() + 8);
    for (idx, ch) in chars.iter().copied().enumerate() {
        let legal = if idx == 0 {
            is_name_start_char(ch)
        } else {
            is_name_char(ch)
        };
        if !legal {
            push_escaped(&mut out, ch);
        } else if looks_escaped(&chars, idx) {
            push_escaped(&mut out, '_');
        } else {
            out.push(ch);
        }
    }
    out
}

/// ISO-9075 encodes every segment of a path. A trailing `[n]` same-name
/// sibling index on a segment is kept as is.
pub fn iso9075_encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| match segment.find('[') {
            Some(idx) => {
                let (name, index) = segment.split_at(idx);
                format!("{}{index}", iso9075_encode(name))
            }
            None => iso9075_encode(segment),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Decodes every `_xHHHH_` sequence.
pub fn iso9075_decode(name: &str) -> String {
    if !name.contains("_x") {
        return name.to_owned();
    }
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len());
    let mut idx = 0;
    while idx < chars.len() {
        if looks_escaped(&chars, idx) && chars.get(idx + 6) == Some(&'_') {
            let hex: String = chars[idx + 2..idx + 6].iter().collect();
            if let Some(decoded) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                out.push(decoded);
                idx += 7;
                continue;
            }
        }
        out.push(chars[idx]);
        idx += 1;
    }
    trace!(input = name, decoded = %out, "escape.iso9075_decode");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn escapes_illegal_characters() {
        assert_eq!(escape_illegal_jcr_chars("a:b"), "a%3Ab");
        assert_eq!(escape_illegal_jcr_chars("x/y[1]*"), "x%2Fy%5B1%5D%2A");
        assert_eq!(escape_illegal_jcr_chars("100%"), "100%25");
        assert_eq!(escape_illegal_jcr_chars("tab\there"), "tab%09here");
    }

    #[test]
    fn escapes_dots_and_spaces_by_position() {
        assert_eq!(escape_illegal_jcr_chars("."), "%2E");
        assert_eq!(escape_illegal_jcr_chars(".."), "%2E%2E");
        assert_eq!(escape_illegal_jcr_chars("..."), "...");
        assert_eq!(escape_illegal_jcr_chars(" a b "), "%20a b%20");
    }

    #[test]
    fn unescape_keeps_malformed_sequences() {
        assert_eq!(unescape_illegal_jcr_chars("a%3Ab"), "a:b");
        assert_eq!(unescape_illegal_jcr_chars("100%"), "100%");
        assert_eq!(unescape_illegal_jcr_chars("%zz%41"), "%zzA");
    }

    #[test]
    fn path_segments_escape_independently() {
        assert_eq!(escape_path_segments("a:b/c d /."), "a%3Ab/c d%20/%2E");
        assert_eq!(escape_path_segments("/x//y"), "/x//y");
    }

    #[test]
    fn iso9075_encodes_invalid_characters() {
        assert_eq!(iso9075_encode("foo"), "foo");
        assert_eq!(iso9075_encode("1abc"), "_x0031_abc");
        assert_eq!(iso9075_encode("a b"), "a_x0020_b");
        assert_eq!(iso9075_encode("jcr:title"), "jcr:title");
        assert_eq!(iso9075_encode("_x0020_"), "_x005f_x0020_");
    }

    #[test]
    fn iso9075_path_keeps_indexes() {
        assert_eq!(iso9075_encode_path("a b/c[2]/d"), "a_x0020_b/c[2]/d");
    }

    #[test]
    fn iso9075_decodes() {
        assert_eq!(iso9075_decode("a_x0020_b"), "a b");
        assert_eq!(iso9075_decode("_x0031_abc"), "1abc");
        assert_eq!(iso9075_decode("a_xzz"), "a_xzz");
        assert_eq!(iso9075_decode("plain"), "plain");
    }

    proptest! {
        #[test]
        fn jcr_escape_round_trip(name in "[a-zA-Z0-9 ./:%\\[\\]*|_-]{0,16}") {
            let escaped = escape_illegal_jcr_chars(&name);
            prop_assert!(!escaped.contains('/'));
            prop_assert!(!escaped.contains(':'));
            prop_assert_eq!(unescape_illegal_jcr_chars(&escaped), name);
        }

        #[test]
        fn iso9075_round_trip(name in "[a-zA-Z0-9 ._x-]{1,16}") {
            prop_assert_eq!(iso9075_decode(&iso9075_encode(&name)), name);
        }
    }
}
