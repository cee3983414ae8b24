//! URL path normalization used at registration and lookup time.

use percent_encoding::percent_decode_str;
use std::borrow::Cow;

/// Returns the canonical form of `p`.
///
/// Repeated slashes collapse into one, `.` segments are dropped and `..`
/// segments remove the preceding segment without ever climbing above the
/// root. The result always starts with `/`, and keeps a trailing slash when
/// the input had one (or ended in `.`).
pub fn clean_path(p: &str) -> String {
    if p.is_empty() {
        return "/".to_string();
    }

    let mut trailing = p.len() > 1 && p.ends_with('/');
    let mut segments: Vec<&str> = Vec::new();
    let mut parts = p.split('/').peekable();

    while let Some(segment) = parts.next() {
        let last = parts.peek().is_none();
        match segment {
            "" => {}
            "." => {
                if last {
                    trailing = true;
                }
            }
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut cleaned = String::with_capacity(p.len() + 1);
    for segment in &segments {
        cleaned.push('/');
        cleaned.push_str(segment);
    }

    if cleaned.is_empty() {
        cleaned.push('/');
    } else if trailing {
        cleaned.push('/');
    }

    cleaned
}

/// Joins a group base path with a relative route path.
///
/// A trailing slash on `relative` survives the join.
pub fn join_paths(absolute: &str, relative: &str) -> String {
    if relative.is_empty() {
        return absolute.to_string();
    }

    let mut joined = clean_path(&format!("{absolute}/{relative}"));
    if !relative.ends_with('/') && joined.len() > 1 && joined.ends_with('/') {
        joined.pop();
    }
    if relative.ends_with('/') && !joined.ends_with('/') {
        joined.push('/');
    }
    joined
}

/// Collapses any run of `c` into a single occurrence.
pub fn remove_repeated_char(s: &str, c: char) -> Cow<'_, str> {
    let pair: String = [c, c].iter().collect();
    if !s.contains(pair.as_str()) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut previous = None;
    for ch in s.chars() {
        if ch == c && previous == Some(c) {
            continue;
        }
        out.push(ch);
        previous = Some(ch);
    }
    Cow::Owned(out)
}

/// Percent-decodes a path. `None` when an escape is malformed or the decoded
/// bytes are not UTF-8.
pub(crate) fn unescape_path(raw: &str) -> Option<Cow<'_, str>> {
    if !well_formed_escapes(raw) {
        return None;
    }
    percent_decode_str(raw).decode_utf8().ok()
}

/// Decodes a parameter value taken from the raw path, treating `+` as a space.
/// The raw value is kept when it is not valid percent-encoded UTF-8.
pub(crate) fn unescape_value(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['%', '+']) || !well_formed_escapes(raw) {
        return Cow::Borrowed(raw);
    }
    let spaced = raw.replace('+', " ");
    match percent_decode_str(&spaced).decode_utf8() {
        Ok(decoded) => Cow::Owned(decoded.into_owned()),
        Err(_) => Cow::Borrowed(raw),
    }
}

/// Every `%` is followed by two hex digits.
fn well_formed_escapes(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            match bytes.get(i + 1..i + 3) {
                Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => i += 3,
                _ => return false,
            }
        } else {
            i += 1;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_path() {
        let cases = [
            ("", "/"),
            ("/", "/"),
            ("//", "/"),
            ("/abc", "/abc"),
            ("abc/", "/abc/"),
            ("/a/b/c/", "/a/b/c/"),
            ("abc//def//ghi", "/abc/def/ghi"),
            (".", "/"),
            ("./", "/"),
            ("abc/./def", "/abc/def"),
            ("/./abc/def", "/abc/def"),
            ("abc/.", "/abc/"),
            ("..", "/"),
            ("../", "/"),
            ("../../", "/"),
            ("../../abc", "/abc"),
            ("/abc/def/ghi/../jkl", "/abc/def/jkl"),
            ("abc/def/..", "/abc"),
            ("abc/def/../..", "/"),
            ("/abc/def/../../..", "/"),
            ("abc/def/../../../ghi/jkl/../../../mno", "/mno"),
            ("abc/./../def", "/def"),
            ("abc//./../def", "/def"),
            ("abc/../../././../def", "/def"),
        ];

        for (input, expected) in cases {
            assert_eq!(clean_path(input), expected, "clean_path({input:?})");
        }
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("", ""), "");
        assert_eq!(join_paths("/", ""), "/");
        assert_eq!(join_paths("/a", ""), "/a");
        assert_eq!(join_paths("/a/", ""), "/a/");
        assert_eq!(join_paths("/a/", "/"), "/a/");
        assert_eq!(join_paths("/a", "/"), "/a/");
        assert_eq!(join_paths("/", "/hey"), "/hey");
        assert_eq!(join_paths("/a", "/hey"), "/a/hey");
        assert_eq!(join_paths("/a/", "/hey/"), "/a/hey/");
        assert_eq!(join_paths("/a/", "hey/"), "/a/hey/");
        assert_eq!(join_paths("/a/", "/hey//"), "/a/hey/");
        assert_eq!(join_paths("/a//", "//hey"), "/a/hey");
    }

    #[test]
    fn test_remove_repeated_char() {
        assert_eq!(remove_repeated_char("/a//b///c", '/'), "/a/b/c");
        assert_eq!(remove_repeated_char("/a/b", '/'), "/a/b");
        assert!(matches!(remove_repeated_char("/a/b", '/'), Cow::Borrowed(_)));
        assert_eq!(remove_repeated_char("//", '/'), "/");
        assert_eq!(remove_repeated_char("", '/'), "");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape_path("/a%20b/%E4%BD%A0").as_deref(), Some("/a b/你"));
        assert_eq!(unescape_path("/plain").as_deref(), Some("/plain"));
        assert_eq!(unescape_path("/%FF"), None);
        assert_eq!(unescape_path("/50%"), None);
        assert_eq!(unescape_path("/%zz"), None);

        assert_eq!(unescape_value("a+b%2Fc"), "a b/c");
        assert_eq!(unescape_value("plain"), "plain");
        assert_eq!(unescape_value("%FF"), "%FF");
    }

    #[test]
    fn test_unescape_value_keeps_malformed_escapes() {
        assert_eq!(unescape_value("file++++%%%%test.png"), "file++++%%%%test.png");
        assert_eq!(unescape_value("%E0%A4%A"), "%E0%A4%A");
        assert_eq!(unescape_value("a+b%"), "a+b%");
        assert_eq!(unescape_value("100%25+off"), "100% off");
    }
}
