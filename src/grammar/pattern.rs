//! LIKE pattern translation
//!
//! `%` matches any sequence and `_` matches exactly one character. Every
//! other character matches itself: regex metacharacters are escaped first,
//! then the two wildcards are substituted, then the whole pattern is
//! anchored to the full field value. There is no escape for a literal `%`
//! or `_`.

/// Translates a LIKE literal into an anchored regular expression
pub fn like_to_regex(pattern: &str) -> String {
    let escaped = regex::escape(pattern);
    let mut out = String::with_capacity(escaped.len() + 2);
    out.push('^');
    for c in escaped.chars() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            c => out.push(c),
        }
    }
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::RegexBuilder;

    fn matcher(pattern: &str) -> regex::Regex {
        RegexBuilder::new(&like_to_regex(pattern))
            .case_insensitive(true)
            .build()
            .unwrap()
    }

    #[test]
    fn test_wildcards() {
        assert_eq!(like_to_regex("%son"), "^.*son$");
        assert_eq!(like_to_regex("J_n"), "^J.n$");
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let re = matcher("a.b(c)%");
        assert!(re.is_match("a.b(c)xyz"));
        assert!(!re.is_match("aXb(c)xyz"));
    }

    #[test]
    fn test_percent_off_pattern() {
        let re = matcher("50% off_");
        assert!(re.is_match("50% off!"));
        assert!(re.is_match("50 anything offY"));
        assert!(!re.is_match("A50X offY"));
        assert!(!re.is_match("50% offYZ"));
        assert!(!re.is_match("50% off"));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(matcher("alice").is_match("ALICE"));
    }
}
