//! Small string helpers shared by the attribute parsers.

/// Stand-in for zero where a transform or line width has to stay invertible.
pub const PSEUDO_ZERO: f64 = 1e-8;

/// Collapse whitespace runs to single spaces and trim.
pub fn compress_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Every numeric literal in `s`, in order.
///
/// Literals follow `[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?`; anything else is a separator.
pub fn number_tokens(s: &str) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match number_len(&bytes[i..]) {
            Some(len) => {
                tokens.push(&s[i..i + len]);
                i += len;
            }
            None => i += 1,
        }
    }
    tokens
}

/// Parse every numeric literal in `s`.
pub fn to_numbers(s: &str) -> Vec<f64> {
    number_tokens(s)
        .into_iter()
        .filter_map(|token| token.parse().ok())
        .collect()
}

fn number_len(b: &[u8]) -> Option<usize> {
    let mut i = 0;
    if matches!(b.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    let int_start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = i - int_start;

    let mut frac_digits = 0;
    if i < b.len() && b[i] == b'.' {
        let dot = i;
        i += 1;
        let frac_start = i;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        frac_digits = i - frac_start;
        if int_digits == 0 && frac_digits == 0 {
            i = dot;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        let mut j = i + 1;
        if j < b.len() && (b[j] == b'+' || b[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }

    Some(i)
}

/// Leading numeric prefix of `s`, like `parseFloat`.
pub fn parse_leading_number(s: &str) -> Option<f64> {
    let trimmed = s.trim_start();
    let len = number_len(trimmed.as_bytes())?;
    trimmed[..len].parse().ok()
}

/// The target of a `url(...)` reference, quoted or bare.
pub fn parse_external_url(s: &str) -> Option<String> {
    let start = s.find("url(")? + 4;
    let rest = &s[start..];
    let end = rest.find(')')?;
    let inner = rest[..end].trim();
    let unquoted = inner
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| inner.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(inner);
    (!unquoted.is_empty()).then(|| unquoted.to_string())
}

/// Drop any namespace prefix from a tag name.
pub fn local_name(name: &str) -> &str {
    match name.rsplit_once(':') {
        Some((_, local)) => local,
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_tokens() {
        assert_eq!(
            number_tokens("10,-20.5 .5.5 1e3 -2E-2x"),
            vec!["10", "-20.5", ".5", ".5", "1e3", "-2E-2"]
        );
        assert_eq!(number_tokens("- . e"), Vec::<&str>::new());
        assert_eq!(number_tokens("3e"), vec!["3"]);
    }

    #[test]
    fn test_to_numbers() {
        assert_eq!(to_numbers("0 0 100 50"), vec![0.0, 0.0, 100.0, 50.0]);
        assert_eq!(to_numbers("1-2"), vec![1.0, -2.0]);
    }

    #[test]
    fn test_parse_leading_number() {
        assert_eq!(parse_leading_number("12px"), Some(12.0));
        assert_eq!(parse_leading_number(" -1.5em"), Some(-1.5));
        assert_eq!(parse_leading_number("px"), None);
    }

    #[test]
    fn test_parse_external_url() {
        assert_eq!(parse_external_url("url(#a)").as_deref(), Some("#a"));
        assert_eq!(
            parse_external_url(r#"url("font.svg#f") format("svg")"#).as_deref(),
            Some("font.svg#f")
        );
        assert_eq!(parse_external_url("url('x.svg')").as_deref(), Some("x.svg"));
        assert_eq!(parse_external_url("none"), None);
    }

    #[test]
    fn test_compress_spaces() {
        assert_eq!(compress_spaces("  a \n\t b  "), "a b");
        assert_eq!(local_name("svg:rect"), "rect");
    }
}
