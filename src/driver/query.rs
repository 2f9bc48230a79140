//! Query templates, argument escaping and validation.

use super::error::{DriverError, DriverResult};

/// Characters that get a `\` prefix when they appear in a string argument.
const ESCAPE_CHARS: [char; 4] = ['\'', '\\', '%', '"'];

/// Allowlist applied to every escaped string argument: alphanumerics,
/// whitespace and a fixed set of punctuation. Note that `%` is escaped by
/// [`escape_gremlin`] but deliberately absent from the allowlist.
pub const ARG_REGEX: &str = r#"^[\d\w\s\\;.:/\-?!*()&_=,#'><"]+$"#;

/// A parameterized Gremlin query.
///
/// The template uses printf-style placeholders (`%s`, `%d`, `%f`, `%v`)
/// that are substituted with the escaped arguments before execution. A
/// non-empty lock key serializes all queries sharing that key.
#[derive(Debug, Clone, Default)]
pub struct GremlinQuery {
    /// Query template.
    pub query: String,
    /// Arguments substituted into the template.
    pub args: Vec<QueryArg>,
    /// Optional mutual-exclusion key.
    pub lock_key: Option<String>,
}

impl GremlinQuery {
    /// Query without arguments or lock key.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Attach arguments.
    pub fn with_args(mut self, args: Vec<QueryArg>) -> Self {
        self.args = args;
        self
    }

    /// Attach a lock key.
    pub fn with_lock_key(mut self, key: impl Into<String>) -> Self {
        self.lock_key = Some(key.into());
        self
    }

    /// Best-effort substituted form for log output. Falls back to the raw
    /// template when the placeholders and arguments do not line up.
    pub fn rendered(&self) -> String {
        let rendered: Vec<String> = self.args.iter().map(QueryArg::render).collect();
        format_query(&self.query, &rendered).unwrap_or_else(|_| self.query.clone())
    }
}

/// A single query argument. Only string arguments are escaped and
/// validated; numeric and boolean arguments pass through.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryArg {
    /// String argument, subject to escaping and allowlist validation.
    Str(String),
    /// Integer argument.
    Int(i64),
    /// Float argument.
    Float(f64),
    /// Boolean argument.
    Bool(bool),
}

impl QueryArg {
    /// Escaped (for strings) textual form ready for substitution.
    pub(crate) fn render(&self) -> String {
        match self {
            Self::Str(s) => escape_gremlin(s),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for QueryArg {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for QueryArg {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for QueryArg {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for QueryArg {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for QueryArg {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Prefix every occurrence of `'`, `\`, `%` and `"` with a backslash.
///
/// Not idempotent: escaping an already-escaped string doubles the
/// backslashes again.
pub fn escape_gremlin(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if ESCAPE_CHARS.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Substitute printf-style placeholders in `template` with `args`, in
/// order. `%%` emits a literal percent sign. The argument count must match
/// the placeholder count exactly.
pub(crate) fn format_query(template: &str, args: &[String]) -> DriverResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut next_arg = 0;
    let mut chars = template.chars();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('s') | Some('d') | Some('f') | Some('v') => {
                let arg = args.get(next_arg).ok_or_else(|| {
                    DriverError::QueryFormat(format!(
                        "template has more placeholders than arguments ({} supplied)",
                        args.len()
                    ))
                })?;
                out.push_str(arg);
                next_arg += 1;
            }
            Some(other) => {
                return Err(DriverError::QueryFormat(format!(
                    "unsupported placeholder %{other}"
                )))
            }
            None => {
                return Err(DriverError::QueryFormat(
                    "dangling % at end of template".to_string(),
                ))
            }
        }
    }

    if next_arg < args.len() {
        return Err(DriverError::QueryFormat(format!(
            "{} arguments supplied but only {} placeholders in template",
            args.len(),
            next_arg
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_escape_table() {
        let cases = [
            ("this is a test", "this is a test"),
            ("this is a %", r"this is a \%"),
            ("", ""),
            (r#"' \ % ""#, r#"\' \\ \% \""#),
        ];
        for (given, expected) in cases {
            assert_eq!(escape_gremlin(given), expected, "given {given:?}");
        }
    }

    #[test]
    fn test_escape_is_not_idempotent_on_backslash() {
        // a pre-escaped quote gains another backslash on the second pass
        let once = escape_gremlin("don't");
        assert_eq!(once, r"don\'t");
        let twice = escape_gremlin(&once);
        assert_eq!(twice, r"don\\\'t");
    }

    #[test]
    fn test_regex_accepts_escaped_valid_input() {
        let re = Regex::new(ARG_REGEX).unwrap();
        for input in [
            "plain words",
            "punctuation ; . : / - ? ! * ( ) & _ = , # < >",
            "quo'ted \"text\"",
            r"back\slash",
        ] {
            let escaped = escape_gremlin(input);
            assert!(re.is_match(&escaped), "escaped {escaped:?} rejected");
        }
    }

    #[test]
    fn test_regex_rejects_disallowed_characters() {
        let re = Regex::new(ARG_REGEX).unwrap();
        assert!(!re.is_match("g.V(){}"));
        assert!(!re.is_match("a|b"));
        assert!(!re.is_match("tilde~"));
    }

    #[test]
    fn test_format_query_substitution() {
        let out = format_query(
            "g.V().has('name', '%s').limit(%d)",
            &["Alice".to_string(), "10".to_string()],
        )
        .unwrap();
        assert_eq!(out, "g.V().has('name', 'Alice').limit(10)");
    }

    #[test]
    fn test_format_query_literal_percent() {
        let out = format_query("g.V().has('pct', '100%%')", &[]).unwrap();
        assert_eq!(out, "g.V().has('pct', '100%')");
    }

    #[test]
    fn test_format_query_arity_mismatch() {
        assert!(matches!(
            format_query("g.V().has('a', '%s')", &[]),
            Err(DriverError::QueryFormat(_))
        ));
        assert!(matches!(
            format_query("g.V()", &["spare".to_string()]),
            Err(DriverError::QueryFormat(_))
        ));
    }

    #[test]
    fn test_rendered_escapes_string_args() {
        let q = GremlinQuery::new("g.V().has('name', '%s')")
            .with_args(vec![QueryArg::from("O'Brien")]);
        assert_eq!(q.rendered(), r"g.V().has('name', 'O\'Brien')");
    }
}
