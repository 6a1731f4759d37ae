//! Shell escaping and quoting utilities.

/// Escape a value for use inside single quotes.
/// Replaces `'` with `'\''` (end quote, escaped quote, start quote).
pub fn escape_single_quote_content(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// Quote a single argument for shell execution.
/// - Empty strings become `''`
/// - Strings with shell metacharacters are wrapped in single quotes
/// - Embedded single quotes are escaped
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    const SHELL_META: &[char] = &[
        ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}',
        '<', '>', '|', '&', ';', '#', '~',
    ];

    if !arg.contains(SHELL_META) {
        return arg.to_string();
    }

    format!("'{}'", escape_single_quote_content(arg))
}

/// Quote and join multiple arguments for shell execution.
pub fn quote_args(args: &[String]) -> String {
    args.iter()
        .map(|a| quote_arg(a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a `export KEY=value` line safe to source from a profile script.
pub fn export_line(key: &str, value: &str) -> String {
    format!("export {}='{}'", key, escape_single_quote_content(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_arg_simple() {
        assert_eq!(quote_arg("us-east-1"), "us-east-1");
        assert_eq!(quote_arg("staging/api"), "staging/api");
    }

    #[test]
    fn quote_arg_with_spaces() {
        assert_eq!(quote_arg("hello world"), "'hello world'");
    }

    #[test]
    fn quote_arg_build_arg_assignment() {
        assert_eq!(quote_arg("ENVIRONMENT=staging"), "ENVIRONMENT=staging");
    }

    #[test]
    fn quote_arg_with_single_quote() {
        assert_eq!(quote_arg("it's"), "'it'\\''s'");
    }

    #[test]
    fn quote_arg_empty() {
        assert_eq!(quote_arg(""), "''");
    }

    #[test]
    fn quote_args_mixed() {
        let args = vec![
            "docker".to_string(),
            "tag".to_string(),
            "default/staging/api:4".to_string(),
        ];
        assert_eq!(quote_args(&args), "docker tag default/staging/api:4");
    }

    #[test]
    fn export_line_quotes_value() {
        assert_eq!(export_line("DB_URL", "postgres://x"), "export DB_URL='postgres://x'");
        assert_eq!(export_line("MOTTO", "it's"), "export MOTTO='it'\\''s'");
    }
}
