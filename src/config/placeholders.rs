// src/config/placeholders.rs

//! `%{NAME}%` references to environment variables.
//!
//! Used both when loading the config file (against the OS environment) and
//! when merging env files (against the environment built so far).

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%\{([A-Za-z0-9_]+)\}%").expect("placeholder regex is valid")
});

/// Replace every `%{NAME}%` in `text` with `lookup(NAME)`.
///
/// Unknown names expand to the empty string.
pub fn expand<'a, F>(text: &'a str, lookup: F) -> Cow<'a, str>
where
    F: Fn(&str) -> Option<String>,
{
    PLACEHOLDER_RE.replace_all(text, |caps: &Captures<'_>| {
        lookup(&caps[1]).unwrap_or_default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "HOME" => Some("/home/dev".to_string()),
            "PORT" => Some("8080".to_string()),
            _ => None,
        }
    }

    #[test]
    fn expands_known_and_blanks_unknown() {
        assert_eq!(
            expand("%{HOME}%/bin:%{PORT}%:%{MISSING}%", lookup),
            "/home/dev/bin:8080:"
        );
    }

    #[test]
    fn leaves_other_braces_untouched() {
        assert_eq!(expand("go test {PKG} ${HOME}", lookup), "go test {PKG} ${HOME}");
    }
}
