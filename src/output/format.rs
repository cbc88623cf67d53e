// src/output/format.rs

//! Rendering of output segments.
//!
//! A template is split around `{{.Message}}` into an opening part (written
//! when a segment starts) and a closing part (written when it ends), with
//! `{{.Time}}` and `{{.Title}}` expanded at render time.

use std::fmt::Write as _;

use chrono::Local;

use crate::config::FormatSection;
use crate::types::OutputStyle;

const MESSAGE: &str = "{{.Message}}";
const DEFAULT_TIME_FORMAT: &str = "%H:%M:%S";

/// What a segment carries; selects the template and the target stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Engine notice, e.g. the command about to run.
    Ok,
    /// Failure report for a rule.
    Fail,
    /// Child stdout.
    CommandOut,
    /// Child stderr.
    CommandErr,
}

impl SegmentKind {
    pub fn is_stderr(self) -> bool {
        matches!(self, SegmentKind::Fail | SegmentKind::CommandErr)
    }
}

#[derive(Debug, Clone)]
struct Template {
    open: String,
    close: String,
}

impl Template {
    fn parse(source: &str) -> Self {
        match source.split_once(MESSAGE) {
            Some((open, close)) => Self {
                open: open.to_string(),
                close: close.to_string(),
            },
            None => Self {
                open: source.to_string(),
                close: "\n".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Formatter {
    ok: Template,
    fail: Template,
    command_ok: Template,
    command_err: Template,
    time_format: String,
}

impl Formatter {
    /// ANSI-colored templates.
    pub fn color() -> Self {
        Self {
            ok: Template::parse(
                "\x1b[90m[{{.Time}}] \x1b[32m[{{.Title}}]\x1b[0m \x1b[2m{{.Message}}\x1b[0m\n",
            ),
            fail: Template::parse(
                "\x1b[90m[{{.Time}}] \x1b[31m[{{.Title}}]\x1b[0m \x1b[2m{{.Message}}\x1b[0m\n",
            ),
            command_ok: Template::parse("\x1b[90m[{{.Time}}] [{{.Title}}]\x1b[0m {{.Message}}\n"),
            command_err: Template::parse(
                "\x1b[90m[{{.Time}}] [{{.Title}}]\x1b[0m \x1b[31m{{.Message}}\x1b[0m\n",
            ),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }

    /// Templates without escape codes, for logs and pipes.
    pub fn plain() -> Self {
        Self {
            ok: Template::parse("[{{.Time}}] [{{.Title}}] {{.Message}}\n"),
            fail: Template::parse("[{{.Time}}] [{{.Title}} failed] {{.Message}}\n"),
            command_ok: Template::parse("[{{.Time}}] [{{.Title}}] {{.Message}}\n"),
            command_err: Template::parse("[{{.Time}}] [{{.Title}}!] {{.Message}}\n"),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }

    pub fn for_style(style: OutputStyle) -> Self {
        match style {
            OutputStyle::Color => Self::color(),
            OutputStyle::Plain => Self::plain(),
        }
    }

    /// Apply templates from the config file's `format:` section.
    pub fn with_overrides(mut self, section: &FormatSection) -> Self {
        if let Some(t) = &section.ok {
            self.ok = Template::parse(t);
        }
        if let Some(t) = &section.fail {
            self.fail = Template::parse(t);
        }
        if let Some(t) = &section.command_ok {
            self.command_ok = Template::parse(t);
        }
        if let Some(t) = &section.command_err {
            self.command_err = Template::parse(t);
        }
        if let Some(t) = section.time.as_deref().filter(|t| !t.is_empty()) {
            self.time_format = strftime_layout(t);
        }
        self
    }

    /// Text written when a segment for `title` starts.
    pub fn open(&self, kind: SegmentKind, title: &str) -> String {
        self.expand(&self.template(kind).open, title)
    }

    /// Text written when a segment for `title` ends.
    pub fn close(&self, kind: SegmentKind, title: &str) -> String {
        self.expand(&self.template(kind).close, title)
    }

    fn template(&self, kind: SegmentKind) -> &Template {
        match kind {
            SegmentKind::Ok => &self.ok,
            SegmentKind::Fail => &self.fail,
            SegmentKind::CommandOut => &self.command_ok,
            SegmentKind::CommandErr => &self.command_err,
        }
    }

    fn expand(&self, part: &str, title: &str) -> String {
        let mut out = part.replace("{{.Title}}", title);
        if out.contains("{{.Time}}") {
            out = out.replace("{{.Time}}", &self.now());
        }
        out
    }

    fn now(&self) -> String {
        let now = Local::now();
        let mut rendered = String::new();
        // chrono reports bad strftime strings as a formatting error.
        if write!(rendered, "{}", now.format(&self.time_format)).is_err() {
            rendered.clear();
            let _ = write!(rendered, "{}", now.format(DEFAULT_TIME_FORMAT));
        }
        rendered
    }
}

/// Go reference-time tokens and their strftime equivalents, longest first
/// so `2006` wins over `2` and `January` over `Jan`.
const GO_LAYOUT_TOKENS: &[(&str, &str)] = &[
    ("January", "%B"),
    ("Monday", "%A"),
    ("-07:00", "%:z"),
    ("-0700", "%z"),
    ("2006", "%Y"),
    (".000", "%.3f"),
    ("Jan", "%b"),
    ("Mon", "%a"),
    ("MST", "%Z"),
    ("01", "%m"),
    ("02", "%d"),
    ("_2", "%e"),
    ("03", "%I"),
    ("04", "%M"),
    ("05", "%S"),
    ("06", "%y"),
    ("15", "%H"),
    ("PM", "%p"),
    ("pm", "%P"),
    ("1", "%-m"),
    ("2", "%-d"),
    ("3", "%-I"),
    ("4", "%-M"),
    ("5", "%-S"),
];

/// Accept both strftime strings and Go layouts (`15:04:05`) for
/// `format.time`. Anything containing `%` is taken as strftime.
fn strftime_layout(layout: &str) -> String {
    if layout.contains('%') {
        return layout.to_string();
    }
    let mut out = String::with_capacity(layout.len() * 2);
    let mut rest = layout;
    'scan: while let Some(c) = rest.chars().next() {
        for (go, strftime) in GO_LAYOUT_TOKENS {
            if let Some(tail) = rest.strip_prefix(go) {
                out.push_str(strftime);
                rest = tail;
                continue 'scan;
            }
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

impl Default for Formatter {
    fn default() -> Self {
        Self::color()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_splits_around_message() {
        let f = Formatter::plain().with_overrides(&FormatSection {
            ok: Some("<{{.Title}}>{{.Message}}</{{.Title}}>\n".into()),
            ..Default::default()
        });
        assert_eq!(f.open(SegmentKind::Ok, "build"), "<build>");
        assert_eq!(f.close(SegmentKind::Ok, "build"), "</build>\n");
    }

    #[test]
    fn template_without_message_closes_with_newline() {
        let f = Formatter::plain().with_overrides(&FormatSection {
            fail: Some("!! {{.Title}} ".into()),
            ..Default::default()
        });
        assert_eq!(f.open(SegmentKind::Fail, "x"), "!! x ");
        assert_eq!(f.close(SegmentKind::Fail, "x"), "\n");
    }

    #[test]
    fn bad_time_format_falls_back() {
        let f = Formatter::plain().with_overrides(&FormatSection {
            time: Some("%Q".into()),
            ..Default::default()
        });
        let open = f.open(SegmentKind::Ok, "t");
        assert!(open.starts_with('['));
        assert!(open.contains(':'));
    }

    #[test]
    fn go_time_layouts_are_translated() {
        assert_eq!(strftime_layout("15:04:05"), "%H:%M:%S");
        assert_eq!(strftime_layout("2006-01-02 15:04:05.000"), "%Y-%m-%d %H:%M:%S%.3f");
        assert_eq!(strftime_layout("Mon Jan _2 3:04PM"), "%a %b %e %-I:%M%p");
        assert_eq!(strftime_layout("%H:%M"), "%H:%M");
    }

    #[test]
    fn go_layout_renders_a_clock() {
        let f = Formatter::plain().with_overrides(&FormatSection {
            time: Some("15:04".into()),
            ..Default::default()
        });
        let open = f.open(SegmentKind::Ok, "t");
        let clock = open
            .strip_prefix('[')
            .and_then(|s| s.split_once(']'))
            .map(|(clock, _)| clock)
            .unwrap_or_default();
        assert_eq!(clock.len(), 5, "rendered: {open:?}");
        assert!(clock.chars().all(|c| c.is_ascii_digit() || c == ':'));
    }
}
