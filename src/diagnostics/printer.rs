use termion::color::{self, Bg, Fg};

use crate::diagnostics::{Diagnostic, Severity};
use crate::text::TextSpan;

const PREFIX_LEN: usize = 16;
const SUFIX_LEN: usize = 20;

pub struct DiagnosticsPrinter<'a> {
    diagnostics: &'a [Diagnostic],
}

impl<'a> DiagnosticsPrinter<'a> {
    pub fn new(diagnostics: &'a [Diagnostic]) -> Self {
        Self { diagnostics }
    }

    pub fn print(&self) {
        for diagnostic in self.diagnostics {
            eprintln!("{}", self.stringify_diagnostic(diagnostic));
        }
    }

    fn tag(severity: Severity) -> String {
        match severity {
            Severity::Error => format!("{}[E]{}", Fg(color::Red), Fg(color::Reset)),
            Severity::Warning => format!("{}[W]{}", Fg(color::Yellow), Fg(color::Reset)),
        }
    }

    fn stringify_diagnostic(&self, d: &Diagnostic) -> String {
        match d {
            Diagnostic::General { severity, message } => format!(
                "{} {}{}{}",
                Self::tag(*severity),
                Fg(color::Blue),
                message,
                Fg(color::Reset)
            ),
            Diagnostic::Localized {
                severity,
                message,
                span,
            } => self.stringify_localized(*severity, message, span),
        }
    }

    /// [E] ll:cc  x + * y      -> Error message
    fn stringify_localized(&self, severity: Severity, message: &str, span: &TextSpan) -> String {
        let (line_nr, line_pos) = span.text.get_line_nr_and_position(span.start);
        let line = span.text.get_line(line_nr).unwrap_or_default();

        let code: String = {
            let code_prefix = if line_pos == 0 {
                "".to_string()
            } else {
                let s = &line[..line_pos];
                let skip = s.chars().count().saturating_sub(PREFIX_LEN);
                let s: String = s.chars().skip(skip).collect();
                let start_whitespace_len = s.len() - s.trim_start().len();
                format!(
                    "{}{}{}{}",
                    Bg(color::White),
                    &s[..start_whitespace_len],
                    Bg(color::Reset),
                    &s[start_whitespace_len..],
                )
            };
            let code_sufix = {
                let start = (line_pos + span.text_len()).min(line.len());
                let s = line[start..].trim_end_matches('\n');
                match s.char_indices().nth(SUFIX_LEN) {
                    Some((i, _)) => &s[..i],
                    None => s,
                }
            };
            let highlighted = if span.text_len() == 0 { "_" } else { span.text() };
            format!(
                "{}{}{}{}{}",
                code_prefix,
                Fg(color::Red),
                highlighted,
                Fg(color::Reset),
                code_sufix,
            )
            .chars()
            .filter(|c| c != &'\n')
            .collect()
        };
        let location = format!("{} {}:{}\t", Self::tag(severity), line_nr + 1, line_pos + 1);
        let message = format!("{}{}{}", Fg(color::Blue), message, Fg(color::Reset));
        format!("{} {} \t-> {}", location, code, message)
    }
}
