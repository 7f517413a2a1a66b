//! Struct for managing references to the expression source text.

use std::rc::Rc;

/// A byte range into a [SourceText].
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) text: Rc<SourceText>,
}

impl TextSpan {
    pub fn new(start: usize, end: usize, text: Rc<SourceText>) -> Self {
        Self { start, end, text }
    }

    pub fn from_spans(start: &TextSpan, end: &TextSpan) -> Self {
        Self {
            start: start.start,
            end: end.end,
            text: start.text.clone(),
        }
    }

    /// Get the text inside the textspan.
    pub fn text(&self) -> &str {
        &self.text.text[self.start..self.end]
    }

    pub fn text_len(&self) -> usize {
        self.end - self.start
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceText {
    text: String,
    lines: Vec<usize>,
}

impl SourceText {
    pub fn from_str(string: &str) -> Self {
        Self {
            text: string.to_string(),
            lines: Self::index_text(string),
        }
    }

    fn index_text(text: &str) -> Vec<usize> {
        let mut lines: Vec<usize> = vec![0];
        for (i, c) in text.char_indices() {
            if c == '\n' {
                lines.push(i + 1);
            }
        }
        lines
    }

    /// Line number and byte offset within that line, both zero based.
    pub fn get_line_nr_and_position(&self, index: usize) -> (usize, usize) {
        let line_nr = match self.lines.binary_search(&index) {
            Ok(line_nr) => line_nr,
            Err(next) => next - 1,
        };
        (line_nr, index - self.lines[line_nr])
    }

    pub fn get_line(&self, line_nr: usize) -> Option<&str> {
        let start = *self.lines.get(line_nr)?;
        let end = match self.lines.get(line_nr + 1) {
            Some(e) => *e,
            None => self.text.len(),
        };
        Some(&self.text[start..end])
    }

    pub fn text(&self) -> &str {
        self.text.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_positions() {
        let text = SourceText::from_str("x + y\n  * z");
        assert_eq!(text.get_line_nr_and_position(0), (0, 0));
        assert_eq!(text.get_line_nr_and_position(4), (0, 4));
        assert_eq!(text.get_line_nr_and_position(8), (1, 2));
        assert_eq!(text.get_line(1), Some("  * z"));
        assert_eq!(text.get_line(2), None);
    }
}
