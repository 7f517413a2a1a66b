//! The lexer module converts the raw expression text into tokens.

use std::fmt::Display;
use std::rc::Rc;

use crate::text::{SourceText, TextSpan};

/// Kinds of lexer tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Integer(i64),
    Float(f64),
    Word(String),
    Plus,
    Minus,
    Asterisk,
    DoubleAsterisk,
    Caret,
    Slash,
    Percent,
    LeftParen,
    RightParen,
    Comma,
    Whitespace,
    Bad,
    End,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let string_rep = match self {
            TokenKind::Integer(_) => "integer",
            TokenKind::Float(_) => "float",
            TokenKind::Word(_) => "word",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Asterisk => "*",
            TokenKind::DoubleAsterisk => "**",
            TokenKind::Caret => "^",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::Comma => ",",
            TokenKind::Whitespace => "whitespace",
            TokenKind::Bad => "bad-token",
            TokenKind::End => "end-of-expression",
        };
        write!(f, "{}", string_rep)
    }
}

/// A lexer token.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: TextSpan,
}

impl Token {
    fn new(kind: TokenKind, span: TextSpan) -> Self {
        Self { kind, span }
    }
}

/// The lexer. Tokens can be extracted by iterating over it. The last token is always
/// [TokenKind::End].
pub struct Lexer {
    source: Rc<SourceText>,
    chars: Vec<(usize, char)>,
    cursor: usize,
    placed_end_token: bool,
}

impl Lexer {
    pub fn from_source(source: Rc<SourceText>) -> Self {
        let chars = source.text().char_indices().collect();
        Lexer {
            source,
            chars,
            cursor: 0,
            placed_end_token: false,
        }
    }

    fn peak(&self, offset: usize) -> Option<char> {
        self.chars.get(self.cursor + offset).map(|(_, c)| *c)
    }

    fn current(&self) -> Option<char> {
        self.peak(0)
    }

    fn consume(&mut self) -> Option<char> {
        let c = self.current();
        self.cursor += 1;
        c
    }

    /// Byte offset of the cursor.
    fn offset(&self) -> usize {
        match self.chars.get(self.cursor) {
            Some((i, _)) => *i,
            None => self.source.text().len(),
        }
    }

    fn consume_digits(&mut self) {
        while let Some(c) = self.current() {
            if !c.is_ascii_digit() {
                break;
            }
            self.consume();
        }
    }

    /// Lex `12`, `1.5`, `.5` and `2e-3`. Anything with a fraction or exponent is a float.
    fn consume_number(&mut self, start: usize) -> TokenKind {
        self.consume_digits();
        let mut is_float = false;

        if self.current() == Some('.') {
            is_float = true;
            self.consume();
            self.consume_digits();
        }

        if let Some('e' | 'E') = self.current() {
            let exponent_digit = match self.peak(1) {
                Some('+' | '-') => self.peak(2),
                other => other,
            };
            if exponent_digit.is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.consume();
                if let Some('+' | '-') = self.current() {
                    self.consume();
                }
                self.consume_digits();
            }
        }

        let text = &self.source.text()[start..self.offset()];
        if is_float {
            match text.parse::<f64>() {
                Ok(f) => TokenKind::Float(f),
                Err(_) => TokenKind::Bad,
            }
        } else {
            match text.parse::<i64>() {
                Ok(n) => TokenKind::Integer(n),
                // Too large for an exact integer; keep the magnitude.
                Err(_) => match text.parse::<f64>() {
                    Ok(f) => TokenKind::Float(f),
                    Err(_) => TokenKind::Bad,
                },
            }
        }
    }

    fn is_number_start(&self, c: char) -> bool {
        c.is_ascii_digit() || (c == '.' && self.peak(1).is_some_and(|n| n.is_ascii_digit()))
    }

    fn is_word_start(c: char) -> bool {
        c.is_alphabetic() || c == '_'
    }

    fn is_word_char(c: char) -> bool {
        c.is_alphanumeric() || c == '_'
    }

    fn consume_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.current() {
            if !Self::is_word_char(c) {
                break;
            }
            word.push(c);
            self.consume();
        }
        word
    }

    fn consume_punctuation(&mut self) -> TokenKind {
        match self.consume() {
            Some('+') => TokenKind::Plus,
            Some('-') => TokenKind::Minus,
            Some('*') => match self.current() {
                Some('*') => {
                    self.consume();
                    TokenKind::DoubleAsterisk
                }
                _ => TokenKind::Asterisk,
            },
            Some('^') => TokenKind::Caret,
            Some('/') => TokenKind::Slash,
            Some('%') => TokenKind::Percent,
            Some('(') => TokenKind::LeftParen,
            Some(')') => TokenKind::RightParen,
            Some(',') => TokenKind::Comma,
            _ => TokenKind::Bad,
        }
    }
}

impl Iterator for Lexer {
    type Item = Token;
    fn next(&mut self) -> Option<Self::Item> {
        let start = self.offset();
        let kind = match self.current() {
            None => {
                if self.placed_end_token {
                    return None;
                }
                self.placed_end_token = true;
                TokenKind::End
            }
            Some(c) if self.is_number_start(c) => self.consume_number(start),
            Some(c) if Self::is_word_start(c) => TokenKind::Word(self.consume_word()),
            Some(c) if c.is_whitespace() => {
                while let Some(c) = self.current() {
                    if !c.is_whitespace() {
                        break;
                    }
                    self.consume();
                }
                TokenKind::Whitespace
            }
            Some(_) => self.consume_punctuation(),
        };
        let end = self.offset();
        Some(Token::new(
            kind,
            TextSpan::new(start, end, self.source.clone()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(text: &str) -> Vec<TokenKind> {
        Lexer::from_source(Rc::new(SourceText::from_str(text)))
            .map(|t| t.kind)
            .filter(|k| k != &TokenKind::Whitespace)
            .collect()
    }

    #[test]
    fn lex_operators_and_numbers() {
        assert_eq!(
            kinds("2*x**3 - .5 ^ 1e-2 % y_1"),
            vec![
                TokenKind::Integer(2),
                TokenKind::Asterisk,
                TokenKind::Word("x".to_string()),
                TokenKind::DoubleAsterisk,
                TokenKind::Integer(3),
                TokenKind::Minus,
                TokenKind::Float(0.5),
                TokenKind::Caret,
                TokenKind::Float(0.01),
                TokenKind::Percent,
                TokenKind::Word("y_1".to_string()),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn lex_call() {
        assert_eq!(
            kinds("atan2(y, x)"),
            vec![
                TokenKind::Word("atan2".to_string()),
                TokenKind::LeftParen,
                TokenKind::Word("y".to_string()),
                TokenKind::Comma,
                TokenKind::Word("x".to_string()),
                TokenKind::RightParen,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn exponent_needs_digits() {
        // `2e` is the number 2 followed by the symbol `e`.
        assert_eq!(
            kinds("2e"),
            vec![
                TokenKind::Integer(2),
                TokenKind::Word("e".to_string()),
                TokenKind::End
            ]
        );
    }

    #[test]
    fn spans_are_byte_ranges() {
        let tokens: Vec<Token> = Lexer::from_source(Rc::new(SourceText::from_str("é + 12"))).collect();
        let number = tokens.iter().find(|t| t.kind == TokenKind::Integer(12)).unwrap();
        assert_eq!(number.span.text(), "12");
        assert_eq!(tokens.last().unwrap().kind, TokenKind::End);
    }

    #[test]
    fn bad_token() {
        assert!(kinds("x $ y").contains(&TokenKind::Bad));
    }
}
