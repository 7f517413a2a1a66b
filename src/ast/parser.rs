//! Module for parsing a token stream into an abstract syntax tree.

use std::cmp::min;

use crate::ast::lexer::{Token, TokenKind};
use crate::ast::{
    BinaryExpression, BinaryOperator, CallExpression, Expression, ExpressionKind,
    NegativeExpression, ParenthesizedExpression, UNARY_PRECEDENCE,
};
use crate::diagnostics::{CompilationError, CompilationResult};
use crate::text::TextSpan;

/// Deepest expression tree the parser builds. Every parenthesis, call, sign and chained binary
/// operator adds a level.
pub const MAX_DEPTH: usize = 256;

/// The parser. Turns the token stream of one expression into an [Expression].
pub struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    /// Create a new [Parser]. The token list must end with a [TokenKind::End] token, as produced
    /// by the lexer.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens
                .into_iter()
                .filter(|token| token.kind != TokenKind::Whitespace)
                .collect(),
            cursor: 0,
            depth: 0,
        }
    }

    /// Parse the whole token stream as one expression.
    pub fn parse(mut self) -> CompilationResult<Expression> {
        if let Some(bad) = self.tokens.iter().find(|t| t.kind == TokenKind::Bad) {
            return Err(CompilationError::new_localized(
                format!("Bad token `{}`.", bad.span.text()),
                bad.span.clone(),
            ));
        }
        if self.tokens.is_empty() || self.current().kind == TokenKind::End {
            return Err(CompilationError::new_generic("The expression is empty."));
        }

        let expression = self.parse_binary_expression(None, 0)?;

        if self.current().kind != TokenKind::End {
            return Err(CompilationError::new_unexpected_token(
                self.current().clone(),
                TokenKind::End,
            ));
        }
        Ok(expression)
    }

    /// Peak at a token around the current cursor position with an offset.
    fn peak(&self, mut offset: isize) -> &Token {
        if self.cursor as isize + offset < 0 {
            offset = 0;
        }
        &self.tokens[min(
            (self.cursor as isize + offset) as usize,
            self.tokens.len() - 1,
        )]
    }

    /// Get the current token.
    fn current(&self) -> &Token {
        self.peak(0)
    }

    /// Return the current token and move to the next token.
    fn consume(&mut self) -> &Token {
        log::trace!("{} : {:?}", self.cursor, &self.current().kind);
        self.cursor += 1;
        self.peak(-1)
    }

    /// Consume and error if the token is not what was expected.
    fn consume_and_expect(&mut self, expected: TokenKind) -> CompilationResult<Token> {
        let token = self.consume().clone();
        if token.kind != expected {
            Err(CompilationError::new_unexpected_token(token, expected))
        } else {
            Ok(token)
        }
    }

    /// Consume only if the token is of a certain kind.
    fn consume_if(&mut self, token_kind: TokenKind) -> bool {
        if self.current().kind == token_kind {
            self.consume();
            true
        } else {
            false
        }
    }

    /// Go one level deeper into the tree. Errors end the parse, so levels are only given back on
    /// success.
    fn descend(&mut self) -> CompilationResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(CompilationError::new_localized(
                format!("The expression nests deeper than {MAX_DEPTH} levels."),
                self.current().span.clone(),
            ));
        }
        Ok(())
    }

    fn get_span_from(&self, start_span: &TextSpan) -> TextSpan {
        TextSpan::from_spans(start_span, &self.peak(-1).span)
    }

    /// Returns the operator if the current token is an operator
    fn get_binary_operator(&self) -> Option<BinaryOperator> {
        match self.current().kind {
            TokenKind::Plus => Some(BinaryOperator::Add),
            TokenKind::Minus => Some(BinaryOperator::Subtract),
            TokenKind::Asterisk => Some(BinaryOperator::Multiply),
            TokenKind::Slash => Some(BinaryOperator::Divide),
            TokenKind::Percent => Some(BinaryOperator::Modulo),
            TokenKind::DoubleAsterisk | TokenKind::Caret => Some(BinaryOperator::Power),
            _ => None,
        }
    }

    /// Parse a binary expression.
    /// https://en.wikipedia.org/wiki/Operator-precedence_parser
    fn parse_binary_expression(
        &mut self,
        left: Option<Expression>,
        min_precedence: u8,
    ) -> CompilationResult<Expression> {
        self.descend()?;
        let mut levels = 1;
        let mut left = match left {
            Some(e) => e,
            None => self.parse_unary_expression()?,
        };

        while let Some(op) = self.get_binary_operator() {
            if op.precedence() < min_precedence {
                break;
            }

            self.consume(); // advance to next token
            self.descend()?;
            levels += 1;
            let mut right = self.parse_unary_expression()?;

            while let Some(right_op) = self.get_binary_operator() {
                let binds_tighter = right_op.precedence() > op.precedence()
                    || (right_op.is_right_associative()
                        && right_op.precedence() == op.precedence());
                if !binds_tighter {
                    break;
                }
                right = self.parse_binary_expression(Some(right), right_op.precedence())?;
            }

            let span = TextSpan::from_spans(&left.span, &right.span);
            left = Expression::new(
                ExpressionKind::Binary(BinaryExpression {
                    left: Box::new(left),
                    right: Box::new(right),
                    operator: op,
                }),
                span,
            );
        }

        self.depth -= levels;
        Ok(left)
    }

    /// Parse leading signs. The operand of a sign only swallows operators binding tighter than
    /// the sign itself.
    fn parse_unary_expression(&mut self) -> CompilationResult<Expression> {
        let start_token = self.current().clone();
        match start_token.kind {
            TokenKind::Minus | TokenKind::Plus => {
                self.consume();
                self.descend()?;
                let operand = self.parse_unary_expression()?;
                let operand = self.parse_binary_expression(Some(operand), UNARY_PRECEDENCE + 1)?;
                self.depth -= 1;
                if start_token.kind == TokenKind::Plus {
                    return Ok(operand);
                }
                let span = TextSpan::from_spans(&start_token.span, &operand.span);
                Ok(Expression::new(
                    ExpressionKind::Negative(NegativeExpression::new(operand)),
                    span,
                ))
            }
            _ => self.parse_primary_expression(),
        }
    }

    /// Parse a primary expression.
    fn parse_primary_expression(&mut self) -> CompilationResult<Expression> {
        let start_token = self.consume().clone();
        match &start_token.kind {
            TokenKind::Integer(n) => Ok(Expression::new(
                ExpressionKind::Integer(*n),
                start_token.span,
            )),
            TokenKind::Float(f) => Ok(Expression::new(
                ExpressionKind::Float(*f),
                start_token.span,
            )),
            TokenKind::Word(word) if self.current().kind == TokenKind::LeftParen => {
                self.consume();
                let args = self.parse_call_arguments()?;
                Ok(Expression::new(
                    ExpressionKind::Call(CallExpression {
                        name: word.clone(),
                        args,
                    }),
                    self.get_span_from(&start_token.span),
                ))
            }
            TokenKind::Word(word) => Ok(Expression::new(
                ExpressionKind::Variable(word.clone()),
                start_token.span,
            )),
            TokenKind::LeftParen => {
                let inner = self.parse_binary_expression(None, 0)?;
                self.consume_and_expect(TokenKind::RightParen)?;
                Ok(Expression::new(
                    ExpressionKind::Parenthesized(ParenthesizedExpression::new(inner)),
                    self.get_span_from(&start_token.span),
                ))
            }
            other => Err(CompilationError::new_localized(
                format!("Expected an expression but found `{}`.", other),
                start_token.span,
            )),
        }
    }

    /// Parse `arg, arg, ...)` after the opening parenthesis of a call.
    fn parse_call_arguments(&mut self) -> CompilationResult<Vec<Expression>> {
        let mut args = vec![];
        if self.consume_if(TokenKind::RightParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_binary_expression(None, 0)?);
            if self.consume_if(TokenKind::Comma) {
                continue;
            }
            self.consume_and_expect(TokenKind::RightParen)?;
            return Ok(args);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::ast::AST;
    use crate::text::SourceText;

    fn parse(text: &str) -> CompilationResult<Expression> {
        AST::from_source(Rc::new(SourceText::from_str(text))).map(|ast| ast.expression)
    }

    /// Render with explicit parentheses to check the tree shape.
    fn shape(expr: &Expression) -> String {
        match &expr.kind {
            ExpressionKind::Integer(n) => n.to_string(),
            ExpressionKind::Float(f) => f.to_string(),
            ExpressionKind::Variable(v) => v.clone(),
            ExpressionKind::Binary(b) => {
                format!("({} {} {})", shape(&b.left), b.operator, shape(&b.right))
            }
            ExpressionKind::Negative(n) => format!("(-{})", shape(&n.expression)),
            ExpressionKind::Call(c) => format!(
                "{}[{}]",
                c.name,
                c.args.iter().map(shape).collect::<Vec<_>>().join(", ")
            ),
            ExpressionKind::Parenthesized(p) => shape(&p.expression),
        }
    }

    #[test]
    fn precedence() {
        let expr = parse("a + b * c - d").unwrap();
        assert_eq!(shape(&expr), "((a + (b * c)) - d)");
    }

    #[test]
    fn power_is_right_associative() {
        let expr = parse("x ** y ^ z").unwrap();
        assert_eq!(shape(&expr), "(x ** (y ** z))");
    }

    #[test]
    fn unary_minus_binds_looser_than_power() {
        assert_eq!(shape(&parse("-x**2").unwrap()), "(-(x ** 2))");
        assert_eq!(shape(&parse("-x*y").unwrap()), "((-x) * y)");
        assert_eq!(shape(&parse("2**-x").unwrap()), "(2 ** (-x))");
    }

    #[test]
    fn calls_and_parentheses() {
        let expr = parse("atan2(y, x) % (a + b)").unwrap();
        assert_eq!(shape(&expr), "(atan2[y, x] % (a + b))");
        assert_eq!(expr.span.text(), "atan2(y, x) % (a + b)");
    }

    #[test]
    fn implicit_multiplication_is_rejected() {
        let err = parse("2x").unwrap_err();
        assert!(err.is_parse_error());
        assert_eq!(
            err.to_string(),
            "invalid expression: Expected `end-of-expression` but found `word`."
        );
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = [
            format!("{}x{}", "(".repeat(100_000), ")".repeat(100_000)),
            format!("{}x", "-".repeat(100_000)),
            format!("x{}", "**x".repeat(100_000)),
            format!("{}x{}", "sin(".repeat(100_000), ")".repeat(100_000)),
            format!("x{}", " + x".repeat(100_000)),
        ];
        for text in &deep {
            let err = parse(text).unwrap_err();
            assert!(err.is_parse_error());
            assert_eq!(
                err.to_string(),
                "invalid expression: The expression nests deeper than 256 levels."
            );
        }

        let nested = format!("{}x{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(shape(&parse(&nested).unwrap()), "x");
        assert!(parse(&format!("{}x", "-".repeat(200))).is_ok());
    }

    #[test]
    fn malformed_inputs() {
        for text in ["", "   ", "x +", "(x", "sin(x,", "x $ y", "* 2", "f(,)"] {
            assert!(parse(text).is_err(), "`{text}` should not parse");
        }
    }
}
