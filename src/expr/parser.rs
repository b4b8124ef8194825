use crate::expr::ast::*;
use crate::expr::lexer::{Lexer, Span, Token, TokenKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token: expected {expected}, found {found} at {span:?}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("Unexpected end of expression: expected {expected}")]
    UnexpectedEof { expected: String, span: Span },
    #[error("Unrecognized character '{text}' at {span:?}")]
    InvalidCharacter { text: String, span: Span },
    #[error("Unknown function '{name}' at {span:?}")]
    UnknownFunction { name: String, span: Span },
    #[error("{function} expects {expected} argument(s), found {found} at {span:?}")]
    WrongArity {
        function: Function,
        expected: String,
        found: usize,
        span: Span,
    },
    #[error("Empty expression")]
    Empty,
}

impl ParseError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::UnexpectedToken { span, .. }
            | ParseError::UnexpectedEof { span, .. }
            | ParseError::InvalidCharacter { span, .. }
            | ParseError::UnknownFunction { span, .. }
            | ParseError::WrongArity { span, .. } => Some(*span),
            ParseError::Empty => None,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse a complete expression
pub fn parse(source: &str) -> ParseResult<Expr> {
    Parser::new(source).parse()
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self { lexer, current }
    }

    /// Parse the whole input as one expression; trailing tokens are an error
    pub fn parse(&mut self) -> ParseResult<Expr> {
        if self.is_at_end() {
            return Err(ParseError::Empty);
        }
        let expr = self.parse_expression()?;
        if !self.is_at_end() {
            return Err(self.unexpected("end of expression"));
        }
        Ok(expr)
    }

    // ==================== Helper Methods ====================

    fn is_at_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        std::mem::replace(&mut self.current, self.lexer.next_token())
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn consume(&mut self, kind: &TokenKind, expected: &str) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn current_span(&self) -> Span {
        self.current.span
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match &self.current.kind {
            TokenKind::Eof => ParseError::UnexpectedEof {
                expected: expected.to_string(),
                span: self.current.span,
            },
            TokenKind::Invalid(text) => ParseError::InvalidCharacter {
                text: text.clone(),
                span: self.current.span,
            },
            other => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: other.to_string(),
                span: self.current.span,
            },
        }
    }

    fn binary(left: Expr, operator: BinaryOp, right: Expr) -> Expr {
        let span = left.span().merge(right.span());
        Expr::Binary(Box::new(BinaryExpr {
            left,
            operator,
            right,
            span,
        }))
    }

    // ==================== Expressions ====================

    fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_and()?;

        while self.match_token(&TokenKind::OrOr) {
            let right = self.parse_and()?;
            left = Self::binary(left, BinaryOp::Or, right);
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_equality()?;

        while self.match_token(&TokenKind::AndAnd) {
            let right = self.parse_equality()?;
            left = Self::binary(left, BinaryOp::And, right);
        }

        Ok(left)
    }

    fn parse_equality(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_relational()?;

        loop {
            let op = match &self.current.kind {
                TokenKind::EqEq => Some(BinaryOp::Equal),
                TokenKind::NotEq => Some(BinaryOp::NotEqual),
                _ => None,
            };

            if let Some(operator) = op {
                self.advance();
                let right = self.parse_relational()?;
                left = Self::binary(left, operator, right);
            } else {
                break;
            }
        }

        Ok(left)
    }

    fn parse_relational(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match &self.current.kind {
                TokenKind::Lt => Some(BinaryOp::LessThan),
                TokenKind::Gt => Some(BinaryOp::GreaterThan),
                TokenKind::LtEq => Some(BinaryOp::LessOrEqual),
                TokenKind::GtEq => Some(BinaryOp::GreaterOrEqual),
                TokenKind::In => Some(BinaryOp::In),
                TokenKind::Includes => Some(BinaryOp::Includes),
                TokenKind::Contains => Some(BinaryOp::Contains),
                TokenKind::StartsWith => Some(BinaryOp::StartsWith),
                _ => None,
            };

            if let Some(operator) = op {
                self.advance();
                let right = self.parse_additive()?;
                left = Self::binary(left, operator, right);
            } else {
                break;
            }
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match &self.current.kind {
                TokenKind::Plus => Some(BinaryOp::Add),
                TokenKind::Minus => Some(BinaryOp::Subtract),
                _ => None,
            };

            if let Some(operator) = op {
                self.advance();
                let right = self.parse_multiplicative()?;
                left = Self::binary(left, operator, right);
            } else {
                break;
            }
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match &self.current.kind {
                TokenKind::Star => Some(BinaryOp::Multiply),
                TokenKind::Slash => Some(BinaryOp::Divide),
                TokenKind::Percent => Some(BinaryOp::Modulo),
                _ => None,
            };

            if let Some(operator) = op {
                self.advance();
                let right = self.parse_unary()?;
                left = Self::binary(left, operator, right);
            } else {
                break;
            }
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let start = self.current_span();

        let op = match &self.current.kind {
            TokenKind::Not | TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Negate),
            _ => None,
        };

        if let Some(operator) = op {
            self.advance();
            let operand = self.parse_unary()?;
            let span = start.merge(operand.span());
            return Ok(Expr::Unary(Box::new(UnaryExpr {
                operator,
                operand,
                span,
            })));
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let start = self.current_span();

        match &self.current.kind {
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Null(start))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Boolean(true, start))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Boolean(false, start))
            }
            TokenKind::Number(n) => {
                let n = *n;
                self.advance();
                Ok(Expr::Number(n, start))
            }
            TokenKind::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(Expr::String(s, start))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.consume(&TokenKind::RParen, ")")?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                let items = self.parse_list(&TokenKind::RBracket)?;
                let end = self.consume(&TokenKind::RBracket, "]")?.span;
                Ok(Expr::Array(items, start.merge(end)))
            }
            // Membership keywords double as functions: CONTAINS(a, "x")
            TokenKind::In | TokenKind::Includes | TokenKind::Contains | TokenKind::StartsWith => {
                let name = self.current.kind.to_string();
                self.advance();
                if !self.check(&TokenKind::LParen) {
                    return Err(self.unexpected("("));
                }
                self.parse_call(name, start)
            }
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                if self.check(&TokenKind::LParen) {
                    self.parse_call(name, start)
                } else {
                    Ok(Expr::Field(name, start))
                }
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_call(&mut self, name: String, start: Span) -> ParseResult<Expr> {
        let function = Function::from_name(&name).ok_or(ParseError::UnknownFunction {
            name,
            span: start,
        })?;
        self.consume(&TokenKind::LParen, "(")?;
        let arguments = self.parse_list(&TokenKind::RParen)?;
        let end = self.consume(&TokenKind::RParen, ")")?.span;
        let span = start.merge(end);

        let (min, max) = function.arity();
        let count = arguments.len();
        if count < min || max.is_some_and(|max| count > max) {
            let expected = match max {
                Some(max) if max == min => min.to_string(),
                Some(max) => format!("{}-{}", min, max),
                None => format!("at least {}", min),
            };
            return Err(ParseError::WrongArity {
                function,
                expected,
                found: count,
                span,
            });
        }

        Ok(Expr::Call(Box::new(CallExpr {
            function,
            arguments,
            span,
        })))
    }

    fn parse_list(&mut self, close: &TokenKind) -> ParseResult<Vec<Expr>> {
        let mut items = Vec::new();

        if self.check(close) {
            return Ok(items);
        }

        loop {
            items.push(self.parse_expression()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_op(expr: &Expr) -> BinaryOp {
        match expr {
            Expr::Binary(binary) => binary.operator,
            other => panic!("expected binary expression, got {:?}", other),
        }
    }

    #[test]
    fn test_or_binds_looser_than_and() {
        let expr = parse("a || b && c").unwrap();
        assert_eq!(binary_op(&expr), BinaryOp::Or);
        if let Expr::Binary(binary) = &expr {
            assert_eq!(binary_op(&binary.right), BinaryOp::And);
        }
    }

    #[test]
    fn test_multiplication_binds_tighter_than_addition() {
        let expr = parse("1 + 2 * 3").unwrap();
        assert_eq!(binary_op(&expr), BinaryOp::Add);
        if let Expr::Binary(binary) = &expr {
            assert_eq!(binary_op(&binary.right), BinaryOp::Multiply);
        }
    }

    #[test]
    fn test_membership_is_relational() {
        let expr = parse("status IN [\"A\", \"B\"] && amount > 5").unwrap();
        assert_eq!(binary_op(&expr), BinaryOp::And);
        if let Expr::Binary(binary) = &expr {
            assert_eq!(binary_op(&binary.left), BinaryOp::In);
            assert_eq!(binary_op(&binary.right), BinaryOp::GreaterThan);
        }
    }

    #[test]
    fn test_contains_call_form() {
        let expr = parse("CONTAINS(name, \"x\")").unwrap();
        match expr {
            Expr::Call(call) => {
                assert_eq!(call.function, Function::Contains);
                assert_eq!(call.arguments.len(), 2);
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_not_prefix() {
        let expr = parse("NOT (a == 1)").unwrap();
        assert!(matches!(expr, Expr::Unary(ref u) if u.operator == UnaryOp::Not));
    }

    #[test]
    fn test_unknown_function() {
        let err = parse("FOO(1)").unwrap_err();
        assert!(matches!(err, ParseError::UnknownFunction { ref name, .. } if name == "FOO"));
    }

    #[test]
    fn test_function_names_are_case_sensitive() {
        assert!(matches!(
            parse("upper(a)").unwrap_err(),
            ParseError::UnknownFunction { .. }
        ));
    }

    #[test]
    fn test_wrong_arity() {
        let err = parse("IF(a, b)").unwrap_err();
        assert!(matches!(err, ParseError::WrongArity { found: 2, .. }));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(matches!(
            parse("a b").unwrap_err(),
            ParseError::UnexpectedToken { .. }
        ));
    }

    #[test]
    fn test_unclosed_paren() {
        assert!(matches!(
            parse("(a == 1").unwrap_err(),
            ParseError::UnexpectedEof { .. }
        ));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse("   ").unwrap_err(), ParseError::Empty);
    }

    #[test]
    fn test_spans_cover_subexpression() {
        let source = "a + LEN(b)";
        let expr = parse(source).unwrap();
        if let Expr::Binary(binary) = &expr {
            assert_eq!(binary.right.span().snippet(source), "LEN(b)");
        }
        assert_eq!(expr.span().snippet(source), source);
    }
}
