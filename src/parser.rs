use crate::Span;
use crate::lexer::{LexerError, Token, TokenKind};
use crate::types::{Node, Sexpr};
use std::iter::Peekable;
use std::vec::IntoIter; // To iterate over Vec<Token>
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(
        "Parse Error [at {}]: Unexpected token '{}', expected {expected}",
        .found.span,
        .found.kind
    )]
    UnexpectedToken { found: Token, expected: String },
    #[error("Parse Error: Unexpected end of input during parsing. Expected {0}")]
    UnexpectedEof(String),
    #[error("Lexer Error during parse: {0}")]
    LexerError(#[from] LexerError),
}

type ParseResult<T> = Result<T, ParseError>;

pub struct Parser {
    tokens: Peekable<IntoIter<Token>>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens: tokens.into_iter().peekable(),
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        self.tokens.next()
    }

    /// Parses a single S-expression starting with `token`.
    fn parse_expr_with_token(&mut self, token: Option<Token>) -> ParseResult<Node> {
        match token {
            Some(Token {
                kind: TokenKind::LParen,
                span,
            }) => self.parse_list(span),
            Some(Token {
                kind: TokenKind::Quote,
                span,
            }) => self.parse_quoted_expr(span),
            Some(atom) => self.parse_atom(atom),
            None => Err(ParseError::UnexpectedEof("an expression".to_string())),
        }
    }

    pub fn parse_expr(&mut self) -> ParseResult<Node> {
        let token = self.next_token();
        self.parse_expr_with_token(token)
    }

    /// Parses an atomic expression (symbol, integer, boolean, string).
    fn parse_atom(&mut self, token: Token) -> ParseResult<Node> {
        Ok(Node::new(
            match token.kind {
                TokenKind::Symbol(s) => Sexpr::Symbol(s),
                TokenKind::Integer(n) => Sexpr::Integer(n),
                TokenKind::Boolean(b) => Sexpr::Boolean(b),
                TokenKind::String(s) => Sexpr::String(s),
                other_token => Err(ParseError::UnexpectedToken {
                    found: Token {
                        kind: other_token,
                        span: token.span,
                    },
                    expected: "an expression".to_string(),
                })?,
            },
            token.span,
        ))
    }

    /// Parses the rest of a list after its opening parenthesis.
    fn parse_list(&mut self, lparen_span: Span) -> ParseResult<Node> {
        let mut elements = Vec::new();
        loop {
            match self.next_token() {
                Some(Token {
                    kind: TokenKind::RParen,
                    span: rparen_span,
                }) => return Ok(Node::new_list(elements, lparen_span.merge(rparen_span))),
                Some(token) => elements.push(self.parse_expr_with_token(Some(token))?),
                None => return Err(ParseError::UnexpectedEof("')'".to_string())),
            }
        }
    }

    /// Parses a quoted expression `'expr` into `(quote expr)`.
    fn parse_quoted_expr(&mut self, quote_span: Span) -> ParseResult<Node> {
        let quoted_expr = self.parse_expr()?;
        Ok(Node::new_quoted_expr(quoted_expr, quote_span))
    }

    /// Parses exactly one top-level expression; trailing tokens are an error.
    pub fn parse(mut self) -> ParseResult<Node> {
        let expr = self.parse_expr()?;

        if let Some(found) = self.next_token() {
            Err(ParseError::UnexpectedToken {
                found,
                expected: "end of input".to_string(),
            })
        } else {
            Ok(expr)
        }
    }

    /// Parses every top-level expression until the tokens run out.
    pub fn parse_all(mut self) -> ParseResult<Vec<Node>> {
        let mut expressions = Vec::new();
        while self.tokens.peek().is_some() {
            expressions.push(self.parse_expr()?);
        }
        Ok(expressions)
    }
}

// Lex and parse a single expression
pub fn parse_str(input: &str) -> ParseResult<Node> {
    let tokens = crate::lexer::tokenize(input)?;
    Parser::new(tokens).parse()
}

// Lex and parse a whole program (zero or more expressions)
pub fn parse_program(input: &str) -> ParseResult<Vec<Node>> {
    let tokens = crate::lexer::tokenize(input)?;
    Parser::new(tokens).parse_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::LexerErrorKind;
    use pretty_assertions::assert_eq;

    fn assert_parse(input: &str, expected: Node) {
        match parse_str(input) {
            Ok(result) => assert_eq!(result, expected, "Input: '{}'", input),
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        }
    }

    fn assert_parse_error(input: &str, expected_error_variant: ParseError) {
        match parse_str(input) {
            Ok(result) => panic!(
                "Expected parsing to fail for input '{}', but got: {:?}",
                input, result
            ),
            Err(e) => {
                assert_eq!(
                    std::mem::discriminant(&e),
                    std::mem::discriminant(&expected_error_variant),
                    "Input: '{}', Expected error variant like {:?}, got: {:?}",
                    input,
                    expected_error_variant,
                    e
                );
            }
        }
    }

    // Round-trips through Display, which keeps the assertions readable.
    fn assert_parsed_sexpr_string(input: &str, expected_output: &str) {
        let node = match parse_str(input) {
            Ok(result) => result,
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        };
        assert_eq!(node.to_string(), expected_output, "Input: '{}'", input);
    }

    fn node_integer(n: i64, start: usize, end: usize) -> Node {
        Node::new_integer(n, Span::new(start, end))
    }

    fn node_symbol(s: &str, start: usize, end: usize) -> Node {
        Node::new_symbol(s, Span::new(start, end))
    }

    fn node_list(nodes: Vec<Node>, start: usize, end: usize) -> Node {
        Node::new_list(nodes, Span::new(start, end))
    }

    #[test]
    fn test_parse_atoms() {
        assert_parse("123", node_integer(123, 0, 3));
        assert_parse("-4", node_integer(-4, 0, 2));
        assert_parse("symbol", node_symbol("symbol", 0, 6));
        assert_parse("+", node_symbol("+", 0, 1));
        assert_parse("#t", Node::new_bool(true, Span::new(0, 2)));
        assert_parse("#f", Node::new_bool(false, Span::new(0, 2)));
        assert_parse(
            r#""hello world""#,
            Node::new_string("hello world", Span::new(0, 13)),
        );
    }

    #[test]
    fn test_parse_empty_list() {
        assert_parse("()", node_list(vec![], 0, 2));
        assert_parse("( )", node_list(vec![], 0, 3));
    }

    #[test]
    fn test_parse_simple_list() {
        assert_parse(
            "(+ 10 20)",
            node_list(
                vec![
                    node_symbol("+", 1, 2),
                    node_integer(10, 3, 5),
                    node_integer(20, 6, 8),
                ],
                0,
                9,
            ),
        );
    }

    #[test]
    fn test_parse_nested_list() {
        assert_parse(
            "(a (b c) d)",
            node_list(
                vec![
                    node_symbol("a", 1, 2),
                    node_list(vec![node_symbol("b", 4, 5), node_symbol("c", 6, 7)], 3, 8),
                    node_symbol("d", 9, 10),
                ],
                0,
                11,
            ),
        );
        assert_parsed_sexpr_string("(()())", "(() ())");
        assert_parsed_sexpr_string(
            "(define (f x) (* x x))",
            "(define (f x) (* x x))",
        );
    }

    #[test]
    fn test_parse_quote_sugar() {
        assert_parse(
            "'x",
            node_list(
                vec![node_symbol("quote", 0, 1), node_symbol("x", 1, 2)],
                0,
                2,
            ),
        );
        assert_parsed_sexpr_string("'(1 2)", "(quote (1 2))");
        assert_parsed_sexpr_string("''a", "(quote (quote a))");
        assert_parsed_sexpr_string("(cons 1 '())", "(cons 1 (quote ()))");
    }

    #[test]
    fn test_parse_with_comments() {
        assert_parsed_sexpr_string("; leading\n(+ 1 ; inner\n 2)", "(+ 1 2)");
    }

    #[test]
    fn test_parse_errors() {
        assert_parse_error("(", ParseError::UnexpectedEof(String::new()));
        assert_parse_error("(1 (2)", ParseError::UnexpectedEof(String::new()));
        assert_parse_error("'", ParseError::UnexpectedEof(String::new()));
        assert_parse_error("", ParseError::UnexpectedEof(String::new()));
        assert_parse_error(
            ")",
            ParseError::UnexpectedToken {
                found: Token {
                    kind: TokenKind::RParen,
                    span: Span::new(0, 1),
                },
                expected: String::new(),
            },
        );
        assert_parse_error(
            "1 2",
            ParseError::UnexpectedToken {
                found: Token {
                    kind: TokenKind::Integer(2),
                    span: Span::new(2, 3),
                },
                expected: String::new(),
            },
        );
    }

    #[test]
    fn test_parse_lexer_error() {
        match parse_str(r#"(print "oops)"#) {
            Err(ParseError::LexerError(LexerError { error, .. })) => {
                assert_eq!(error, LexerErrorKind::UnterminatedString)
            }
            other => panic!("Expected lexer error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_program() {
        let program = parse_program("(define x 1)\n; comment\nx 'y").unwrap();
        let printed: Vec<String> = program.iter().map(|n| n.to_string()).collect();
        assert_eq!(printed, vec!["(define x 1)", "x", "(quote y)"]);
        assert!(parse_program("  ; nothing here\n").unwrap().is_empty());
        assert!(parse_program("(a) (b").is_err());
    }
}
