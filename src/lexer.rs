use logos::Logos;
use std::fmt;
use thiserror::Error;

use crate::Span;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")] // Skip whitespace
#[logos(skip r";[^\n\r]*")] // Skip comments
#[logos(error = LexerErrorKind)]
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("'")]
    Quote,
    #[regex(r"[\p{Extended_Pictographic}.a-zA-Z0-9!#$%&*/:<=>?~_^+-]+", |lex| lex.slice().to_string())]
    Symbol(String),
    #[regex(r"[-+]?[0-9]+", |lex| {
        let slice = lex.slice();
        slice
            .parse::<i64>()
            .map_err(|_| LexerErrorKind::InvalidNumberFormat(slice.to_string()))
    }, priority = 3)]
    Integer(i64),
    #[token("#t", |_| true)]
    #[token("#f", |_| false)]
    Boolean(bool), // #t, #f
    #[regex(r#""([^"\\]|\\.)*.?"#, |lex| {
        let slice = lex.slice();
        // make sure string was terminated
        if slice.len() < 2 || !slice.ends_with('"') {
            return Err(LexerErrorKind::UnterminatedString);
        }
        unescape::unescape(&slice[1..slice.len()-1])
    })]
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

mod unescape {
    use super::{LexerErrorKind, LexerResult};

    pub fn unescape(s: &str) -> LexerResult<String> {
        // un-escaping should only ever reduce the length of the string.
        let mut result = String::with_capacity(s.len());
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some('n') => result.push('\n'),
                    Some('r') => result.push('\r'),
                    Some('t') => result.push('\t'),
                    Some('\\') => result.push('\\'),
                    Some('"') => result.push('"'),
                    Some(c) => return Err(LexerErrorKind::UnknownEscapeSequence(c)),
                    None => return Err(LexerErrorKind::UnterminatedString),
                }
            } else {
                result.push(c);
            }
        }
        Ok(result)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Quote => write!(f, "'"),
            TokenKind::Symbol(s) => write!(f, "{}", s),
            TokenKind::Integer(n) => write!(f, "{}", n),
            TokenKind::Boolean(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            TokenKind::String(s) => write!(f, "\"{}\"", s), // Display with quotes for clarity
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Error)]
pub enum LexerErrorKind {
    #[error("Unterminated string literal")]
    UnterminatedString,
    #[error("Invalid number format: '{0}'")]
    InvalidNumberFormat(String),
    #[error("Unknown escape sequence: '\\{0}'")]
    UnknownEscapeSequence(char),
    #[default]
    #[error("Invalid Token")]
    InvalidToken,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct LexerError {
    pub error: LexerErrorKind,
    pub span: Span,
}

type LexerResult<T> = Result<T, LexerErrorKind>;

type LexerRangedResult<T> = Result<T, LexerError>;

// Tokenizes a whole input string (used by the parser, the REPL completer and benches)
pub fn tokenize(input: &str) -> LexerRangedResult<Vec<Token>> {
    TokenKind::lexer(input)
        .spanned()
        .map(|(result, range)| {
            let span = Span::new(range.start, range.end);
            match result {
                Ok(kind) => Ok(Token { kind, span }),
                Err(error) => Err(LexerError { error, span }),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Helper to simplify testing token sequences
    fn assert_tokens(input: &str, expected: Vec<TokenKind>) {
        match tokenize(input) {
            Ok(tokens) => {
                let kinds: Vec<TokenKind> = tokens.into_iter().map(|t| t.kind).collect();
                assert_eq!(kinds, expected, "Input: '{}'", input);
            }
            Err(e) => panic!("Lexing failed for input '{}': {}", input, e.error),
        }
    }

    // Helper to simplify testing for lexer errors
    fn assert_lexer_error(input: &str, expected_error_variant: LexerErrorKind) {
        match tokenize(input) {
            Ok(tokens) => panic!(
                "Expected lexing to fail for input '{}', but got tokens: {:?}",
                input, tokens
            ),
            Err(e) => {
                assert_eq!(
                    std::mem::discriminant(&e.error),
                    std::mem::discriminant(&expected_error_variant),
                    "Input: '{}', Expected error variant like {:?}, got: {:?}",
                    input,
                    expected_error_variant,
                    e
                );
            }
        }
    }

    fn sym(s: &str) -> TokenKind {
        TokenKind::Symbol(s.to_string())
    }

    #[test]
    fn test_empty_input() {
        assert_tokens("", vec![]);
        assert_tokens("   \n\t ", vec![]);
    }

    #[test]
    fn test_parentheses_and_quote() {
        assert_tokens("()", vec![TokenKind::LParen, TokenKind::RParen]);
        assert_tokens("( )", vec![TokenKind::LParen, TokenKind::RParen]);
        assert_tokens(
            "'(a)",
            vec![
                TokenKind::Quote,
                TokenKind::LParen,
                sym("a"),
                TokenKind::RParen,
            ],
        );
    }

    #[test]
    fn test_integers() {
        assert_tokens("42", vec![TokenKind::Integer(42)]);
        assert_tokens("-17", vec![TokenKind::Integer(-17)]);
        assert_tokens("+3", vec![TokenKind::Integer(3)]);
        assert_tokens("0", vec![TokenKind::Integer(0)]);
    }

    #[test]
    fn test_integer_overflow() {
        assert_lexer_error(
            "99999999999999999999",
            LexerErrorKind::InvalidNumberFormat(String::new()),
        );
    }

    #[test]
    fn test_symbols() {
        assert_tokens("foo", vec![sym("foo")]);
        assert_tokens("+", vec![sym("+")]);
        assert_tokens("-", vec![sym("-")]);
        assert_tokens("mod", vec![sym("mod")]);
        assert_tokens("<=", vec![sym("<=")]);
        assert_tokens("list->string?", vec![sym("list->string?")]);
        // Longer match wins over the integer rule
        assert_tokens("1+", vec![sym("1+")]);
    }

    #[test]
    fn test_booleans() {
        assert_tokens("#t #f", vec![TokenKind::Boolean(true), TokenKind::Boolean(false)]);
    }

    #[test]
    fn test_strings() {
        assert_tokens(r#""hello""#, vec![TokenKind::String("hello".to_string())]);
        assert_tokens(r#""""#, vec![TokenKind::String(String::new())]);
        assert_tokens(
            r#""a \"quoted\" word\n""#,
            vec![TokenKind::String("a \"quoted\" word\n".to_string())],
        );
        assert_tokens(
            "\"spans\nlines\"",
            vec![TokenKind::String("spans\nlines".to_string())],
        );
    }

    #[test]
    fn test_string_errors() {
        assert_lexer_error(r#""no end"#, LexerErrorKind::UnterminatedString);
        assert_lexer_error(r#""bad \q""#, LexerErrorKind::UnknownEscapeSequence('q'));
    }

    #[test]
    fn test_unterminated_string_ending_in_multibyte_char() {
        assert_lexer_error("\"é", LexerErrorKind::UnterminatedString);
        assert_lexer_error("(head \"café", LexerErrorKind::UnterminatedString);
        assert_tokens("\"café\"", vec![TokenKind::String("café".to_string())]);
    }

    #[test]
    fn test_comments() {
        assert_tokens(
            "; a comment\n(+ 1 2) ; trailing\n;",
            vec![
                TokenKind::LParen,
                sym("+"),
                TokenKind::Integer(1),
                TokenKind::Integer(2),
                TokenKind::RParen,
            ],
        );
    }

    #[test]
    fn test_spans() {
        let tokens = tokenize("(define x 10)").unwrap();
        let spans: Vec<Span> = tokens.iter().map(|t| t.span).collect();
        assert_eq!(
            spans,
            vec![
                Span::new(0, 1),
                Span::new(1, 7),
                Span::new(8, 9),
                Span::new(10, 12),
                Span::new(12, 13),
            ]
        );
    }

    #[test]
    fn test_invalid_character() {
        assert_lexer_error("[", LexerErrorKind::InvalidToken);
    }
}
