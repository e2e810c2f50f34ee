use crate::{Error, EvalError, ParseError, Sexpr, Span};
use ariadne::{Label, Report, ReportKind, Source};
use std::io;
use std::ops::Range;

type SourceSpan<'a> = (&'a str, Range<usize>);

fn build_report<'a>(
    source_id: &'a str,
    input: &str,
    span: Span,
    message: String,
    label: String,
) -> Report<'a, SourceSpan<'a>> {
    let range = span.clamp(input.len()).to_range();
    Report::build(ReportKind::Error, (source_id, range.clone()))
        .with_message(message)
        .with_label(Label::new((source_id, range)).with_message(label))
        .finish()
}

// "an integer", "a list"
fn a(sexpr: &Sexpr) -> String {
    let name = sexpr.type_name();
    match name.chars().next() {
        Some('a' | 'e' | 'i' | 'o' | 'u') => format!("an {name}"),
        _ => format!("a {name}"),
    }
}

impl EvalError {
    pub fn report<'a>(&self, source_id: &'a str, input: &str) -> Report<'a, SourceSpan<'a>> {
        let label = match self {
            EvalError::EmptyExpression(_) => {
                "The empty list is only valid as data, quote it: '()".to_string()
            }
            EvalError::UnboundSymbol(..) => {
                "This symbol is not defined in the current scope".to_string()
            }
            EvalError::AlreadyDefined(..) => {
                "Already bound in this frame; bind it in a let or function to shadow it"
                    .to_string()
            }
            EvalError::ArityError { expected, .. } => {
                format!("Expected {} operand(s) here", expected)
            }
            EvalError::NotASymbol(sexpr, _) => {
                format!("Expected a symbol but found {}", a(sexpr))
            }
            EvalError::NotAList { found, .. } => {
                format!("Expected a list but found {}", a(found))
            }
            EvalError::NotANumber { found, .. } => {
                format!("Expected an integer but found {}", a(found))
            }
            EvalError::NotAFunction(sexpr, _) => {
                format!("This evaluates to {}, which cannot be called", a(sexpr))
            }
            EvalError::NotAListOrString { found, .. } => {
                format!("Expected a list or string but found {}", a(found))
            }
            EvalError::EmptyValue { .. } => "This is empty".to_string(),
            EvalError::ArithmeticError { message, .. } => message.clone(),
        };
        build_report(source_id, input, self.span(), self.to_string(), label)
    }

    pub fn pretty_print(&self, source_id: &str, input: &str) -> io::Result<()> {
        self.report(source_id, input)
            .eprint((source_id, Source::from(input)))
    }
}

impl ParseError {
    pub fn report<'a>(&self, source_id: &'a str, input: &str) -> Report<'a, SourceSpan<'a>> {
        match self {
            ParseError::UnexpectedToken { found, expected } => build_report(
                source_id,
                input,
                found.span,
                format!("Unexpected token: {}", found.kind),
                format!("Expected {expected}"),
            ),
            ParseError::UnexpectedEof(expected) => {
                let idx = input.len();
                build_report(
                    source_id,
                    input,
                    Span::new(idx, idx),
                    "Unexpected EOF".to_string(),
                    format!("Expected {expected}"),
                )
            }
            ParseError::LexerError(lex_err) => build_report(
                source_id,
                input,
                lex_err.span,
                "Lexer Error".to_string(),
                lex_err.error.to_string(),
            ),
        }
    }

    pub fn pretty_print(&self, source_id: &str, input: &str) -> io::Result<()> {
        self.report(source_id, input)
            .eprint((source_id, Source::from(input)))
    }
}

impl Error {
    /// Prints a diagnostic for `input`; errors without a location are printed plainly.
    pub fn pretty_print(&self, source_id: &str, input: &str) -> io::Result<()> {
        match self {
            Error::Parse(err) => err.pretty_print(source_id, input),
            Error::Eval(err) => err.pretty_print(source_id, input),
            Error::Io { .. } => {
                eprintln!("Error: {}", self);
                Ok(())
            }
        }
    }
}
