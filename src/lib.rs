// Declare modules publicly so they are part of the library interface
pub mod environment;
pub mod evaluator;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod pretty_print;
pub mod primitives;
pub mod source;
pub mod types;

pub use environment::{EnvError, Environment};
pub use evaluator::{EvalError, EvalResult, SpecialForm, evaluate};
pub use interpreter::{Error, interpret, interpret_each, interpret_file, read_source};
pub use lexer::{LexerError, Token, TokenKind, tokenize};
pub use parser::{ParseError, Parser, parse_program, parse_str};
pub use source::Span;
pub use types::{Closure, Node, Sexpr};
