use crate::environment::Environment;
use crate::source::Span;
use std::cell::RefCell;
use std::fmt; // For custom display formatting
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: Sexpr, // The actual S-expression data
    pub span: Span,  // The source span it covers
}

impl Node {
    pub fn new(kind: Sexpr, span: Span) -> Self {
        Node { kind, span }
    }

    pub fn new_integer(n: i64, span: Span) -> Self {
        Node::new(Sexpr::Integer(n), span)
    }

    pub fn new_bool(b: bool, span: Span) -> Self {
        Node::new(Sexpr::Boolean(b), span)
    }

    pub fn new_string(s: impl Into<String>, span: Span) -> Self {
        Node::new(Sexpr::String(s.into()), span)
    }

    pub fn new_symbol(s: impl Into<String>, span: Span) -> Self {
        Node::new(Sexpr::Symbol(s.into()), span)
    }

    pub fn new_list(elements: Vec<Node>, span: Span) -> Self {
        Node::new(Sexpr::List(elements), span)
    }

    /// Replaces every span in the tree with `Span::DETACHED`.
    pub fn detach(&mut self) {
        self.span = Span::DETACHED;
        if let Sexpr::List(elements) = &mut self.kind {
            elements.iter_mut().for_each(Node::detach);
        }
    }

    /// Builds `(quote expr)`, as produced by the reader for `'expr`.
    pub fn new_quoted_expr(expr: Node, quote_span: Span) -> Self {
        let span = quote_span.merge(expr.span);
        Node::new_list(vec![Node::new_symbol("quote", quote_span), expr], span)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Delegate to Sexpr's Display implementation
        write!(f, "{}", self.kind)
    }
}

/// A DIY Lang value. The same type is used for code (the AST handed to the
/// evaluator) and for data (the values it produces).
#[derive(Debug, Clone, PartialEq)]
pub enum Sexpr {
    Symbol(String),  // e.g., +, variable-name, quote
    Integer(i64),    // No numeric tower, integers only
    Boolean(bool),   // #t or #f
    String(String),  // For string literals "hello\n"
    List(Vec<Node>), // e.g., (+ 1 2), (define x 10), and () for the empty list
    Closure(Closure),
}

impl Sexpr {
    /// Everything except a list, empty or not, is an atom.
    pub fn is_atom(&self) -> bool {
        !matches!(self, Sexpr::List(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Sexpr::Integer(_) => "integer",
            Sexpr::Symbol(_) => "symbol",
            Sexpr::Boolean(_) => "boolean",
            Sexpr::String(_) => "string",
            Sexpr::List(_) => "list",
            Sexpr::Closure(_) => "closure",
        }
    }
}

// Implement Display trait for pretty printing the Sexpr values
impl fmt::Display for Sexpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexpr::Symbol(s) => write!(f, "{}", s),
            Sexpr::Integer(n) => write!(f, "{}", n),
            Sexpr::Boolean(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Sexpr::List(list) => {
                write!(f, "(")?;
                let mut first = true;
                for expr in list {
                    if !first {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", expr)?;
                    first = false;
                }
                write!(f, ")")
            }
            Sexpr::String(str) => {
                write!(
                    f,
                    "\"{}\"",
                    str.chars().fold(String::new(), |mut acc, char| {
                        match char {
                            '"' => acc.push_str("\\\""),
                            '\\' => acc.push_str("\\\\"),
                            '\n' => acc.push_str("\\n"),
                            '\r' => acc.push_str("\\r"),
                            '\t' => acc.push_str("\\t"),
                            c => acc.push(c),
                        }
                        acc
                    })
                )
            }
            Sexpr::Closure(closure) => write!(f, "<closure/{}>", closure.params.len()),
        }
    }
}

/// A function value: parameter names and an unevaluated body, paired with
/// the environment that was active when the `lambda` was evaluated.
#[derive(Clone)]
pub struct Closure {
    pub env: Rc<RefCell<Environment>>,
    pub params: Rc<[String]>,
    pub body: Rc<Node>,
}

impl Closure {
    pub fn new(env: Rc<RefCell<Environment>>, params: Vec<String>, body: Node) -> Self {
        Closure {
            env,
            params: params.into(),
            body: Rc::new(body),
        }
    }
}

// The captured environment usually holds the closure itself (after a
// `define`), so neither Debug nor PartialEq may descend into it.
impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("params", &self.params)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Closure {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.env, &other.env)
            && self.params == other.params
            && self.body == other.body
    }
}
