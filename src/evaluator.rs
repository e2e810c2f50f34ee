use crate::environment::{EnvError, Environment};
use crate::primitives;
use crate::source::Span;
use crate::types::{Closure, Node, Sexpr};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, trace};

// --- Evaluation Error ---
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("Cannot evaluate empty expression")]
    EmptyExpression(Span),
    #[error("Symbol '{0}' not found in env")]
    UnboundSymbol(String, Span),
    #[error("Symbol '{0}' is already defined in this scope")]
    AlreadyDefined(String, Span),
    #[error("Wrong number of arguments to '{name}': expected {expected}, got {found}")]
    ArityError {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("{0} is not a symbol")]
    NotASymbol(Sexpr, Span),
    #[error("'{context}' expects a list, got {found}")]
    NotAList {
        context: String,
        found: Sexpr,
        span: Span,
    },
    #[error("'{operator}' is only supported for integers, got {found}")]
    NotANumber {
        operator: String,
        found: Sexpr,
        span: Span,
    },
    #[error("{0} is not a function")]
    NotAFunction(Sexpr, Span),
    #[error("'{operator}' expects a list or a string, got {found}")]
    NotAListOrString {
        operator: String,
        found: Sexpr,
        span: Span,
    },
    #[error("'{operator}' applied to an empty list or string")]
    EmptyValue { operator: String, span: Span },
    #[error("'{operator}' failed: {message}")]
    ArithmeticError {
        operator: String,
        message: String,
        span: Span,
    },
}

impl EvalError {
    /// The source location the error refers to.
    pub fn span(&self) -> Span {
        match self {
            EvalError::EmptyExpression(span)
            | EvalError::UnboundSymbol(_, span)
            | EvalError::AlreadyDefined(_, span)
            | EvalError::NotASymbol(_, span)
            | EvalError::NotAFunction(_, span)
            | EvalError::ArityError { span, .. }
            | EvalError::NotAList { span, .. }
            | EvalError::NotANumber { span, .. }
            | EvalError::NotAListOrString { span, .. }
            | EvalError::EmptyValue { span, .. }
            | EvalError::ArithmeticError { span, .. } => *span,
        }
    }

    fn span_mut(&mut self) -> &mut Span {
        match self {
            EvalError::EmptyExpression(span)
            | EvalError::UnboundSymbol(_, span)
            | EvalError::AlreadyDefined(_, span)
            | EvalError::NotASymbol(_, span)
            | EvalError::NotAFunction(_, span)
            | EvalError::ArityError { span, .. }
            | EvalError::NotAList { span, .. }
            | EvalError::NotANumber { span, .. }
            | EvalError::NotAListOrString { span, .. }
            | EvalError::EmptyValue { span, .. }
            | EvalError::ArithmeticError { span, .. } => span,
        }
    }

    // Errors from detached code (the prelude) are reported at `span` instead
    fn attach_to(mut self, span: Span) -> Self {
        if self.span().is_detached() {
            *self.span_mut() = span;
        }
        self
    }
}

// Environment errors surface as the matching flat variant
impl From<EnvError> for EvalError {
    fn from(err: EnvError) -> Self {
        match err {
            EnvError::UnboundSymbol(name, span) => EvalError::UnboundSymbol(name, span),
            EnvError::AlreadyDefined(name, span) => EvalError::AlreadyDefined(name, span),
        }
    }
}

// Result type alias for convenience
pub type EvalResult<T = Node> = Result<T, EvalError>;

// --- Special Forms ---

/// Keywords with evaluator-defined semantics. A list headed by one of these
/// symbols is never treated as a function call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialForm {
    Define,
    Lambda,
    Defn,
    Quote,
    Atom,
    If,
    Cond,
    Let,
    Eq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    GreaterThan,
    Cons,
    Head,
    Tail,
    Empty,
}

impl SpecialForm {
    pub const ALL: [SpecialForm; 19] = [
        SpecialForm::Define,
        SpecialForm::Lambda,
        SpecialForm::Defn,
        SpecialForm::Quote,
        SpecialForm::Atom,
        SpecialForm::If,
        SpecialForm::Cond,
        SpecialForm::Let,
        SpecialForm::Eq,
        SpecialForm::Add,
        SpecialForm::Sub,
        SpecialForm::Mul,
        SpecialForm::Div,
        SpecialForm::Mod,
        SpecialForm::GreaterThan,
        SpecialForm::Cons,
        SpecialForm::Head,
        SpecialForm::Tail,
        SpecialForm::Empty,
    ];

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "define" => SpecialForm::Define,
            "lambda" => SpecialForm::Lambda,
            "defn" => SpecialForm::Defn,
            "quote" => SpecialForm::Quote,
            "atom" => SpecialForm::Atom,
            "if" => SpecialForm::If,
            "cond" => SpecialForm::Cond,
            "let" => SpecialForm::Let,
            "eq" => SpecialForm::Eq,
            "+" => SpecialForm::Add,
            "-" => SpecialForm::Sub,
            "*" => SpecialForm::Mul,
            "/" => SpecialForm::Div,
            "mod" => SpecialForm::Mod,
            ">" => SpecialForm::GreaterThan,
            "cons" => SpecialForm::Cons,
            "head" => SpecialForm::Head,
            "tail" => SpecialForm::Tail,
            "empty" => SpecialForm::Empty,
            _ => return None,
        })
    }

    pub fn keyword(self) -> &'static str {
        match self {
            SpecialForm::Define => "define",
            SpecialForm::Lambda => "lambda",
            SpecialForm::Defn => "defn",
            SpecialForm::Quote => "quote",
            SpecialForm::Atom => "atom",
            SpecialForm::If => "if",
            SpecialForm::Cond => "cond",
            SpecialForm::Let => "let",
            SpecialForm::Eq => "eq",
            SpecialForm::Add => "+",
            SpecialForm::Sub => "-",
            SpecialForm::Mul => "*",
            SpecialForm::Div => "/",
            SpecialForm::Mod => "mod",
            SpecialForm::GreaterThan => ">",
            SpecialForm::Cons => "cons",
            SpecialForm::Head => "head",
            SpecialForm::Tail => "tail",
            SpecialForm::Empty => "empty",
        }
    }
}

/// All special form keywords, for REPL completion.
pub fn special_form_identifiers() -> HashSet<String> {
    SpecialForm::ALL
        .iter()
        .map(|form| form.keyword().to_string())
        .collect()
}

// --- Evaluate Function ---

/// Evaluates a given AST Node within the specified environment.
pub fn evaluate(node: &Node, env: &Rc<RefCell<Environment>>) -> EvalResult {
    match &node.kind {
        Sexpr::List(elements) => match elements.split_first() {
            None => Err(EvalError::EmptyExpression(node.span)),
            Some((first, rest)) => {
                if let Sexpr::Symbol(name) = &first.kind
                    && let Some(form) = SpecialForm::from_keyword(name)
                {
                    evaluate_special_form(form, rest, env, node.span)
                } else {
                    evaluate_application(first, rest, env, node.span)
                }
            }
        },

        Sexpr::Symbol(name) => Ok(env.borrow().get(name, node.span)?),

        // Everything else evaluates to itself, closures included
        Sexpr::Integer(_) | Sexpr::Boolean(_) | Sexpr::String(_) | Sexpr::Closure(_) => {
            Ok(node.clone())
        }
    }
}

/// Checks the operand count of a form before anything is evaluated.
fn expect_operands<'a, const N: usize>(
    name: &str,
    operands: &'a [Node],
    span: Span,
) -> EvalResult<&'a [Node; N]> {
    <&[Node; N]>::try_from(operands).map_err(|_| EvalError::ArityError {
        name: name.to_string(),
        expected: N,
        found: operands.len(),
        span,
    })
}

fn expect_symbol(node: &Node) -> EvalResult<&str> {
    match &node.kind {
        Sexpr::Symbol(name) => Ok(name),
        other => Err(EvalError::NotASymbol(other.clone(), node.span)),
    }
}

fn expect_list<'a>(node: &'a Node, context: &str) -> EvalResult<&'a [Node]> {
    match &node.kind {
        Sexpr::List(items) => Ok(items),
        other => Err(EvalError::NotAList {
            context: context.to_string(),
            found: other.clone(),
            span: node.span,
        }),
    }
}

// A `cond` clause or a `let` binding: a two element list
fn expect_pair<'a>(node: &'a Node, context: &str) -> EvalResult<&'a [Node; 2]> {
    expect_operands(context, expect_list(node, context)?, node.span)
}

fn expect_params(node: &Node) -> EvalResult<Vec<String>> {
    expect_list(node, "lambda parameters")?
        .iter()
        .map(|param| expect_symbol(param).map(str::to_string))
        .collect()
}

// In DIY Lang only #f is false, everything else (0, "", '()) is true.
fn is_truthy(value: &Sexpr) -> bool {
    !matches!(value, Sexpr::Boolean(false))
}

fn evaluate_special_form(
    form: SpecialForm,
    operands: &[Node],
    env: &Rc<RefCell<Environment>>,
    span: Span,
) -> EvalResult {
    trace!(form = form.keyword(), "special form");
    let name = form.keyword();
    match form {
        SpecialForm::Define => {
            let [symbol, value] = expect_operands::<2>(name, operands, span)?;
            evaluate_define(symbol, value, env, span)
        }
        SpecialForm::Lambda => {
            let [params, body] = expect_operands::<2>(name, operands, span)?;
            let closure = Closure::new(env.clone(), expect_params(params)?, body.clone());
            Ok(Node::new(Sexpr::Closure(closure), span))
        }
        SpecialForm::Defn => {
            let [symbol, params, body] = expect_operands::<3>(name, operands, span)?;
            evaluate_defn(symbol, params, body, env, span)
        }
        SpecialForm::Quote => {
            let [quoted] = expect_operands::<1>(name, operands, span)?;
            Ok(quoted.clone())
        }
        SpecialForm::Atom => {
            let [expr] = expect_operands::<1>(name, operands, span)?;
            let value = evaluate(expr, env)?;
            Ok(Node::new_bool(value.kind.is_atom(), span))
        }
        SpecialForm::If => {
            let [condition, consequent, alternate] = expect_operands::<3>(name, operands, span)?;
            if is_truthy(&evaluate(condition, env)?.kind) {
                evaluate(consequent, env)
            } else {
                evaluate(alternate, env)
            }
        }
        SpecialForm::Cond => {
            let [clauses] = expect_operands::<1>(name, operands, span)?;
            evaluate_cond(clauses, env, span)
        }
        SpecialForm::Let => {
            let [bindings, body] = expect_operands::<2>(name, operands, span)?;
            evaluate_let(bindings, body, env)
        }
        SpecialForm::Eq
        | SpecialForm::Add
        | SpecialForm::Sub
        | SpecialForm::Mul
        | SpecialForm::Div
        | SpecialForm::Mod
        | SpecialForm::GreaterThan
        | SpecialForm::Cons => {
            let [lhs, rhs] = expect_operands::<2>(name, operands, span)?;
            // Left to right
            let lhs = evaluate(lhs, env)?;
            let rhs = evaluate(rhs, env)?;
            match form {
                SpecialForm::Eq => primitives::prim_eq(&lhs, &rhs, span),
                SpecialForm::Add => primitives::prim_add(&lhs, &rhs, span),
                SpecialForm::Sub => primitives::prim_sub(&lhs, &rhs, span),
                SpecialForm::Mul => primitives::prim_mul(&lhs, &rhs, span),
                SpecialForm::Div => primitives::prim_div(&lhs, &rhs, span),
                SpecialForm::Mod => primitives::prim_mod(&lhs, &rhs, span),
                SpecialForm::GreaterThan => primitives::prim_greater_than(&lhs, &rhs, span),
                _ => primitives::prim_cons(lhs, rhs, span),
            }
        }
        SpecialForm::Head | SpecialForm::Tail | SpecialForm::Empty => {
            let [expr] = expect_operands::<1>(name, operands, span)?;
            let value = evaluate(expr, env)?;
            match form {
                SpecialForm::Head => primitives::prim_head(&value, span),
                SpecialForm::Tail => primitives::prim_tail(&value, span),
                _ => primitives::prim_empty(&value, span),
            }
        }
    }
}

fn evaluate_define(
    symbol: &Node,
    value: &Node,
    env: &Rc<RefCell<Environment>>,
    span: Span,
) -> EvalResult {
    let name = expect_symbol(symbol)?;
    let value = evaluate(value, env)?;
    env.borrow_mut().define(name, value.clone(), span)?;
    debug!(symbol = name, value = %value, "define");
    Ok(value)
}

fn evaluate_defn(
    symbol: &Node,
    params: &Node,
    body: &Node,
    env: &Rc<RefCell<Environment>>,
    span: Span,
) -> EvalResult {
    let name = expect_symbol(symbol)?;
    let params = expect_params(params)?;
    let arity = params.len();
    let closure = Node::new(
        Sexpr::Closure(Closure::new(env.clone(), params, body.clone())),
        span,
    );
    env.borrow_mut().define(name, closure.clone(), span)?;
    debug!(symbol = name, arity, "defn");
    Ok(closure)
}

fn evaluate_cond(clauses: &Node, env: &Rc<RefCell<Environment>>, span: Span) -> EvalResult {
    for clause in expect_list(clauses, "cond")? {
        let [test, result] = expect_pair(clause, "cond")?;
        if is_truthy(&evaluate(test, env)?.kind) {
            return evaluate(result, env);
        }
    }
    Ok(Node::new_bool(false, span))
}

// Sequential: every binding gets its own frame, visible to the bindings after it.
fn evaluate_let(bindings: &Node, body: &Node, env: &Rc<RefCell<Environment>>) -> EvalResult {
    let bindings = expect_list(bindings, "let")?;
    let mut let_env = if bindings.is_empty() {
        Environment::extend(env, HashMap::new())
    } else {
        env.clone()
    };
    for binding in bindings {
        let [symbol, expr] = expect_pair(binding, "let")?;
        let name = expect_symbol(symbol)?;
        let value = evaluate(expr, &let_env)?;
        let_env = Environment::extend(&let_env, HashMap::from([(name.to_string(), value)]));
    }
    evaluate(body, &let_env)
}

fn evaluate_application(
    operator: &Node,
    operands: &[Node],
    env: &Rc<RefCell<Environment>>,
    span: Span,
) -> EvalResult {
    let operator_result = evaluate(operator, env)?;
    match operator_result.kind {
        Sexpr::Closure(closure) => {
            apply_closure(&closure, &operator.to_string(), operands, env, span)
        }
        other => Err(EvalError::NotAFunction(other, operator.span)),
    }
}

/// Calls `closure`: operands are evaluated in the caller's `env`, the body in
/// a new frame on top of the closure's own environment.
fn apply_closure(
    closure: &Closure,
    name: &str,
    operands: &[Node],
    env: &Rc<RefCell<Environment>>,
    span: Span,
) -> EvalResult {
    let args = operands
        .iter()
        .map(|operand| evaluate(operand, env))
        .collect::<EvalResult<Vec<Node>>>()?;

    if args.len() != closure.params.len() {
        return Err(EvalError::ArityError {
            name: name.to_string(),
            expected: closure.params.len(),
            found: args.len(),
            span,
        });
    }

    trace!(function = name, arity = args.len(), "apply");
    let bindings = closure.params.iter().cloned().zip(args).collect();
    let call_env = Environment::extend(&closure.env, bindings);
    let mut result = evaluate(&closure.body, &call_env).map_err(|e| e.attach_to(span))?;
    if result.span.is_detached() {
        result.span = span;
    }
    Ok(result)
}
