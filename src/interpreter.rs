//! Source text in, values out: glue between the reader and the evaluator
//! used by the drivers.

use crate::environment::Environment;
use crate::evaluator::{EvalError, evaluate};
use crate::parser::{ParseError, parse_program};
use crate::types::Node;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;

const PRELUDE: &str = include_str!("prelude.diy");

#[derive(Debug, Error)]
pub enum Error {
    #[error("Could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Parses `source` and evaluates every top-level expression in order,
/// returning their values. Stops at the first error.
pub fn interpret(source: &str, env: &Rc<RefCell<Environment>>) -> Result<Vec<Node>, Error> {
    let mut results = Vec::new();
    interpret_each(source, env, |value| results.push(value))?;
    Ok(results)
}

/// Like `interpret`, but hands each value to `on_value` as soon as it is
/// produced, so values before a failing expression are not lost.
pub fn interpret_each(
    source: &str,
    env: &Rc<RefCell<Environment>>,
    mut on_value: impl FnMut(Node),
) -> Result<(), Error> {
    let program = parse_program(source)?;
    for expr in &program {
        on_value(evaluate(expr, env)?);
    }
    Ok(())
}

/// Reads a source file.
pub fn read_source(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Like `interpret`, for the contents of a file.
pub fn interpret_file(path: &Path, env: &Rc<RefCell<Environment>>) -> Result<Vec<Node>, Error> {
    interpret(&read_source(path)?, env)
}

/// Evaluates the prelude definitions into `env`. Their spans are detached,
/// so errors raised inside prelude functions are reported at the caller.
pub fn load_prelude(env: &Rc<RefCell<Environment>>) -> Result<(), Error> {
    let mut definitions = parse_program(PRELUDE)?;
    for definition in &mut definitions {
        definition.detach();
        evaluate(definition, env)?;
    }
    debug!(count = definitions.len(), "loaded prelude");
    Ok(())
}
