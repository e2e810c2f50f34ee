use crate::interpreter;
use crate::source::Span;
use crate::types::Node;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

// --- Environment Error ---
// Converted into the matching flat EvalError variant by the evaluator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error("Symbol '{0}' not found in env")]
    UnboundSymbol(String, Span), // Symbol name, span where lookup happened
    #[error("Symbol '{0}' is already defined in this scope")]
    AlreadyDefined(String, Span), // Symbol name, span of the define form
}

// --- Environment Definition ---

/// One frame of a lexical environment chain.
///
/// Frames are shared through `Rc<RefCell<...>>`: several child frames (and
/// closures) may hold the same parent. A child never writes to its parent;
/// the only mutation is `define` on the frame being evaluated in.
#[derive(Debug, Default)]
pub struct Environment {
    outer: Option<Rc<RefCell<Environment>>>,
    bindings: HashMap<String, Node>, // Maps symbol names to values
}

impl Environment {
    /// Creates a new, top-level (global) environment with no bindings.
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// Creates the environment used by the drivers: a root frame holding the
    /// prelude, and an empty child frame for the user's own definitions so
    /// prelude names can be shadowed.
    pub fn new_global_populated() -> Result<Rc<RefCell<Environment>>, interpreter::Error> {
        let prelude = Environment::new();
        interpreter::load_prelude(&prelude)?;
        Ok(Environment::extend(&prelude, HashMap::new()))
    }

    /// Returns a new frame whose parent is `outer`, holding exactly `bindings`.
    /// `outer` and its ancestors are left untouched.
    pub fn extend(
        outer: &Rc<RefCell<Environment>>,
        bindings: HashMap<String, Node>,
    ) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment {
            outer: Some(outer.clone()),
            bindings,
        }))
    }

    /// Defines a symbol in the *current* environment frame.
    /// Fails if the symbol is already bound in this frame; bindings in outer
    /// frames are shadowed, not touched.
    pub fn define(&mut self, name: &str, value_node: Node, span: Span) -> Result<(), EnvError> {
        if self.bindings.contains_key(name) {
            return Err(EnvError::AlreadyDefined(name.to_string(), span));
        }
        self.bindings.insert(name.to_string(), value_node);
        Ok(())
    }

    /// Looks up a symbol's value.
    /// Checks the current environment first, then walks up the outer environment chain.
    /// `lookup_span` is the location where the symbol was referenced, used for error reporting.
    pub fn get(&self, name: &str, lookup_span: Span) -> Result<Node, EnvError> {
        if let Some(value_node) = self.bindings.get(name) {
            Ok(value_node.clone())
        } else {
            match &self.outer {
                Some(outer_env_ptr) => outer_env_ptr.borrow().get(name, lookup_span),
                None => Err(EnvError::UnboundSymbol(name.to_string(), lookup_span)),
            }
        }
    }

    /// Gets all identifiers visible from this frame.
    pub fn get_identifiers(&self) -> HashSet<String> {
        let mut identifiers: HashSet<String> = self.bindings.keys().cloned().collect();
        if let Some(outer_env_ptr) = &self.outer {
            identifiers.extend(outer_env_ptr.borrow().get_identifiers());
        }
        identifiers
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn int_node(n: i64) -> Node {
        Node::new_integer(n, Span::default())
    }

    fn sym_node(s: &str) -> Node {
        Node::new_symbol(s, Span::default())
    }

    #[test]
    fn test_define_and_get_global() {
        let env = Environment::new();
        env.borrow_mut()
            .define("x", int_node(10), Span::default())
            .unwrap();

        let result = env.borrow().get("x", Span::default());
        assert_eq!(result.unwrap(), int_node(10));
    }

    #[test]
    fn test_get_unbound_global() {
        let env = Environment::new();
        let result = env.borrow().get("y", Span::default());
        assert!(matches!(result, Err(EnvError::UnboundSymbol(s, _)) if s == "y"));
    }

    #[test]
    fn test_redefine_in_same_frame_fails() {
        let env = Environment::new();
        env.borrow_mut()
            .define("x", int_node(1), Span::default())
            .unwrap();
        let span = Span::new(3, 9);
        let result = env.borrow_mut().define("x", int_node(2), span);
        assert_eq!(result, Err(EnvError::AlreadyDefined("x".to_string(), span)));
        // The original binding is untouched
        assert_eq!(env.borrow().get("x", span).unwrap(), int_node(1));
    }

    #[test]
    fn test_extend_does_not_touch_outer() {
        let global_env = Environment::new();
        global_env
            .borrow_mut()
            .define("x", int_node(10), Span::default())
            .unwrap();

        let local_env = Environment::extend(
            &global_env,
            HashMap::from([("y".to_string(), int_node(20))]),
        );

        assert_eq!(
            local_env.borrow().get("y", Span::default()).unwrap(),
            int_node(20)
        );
        assert_eq!(
            local_env.borrow().get("x", Span::default()).unwrap(),
            int_node(10)
        );
        assert!(global_env.borrow().get("y", Span::default()).is_err());
    }

    #[test]
    fn test_get_unbound_enclosed() {
        let global_env = Environment::new();
        let local_env = Environment::extend(&global_env, HashMap::new());

        let span = Span::new(11, 12);
        let result = local_env.borrow().get("z", span);
        assert_eq!(result, Err(EnvError::UnboundSymbol("z".to_string(), span)));
    }

    #[test]
    fn test_shadowing() {
        let global_env = Environment::new();
        global_env
            .borrow_mut()
            .define("x", int_node(10), Span::default())
            .unwrap();

        let local_env = Environment::extend(&global_env, HashMap::new());
        // Same name, different frame: allowed
        local_env
            .borrow_mut()
            .define("x", int_node(50), Span::default())
            .unwrap();

        let inner_local_env = Environment::extend(
            &local_env,
            HashMap::from([("y".to_string(), sym_node("y-value"))]),
        );

        assert_eq!(
            inner_local_env.borrow().get("x", Span::default()).unwrap(),
            int_node(50)
        );
        assert_eq!(
            inner_local_env.borrow().get("y", Span::default()).unwrap(),
            sym_node("y-value")
        );
        assert_eq!(
            global_env.borrow().get("x", Span::default()).unwrap(),
            int_node(10)
        );
    }

    #[test]
    fn test_siblings_share_parent() {
        let parent = Environment::new();
        let a = Environment::extend(&parent, HashMap::from([("a".to_string(), int_node(1))]));
        let b = Environment::extend(&parent, HashMap::from([("b".to_string(), int_node(2))]));

        parent
            .borrow_mut()
            .define("shared", int_node(3), Span::default())
            .unwrap();

        assert_eq!(a.borrow().get("shared", Span::default()).unwrap(), int_node(3));
        assert_eq!(b.borrow().get("shared", Span::default()).unwrap(), int_node(3));
        assert!(a.borrow().get("b", Span::default()).is_err());
        assert!(b.borrow().get("a", Span::default()).is_err());
    }

    #[test]
    fn test_get_identifiers() {
        let global_env = Environment::new();
        global_env
            .borrow_mut()
            .define("outer", int_node(1), Span::default())
            .unwrap();
        let local_env = Environment::extend(
            &global_env,
            HashMap::from([("inner".to_string(), int_node(2))]),
        );
        let identifiers = local_env.borrow().get_identifiers();
        assert_eq!(
            identifiers,
            HashSet::from(["outer".to_string(), "inner".to_string()])
        );
    }

    #[test]
    fn test_global_populated_has_prelude_in_parent_frame() {
        let env = Environment::new_global_populated().unwrap();
        assert!(env.borrow().get("not", Span::default()).is_ok());
        // User frame is empty, so prelude names can be shadowed
        env.borrow_mut()
            .define("not", int_node(0), Span::default())
            .unwrap();
    }
}
