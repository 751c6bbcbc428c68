// ABOUTME: Lexically nested scopes holding variable bindings and local pattern functions

use crate::value::{FunctionData, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug)]
pub struct Environment {
    bindings: RefCell<HashMap<String, Value>>,
    functions: RefCell<Vec<Rc<FunctionData>>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    /// The top-level environment, with no parent. Holds whatever the
    /// prelude and top-level `def`s declare.
    pub fn root() -> Self {
        Environment {
            bindings: RefCell::new(HashMap::new()),
            functions: RefCell::new(Vec::new()),
            parent: None,
        }
    }

    /// A new scope nested inside `parent`, with no bindings of its own yet
    /// (a block or function body about to run).
    pub fn enclose(parent: &Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            functions: RefCell::new(Vec::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    /// A new scope nested inside `parent`, pre-populated with `bindings` —
    /// used when invoking a function or block with its arguments already
    /// bound to parameter names.
    pub fn enclose_with_bindings(
        parent: &Rc<Environment>,
        bindings: impl IntoIterator<Item = (String, Value)>,
    ) -> Rc<Self> {
        let env = Environment::enclose(parent);
        for (name, value) in bindings {
            env.declare(name, value);
        }
        env
    }

    /// Always writes into THIS scope, shadowing any outer binding of the
    /// same name for the remainder of this scope's lifetime.
    pub fn declare(&self, name: impl Into<String>, value: Value) {
        self.bindings.borrow_mut().insert(name.into(), value);
    }

    /// Assignment to an existing name. Mirrors the reference semantics: if
    /// some enclosing scope (including this one) already binds `name`, the
    /// value is written there too — recursively, so it lands in the
    /// innermost scope that already has it — and it is *also* written
    /// unconditionally into the current scope. A block or function body
    /// that assigns to a variable from an enclosing scope therefore mutates
    /// the binding everyone sees, while assigning a brand-new name still
    /// succeeds as a local declaration.
    pub fn assign(&self, name: &str, value: Value) {
        if self.bindings.borrow().contains_key(name) {
            self.bindings
                .borrow_mut()
                .insert(name.to_string(), value.clone());
            return;
        }
        if let Some(parent) = &self.parent {
            parent.assign(name, value.clone());
        }
        self.bindings.borrow_mut().insert(name.to_string(), value);
    }

    /// Walks outward through enclosing scopes looking for `name`.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    pub fn has_local(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    /// Registers a pattern function visible from this scope outward —
    /// a `def` statement evaluated in this environment.
    pub fn add_function(&self, function: Rc<FunctionData>) {
        self.functions.borrow_mut().push(function);
    }

    pub fn local_functions(&self) -> Vec<Rc<FunctionData>> {
        self.functions.borrow().clone()
    }

    /// All pattern functions visible from this scope: this scope's own,
    /// then each enclosing scope's in turn, innermost first — so a `def`
    /// shadowing an outer one of the same pattern wins during dispatch.
    pub fn visible_functions(&self) -> Vec<Rc<FunctionData>> {
        let mut out = self.local_functions();
        if let Some(parent) = &self.parent {
            out.extend(parent.visible_functions());
        }
        out
    }

    pub fn parent(&self) -> Option<&Rc<Environment>> {
        self.parent.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BlockStatement, DefPatternItem};
    use crate::token::{Position, Span};

    fn dummy_span() -> Span {
        Span::new(Position::new(1, 1), Position::new(1, 1))
    }

    #[test]
    fn declare_and_lookup() {
        let env = Rc::new(Environment::root());
        env.declare("x", Value::Number(42.0));
        match env.lookup("x") {
            Some(Value::Number(n)) => assert_eq!(n, 42.0),
            other => panic!("expected Number(42.0), got {:?}", other),
        }
    }

    #[test]
    fn lookup_walks_parent_chain() {
        let root = Rc::new(Environment::root());
        root.declare("a", Value::Number(1.0));
        let child = Environment::enclose(&root);
        child.declare("b", Value::Number(2.0));
        let grandchild = Environment::enclose(&child);

        assert!(matches!(grandchild.lookup("a"), Some(Value::Number(n)) if n == 1.0));
        assert!(matches!(grandchild.lookup("b"), Some(Value::Number(n)) if n == 2.0));
        assert!(grandchild.lookup("nope").is_none());
    }

    #[test]
    fn declare_shadows_without_touching_parent() {
        let root = Rc::new(Environment::root());
        root.declare("x", Value::Number(1.0));
        let child = Environment::enclose(&root);
        child.declare("x", Value::Number(2.0));

        assert!(matches!(child.lookup("x"), Some(Value::Number(n)) if n == 2.0));
        assert!(matches!(root.lookup("x"), Some(Value::Number(n)) if n == 1.0));
    }

    #[test]
    fn assign_writes_through_to_owning_scope_and_locally() {
        let root = Rc::new(Environment::root());
        root.declare("x", Value::Number(1.0));
        let child = Environment::enclose(&root);

        child.assign("x", Value::Number(99.0));

        assert!(matches!(root.lookup("x"), Some(Value::Number(n)) if n == 99.0));
        assert!(child.has_local("x"));
    }

    #[test]
    fn assign_to_unbound_name_declares_locally() {
        let root = Rc::new(Environment::root());
        let child = Environment::enclose(&root);

        child.assign("fresh", Value::Number(7.0));

        assert!(child.has_local("fresh"));
        assert!(!root.has_local("fresh"));
    }

    #[test]
    fn visible_functions_collects_innermost_first() {
        let root = Rc::new(Environment::root());
        let outer_fn = Rc::new(FunctionData {
            pattern: vec![DefPatternItem::Identifier("outer".into())],
            body: BlockStatement {
                statements: vec![],
                span: dummy_span(),
            },
            env: Rc::clone(&root),
            constructs: None,
        });
        root.add_function(outer_fn);

        let child = Environment::enclose(&root);
        let inner_fn = Rc::new(FunctionData {
            pattern: vec![DefPatternItem::Identifier("inner".into())],
            body: BlockStatement {
                statements: vec![],
                span: dummy_span(),
            },
            env: Rc::clone(&child),
            constructs: None,
        });
        child.add_function(inner_fn);

        let visible = child.visible_functions();
        assert_eq!(visible.len(), 2);
        assert!(matches!(&visible[0].pattern[0], DefPatternItem::Identifier(s) if s == "inner"));
        assert!(matches!(&visible[1].pattern[0], DefPatternItem::Identifier(s) if s == "outer"));
    }
}
