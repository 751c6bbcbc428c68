// ABOUTME: Runtime value types produced and consumed by the evaluator

use crate::ast::{BlockStatement, DefPatternItem};
use crate::env::Environment;
use std::fmt;
use std::rc::Rc;

/// Whether a method was declared with `init` (constructor) or `def`
/// (ordinary method). Only `get_methods()` cares about the distinction —
/// constructors are never candidates for ordinary pattern dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Normal,
    Init,
}

#[derive(Debug, Clone)]
pub struct FunctionData {
    pub pattern: Vec<DefPatternItem>,
    pub body: BlockStatement,
    pub env: Rc<Environment>,
    /// Set only for the synthetic top-level constructor function an
    /// `init` method registers (pattern `ClassName $p1 $p2 ...`): calling
    /// it creates a fresh `Instance` of this class bound to `self`, runs
    /// the body, and returns the instance regardless of the body's own
    /// result — rather than the body's value, as a plain function call
    /// would.
    pub constructs: Option<Rc<ClassData>>,
}

#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub kind: MethodKind,
    pub function: Rc<FunctionData>,
}

#[derive(Debug, Clone)]
pub struct BlockData {
    pub params: Vec<String>,
    pub body: BlockStatement,
}

#[derive(Debug, Clone)]
pub struct ClassData {
    pub name: String,
    pub parent: Option<Rc<ClassData>>,
    pub methods: Vec<MethodEntry>,
}

impl ClassData {
    /// Own `init`, if any declared directly on this class (constructors are
    /// not inherited; a subclass with no `init` of its own is not
    /// constructible via `new`-style dispatch except through its own one).
    pub fn init(&self) -> Option<&Rc<FunctionData>> {
        self.methods
            .iter()
            .find(|m| m.kind == MethodKind::Init)
            .map(|m| &m.function)
    }

    /// Own normal methods first, then the parent's full list appended after,
    /// recursively. First structural pattern match during dispatch wins, so
    /// a child override of the same pattern always shadows the parent's.
    pub fn get_methods(&self) -> Vec<Rc<FunctionData>> {
        let mut out: Vec<Rc<FunctionData>> = self
            .methods
            .iter()
            .filter(|m| m.kind == MethodKind::Normal)
            .map(|m| m.function.clone())
            .collect();
        if let Some(parent) = &self.parent {
            out.extend(parent.get_methods());
        }
        out
    }

    /// Walks the parent chain looking for `name`, used by `is_error` and
    /// similar "is this an instance of X (or a subclass)?" checks.
    pub fn is_or_extends(&self, name: &str) -> bool {
        if self.name == name {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.is_or_extends(name),
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstanceData {
    pub class: Rc<ClassData>,
    pub fields: std::cell::RefCell<std::collections::HashMap<String, Value>>,
}

#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Boolean(bool),
    Char(char),
    String(String),
    Null,
    Array(Vec<Value>),
    Tuple(Vec<Value>),
    /// Order-preserving key/value pairs — Pluto maps are not hashed, lookup
    /// is by structural equality over a small vector, matching the literal
    /// syntax's insertion order being observable via `pairs of`/`keys of`.
    Map(Vec<(Value, Value)>),
    Block(Rc<BlockData>),
    Function(Rc<FunctionData>),
    Class(Rc<ClassData>),
    Instance(Rc<InstanceData>),

    /// Non-local control signals. These never escape the evaluator to
    /// become visible Pluto values; they are intermediate results threaded
    /// through composite evaluation and unwrapped by the construct that
    /// handles them (function body, loop body).
    ReturnValue(Box<Value>),
    Next,
    Break,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::Boolean(_) => "Boolean",
            Value::Char(_) => "Char",
            Value::String(_) => "String",
            Value::Null => "Null",
            Value::Array(_) => "Array",
            Value::Tuple(_) => "Tuple",
            Value::Map(_) => "Map",
            Value::Block(_) => "Block",
            Value::Function(_) => "Function",
            Value::Class(_) => "Class",
            Value::Instance(_) => "Instance",
            Value::ReturnValue(_) | Value::Next | Value::Break => "Signal",
        }
    }

    /// `Null`, `false`, `Number(0)`, and empty collections are falsy;
    /// everything else is truthy (`original_source/evaluator.py::is_truthy`).
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Array(items) | Value::Tuple(items) => !items.is_empty(),
            Value::Map(pairs) => !pairs.is_empty(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn elements(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) | Value::Tuple(items) => Some(items.clone()),
            Value::String(s) => Some(s.chars().map(Value::Char).collect()),
            Value::Map(pairs) => Some(
                pairs
                    .iter()
                    .map(|(k, v)| Value::Tuple(vec![k.clone(), v.clone()]))
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            Value::Array(_) | Value::Tuple(_) | Value::String(_) | Value::Map(_)
        )
    }

    /// True for `Instance`s of the prelude `Error` class or a subclass of
    /// it — the single recognition point the evaluator's short-circuiting
    /// threads through every composite evaluation context.
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Instance(inst) if inst.class.is_or_extends("Error"))
    }

    pub fn structural_eq(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Number(a), Number(b)) => a == b,
            (Boolean(a), Boolean(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Null, Null) => true,
            (Array(a), Array(b)) | (Tuple(a), Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.structural_eq(y))
            }
            (Map(a), Map(b)) => {
                // Maps compare as sets of pairs, not position-by-position —
                // insertion order is observable via `pairs of`/`keys of` but
                // not part of equality.
                a.len() == b.len()
                    && a.iter().all(|(ka, va)| {
                        b.iter()
                            .any(|(kb, vb)| ka.structural_eq(kb) && va.structural_eq(vb))
                    })
            }
            (Block(a), Block(b)) => Rc::ptr_eq(a, b),
            (Function(a), Function(b)) => Rc::ptr_eq(a, b),
            (Class(a), Class(b)) => Rc::ptr_eq(a, b),
            (Instance(a), Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "'{}'", c),
            Value::String(s) => write!(f, "{}", s),
            Value::Null => write!(f, "null"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Value::Map(pairs) => {
                if pairs.is_empty() {
                    return write!(f, "[:]");
                }
                write!(f, "[")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "]")
            }
            Value::Block(b) => write!(f, "<block/{}>", b.params.len()),
            Value::Function(func) => {
                write!(f, "<function {}>", crate::ast::render_def_pattern(&func.pattern))
            }
            Value::Class(c) => write!(f, "<class {}>", c.name),
            Value::Instance(inst) => write!(f, "<instance of {}>", inst.class.name),
            Value::ReturnValue(v) => write!(f, "{}", v),
            Value::Next => write!(f, "<next>"),
            Value::Break => write!(f, "<break>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_display_drops_trailing_zero() {
        assert_eq!(format!("{}", Value::Number(42.0)), "42");
        assert_eq!(format!("{}", Value::Number(-2.5)), "-2.5");
        assert_eq!(format!("{}", Value::Number(0.0)), "0");
    }

    #[test]
    fn boolean_display_is_lowercase_word() {
        assert_eq!(format!("{}", Value::Boolean(true)), "true");
        assert_eq!(format!("{}", Value::Boolean(false)), "false");
    }

    #[test]
    fn char_display_is_quoted() {
        assert_eq!(format!("{}", Value::Char('x')), "'x'");
    }

    #[test]
    fn array_and_tuple_display() {
        let arr = Value::Array(vec![Value::Number(1.0), Value::Number(2.0)]);
        assert_eq!(format!("{}", arr), "[1, 2]");

        let tup = Value::Tuple(vec![Value::Number(1.0), Value::Number(2.0)]);
        assert_eq!(format!("{}", tup), "(1, 2)");
    }

    #[test]
    fn empty_map_display_is_colon_in_brackets() {
        assert_eq!(format!("{}", Value::Map(vec![])), "[:]");
    }

    #[test]
    fn map_display_shows_pairs() {
        let map = Value::Map(vec![(Value::String("a".into()), Value::Number(1.0))]);
        assert_eq!(format!("{}", map), "[a: 1]");
    }

    #[test]
    fn null_display() {
        assert_eq!(format!("{}", Value::Null), "null");
    }

    #[test]
    fn falsiness_matches_zero_and_empty_collections() {
        assert!(!Value::Number(0.0).is_truthy());
        assert!(Value::Number(1.0).is_truthy());
        assert!(!Value::Array(vec![]).is_truthy());
        assert!(Value::Array(vec![Value::Null]).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
    }

    #[test]
    fn class_get_methods_prepends_own_before_parent() {
        let dummy_span = crate::token::Span::new(
            crate::token::Position::new(1, 1),
            crate::token::Position::new(1, 1),
        );
        let parent_fn = Rc::new(FunctionData {
            pattern: vec![DefPatternItem::Identifier("greet".into())],
            body: BlockStatement {
                statements: vec![],
                span: dummy_span,
            },
            env: Rc::new(Environment::root()),
            constructs: None,
        });
        let parent = Rc::new(ClassData {
            name: "Animal".into(),
            parent: None,
            methods: vec![MethodEntry {
                kind: MethodKind::Normal,
                function: parent_fn,
            }],
        });
        let child_fn = Rc::new(FunctionData {
            pattern: vec![DefPatternItem::Identifier("bark".into())],
            body: BlockStatement {
                statements: vec![],
                span: dummy_span,
            },
            env: Rc::new(Environment::root()),
            constructs: None,
        });
        let child = ClassData {
            name: "Dog".into(),
            parent: Some(parent),
            methods: vec![MethodEntry {
                kind: MethodKind::Normal,
                function: child_fn,
            }],
        };
        let methods = child.get_methods();
        assert_eq!(methods.len(), 2);
        assert!(matches!(&methods[0].pattern[0], DefPatternItem::Identifier(s) if s == "bark"));
        assert!(matches!(&methods[1].pattern[0], DefPatternItem::Identifier(s) if s == "greet"));
    }

    #[test]
    fn is_error_follows_subclass_chain() {
        let error_class = Rc::new(ClassData {
            name: "Error".into(),
            parent: None,
            methods: vec![],
        });
        let custom = Rc::new(ClassData {
            name: "MyError".into(),
            parent: Some(error_class),
            methods: vec![],
        });
        let inst = Value::Instance(Rc::new(InstanceData {
            class: custom,
            fields: std::cell::RefCell::new(std::collections::HashMap::new()),
        }));
        assert!(inst.is_error());
    }
}
