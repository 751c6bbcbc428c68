// ABOUTME: Structural pattern unification shared by function, method, and operator dispatch

use crate::ast::{DefPatternItem, Expr, PatternItem};
use crate::value::FunctionData;
use std::rc::Rc;

/// A call pattern unifies with a function's declared pattern when they have
/// the same length and, position by position, every literal keyword in the
/// declaration is matched by an identical identifier at the call site while
/// every parameter slot is matched by an argument expression. On success,
/// returns the parameter names paired with the (still unevaluated) argument
/// expressions supplying them, in declaration order.
pub fn unify<'a>(
    def: &'a [DefPatternItem],
    call: &'a [PatternItem],
) -> Option<Vec<(&'a str, &'a Expr)>> {
    if def.len() != call.len() {
        return None;
    }

    let mut bindings = Vec::new();
    for (d, c) in def.iter().zip(call.iter()) {
        match (d, c) {
            (DefPatternItem::Identifier(name), PatternItem::Identifier(word)) => {
                if name != word {
                    return None;
                }
            }
            (DefPatternItem::Parameter(name), PatternItem::Argument(expr)) => {
                bindings.push((name.as_str(), expr.as_ref()));
            }
            _ => return None,
        }
    }
    Some(bindings)
}

/// Scans `candidates` in order and returns the first whose pattern unifies
/// with `call`, along with its parameter bindings. Candidates are expected
/// to already be ordered by dispatch priority (innermost scope first for
/// plain functions, own-methods-before-parent's for classes).
pub fn find_match<'a>(
    candidates: &'a [Rc<FunctionData>],
    call: &'a [PatternItem],
) -> Option<(&'a Rc<FunctionData>, Vec<(&'a str, &'a Expr)>)> {
    for candidate in candidates {
        if let Some(bindings) = unify(&candidate.pattern, call) {
            return Some((candidate, bindings));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Position, Span};

    fn dummy_expr() -> Expr {
        Expr::Number(0.0, Span::new(Position::new(1, 1), Position::new(1, 1)))
    }

    #[test]
    fn unify_matches_identifier_and_binds_parameter() {
        let def = vec![
            DefPatternItem::Identifier("greet".into()),
            DefPatternItem::Parameter("who".into()),
        ];
        let arg = dummy_expr();
        let call = vec![
            PatternItem::Identifier("greet".into()),
            PatternItem::Argument(Box::new(arg.clone())),
        ];
        let bindings = unify(&def, &call).expect("should unify");
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].0, "who");
    }

    #[test]
    fn unify_rejects_mismatched_keyword() {
        let def = vec![DefPatternItem::Identifier("greet".into())];
        let call = vec![PatternItem::Identifier("wave".into())];
        assert!(unify(&def, &call).is_none());
    }

    #[test]
    fn unify_rejects_length_mismatch() {
        let def = vec![DefPatternItem::Identifier("greet".into())];
        let call = vec![
            PatternItem::Identifier("greet".into()),
            PatternItem::Argument(Box::new(dummy_expr())),
        ];
        assert!(unify(&def, &call).is_none());
    }

    #[test]
    fn unify_rejects_identifier_vs_argument_mismatch() {
        let def = vec![DefPatternItem::Parameter("x".into())];
        let call = vec![PatternItem::Identifier("literal".into())];
        assert!(unify(&def, &call).is_none());
    }
}
