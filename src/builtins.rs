// ABOUTME: The process-wide catalogue of built-in pattern functions
//
// Registration is static: `registry()` builds the list once behind a
// `OnceLock` and every call pattern scans it the same way a user-defined
// function's pattern is scanned, via `pattern::unify`. Built-ins observe the
// same calling contract as ordinary Functions, but type-check their
// arguments up front and return a `HostError` (converted by the evaluator
// into an `Error`-class instance) on a contract violation rather than
// panicking.

use crate::ast::{DefPatternItem, Expr, PatternItem};
use crate::env::Environment;
use crate::error::HostError;
use crate::eval::{invoke_block, make_error, rebuild_like};
use crate::pattern;
use crate::value::{BlockData, Value};
use std::collections::HashMap;
use std::io::Write as _;
use std::rc::Rc;
use std::sync::OnceLock;

pub type BuiltinFn = fn(&HashMap<String, Value>, &Rc<Environment>) -> Result<Value, HostError>;

pub struct BuiltinEntry {
    pub pattern: Vec<DefPatternItem>,
    pub func: BuiltinFn,
}

/// Finds the first registered built-in whose pattern unifies with `call`,
/// mirroring `pattern::find_match` for user functions.
pub fn lookup<'a>(
    call: &'a [PatternItem],
) -> Option<(&'static BuiltinEntry, Vec<(&'a str, &'a Expr)>)> {
    for entry in registry() {
        if let Some(bindings) = pattern::unify(&entry.pattern, call) {
            return Some((entry, bindings));
        }
    }
    None
}

fn registry() -> &'static [BuiltinEntry] {
    static REGISTRY: OnceLock<Vec<BuiltinEntry>> = OnceLock::new();
    REGISTRY.get_or_init(build_registry)
}

/// Splits a pattern string like `"left fold $array with $block"` into
/// `DefPatternItem`s, the same shape a `def` statement's pattern parses to.
fn pat(text: &str) -> Vec<DefPatternItem> {
    text.split_whitespace()
        .map(|word| match word.strip_prefix('$') {
            Some(name) => DefPatternItem::Parameter(name.to_string()),
            None => DefPatternItem::Identifier(word.to_string()),
        })
        .collect()
}

fn entry(pattern_text: &str, func: BuiltinFn) -> BuiltinEntry {
    BuiltinEntry {
        pattern: pat(pattern_text),
        func,
    }
}

fn build_registry() -> Vec<BuiltinEntry> {
    vec![
        entry("round $n", round_n),
        entry("print $obj", print_obj),
        entry("print $obj without newline", print_obj_without_newline),
        entry("input", input),
        entry("input with prompt $prompt", input_with_prompt),
        entry("do $block", do_block),
        entry("do $block with $args", do_block_with_args),
        entry("do $block on $arg", do_block_on_arg),
        entry("map $block over $array", map_block_over_array),
        entry("left fold $array with $block", left_fold),
        entry("left fold $array with $block from $start", left_fold_from),
        entry("right fold $array with $block", right_fold),
        entry("right fold $array with $block from $start", right_fold_from),
        entry("filter $array by $predicate", filter_array_by_predicate),
        entry("union of $a and $b", union_of_a_and_b),
        entry("intersection of $a and $b", intersection_of_a_and_b),
        entry("index $i of $array", index_of_array),
        entry("key $key of $obj", key_of_obj),
        entry("keys of $obj", keys_of_obj),
        entry("values of $obj", values_of_obj),
        entry("pairs of $obj", pairs_of_obj),
        entry("$start to $end", start_to_end),
        entry("format $format with $args", format_with_args),
        entry("printf $format with $args", printf_with_args),
        entry("square root of $num", square_root_of),
        entry("$root st root of $num", nth_root_of),
        entry("$root nd root of $num", nth_root_of),
        entry("$root rd root of $num", nth_root_of),
        entry("$root th root of $num", nth_root_of),
    ]
}

fn type_mismatch(pattern: &str, name: &str, expected: &str, actual: &Value) -> HostError {
    HostError::TypeMismatch {
        pattern: pattern.to_string(),
        name: name.to_string(),
        expected: expected.to_string(),
        actual: actual.type_name().to_string(),
    }
}

fn get<'a>(args: &'a HashMap<String, Value>, name: &str) -> &'a Value {
    args.get(name)
        .unwrap_or_else(|| panic!("builtin invoked without its bound ${} argument", name))
}

fn expect_number(args: &HashMap<String, Value>, pattern: &str, name: &str) -> Result<f64, HostError> {
    match get(args, name) {
        Value::Number(n) => Ok(*n),
        other => Err(type_mismatch(pattern, name, "Number", other)),
    }
}

fn expect_string<'a>(
    args: &'a HashMap<String, Value>,
    pattern: &str,
    name: &str,
) -> Result<&'a str, HostError> {
    match get(args, name) {
        Value::String(s) => Ok(s.as_str()),
        other => Err(type_mismatch(pattern, name, "String", other)),
    }
}

fn expect_block<'a>(
    args: &'a HashMap<String, Value>,
    pattern: &str,
    name: &str,
) -> Result<&'a Rc<BlockData>, HostError> {
    match get(args, name) {
        Value::Block(b) => Ok(b),
        other => Err(type_mismatch(pattern, name, "Block", other)),
    }
}

fn expect_collection<'a>(
    args: &'a HashMap<String, Value>,
    pattern: &str,
    name: &str,
) -> Result<&'a Value, HostError> {
    let v = get(args, name);
    if v.is_collection() {
        Ok(v)
    } else {
        Err(type_mismatch(pattern, name, "Collection", v))
    }
}

fn run_block(block: &Rc<BlockData>, call_args: Vec<Value>, env: &Rc<Environment>) -> Value {
    invoke_block(block, call_args, env)
}

/// Round-half-to-even, matching Python's `round()` (`builtin_fns.py:56`):
/// `round 2.5` is `2`, not `3`.
fn round_half_to_even(n: f64) -> f64 {
    let floor = n.floor();
    let diff = n - floor;
    if diff < 0.5 {
        floor
    } else if diff > 0.5 {
        floor + 1.0
    } else if (floor as i64) % 2 == 0 {
        floor
    } else {
        floor + 1.0
    }
}

fn round_n(args: &HashMap<String, Value>, _env: &Rc<Environment>) -> Result<Value, HostError> {
    let n = expect_number(args, "round $n", "n")?;
    Ok(Value::Number(round_half_to_even(n)))
}

fn print_obj(args: &HashMap<String, Value>, _env: &Rc<Environment>) -> Result<Value, HostError> {
    println!("{}", get(args, "obj"));
    Ok(Value::Null)
}

fn print_obj_without_newline(
    args: &HashMap<String, Value>,
    _env: &Rc<Environment>,
) -> Result<Value, HostError> {
    print!("{}", get(args, "obj"));
    let _ = std::io::stdout().flush();
    Ok(Value::Null)
}

fn input(_args: &HashMap<String, Value>, _env: &Rc<Environment>) -> Result<Value, HostError> {
    let mut line = String::new();
    match std::io::stdin().read_line(&mut line) {
        Ok(0) => Ok(Value::Null), // EOF (Ctrl-D)
        Ok(_) => Ok(Value::String(line.trim_end_matches('\n').to_string())),
        Err(_) => Ok(Value::Null),
    }
}

fn input_with_prompt(
    args: &HashMap<String, Value>,
    _env: &Rc<Environment>,
) -> Result<Value, HostError> {
    let prompt = expect_string(args, "input with prompt $prompt", "prompt")?;
    print!("{}", prompt);
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    match std::io::stdin().read_line(&mut line) {
        Ok(0) => Ok(Value::Null),
        Ok(_) => Ok(Value::String(line.trim_end_matches('\n').to_string())),
        Err(_) => Ok(Value::Null),
    }
}

fn do_block(args: &HashMap<String, Value>, env: &Rc<Environment>) -> Result<Value, HostError> {
    let block = expect_block(args, "do $block", "block")?;
    if !block.params.is_empty() {
        return Err(HostError::generic(
            "since no arguments are provided, $block of `do $block` must have no parameters",
        ));
    }
    Ok(run_block(block, vec![], env))
}

fn do_block_with_args(
    args: &HashMap<String, Value>,
    env: &Rc<Environment>,
) -> Result<Value, HostError> {
    let block = expect_block(args, "do $block with $args", "block")?;
    let collection = expect_collection(args, "do $block with $args", "args")?;
    let call_args = collection.elements().unwrap_or_default();
    Ok(run_block(block, call_args, env))
}

fn do_block_on_arg(
    args: &HashMap<String, Value>,
    env: &Rc<Environment>,
) -> Result<Value, HostError> {
    let block = expect_block(args, "do $block on $arg", "block")?;
    let arg = get(args, "arg").clone();
    Ok(run_block(block, vec![arg], env))
}

fn map_block_over_array(
    args: &HashMap<String, Value>,
    env: &Rc<Environment>,
) -> Result<Value, HostError> {
    let block = expect_block(args, "map $block over $array", "block")?;
    let array = expect_collection(args, "map $block over $array", "array")?.clone();
    let elements = array.elements().unwrap_or_default();

    let mut mapped = Vec::with_capacity(elements.len());
    for item in elements {
        let result = run_block(block, vec![item], env);
        if result.is_error() {
            return Ok(result);
        }
        mapped.push(result);
    }
    Ok(rebuild_like(&array, mapped))
}

fn fold(elements: Vec<Value>, start: Option<Value>, block: &Rc<BlockData>, env: &Rc<Environment>) -> Value {
    let mut iter = elements.into_iter();
    let mut acc = match start {
        Some(v) => v,
        None => match iter.next() {
            Some(first) => first,
            None => return Value::Null,
        },
    };
    for item in iter {
        acc = run_block(block, vec![acc, item], env);
        if acc.is_error() {
            return acc;
        }
    }
    acc
}

fn left_fold(args: &HashMap<String, Value>, env: &Rc<Environment>) -> Result<Value, HostError> {
    let array = expect_collection(args, "left fold $array with $block", "array")?;
    let block = expect_block(args, "left fold $array with $block", "block")?;
    let elements = array.elements().unwrap_or_default();
    Ok(fold(elements, None, block, env))
}

fn left_fold_from(args: &HashMap<String, Value>, env: &Rc<Environment>) -> Result<Value, HostError> {
    let array = expect_collection(args, "left fold $array with $block from $start", "array")?;
    let block = expect_block(args, "left fold $array with $block from $start", "block")?;
    let start = get(args, "start").clone();
    let elements = array.elements().unwrap_or_default();
    Ok(fold(elements, Some(start), block, env))
}

fn right_fold(args: &HashMap<String, Value>, env: &Rc<Environment>) -> Result<Value, HostError> {
    let array = expect_collection(args, "right fold $array with $block", "array")?;
    let block = expect_block(args, "right fold $array with $block", "block")?;
    let mut elements = array.elements().unwrap_or_default();
    elements.reverse();
    Ok(fold(elements, None, block, env))
}

fn right_fold_from(args: &HashMap<String, Value>, env: &Rc<Environment>) -> Result<Value, HostError> {
    let array = expect_collection(args, "right fold $array with $block from $start", "array")?;
    let block = expect_block(args, "right fold $array with $block from $start", "block")?;
    let start = get(args, "start").clone();
    let mut elements = array.elements().unwrap_or_default();
    elements.reverse();
    Ok(fold(elements, Some(start), block, env))
}

fn filter_array_by_predicate(
    args: &HashMap<String, Value>,
    env: &Rc<Environment>,
) -> Result<Value, HostError> {
    let array = expect_collection(args, "filter $array by $predicate", "array")?.clone();
    let predicate = expect_block(args, "filter $array by $predicate", "predicate")?;
    let elements = array.elements().unwrap_or_default();

    let mut kept = Vec::new();
    for item in elements {
        let result = run_block(predicate, vec![item.clone()], env);
        if result.is_error() {
            return Ok(result);
        }
        if result.is_truthy() {
            kept.push(item);
        }
    }
    Ok(rebuild_like(&array, kept))
}

fn union_of_a_and_b(args: &HashMap<String, Value>, _env: &Rc<Environment>) -> Result<Value, HostError> {
    let a = expect_collection(args, "union of $a and $b", "a")?.clone();
    let b = expect_collection(args, "union of $a and $b", "b")?.clone();
    let mut out: Vec<Value> = Vec::new();
    for item in a.elements().unwrap_or_default().into_iter().chain(b.elements().unwrap_or_default()) {
        if !out.iter().any(|x| x.structural_eq(&item)) {
            out.push(item);
        }
    }
    Ok(rebuild_like(&a, out))
}

fn intersection_of_a_and_b(
    args: &HashMap<String, Value>,
    _env: &Rc<Environment>,
) -> Result<Value, HostError> {
    let a = expect_collection(args, "intersection of $a and $b", "a")?.clone();
    let b = expect_collection(args, "intersection of $a and $b", "b")?.clone();
    let b_elems = b.elements().unwrap_or_default();
    let out: Vec<Value> = a
        .elements()
        .unwrap_or_default()
        .into_iter()
        .filter(|e| b_elems.iter().any(|x| x.structural_eq(e)))
        .collect();
    Ok(rebuild_like(&a, out))
}

fn index_of_array(args: &HashMap<String, Value>, env: &Rc<Environment>) -> Result<Value, HostError> {
    let i = expect_number(args, "index $i of $array", "i")?;
    let array = expect_collection(args, "index $i of $array", "array")?;
    let elements = array.elements().unwrap_or_default();
    if i.fract() != 0.0 || i < 0.0 || (i as usize) >= elements.len() {
        return Ok(make_error(
            env,
            "NotFoundError",
            format!("invalid index: {}", Value::Number(i)),
        ));
    }
    Ok(elements[i as usize].clone())
}

fn map_pairs<'a>(pattern: &str, obj: &'a Value) -> Result<&'a [(Value, Value)], HostError> {
    match obj {
        Value::Map(pairs) => Ok(pairs),
        other => Err(type_mismatch(pattern, "obj", "Map", other)),
    }
}

fn key_of_obj(args: &HashMap<String, Value>, _env: &Rc<Environment>) -> Result<Value, HostError> {
    let obj = get(args, "obj");
    let pairs = map_pairs("key $key of $obj", obj)?;
    let key = get(args, "key");
    pairs
        .iter()
        .find(|(k, _)| k.structural_eq(key))
        .map(|(_, v)| v.clone())
        .ok_or_else(|| HostError::generic(format!("key {} not found", key)))
}

fn keys_of_obj(args: &HashMap<String, Value>, _env: &Rc<Environment>) -> Result<Value, HostError> {
    let pairs = map_pairs("keys of $obj", get(args, "obj"))?;
    Ok(Value::Array(pairs.iter().map(|(k, _)| k.clone()).collect()))
}

fn values_of_obj(args: &HashMap<String, Value>, _env: &Rc<Environment>) -> Result<Value, HostError> {
    let pairs = map_pairs("values of $obj", get(args, "obj"))?;
    Ok(Value::Array(pairs.iter().map(|(_, v)| v.clone()).collect()))
}

fn pairs_of_obj(args: &HashMap<String, Value>, _env: &Rc<Environment>) -> Result<Value, HostError> {
    let pairs = map_pairs("pairs of $obj", get(args, "obj"))?;
    Ok(Value::Array(
        pairs
            .iter()
            .map(|(k, v)| Value::Tuple(vec![k.clone(), v.clone()]))
            .collect(),
    ))
}

/// Ascending exclusive-end when `end > start`; descending, inclusive of
/// `start` and exclusive of `end`, when `end < start`; the singleton
/// `start` itself (not a one-element array) when they're equal.
fn start_to_end(args: &HashMap<String, Value>, _env: &Rc<Environment>) -> Result<Value, HostError> {
    let start = expect_number(args, "$start to $end", "start")?;
    let end = expect_number(args, "$start to $end", "end")?;
    if start.fract() != 0.0 {
        return Err(HostError::generic("$start in `$start to $end` must be an integer"));
    }
    if end.fract() != 0.0 {
        return Err(HostError::generic("$end in `$start to $end` must be an integer"));
    }
    let (s, e) = (start as i64, end as i64);
    match s.cmp(&e) {
        std::cmp::Ordering::Less => Ok(Value::Array((s..e).map(|n| Value::Number(n as f64)).collect())),
        std::cmp::Ordering::Greater => {
            let mut out: Vec<Value> = (e + 1..=s).map(|n| Value::Number(n as f64)).collect();
            out.reverse();
            Ok(Value::Array(out))
        }
        std::cmp::Ordering::Equal => Ok(Value::Number(start)),
    }
}

/// A small `%`-style formatter: `%s` substitutes an argument's `Display`,
/// `%d`/`%i` its integer truncation. Mirrors the original's reliance on
/// Python's `fmt % items`, without importing a full printf crate for it.
fn apply_format(fmt: &str, items: &[Value]) -> Result<String, HostError> {
    let mut out = String::with_capacity(fmt.len());
    let mut chars = fmt.chars().peekable();
    let mut next_item = items.iter();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('s') => {
                let item = next_item
                    .next()
                    .ok_or_else(|| HostError::generic(format!("Wrong number of arguments to format `{}`", fmt)))?;
                out.push_str(&item.to_string());
            }
            Some('d') | Some('i') => {
                let item = next_item
                    .next()
                    .ok_or_else(|| HostError::generic(format!("Wrong number of arguments to format `{}`", fmt)))?;
                match item {
                    Value::Number(n) => out.push_str(&(*n as i64).to_string()),
                    other => out.push_str(&other.to_string()),
                }
            }
            Some(other_char) => {
                out.push('%');
                out.push(other_char);
            }
            None => out.push('%'),
        }
    }
    if next_item.next().is_some() {
        return Err(HostError::generic(format!(
            "Wrong number of arguments to format `{}`",
            fmt
        )));
    }
    Ok(out)
}

fn format_with_args(args: &HashMap<String, Value>, _env: &Rc<Environment>) -> Result<Value, HostError> {
    let fmt = expect_string(args, "format $format with $args", "format")?;
    let items = expect_collection(args, "format $format with $args", "args")?
        .elements()
        .unwrap_or_default();
    Ok(Value::String(apply_format(fmt, &items)?))
}

fn printf_with_args(args: &HashMap<String, Value>, _env: &Rc<Environment>) -> Result<Value, HostError> {
    let fmt = expect_string(args, "printf $format with $args", "format")?;
    let items = expect_collection(args, "printf $format with $args", "args")?
        .elements()
        .unwrap_or_default();
    println!("{}", apply_format(fmt, &items)?);
    Ok(Value::Null)
}

fn square_root_of(args: &HashMap<String, Value>, _env: &Rc<Environment>) -> Result<Value, HostError> {
    let num = expect_number(args, "square root of $num", "num")?;
    Ok(Value::Number(num.sqrt()))
}

fn nth_root_of(args: &HashMap<String, Value>, _env: &Rc<Environment>) -> Result<Value, HostError> {
    let root = expect_number(args, "$root th root of $num", "root")?;
    let num = expect_number(args, "$root th root of $num", "num")?;
    Ok(Value::Number(num.powf(1.0 / root)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;

    fn call(call_args: Vec<PatternItem>) -> Value {
        let env = Rc::new(Environment::root());
        let (entry, bindings) = lookup(&call_args).expect("pattern should match a builtin");
        let mut args = HashMap::new();
        for (name, expr) in bindings {
            args.insert(name.to_string(), crate::eval::evaluate(expr, &env));
        }
        match (entry.func)(&args, &env) {
            Ok(v) => v,
            Err(e) => panic!("builtin failed: {}", e),
        }
    }

    fn ident(s: &str) -> PatternItem {
        PatternItem::Identifier(s.to_string())
    }

    fn arg(e: Expr) -> PatternItem {
        PatternItem::Argument(Box::new(e))
    }

    fn dummy_span() -> crate::token::Span {
        crate::token::Span::new(crate::token::Position::new(1, 1), crate::token::Position::new(1, 1))
    }

    #[test]
    fn round_rounds_to_nearest_integer() {
        let v = call(vec![
            ident("round"),
            arg(Expr::Number(2.6, dummy_span())),
        ]);
        assert!(matches!(v, Value::Number(n) if n == 3.0));
    }

    #[test]
    fn round_breaks_ties_to_even() {
        let v = call(vec![
            ident("round"),
            arg(Expr::Number(2.5, dummy_span())),
        ]);
        assert!(matches!(v, Value::Number(n) if n == 2.0));

        let v = call(vec![
            ident("round"),
            arg(Expr::Number(3.5, dummy_span())),
        ]);
        assert!(matches!(v, Value::Number(n) if n == 4.0));
    }

    #[test]
    fn start_to_end_ascending_is_exclusive_of_end() {
        let v = call(vec![
            arg(Expr::Number(1.0, dummy_span())),
            ident("to"),
            arg(Expr::Number(4.0, dummy_span())),
        ]);
        match v {
            Value::Array(items) => {
                assert_eq!(items.len(), 3);
                assert!(matches!(items[0], Value::Number(n) if n == 1.0));
                assert!(matches!(items[2], Value::Number(n) if n == 3.0));
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn start_to_end_descending_is_inclusive_of_start() {
        let v = call(vec![
            arg(Expr::Number(4.0, dummy_span())),
            ident("to"),
            arg(Expr::Number(1.0, dummy_span())),
        ]);
        match v {
            Value::Array(items) => {
                let nums: Vec<f64> = items
                    .into_iter()
                    .map(|v| if let Value::Number(n) = v { n } else { panic!() })
                    .collect();
                assert_eq!(nums, vec![4.0, 3.0, 2.0]);
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn start_to_end_equal_collapses_to_scalar() {
        let v = call(vec![
            arg(Expr::Number(5.0, dummy_span())),
            ident("to"),
            arg(Expr::Number(5.0, dummy_span())),
        ]);
        assert!(matches!(v, Value::Number(n) if n == 5.0));
    }

    #[test]
    fn map_over_array_preserves_collection_kind() {
        let block = Value::Block(Rc::new(BlockData {
            params: vec!["x".to_string()],
            body: crate::ast::BlockStatement {
                statements: vec![crate::ast::Stmt::Expression(Expr::Infix {
                    op: "*".to_string(),
                    left: Box::new(Expr::Identifier("x".to_string(), dummy_span())),
                    right: Box::new(Expr::Number(2.0, dummy_span())),
                    span: dummy_span(),
                })],
                span: dummy_span(),
            },
        }));
        let env = Rc::new(Environment::root());
        let mut args = HashMap::new();
        args.insert("block".to_string(), block);
        args.insert(
            "array".to_string(),
            Value::Array(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]),
        );
        let result = map_block_over_array(&args, &env).unwrap();
        match result {
            Value::Array(items) => {
                let nums: Vec<f64> = items
                    .into_iter()
                    .map(|v| if let Value::Number(n) = v { n } else { panic!() })
                    .collect();
                assert_eq!(nums, vec![2.0, 4.0, 6.0]);
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn index_out_of_range_is_a_not_found_error() {
        let env = Rc::new(Environment::root());
        let prelude = crate::parser::Parser::new(crate::config::PRELUDE_SOURCE).parse_program();
        crate::eval::eval_program(&prelude, &env);

        let mut args = HashMap::new();
        args.insert("i".to_string(), Value::Number(10.0));
        args.insert(
            "array".to_string(),
            Value::Array(vec![Value::Number(1.0), Value::Number(2.0)]),
        );
        let result = index_of_array(&args, &env).expect("builtin should not hard-fail");
        assert!(result.is_error());
        if let Value::Instance(inst) = &result {
            let fields = inst.fields.borrow();
            assert_eq!(
                fields.get("tag").map(|t| t.to_string()),
                Some("NotFoundError".to_string())
            );
        }
    }

    #[test]
    fn round_n_rejects_non_number() {
        let env = Rc::new(Environment::root());
        let mut args = HashMap::new();
        args.insert("n".to_string(), Value::String("nope".to_string()));
        assert!(round_n(&args, &env).is_err());
    }
}
