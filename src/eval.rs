// ABOUTME: Tree-walking evaluator: Stmt/Expr -> Value, threading control signals and errors

use crate::ast::{
    BlockStatement, CatchArm, DefPatternItem, Expr, MatchArm, MethodNode, PatternItem, Program,
    Stmt, render_call_pattern,
};
use crate::builtins;
use crate::env::Environment;
use crate::pattern;
use crate::value::{BlockData, ClassData, FunctionData, InstanceData, MethodEntry, MethodKind, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Runs every statement in `program` against `env`, in order. Matches a
/// function body's treatment of `Next`/`Break` escaping to top level:
/// collapsed to `Null` rather than surfaced as a visible value, since there
/// is no enclosing loop or function to give them meaning. A `return` at the
/// top level simply yields its value.
pub fn eval_program(program: &Program, env: &Rc<Environment>) -> Value {
    let mut result = Value::Null;
    for stmt in &program.statements {
        result = eval_stmt(stmt, env);
        if result.is_error() {
            return result;
        }
        if matches!(result, Value::ReturnValue(_)) {
            return unwrap_return(result);
        }
    }
    match result {
        Value::Next | Value::Break => Value::Null,
        other => other,
    }
}

/// Runs a block's statements against `env`, stopping at the first error or
/// control signal (`ReturnValue`, `Next`, `Break`) and leaving it for the
/// caller to interpret — a function unwraps `ReturnValue`, a loop body
/// reacts to `Next`/`Break`, and so on.
fn eval_block(block: &BlockStatement, env: &Rc<Environment>) -> Value {
    let mut result = Value::Null;
    for stmt in &block.statements {
        result = eval_stmt(stmt, env);
        if result.is_error() {
            return result;
        }
        if matches!(result, Value::ReturnValue(_) | Value::Next | Value::Break) {
            return result;
        }
    }
    result
}

fn eval_stmt(stmt: &Stmt, env: &Rc<Environment>) -> Value {
    match stmt {
        Stmt::Expression(expr) => evaluate(expr, env),
        Stmt::Return(value, _) => match value {
            None => Value::ReturnValue(Box::new(Value::Null)),
            Some(expr) => {
                let v = evaluate(expr, env);
                if v.is_error() {
                    v
                } else {
                    Value::ReturnValue(Box::new(v))
                }
            }
        },
        Stmt::Block(block) => eval_block(block, &Environment::enclose(env)),
        Stmt::Next(_) => Value::Next,
        Stmt::Break(_) => Value::Break,
        Stmt::While {
            condition, body, ..
        } => eval_while(condition, body, env),
        Stmt::For {
            var,
            collection,
            body,
            ..
        } => eval_for(var, collection, body, env),
        Stmt::FunctionDefinition { pattern, body, .. } => {
            let function = Rc::new(FunctionData {
                pattern: pattern.clone(),
                body: body.clone(),
                env: Rc::clone(env),
                constructs: None,
            });
            env.add_function(function);
            Value::Null
        }
        Stmt::Class {
            name,
            parent,
            methods,
            ..
        } => eval_class_stmt(name, parent.as_ref(), methods, env),
    }
}

pub fn evaluate(expr: &Expr, env: &Rc<Environment>) -> Value {
    match expr {
        Expr::Number(n, _) => Value::Number(*n),
        Expr::StringLit(s, _) => Value::String(s.clone()),
        Expr::CharLit(c, _) => Value::Char(*c),
        Expr::Boolean(b, _) => Value::Boolean(*b),
        Expr::Null(_) => Value::Null,
        Expr::Identifier(name, _) => env.lookup(name).unwrap_or_else(|| {
            make_error(
                env,
                "NotFoundError",
                format!("`{}` is not defined in the current scope", name),
            )
        }),
        Expr::ArrayLit(items, _) => match eval_exprs(items, env) {
            Ok(values) => Value::Array(values),
            Err(e) => e,
        },
        Expr::TupleLit(items, _) => match eval_exprs(items, env) {
            Ok(values) => Value::Tuple(values),
            Err(e) => e,
        },
        Expr::MapLit(pairs, _) => {
            let mut out = Vec::with_capacity(pairs.len());
            for (k, v) in pairs {
                let kv = evaluate(k, env);
                if kv.is_error() {
                    return kv;
                }
                let vv = evaluate(v, env);
                if vv.is_error() {
                    return vv;
                }
                out.push((kv, vv));
            }
            Value::Map(out)
        }
        Expr::BlockLiteral { params, body, .. } => Value::Block(Rc::new(BlockData {
            params: params.clone(),
            body: (**body).clone(),
        })),
        Expr::Prefix { op, right, .. } => {
            let r = evaluate(right, env);
            if r.is_error() { r } else { eval_prefix(op, r, env) }
        }
        Expr::Infix {
            op, left, right, ..
        } => {
            let l = evaluate(left, env);
            if l.is_error() {
                return l;
            }
            let r = evaluate(right, env);
            if r.is_error() {
                return r;
            }
            eval_infix(op, l, r, env)
        }
        Expr::Dot { left, field, .. } => {
            let l = evaluate(left, env);
            if l.is_error() {
                return l;
            }
            match &l {
                Value::Instance(inst) => inst
                    .fields
                    .borrow()
                    .get(field)
                    .cloned()
                    .unwrap_or(Value::Null),
                Value::Map(pairs) => {
                    let key = Value::String(field.clone());
                    pairs
                        .iter()
                        .find(|(k, _)| k.structural_eq(&key))
                        .map(|(_, v)| v.clone())
                        .unwrap_or(Value::Null)
                }
                other => make_error(
                    env,
                    "TypeError",
                    format!("cannot access fields of a {}", other.type_name()),
                ),
            }
        }
        Expr::Assign { target, value, .. } => eval_assign(target, value, env),
        Expr::Declare { name, value, .. } => eval_declare(name, value, env),
        Expr::If {
            condition,
            consequence,
            alternative,
            ..
        } => eval_if(condition, consequence, alternative.as_ref(), env),
        Expr::FunctionCall { pattern, .. } => eval_function_call(pattern, env),
        Expr::MethodCall {
            instance, pattern, ..
        } => eval_method_call(instance, pattern, env),
        Expr::Match {
            scrutinee, arms, ..
        } => eval_match(scrutinee, arms, env),
        Expr::Try {
            body,
            err_name,
            arms,
            ..
        } => eval_try(body, err_name, arms, env),
    }
}

fn eval_exprs(exprs: &[Expr], env: &Rc<Environment>) -> Result<Vec<Value>, Value> {
    let mut out = Vec::with_capacity(exprs.len());
    for expr in exprs {
        let v = evaluate(expr, env);
        if v.is_error() {
            return Err(v);
        }
        out.push(v);
    }
    Ok(out)
}

/// Constructs an `Error`-class (or subclass) instance carrying `tag`/`msg`
/// fields. Never prints anything itself — only `main`'s top-level driver
/// and the `print`-family builtins touch stdout. If the prelude hasn't
/// declared `Error` yet (or at all), there is nothing sensible to build, so
/// this silently returns `Null` rather than panicking; `builtins::invoke`
/// guards against that case ahead of time via `HostError::PreludeNotLoaded`.
pub fn make_error(env: &Rc<Environment>, tag: &str, msg: impl Into<String>) -> Value {
    match env.lookup("Error") {
        Some(Value::Class(class)) => {
            let mut fields = HashMap::new();
            fields.insert("tag".to_string(), Value::String(tag.to_string()));
            fields.insert("msg".to_string(), Value::String(msg.into()));
            Value::Instance(Rc::new(InstanceData {
                class,
                fields: RefCell::new(fields),
            }))
        }
        _ => Value::Null,
    }
}

fn unwrap_return(v: Value) -> Value {
    match v {
        Value::ReturnValue(inner) => *inner,
        other => other,
    }
}

pub(crate) fn rebuild_like(original: &Value, elements: Vec<Value>) -> Value {
    match original {
        Value::Tuple(_) => Value::Tuple(elements),
        Value::String(_) => Value::String(
            elements
                .into_iter()
                .map(|v| match v {
                    Value::Char(c) => c.to_string(),
                    other => other.to_string(),
                })
                .collect(),
        ),
        Value::Map(_) => Value::Map(
            elements
                .into_iter()
                .map(|v| match v {
                    Value::Tuple(mut pair) if pair.len() == 2 => {
                        let value = pair.pop().unwrap();
                        let key = pair.pop().unwrap();
                        (key, value)
                    }
                    other => (other, Value::Null),
                })
                .collect(),
        ),
        _ => Value::Array(elements),
    }
}

fn eval_prefix(op: &str, right: Value, env: &Rc<Environment>) -> Value {
    if let Value::Instance(inst) = &right {
        let method_name = match op {
            "-" => "__negate",
            "+" => "__no_op",
            _ => "",
        };
        if !method_name.is_empty() {
            let methods = inst.class.get_methods();
            if let Some(candidate) = methods.iter().find(|f| {
                matches!(f.pattern.as_slice(), [DefPatternItem::Identifier(n)] if n == method_name)
            }) {
                return invoke_function_with_values(candidate, vec![], Some(right.clone()));
            }
        }
    }
    match (op, &right) {
        ("-", Value::Number(n)) => Value::Number(-n),
        ("+", Value::Number(_)) => right,
        _ => make_error(
            env,
            "NotFoundError",
            format!("unknown operator: {}{}", op, right.type_name()),
        ),
    }
}

fn eval_infix(op: &str, left: Value, right: Value, env: &Rc<Environment>) -> Value {
    if left.is_collection() && right.is_collection() {
        return eval_collection_infix(op, left, right, env);
    }
    if matches!(left, Value::Instance(_)) {
        return eval_instance_infix(op, left, right, env);
    }
    match op {
        "&&" => return Value::Boolean(left.is_truthy() && right.is_truthy()),
        "||" => return Value::Boolean(left.is_truthy() || right.is_truthy()),
        "==" => return Value::Boolean(left.structural_eq(&right)),
        "!=" => return Value::Boolean(!left.structural_eq(&right)),
        "?" => return if matches!(left, Value::Null) { right } else { left },
        _ => {}
    }
    match (&left, &right) {
        (Value::Number(_), Value::Number(_)) => eval_number_infix(op, left, right, env),
        (Value::Char(_), _) | (Value::String(_), Value::Char(_)) => {
            eval_char_string_infix(op, left, right, env)
        }
        (Value::Char(c), Value::Number(n)) if op == "*" => {
            let reps = n.floor().max(0.0) as usize;
            Value::String(c.to_string().repeat(reps))
        }
        _ if left.is_collection() && op == "*" => {
            if let Value::Number(n) = right {
                let reps = n.floor().max(0.0) as usize;
                let elems = left.elements().unwrap_or_default();
                let mut out = Vec::with_capacity(elems.len() * reps);
                for _ in 0..reps {
                    out.extend(elems.iter().cloned());
                }
                rebuild_like(&left, out)
            } else {
                make_error(
                    env,
                    "TypeError",
                    format!("cannot multiply a {} by a {}", left.type_name(), right.type_name()),
                )
            }
        }
        _ => make_error(
            env,
            "NotFoundError",
            format!(
                "unknown operator: {} {} {}",
                left.type_name(),
                op,
                right.type_name()
            ),
        ),
    }
}

fn eval_number_infix(op: &str, left: Value, right: Value, env: &Rc<Environment>) -> Value {
    let (Value::Number(a), Value::Number(b)) = (&left, &right) else {
        unreachable!("eval_number_infix called on non-numbers");
    };
    let (a, b) = (*a, *b);
    let zero_divisor = || make_error(env, "GeneralError", "division by zero");
    match op {
        "+" => Value::Number(a + b),
        "-" => Value::Number(a - b),
        "*" => Value::Number(a * b),
        "/" if b == 0.0 => zero_divisor(),
        "/" => Value::Number(a / b),
        "**" => Value::Number(a.powf(b)),
        // Floor division on the raw floats, matching the language this was
        // ported from rather than truncating toward zero.
        "//" if b == 0.0 => zero_divisor(),
        "//" => Value::Number((a / b).floor()),
        // Follows the sign of the divisor, matching the language this was
        // ported from rather than Rust's truncating `%`.
        "%" if b == 0.0 => zero_divisor(),
        "%" => Value::Number(a - b * (a / b).floor()),
        "<" => Value::Boolean(a < b),
        ">" => Value::Boolean(a > b),
        "<=" => Value::Boolean(a <= b),
        ">=" => Value::Boolean(a >= b),
        // `&`/`|` truncate both operands toward zero before applying the
        // bitwise operation.
        "&" => Value::Number(((a.trunc() as i64) & (b.trunc() as i64)) as f64),
        "|" => Value::Number(((a.trunc() as i64) | (b.trunc() as i64)) as f64),
        _ => make_error(
            env,
            "NotFoundError",
            format!("unknown operator: Number {} Number", op),
        ),
    }
}

fn eval_char_string_infix(op: &str, left: Value, right: Value, env: &Rc<Environment>) -> Value {
    match op {
        "+" => {
            let l = match &left {
                Value::Char(c) => c.to_string(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let r = match &right {
                Value::Char(c) => c.to_string(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Value::String(format!("{}{}", l, r))
        }
        "<" | ">" | "<=" | ">=" | "==" | "!=" => {
            let ord = left.to_string().cmp(&right.to_string());
            let result = match op {
                "<" => ord.is_lt(),
                ">" => ord.is_gt(),
                "<=" => ord.is_le(),
                ">=" => ord.is_ge(),
                "==" => ord.is_eq(),
                "!=" => !ord.is_eq(),
                _ => unreachable!(),
            };
            Value::Boolean(result)
        }
        _ => make_error(
            env,
            "NotFoundError",
            format!(
                "unknown operator: {} {} {}",
                left.type_name(),
                op,
                right.type_name()
            ),
        ),
    }
}

fn eval_collection_infix(op: &str, left: Value, right: Value, env: &Rc<Environment>) -> Value {
    let l = left.elements().unwrap_or_default();
    let r = right.elements().unwrap_or_default();
    match op {
        "==" => Value::Boolean(left.structural_eq(&right)),
        "!=" => Value::Boolean(!left.structural_eq(&right)),
        "+" => rebuild_like(&left, l.into_iter().chain(r).collect()),
        "-" => rebuild_like(
            &left,
            l.into_iter()
                .filter(|e| !r.iter().any(|x| x.structural_eq(e)))
                .collect(),
        ),
        "&&" => rebuild_like(
            &left,
            l.into_iter()
                .filter(|e| r.iter().any(|x| x.structural_eq(e)))
                .collect(),
        ),
        "||" => {
            let mut out: Vec<Value> = Vec::new();
            for e in l.into_iter().chain(r) {
                if !out.iter().any(|x| x.structural_eq(&e)) {
                    out.push(e);
                }
            }
            rebuild_like(&left, out)
        }
        _ => make_error(
            env,
            "NotFoundError",
            format!(
                "unknown operator: {} {} {}",
                left.type_name(),
                op,
                right.type_name()
            ),
        ),
    }
}

/// Method-name table for operator overloading on instances. Dot-field
/// access (`.`) resolves directly against the instance's field map rather
/// than through this dispatch, mirroring the evaluator it's grounded on.
fn eval_instance_infix(op: &str, left: Value, right: Value, env: &Rc<Environment>) -> Value {
    let Value::Instance(inst) = &left else {
        unreachable!("eval_instance_infix called on a non-instance");
    };
    let method_name = match op {
        "+" => "__plus",
        "-" => "__minus",
        "*" => "__times",
        "/" => "__divide",
        "**" => "__exp",
        "//" => "__f_div",
        "%" => "__mod",
        "==" => "__eq",
        "||" => "__or",
        "&&" => "__and",
        "|" => "__b_or",
        "&" => "__b_and",
        _ => {
            return make_error(
                env,
                "NotFoundError",
                format!(
                    "unknown operator: {} {} {}",
                    inst.class.name,
                    op,
                    right.type_name()
                ),
            );
        }
    };
    let methods = inst.class.get_methods();
    for candidate in &methods {
        if let [DefPatternItem::Identifier(name), DefPatternItem::Parameter(param)] =
            candidate.pattern.as_slice()
        {
            if name == method_name {
                return invoke_function_with_values(
                    candidate,
                    vec![(param.clone(), right)],
                    Some(left),
                );
            }
        }
    }
    make_error(
        env,
        "NotFoundError",
        format!(
            "unknown operator: {} {} {}",
            inst.class.name,
            op,
            right.type_name()
        ),
    )
}

fn eval_assign(target: &Expr, value_expr: &Expr, env: &Rc<Environment>) -> Value {
    let value = evaluate(value_expr, env);
    if value.is_error() {
        return value;
    }
    match target {
        Expr::Dot { left, field, .. } => {
            let obj = evaluate(left, env);
            if obj.is_error() {
                return obj;
            }
            match &obj {
                Value::Instance(inst) => {
                    inst.fields
                        .borrow_mut()
                        .insert(field.clone(), value.clone());
                    value
                }
                other => make_error(
                    env,
                    "TypeError",
                    format!("cannot assign a field on a {}", other.type_name()),
                ),
            }
        }
        Expr::Identifier(name, _) => {
            env.assign(name, value.clone());
            value
        }
        _ => make_error(env, "SyntaxError", "invalid assignment target"),
    }
}

fn eval_declare(name: &str, value_expr: &Expr, env: &Rc<Environment>) -> Value {
    let value = evaluate(value_expr, env);
    if value.is_error() {
        return value;
    }
    env.declare(name, value.clone());
    value
}

fn eval_if(
    condition: &Expr,
    consequence: &BlockStatement,
    alternative: Option<&BlockStatement>,
    env: &Rc<Environment>,
) -> Value {
    let cond = evaluate(condition, env);
    if cond.is_error() {
        return cond;
    }
    if cond.is_truthy() {
        eval_block(consequence, &Environment::enclose(env))
    } else if let Some(alt) = alternative {
        eval_block(alt, &Environment::enclose(env))
    } else {
        Value::Null
    }
}

fn eval_while(condition: &Expr, body: &BlockStatement, env: &Rc<Environment>) -> Value {
    loop {
        let cond = evaluate(condition, env);
        if cond.is_error() {
            return cond;
        }
        if !cond.is_truthy() {
            return Value::Null;
        }
        let result = eval_block(body, &Environment::enclose(env));
        if result.is_error() || matches!(result, Value::ReturnValue(_)) {
            return result;
        }
        if matches!(result, Value::Break) {
            return Value::Null;
        }
        // Next falls through to the next condition check.
    }
}

fn eval_for(var: &str, collection: &Expr, body: &BlockStatement, env: &Rc<Environment>) -> Value {
    let coll = evaluate(collection, env);
    if coll.is_error() {
        return coll;
    }
    let Some(elements) = coll.elements() else {
        return make_error(
            env,
            "TypeError",
            format!("cannot iterate over a {}", coll.type_name()),
        );
    };
    for element in elements {
        let scope = Environment::enclose(env);
        scope.declare(var, element);
        let result = eval_block(body, &scope);
        if result.is_error() || matches!(result, Value::ReturnValue(_)) {
            return result;
        }
        if matches!(result, Value::Break) {
            return Value::Null;
        }
    }
    Value::Null
}

/// Binds pre-evaluated `values` as parameters under `function.env`, plus
/// `self` if `self_value` is given, and runs the body. A constructor
/// function (`constructs: Some(class)`) instead allocates a fresh instance,
/// binds it as `self`, runs the body for its side effects, and returns the
/// instance regardless of what the body itself evaluated to — unless the
/// body produced an error, which takes priority.
pub fn invoke_function_with_values(
    function: &Rc<FunctionData>,
    values: Vec<(String, Value)>,
    self_value: Option<Value>,
) -> Value {
    let mut bindings = values;
    if let Some(v) = self_value {
        bindings.push(("self".to_string(), v));
    }
    let scope = Environment::enclose_with_bindings(&function.env, bindings);

    if let Some(class) = &function.constructs {
        let instance = Value::Instance(Rc::new(InstanceData {
            class: Rc::clone(class),
            fields: RefCell::new(HashMap::new()),
        }));
        scope.declare("self", instance.clone());
        let result = eval_block(&function.body, &scope);
        if result.is_error() {
            return result;
        }
        return instance;
    }

    unwrap_return(eval_block(&function.body, &scope))
}

fn eval_function_call(call_pattern: &[PatternItem], env: &Rc<Environment>) -> Value {
    let functions = env.visible_functions();
    if let Some((function, bindings)) = pattern::find_match(&functions, call_pattern) {
        let function = Rc::clone(function);
        let mut values = Vec::with_capacity(bindings.len());
        for (name, expr) in bindings {
            let v = evaluate(expr, env);
            if v.is_error() {
                return v;
            }
            values.push((name.to_string(), v));
        }
        return invoke_function_with_values(&function, values, None);
    }

    match builtins::lookup(call_pattern) {
        Some((entry, bindings)) => {
            let mut args = HashMap::with_capacity(bindings.len());
            for (name, expr) in bindings {
                let v = evaluate(expr, env);
                if v.is_error() {
                    return v;
                }
                args.insert(name.to_string(), v);
            }
            match (entry.func)(&args, env) {
                Ok(v) => v,
                Err(host_err) => make_error(env, host_err.tag(), host_err.to_string()),
            }
        }
        None => make_error(
            env,
            "NotFoundError",
            format!(
                "no function matches the pattern: {}",
                render_call_pattern(call_pattern)
            ),
        ),
    }
}

fn eval_method_call(instance_expr: &Expr, call_pattern: &[PatternItem], env: &Rc<Environment>) -> Value {
    let instance_val = evaluate(instance_expr, env);
    if instance_val.is_error() {
        return instance_val;
    }
    let Value::Instance(inst) = &instance_val else {
        return make_error(
            env,
            "TypeError",
            format!("cannot call a method on a {}", instance_val.type_name()),
        );
    };
    let methods = inst.class.get_methods();
    if let Some((function, bindings)) = pattern::find_match(&methods, call_pattern) {
        let function = Rc::clone(function);
        let mut values = Vec::with_capacity(bindings.len());
        for (name, expr) in bindings {
            let v = evaluate(expr, env);
            if v.is_error() {
                return v;
            }
            values.push((name.to_string(), v));
        }
        return invoke_function_with_values(&function, values, Some(instance_val.clone()));
    }
    make_error(
        env,
        "NotFoundError",
        format!(
            "{} has no method matching the pattern: {}",
            inst.class.name,
            render_call_pattern(call_pattern)
        ),
    )
}

fn eval_class_stmt(
    name: &str,
    parent: Option<&Expr>,
    methods: &[MethodNode],
    env: &Rc<Environment>,
) -> Value {
    let parent_class = match parent {
        None => None,
        Some(expr) => {
            let v = evaluate(expr, env);
            if v.is_error() {
                return v;
            }
            match v {
                Value::Class(c) => Some(c),
                other => {
                    return make_error(
                        env,
                        "TypeError",
                        format!("cannot extend a {}", other.type_name()),
                    );
                }
            }
        }
    };

    let mut method_entries = Vec::with_capacity(methods.len());
    let mut pending_inits = Vec::new();
    for m in methods {
        match m {
            MethodNode::Function { pattern, body, .. } => {
                let function = Rc::new(FunctionData {
                    pattern: pattern.clone(),
                    body: body.clone(),
                    env: Rc::clone(env),
                    constructs: None,
                });
                method_entries.push(MethodEntry {
                    kind: MethodKind::Normal,
                    function,
                });
            }
            MethodNode::Init { pattern, body, .. } => {
                let function = Rc::new(FunctionData {
                    pattern: pattern.clone(),
                    body: body.clone(),
                    env: Rc::clone(env),
                    constructs: None,
                });
                method_entries.push(MethodEntry {
                    kind: MethodKind::Init,
                    function,
                });
                pending_inits.push((pattern.clone(), body.clone()));
            }
        }
    }

    let class = Rc::new(ClassData {
        name: name.to_string(),
        parent: parent_class,
        methods: method_entries,
    });

    // The constructor is a plain top-level pattern function named after
    // the class, e.g. `Point $x $y` for `class Point { init $x $y { ... } }`.
    for (init_pattern, body) in pending_inits {
        let mut ctor_pattern = vec![DefPatternItem::Identifier(name.to_string())];
        ctor_pattern.extend(init_pattern);
        let ctor = Rc::new(FunctionData {
            pattern: ctor_pattern,
            body,
            env: Rc::clone(env),
            constructs: Some(Rc::clone(&class)),
        });
        env.add_function(ctor);
    }

    env.declare(name, Value::Class(Rc::clone(&class)));
    Value::Class(class)
}

fn eval_match(scrutinee_expr: &Expr, arms: &[MatchArm], env: &Rc<Environment>) -> Value {
    let scrutinee = evaluate(scrutinee_expr, env);
    if scrutinee.is_error() {
        return scrutinee;
    }
    for arm in arms {
        let matched = match &arm.values {
            None => true,
            Some(exprs) => {
                let mut m = false;
                for e in exprs {
                    let v = evaluate(e, env);
                    if v.is_error() {
                        return v;
                    }
                    if v.structural_eq(&scrutinee) {
                        m = true;
                    }
                }
                m
            }
        };
        if matched {
            let scope = Environment::enclose(env);
            return unwrap_return(evaluate(&arm.result, &scope));
        }
    }
    Value::Null
}

fn eval_try(body: &BlockStatement, err_name: &str, arms: &[CatchArm], env: &Rc<Environment>) -> Value {
    let outcome = eval_block(body, env);
    if !outcome.is_error() {
        return outcome;
    }
    let Value::Instance(inst) = &outcome else {
        return outcome;
    };
    let (tag, msg) = {
        let fields = inst.fields.borrow();
        (
            fields.get("tag").cloned().unwrap_or(Value::Null),
            fields.get("msg").cloned().unwrap_or(Value::Null),
        )
    };

    for arm in arms {
        let matched = match &arm.tags {
            None => true,
            Some(exprs) => {
                let mut m = false;
                for e in exprs {
                    let v = evaluate(e, env);
                    if v.is_error() {
                        return v;
                    }
                    if !matches!(v, Value::String(_)) {
                        return make_error(
                            env,
                            "TypeError",
                            format!(
                                "catch-arm predicates must be strings, found a {}",
                                v.type_name()
                            ),
                        );
                    }
                    if v.structural_eq(&tag) {
                        m = true;
                    }
                }
                m
            }
        };
        if matched {
            let err_map = Value::Map(vec![
                (Value::String("tag".into()), tag.clone()),
                (Value::String("msg".into()), msg.clone()),
            ]);
            let scope =
                Environment::enclose_with_bindings(env, [(err_name.to_string(), err_map)]);
            return unwrap_return(evaluate(&arm.result, &scope));
        }
    }
    outcome
}

/// Runs a block literal against `args`, bound positionally to its
/// parameters in a scope enclosing `env` — the environment the invoking
/// built-in (`do`, `map`, `left fold`, ...) is itself running in, since
/// blocks carry no environment of their own.
pub fn invoke_block(block: &BlockData, args: Vec<Value>, env: &Rc<Environment>) -> Value {
    if args.len() != block.params.len() {
        return make_error(
            env,
            "TypeError",
            format!(
                "block expects {} argument(s), got {}",
                block.params.len(),
                args.len()
            ),
        );
    }
    let bindings: Vec<(String, Value)> = block.params.iter().cloned().zip(args).collect();
    let scope = Environment::enclose_with_bindings(env, bindings);
    unwrap_return(eval_block(&block.body, &scope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn run(source: &str) -> Value {
        let program = Parser::new(source).parse_program();
        let env = Rc::new(Environment::root());
        eval_program(&program, &env)
    }

    fn run_with_prelude(source: &str) -> Value {
        let prelude = "class Error { init $tag $msg { self.tag = tag; self.msg = msg; } }";
        let env = Rc::new(Environment::root());
        eval_program(&Parser::new(prelude).parse_program(), &env);
        eval_program(&Parser::new(source).parse_program(), &env)
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert!(matches!(run("1 + 2 * 3;"), Value::Number(n) if n == 7.0));
        assert!(matches!(run("(1 + 2) * 3;"), Value::Number(n) if n == 9.0));
    }

    #[test]
    fn declare_and_assign_roundtrip() {
        let v = run("x := 10; x = x + 5; x;");
        assert!(matches!(v, Value::Number(n) if n == 15.0));
    }

    #[test]
    fn pattern_function_dispatch_by_keyword() {
        let v = run("def double $n { return n * 2; } \\double (21);");
        assert!(matches!(v, Value::Number(n) if n == 42.0));
    }

    #[test]
    fn multi_word_pattern_must_match_exactly() {
        let v = run("def add $a to $b { return a + b; } \\add (3) to (4);");
        assert!(matches!(v, Value::Number(n) if n == 7.0));
    }

    #[test]
    fn while_loop_propagates_return() {
        let v = run(
            "def first_even_above $n { \
                i := n; \
                while true { if i % 2 == 0 { return i; } i = i + 1; } \
            } \\first_even_above (7);",
        );
        assert!(matches!(v, Value::Number(n) if n == 8.0));
    }

    #[test]
    fn for_loop_sums_array() {
        let v = run(
            "total := 0; \
             for x in [1, 2, 3] { total = total + x; } \
             total;",
        );
        assert!(matches!(v, Value::Number(n) if n == 6.0));
    }

    #[test]
    fn map_equality_is_order_independent() {
        let v = run("[a: 1, b: 2] == [b: 2, a: 1];");
        assert!(matches!(v, Value::Boolean(true)));
    }

    #[test]
    fn floor_division_floors_the_raw_quotient_not_truncates() {
        // -7 // 2 == -4.0 (floor), not -3.0 (truncation toward zero).
        let v = run("-7 // 2;");
        assert!(matches!(v, Value::Number(n) if n == -4.0));
    }

    #[test]
    fn bitwise_operators_still_truncate_toward_zero() {
        let v = run("6 & 3;");
        assert!(matches!(v, Value::Number(n) if n == 2.0));
    }

    #[test]
    fn map_over_a_map_preserves_map_kind() {
        let v = run("\\map ({ pair -> pair }) over ([a: 1, b: 2]);");
        assert!(matches!(v, Value::Map(_)));
    }

    #[test]
    fn class_instantiation_and_method_dispatch() {
        let v = run_with_prelude(
            "class Point { \
                init $x $y { self.x = x; self.y = y; } \
                def sum { return self.x + self.y; } \
            } \
            p := \\Point (3) (4); \
            p.\\sum;",
        );
        assert!(matches!(v, Value::Number(n) if n == 7.0));
    }

    #[test]
    fn undefined_identifier_is_an_error_value() {
        let v = run_with_prelude("nope;");
        assert!(v.is_error());
    }

    #[test]
    fn try_catch_binds_tag_and_msg() {
        let v = run_with_prelude("try { nope; } catch err { => err.tag; }");
        assert!(matches!(v, Value::String(s) if s == "NotFoundError"));
    }

    #[test]
    fn operator_overload_dispatches_to_plus_method() {
        let v = run_with_prelude(
            "class Vec { \
                init $x { self.x = x; } \
                def __plus $other { return self.x + other.x; } \
            } \
            a := \\Vec (2); \
            b := \\Vec (3); \
            a + b;",
        );
        assert!(matches!(v, Value::Number(n) if n == 5.0));
    }

    #[test]
    fn block_runs_in_caller_scope_with_positional_params() {
        let dummy_span = crate::token::Span::new(
            crate::token::Position::new(1, 1),
            crate::token::Position::new(1, 1),
        );
        let block = BlockData {
            params: vec!["x".to_string()],
            body: BlockStatement {
                statements: vec![Stmt::Expression(Expr::Infix {
                    op: "+".to_string(),
                    left: Box::new(Expr::Identifier("x".to_string(), dummy_span)),
                    right: Box::new(Expr::Number(1.0, dummy_span)),
                    span: dummy_span,
                })],
                span: dummy_span,
            },
        };
        let env = Rc::new(Environment::root());
        let result = invoke_block(&block, vec![Value::Number(41.0)], &env);
        assert!(matches!(result, Value::Number(n) if n == 42.0));
    }
}
