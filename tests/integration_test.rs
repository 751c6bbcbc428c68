// ABOUTME: End-to-end lexer -> parser -> evaluator tests over whole Pluto programs

use pluto_lang::env::Environment;
use pluto_lang::eval::eval_program;
use pluto_lang::parser::Parser;
use pluto_lang::value::Value;
use std::rc::Rc;

fn fresh_env() -> Rc<Environment> {
    let env = Rc::new(Environment::root());
    let prelude = Parser::new(pluto_lang::config::PRELUDE_SOURCE).parse_program();
    let result = eval_program(&prelude, &env);
    assert!(!result.is_error(), "prelude failed to load: {}", result);
    env
}

fn run(env: &Rc<Environment>, source: &str) -> Value {
    let mut parser = Parser::new(source);
    let program = parser.parse_program();
    assert!(parser.errors.is_empty(), "parse errors: {:?}", parser.errors);
    eval_program(&program, env)
}

#[test]
fn scenario_1_pattern_dispatch() {
    let env = fresh_env();
    let v = run(
        &env,
        r#"def greet $who { return "hi " + $who; } \greet ("world");"#,
    );
    assert!(matches!(v, Value::String(s) if s == "hi world"));
}

#[test]
fn scenario_2_scope_mutation() {
    let env = fresh_env();
    let v = run(&env, "x := 1; def bump { x = x + 1; } \\bump; \\bump; x;");
    assert!(matches!(v, Value::Number(n) if n == 3.0));
}

#[test]
fn scenario_3_block_threading_through_map() {
    let env = fresh_env();
    let v = run(
        &env,
        "sq := { x -> x * x }; \\map (sq) over ([1, 2, 3]);",
    );
    match v {
        Value::Array(items) => {
            let nums: Vec<f64> = items
                .into_iter()
                .map(|v| match v {
                    Value::Number(n) => n,
                    other => panic!("expected Number, got {:?}", other),
                })
                .collect();
            assert_eq!(nums, vec![1.0, 4.0, 9.0]);
        }
        other => panic!("expected Array, got {:?}", other),
    }
}

#[test]
fn scenario_4_error_propagation_from_zero_divisor() {
    let env = fresh_env();
    let v = run(
        &env,
        "\\left fold ([1, 2, 0, 4]) with ({ a b -> a / b });",
    );
    assert!(v.is_error(), "expected an error value, got {}", v);
    if let Value::Instance(inst) = &v {
        let fields = inst.fields.borrow();
        assert_eq!(
            fields.get("tag").map(|t| t.to_string()),
            Some("GeneralError".to_string())
        );
    }
}

#[test]
fn scenario_5_try_catch_routes_by_tag() {
    let env = fresh_env();
    let v = run(
        &env,
        r#"try { \index (10) of ([1,2,3]); } catch e { "NotFoundError" => "missing"; }"#,
    );
    assert!(matches!(v, Value::String(s) if s == "missing"));
}

#[test]
fn scenario_6_class_and_operator_overload() {
    let env = fresh_env();
    let v = run(
        &env,
        r#"class V { init $x { self.x = $x; } def __plus $o { return \V (self.x + $o.x); } } a = \V (1); b = \V (2); (a + b).x;"#,
    );
    assert!(matches!(v, Value::Number(n) if n == 3.0));
}

#[test]
fn map_patterns_mismatch_is_not_found_not_crash() {
    let env = fresh_env();
    let v = run(&env, "\\totally unknown (1) pattern;");
    assert!(v.is_error());
}

#[test]
fn for_loop_respects_break_and_next() {
    let env = fresh_env();
    let v = run(
        &env,
        "total := 0; \
         for x in [1, 2, 3, 4, 5] { \
             if x == 3 { next; } \
             if x == 5 { break; } \
             total = total + x; \
         } \
         total;",
    );
    assert!(matches!(v, Value::Number(n) if n == 7.0));
}

#[test]
fn match_evaluates_every_predicate_even_after_a_hit() {
    let env = fresh_env();
    let v = run(
        &env,
        "count := 0; \
         def bump_and_return $v { count = count + 1; return v; } \
         match 2 { \\bump_and_return (1), \\bump_and_return (2), \\bump_and_return (3) => \"matched\"; => \"no\"; } \
         count;",
    );
    assert!(matches!(v, Value::Number(n) if n == 3.0));
}
