//! End-to-end scenarios exercising the driver, the macro/conditional
//! machinery, and the calculator frontend together, the way a real
//! caller would use the crate rather than poking at one module.

use includium::{PreprocessorConfig, PreprocessorDriver};

#[test]
fn macro_body_is_not_reparenthesized() {
    // Expansion never adds grouping parentheses around a substituted
    // body; it re-tokenizes and re-emits the expanded text with a single
    // space between every token instead.
    let mut driver = PreprocessorDriver::new();
    let out = driver.process("#define A 1+2\nA*A\n").unwrap();
    assert_eq!(out.trim_end(), "1 + 2 * 1 + 2");
}

#[test]
fn function_like_macro_substitutes_arguments() {
    let mut driver = PreprocessorDriver::new();
    let out = driver.process("#define M(x,y) x+y\nM(3,4)\n").unwrap();
    assert_eq!(out.trim_end(), "3 + 4");
}

#[test]
fn conditional_picks_the_true_branch() {
    let mut driver = PreprocessorDriver::new();
    let out = driver.process("#if 2+2==4\nyes\n#else\nno\n#endif\n").unwrap();
    assert_eq!(out.trim_end(), "yes");
}

#[test]
fn ifdef_on_undefined_name_emits_nothing() {
    let mut driver = PreprocessorDriver::new();
    let out = driver.process("#ifdef X\nA\n#endif\n").unwrap();
    assert!(out.trim().is_empty());
}

#[test]
fn stringify_quotes_the_argument_spelling() {
    let mut driver = PreprocessorDriver::new();
    let out = driver.process("#define S(a) #a\nS(hello world)\n").unwrap();
    assert_eq!(out.trim_end(), "\"hello world\"");
}

#[test]
fn token_pasting_joins_adjacent_lexemes() {
    let mut driver = PreprocessorDriver::new();
    let out = driver.process("#define P(a,b) a##b\nP(foo,42)\n").unwrap();
    assert_eq!(out.trim_end(), "foo42");
}

#[test]
fn self_referential_macro_is_reported_as_recursion() {
    // The recursion guard disables a macro's name while its own body is
    // being expanded, so a macro that expands to itself hits its own
    // disabled name immediately and is reported as a recursion error.
    let mut driver = PreprocessorDriver::new();
    let err = driver.process("#define A A\nA\n").unwrap_err();
    assert!(err.message().contains("Recursing macros"));
}

#[test]
fn defined_operator_sees_a_predefined_macro() {
    let mut driver = PreprocessorDriver::new();
    driver.define("FOO", None, "1", false).unwrap();
    let out = driver.process("#if defined(FOO)\n1\n#else\n2\n#endif\n").unwrap();
    assert_eq!(out.trim_end(), "1");
}

#[test]
fn duplicate_define_is_an_error() {
    let mut driver = PreprocessorDriver::new();
    let err = driver.process("#define A\n#define A\n").unwrap_err();
    assert!(err.message().contains("already defined"));
}

#[test]
fn unterminated_if_is_reported_at_end_of_input() {
    let mut driver = PreprocessorDriver::new();
    let err = driver.process("#if 1\n").unwrap_err();
    assert!(err.message().contains("Unterminated"));
}

#[test]
fn variadic_macro_collects_remaining_arguments() {
    let mut driver = PreprocessorDriver::new();
    let out = driver.process("#define LOG(fmt, ...) fmt __VA_ARGS__\nLOG(\"x\", 1, 2, 3)\n").unwrap();
    assert_eq!(out.trim_end(), "\"x\" 1 , 2 , 3");
}

#[test]
fn pragma_once_suppresses_a_repeated_include() {
    let mut driver = PreprocessorDriver::new().with_include_resolver(|path, _, _| {
        if path == "guarded.h" { Some("#pragma once\n#define GUARD 1\n".to_string()) } else { None }
    });
    let out = driver.process("#include \"guarded.h\"\n#include \"guarded.h\"\nGUARD\n").unwrap();
    assert_eq!(out.trim(), "1");
}

#[test]
fn include_cycle_is_rejected() {
    let mut driver = PreprocessorDriver::new().with_include_resolver(|path, _, _| {
        if path == "self.h" { Some("#include \"self.h\"\n".to_string()) } else { None }
    });
    let err = driver.process("#include \"self.h\"\n").unwrap_err();
    assert!(err.message().contains("cycle"));
}

#[test]
fn bitwise_and_shift_operators_are_wired_into_conditionals() {
    let mut driver = PreprocessorDriver::new();
    let out = driver
        .process(
            "#if (6 & 3) == 2\na\n#endif\n#if (1 | 2) == 3\nb\n#endif\n#if (5 ^ 1) == 4\nc\n#endif\n\
             #if (1 << 4) == 16\nd\n#endif\n#if (256 >> 4) == 16\ne\n#endif\n",
        )
        .unwrap();
    for expected in ["a", "b", "c", "d", "e"] {
        assert!(out.contains(expected), "missing {expected} in {out:?}");
    }
}

#[test]
fn target_and_compiler_macros_are_predefined() {
    let out = includium::process("#ifdef __linux__\n#ifdef __GNUC__\nboth\n#endif\n#endif\n", &PreprocessorConfig::for_linux())
        .unwrap();
    assert_eq!(out.trim_end(), "both");
}

#[test]
fn calculator_frontend_evaluates_arithmetic_independent_of_the_driver() {
    let expr = includium::parse_expression("2 + 3 * (4 - 1)").unwrap();
    let value = includium::run_expression(&expr, &|_| None).unwrap();
    assert_eq!(value, 11.0);
}

#[test]
fn calculator_frontend_resolves_identifiers_through_the_caller_lookup() {
    let expr = includium::parse_expression("x * 2").unwrap();
    let value = includium::run_expression(&expr, &|name| if name == "x" { Some(21.0) } else { None }).unwrap();
    assert_eq!(value, 42.0);
}
