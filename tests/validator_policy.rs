// tests/validator_policy.rs

use jobhost::script::parse;
use jobhost::validator::{
    ConstructKind, DEFAULT_DENIED_NAMES, ScriptValidator, ValidationPolicy, Verdict, validate,
};

fn check(src: &str, policy: &ValidationPolicy) -> Result<(), jobhost::validator::ValidationError> {
    let program = parse(src).unwrap_or_else(|e| panic!("{src}: {e}"));
    validate(&program, policy)
}

#[test]
fn default_policy_rejects_escapes() {
    let policy = ValidationPolicy::default();
    let cases = [
        ("import os", ConstructKind::Import),
        ("from os.path import join", ConstructKind::Import),
        ("x = eval(\"1\")", ConstructKind::DeniedName),
        ("f = open", ConstructKind::DeniedName),
        ("x = __builtins__", ConstructKind::PrivateName),
        ("x = job._secret", ConstructKind::PrivateAttribute),
        ("x = [1].__class__", ConstructKind::PrivateAttribute),
    ];

    for (src, kind) in cases {
        let err = check(src, &policy).expect_err(src);
        assert_eq!(err.kind, kind, "{src}: {err}");
        assert_eq!(err.line, 1);
    }
}

#[test]
fn every_default_denied_name_is_rejected() {
    let policy = ValidationPolicy::default();
    for name in DEFAULT_DENIED_NAMES {
        let src = format!("x = {name}");
        assert!(check(&src, &policy).is_err(), "{src} should be rejected");
    }
}

#[test]
fn default_policy_allows_ordinary_scripts() {
    let src = r#"
total = 0
for i in range(3) {
    total += [1, 2, 3][i]
}
while total > 100 { total -= 1 }
job.logger.info("total", total)
if total == 0 { raise "empty" }
result = total
"#;
    assert!(check(src, &ValidationPolicy::default()).is_ok());
}

#[test]
fn error_renders_with_line_number() {
    let err = check("a = 1\nb = 2\nimport os", &ValidationPolicy::default()).unwrap_err();
    assert_eq!(err.line, 3);
    assert_eq!(err.to_string(), "line 3: import of module 'os' is not allowed");
}

#[test]
fn first_violation_in_document_order_wins() {
    let err = check("x = job._a\nimport os", &ValidationPolicy::default()).unwrap_err();
    assert_eq!(err.kind, ConstructKind::PrivateAttribute);
    assert_eq!(err.line, 1);
}

#[test]
fn violations_inside_blocks_are_found() {
    let err = check(
        "if true {\n  while false {\n    y = exec\n  }\n}",
        &ValidationPolicy::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind, ConstructKind::DeniedName);
    assert_eq!(err.line, 3);
}

#[test]
fn policy_can_deny_each_optional_kind() {
    let cases = [
        ("x = job.name", ConstructKind::Attribute),
        ("x = [1][0]", ConstructKind::Subscript),
        ("x = len([])", ConstructKind::Call),
        ("while false { pass }", ConstructKind::WhileLoop),
        ("for i in [] { pass }", ConstructKind::ForLoop),
        ("raise \"no\"", ConstructKind::Raise),
    ];

    for (src, kind) in cases {
        assert!(check(src, &ValidationPolicy::default()).is_ok(), "{src}");

        let strict = ValidationPolicy::default().deny(kind);
        let err = check(src, &strict).expect_err(src);
        assert_eq!(err.kind, kind);
    }
}

#[test]
fn policy_can_allow_default_denied_kinds() {
    let relaxed = ValidationPolicy::default()
        .allow(ConstructKind::Import)
        .allow(ConstructKind::PrivateAttribute);
    assert!(check("import math", &relaxed).is_ok());
    assert!(check("x = job._hidden", &relaxed).is_ok());

    // Names are still checked inside an allowed import.
    let err = check("import os", &relaxed).unwrap_err();
    assert_eq!(err.kind, ConstructKind::DeniedName);
}

#[test]
fn extra_denied_names() {
    let policy = ValidationPolicy::default().deny_name("fetch");
    let err = check("x = fetch(1)", &policy).unwrap_err();
    assert_eq!(err.kind, ConstructKind::DeniedName);
    assert_eq!(err.reason, "use of 'fetch' is not allowed");

    let lenient = ValidationPolicy::default().with_rule(ConstructKind::DeniedName, Verdict::Allow);
    assert!(check("x = eval", &lenient).is_ok());
}

#[test]
fn script_validator_wraps_policy() {
    let validator = ScriptValidator::new(ValidationPolicy::default().deny(ConstructKind::Call));
    assert!(validator.policy().is_denied(ConstructKind::Call));

    let program = parse("print(1)").unwrap();
    assert!(validator.validate(&program).is_err());
    assert!(ScriptValidator::default().validate(&program).is_ok());
}
