// tests/script_language.rs

use jobhost::script::{
    FaultKind, MAX_LIST_DEPTH, MAX_SEQUENCE_LEN, ScriptLogLevel, Value, compile, parse,
};
use jobhost_test_utils::fakes::RecordingHost;
use jobhost_test_utils::{init_tracing, run_script, run_script_with};

fn int(i: i64) -> Value {
    Value::Int(i)
}

fn list(items: Vec<Value>) -> Value {
    Value::List(items)
}

#[tokio::test]
async fn result_binding_holds_last_assignment() {
    init_tracing();
    let (bindings, outcome) = run_script("result = 2 + 2").await;
    assert!(outcome.is_ok());
    assert_eq!(bindings.get("result"), Some(&int(4)));
}

#[tokio::test]
async fn arithmetic_follows_python_rules() {
    init_tracing();
    let src = r#"
a = 7 / 2
b = 7 % 3
c = -7 % 3
d = 7 % -3
e = 2 + 3 * 4
f = (2 + 3) * 4
g = 10 - 2 - 3
h = 1.5 * 2
"#;
    let (b, outcome) = run_script(src).await;
    assert!(outcome.is_ok(), "{outcome:?}");
    assert_eq!(b["a"], Value::Float(3.5));
    assert_eq!(b["b"], int(1));
    assert_eq!(b["c"], int(2));
    assert_eq!(b["d"], int(-2));
    assert_eq!(b["e"], int(14));
    assert_eq!(b["f"], int(20));
    assert_eq!(b["g"], int(5));
    assert_eq!(b["h"], Value::Float(3.0));
}

#[tokio::test]
async fn strings_and_lists() {
    init_tracing();
    let src = r#"
s = "ab" + 'cd'
r = "xy" * 3
l = [1, 2] + [3]
n = len(l)
has = 2 in l
sub = "bc" in s
first = l[0]
last = l[-1]
l[1] = 20
up = s.upper()
parts = "a,b,c".split(",")
joined = "-".join(parts)
"#;
    let (b, outcome) = run_script(src).await;
    assert!(outcome.is_ok(), "{outcome:?}");
    assert_eq!(b["s"], Value::Str("abcd".into()));
    assert_eq!(b["r"], Value::Str("xyxyxy".into()));
    assert_eq!(b["l"], list(vec![int(1), int(20), int(3)]));
    assert_eq!(b["n"], int(3));
    assert_eq!(b["has"], Value::Bool(true));
    assert_eq!(b["sub"], Value::Bool(true));
    assert_eq!(b["first"], int(1));
    assert_eq!(b["last"], int(3));
    assert_eq!(b["up"], Value::Str("ABCD".into()));
    assert_eq!(b["joined"], Value::Str("a-b-c".into()));
}

#[tokio::test]
async fn control_flow() {
    init_tracing();
    let src = r#"
total = 0
for i in range(10) {
    if i == 3 {
        continue
    } else if i == 7 {
        break
    }
    total += i
}

count = 0
while true {
    count += 1
    if count >= 5 { break }
}

kind = "none"
if not false and (1 < 2 or missing) {
    kind = "short-circuit"
}
"#;
    let (b, outcome) = run_script(src).await;
    assert!(outcome.is_ok(), "{outcome:?}");
    // 0 + 1 + 2 + 4 + 5 + 6
    assert_eq!(b["total"], int(18));
    assert_eq!(b["count"], int(5));
    assert_eq!(b["kind"], Value::Str("short-circuit".into()));
}

#[tokio::test]
async fn builtins() {
    init_tracing();
    let src = r#"
a = abs(-4)
b = min(3, 1, 2)
c = max([3, 9, 2])
d = int("42") + int(2.9)
e = float("1.5")
f = str(12) + str(none)
g = type([])
h = range(5, 0, -2)
"#;
    let (b, outcome) = run_script(src).await;
    assert!(outcome.is_ok(), "{outcome:?}");
    assert_eq!(b["a"], int(4));
    assert_eq!(b["b"], int(1));
    assert_eq!(b["c"], int(9));
    assert_eq!(b["d"], int(44));
    assert_eq!(b["e"], Value::Float(1.5));
    assert_eq!(b["f"], Value::Str("12none".into()));
    assert_eq!(b["g"], Value::Str("list".into()));
    assert_eq!(b["h"], list(vec![int(5), int(3), int(1)]));
}

#[tokio::test]
async fn raise_produces_raised_fault_with_message() {
    init_tracing();
    let (_, outcome) = run_script("x = 1\nraise \"x\"").await;
    let fault = outcome.expect_err("raise must fault");
    assert_eq!(fault.kind, FaultKind::Raised);
    assert_eq!(fault.message(), "x");
    assert_eq!(fault.line, 2);
}

#[tokio::test]
async fn runtime_faults_have_kinds() {
    init_tracing();
    let cases = [
        ("y = undefined_name", FaultKind::Name),
        ("y = 1 + \"a\"", FaultKind::Type),
        ("y = 1 / 0", FaultKind::ZeroDivision),
        ("y = 5 % 0", FaultKind::ZeroDivision),
        ("y = [1][3]", FaultKind::Index),
        ("y = 9223372036854775807 + 1", FaultKind::Overflow),
        ("y = int(\"nope\")", FaultKind::Value),
        ("job.sleep(-1)", FaultKind::Value),
    ];

    for (src, kind) in cases {
        let (_, outcome) = run_script(src).await;
        let fault = outcome.expect_err(src);
        assert_eq!(fault.kind, kind, "{src}: {fault}");
    }
}

#[tokio::test]
async fn growth_past_the_size_limit_is_a_value_fault() {
    init_tracing();
    let cases = [
        "x = [0] * 1000000\nfor i in range(5) { x = x + x }\nresult = len(x)",
        "s = \"ab\" * 500000\nfor i in range(5) { s = s + s }",
        "s = \"a\" * 1000000\nx = [s] * 2",
        "s = \"a\" * 1000000\nx = [s, s]",
        "s = \"a\" * 1000\nx = [s] * 1000\ny = \"-\".join(x)",
        "s = \"a\" * 1001\ny = s.replace(\"a\", s)",
        "x = [0] * 1000000\ny = [1, 2]\ny[0] = x",
    ];

    for src in cases {
        let (b, outcome) = run_script(src).await;
        let fault = outcome.expect_err(src);
        assert_eq!(fault.kind, FaultKind::Value, "{src}: {fault}");
        assert!(fault.message().contains(&MAX_SEQUENCE_LEN.to_string()), "{fault}");
        assert!(!b.contains_key("result"));
    }

    // Right at the limit is still allowed.
    let (b, outcome) = run_script("s = \"a\" * 1000\ny = s.replace(\"a\", s)\nresult = len(y)").await;
    assert!(outcome.is_ok(), "{outcome:?}");
    assert_eq!(b["result"], int(1_000_000));
}

#[tokio::test]
async fn list_nesting_is_capped() {
    init_tracing();
    let wraps = MAX_LIST_DEPTH - 1;
    let src = format!("x = []\nfor i in range({wraps}) {{ x = [x] }}\nresult = len(x)");
    let (b, outcome) = run_script(&src).await;
    assert!(outcome.is_ok(), "{outcome:?}");
    assert_eq!(b["result"], int(1));

    let src = format!("x = []\nfor i in range({}) {{ x = [x] }}", wraps + 1);
    let (_, outcome) = run_script(&src).await;
    let fault = outcome.expect_err("one level too deep");
    assert_eq!(fault.kind, FaultKind::Value);
    assert_eq!(fault.line, 2);
}

#[test]
fn long_operator_chains_stay_within_the_tree_limit() {
    let chain = vec!["1"; 200].join(" + ");
    assert!(parse(&format!("result = {chain}")).is_ok());

    let chain = vec!["1"; 400].join(" + ");
    let err = parse(&format!("result = {chain}")).expect_err("too deep");
    assert!(err.message.contains("too deeply nested"), "{err}");
}

#[tokio::test]
async fn bindings_before_fault_are_kept() {
    init_tracing();
    let (b, outcome) = run_script("a = 1\nb = a / 0\nc = 3").await;
    assert!(outcome.is_err());
    assert_eq!(b.get("a"), Some(&int(1)));
    assert!(!b.contains_key("c"));
}

#[tokio::test]
async fn job_handle_surface() {
    init_tracing();
    let host = RecordingHost::named("J1234abcd");
    let src = r#"
me = job.name
job.notify("hello")
job.notify("done", "Custom")
job.logger.warning("careful", 3)
print("sum", 1 + 2)
job.sleep(0)
"#;
    let (b, outcome) = run_script_with(src, &host).await;
    assert!(outcome.is_ok(), "{outcome:?}");
    assert_eq!(b["me"], Value::Str("J1234abcd".into()));
    assert_eq!(
        host.notifications(),
        vec![
            ("Job Message".to_string(), "hello".to_string()),
            ("Custom".to_string(), "done".to_string()),
        ]
    );
    assert_eq!(
        host.logs(),
        vec![
            (ScriptLogLevel::Warning, "careful 3".to_string()),
            (ScriptLogLevel::Info, "sum 3".to_string()),
        ]
    );
}

#[test]
fn syntax_errors_report_position() {
    let err = parse("a = 1\nb = (2 +\n").expect_err("unterminated expression");
    assert!(err.line >= 2, "{err}");

    assert!(parse("if true { a = 1").is_err());
    assert!(parse("a = 'unterminated").is_err());
    assert!(parse("a = 99999999999999999999").is_err());
    assert!(parse("a = 1 2").is_err());
}

#[test]
fn newlines_inside_brackets_are_ignored() {
    let program = parse("a = [\n  1,\n  2,\n]\nb = (1 +\n 2)").expect("parses");
    assert_eq!(program.body.len(), 2);
}

#[test]
fn compile_rejects_bad_targets_and_loose_break() {
    for src in ["f() = 1", "1 = a", "job.name = 'x'", "break", "if true { continue }"] {
        let program = parse(src).expect(src);
        assert!(compile(&program).is_err(), "{src} should not compile");
    }

    let program = parse("while true { break }").expect("parses");
    assert!(compile(&program).is_ok());
}
