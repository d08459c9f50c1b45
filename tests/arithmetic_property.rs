// tests/arithmetic_property.rs

use proptest::prelude::*;

use jobhost::script::{FaultKind, Value};
use jobhost_test_utils::run_script;

/// Small integer expression tree rendered both as script text and evaluated
/// on the host.
#[derive(Debug, Clone)]
enum Arith {
    Lit(i64),
    Add(Box<Arith>, Box<Arith>),
    Sub(Box<Arith>, Box<Arith>),
    Mul(Box<Arith>, Box<Arith>),
    Mod(Box<Arith>, Box<Arith>),
    Neg(Box<Arith>),
}

impl Arith {
    fn render(&self) -> String {
        match self {
            Arith::Lit(v) if *v < 0 => format!("({v})"),
            Arith::Lit(v) => v.to_string(),
            Arith::Add(a, b) => format!("({} + {})", a.render(), b.render()),
            Arith::Sub(a, b) => format!("({} - {})", a.render(), b.render()),
            Arith::Mul(a, b) => format!("({} * {})", a.render(), b.render()),
            Arith::Mod(a, b) => format!("({} % {})", a.render(), b.render()),
            Arith::Neg(a) => format!("(-{})", a.render()),
        }
    }

    /// `None` when the script is expected to fault (overflow or modulo by
    /// zero).
    fn eval(&self) -> Option<i64> {
        match self {
            Arith::Lit(v) => Some(*v),
            Arith::Add(a, b) => a.eval()?.checked_add(b.eval()?),
            Arith::Sub(a, b) => a.eval()?.checked_sub(b.eval()?),
            Arith::Mul(a, b) => a.eval()?.checked_mul(b.eval()?),
            Arith::Mod(a, b) => {
                let (a, b) = (a.eval()?, b.eval()?);
                if b == 0 {
                    return None;
                }
                let rem = a.checked_rem(b)?;
                Some(if rem != 0 && (rem < 0) != (b < 0) { rem + b } else { rem })
            }
            Arith::Neg(a) => a.eval()?.checked_neg(),
        }
    }
}

fn arith_strategy() -> impl Strategy<Value = Arith> {
    let leaf = (-1000i64..1000).prop_map(Arith::Lit);
    leaf.prop_recursive(4, 32, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Arith::Add(Box::new(a), Box::new(b))),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Arith::Sub(Box::new(a), Box::new(b))),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Arith::Mul(Box::new(a), Box::new(b))),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Arith::Mod(Box::new(a), Box::new(b))),
            inner.prop_map(|a| Arith::Neg(Box::new(a))),
        ]
    })
}

fn run_blocking(source: &str) -> (jobhost::script::Bindings, Result<(), jobhost::script::ExecutionFault>) {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime")
        .block_on(run_script(source))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn integer_scripts_match_host_arithmetic(expr in arith_strategy()) {
        let source = format!("result = {}", expr.render());
        let (bindings, outcome) = run_blocking(&source);

        match expr.eval() {
            Some(expected) => {
                prop_assert!(outcome.is_ok(), "{source}: {outcome:?}");
                prop_assert_eq!(bindings.get("result"), Some(&Value::Int(expected)));
            }
            None => {
                let fault = outcome.expect_err("expected a fault");
                prop_assert!(
                    matches!(fault.kind, FaultKind::Overflow | FaultKind::ZeroDivision),
                    "{source}: {fault}"
                );
            }
        }
    }
}
