//! Protected scalar primitives and the set of building blocks trees are
//! drawn from.
//!
//! Every operation is total on the reals: instead of raising, it degrades to
//! a fixed sentinel (0 for log/sqrt/trig failures, 1 for div/pow/exp
//! failures). The sentinel values shape which trees survive selection, so
//! they are part of the contract, not an implementation detail.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::expr::Expr;

/// Magnitude above which add/sub/mul/tan results collapse to their sentinel.
const MAG_LIMIT: f64 = 1e10;

/// Divisors below this magnitude are treated as zero.
const DIV_GUARD: f64 = 1e-10;

/// A primitive operation with a fixed arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Sin,
    Cos,
    Tan,
    Sqrt,
    Log,
    Exp,
    Abs,
}

impl Op {
    pub fn name(self) -> &'static str {
        match self {
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Div => "div",
            Op::Pow => "pow",
            Op::Sin => "sin",
            Op::Cos => "cos",
            Op::Tan => "tan",
            Op::Sqrt => "sqrt",
            Op::Log => "log",
            Op::Exp => "exp",
            Op::Abs => "abs",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Pow => 2,
            _ => 1,
        }
    }

    /// Apply the protected operation. `args.len()` must equal `arity()`.
    pub fn apply(self, args: &[f64]) -> f64 {
        match self {
            Op::Add => bounded_or_zero(args[0] + args[1]),
            Op::Sub => bounded_or_zero(args[0] - args[1]),
            Op::Mul => bounded_or_zero(args[0] * args[1]),
            Op::Div => {
                if args[1].abs() < DIV_GUARD {
                    1.0
                } else {
                    let r = args[0] / args[1];
                    if r.is_finite() {
                        r
                    } else {
                        1.0
                    }
                }
            }
            Op::Pow => {
                let e = args[1].clamp(-5.0, 5.0);
                let r = (args[0].abs() + DIV_GUARD).powf(e);
                if r.is_finite() && r.abs() <= MAG_LIMIT {
                    r
                } else {
                    1.0
                }
            }
            Op::Sin => {
                let r = args[0].sin();
                if r.is_nan() {
                    0.0
                } else {
                    r
                }
            }
            Op::Cos => {
                let r = args[0].cos();
                if r.is_nan() {
                    0.0
                } else {
                    r
                }
            }
            Op::Tan => {
                let r = args[0].tan();
                if r.is_finite() && r.abs() <= MAG_LIMIT {
                    r
                } else {
                    0.0
                }
            }
            Op::Sqrt => {
                let r = args[0].abs().sqrt();
                if r.is_finite() {
                    r
                } else {
                    0.0
                }
            }
            Op::Log => {
                if args[0] <= 0.0 {
                    0.0
                } else {
                    let r = args[0].ln();
                    if r.is_finite() {
                        r
                    } else {
                        0.0
                    }
                }
            }
            Op::Exp => {
                let r = args[0].clamp(-30.0, 30.0).exp();
                if r.is_finite() {
                    r
                } else {
                    1.0
                }
            }
            Op::Abs => args[0].abs(),
        }
    }
}

fn bounded_or_zero(r: f64) -> f64 {
    if r.is_finite() && r.abs() <= MAG_LIMIT {
        r
    } else {
        0.0
    }
}

/// Sanitize a column name into a displayable identifier: anything that is
/// not alphanumeric or underscore becomes `_`, a leading digit is prefixed
/// with `x`, and an empty result falls back to `x`.
pub fn sanitize_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if sanitized.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        sanitized.insert(0, 'x');
    }
    if sanitized.is_empty() {
        sanitized = "x".to_string();
    }
    sanitized
}

/// The ordered set of primitives and terminals a run builds trees from.
/// Immutable after construction.
#[derive(Debug, Clone)]
pub struct PrimitiveSet {
    ops: Vec<Op>,
    variables: Vec<String>,
}

impl PrimitiveSet {
    /// Build the set from the configured operator and function names.
    /// Unknown names are a configuration error. Columns without a usable
    /// provided name are called `x{i}`.
    pub fn from_config(
        n_features: usize,
        variable_names: &[String],
        operators: &[String],
        functions: &[String],
    ) -> Result<Self, EngineError> {
        let mut ops = Vec::with_capacity(operators.len() + functions.len());
        for sym in operators {
            ops.push(match sym.as_str() {
                "+" => Op::Add,
                "-" => Op::Sub,
                "*" => Op::Mul,
                "/" => Op::Div,
                "^" => Op::Pow,
                other => {
                    return Err(EngineError::Config(format!("unknown operator: {other:?}")))
                }
            });
        }
        for name in functions {
            ops.push(match name.as_str() {
                "sin" => Op::Sin,
                "cos" => Op::Cos,
                "tan" => Op::Tan,
                "sqrt" => Op::Sqrt,
                "log" => Op::Log,
                "exp" => Op::Exp,
                "abs" => Op::Abs,
                other => {
                    return Err(EngineError::Config(format!("unknown function: {other:?}")))
                }
            });
        }

        let variables = (0..n_features)
            .map(|i| match variable_names.get(i) {
                Some(raw) => sanitize_name(raw),
                None => format!("x{i}"),
            })
            .collect();

        Ok(Self { ops, variables })
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn n_variables(&self) -> usize {
        self.variables.len()
    }

    /// Number of terminal atoms: one per input column plus the ephemeral
    /// constant generator.
    pub fn n_terminals(&self) -> usize {
        self.variables.len() + 1
    }

    pub fn random_op(&self, rng: &mut impl Rng) -> Op {
        self.ops[rng.gen_range(0..self.ops.len())]
    }

    /// Draw a terminal uniformly: each variable and the ephemeral constant
    /// are equally likely. Constants are drawn from U(-3, 3), rounded to two
    /// decimals, and frozen into the node.
    pub fn random_terminal(&self, rng: &mut impl Rng) -> Expr {
        let idx = rng.gen_range(0..self.n_terminals());
        if idx < self.variables.len() {
            Expr::Var(idx)
        } else {
            let c: f64 = rng.gen_range(-3.0..3.0);
            Expr::Const((c * 100.0).round() / 100.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn protected_ops_are_total_and_bounded() {
        let probes = [
            0.0,
            1.0,
            -1.0,
            1e-12,
            -1e-12,
            1e12,
            -1e12,
            f64::MAX,
            f64::MIN,
            std::f64::consts::PI,
        ];
        let ops = [
            Op::Add,
            Op::Sub,
            Op::Mul,
            Op::Div,
            Op::Pow,
            Op::Sin,
            Op::Cos,
            Op::Tan,
            Op::Sqrt,
            Op::Log,
            Op::Exp,
            Op::Abs,
        ];
        for op in ops {
            for &a in &probes {
                for &b in &probes {
                    let args = [a, b];
                    let r = op.apply(&args[..op.arity()]);
                    assert!(r.is_finite(), "{}({a}, {b}) not finite: {r}", op.name());
                }
            }
        }
    }

    #[test]
    fn div_by_near_zero_is_one() {
        assert_eq!(Op::Div.apply(&[5.0, 0.0]), 1.0);
        assert_eq!(Op::Div.apply(&[5.0, 1e-11]), 1.0);
        assert_eq!(Op::Div.apply(&[6.0, 2.0]), 3.0);
    }

    #[test]
    fn log_of_nonpositive_is_zero() {
        assert_eq!(Op::Log.apply(&[0.0]), 0.0);
        assert_eq!(Op::Log.apply(&[-3.0]), 0.0);
        assert!((Op::Log.apply(&[std::f64::consts::E]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pow_clamps_exponent() {
        // (|2| + 1e-10)^5 is the largest result a base of 2 can produce
        let capped = Op::Pow.apply(&[2.0, 100.0]);
        assert!((capped - 32.0).abs() < 1e-6);
    }

    #[test]
    fn overflow_products_collapse_to_zero() {
        assert_eq!(Op::Mul.apply(&[1e10, 1e10]), 0.0);
        assert_eq!(Op::Add.apply(&[f64::MAX, f64::MAX]), 0.0);
    }

    #[test]
    fn sanitize_rules() {
        assert_eq!(sanitize_name("temp (C)"), "temp__C_");
        assert_eq!(sanitize_name("2theta"), "x2theta");
        assert_eq!(sanitize_name(""), "x");
        assert_eq!(sanitize_name("ok_name"), "ok_name");
    }

    #[test]
    fn unknown_symbols_are_config_errors() {
        let err = PrimitiveSet::from_config(
            1,
            &["x".to_string()],
            &["%".to_string()],
            &[],
        );
        assert!(err.is_err());
    }

    #[test]
    fn ephemeral_constants_are_rounded_and_in_range() {
        let pset = PrimitiveSet::from_config(
            1,
            &["x".to_string()],
            &["+".to_string()],
            &[],
        )
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            if let Expr::Const(c) = pset.random_terminal(&mut rng) {
                assert!((-3.0..=3.0).contains(&c));
                assert!(((c * 100.0).round() / 100.0 - c).abs() < 1e-12);
            }
        }
    }
}
