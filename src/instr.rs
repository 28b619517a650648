use std::fmt;

pub type Fn0 = fn() -> f64;
pub type Fn1 = fn(f64) -> f64;
pub type Fn2 = fn(f64, f64) -> f64;

/// A registered native function, keyed by arity.
#[derive(Clone, Copy, Debug)]
pub(crate) enum RegisteredFn {
    Nullary(Fn0),
    Unary(Fn1),
    Binary(Fn2),
}

/// Binary operator kinds. Comparison and boolean operators push 1.0 or 0.0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Not,
}

/// Precedence of unary `-` and `!`: tighter than every binary operator,
/// including `^`, so `-2^2 == 4`.
pub(crate) const UNARY_PRECEDENCE: u8 = 7;

impl BinaryOp {
    /// Binding strength, low to high: `|`, `&`, comparisons, `+ -`, `* /`,
    /// `^`. All levels associate left to right.
    pub(crate) fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge
            | BinaryOp::Eq
            | BinaryOp::Ne => 3,
            BinaryOp::Add | BinaryOp::Sub => 4,
            BinaryOp::Mul | BinaryOp::Div => 5,
            BinaryOp::Pow => 6,
        }
    }

    /// Both operands are already on the stack when this runs; boolean
    /// operators therefore cannot short-circuit. Division by an exact zero
    /// is rejected by the evaluator before this is called.
    pub(crate) fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.powf(b),
            BinaryOp::Lt => (a < b) as i32 as f64,
            BinaryOp::Le => (a <= b) as i32 as f64,
            BinaryOp::Gt => (a > b) as i32 as f64,
            BinaryOp::Ge => (a >= b) as i32 as f64,
            BinaryOp::Eq => (a == b) as i32 as f64,
            BinaryOp::Ne => (a != b) as i32 as f64,
            BinaryOp::And => (a != 0.0 && b != 0.0) as i32 as f64,
            BinaryOp::Or => (a != 0.0 || b != 0.0) as i32 as f64,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
        }
    }
}

impl UnaryOp {
    pub(crate) fn apply(self, a: f64) -> f64 {
        match self {
            UnaryOp::Neg => -a,
            // zero -> 1, anything else -> 0
            UnaryOp::Not => (a == 0.0) as i32 as f64,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Not => "!",
        }
    }
}

/// One step of a compiled program. `PushVariable` and `Call` resolve their
/// name against the store/registry on first execution and cache the result;
/// caches live only as long as the program (a recompile produces fresh
/// instructions) and are reset whenever the environment changes.
#[derive(Clone, Debug)]
pub(crate) enum Instr {
    PushNumber(f64),
    PushVariable {
        name: String,
        slot: Option<usize>,
    },
    Unary(UnaryOp),
    Binary(BinaryOp),
    Call {
        name: String,
        arity: u8,
        target: Option<RegisteredFn>,
    },
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::PushNumber(v) => write!(f, "{}", v),
            Instr::PushVariable { name, .. } => write!(f, "{}", name),
            Instr::Unary(op) => write!(f, "{}", op.symbol()),
            Instr::Binary(op) => write!(f, "{}", op.symbol()),
            Instr::Call { name, arity, .. } => write!(f, "{}/{}", name, arity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_results_are_zero_or_one() {
        assert_eq!(BinaryOp::Lt.apply(1.0, 2.0), 1.0);
        assert_eq!(BinaryOp::Lt.apply(2.0, 1.0), 0.0);
        assert_eq!(BinaryOp::Ge.apply(2.0, 2.0), 1.0);
        assert_eq!(BinaryOp::Ne.apply(1.0, 1.0), 0.0);
    }

    #[test]
    fn boolean_operators_treat_nonzero_as_true() {
        assert_eq!(BinaryOp::And.apply(-3.0, 0.5), 1.0);
        assert_eq!(BinaryOp::And.apply(1.0, 0.0), 0.0);
        assert_eq!(BinaryOp::Or.apply(0.0, 0.0), 0.0);
        assert_eq!(BinaryOp::Or.apply(0.0, -1.0), 1.0);
    }

    #[test]
    fn not_truth_table() {
        assert_eq!(UnaryOp::Not.apply(0.0), 1.0);
        assert_eq!(UnaryOp::Not.apply(1.0), 0.0);
        assert_eq!(UnaryOp::Not.apply(-7.5), 0.0);
    }

    #[test]
    fn power_binds_below_unary() {
        assert!(BinaryOp::Pow.precedence() < UNARY_PRECEDENCE);
    }
}
