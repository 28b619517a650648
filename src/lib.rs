//! A small infix expression engine built for per-sample evaluation.
//!
//! Expression text is compiled once (lexer, then a shunting-yard pass that
//! emits a postfix instruction sequence) and the compiled program is then
//! evaluated repeatedly against externally supplied variable values on a
//! reusable numeric stack. Steady-state evaluation allocates nothing.
//!
//! Transient numeric faults ([`EvalError::Math`]) are expected in a signal
//! path and can be absorbed by substituting a neutral value; structural
//! faults (unknown names, stack underflow) mean the program should be
//! considered uncompiled until the next successful [`Formula::compile`].

mod engine;
mod error;
mod functions;
mod instr;
mod lexer;
mod parser;

pub use engine::Formula;
pub use error::{CompileError, EvalError, FormulaError};
pub use instr::{Fn0, Fn1, Fn2};

/// One-shot convenience: compile `expression`, set `variables`, evaluate.
///
/// For per-sample use build a [`Formula`] and keep it compiled instead.
pub fn evaluate_expression(
    expression: &str,
    variables: &[(&str, f64)],
) -> Result<f64, FormulaError> {
    let mut formula = Formula::new();
    formula.set_variables(variables.iter().copied());
    formula.compile(expression)?;
    Ok(formula.evaluate()?)
}
