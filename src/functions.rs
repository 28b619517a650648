//! The default math function table.

use crate::engine::Formula;

/// Registers the fixed built-in set. `pi` and `e` are pre-set as ordinary
/// variables by [`Formula::new`], not as functions.
pub(crate) fn register_defaults(formula: &mut Formula) {
    formula.register_fn1("acos", f64::acos);
    formula.register_fn1("asin", f64::asin);
    formula.register_fn1("atan", f64::atan);
    formula.register_fn2("atan2", f64::atan2);
    formula.register_fn1("cos", f64::cos);
    formula.register_fn1("cosh", f64::cosh);
    formula.register_fn1("exp", f64::exp);
    formula.register_fn1("abs", f64::abs);
    formula.register_fn2("mod", |a, b| a % b);
    formula.register_fn1("log", f64::ln);
    formula.register_fn1("log2", f64::log2);
    formula.register_fn1("log10", f64::log10);
    formula.register_fn2("pow", f64::powf);
    formula.register_fn1("sin", f64::sin);
    formula.register_fn1("sinh", f64::sinh);
    formula.register_fn1("tan", f64::tan);
    formula.register_fn1("tanh", f64::tanh);
    formula.register_fn1("sqrt", f64::sqrt);
    formula.register_fn1("ceil", f64::ceil);
    formula.register_fn1("floor", f64::floor);
    formula.register_fn2("max", f64::max);
    formula.register_fn2("min", f64::min);
}
