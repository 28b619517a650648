use std::collections::HashMap;

use crate::error::{CompileError, EvalError};
use crate::functions;
use crate::instr::{BinaryOp, Fn0, Fn1, Fn2, Instr, RegisteredFn};
use crate::parser::Parser;

/// Named variable slots. Values live in a stable arena indexed by slot
/// number, so a compiled program can cache an index instead of a name (or a
/// pointer, which would dangle across reallocation).
#[derive(Default)]
struct VarSlots {
    index: HashMap<String, usize>,
    values: Vec<f64>,
}

impl VarSlots {
    fn set(&mut self, name: &str, value: f64) {
        match self.index.get(name) {
            Some(&slot) => self.values[slot] = value,
            None => {
                self.index.insert(name.to_string(), self.values.len());
                self.values.push(value);
            }
        }
    }

    fn slot(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    fn get(&self, slot: usize) -> f64 {
        self.values[slot]
    }

    /// Unmaps the name. The orphaned arena entry is kept so slots cached by
    /// other instructions stay valid; it is reclaimed by `clear`.
    fn remove(&mut self, name: &str) -> bool {
        self.index.remove(name).is_some()
    }

    fn clear(&mut self) {
        self.index.clear();
        self.values.clear();
    }
}

/// One expression: its compiled program, variable store, function registry
/// and scratch stack. Compile once per text change, evaluate once per
/// sample.
///
/// ```
/// use formula_vm::Formula;
///
/// let mut formula = Formula::new();
/// formula.compile("sin(2*pi*p) * a").unwrap();
/// formula.set_variable("p", 0.25);
/// formula.set_variable("a", 0.5);
/// assert!((formula.evaluate().unwrap() - 0.5).abs() < 1e-12);
/// ```
pub struct Formula {
    program: Vec<Instr>,
    postfix: String,
    vars: VarSlots,
    funcs: HashMap<(String, u8), RegisteredFn>,
    stack: Vec<f64>,
}

impl Default for Formula {
    fn default() -> Self {
        Self::new()
    }
}

impl Formula {
    /// An engine with the default math function table and the `pi` and `e`
    /// constants pre-set as ordinary variables. The program is empty;
    /// evaluating before the first compile yields 0.
    pub fn new() -> Self {
        let mut formula = Self::bare();
        functions::register_defaults(&mut formula);
        formula.set_variable("pi", std::f64::consts::PI);
        formula.set_variable("e", std::f64::consts::E);
        formula
    }

    /// An engine with no registered functions and no variables.
    pub fn bare() -> Self {
        Self {
            program: Vec::new(),
            postfix: String::new(),
            vars: VarSlots::default(),
            funcs: HashMap::new(),
            stack: Vec::new(),
        }
    }

    /// Compiles `expression` and replaces the active program. On failure the
    /// previously compiled program is left untouched and stays evaluable.
    pub fn compile(&mut self, expression: &str) -> Result<(), CompileError> {
        let (program, postfix) = Parser::new(&self.funcs).compile(expression)?;
        self.program = program;
        self.postfix = postfix;
        Ok(())
    }

    /// The active program as space-separated postfix text. Empty until the
    /// first successful compile.
    pub fn postfix(&self) -> &str {
        &self.postfix
    }

    pub fn set_variable(&mut self, name: &str, value: f64) {
        self.vars.set(name, value);
    }

    /// Batch form of [`set_variable`](Self::set_variable) for the fixed set
    /// of externally driven inputs.
    pub fn set_variables<'a, I>(&mut self, values: I)
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        for (name, value) in values {
            self.vars.set(name, value);
        }
    }

    pub fn get_variable(&self, name: &str) -> Option<f64> {
        self.vars.slot(name).map(|slot| self.vars.get(slot))
    }

    pub fn remove_variable(&mut self, name: &str) {
        if self.vars.remove(name) {
            self.reset_bindings();
        }
    }

    pub fn remove_all_variables(&mut self) {
        self.vars.clear();
        self.reset_bindings();
    }

    pub fn register_fn0(&mut self, name: &str, f: Fn0) {
        self.funcs
            .insert((name.to_string(), 0), RegisteredFn::Nullary(f));
        self.reset_bindings();
    }

    pub fn register_fn1(&mut self, name: &str, f: Fn1) {
        self.funcs
            .insert((name.to_string(), 1), RegisteredFn::Unary(f));
        self.reset_bindings();
    }

    pub fn register_fn2(&mut self, name: &str, f: Fn2) {
        self.funcs
            .insert((name.to_string(), 2), RegisteredFn::Binary(f));
        self.reset_bindings();
    }

    /// Removes every arity of `name` from the registry.
    pub fn remove_function(&mut self, name: &str) {
        self.funcs.retain(|(n, _), _| n != name);
        self.reset_bindings();
    }

    pub fn remove_all_functions(&mut self) {
        self.funcs.clear();
        self.reset_bindings();
    }

    /// Drops every cached slot index and call target so the next evaluation
    /// re-resolves names against the current store and registry.
    fn reset_bindings(&mut self) {
        for instr in &mut self.program {
            match instr {
                Instr::PushVariable { slot, .. } => *slot = None,
                Instr::Call { target, .. } => *target = None,
                _ => {}
            }
        }
    }

    /// Runs the compiled program and returns the single resulting value.
    ///
    /// The scratch stack is reset, not reallocated, so steady-state calls do
    /// no heap work once it has reached its high-water mark. An empty
    /// program yields 0 without touching the stack.
    pub fn evaluate(&mut self) -> Result<f64, EvalError> {
        if self.program.is_empty() {
            return Ok(0.0);
        }
        let Formula {
            program,
            vars,
            funcs,
            stack,
            ..
        } = self;
        stack.clear();
        for instr in program.iter_mut() {
            match instr {
                Instr::PushNumber(value) => stack.push(*value),
                Instr::PushVariable { name, slot } => {
                    let index = match *slot {
                        Some(index) => index,
                        None => {
                            let index = vars
                                .slot(name)
                                .ok_or_else(|| EvalError::VariableNotFound(name.clone()))?;
                            *slot = Some(index);
                            index
                        }
                    };
                    stack.push(vars.get(index));
                }
                Instr::Unary(op) => {
                    let a = stack.pop().ok_or(EvalError::StackUnderflow)?;
                    stack.push(op.apply(a));
                }
                Instr::Binary(op) => {
                    let (b, a) = match (stack.pop(), stack.pop()) {
                        (Some(b), Some(a)) => (b, a),
                        _ => return Err(EvalError::StackUnderflow),
                    };
                    if *op == BinaryOp::Div && b == 0.0 {
                        return Err(EvalError::Math);
                    }
                    stack.push(op.apply(a, b));
                }
                Instr::Call {
                    name,
                    arity,
                    target,
                } => {
                    let f = match *target {
                        Some(f) => f,
                        None => {
                            let f = *funcs.get(&(name.clone(), *arity)).ok_or_else(|| {
                                EvalError::FunctionNotFound {
                                    name: name.clone(),
                                    arity: *arity,
                                }
                            })?;
                            *target = Some(f);
                            f
                        }
                    };
                    let value = match f {
                        RegisteredFn::Nullary(f) => f(),
                        RegisteredFn::Unary(f) => {
                            let a = stack.pop().ok_or(EvalError::StackUnderflow)?;
                            f(a)
                        }
                        RegisteredFn::Binary(f) => {
                            let (b, a) = match (stack.pop(), stack.pop()) {
                                (Some(b), Some(a)) => (b, a),
                                _ => return Err(EvalError::StackUnderflow),
                            };
                            f(a, b)
                        }
                    };
                    stack.push(value);
                }
            }
            // Every instruction must leave a finite value on top.
            match stack.last() {
                Some(top) if top.is_finite() => {}
                Some(_) => return Err(EvalError::Math),
                None => return Err(EvalError::StackUnderflow),
            }
        }
        if stack.len() != 1 {
            return Err(EvalError::StackUnderflow);
        }
        stack.pop().ok_or(EvalError::StackUnderflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expression: &str) -> Result<f64, EvalError> {
        let mut formula = Formula::new();
        formula.compile(expression).unwrap();
        formula.evaluate()
    }

    #[test]
    fn arithmetic_matches_reference_evaluator() {
        for expression in [
            "1+2*3",
            "2+3*4",
            "(10 + 20) * 3 / (4 - 1) + 5",
            "2^10",
            "1.5e2 - 0.5",
            "8-3-2",
            "max(1, 2) + min(3, 4)",
            "sqrt(16)",
            "abs(0 - 3)",
        ] {
            let expected = meval::eval_str(expression).unwrap();
            assert_eq!(eval(expression).unwrap(), expected, "{expression}");
        }
    }

    #[test]
    fn operator_precedence() {
        assert_eq!(eval("2+3*4").unwrap(), 14.0);
        assert_eq!(eval("2^3^2").unwrap(), 64.0);
    }

    #[test]
    fn unary_minus_binds_tighter_than_power() {
        assert_eq!(eval("-2^2").unwrap(), 4.0);
        assert_eq!(eval("2^-3").unwrap(), 0.125);
        assert_eq!(eval("--2").unwrap(), 2.0);
    }

    #[test]
    fn comparisons_produce_one_or_zero() {
        assert_eq!(eval("1 < 2").unwrap(), 1.0);
        assert_eq!(eval("2 <= 1").unwrap(), 0.0);
        assert_eq!(eval("3 == 3").unwrap(), 1.0);
        assert_eq!(eval("3 = 3").unwrap(), 1.0);
        assert_eq!(eval("3 != 3").unwrap(), 0.0);
        assert_eq!(eval("1 < 2 == 1").unwrap(), 1.0);
    }

    #[test]
    fn boolean_operators() {
        assert_eq!(eval("1 & 2").unwrap(), 1.0);
        assert_eq!(eval("1 & 0").unwrap(), 0.0);
        assert_eq!(eval("0 | 0").unwrap(), 0.0);
        assert_eq!(eval("0 | 3").unwrap(), 1.0);
        assert_eq!(eval("!0").unwrap(), 1.0);
        assert_eq!(eval("!3").unwrap(), 0.0);
        assert_eq!(eval("!-2").unwrap(), 0.0);
    }

    #[test]
    fn boolean_operators_do_not_short_circuit() {
        // Both operands are compiled and pushed before the operator runs.
        assert_eq!(eval("1 | (1/0)"), Err(EvalError::Math));
        assert_eq!(eval("0 & (1/0)"), Err(EvalError::Math));
    }

    #[test]
    fn division_by_zero_is_a_math_error() {
        assert_eq!(eval("1/0"), Err(EvalError::Math));
        assert_eq!(eval("0/0"), Err(EvalError::Math));
        assert!(eval("1/0").unwrap_err().is_transient());
    }

    #[test]
    fn math_domain_errors() {
        assert_eq!(eval("sqrt(0-1)"), Err(EvalError::Math));
        assert_eq!(eval("log(0)"), Err(EvalError::Math));
        // Negative base, fractional exponent.
        assert_eq!(eval("(0-8) ^ 0.5"), Err(EvalError::Math));
    }

    #[test]
    fn non_finite_literal_fails_at_evaluation() {
        let mut formula = Formula::new();
        formula.compile("1e999").unwrap();
        assert_eq!(formula.evaluate(), Err(EvalError::Math));
    }

    #[test]
    fn empty_expression_evaluates_to_zero() {
        assert_eq!(eval("").unwrap(), 0.0);
        assert_eq!(eval("   ").unwrap(), 0.0);
        assert_eq!(Formula::new().evaluate().unwrap(), 0.0);
    }

    #[test]
    fn variables_reflect_every_update() {
        let mut formula = Formula::new();
        formula.compile("x + y").unwrap();
        formula.set_variables([("x", 2.0), ("y", 3.0)]);
        assert_eq!(formula.evaluate().unwrap(), 5.0);
        formula.set_variable("x", 5.0);
        assert_eq!(formula.evaluate().unwrap(), 8.0);
        formula.set_variable("y", -8.0);
        assert_eq!(formula.evaluate().unwrap(), -3.0);
    }

    #[test]
    fn unknown_variable_is_a_structural_fault() {
        let mut formula = Formula::new();
        formula.compile("nope + 1").unwrap();
        let err = formula.evaluate().unwrap_err();
        assert_eq!(err, EvalError::VariableNotFound("nope".to_string()));
        assert!(!err.is_transient());
    }

    #[test]
    fn variable_defined_after_compile_resolves_on_first_use() {
        let mut formula = Formula::new();
        formula.compile("later * 2").unwrap();
        assert!(formula.evaluate().is_err());
        formula.set_variable("later", 21.0);
        assert_eq!(formula.evaluate().unwrap(), 42.0);
    }

    #[test]
    fn removed_variable_is_not_read_through_a_stale_slot() {
        let mut formula = Formula::new();
        formula.compile("x").unwrap();
        formula.set_variable("x", 1.0);
        assert_eq!(formula.evaluate().unwrap(), 1.0);
        formula.remove_variable("x");
        assert_eq!(
            formula.evaluate(),
            Err(EvalError::VariableNotFound("x".to_string()))
        );
        // Re-adding lands in a fresh slot and resolves again.
        formula.set_variable("x", 7.0);
        assert_eq!(formula.evaluate().unwrap(), 7.0);
    }

    #[test]
    fn nan_variable_fails_the_finiteness_check() {
        let mut formula = Formula::new();
        formula.compile("x").unwrap();
        formula.set_variable("x", f64::NAN);
        assert_eq!(formula.evaluate(), Err(EvalError::Math));
        formula.set_variable("x", f64::INFINITY);
        assert_eq!(formula.evaluate(), Err(EvalError::Math));
    }

    #[test]
    fn constants_are_ordinary_variables() {
        assert!((eval("pi").unwrap() - std::f64::consts::PI).abs() < 1e-15);
        assert!((eval("2*e").unwrap() - 2.0 * std::f64::consts::E).abs() < 1e-15);
        assert!(eval("sin(pi)").unwrap().abs() < 1e-12);
        // They can be shadowed and removed like any variable.
        let mut formula = Formula::new();
        formula.compile("pi").unwrap();
        formula.set_variable("pi", 3.0);
        assert_eq!(formula.evaluate().unwrap(), 3.0);
    }

    #[test]
    fn builtin_function_table() {
        assert_eq!(eval("max(2, 3)").unwrap(), 3.0);
        assert_eq!(eval("min(2, 3)").unwrap(), 2.0);
        assert_eq!(eval("mod(7, 3)").unwrap(), 1.0);
        assert_eq!(eval("pow(2, 10)").unwrap(), 1024.0);
        assert_eq!(eval("floor(1.9)").unwrap(), 1.0);
        assert_eq!(eval("ceil(1.1)").unwrap(), 2.0);
        assert_eq!(eval("log2(8)").unwrap(), 3.0);
        assert_eq!(eval("log10(1000)").unwrap(), 3.0);
        assert!((eval("atan2(1, 1)").unwrap() - std::f64::consts::FRAC_PI_4).abs() < 1e-15);
        assert!((eval("cos(0)").unwrap() - 1.0).abs() < 1e-15);
        assert!((eval("exp(1)").unwrap() - std::f64::consts::E).abs() < 1e-15);
        assert!((eval("tanh(0)").unwrap()).abs() < 1e-15);
    }

    #[test]
    fn custom_function_registration() {
        let mut formula = Formula::new();
        formula.register_fn0("answer", || 42.0);
        formula.register_fn1("double", |a| a * 2.0);
        formula.register_fn2("hypot", f64::hypot);
        formula.compile("double(answer()) + hypot(3, 4)").unwrap();
        assert_eq!(formula.evaluate().unwrap(), 89.0);
    }

    #[test]
    fn removed_function_fails_at_the_call_site() {
        let mut formula = Formula::new();
        formula.compile("sqrt(4)").unwrap();
        assert_eq!(formula.evaluate().unwrap(), 2.0);
        formula.remove_function("sqrt");
        // The compile-time check already passed; the runtime re-check
        // catches the now-missing target.
        let err = formula.evaluate().unwrap_err();
        assert_eq!(
            err,
            EvalError::FunctionNotFound {
                name: "sqrt".to_string(),
                arity: 1
            }
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn reregistering_a_function_replaces_the_cached_target() {
        let mut formula = Formula::new();
        formula.register_fn1("f", |a| a + 1.0);
        formula.compile("f(1)").unwrap();
        assert_eq!(formula.evaluate().unwrap(), 2.0);
        formula.register_fn1("f", |a| a * 10.0);
        assert_eq!(formula.evaluate().unwrap(), 10.0);
    }

    #[test]
    fn failed_compile_preserves_the_previous_program() {
        let mut formula = Formula::new();
        formula.compile("1+2").unwrap();
        assert_eq!(formula.evaluate().unwrap(), 3.0);
        assert!(formula.compile("(((").is_err());
        assert!(formula.compile("bar(1)").is_err());
        assert_eq!(formula.postfix(), "1 2 +");
        assert_eq!(formula.evaluate().unwrap(), 3.0);
    }

    #[test]
    fn successful_compile_replaces_the_program_atomically() {
        let mut formula = Formula::new();
        formula.compile("1+2").unwrap();
        formula.compile("10*2").unwrap();
        assert_eq!(formula.postfix(), "10 2 *");
        assert_eq!(formula.evaluate().unwrap(), 20.0);
    }

    #[test]
    fn repeated_evaluation_is_idempotent_and_allocation_stable() {
        let mut formula = Formula::new();
        formula
            .compile("sin(2*pi*x) * max(y, 0.5) + sqrt(abs(z))")
            .unwrap();
        formula.set_variables([("x", 0.125), ("y", 0.75), ("z", -4.0)]);
        let first = formula.evaluate().unwrap();
        let capacity = formula.stack.capacity();
        for _ in 0..1000 {
            assert_eq!(formula.evaluate().unwrap(), first);
        }
        assert_eq!(formula.stack.capacity(), capacity);
    }

    #[test]
    fn malformed_program_underflows_instead_of_crashing() {
        // "1 2" compiles to two pushes; the final depth check rejects it.
        assert_eq!(eval("1 2"), Err(EvalError::StackUnderflow));
        // "+1" compiles to a binary add with one operand.
        assert_eq!(eval("+1"), Err(EvalError::StackUnderflow));
        assert!(!eval("1 2").unwrap_err().is_transient());
    }

    #[test]
    fn bare_engine_has_no_builtins() {
        let mut formula = Formula::bare();
        assert_eq!(
            formula.compile("sqrt(4)"),
            Err(CompileError::FunctionNotFound {
                name: "sqrt".to_string(),
                arity: 1
            })
        );
        assert_eq!(formula.get_variable("pi"), None);
    }

    #[test]
    fn get_variable_reads_back_values() {
        let mut formula = Formula::new();
        formula.set_variable("x", 1.5);
        assert_eq!(formula.get_variable("x"), Some(1.5));
        assert_eq!(formula.get_variable("y"), None);
        formula.remove_all_variables();
        assert_eq!(formula.get_variable("x"), None);
        assert_eq!(formula.get_variable("pi"), None);
    }
}
