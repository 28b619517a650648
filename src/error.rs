use thiserror::Error;

/// Errors raised while turning expression text into a program.
///
/// A failed compile never touches the previously compiled program; the caller
/// can keep evaluating it and retry with corrected text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("too many arguments for '{name}': got {count}, at most 2")]
    TooManyArguments { name: String, count: usize },
    #[error("unknown function: {name}/{arity}")]
    FunctionNotFound { name: String, arity: u8 },
}

/// Errors raised while running a compiled program.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unknown variable: {0}")]
    VariableNotFound(String),
    #[error("unknown function: {name}/{arity}")]
    FunctionNotFound { name: String, arity: u8 },
    #[error("stack underflow")]
    StackUnderflow,
    #[error("math error: non-finite result")]
    Math,
}

impl EvalError {
    /// Whether this fault is transient. A transient fault (division by zero,
    /// domain error) depends only on the current operand values; the caller
    /// can substitute a neutral value and keep the program. Everything else
    /// means the program no longer matches its environment and evaluation
    /// should stop until the next successful compile.
    pub fn is_transient(&self) -> bool {
        matches!(self, EvalError::Math)
    }
}

/// Either phase's error, for one-shot entry points.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}
