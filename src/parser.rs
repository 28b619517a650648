use std::collections::HashMap;
use std::fmt::Write as _;

use log::debug;

use crate::error::CompileError;
use crate::instr::{BinaryOp, Instr, RegisteredFn, UnaryOp, UNARY_PRECEDENCE};
use crate::lexer::{Lexer, Token};

const MAX_ARITY: usize = 2;

/// Entries on the shunting-yard operator stack. `Open` marks a plain `(`,
/// `Call` marks the `(` that opens a function's argument list.
enum OpEntry {
    Open,
    Call { name: String },
    Unary(UnaryOp),
    Binary(BinaryOp),
}

impl OpEntry {
    fn precedence(&self) -> u8 {
        match self {
            OpEntry::Open | OpEntry::Call { .. } => 0,
            OpEntry::Unary(_) => UNARY_PRECEDENCE,
            OpEntry::Binary(op) => op.precedence(),
        }
    }
}

/// Shunting-yard compiler: one pass over the token stream, an explicit
/// operator stack, and a parallel argument-count stack for calls. Produces
/// the instruction sequence plus its postfix rendering.
pub(crate) struct Parser<'a> {
    funcs: &'a HashMap<(String, u8), RegisteredFn>,
    ops: Vec<OpEntry>,
    arg_counts: Vec<usize>,
    program: Vec<Instr>,
    postfix: String,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(funcs: &'a HashMap<(String, u8), RegisteredFn>) -> Self {
        Self {
            funcs,
            ops: Vec::new(),
            arg_counts: Vec::new(),
            program: Vec::new(),
            postfix: String::new(),
        }
    }

    pub(crate) fn compile(mut self, text: &str) -> Result<(Vec<Instr>, String), CompileError> {
        // The outer parenthesis pair folds end-of-input into ordinary
        // bracket matching.
        let wrapped = format!("({})", text);
        let tokens = Lexer::new(&wrapped).tokenize()?;

        let mut prev: Option<&Token> = None;
        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Number(value) => self.emit(Instr::PushNumber(*value)),
                Token::Ident(name) => {
                    if matches!(tokens.get(i + 1), Some(Token::LParen)) {
                        self.ops.push(OpEntry::Call { name: name.clone() });
                        self.arg_counts.push(0);
                        // The '(' belongs to the call marker.
                        i += 1;
                    } else {
                        // Bare identifier: a variable reference, resolved
                        // against the store on first evaluation.
                        self.emit(Instr::PushVariable {
                            name: name.clone(),
                            slot: None,
                        });
                    }
                }
                Token::LParen => self.ops.push(OpEntry::Open),
                Token::RParen => self.close_paren(prev)?,
                Token::Comma => self.comma()?,
                Token::Minus if unary_position(prev) => self.ops.push(OpEntry::Unary(UnaryOp::Neg)),
                Token::Not => self.ops.push(OpEntry::Unary(UnaryOp::Not)),
                Token::Plus => self.push_binary(BinaryOp::Add),
                Token::Minus => self.push_binary(BinaryOp::Sub),
                Token::Star => self.push_binary(BinaryOp::Mul),
                Token::Slash => self.push_binary(BinaryOp::Div),
                Token::Caret => self.push_binary(BinaryOp::Pow),
                Token::Lt => self.push_binary(BinaryOp::Lt),
                Token::Le => self.push_binary(BinaryOp::Le),
                Token::Gt => self.push_binary(BinaryOp::Gt),
                Token::Ge => self.push_binary(BinaryOp::Ge),
                Token::Eq => self.push_binary(BinaryOp::Eq),
                Token::Ne => self.push_binary(BinaryOp::Ne),
                Token::And => self.push_binary(BinaryOp::And),
                Token::Or => self.push_binary(BinaryOp::Or),
            }
            prev = Some(&tokens[i]);
            i += 1;
        }

        if !self.ops.is_empty() {
            return Err(CompileError::Syntax("missing ')'".into()));
        }
        debug!(
            "compiled {:?} to {} instructions: {}",
            text,
            self.program.len(),
            self.postfix
        );
        Ok((self.program, self.postfix))
    }

    fn emit(&mut self, instr: Instr) {
        if !self.postfix.is_empty() {
            self.postfix.push(' ');
        }
        let _ = write!(self.postfix, "{}", instr);
        self.program.push(instr);
    }

    /// Left-associative: pop every operator that binds at least as tightly.
    /// Unary operators bind tightest of all and are pushed directly at the
    /// match site above.
    fn push_binary(&mut self, op: BinaryOp) {
        while self
            .ops
            .last()
            .is_some_and(|top| top.precedence() >= op.precedence())
        {
            self.pop_op();
        }
        self.ops.push(OpEntry::Binary(op));
    }

    fn pop_op(&mut self) {
        match self.ops.pop() {
            Some(OpEntry::Unary(op)) => self.emit(Instr::Unary(op)),
            Some(OpEntry::Binary(op)) => self.emit(Instr::Binary(op)),
            // Callers only pop while the top is an operator.
            _ => {}
        }
    }

    fn pop_pending_operators(&mut self) {
        while matches!(
            self.ops.last(),
            Some(OpEntry::Unary(_) | OpEntry::Binary(_))
        ) {
            self.pop_op();
        }
    }

    fn comma(&mut self) -> Result<(), CompileError> {
        self.pop_pending_operators();
        match self.ops.last() {
            Some(OpEntry::Call { .. }) => {
                if let Some(count) = self.arg_counts.last_mut() {
                    *count += 1;
                }
                Ok(())
            }
            _ => Err(CompileError::Syntax("',' outside of a function call".into())),
        }
    }

    fn close_paren(&mut self, prev: Option<&Token>) -> Result<(), CompileError> {
        self.pop_pending_operators();
        match self.ops.pop() {
            Some(OpEntry::Open) => Ok(()),
            Some(OpEntry::Call { name }) => {
                let commas = self.arg_counts.pop().unwrap_or(0);
                // No commas and an immediately preceding '(' means an empty
                // argument list.
                let arity = if commas == 0 && matches!(prev, Some(Token::LParen)) {
                    0
                } else {
                    commas + 1
                };
                if arity > MAX_ARITY {
                    return Err(CompileError::TooManyArguments { name, count: arity });
                }
                let arity = arity as u8;
                if !self.funcs.contains_key(&(name.clone(), arity)) {
                    return Err(CompileError::FunctionNotFound { name, arity });
                }
                self.emit(Instr::Call {
                    name,
                    arity,
                    target: None,
                });
                Ok(())
            }
            None => Err(CompileError::Syntax("unexpected ')'".into())),
            // pop_pending_operators drained every Unary/Binary entry above.
            Some(OpEntry::Unary(_) | OpEntry::Binary(_)) => unreachable!(),
        }
    }
}

fn unary_position(prev: Option<&Token>) -> bool {
    prev.is_none_or(Token::starts_operand_position)
}
