use crate::error::CompileError;

/// One lexical unit of an expression. Tokens are produced once per compile,
/// consumed left to right and discarded; they hold no source positions.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    Not,
    And,
    Or,
    LParen,
    RParen,
    Comma,
}

impl Token {
    /// True for tokens after which a `-` or `!` reads as a unary operator.
    pub(crate) fn starts_operand_position(&self) -> bool {
        !matches!(self, Token::Number(_) | Token::Ident(_) | Token::RParen)
    }
}

pub(crate) struct Lexer<'a> {
    src: &'a [u8],
    i: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(s: &'a str) -> Self {
        Self {
            src: s.as_bytes(),
            i: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.i).copied()
    }

    fn bump(&mut self) {
        self.i += 1;
    }

    /// If the next byte is `b`, consume it.
    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Lex the whole source. The parser wraps expressions in one outer
    /// parenthesis pair, so byte index `i` here is the 1-based column of the
    /// caller's original text and is reported as-is in errors.
    pub(crate) fn tokenize(mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek() {
            let token = match c {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.bump();
                    continue;
                }
                b'(' => {
                    self.bump();
                    Token::LParen
                }
                b')' => {
                    self.bump();
                    Token::RParen
                }
                b',' => {
                    self.bump();
                    Token::Comma
                }
                b'+' => {
                    self.bump();
                    Token::Plus
                }
                b'-' => {
                    self.bump();
                    Token::Minus
                }
                b'*' => {
                    self.bump();
                    Token::Star
                }
                b'/' => {
                    self.bump();
                    Token::Slash
                }
                b'^' => {
                    self.bump();
                    Token::Caret
                }
                // `=` and `==` both mean equality.
                b'=' => {
                    self.bump();
                    self.eat(b'=');
                    Token::Eq
                }
                b'!' => {
                    self.bump();
                    if self.eat(b'=') {
                        Token::Ne
                    } else {
                        Token::Not
                    }
                }
                b'<' => {
                    self.bump();
                    if self.eat(b'=') {
                        Token::Le
                    } else {
                        Token::Lt
                    }
                }
                b'>' => {
                    self.bump();
                    if self.eat(b'=') {
                        Token::Ge
                    } else {
                        Token::Gt
                    }
                }
                b'&' => {
                    self.bump();
                    Token::And
                }
                b'|' => {
                    self.bump();
                    Token::Or
                }
                c if c.is_ascii_digit() || c == b'.' => self.lex_number()?,
                c if c.is_ascii_alphabetic() || c == b'_' => self.lex_ident(),
                c => {
                    return Err(CompileError::Syntax(format!(
                        "invalid character '{}' at column {}",
                        c as char, self.i
                    )))
                }
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn lex_number(&mut self) -> Result<Token, CompileError> {
        let start = self.i;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.eat(b'.') {
            // A bare trailing dot is not a number.
            if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                return Err(CompileError::Syntax(format!(
                    "expected digit after '.' at column {}",
                    self.i
                )));
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if self.peek() == Some(b'e') || self.peek() == Some(b'E') {
            self.bump();
            if self.peek() == Some(b'+') || self.peek() == Some(b'-') {
                self.bump();
            }
            if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                return Err(CompileError::Syntax(format!(
                    "expected digit in exponent at column {}",
                    self.i
                )));
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.i]).unwrap_or_default();
        let value: f64 = text
            .parse()
            .map_err(|_| CompileError::Syntax(format!("invalid number '{}'", text)))?;
        Ok(Token::Number(value))
    }

    fn lex_ident(&mut self) -> Token {
        let start = self.i;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
        {
            self.bump();
        }
        let name = std::str::from_utf8(&self.src[start..self.i])
            .unwrap_or_default()
            .to_string();
        Token::Ident(name)
    }
}
