// src/script/lexer.rs

//! Tokeniser for job scripts.
//!
//! Newlines are significant (they terminate statements) except while inside
//! `(...)` or `[...]`, where they are skipped.

use std::fmt;

use super::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Keyword(Keyword),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Semicolon,
    Newline,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Int(v) => write!(f, "{v}"),
            Token::Float(v) => write!(f, "{v}"),
            Token::Str(_) => f.write_str("string literal"),
            Token::Ident(name) => write!(f, "'{name}'"),
            Token::Keyword(kw) => write!(f, "'{}'", kw.as_str()),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
            Token::LBrace => f.write_str("'{'"),
            Token::RBrace => f.write_str("'}'"),
            Token::Comma => f.write_str("','"),
            Token::Dot => f.write_str("'.'"),
            Token::Semicolon => f.write_str("';'"),
            Token::Newline => f.write_str("end of line"),
            Token::Assign => f.write_str("'='"),
            Token::PlusAssign => f.write_str("'+='"),
            Token::MinusAssign => f.write_str("'-='"),
            Token::StarAssign => f.write_str("'*='"),
            Token::Plus => f.write_str("'+'"),
            Token::Minus => f.write_str("'-'"),
            Token::Star => f.write_str("'*'"),
            Token::Slash => f.write_str("'/'"),
            Token::Percent => f.write_str("'%'"),
            Token::EqEq => f.write_str("'=='"),
            Token::NotEq => f.write_str("'!='"),
            Token::Lt => f.write_str("'<'"),
            Token::Le => f.write_str("'<='"),
            Token::Gt => f.write_str("'>'"),
            Token::Ge => f.write_str("'>='"),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Else,
    While,
    For,
    In,
    Break,
    Continue,
    Pass,
    Raise,
    Import,
    From,
    True,
    False,
    None,
    And,
    Or,
    Not,
}

impl Keyword {
    fn lookup(ident: &str) -> Option<Keyword> {
        let kw = match ident {
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "while" => Keyword::While,
            "for" => Keyword::For,
            "in" => Keyword::In,
            "break" => Keyword::Break,
            "continue" => Keyword::Continue,
            "pass" => Keyword::Pass,
            "raise" => Keyword::Raise,
            "import" => Keyword::Import,
            "from" => Keyword::From,
            "true" => Keyword::True,
            "false" => Keyword::False,
            "none" => Keyword::None,
            "and" => Keyword::And,
            "or" => Keyword::Or,
            "not" => Keyword::Not,
            _ => return None,
        };
        Some(kw)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::For => "for",
            Keyword::In => "in",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
            Keyword::Pass => "pass",
            Keyword::Raise => "raise",
            Keyword::Import => "import",
            Keyword::From => "from",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::None => "none",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::Not => "not",
        }
    }
}

/// A token plus the position it started at (1-based).
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
    pub column: u32,
}

/// Tokenise a whole script.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, SyntaxError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    column: u32,
    /// Nesting depth of `(` and `[`.
    depth: usize,
    out: Vec<Spanned>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
            depth: 0,
            out: Vec::new(),
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn bump_if(&mut self, expected: char) -> bool {
        if self.chars.peek() == Some(&expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error(&self, line: u32, column: u32, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            line,
            column,
            message: message.into(),
        }
    }

    fn push(&mut self, token: Token, line: u32, column: u32) {
        self.out.push(Spanned {
            token,
            line,
            column,
        });
    }

    fn run(mut self) -> Result<Vec<Spanned>, SyntaxError> {
        while let Some(&c) = self.chars.peek() {
            let (line, column) = (self.line, self.column);

            match c {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\\' => {
                    // Explicit line continuation.
                    self.bump();
                    if !self.bump_if('\n') {
                        return Err(self.error(line, column, "unexpected character '\\'"));
                    }
                }
                '\n' => {
                    self.bump();
                    if self.depth == 0 {
                        self.push(Token::Newline, line, column);
                    }
                }
                '#' => {
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '0'..='9' => {
                    let token = self.number(line, column)?;
                    self.push(token, line, column);
                }
                '"' | '\'' => {
                    let token = self.string(line, column)?;
                    self.push(token, line, column);
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let mut ident = String::new();
                    while let Some(&c) = self.chars.peek() {
                        if c.is_ascii_alphanumeric() || c == '_' {
                            ident.push(c);
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    let token = match Keyword::lookup(&ident) {
                        Some(kw) => Token::Keyword(kw),
                        None => Token::Ident(ident),
                    };
                    self.push(token, line, column);
                }
                _ => {
                    self.bump();
                    let token = self.punct(c, line, column)?;
                    self.push(token, line, column);
                }
            }
        }

        let (line, column) = (self.line, self.column);
        self.push(Token::Newline, line, column);
        self.push(Token::Eof, line, column);
        Ok(self.out)
    }

    fn punct(&mut self, c: char, line: u32, column: u32) -> Result<Token, SyntaxError> {
        let token = match c {
            '(' => {
                self.depth += 1;
                Token::LParen
            }
            '[' => {
                self.depth += 1;
                Token::LBracket
            }
            ')' | ']' => {
                if self.depth == 0 {
                    return Err(self.error(line, column, format!("unmatched '{c}'")));
                }
                self.depth -= 1;
                if c == ')' {
                    Token::RParen
                } else {
                    Token::RBracket
                }
            }
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            ',' => Token::Comma,
            '.' => Token::Dot,
            ';' => Token::Semicolon,
            '+' if self.bump_if('=') => Token::PlusAssign,
            '+' => Token::Plus,
            '-' if self.bump_if('=') => Token::MinusAssign,
            '-' => Token::Minus,
            '*' if self.bump_if('=') => Token::StarAssign,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '=' if self.bump_if('=') => Token::EqEq,
            '=' => Token::Assign,
            '!' if self.bump_if('=') => Token::NotEq,
            '<' if self.bump_if('=') => Token::Le,
            '<' => Token::Lt,
            '>' if self.bump_if('=') => Token::Ge,
            '>' => Token::Gt,
            other => {
                return Err(self.error(line, column, format!("unexpected character '{other}'")));
            }
        };
        Ok(token)
    }

    fn number(&mut self, line: u32, column: u32) -> Result<Token, SyntaxError> {
        let mut text = String::new();
        let mut is_float = false;

        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() || c == '_' {
                if c != '_' {
                    text.push(c);
                }
                self.bump();
            } else if c == '.' && !is_float {
                // `1.foo` is not a float; only take the dot when a digit follows.
                let mut lookahead = self.chars.clone();
                lookahead.next();
                match lookahead.peek() {
                    Some(d) if d.is_ascii_digit() => {
                        is_float = true;
                        text.push('.');
                        self.bump();
                    }
                    _ => break,
                }
            } else {
                break;
            }
        }

        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| self.error(line, column, format!("invalid float literal '{text}'")))
        } else {
            text.parse::<i64>()
                .map(Token::Int)
                .map_err(|_| self.error(line, column, format!("integer literal too large: {text}")))
        }
    }

    fn string(&mut self, line: u32, column: u32) -> Result<Token, SyntaxError> {
        let quote = self.bump().unwrap_or('"');
        let mut value = String::new();

        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(self.error(line, column, "unterminated string literal"));
                }
                Some(c) if c == quote => break,
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('\\') => '\\',
                        Some('\'') => '\'',
                        Some('"') => '"',
                        Some(other) => {
                            return Err(self.error(
                                self.line,
                                self.column,
                                format!("unknown escape sequence '\\{other}'"),
                            ));
                        }
                        None => {
                            return Err(self.error(line, column, "unterminated string literal"));
                        }
                    };
                    value.push(escaped);
                }
                Some(c) => value.push(c),
            }
        }

        Ok(Token::Str(value))
    }
}
