// src/script/parser.rs

//! Recursive-descent parser producing a [`Program`].

use super::SyntaxError;
use super::ast::{BinOp, Expr, ExprKind, LogicalOp, Program, Stmt, StmtKind, UnaryOp};
use super::lexer::{Keyword, Spanned, Token, tokenize};

/// Deepest bracket, block or prefix-operator nesting accepted.
pub const MAX_NESTING: usize = 64;

/// Tallest expression tree accepted. Operator chains such as `a + b + c`
/// grow the tree by one level per operator.
pub const MAX_EXPR_DEPTH: u32 = 256;

/// Parse a job script into a syntax tree.
pub fn parse(source: &str) -> Result<Program, SyntaxError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let body = parser.statements(true)?;
    Ok(Program { body })
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Current recursion depth through `nested`.
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.current().token
    }

    fn current(&self) -> &Spanned {
        // The lexer always terminates the stream with `Eof`, and we never
        // advance past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn line(&self) -> u32 {
        self.current().line
    }

    fn advance(&mut self) -> Token {
        let token = self.current().token.clone();
        if !matches!(token, Token::Eof) {
            self.pos += 1;
        }
        token
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn check_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek(), Token::Keyword(k) if *k == kw)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.check_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        let current = self.current();
        SyntaxError {
            line: current.line,
            column: current.column,
            message: message.into(),
        }
    }

    /// Run `parse` one nesting level deeper, refusing input nested beyond
    /// [`MAX_NESTING`].
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!(
                "too many nested levels (limit {MAX_NESTING})"
            )));
        }
        self.depth += 1;
        let parsed = parse(self);
        self.depth -= 1;
        parsed
    }

    fn node(&self, kind: ExprKind, line: u32) -> Result<Expr, SyntaxError> {
        let expr = Expr::new(kind, line);
        if expr.depth() > MAX_EXPR_DEPTH {
            return Err(self.error(format!(
                "expression is too deeply nested (limit {MAX_EXPR_DEPTH})"
            )));
        }
        Ok(expr)
    }

    fn expect(&mut self, token: &Token, context: &str) -> Result<(), SyntaxError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {token} {context}, found {}",
                self.peek()
            )))
        }
    }

    fn ident(&mut self, context: &str) -> Result<String, SyntaxError> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected identifier {context}, found {other}"))),
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Token::Newline | Token::Semicolon) {
            self.advance();
        }
    }

    /// Parse statements until `}` (block) or end of input (top level).
    fn statements(&mut self, top_level: bool) -> Result<Vec<Stmt>, SyntaxError> {
        let mut body = Vec::new();
        self.skip_separators();

        loop {
            match self.peek() {
                Token::Eof if top_level => break,
                Token::Eof => return Err(self.error("expected '}' before end of input")),
                Token::RBrace if !top_level => break,
                Token::RBrace => return Err(self.error("unexpected '}'")),
                _ => {}
            }

            let (stmt, ends_with_block) = self.statement()?;
            body.push(stmt);

            match self.peek() {
                Token::Newline | Token::Semicolon => self.skip_separators(),
                Token::RBrace | Token::Eof => {}
                _ if ends_with_block => {}
                other => {
                    return Err(self.error(format!("expected end of statement, found {other}")));
                }
            }
        }

        Ok(body)
    }

    fn block(&mut self, context: &str) -> Result<Vec<Stmt>, SyntaxError> {
        self.expect(&Token::LBrace, context)?;
        let body = self.nested(|p| p.statements(false))?;
        self.expect(&Token::RBrace, "to close block")?;
        Ok(body)
    }

    /// Returns the statement and whether it ended with a `{ ... }` block.
    fn statement(&mut self) -> Result<(Stmt, bool), SyntaxError> {
        let line = self.line();

        let simple = |kind: StmtKind| -> Result<(Stmt, bool), SyntaxError> {
            Ok((Stmt { kind, line }, false))
        };

        match self.peek().clone() {
            Token::Keyword(Keyword::If) => {
                let kind = self.if_statement()?;
                Ok((Stmt { kind, line }, true))
            }
            Token::Keyword(Keyword::While) => {
                self.advance();
                let cond = self.expression()?;
                let body = self.block("after while condition")?;
                Ok((Stmt { kind: StmtKind::While { cond, body }, line }, true))
            }
            Token::Keyword(Keyword::For) => {
                self.advance();
                let var = self.ident("after 'for'")?;
                if !self.eat_keyword(Keyword::In) {
                    return Err(self.error(format!("expected 'in' after loop variable, found {}", self.peek())));
                }
                let iter = self.expression()?;
                let body = self.block("after for clause")?;
                Ok((Stmt { kind: StmtKind::For { var, iter, body }, line }, true))
            }
            Token::Keyword(Keyword::Break) => {
                self.advance();
                simple(StmtKind::Break)
            }
            Token::Keyword(Keyword::Continue) => {
                self.advance();
                simple(StmtKind::Continue)
            }
            Token::Keyword(Keyword::Pass) => {
                self.advance();
                simple(StmtKind::Pass)
            }
            Token::Keyword(Keyword::Raise) => {
                self.advance();
                let value = self.expression()?;
                simple(StmtKind::Raise(value))
            }
            Token::Keyword(Keyword::Import) => {
                self.advance();
                let module = self.dotted_name()?;
                simple(StmtKind::Import { module })
            }
            Token::Keyword(Keyword::From) => {
                self.advance();
                let module = self.dotted_name()?;
                if !self.eat_keyword(Keyword::Import) {
                    return Err(self.error(format!("expected 'import' after module name, found {}", self.peek())));
                }
                let mut names = vec![self.ident("after 'import'")?];
                while self.eat(&Token::Comma) {
                    names.push(self.ident("after ','")?);
                }
                simple(StmtKind::FromImport { module, names })
            }
            _ => {
                let target = self.expression()?;
                let aug = match self.peek() {
                    Token::PlusAssign => Some(BinOp::Add),
                    Token::MinusAssign => Some(BinOp::Sub),
                    Token::StarAssign => Some(BinOp::Mul),
                    _ => None,
                };

                if let Some(op) = aug {
                    self.advance();
                    let value = self.expression()?;
                    return simple(StmtKind::AugAssign { target, op, value });
                }

                if self.eat(&Token::Assign) {
                    let value = self.expression()?;
                    return simple(StmtKind::Assign { target, value });
                }

                simple(StmtKind::Expr(target))
            }
        }
    }

    fn if_statement(&mut self) -> Result<StmtKind, SyntaxError> {
        // Current token is `if`.
        self.advance();
        let cond = self.expression()?;
        let then_body = self.block("after if condition")?;

        let else_body = if self.eat_keyword(Keyword::Else) {
            if self.check_keyword(Keyword::If) {
                let line = self.line();
                let nested = self.nested(Self::if_statement)?;
                vec![Stmt { kind: nested, line }]
            } else {
                self.block("after 'else'")?
            }
        } else {
            Vec::new()
        };

        Ok(StmtKind::If {
            cond,
            then_body,
            else_body,
        })
    }

    fn dotted_name(&mut self) -> Result<String, SyntaxError> {
        let mut name = self.ident("as module name")?;
        while self.eat(&Token::Dot) {
            name.push('.');
            name.push_str(&self.ident("after '.'")?);
        }
        Ok(name)
    }

    fn expression(&mut self) -> Result<Expr, SyntaxError> {
        self.nested(Self::or_expr)
    }

    fn or_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.and_expr()?;
        while self.check_keyword(Keyword::Or) {
            let line = self.line();
            self.advance();
            let right = self.and_expr()?;
            left = self.node(
                ExprKind::Logical {
                    op: LogicalOp::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                line,
            )?;
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.not_expr()?;
        while self.check_keyword(Keyword::And) {
            let line = self.line();
            self.advance();
            let right = self.not_expr()?;
            left = self.node(
                ExprKind::Logical {
                    op: LogicalOp::And,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                line,
            )?;
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, SyntaxError> {
        if self.check_keyword(Keyword::Not) {
            let line = self.line();
            self.advance();
            let operand = self.nested(Self::not_expr)?;
            return self.node(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                line,
            );
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxError> {
        let left = self.additive()?;
        let op = match self.peek() {
            Token::EqEq => BinOp::Eq,
            Token::NotEq => BinOp::Ne,
            Token::Lt => BinOp::Lt,
            Token::Le => BinOp::Le,
            Token::Gt => BinOp::Gt,
            Token::Ge => BinOp::Ge,
            Token::Keyword(Keyword::In) => BinOp::In,
            _ => return Ok(left),
        };
        let line = self.line();
        self.advance();
        let right = self.additive()?;
        self.node(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            line,
        )
    }

    fn additive(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => return Ok(left),
            };
            let line = self.line();
            self.advance();
            let right = self.multiplicative()?;
            left = self.node(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                line,
            )?;
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => return Ok(left),
            };
            let line = self.line();
            self.advance();
            let right = self.unary()?;
            left = self.node(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                line,
            )?;
        }
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        if self.check(&Token::Minus) {
            let line = self.line();
            self.advance();
            let operand = self.nested(Self::unary)?;
            return self.node(
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                },
                line,
            );
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.primary()?;
        loop {
            let line = self.line();
            match self.peek() {
                Token::LParen => {
                    self.advance();
                    let args = self.comma_list(&Token::RParen, "to close argument list")?;
                    expr = self.node(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        line,
                    )?;
                }
                Token::Dot => {
                    self.advance();
                    let name = self.ident("after '.'")?;
                    expr = self.node(
                        ExprKind::Attribute {
                            object: Box::new(expr),
                            name,
                        },
                        line,
                    )?;
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(&Token::RBracket, "to close subscript")?;
                    expr = self.node(
                        ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        line,
                    )?;
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Parse `expr (, expr)* ,?` up to and including `close`.
    fn comma_list(&mut self, close: &Token, context: &str) -> Result<Vec<Expr>, SyntaxError> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.expression()?);
            if self.eat(&Token::Comma) {
                if self.eat(close) {
                    return Ok(items);
                }
                continue;
            }
            self.expect(close, context)?;
            return Ok(items);
        }
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let line = self.line();
        let kind = match self.advance() {
            Token::Int(v) => ExprKind::Int(v),
            Token::Float(v) => ExprKind::Float(v),
            Token::Str(s) => ExprKind::Str(s),
            Token::Keyword(Keyword::True) => ExprKind::Bool(true),
            Token::Keyword(Keyword::False) => ExprKind::Bool(false),
            Token::Keyword(Keyword::None) => ExprKind::None,
            Token::Ident(name) => ExprKind::Name(name),
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(&Token::RParen, "to close parenthesis")?;
                return Ok(inner);
            }
            Token::LBracket => {
                let items = self.comma_list(&Token::RBracket, "to close list")?;
                ExprKind::List(items)
            }
            other => {
                // Report against the token we just consumed.
                self.pos = self.pos.saturating_sub(usize::from(!matches!(other, Token::Eof)));
                return Err(self.error(format!("expected expression, found {other}")));
            }
        };
        self.node(kind, line)
    }
}
