use crate::{
    ast::{BinaryOp, Binding, Expr, ExprKind, Invocation, ParseResult, UnaryOp},
    token::{LexerSnapshot, ParseError, Position, SnapshotToken, Span, TokenKind},
};

type PResult<T> = Result<T, ParseError>;

/// Recursive constructs (parentheses, calls, `let`, `if`, prefix operators)
/// open at most this many levels at once.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Bound on the height of the produced tree. Every operator of a binary chain
/// adds one level, since chains associate to the left.
pub const MAX_TREE_HEIGHT: usize = 1024;

/// Recursive descent parser that tolerates a document ending mid-construct.
///
/// Running out of tokens never fails: the missing pieces become
/// [`ExprKind::Missing`] and the result is flagged `incomplete`. Any other
/// unexpected token is a hard [`ParseError`], and so is input nested deeper
/// than [`MAX_NESTING_DEPTH`] or [`MAX_TREE_HEIGHT`].
pub struct Parser<'a> {
    tokens: &'a [SnapshotToken],
    pos: usize,
    end: Position,
    last_end: Position,
    incomplete: bool,
    depth: usize,
    height: usize,
}

impl<'a> Parser<'a> {
    pub fn new(snapshot: &'a LexerSnapshot) -> Self {
        Self {
            tokens: &snapshot.tokens,
            pos: 0,
            end: snapshot.end_position(),
            last_end: Position::start(),
            incomplete: false,
            depth: 0,
            height: 0,
        }
    }

    pub fn parse(snapshot: &LexerSnapshot) -> PResult<ParseResult> {
        let mut parser = Parser::new(snapshot);
        let root = parser.parse_expr()?;

        if let Some(tok) = parser.peek() {
            return Err(ParseError::with_span(
                format!("unexpected {} '{}' after the end of the expression", tok.kind, tok.text),
                tok.span,
            ));
        }

        Ok(ParseResult {
            root,
            incomplete: parser.incomplete,
            line_lengths: snapshot.line_lengths.clone(),
        })
    }

    fn eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&'a SnapshotToken> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn is_keyword(&self, kw: &str) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == TokenKind::Keyword && t.text == kw)
    }

    fn bump(&mut self) -> Option<&'a SnapshotToken> {
        let tok = self.tokens.get(self.pos)?;
        self.pos += 1;
        self.last_end = tok.span.end;
        Some(tok)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(tok) => ParseError::with_span(format!("expected {}, found '{}'", expected, tok.text), tok.span),
            None => ParseError::with_span(format!("expected {}", expected), Span::single(self.end)),
        }
    }

    /// Consume a token of `kind`. `Ok(None)` means the document ended first.
    fn expect(&mut self, kind: TokenKind, expected: &str) -> PResult<Option<&'a SnapshotToken>> {
        match self.peek_kind() {
            None => {
                self.hit_end();
                Ok(None)
            }
            Some(k) if k == kind => Ok(self.bump()),
            Some(_) => Err(self.unexpected(expected)),
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> PResult<bool> {
        if self.eof() {
            self.hit_end();
            return Ok(false);
        }
        if self.is_keyword(kw) {
            self.bump();
            return Ok(true);
        }
        Err(self.unexpected(&format!("'{}'", kw)))
    }

    fn span_from(&self, start: Position) -> Span {
        Span::new(start, self.last_end.max(start))
    }

    /// The document ended inside a construct: every open node now reaches the end.
    fn hit_end(&mut self) {
        self.incomplete = true;
        self.last_end = self.end;
    }

    fn missing(&mut self) -> Expr {
        self.hit_end();
        Expr::missing(self.end)
    }

    fn too_deep(&self) -> ParseError {
        let span = self.peek().map(|t| t.span).unwrap_or(Span::single(self.end));
        ParseError::with_span("expression nested too deeply".to_string(), span)
    }

    /// Run `parse` one nesting level down.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_NESTING_DEPTH || self.height >= MAX_TREE_HEIGHT {
            return Err(self.too_deep());
        }
        self.depth += 1;
        self.height += 1;
        let result = parse(self);
        self.depth -= 1;
        self.height -= 1;
        result
    }

    /// Account for one more link of an operator or call chain; the caller gives the
    /// levels back once the chain is complete.
    fn link(&mut self, links: &mut usize) -> PResult<()> {
        if self.height >= MAX_TREE_HEIGHT {
            return Err(self.too_deep());
        }
        self.height += 1;
        *links += 1;
        Ok(())
    }

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.nested(Self::parse_expr_at_level)
    }

    fn parse_expr_at_level(&mut self) -> PResult<Expr> {
        if self.is_keyword("let") {
            return self.parse_let();
        }
        if self.is_keyword("if") {
            return self.parse_if();
        }
        self.parse_or()
    }

    fn parse_let(&mut self) -> PResult<Expr> {
        let start = self.bump().map(|t| t.span.start).unwrap_or(self.end);
        let mut bindings = Vec::new();

        loop {
            match self.parse_binding()? {
                Some(binding) => bindings.push(binding),
                None => break,
            }
            if self.peek_kind() == Some(TokenKind::Comma) {
                self.bump();
                continue;
            }
            break;
        }

        let body = if self.expect_keyword("in")? {
            self.parse_expr()?
        } else {
            self.missing()
        };

        Ok(Expr::new(
            ExprKind::Let {
                bindings,
                body: Box::new(body),
            },
            self.span_from(start),
        ))
    }

    /// `name = value`; `None` when the document ends before the name.
    fn parse_binding(&mut self) -> PResult<Option<Binding>> {
        let name_tok = match self.expect(TokenKind::Identifier, "a binding name")? {
            Some(tok) => tok,
            None => return Ok(None),
        };
        let value = if self.expect(TokenKind::Equal, "'='")?.is_some() {
            self.parse_expr()?
        } else {
            self.missing()
        };
        Ok(Some(Binding {
            name: name_tok.text.clone(),
            name_span: name_tok.span,
            value,
        }))
    }

    fn parse_if(&mut self) -> PResult<Expr> {
        let start = self.bump().map(|t| t.span.start).unwrap_or(self.end);
        let condition = self.parse_expr()?;
        let then_branch = if self.expect_keyword("then")? {
            self.parse_expr()?
        } else {
            self.missing()
        };
        let else_branch = if self.expect_keyword("else")? {
            self.parse_expr()?
        } else {
            self.missing()
        };
        Ok(Expr::new(
            ExprKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            self.span_from(start),
        ))
    }

    fn binary(&self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        let span = lhs.span.cover(&rhs.span);
        Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        )
    }

    /// Operand on the right of a binary operator; `let`/`if` are allowed there.
    fn parse_operand(&mut self, next: fn(&mut Self) -> PResult<Expr>) -> PResult<Expr> {
        if self.is_keyword("let") || self.is_keyword("if") {
            return self.parse_expr();
        }
        next(self)
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut links = 0;
        let mut expr = self.parse_and()?;
        while self.is_keyword("or") {
            self.bump();
            self.link(&mut links)?;
            let rhs = self.parse_operand(Self::parse_and)?;
            expr = self.binary(BinaryOp::Or, expr, rhs);
        }
        self.height -= links;
        Ok(expr)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut links = 0;
        let mut expr = self.parse_not()?;
        while self.is_keyword("and") {
            self.bump();
            self.link(&mut links)?;
            let rhs = self.parse_operand(Self::parse_not)?;
            expr = self.binary(BinaryOp::And, expr, rhs);
        }
        self.height -= links;
        Ok(expr)
    }

    fn parse_not(&mut self) -> PResult<Expr> {
        if self.is_keyword("not") {
            let start = self.bump().map(|t| t.span.start).unwrap_or(self.end);
            let operand = self.nested(|p| p.parse_operand(Self::parse_not))?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                self.span_from(start),
            ));
        }
        self.parse_equality()
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let mut links = 0;
        let mut expr = self.parse_relational()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Equal) => BinaryOp::Equal,
                Some(TokenKind::NotEqual) => BinaryOp::NotEqual,
                _ => break,
            };
            self.bump();
            self.link(&mut links)?;
            let rhs = self.parse_operand(Self::parse_relational)?;
            expr = self.binary(op, expr, rhs);
        }
        self.height -= links;
        Ok(expr)
    }

    fn parse_relational(&mut self) -> PResult<Expr> {
        let mut links = 0;
        let mut expr = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::LessThan) => BinaryOp::LessThan,
                Some(TokenKind::LessThanEqual) => BinaryOp::LessThanEqual,
                Some(TokenKind::GreaterThan) => BinaryOp::GreaterThan,
                Some(TokenKind::GreaterThanEqual) => BinaryOp::GreaterThanEqual,
                _ => break,
            };
            self.bump();
            self.link(&mut links)?;
            let rhs = self.parse_operand(Self::parse_additive)?;
            expr = self.binary(op, expr, rhs);
        }
        self.height -= links;
        Ok(expr)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut links = 0;
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Subtract,
                Some(TokenKind::Ampersand) => BinaryOp::Concatenate,
                _ => break,
            };
            self.bump();
            self.link(&mut links)?;
            let rhs = self.parse_operand(Self::parse_multiplicative)?;
            expr = self.binary(op, expr, rhs);
        }
        self.height -= links;
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut links = 0;
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Asterisk) => BinaryOp::Multiply,
                Some(TokenKind::Division) => BinaryOp::Divide,
                _ => break,
            };
            self.bump();
            self.link(&mut links)?;
            let rhs = self.parse_operand(Self::parse_unary)?;
            expr = self.binary(op, expr, rhs);
        }
        self.height -= links;
        Ok(expr)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        match self.peek_kind() {
            Some(TokenKind::Minus) => {
                let start = self.bump().map(|t| t.span.start).unwrap_or(self.end);
                let operand = self.nested(Self::parse_unary)?;
                Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Negate,
                        operand: Box::new(operand),
                    },
                    self.span_from(start),
                ))
            }
            Some(TokenKind::Plus) => {
                self.bump();
                self.nested(Self::parse_unary)
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut links = 0;
        let mut expr = self.parse_primary()?;
        while self.peek_kind() == Some(TokenKind::LeftParen) {
            self.link(&mut links)?;
            expr = self.parse_invocation(expr)?;
        }
        self.height -= links;
        Ok(expr)
    }

    fn parse_invocation(&mut self, callee: Expr) -> PResult<Expr> {
        let start = callee.span.start;
        let open = self.bump().map(|t| t.span.start).unwrap_or(self.end);
        let mut arguments = Vec::new();
        let mut separators = Vec::new();
        let mut close = None;

        if self.peek_kind() == Some(TokenKind::RightParen) {
            close = self.bump().map(|t| t.span.start);
        } else {
            loop {
                if self.eof() {
                    self.hit_end();
                    break;
                }
                arguments.push(self.parse_expr()?);
                match self.peek_kind() {
                    Some(TokenKind::Comma) => {
                        if let Some(tok) = self.bump() {
                            separators.push(tok.span.start);
                        }
                    }
                    Some(TokenKind::RightParen) => {
                        close = self.bump().map(|t| t.span.start);
                        break;
                    }
                    None => {
                        self.hit_end();
                        break;
                    }
                    Some(_) => return Err(self.unexpected("',' or ')'")),
                }
            }
        }

        Ok(Expr::new(
            ExprKind::Invoke(Invocation {
                callee: Box::new(callee),
                arguments,
                open,
                separators,
                close,
            }),
            self.span_from(start),
        ))
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let tok = match self.peek() {
            Some(tok) => tok,
            None => return Ok(self.missing()),
        };

        let kind = match tok.kind {
            TokenKind::Identifier => ExprKind::Identifier(tok.text.clone()),
            TokenKind::NumericLiteral => {
                let value = tok
                    .text
                    .parse::<f64>()
                    .map_err(|e| ParseError::with_span(format!("invalid number '{}': {}", tok.text, e), tok.span))?;
                ExprKind::Number(value)
            }
            TokenKind::TextLiteral => ExprKind::Text(unquote(&tok.text)),
            TokenKind::LogicalLiteral => ExprKind::Logical(tok.text == "true"),
            TokenKind::NullLiteral => ExprKind::Null,
            TokenKind::LeftParen => return self.parse_parenthesized(),
            TokenKind::LeftBrace => return self.parse_list(),
            TokenKind::LeftBracket => return self.parse_record(),
            TokenKind::Keyword if tok.text == "let" || tok.text == "if" => return self.parse_expr(),
            _ => return Err(self.unexpected("an expression")),
        };
        self.bump();
        Ok(Expr::new(kind, tok.span))
    }

    fn parse_parenthesized(&mut self) -> PResult<Expr> {
        let start = self.bump().map(|t| t.span.start).unwrap_or(self.end);
        let inner = self.parse_expr()?;
        self.expect(TokenKind::RightParen, "')'")?;
        Ok(Expr::new(ExprKind::Parenthesized(Box::new(inner)), self.span_from(start)))
    }

    fn parse_list(&mut self) -> PResult<Expr> {
        let start = self.bump().map(|t| t.span.start).unwrap_or(self.end);
        let mut items = Vec::new();
        if self.peek_kind() == Some(TokenKind::RightBrace) {
            self.bump();
            return Ok(Expr::new(ExprKind::List(items), self.span_from(start)));
        }
        loop {
            if self.eof() {
                self.hit_end();
                break;
            }
            items.push(self.parse_expr()?);
            match self.peek_kind() {
                Some(TokenKind::Comma) => {
                    self.bump();
                }
                _ => {
                    self.expect(TokenKind::RightBrace, "',' or '}'")?;
                    break;
                }
            }
        }
        Ok(Expr::new(ExprKind::List(items), self.span_from(start)))
    }

    fn parse_record(&mut self) -> PResult<Expr> {
        let start = self.bump().map(|t| t.span.start).unwrap_or(self.end);
        let mut fields = Vec::new();
        if self.peek_kind() == Some(TokenKind::RightBracket) {
            self.bump();
            return Ok(Expr::new(ExprKind::Record(fields), self.span_from(start)));
        }
        loop {
            match self.parse_binding()? {
                Some(field) => fields.push(field),
                None => break,
            }
            match self.peek_kind() {
                Some(TokenKind::Comma) => {
                    self.bump();
                }
                _ => {
                    self.expect(TokenKind::RightBracket, "',' or ']'")?;
                    break;
                }
            }
        }
        Ok(Expr::new(ExprKind::Record(fields), self.span_from(start)))
    }
}

/// Strip the surrounding quotes and collapse `""` escapes.
fn unquote(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);
    inner.replace("\"\"", "\"")
}
