//! Recursive-descent parser for `SELECT ... FROM ... [WHERE ...]` statements.

use super::lexer::{tokenize, CmpOp, Keyword, Token, TokenKind};
use super::QueryError;
use crate::table::Value;

/// The only table a query can read from.
pub const TABLE_NAME: &str = "df";

/// A parsed query.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub select: Vec<SelectItem>,
    pub from: String,
    pub filter: Option<Expr>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// `*`
    All,
    Column(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub column: String,
    pub descending: bool,
}

/// A value-producing operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(String),
    Literal(Value),
    /// A double-quoted name: the column when one exists, else this text.
    Quoted(Value),
}

/// A boolean predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare(Operand, CmpOp, Operand),
    Like {
        operand: Operand,
        pattern: Operand,
        negated: bool,
    },
    InList {
        operand: Operand,
        list: Vec<Operand>,
        negated: bool,
    },
    IsNull {
        operand: Operand,
        negated: bool,
    },
    Between {
        operand: Operand,
        low: Operand,
        high: Operand,
        negated: bool,
    },
}

impl Expr {
    /// Every column the predicate must read. Double-quoted names are left
    /// out since they fall back to text.
    pub fn columns(&self) -> Vec<&str> {
        fn operand<'a>(op: &'a Operand, out: &mut Vec<&'a str>) {
            if let Operand::Column(c) = op {
                out.push(c);
            }
        }
        fn walk<'a>(expr: &'a Expr, out: &mut Vec<&'a str>) {
            match expr {
                Expr::And(a, b) | Expr::Or(a, b) => {
                    walk(a, out);
                    walk(b, out);
                }
                Expr::Not(e) => walk(e, out),
                Expr::Compare(a, _, b) => {
                    operand(a, out);
                    operand(b, out);
                }
                Expr::Like {
                    operand: a,
                    pattern: b,
                    ..
                } => {
                    operand(a, out);
                    operand(b, out);
                }
                Expr::InList {
                    operand: a, list, ..
                } => {
                    operand(a, out);
                    for item in list {
                        operand(item, out);
                    }
                }
                Expr::IsNull { operand: a, .. } => operand(a, out),
                Expr::Between {
                    operand: a,
                    low,
                    high,
                    ..
                } => {
                    operand(a, out);
                    operand(low, out);
                    operand(high, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }
}

/// Parse a full statement.
pub fn parse(input: &str) -> Result<Statement, QueryError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let statement = parser.statement()?;
    parser.eat(&TokenKind::Semicolon);
    if let Some(tok) = parser.peek() {
        return Err(parser.error_at(tok, "unexpected trailing input"));
    }
    Ok(statement)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        self.eat(&TokenKind::Keyword(kw))
    }

    fn expect_keyword(&mut self, kw: Keyword) -> Result<(), QueryError> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            let name = format!("{kw:?}").to_uppercase();
            Err(self.error_here(&format!("expected {name}")))
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), QueryError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error_here(&format!("expected {what}")))
        }
    }

    fn error_at(&self, tok: &Token, message: &str) -> QueryError {
        QueryError::Parse {
            pos: tok.start,
            message: message.to_string(),
        }
    }

    fn error_here(&self, message: &str) -> QueryError {
        match self.peek() {
            Some(tok) => self.error_at(tok, message),
            None => QueryError::Parse {
                pos: self.tokens.last().map_or(0, |t| t.end),
                message: format!("{message}, found end of query"),
            },
        }
    }

    fn identifier(&mut self, what: &str) -> Result<String, QueryError> {
        match self.peek_kind() {
            Some(TokenKind::Ident(name) | TokenKind::QuotedIdent(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error_here(&format!("expected {what}"))),
        }
    }

    fn statement(&mut self) -> Result<Statement, QueryError> {
        self.expect_keyword(Keyword::Select)?;
        let mut select = vec![self.select_item()?];
        while self.eat(&TokenKind::Comma) {
            select.push(self.select_item()?);
        }

        self.expect_keyword(Keyword::From)?;
        let from_pos = self.peek().map(|t| t.start);
        let from = self.identifier("table name")?;
        if !from.eq_ignore_ascii_case(TABLE_NAME) {
            return Err(QueryError::Parse {
                pos: from_pos.unwrap_or(0),
                message: format!("unknown table '{from}', expected {TABLE_NAME}"),
            });
        }

        let filter = if self.eat_keyword(Keyword::Where) {
            Some(self.or_expr()?)
        } else {
            None
        };

        let mut order_by = Vec::new();
        if self.eat_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            loop {
                let column = self.identifier("column name")?;
                let descending = if self.eat_keyword(Keyword::Desc) {
                    true
                } else {
                    self.eat_keyword(Keyword::Asc);
                    false
                };
                order_by.push(OrderItem { column, descending });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }

        let limit = if self.eat_keyword(Keyword::Limit) {
            match self.advance() {
                Some(Token {
                    kind: TokenKind::Int(n),
                    ..
                }) if n >= 0 => Some(usize::try_from(n).unwrap_or(usize::MAX)),
                Some(tok) => return Err(self.error_at(&tok, "LIMIT expects a non-negative integer")),
                None => return Err(self.error_here("LIMIT expects a non-negative integer")),
            }
        } else {
            None
        };

        Ok(Statement {
            select,
            from,
            filter,
            order_by,
            limit,
        })
    }

    fn select_item(&mut self) -> Result<SelectItem, QueryError> {
        if self.eat(&TokenKind::Star) {
            return Ok(SelectItem::All);
        }
        Ok(SelectItem::Column(self.identifier("column name or '*'")?))
    }

    fn or_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.and_expr()?;
        while self.eat_keyword(Keyword::Or) {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.not_expr()?;
        while self.eat_keyword(Keyword::And) {
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, QueryError> {
        if self.eat_keyword(Keyword::Not) {
            return Ok(Expr::Not(Box::new(self.not_expr()?)));
        }
        self.predicate()
    }

    fn predicate(&mut self) -> Result<Expr, QueryError> {
        if self.eat(&TokenKind::LParen) {
            let inner = self.or_expr()?;
            self.expect(&TokenKind::RParen, "')'")?;
            return Ok(inner);
        }

        let operand = self.operand()?;

        if let Some(TokenKind::Op(op)) = self.peek_kind() {
            let op = *op;
            self.pos += 1;
            let right = self.operand()?;
            return Ok(Expr::Compare(operand, op, right));
        }

        if self.eat_keyword(Keyword::Is) {
            let negated = self.eat_keyword(Keyword::Not);
            self.expect_keyword(Keyword::Null)?;
            return Ok(Expr::IsNull { operand, negated });
        }

        let negated = self.eat_keyword(Keyword::Not);
        if self.eat_keyword(Keyword::Like) {
            let pattern = self.operand()?;
            return Ok(Expr::Like {
                operand,
                pattern,
                negated,
            });
        }
        if self.eat_keyword(Keyword::In) {
            self.expect(&TokenKind::LParen, "'(' after IN")?;
            let mut list = vec![self.operand()?];
            while self.eat(&TokenKind::Comma) {
                list.push(self.operand()?);
            }
            self.expect(&TokenKind::RParen, "')'")?;
            return Ok(Expr::InList {
                operand,
                list,
                negated,
            });
        }
        if self.eat_keyword(Keyword::Between) {
            let low = self.operand()?;
            self.expect_keyword(Keyword::And)?;
            let high = self.operand()?;
            return Ok(Expr::Between {
                operand,
                low,
                high,
                negated,
            });
        }

        Err(self.error_here("expected a comparison, LIKE, IN, IS or BETWEEN"))
    }

    fn operand(&mut self) -> Result<Operand, QueryError> {
        let Some(tok) = self.advance() else {
            return Err(self.error_here("expected a value or column"));
        };
        let pos = tok.start;
        let unexpected = |message: &str| QueryError::Parse {
            pos,
            message: message.to_string(),
        };
        let operand = match tok.kind {
            TokenKind::Ident(name) => Operand::Column(name),
            TokenKind::QuotedIdent(name) => Operand::Quoted(Value::Text(name)),
            TokenKind::Str(s) => Operand::Literal(Value::Text(s)),
            TokenKind::Int(i) => Operand::Literal(Value::Int(i)),
            TokenKind::Float(f) => Operand::Literal(Value::Float(f)),
            TokenKind::Keyword(Keyword::True) => Operand::Literal(Value::Bool(true)),
            TokenKind::Keyword(Keyword::False) => Operand::Literal(Value::Bool(false)),
            TokenKind::Keyword(Keyword::Null) => Operand::Literal(Value::Null),
            TokenKind::Minus => match self.advance().map(|t| t.kind) {
                Some(TokenKind::Int(i)) => Operand::Literal(Value::Int(-i)),
                Some(TokenKind::Float(f)) => Operand::Literal(Value::Float(-f)),
                _ => return Err(unexpected("expected a number after '-'")),
            },
            _ => return Err(unexpected("expected a value or column")),
        };
        Ok(operand)
    }
}
