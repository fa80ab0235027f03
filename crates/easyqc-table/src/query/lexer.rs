//! Tokenizer for filter queries.

use super::QueryError;

/// Reserved words. Matched case-insensitively against bare identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    Like,
    In,
    Is,
    Null,
    Between,
    Order,
    By,
    Asc,
    Desc,
    Limit,
    True,
    False,
}

impl Keyword {
    fn lookup(word: &str) -> Option<Self> {
        let kw = match word.to_ascii_uppercase().as_str() {
            "SELECT" => Self::Select,
            "FROM" => Self::From,
            "WHERE" => Self::Where,
            "AND" => Self::And,
            "OR" => Self::Or,
            "NOT" => Self::Not,
            "LIKE" => Self::Like,
            "IN" => Self::In,
            "IS" => Self::Is,
            "NULL" => Self::Null,
            "BETWEEN" => Self::Between,
            "ORDER" => Self::Order,
            "BY" => Self::By,
            "ASC" => Self::Asc,
            "DESC" => Self::Desc,
            "LIMIT" => Self::Limit,
            "TRUE" => Self::True,
            "FALSE" => Self::False,
            _ => return None,
        };
        Some(kw)
    }

    /// Whether `word` would lex as a keyword rather than an identifier.
    pub fn is_reserved(word: &str) -> bool {
        Self::lookup(word).is_some()
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    /// Column or table name, bare or quoted with backticks or brackets.
    Ident(String),
    /// `"double quoted"` name. Read as a string when no column matches.
    QuotedIdent(String),
    /// `'single quoted'` string literal.
    Str(String),
    Int(i64),
    Float(f64),
    Op(CmpOp),
    Comma,
    LParen,
    RParen,
    Star,
    Minus,
    Semicolon,
}

/// A token and its byte span in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

/// Characters allowed inside a bare identifier after the first.
fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Whether `name` can be written without quotes.
pub fn is_bare_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(is_ident_char) && !Keyword::is_reserved(name)
}

/// Write `name` so that it lexes back as the same identifier.
pub fn quote_identifier(name: &str) -> String {
    if is_bare_identifier(name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Split `input` into tokens.
pub fn tokenize(input: &str) -> Result<Vec<Token>, QueryError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let single = |kind| (kind, start + c.len_utf8());
        let (kind, end) = match c {
            ',' => single(TokenKind::Comma),
            '(' => single(TokenKind::LParen),
            ')' => single(TokenKind::RParen),
            '*' => single(TokenKind::Star),
            '-' => single(TokenKind::Minus),
            ';' => single(TokenKind::Semicolon),
            '=' => {
                chars.next();
                if chars.peek().is_some_and(|&(_, n)| n == '=') {
                    chars.next();
                    tokens.push(Token {
                        kind: TokenKind::Op(CmpOp::Eq),
                        start,
                        end: start + 2,
                    });
                    continue;
                }
                tokens.push(Token {
                    kind: TokenKind::Op(CmpOp::Eq),
                    start,
                    end: start + 1,
                });
                continue;
            }
            '!' | '<' | '>' => {
                chars.next();
                let next = chars.peek().map(|&(_, n)| n);
                let (op, len) = match (c, next) {
                    ('!', Some('=')) => (CmpOp::Ne, 2),
                    ('<', Some('>')) => (CmpOp::Ne, 2),
                    ('<', Some('=')) => (CmpOp::Le, 2),
                    ('>', Some('=')) => (CmpOp::Ge, 2),
                    ('<', _) => (CmpOp::Lt, 1),
                    ('>', _) => (CmpOp::Gt, 1),
                    _ => {
                        return Err(QueryError::Lex {
                            pos: start,
                            message: "expected '=' after '!'".into(),
                        })
                    }
                };
                if len == 2 {
                    chars.next();
                }
                tokens.push(Token {
                    kind: TokenKind::Op(op),
                    start,
                    end: start + len,
                });
                continue;
            }
            '\'' => {
                chars.next();
                let (text, end) = read_quoted(&mut chars, '\'', start)?;
                tokens.push(Token {
                    kind: TokenKind::Str(text),
                    start,
                    end,
                });
                continue;
            }
            '"' | '`' | '[' => {
                chars.next();
                let close = match c {
                    '[' => ']',
                    other => other,
                };
                let (text, end) = read_quoted(&mut chars, close, start)?;
                let kind = if c == '"' {
                    TokenKind::QuotedIdent(text)
                } else {
                    TokenKind::Ident(text)
                };
                tokens.push(Token {
                    kind,
                    start,
                    end,
                });
                continue;
            }
            c if c.is_ascii_digit() => {
                let mut end = start;
                let mut seen_dot = false;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_digit() || (d == '.' && !seen_dot) {
                        seen_dot |= d == '.';
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let text = &input[start..end];
                let kind = if seen_dot {
                    text.parse().map(TokenKind::Float).ok()
                } else {
                    text.parse().map(TokenKind::Int).ok()
                };
                let kind = kind.ok_or_else(|| QueryError::Lex {
                    pos: start,
                    message: format!("invalid number '{text}'"),
                })?;
                tokens.push(Token { kind, start, end });
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if is_ident_char(d) {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let word = &input[start..end];
                let kind = match Keyword::lookup(word) {
                    Some(kw) => TokenKind::Keyword(kw),
                    None => TokenKind::Ident(word.to_string()),
                };
                tokens.push(Token { kind, start, end });
                continue;
            }
            other => {
                return Err(QueryError::Lex {
                    pos: start,
                    message: format!("unexpected character '{other}'"),
                })
            }
        };
        chars.next();
        tokens.push(Token { kind, start, end });
    }
    Ok(tokens)
}

/// Read up to the closing `quote`; a doubled quote is an escaped quote.
/// Returns the text and the end offset after the closing quote.
fn read_quoted(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    quote: char,
    start: usize,
) -> Result<(String, usize), QueryError> {
    let mut text = String::new();
    while let Some((i, c)) = chars.next() {
        if c == quote {
            if quote != ']' && chars.peek().is_some_and(|&(_, n)| n == quote) {
                chars.next();
                text.push(quote);
                continue;
            }
            return Ok((text, i + c.len_utf8()));
        }
        text.push(c);
    }
    Err(QueryError::Lex {
        pos: start,
        message: "unterminated quoted text".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            kinds("select * From df"),
            vec![
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Star,
                TokenKind::Keyword(Keyword::From),
                TokenKind::Ident("df".into()),
            ]
        );
    }

    #[test]
    fn dotted_and_quoted_identifiers() {
        assert_eq!(
            kinds("alice.memory.score1 \"my col\" `b` [c d]"),
            vec![
                TokenKind::Ident("alice.memory.score1".into()),
                TokenKind::QuotedIdent("my col".into()),
                TokenKind::Ident("b".into()),
                TokenKind::Ident("c d".into()),
            ]
        );
    }

    #[test]
    fn literals_and_operators() {
        assert_eq!(
            kinds("a >= 2.5 and b <> 'it''s' or c == -3"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Op(CmpOp::Ge),
                TokenKind::Float(2.5),
                TokenKind::Keyword(Keyword::And),
                TokenKind::Ident("b".into()),
                TokenKind::Op(CmpOp::Ne),
                TokenKind::Str("it's".into()),
                TokenKind::Keyword(Keyword::Or),
                TokenKind::Ident("c".into()),
                TokenKind::Op(CmpOp::Eq),
                TokenKind::Minus,
                TokenKind::Int(3),
            ]
        );
    }

    #[test]
    fn spans_cover_source() {
        let tokens = tokenize("SELECT  _othervar_ FROM").unwrap();
        assert_eq!((tokens[1].start, tokens[1].end), (8, 18));
    }

    #[test]
    fn errors() {
        assert!(tokenize("a = 'open").is_err());
        assert!(tokenize("a ! b").is_err());
        assert!(tokenize("a # b").is_err());
    }

    #[test]
    fn quoting_round_trips() {
        assert_eq!(quote_identifier("score1"), "score1");
        assert_eq!(quote_identifier("sub-id"), "\"sub-id\"");
        assert_eq!(quote_identifier("order"), "\"order\"");
        assert_eq!(quote_identifier("0"), "\"0\"");
    }
}
