//! SQL fragment builder.
//!
//! A [`SQL`] is a flat list of [`SQLChunk`]s. Rendering inserts spaces between
//! chunks except around punctuation, and writes a positional `?` for every
//! parameter so the text and the parameter list always line up.

use compact_str::CompactString;
use core::fmt::{self, Display, Write};
use smallvec::SmallVec;

use crate::value::Value;

/// SQL keywords and punctuation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    SELECT,
    DISTINCT,
    FROM,
    WHERE,
    AND,
    OR,
    NOT,
    AS,
    ON,
    INNER,
    LEFT,
    JOIN,
    GROUP,
    ORDER,
    BY,
    ASC,
    DESC,
    LIMIT,
    OFFSET,
    IS,
    NULL,
    IN,
    LIKE,
    BETWEEN,
    LPAREN,
    RPAREN,
    COMMA,
    DOT,
    STAR,
    EQ,
    NE,
    LT,
    LE,
    GT,
    GE,
}

impl Token {
    pub const fn as_str(self) -> &'static str {
        match self {
            Token::SELECT => "SELECT",
            Token::DISTINCT => "DISTINCT",
            Token::FROM => "FROM",
            Token::WHERE => "WHERE",
            Token::AND => "AND",
            Token::OR => "OR",
            Token::NOT => "NOT",
            Token::AS => "AS",
            Token::ON => "ON",
            Token::INNER => "INNER",
            Token::LEFT => "LEFT",
            Token::JOIN => "JOIN",
            Token::GROUP => "GROUP",
            Token::ORDER => "ORDER",
            Token::BY => "BY",
            Token::ASC => "ASC",
            Token::DESC => "DESC",
            Token::LIMIT => "LIMIT",
            Token::OFFSET => "OFFSET",
            Token::IS => "IS",
            Token::NULL => "NULL",
            Token::IN => "IN",
            Token::LIKE => "LIKE",
            Token::BETWEEN => "BETWEEN",
            Token::LPAREN => "(",
            Token::RPAREN => ")",
            Token::COMMA => ",",
            Token::DOT => ".",
            Token::STAR => "*",
            Token::EQ => "=",
            Token::NE => "<>",
            Token::LT => "<",
            Token::LE => "<=",
            Token::GT => ">",
            Token::GE => ">=",
        }
    }
}

/// A SQL chunk represents a part of an SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SQLChunk {
    /// SQL keywords and operators: SELECT, FROM, WHERE, =, AND, etc.
    Token(Token),

    /// Quoted identifier for table, column and alias names
    /// Renders as: "name" (with quotes)
    Ident(CompactString),

    /// Raw SQL text (unquoted) for function names and literals
    Raw(CompactString),

    /// Unsigned integer literal, used for LIMIT and OFFSET
    Number(u64),

    /// Parameter value, renders as `?`
    Param(Value),
}

impl SQLChunk {
    fn write(&self, buf: &mut impl Write) -> fmt::Result {
        match self {
            SQLChunk::Token(token) => buf.write_str(token.as_str()),
            SQLChunk::Ident(name) => {
                buf.write_char('"')?;
                for c in name.chars() {
                    if c == '"' {
                        buf.write_char('"')?;
                    }
                    buf.write_char(c)?;
                }
                buf.write_char('"')
            }
            SQLChunk::Raw(text) => buf.write_str(text),
            SQLChunk::Number(n) => write!(buf, "{n}"),
            SQLChunk::Param(_) => buf.write_char('?'),
        }
    }
}

impl From<Token> for SQLChunk {
    fn from(value: Token) -> Self {
        SQLChunk::Token(value)
    }
}

fn chunk_needs_space(current: &SQLChunk, next: &SQLChunk) -> bool {
    use SQLChunk::Token as T;
    match (current, next) {
        (T(Token::LPAREN) | T(Token::DOT), _) => false,
        (_, T(Token::RPAREN) | T(Token::COMMA) | T(Token::DOT)) => false,
        // function call: COUNT(
        (SQLChunk::Raw(_), T(Token::LPAREN)) => false,
        _ => true,
    }
}

/// SQL fragment builder with flat chunk storage.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SQL {
    pub chunks: SmallVec<[SQLChunk; 8]>,
}

impl SQL {
    /// Creates an empty SQL fragment
    #[inline]
    pub const fn empty() -> Self {
        Self {
            chunks: SmallVec::new_const(),
        }
    }

    /// Creates SQL with a single token
    #[inline]
    pub fn token(t: Token) -> Self {
        Self::empty().push(t)
    }

    /// Creates SQL with a quoted identifier
    #[inline]
    pub fn ident(name: impl Into<CompactString>) -> Self {
        Self::empty().push(SQLChunk::Ident(name.into()))
    }

    /// Creates SQL with raw text (unquoted)
    #[inline]
    pub fn raw(text: impl Into<CompactString>) -> Self {
        Self::empty().push(SQLChunk::Raw(text.into()))
    }

    #[inline]
    pub fn number(n: u64) -> Self {
        Self::empty().push(SQLChunk::Number(n))
    }

    /// Creates SQL with a single parameter value
    #[inline]
    pub fn param(value: impl Into<Value>) -> Self {
        Self::empty().push(SQLChunk::Param(value.into()))
    }

    /// `"alias"."column"`
    pub fn qualified(alias: &str, column: &str) -> Self {
        Self::ident(alias).push(Token::DOT).append(Self::ident(column))
    }

    /// Creates SQL for a function call: NAME(args)
    pub fn func(name: &str, args: SQL) -> Self {
        Self::raw(name).push(Token::LPAREN).append(args).push(Token::RPAREN)
    }

    /// Append another SQL fragment (flat extend)
    #[inline]
    pub fn append(mut self, other: SQL) -> Self {
        self.append_mut(other);
        self
    }

    #[inline]
    pub fn append_mut(&mut self, other: SQL) {
        if self.chunks.is_empty() {
            self.chunks = other.chunks;
        } else {
            self.chunks.extend(other.chunks);
        }
    }

    /// Push a single chunk
    #[inline]
    pub fn push(mut self, chunk: impl Into<SQLChunk>) -> Self {
        self.chunks.push(chunk.into());
        self
    }

    #[inline]
    pub fn push_mut(&mut self, chunk: impl Into<SQLChunk>) {
        self.chunks.push(chunk.into());
    }

    /// Wraps this fragment in parentheses
    pub fn parens(self) -> Self {
        SQL::token(Token::LPAREN).append(self).push(Token::RPAREN)
    }

    /// Joins fragments with a separator token
    pub fn join(items: impl IntoIterator<Item = SQL>, separator: Token) -> Self {
        let mut out = SQL::empty();
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                out.push_mut(separator);
            }
            out.append_mut(item);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Renders the SQL text.
    pub fn sql(&self) -> String {
        let mut buf = String::with_capacity(self.chunks.len().saturating_mul(8).max(64));
        // Writing into a String cannot fail.
        let _ = self.write_to(&mut buf);
        buf
    }

    /// Renders the SQL text and collects parameter references in one pass.
    pub fn build(&self) -> (String, Vec<&Value>) {
        (self.sql(), self.params().collect())
    }

    pub fn write_to(&self, buf: &mut impl Write) -> fmt::Result {
        for (i, chunk) in self.chunks.iter().enumerate() {
            chunk.write(buf)?;
            if let Some(next) = self.chunks.get(i + 1) {
                if chunk_needs_space(chunk, next) {
                    buf.write_char(' ')?;
                }
            }
        }
        Ok(())
    }

    /// Returns an iterator over the parameter values in placeholder order
    pub fn params(&self) -> impl Iterator<Item = &Value> {
        self.chunks.iter().filter_map(|chunk| match chunk {
            SQLChunk::Param(value) => Some(value),
            _ => None,
        })
    }
}

impl Display for SQL {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<_> = self.params().collect();
        write!(f, r#"sql: "{}", params: {:?}"#, self.sql(), params)
    }
}
