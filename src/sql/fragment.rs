//! SQL text interleaved with bound values. Placeholders are only numbered when rendered for a dialect.

use crate::sql::Dialect;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Sql(String),
    Param(Value),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fragment {
    tokens: Vec<Token>,
}

impl Fragment {
    pub fn new() -> Self {
        Fragment { tokens: Vec::new() }
    }

    pub fn sql(text: impl Into<String>) -> Self {
        let mut f = Fragment::new();
        f.push_sql(text);
        f
    }

    pub fn push_sql(&mut self, text: impl Into<String>) -> &mut Self {
        let text = text.into();
        if text.is_empty() {
            return self;
        }
        match self.tokens.last_mut() {
            Some(Token::Sql(prev)) => prev.push_str(&text),
            _ => self.tokens.push(Token::Sql(text)),
        }
        self
    }

    pub fn push_param(&mut self, value: Value) -> &mut Self {
        self.tokens.push(Token::Param(value));
        self
    }

    pub fn append(&mut self, other: Fragment) -> &mut Self {
        for t in other.tokens {
            match t {
                Token::Sql(s) => {
                    self.push_sql(s);
                }
                Token::Param(v) => {
                    self.push_param(v);
                }
            }
        }
        self
    }

    /// Joins fragments with a separator, e.g. `" AND "`.
    pub fn join(parts: impl IntoIterator<Item = Fragment>, sep: &str) -> Fragment {
        let mut out = Fragment::new();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                out.push_sql(sep);
            }
            out.append(part);
        }
        out
    }

    pub fn parenthesized(self) -> Fragment {
        let mut out = Fragment::sql("(");
        out.append(self);
        out.push_sql(")");
        out
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn params(&self) -> Vec<&Value> {
        self.tokens
            .iter()
            .filter_map(|t| match t {
                Token::Param(v) => Some(v),
                Token::Sql(_) => None,
            })
            .collect()
    }

    pub fn render(&self, dialect: Dialect) -> QueryBuf {
        let mut q = QueryBuf::new();
        self.render_into(&mut q, dialect);
        q
    }

    pub(crate) fn render_into(&self, q: &mut QueryBuf, dialect: Dialect) {
        for t in &self.tokens {
            match t {
                Token::Sql(s) => q.sql.push_str(s),
                Token::Param(v) => {
                    let n = q.push_param(v.clone());
                    q.sql.push_str(&dialect.placeholder(n));
                }
            }
        }
    }
}

/// Rendered statement: final SQL text plus positional parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    pub fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Adds a parameter and returns its 1-based position.
    pub fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }
}
