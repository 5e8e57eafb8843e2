//! Statement AST rendered by one serializer per dialect.

use crate::error::OrmError;
use crate::sql::{Dialect, Fragment, QueryBuf};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Left,
    Inner,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    /// `left = right` operands, both fully qualified.
    pub left: String,
    pub right: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ASC" => Ok(Direction::Asc),
            "DESC" => Ok(Direction::Desc),
            _ => Err(OrmError::Validation(format!(
                "The \"sort\" value must be \"ASC\" or \"DESC\". Received: \"{}\"",
                s
            ))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Limit {
    /// Literal `LIMIT n`.
    Count(u64),
    /// Bound offset/count pair, rendered per dialect.
    Page { offset: u64, count: u64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Select {
    pub columns: Vec<Fragment>,
    pub from: String,
    pub joins: Vec<Join>,
    /// AND-joined predicates.
    pub filter: Vec<Fragment>,
    /// Predicates appended with `OR` after the AND-joined ones.
    pub or_filter: Vec<Fragment>,
    pub group_by: Vec<String>,
    pub having: Option<Fragment>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<Limit>,
}

impl Select {
    pub fn new(from: impl Into<String>) -> Self {
        Select {
            columns: Vec::new(),
            from: from.into(),
            joins: Vec::new(),
            filter: Vec::new(),
            or_filter: Vec::new(),
            group_by: Vec::new(),
            having: None,
            order_by: None,
            limit: None,
        }
    }

    pub fn column(mut self, expr: impl Into<String>) -> Self {
        self.columns.push(Fragment::sql(expr));
        self
    }

    pub fn render(&self, dialect: Dialect) -> QueryBuf {
        let mut q = QueryBuf::new();
        q.sql.push_str("SELECT ");
        if self.columns.is_empty() {
            q.sql.push('*');
        }
        for (i, c) in self.columns.iter().enumerate() {
            if i > 0 {
                q.sql.push_str(", ");
            }
            c.render_into(&mut q, dialect);
        }
        q.sql.push_str(" FROM ");
        q.sql.push_str(&self.from);
        for j in &self.joins {
            let kw = match j.kind {
                JoinKind::Left => "LEFT JOIN",
                JoinKind::Inner => "JOIN",
            };
            q.sql.push_str(&format!(" {} {} ON {} = {}", kw, j.table, j.left, j.right));
        }
        render_filter(&mut q, &self.filter, &self.or_filter, dialect);
        if !self.group_by.is_empty() {
            q.sql.push_str(" GROUP BY ");
            q.sql.push_str(&self.group_by.join(", "));
        }
        if let Some(h) = &self.having {
            q.sql.push_str(" HAVING ");
            h.render_into(&mut q, dialect);
        }
        if let Some(o) = &self.order_by {
            q.sql.push_str(&format!(" ORDER BY {} {}", o.column, o.direction));
        }
        match self.limit {
            Some(Limit::Count(n)) => q.sql.push_str(&format!(" LIMIT {}", n)),
            Some(Limit::Page { offset, count }) => {
                let offset_ph = dialect.placeholder(q.push_param(dialect.pagination_value(offset)));
                let count_ph = dialect.placeholder(q.push_param(dialect.pagination_value(count)));
                q.sql.push(' ');
                q.sql.push_str(&dialect.limit_offset(&offset_ph, &count_ph));
            }
            None => {}
        }
        q
    }
}

fn render_filter(q: &mut QueryBuf, filter: &[Fragment], or_filter: &[Fragment], dialect: Dialect) {
    if filter.is_empty() {
        return;
    }
    q.sql.push_str(" WHERE ");
    Fragment::join(filter.iter().cloned(), " AND ").render_into(q, dialect);
    if !or_filter.is_empty() {
        q.sql.push_str(" OR ");
        Fragment::join(or_filter.iter().cloned(), " OR ").render_into(q, dialect);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Value>,
    pub returning: Option<String>,
}

impl Insert {
    pub fn render(&self, dialect: Dialect) -> QueryBuf {
        let mut q = QueryBuf::new();
        let placeholders: Vec<String> = self
            .values
            .iter()
            .map(|v| dialect.placeholder(q.push_param(v.clone())))
            .collect();
        q.sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            self.columns.join(", "),
            placeholders.join(", ")
        );
        if let Some(col) = &self.returning {
            q.sql.push_str(&format!(" RETURNING {}", col));
        }
        q
    }
}

/// Right-hand side of a SET assignment.
#[derive(Clone, Debug, PartialEq)]
pub enum SetValue {
    Param(Value),
    /// SQL keyword or expression such as `CURRENT_TIMESTAMP` or `NULL`.
    Raw(&'static str),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Update {
    pub table: String,
    pub sets: Vec<(String, SetValue)>,
    pub filter: Vec<Fragment>,
    pub or_filter: Vec<Fragment>,
}

impl Update {
    pub fn render(&self, dialect: Dialect) -> QueryBuf {
        let mut q = QueryBuf::new();
        q.sql = format!("UPDATE {} SET ", self.table);
        for (i, (col, v)) in self.sets.iter().enumerate() {
            if i > 0 {
                q.sql.push_str(", ");
            }
            let rhs = match v {
                SetValue::Param(v) => dialect.placeholder(q.push_param(v.clone())),
                SetValue::Raw(s) => s.to_string(),
            };
            q.sql.push_str(&format!("{} = {}", col, rhs));
        }
        render_filter(&mut q, &self.filter, &self.or_filter, dialect);
        q
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Delete {
    pub table: String,
    pub filter: Vec<Fragment>,
    pub or_filter: Vec<Fragment>,
}

impl Delete {
    pub fn render(&self, dialect: Dialect) -> QueryBuf {
        let mut q = QueryBuf::new();
        q.sql = format!("DELETE FROM {}", self.table);
        render_filter(&mut q, &self.filter, &self.or_filter, dialect);
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn eq(col: &str, v: Value) -> Fragment {
        let mut f = Fragment::sql(format!("{} = ", col));
        f.push_param(v);
        f
    }

    #[test]
    fn select_renders_clauses_in_order() {
        let mut s = Select::new("products").column("products.*").column("categories.name AS category_name");
        s.joins.push(Join {
            kind: JoinKind::Left,
            table: "categories".into(),
            left: "categories.id".into(),
            right: "products.category_id".into(),
        });
        s.filter.push(eq("products.stock", json!(1)));
        s.or_filter.push(eq("products.featured", json!(true)));
        s.order_by = Some(OrderBy { column: "products.id".into(), direction: Direction::Desc });
        s.limit = Some(Limit::Page { offset: 20, count: 10 });

        let q = s.render(Dialect::Postgres);
        assert_eq!(
            q.sql,
            "SELECT products.*, categories.name AS category_name FROM products \
             LEFT JOIN categories ON categories.id = products.category_id \
             WHERE products.stock = $1 OR products.featured = $2 \
             ORDER BY products.id DESC LIMIT $4 OFFSET $3"
        );
        assert_eq!(q.params, vec![json!(1), json!(true), json!(20), json!(10)]);

        let q = s.render(Dialect::MySql);
        assert!(q.sql.ends_with("ORDER BY products.id DESC LIMIT ?, ?"));
        assert_eq!(q.params[2..].to_vec(), vec![json!("20"), json!("10")]);
    }

    #[test]
    fn update_and_delete_render() {
        let u = Update {
            table: "products".into(),
            sets: vec![
                ("price".into(), SetValue::Param(json!(12))),
                ("deleted_at".into(), SetValue::Raw("CURRENT_TIMESTAMP")),
            ],
            filter: vec![eq("products.id", json!(3))],
            or_filter: Vec::new(),
        };
        let q = u.render(Dialect::Postgres);
        assert_eq!(q.sql, "UPDATE products SET price = $1, deleted_at = CURRENT_TIMESTAMP WHERE products.id = $2");
        assert_eq!(q.params, vec![json!(12), json!(3)]);

        let d = Delete { table: "products".into(), filter: vec![eq("products.id", json!(3))], or_filter: Vec::new() };
        assert_eq!(d.render(Dialect::Sqlite).sql, "DELETE FROM products WHERE products.id = ?");
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("desc".parse::<Direction>().unwrap(), Direction::Desc);
        assert!("sideways".parse::<Direction>().unwrap_err().is_validation());
    }
}
