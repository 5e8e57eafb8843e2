//! Condition maps (column → value or `[operator, operand...]`) and their compilation to SQL predicates.

use crate::error::OrmError;
use crate::sql::{ident, Fragment};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Allowed comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    LtGt,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    NotLike,
    In,
    NotIn,
    Between,
    NotBetween,
    IsNull,
    IsNotNull,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::LtGt => "<>",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT BETWEEN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }

    fn check_arity(&self, column: &str, operands: &[Value]) -> Result<(), OrmError> {
        let n = operands.len();
        let ok = match self {
            Operator::IsNull | Operator::IsNotNull => n == 0,
            Operator::In | Operator::NotIn => n >= 1,
            Operator::Between | Operator::NotBetween => n == 2,
            _ => n == 1,
        };
        if ok {
            return Ok(());
        }
        let expected = match self {
            Operator::IsNull | Operator::IsNotNull => "no operand",
            Operator::In | Operator::NotIn => "a non-empty list",
            Operator::Between | Operator::NotBetween => "two values",
            _ => "exactly one value",
        };
        Err(OrmError::Validation(format!(
            "{} operator requires {}: received {} for column {}",
            self.as_sql(),
            expected,
            n,
            column
        )))
    }
}

impl FromStr for Operator {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
        Ok(match normalized.as_str() {
            "=" => Operator::Eq,
            "!=" => Operator::NotEq,
            "<>" => Operator::LtGt,
            ">" => Operator::Gt,
            "<" => Operator::Lt,
            ">=" => Operator::Gte,
            "<=" => Operator::Lte,
            "LIKE" => Operator::Like,
            "NOT LIKE" => Operator::NotLike,
            "IN" => Operator::In,
            "NOT IN" => Operator::NotIn,
            "BETWEEN" => Operator::Between,
            "NOT BETWEEN" => Operator::NotBetween,
            "IS NULL" => Operator::IsNull,
            "IS NOT NULL" => Operator::IsNotNull,
            _ => return Err(OrmError::Validation(format!("Operator not valid: {}", s))),
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Right-hand side of one condition entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// Plain value, compared with `=`.
    Value(Value),
    Op { op: Operator, operands: Vec<Value> },
}

impl Condition {
    pub fn op(op: Operator, operands: Vec<Value>) -> Self {
        Condition::Op { op, operands }
    }

    /// Interprets a JSON value the way condition maps are written:
    /// arrays are `[operator, operand...]`, the strings `"IS NULL"` / `"IS NOT NULL"` are null checks,
    /// anything else is an equality operand.
    pub fn from_json(column: &str, value: Value) -> Result<Self, OrmError> {
        match value {
            Value::Array(items) => {
                let mut items = items.into_iter();
                let op = match items.next() {
                    Some(Value::String(s)) => s.parse::<Operator>()?,
                    Some(other) => {
                        return Err(OrmError::Validation(format!(
                            "operator for column {} must be a string, got {}",
                            column, other
                        )))
                    }
                    None => {
                        return Err(OrmError::Validation(format!(
                            "empty operator list for column {}",
                            column
                        )))
                    }
                };
                let mut operands = Vec::new();
                for item in items {
                    match item {
                        Value::Array(inner) => operands.extend(inner),
                        v => operands.push(v),
                    }
                }
                Ok(Condition::Op { op, operands })
            }
            Value::String(s) if s.eq_ignore_ascii_case("IS NULL") => Ok(Condition::op(Operator::IsNull, Vec::new())),
            Value::String(s) if s.eq_ignore_ascii_case("IS NOT NULL") => {
                Ok(Condition::op(Operator::IsNotNull, Vec::new()))
            }
            v => Ok(Condition::Value(v)),
        }
    }
}

/// Ordered column → condition entries. Entries compile in insertion order, joined with `AND`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Conditions {
    entries: Vec<(String, Condition)>,
}

impl Conditions {
    pub fn new() -> Self {
        Conditions { entries: Vec::new() }
    }

    pub fn push(mut self, column: impl Into<String>, condition: Condition) -> Self {
        self.entries.push((column.into(), condition));
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, Condition::Value(value.into()))
    }

    pub fn op(self, column: impl Into<String>, op: Operator, operands: Vec<Value>) -> Self {
        self.push(column, Condition::op(op, operands))
    }

    pub fn is_in(self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.op(column, Operator::In, values)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[(String, Condition)] {
        &self.entries
    }

    pub fn from_map(map: Map<String, Value>) -> Result<Self, OrmError> {
        let mut out = Conditions::new();
        for (col, v) in map {
            let cond = Condition::from_json(&col, v)?;
            out.entries.push((col, cond));
        }
        Ok(out)
    }
}

/// Anything usable as a condition map: [`Conditions`] or a JSON object.
pub trait IntoConditions {
    fn into_conditions(self) -> Result<Conditions, OrmError>;
}

impl IntoConditions for Conditions {
    fn into_conditions(self) -> Result<Conditions, OrmError> {
        Ok(self)
    }
}

impl IntoConditions for Map<String, Value> {
    fn into_conditions(self) -> Result<Conditions, OrmError> {
        Conditions::from_map(self)
    }
}

impl IntoConditions for Value {
    fn into_conditions(self) -> Result<Conditions, OrmError> {
        match self {
            Value::Object(map) => Conditions::from_map(map),
            other => Err(OrmError::Validation(format!("conditions must be a JSON object, got {}", other))),
        }
    }
}

/// Where the compiled predicate will be used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompileMode {
    Where,
    /// Like `Where`, but a multi-entry predicate is parenthesized so it composes after `OR`.
    OrWhere,
    /// Columns are aliases or caller-qualified expressions and are left unprefixed.
    Having,
}

/// Compiles conditions into one boolean predicate. Parameter order mirrors placeholder order.
pub fn compile(conditions: &Conditions, table_prefix: &str, mode: CompileMode) -> Result<Fragment, OrmError> {
    if conditions.is_empty() {
        return Err(OrmError::Validation("conditions must not be empty".into()));
    }
    let mut parts = Vec::with_capacity(conditions.len());
    for (column, condition) in conditions.entries() {
        ident::check(column)?;
        let target = match mode {
            CompileMode::Having => column.clone(),
            CompileMode::Where | CompileMode::OrWhere => ident::qualify(table_prefix, column),
        };
        parts.push(compile_entry(&target, column, condition)?);
    }
    let fragment = Fragment::join(parts, " AND ");
    if mode == CompileMode::OrWhere && conditions.len() > 1 {
        Ok(fragment.parenthesized())
    } else {
        Ok(fragment)
    }
}

fn compile_entry(target: &str, column: &str, condition: &Condition) -> Result<Fragment, OrmError> {
    let mut f = Fragment::sql(target);
    match condition {
        Condition::Value(v) => {
            f.push_sql(" = ").push_param(v.clone());
        }
        Condition::Op { op, operands } => {
            op.check_arity(column, operands)?;
            match op {
                Operator::IsNull | Operator::IsNotNull => {
                    f.push_sql(format!(" {}", op));
                }
                Operator::In | Operator::NotIn => {
                    f.push_sql(format!(" {} (", op));
                    for (i, v) in operands.iter().enumerate() {
                        if i > 0 {
                            f.push_sql(", ");
                        }
                        f.push_param(v.clone());
                    }
                    f.push_sql(")");
                }
                Operator::Between | Operator::NotBetween => {
                    f.push_sql(format!(" {} ", op))
                        .push_param(operands[0].clone())
                        .push_sql(" AND ")
                        .push_param(operands[1].clone());
                }
                _ => {
                    f.push_sql(format!(" {} ", op)).push_param(operands[0].clone());
                }
            }
        }
    }
    Ok(f)
}
