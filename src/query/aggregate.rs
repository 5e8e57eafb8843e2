//! Aggregate select-list entries, kept per function family.

use crate::error::OrmError;
use crate::sql::{compile, ident, CompileMode, Conditions, Fragment};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateFn {
    Min,
    Max,
    Count,
    Sum,
    Avg,
}

impl AggregateFn {
    fn name(&self) -> &'static str {
        match self {
            AggregateFn::Min => "min",
            AggregateFn::Max => "max",
            AggregateFn::Count => "count",
            AggregateFn::Sum => "sum",
            AggregateFn::Avg => "avg",
        }
    }

    /// Value for rows the CASE condition rejects.
    fn otherwise(&self) -> &'static str {
        match self {
            AggregateFn::Sum => "0",
            _ => "NULL",
        }
    }
}

/// Accumulated aggregate columns. Each family numbers its default aliases on its own.
#[derive(Clone, Debug, Default)]
pub struct Aggregates {
    min: Vec<Fragment>,
    max: Vec<Fragment>,
    count: Vec<Fragment>,
    sum: Vec<Fragment>,
    avg: Vec<Fragment>,
}

impl Aggregates {
    fn family_mut(&mut self, func: AggregateFn) -> &mut Vec<Fragment> {
        match func {
            AggregateFn::Min => &mut self.min,
            AggregateFn::Max => &mut self.max,
            AggregateFn::Count => &mut self.count,
            AggregateFn::Sum => &mut self.sum,
            AggregateFn::Avg => &mut self.avg,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_empty() && self.max.is_empty() && self.count.is_empty() && self.sum.is_empty() && self.avg.is_empty()
    }

    /// First non-empty family in min, max, count, sum, avg order.
    pub fn active_family(&self) -> Option<&[Fragment]> {
        [&self.min, &self.max, &self.count, &self.sum, &self.avg]
            .into_iter()
            .find(|f| !f.is_empty())
            .map(Vec::as_slice)
    }

    /// Every aggregate, in the order GROUP BY selects them: avg, sum, count, min, max.
    pub fn grouped(&self) -> Vec<Fragment> {
        [&self.avg, &self.sum, &self.count, &self.min, &self.max]
            .into_iter()
            .flat_map(|f| f.iter().cloned())
            .collect()
    }

    pub fn push(
        &mut self,
        func: AggregateFn,
        table: &str,
        column: &str,
        conditions: &Conditions,
        alias: Option<&str>,
    ) -> Result<(), OrmError> {
        ident::check_or_star(column)?;
        let star = column == "*";
        if star && func != AggregateFn::Count {
            return Err(OrmError::Validation(format!("{}(*) is not supported", func.name().to_uppercase())));
        }
        if star && !conditions.is_empty() {
            return Err(OrmError::Validation("You cannot use conditions with '*' column.".into()));
        }
        let index = self.family_mut(func).len();
        let alias = match alias {
            Some(a) => {
                ident::check_bare(a)?;
                a.to_string()
            }
            None if star => format!("count_{}", index),
            None => format!("{}_{}_{}", func.name(), column.replace('.', "_"), index),
        };
        let target = if star { "*".to_string() } else { ident::qualify(table, column) };
        let fn_sql = func.name().to_uppercase();

        let mut f = Fragment::new();
        let coalesce = matches!(func, AggregateFn::Sum | AggregateFn::Avg);
        if coalesce {
            f.push_sql("COALESCE(");
        }
        f.push_sql(format!("{}(", fn_sql));
        if conditions.is_empty() {
            f.push_sql(target);
        } else {
            f.push_sql("CASE WHEN ")
                .append(compile(conditions, table, CompileMode::Where)?)
                .push_sql(format!(" THEN {} ELSE {} END", target, func.otherwise()));
        }
        f.push_sql(")");
        if coalesce {
            f.push_sql(", 0)");
        }
        f.push_sql(format!(" AS {}", alias));
        self.family_mut(func).push(f);
        Ok(())
    }
}
