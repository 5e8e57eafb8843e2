//! Fluent query builder. Each call consumes the builder and returns it, so state is never shared
//! between queries.

use crate::database::{Database, Transaction};
use crate::driver::Row;
use crate::error::OrmError;
use crate::model::{Entity, Model, ModelMeta};
use crate::query::aggregate::{AggregateFn, Aggregates};
use crate::query::mapper::materialize;
use crate::query::mutation::{insert, CreateHandle};
use crate::query::paginate::{self, Page};
use crate::relation::{resolve, RelationDescriptor, RelationKind};
use crate::sql::{
    compile, ident, CompileMode, Conditions, Delete, Direction, Fragment, IntoConditions, Join, JoinKind, Limit,
    OrderBy, Select, SetValue, Update,
};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::marker::PhantomData;

/// Values accepted by [`QueryBuilder::limit`].
pub trait LimitValue: Display + Copy {
    /// `None` for negative, fractional or non-finite input.
    fn to_limit(self) -> Option<u64>;
}

macro_rules! limit_signed {
    ($($t:ty),*) => {$(
        impl LimitValue for $t {
            fn to_limit(self) -> Option<u64> {
                u64::try_from(self).ok()
            }
        }
    )*};
}

limit_signed!(i32, i64, u32, u64, usize);

impl LimitValue for f64 {
    fn to_limit(self) -> Option<u64> {
        (self.is_finite() && self >= 0.0 && self.fract() == 0.0).then_some(self as u64)
    }
}

#[derive(Clone, Debug)]
struct Ordering {
    column: String,
    direction: Direction,
    is_default: bool,
}

pub struct QueryBuilder<M: Model> {
    db: Database,
    meta: ModelMeta,
    filter: Vec<Fragment>,
    or_filter: Vec<Fragment>,
    relations: Vec<RelationDescriptor>,
    order: Ordering,
    limit: Option<u64>,
    aggregates: Aggregates,
    having: Vec<Fragment>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> QueryBuilder<M> {
    pub fn new(db: Database) -> Self {
        let meta = ModelMeta::of::<M>();
        let order = Ordering {
            column: meta.qualify(&meta.primary_key),
            direction: Direction::Asc,
            is_default: true,
        };
        QueryBuilder {
            db,
            meta,
            filter: Vec::new(),
            or_filter: Vec::new(),
            relations: Vec::new(),
            order,
            limit: None,
            aggregates: Aggregates::default(),
            having: Vec::new(),
            _model: PhantomData,
        }
    }

    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    /// AND-joined with earlier `where` calls.
    pub fn r#where(mut self, conditions: impl IntoConditions) -> Result<Self, OrmError> {
        let conditions = conditions.into_conditions()?;
        self.filter
            .push(compile(&conditions, &self.meta.table, CompileMode::Where)?);
        Ok(self)
    }

    /// Extends the predicate with `OR (...)`. Needs a prior `where`.
    pub fn or_where(mut self, conditions: impl IntoConditions) -> Result<Self, OrmError> {
        if self.filter.is_empty() {
            return Err(OrmError::State("You must use 'where' before 'orWhere'.".into()));
        }
        let conditions = conditions.into_conditions()?;
        self.or_filter
            .push(compile(&conditions, &self.meta.table, CompileMode::OrWhere)?);
        Ok(self)
    }

    /// Resolve relations now; joins and batched loads reuse the descriptors.
    ///
    /// Two relations that would attach under the same key (for example two belongsTo
    /// relations to one table) cannot be loaded together.
    pub fn with(mut self, relations: &[&str]) -> Result<Self, OrmError> {
        let resolved = resolve(&self.meta, relations)?;
        for rel in resolved {
            if self.relations.iter().any(|r| r.name == rel.name) {
                continue;
            }
            if let Some(other) = self.relations.iter().find(|r| r.attach_key() == rel.attach_key()) {
                return Err(OrmError::Validation(format!(
                    "relations {} and {} both load into '{}'; load them in separate queries",
                    other.name,
                    rel.name,
                    rel.attach_key()
                )));
            }
            self.relations.push(rel);
        }
        Ok(self)
    }

    pub fn order_by(mut self, column: &str, direction: &str) -> Result<Self, OrmError> {
        ident::check(column)?;
        let direction: Direction = direction.parse()?;
        self.order = Ordering {
            column: self.meta.qualify(column),
            direction,
            is_default: false,
        };
        Ok(self)
    }

    /// `0` means no limit.
    pub fn limit<N: LimitValue>(mut self, n: N) -> Result<Self, OrmError> {
        let value = n.to_limit().ok_or_else(|| {
            OrmError::Validation(format!("The \"limit\" value must be a number and positive. Received: \"{}\"", n))
        })?;
        self.limit = (value > 0).then_some(value);
        Ok(self)
    }

    fn aggregate_column(
        mut self,
        func: AggregateFn,
        column: &str,
        conditions: Conditions,
        alias: Option<&str>,
    ) -> Result<Self, OrmError> {
        self.aggregates
            .push(func, &self.meta.table, column, &conditions, alias)?;
        Ok(self)
    }

    pub fn min(self, column: &str) -> Result<Self, OrmError> {
        self.aggregate_column(AggregateFn::Min, column, Conditions::new(), None)
    }

    /// `MIN(CASE WHEN <conditions> THEN column ELSE NULL END)`; empty conditions drop the CASE.
    pub fn min_with(self, column: &str, conditions: impl IntoConditions, alias: Option<&str>) -> Result<Self, OrmError> {
        self.aggregate_column(AggregateFn::Min, column, conditions.into_conditions()?, alias)
    }

    pub fn max(self, column: &str) -> Result<Self, OrmError> {
        self.aggregate_column(AggregateFn::Max, column, Conditions::new(), None)
    }

    pub fn max_with(self, column: &str, conditions: impl IntoConditions, alias: Option<&str>) -> Result<Self, OrmError> {
        self.aggregate_column(AggregateFn::Max, column, conditions.into_conditions()?, alias)
    }

    /// `"*"` counts rows and takes no conditions.
    pub fn count(self, column: &str) -> Result<Self, OrmError> {
        self.aggregate_column(AggregateFn::Count, column, Conditions::new(), None)
    }

    pub fn count_with(self, column: &str, conditions: impl IntoConditions, alias: Option<&str>) -> Result<Self, OrmError> {
        self.aggregate_column(AggregateFn::Count, column, conditions.into_conditions()?, alias)
    }

    pub fn sum(self, column: &str) -> Result<Self, OrmError> {
        self.aggregate_column(AggregateFn::Sum, column, Conditions::new(), None)
    }

    pub fn sum_with(self, column: &str, conditions: impl IntoConditions, alias: Option<&str>) -> Result<Self, OrmError> {
        self.aggregate_column(AggregateFn::Sum, column, conditions.into_conditions()?, alias)
    }

    pub fn avg(self, column: &str) -> Result<Self, OrmError> {
        self.aggregate_column(AggregateFn::Avg, column, Conditions::new(), None)
    }

    pub fn avg_with(self, column: &str, conditions: impl IntoConditions, alias: Option<&str>) -> Result<Self, OrmError> {
        self.aggregate_column(AggregateFn::Avg, column, conditions.into_conditions()?, alias)
    }

    /// HAVING predicate for `group_by`. Columns are used exactly as written (aliases or `table.column`).
    pub fn having(mut self, conditions: impl IntoConditions) -> Result<Self, OrmError> {
        let conditions = conditions.into_conditions()?;
        self.having.push(compile(&conditions, "", CompileMode::Having)?);
        Ok(self)
    }

    fn select_list(&self, columns: &[&str]) -> Result<Vec<Fragment>, OrmError> {
        if columns.is_empty() {
            return Err(OrmError::Validation("at least one column must be selected".into()));
        }
        let mut out = Vec::with_capacity(columns.len());
        for c in columns {
            ident::check_or_star(c)?;
            out.push(Fragment::sql(self.meta.qualify(c)));
        }
        for rel in self.relations.iter().filter(|r| r.is_join()) {
            out.extend(rel.aliased_columns().into_iter().map(Fragment::sql));
        }
        Ok(out)
    }

    /// Columns batched relations match on that the caller did not select.
    fn synthetic_columns(&self, columns: &[&str]) -> Vec<String> {
        if columns.contains(&"*") {
            return Vec::new();
        }
        let own_prefix = format!("{}.", self.meta.table);
        let selected = |key: &str| {
            columns
                .iter()
                .any(|c| c.strip_prefix(own_prefix.as_str()).unwrap_or(*c) == key)
        };
        let mut out: Vec<String> = Vec::new();
        for rel in self.relations.iter().filter(|r| !r.is_join()) {
            if !selected(&rel.local_key) && !out.contains(&rel.local_key) {
                out.push(rel.local_key.clone());
            }
        }
        out
    }

    fn joins(&self) -> Vec<Join> {
        self.relations
            .iter()
            .filter_map(|r| r.join(&self.meta.table))
            .collect()
    }

    fn base_select(&self, columns: Vec<Fragment>) -> Select {
        let mut select = Select::new(self.meta.table.clone());
        select.columns = columns;
        select.joins = self.joins();
        select.filter = self.filter.clone();
        select.or_filter = self.or_filter.clone();
        select
    }

    fn entity_select(&self, columns: &[&str], synthetic: &[String]) -> Result<Select, OrmError> {
        let mut list = self.select_list(columns)?;
        list.extend(synthetic.iter().map(|c| Fragment::sql(self.meta.qualify(c))));
        let mut select = self.base_select(list);
        select.order_by = Some(OrderBy {
            column: self.order.column.clone(),
            direction: self.order.direction,
        });
        Ok(select)
    }

    async fn fetch(&self, select: &Select) -> Result<Vec<Row>, OrmError> {
        let q = select.render(self.db.dialect());
        self.db.driver().query(&q.sql, &q.params).await
    }

    async fn fetch_entities(&self, select: &Select, synthetic: &[String]) -> Result<Vec<Entity>, OrmError> {
        let rows = self.fetch(select).await?;
        materialize(self.db.driver(), &self.relations, rows, synthetic).await
    }

    fn aggregate_select(&self) -> Option<Select> {
        self.aggregates
            .active_family()
            .map(|family| self.base_select(family.to_vec()))
    }

    /// Rows for `columns`, or the aggregate row when an aggregate was added
    /// (first family among min, max, count, sum, avg wins).
    pub async fn get(self, columns: &[&str]) -> Result<Vec<Entity>, OrmError> {
        if let Some(select) = self.aggregate_select() {
            return Ok(self.fetch(&select).await?.into_iter().map(Entity::new).collect());
        }
        let synthetic = self.synthetic_columns(columns);
        let mut select = self.entity_select(columns, &synthetic)?;
        select.limit = self.limit.map(Limit::Count);
        self.fetch_entities(&select, &synthetic).await
    }

    /// The single aggregate row.
    pub async fn aggregate(self) -> Result<Entity, OrmError> {
        let select = self
            .aggregate_select()
            .ok_or_else(|| OrmError::State("no aggregate column was added before 'aggregate'".into()))?;
        let row = self.fetch(&select).await?.into_iter().next().unwrap_or_default();
        Ok(Entity::new(row))
    }

    pub async fn get_one(self, columns: &[&str]) -> Result<Option<Entity>, OrmError> {
        let synthetic = self.synthetic_columns(columns);
        let mut select = self.entity_select(columns, &synthetic)?;
        select.limit = Some(Limit::Count(1));
        Ok(self.fetch_entities(&select, &synthetic).await?.into_iter().next())
    }

    /// Row by primary key. Other conditions are ignored.
    pub async fn find(self, key: impl Into<Value>, columns: &[&str]) -> Result<Option<Entity>, OrmError> {
        let synthetic = self.synthetic_columns(columns);
        let mut select = self.base_select(self.select_list(columns)?);
        select
            .columns
            .extend(synthetic.iter().map(|c| Fragment::sql(self.meta.qualify(c))));
        select.filter = vec![self.key_filter(key.into())?];
        select.or_filter.clear();
        select.limit = Some(Limit::Count(1));
        Ok(self.fetch_entities(&select, &synthetic).await?.into_iter().next())
    }

    fn key_filter(&self, key: Value) -> Result<Fragment, OrmError> {
        compile(
            &Conditions::new().eq(self.meta.primary_key.clone(), key),
            &self.meta.table,
            CompileMode::Where,
        )
    }

    /// Flat list of one column, honouring conditions, order and limit.
    pub async fn pluck(self, column: &str) -> Result<Vec<Value>, OrmError> {
        ident::check(column)?;
        let mut select = self.base_select(vec![Fragment::sql(self.meta.qualify(column))]);
        select.order_by = Some(OrderBy {
            column: self.order.column.clone(),
            direction: self.order.direction,
        });
        select.limit = self.limit.map(Limit::Count);
        let key = column.rsplit('.').next().unwrap_or(column);
        Ok(self
            .fetch(&select)
            .await?
            .into_iter()
            .map(|mut row| row.shift_remove(key).unwrap_or(Value::Null))
            .collect())
    }

    pub async fn exist(self) -> Result<bool, OrmError> {
        let mut select = self.base_select(vec![Fragment::sql(self.meta.qualify(&self.meta.primary_key))]);
        select.limit = Some(Limit::Count(1));
        Ok(!self.fetch(&select).await?.is_empty())
    }

    /// One bounded SELECT plus `SELECT COUNT(*)` over the same predicate. The two are not isolated.
    pub async fn paginate(self, page: u64, per_page: u64, columns: &[&str]) -> Result<Page, OrmError> {
        let offset = paginate::offset(page, per_page)?;
        let synthetic = self.synthetic_columns(columns);
        let mut select = self.entity_select(columns, &synthetic)?;
        select.limit = Some(Limit::Page { offset, count: per_page });
        let data = self.fetch_entities(&select, &synthetic).await?;

        let count = self.base_select(vec![Fragment::sql("COUNT(*) AS total")]);
        let total = paginate::read_total(self.fetch(&count).await?.first())?;
        tracing::debug!(table = %self.meta.table, page, per_page, total, "paginated");
        Ok(Page::new(data, total, per_page, page))
    }

    /// Grouped SELECT with every accumulated aggregate. `relation.column` joins that relation (inner join)
    /// and selects the column as `relation_column`.
    pub async fn group_by(self, columns: &[&str]) -> Result<Vec<Entity>, OrmError> {
        if columns.is_empty() {
            return Err(OrmError::Validation("You must provide at least one column to group by.".into()));
        }
        let mut list = Vec::new();
        let mut group = Vec::new();
        let mut joins: Vec<Join> = Vec::new();
        for column in columns {
            if *column == "*" {
                return Err(OrmError::Validation("You cannot use '*' in groupBy method.".into()));
            }
            ident::check(column)?;
            match column.split_once('.') {
                Some((relation, field)) => {
                    let rel = self.group_relation(relation)?;
                    let expr = format!("{}.{}", rel.related_table, field);
                    list.push(Fragment::sql(format!("{} AS {}_{}", expr, relation, field)));
                    group.push(expr);
                    if !joins.iter().any(|j| j.table == rel.related_table) {
                        joins.push(self.inner_join(&rel)?);
                    }
                }
                None => {
                    let expr = self.meta.qualify(column);
                    list.push(Fragment::sql(expr.clone()));
                    group.push(expr);
                }
            }
        }
        list.extend(self.aggregates.grouped());

        let mut select = Select::new(self.meta.table.clone());
        select.columns = list;
        select.joins = joins;
        select.filter = self.filter.clone();
        select.or_filter = self.or_filter.clone();
        select.group_by = group;
        if !self.having.is_empty() {
            select.having = Some(Fragment::join(self.having.iter().cloned(), " AND "));
        }
        if !self.order.is_default {
            select.order_by = Some(OrderBy {
                column: self.order.column.clone(),
                direction: self.order.direction,
            });
        }
        select.limit = self.limit.map(Limit::Count);
        Ok(self.fetch(&select).await?.into_iter().map(Entity::new).collect())
    }

    fn group_relation(&self, name: &str) -> Result<RelationDescriptor, OrmError> {
        if let Some(rel) = self.relations.iter().find(|r| r.name == name) {
            return Ok(rel.clone());
        }
        resolve(&self.meta, &[name])?
            .pop()
            .ok_or_else(|| OrmError::Validation(format!("relation \"{}\" could not be resolved", name)))
    }

    fn inner_join(&self, rel: &RelationDescriptor) -> Result<Join, OrmError> {
        let table = &self.meta.table;
        let (left, right) = match rel.kind {
            RelationKind::BelongsTo => (
                format!("{}.{}", table, rel.foreign_key),
                format!("{}.{}", rel.related_table, rel.primary_key),
            ),
            RelationKind::HasMany | RelationKind::HasOne => (
                format!("{}.{}", table, rel.local_key),
                format!("{}.{}", rel.related_table, rel.foreign_key),
            ),
            RelationKind::BelongsToMany => {
                return Err(OrmError::Validation(format!(
                    "cannot group by columns of many-to-many relation \"{}\"",
                    rel.name
                )))
            }
        };
        Ok(Join {
            kind: JoinKind::Inner,
            table: rel.related_table.clone(),
            left,
            right,
        })
    }

    /// INSERT `data` in key order, on `tx` when given. The key comes from `data` or from the engine.
    pub async fn create(self, data: impl Serialize, tx: Option<&Transaction>) -> Result<CreateHandle<M>, OrmError> {
        let db = tx.map(|t| t.database().clone()).unwrap_or(self.db);
        let key = insert(&db, &self.meta, data).await?;
        Ok(CreateHandle::new(db, key))
    }

    /// UPDATE every row matching the accumulated conditions. Needs a prior `where`.
    pub async fn update(self, data: impl Serialize) -> Result<u64, OrmError> {
        if self.filter.is_empty() {
            return Err(OrmError::State("You must use 'where' before 'update'.".into()));
        }
        let sets = crate::query::mutation::assignments(data)?;
        let stmt = Update {
            table: self.meta.table.clone(),
            sets: sets.into_iter().map(|(c, v)| (c, SetValue::Param(v))).collect(),
            filter: self.filter,
            or_filter: self.or_filter,
        };
        let q = stmt.render(self.db.dialect());
        Ok(self.db.driver().execute(&q.sql, &q.params).await?.rows_affected)
    }

    /// DELETE every row matching the accumulated conditions. Needs a prior `where`.
    pub async fn delete(self) -> Result<u64, OrmError> {
        if self.filter.is_empty() {
            return Err(OrmError::State("You must use 'where' before 'delete'.".into()));
        }
        let stmt = Delete {
            table: self.meta.table.clone(),
            filter: self.filter,
            or_filter: self.or_filter,
        };
        let q = stmt.render(self.db.dialect());
        Ok(self.db.driver().execute(&q.sql, &q.params).await?.rows_affected)
    }
}
