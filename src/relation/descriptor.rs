//! Relation descriptors: how one model reaches another.

use crate::error::OrmError;
use crate::model::naming::singular;
use crate::model::{ModelMeta, TableRef};
use crate::sql::{ident, Join, JoinKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationKind {
    BelongsTo,
    HasMany,
    HasOne,
    BelongsToMany,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RelationDescriptor {
    /// Name the relation was registered under.
    pub name: String,
    pub kind: RelationKind,
    pub related_table: String,
    /// BelongsTo: column on the owning table. HasMany/HasOne: column on the related table.
    /// BelongsToMany: pivot column pointing at the owner.
    pub foreign_key: String,
    /// Primary key of the related table.
    pub primary_key: String,
    /// Owner column whose values are matched against the relation.
    pub local_key: String,
    pub singular_alias: String,
    pub columns: Vec<String>,
    pub pivot_table: Option<String>,
    pub pivot_foreign_key: Option<String>,
    pub pivot_related_key: Option<String>,
}

fn to_strings(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

impl RelationDescriptor {
    fn base(kind: RelationKind, related: TableRef, columns: &[&str]) -> Self {
        let singular_alias = singular(&related.table);
        RelationDescriptor {
            name: String::new(),
            kind,
            related_table: related.table,
            foreign_key: String::new(),
            primary_key: related.primary_key,
            local_key: String::new(),
            singular_alias,
            columns: to_strings(columns),
            pivot_table: None,
            pivot_foreign_key: None,
            pivot_related_key: None,
        }
    }

    /// Owner holds `${singular related}_${related pk}`; loaded through a LEFT JOIN.
    pub fn belongs_to(_owner: &ModelMeta, related: TableRef, columns: &[&str]) -> Self {
        let mut d = Self::base(RelationKind::BelongsTo, related, columns);
        d.foreign_key = format!("{}_{}", d.singular_alias, d.primary_key);
        d.local_key = d.foreign_key.clone();
        d
    }

    /// Related rows hold `${singular owner}_${owner pk}`.
    pub fn has_many(owner: &ModelMeta, related: TableRef, columns: &[&str]) -> Self {
        let mut d = Self::base(RelationKind::HasMany, related, columns);
        d.foreign_key = format!("{}_{}", singular(&owner.table), owner.primary_key);
        d.local_key = owner.primary_key.clone();
        d
    }

    pub fn has_one(owner: &ModelMeta, related: TableRef, columns: &[&str]) -> Self {
        let mut d = Self::has_many(owner, related, columns);
        d.kind = RelationKind::HasOne;
        d
    }

    pub fn belongs_to_many(owner: &ModelMeta, related: TableRef, pivot_table: &str, columns: &[&str]) -> Self {
        let mut d = Self::base(RelationKind::BelongsToMany, related, columns);
        d.foreign_key = format!("{}_{}", singular(&owner.table), owner.primary_key);
        d.local_key = owner.primary_key.clone();
        d.pivot_table = Some(pivot_table.to_string());
        d.pivot_foreign_key = Some(d.foreign_key.clone());
        d.pivot_related_key = Some(format!("{}_{}", d.singular_alias, d.primary_key));
        d
    }

    pub fn with_foreign_key(mut self, foreign_key: &str) -> Self {
        self.foreign_key = foreign_key.to_string();
        match self.kind {
            RelationKind::BelongsTo => self.local_key = self.foreign_key.clone(),
            RelationKind::BelongsToMany => self.pivot_foreign_key = Some(self.foreign_key.clone()),
            RelationKind::HasMany | RelationKind::HasOne => {}
        }
        self
    }

    pub fn with_local_key(mut self, local_key: &str) -> Self {
        self.local_key = local_key.to_string();
        self
    }

    pub fn with_related_key(mut self, related_key: &str) -> Self {
        self.pivot_related_key = Some(related_key.to_string());
        self
    }

    /// Property the loaded data is attached under.
    pub fn attach_key(&self) -> &str {
        match self.kind {
            RelationKind::BelongsTo | RelationKind::HasOne => &self.singular_alias,
            RelationKind::HasMany | RelationKind::BelongsToMany => &self.related_table,
        }
    }

    pub fn is_join(&self) -> bool {
        self.kind == RelationKind::BelongsTo
    }

    pub fn validate(&self) -> Result<(), OrmError> {
        ident::check_bare(&self.related_table)?;
        ident::check_bare(&self.primary_key)?;
        ident::check_bare(&self.foreign_key)?;
        ident::check_bare(&self.local_key)?;
        if self.columns.is_empty() {
            return Err(OrmError::Validation(format!("relation {} selects no columns", self.name)));
        }
        for c in &self.columns {
            if self.is_join() {
                ident::check_bare(c)?;
            } else {
                ident::check_or_star(c)?;
            }
        }
        if self.kind == RelationKind::BelongsToMany {
            let missing = || OrmError::Validation(format!("relation {} needs a pivot table", self.name));
            ident::check_bare(self.pivot_table.as_deref().ok_or_else(missing)?)?;
            ident::check_bare(self.pivot_foreign_key.as_deref().ok_or_else(missing)?)?;
            ident::check_bare(self.pivot_related_key.as_deref().ok_or_else(missing)?)?;
        }
        Ok(())
    }

    /// `LEFT JOIN related ON related.pk = owner.fk`, for belongsTo only.
    pub fn join(&self, owner_table: &str) -> Option<Join> {
        self.is_join().then(|| Join {
            kind: JoinKind::Left,
            table: self.related_table.clone(),
            left: format!("{}.{}", self.related_table, self.primary_key),
            right: format!("{}.{}", owner_table, self.foreign_key),
        })
    }

    /// `related.col AS singular_col` for every requested column, then the related key
    /// as `singular__pk` so a matched row can be told apart from a missing one.
    pub fn aliased_columns(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{}.{} AS {}", self.related_table, c, self.column_alias(c)))
            .collect();
        out.push(format!("{}.{} AS {}", self.related_table, self.primary_key, self.key_alias()));
        out
    }

    pub fn key_alias(&self) -> String {
        format!("{}__{}", self.singular_alias, self.primary_key)
    }

    pub fn column_alias(&self, column: &str) -> String {
        format!("{}_{}", self.singular_alias, column)
    }
}
