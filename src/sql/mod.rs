//! Safe SQL assembly: identifiers are checked, values are always parameters.

pub mod ast;
pub mod conditions;
mod dialect;
mod fragment;
pub mod ident;

pub use ast::*;
pub use conditions::{compile, CompileMode, Condition, Conditions, IntoConditions, Operator};
pub use dialect::Dialect;
pub use fragment::{Fragment, QueryBuf, Token};
