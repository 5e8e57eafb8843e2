pub mod entity;
pub mod meta;
pub mod naming;

pub use entity::Entity;
pub use meta::{Model, ModelMeta, TableRef};
