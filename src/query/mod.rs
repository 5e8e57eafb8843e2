pub mod aggregate;
pub mod builder;
pub mod mapper;
pub mod mutation;
pub mod paginate;

pub use aggregate::AggregateFn;
pub use builder::{LimitValue, QueryBuilder};
pub use mutation::{CreateHandle, UpdateHandle};
pub use paginate::Page;
