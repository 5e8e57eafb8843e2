pub mod descriptor;
pub mod eager;
pub mod registry;
pub mod resolver;

pub use descriptor::{RelationDescriptor, RelationKind};
pub use registry::{RelationFactory, RelationRegistry};
pub use resolver::resolve;
