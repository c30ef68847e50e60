//! Abstract graph construction, export and translation remapping.

mod builder;
mod error;
mod export;
mod remap;
mod resolver;

pub use builder::{build_abstract_graph, build_structure, propagate_templates};
pub use error::ResolveError;
pub use export::export_spec;
pub use remap::{remap, substitute_handles};
pub use resolver::{Resolver, StandardResolver};
