//! Registry of the flows present in one log.

pub mod registry;
pub mod types;

pub use registry::FlowRegistry;
pub use types::{FlowAttributes, FlowDescriptor};
