mod edge;
mod registry;

pub use edge::{EdgeId, EdgeInstance, PortRef};
pub use registry::EdgeRegistry;
