mod load;
mod store;

pub use load::load;
pub use store::{GraphStore, NodeRecord};
