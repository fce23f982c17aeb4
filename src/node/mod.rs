mod layer;
mod node;
mod value;

pub use layer::*;
pub use node::*;
pub use value::*;
