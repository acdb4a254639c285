// Device memory and the resources backed by it

pub mod buffer;
pub mod depth;
pub mod descriptor_set;
pub mod memory;

pub use buffer::*;
pub use depth::*;
pub use descriptor_set::*;
