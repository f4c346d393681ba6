//! FMA binary formats
//!
//! Model files (`.fma`) and their material siblings (`.mtl.fma`). Both start
//! with the same magic number and carry their own string storage.

pub mod material;
pub mod model;

pub use material::*;
pub use model::*;
