//! Pure data structures for the managed resource and its field rules.

pub mod resource;
pub mod validation;

pub use resource::*;
pub use validation::*;
