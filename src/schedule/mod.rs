//! Schedule model shared by the editor, the resolver and the store.

pub mod age;
pub mod model;
pub mod pricing;

pub use age::{AgeBounds, AgeBucket, AgeRange};
pub use model::*;
pub use pricing::{Pricing, SiblingDiscount};
