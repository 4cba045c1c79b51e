pub mod document;
pub mod matcher;
pub mod types;

pub use document::{Body, Document, Payload};
pub use matcher::{Constraint, ConstraintTable};
pub use types::{ColumnValueSet, ErrorList, is_pseudo, pseudo};
