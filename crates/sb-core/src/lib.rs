pub mod error;
pub mod id;
pub mod model;
pub mod ops;
pub mod template;
pub mod tree;
pub mod validate;

pub use error::{DocumentError, OperationError};
pub use id::NodeId;
pub use model::*;
pub use ops::{Applied, Operation, clone_with_fresh_ids};
pub use template::{Template, builtin_templates};
pub use tree::{NodePath, Tree};
pub use validate::{Severity, Violation, has_errors, validate_tree};
