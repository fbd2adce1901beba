pub mod args;
pub mod op;
pub mod ops;

pub use ops::{ApplyChanges, Fetch, Matrix, Rollback, Single, Strip, Whoami};
