pub mod apply;
pub mod fetch;
pub mod matrix;
pub mod rollback;
pub mod single;
pub mod strip;
pub mod whoami;

pub use apply::ApplyChanges;
pub use fetch::Fetch;
pub use matrix::Matrix;
pub use rollback::Rollback;
pub use single::Single;
pub use strip::Strip;
pub use whoami::Whoami;
