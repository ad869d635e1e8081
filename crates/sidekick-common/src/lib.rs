pub mod errors;
pub mod id;

pub use errors::{ConfigError, SidekickError};
pub use id::{new_id, new_request_id, RequestId};

pub type Result<T> = std::result::Result<T, SidekickError>;
