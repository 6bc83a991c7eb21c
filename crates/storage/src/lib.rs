pub mod error;
pub mod local;
pub mod remote;
pub mod schema;
pub mod traits;

pub use error::StorageError;
pub use local::SqliteCartCache;
pub use remote::SqliteCartRepository;
pub use traits::*;
