pub mod backend;
pub mod logging;
pub mod shopper;

pub use backend::{FlakyRemote, TestBackend};
pub use logging::init_tracing;
pub use shopper::{TestShopper, product, quantities};
