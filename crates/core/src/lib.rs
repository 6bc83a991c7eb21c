pub mod cart;
pub mod error;
pub mod ids;
pub mod item;
pub mod merge;

pub use cart::Cart;
pub use error::CoreError;
pub use ids::*;
pub use item::{CartItem, Price, ProductSummary};
pub use merge::merge;
