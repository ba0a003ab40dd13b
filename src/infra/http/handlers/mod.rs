mod builds;
mod cart;
mod categories;
mod components;
mod receipts;

pub use builds::*;
pub use cart::*;
pub use categories::*;
pub use components::*;
pub use receipts::*;
