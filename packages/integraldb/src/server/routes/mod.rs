// HTTP routes
pub mod ask;
pub mod health;
pub mod index;

pub use ask::*;
pub use health::*;
pub use index::*;
