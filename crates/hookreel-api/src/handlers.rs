//! Request handlers.

pub mod batches;
pub mod health;

pub use batches::*;
pub use health::*;
