pub mod address;
pub mod context;
pub mod logging;
pub mod traits;

pub use tracing;
