//! Shared test utilities for ClassLab test suites
//!
//! # Modules
//!
//! - [`relay`]: in-process mock collaboration server for integration tests
//! - [`logging`]: test logging configuration
//!
//! # Example
//!
//! ```rust,no_run
//! use lab_test_helpers::prelude::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     init_test_logging();
//!     let relay = MockRelay::start().await;
//!     println!("relay at {}", relay.url());
//! }
//! ```

pub mod logging;
pub mod relay;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::logging::init_test_logging;
    pub use crate::relay::MockRelay;
}
