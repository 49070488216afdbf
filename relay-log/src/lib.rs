//! Diagnostic logging for the log relay.
//!
//! The relay reports its own failures (dropped records, unreachable backends, failed sends) to an
//! operator-facing diagnostic stream. This stream is strictly separate from the log records the
//! relay forwards: nothing logged through this crate is ever sent to the backend.
//!
//! # Setup
//!
//! To enable logging, invoke the [`init`] function with a [`LogConfig`]. The configuration
//! implements `serde` traits, so it can be obtained from configuration files. This requires the
//! `init` feature.
//!
//! ```ignore
//! use relay_log::LogConfig;
//!
//! let log_config = LogConfig {
//!     enable_backtraces: true,
//!     ..LogConfig::default()
//! };
//!
//! relay_log::init(&log_config);
//! ```
//!
//! # Logging
//!
//! The basic use of this crate is through the five logging macros: [`error!`], [`warn!`],
//! [`info!`], [`debug!`] and [`trace!`] where `error!` represents the highest-priority log messages
//! and `trace!` the lowest. Each of these macros accept format strings similarly to
//! [`println!`] and structured fields like `tracing`.
//!
//! ## Conventions
//!
//! Log messages should start lowercase and end without punctuation. Prefer short and precise log
//! messages over verbose text. Choose the log level according to these rules:
//!
//! - [`error!`] for bugs, lost records and invalid behavior.
//! - [`warn!`] for undesirable behavior, such as shedding load.
//! - [`info!`] for messages relevant to the average user.
//! - [`debug!`] for messages usually relevant to debugging.
//! - [`trace!`] for full auxiliary information.
//!
//! ## Logging Error Types
//!
//! To log errors along with all their causes, pass them as the `error` field or use the
//! [`LogError`] wrapper:
//!
//! ```
//! use std::io::{Error, ErrorKind};
//! use relay_log::LogError;
//!
//! let custom_error = Error::new(ErrorKind::Other, "oh no!");
//! relay_log::error!(error = &custom_error as &dyn std::error::Error, "operation failed");
//! relay_log::error!("operation failed: {}", LogError(&custom_error));
//! ```
//!
//! # Testing
//!
//! For unit testing, there is a separate initialization macro [`init_test!`] that should be called
//! at the beginning of test method. To assert on emitted diagnostics, use [`test::capture`]. Both
//! require the `test` feature.
//!
//! ```ignore
//! #[test]
//! fn test_something() {
//!     relay_log::init_test!();
//! }
//! ```

#![warn(missing_docs)]

#[cfg(feature = "init")]
mod setup;
#[cfg(feature = "init")]
pub use setup::*;


mod utils;
pub use utils::*;

// Expose the minimal log facade.
#[doc(inline)]
pub use tracing::{debug, error, info, trace, warn};
