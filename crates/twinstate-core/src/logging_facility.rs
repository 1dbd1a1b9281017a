//! Structured logging facility for twinstate
//!
//! - Single initialization point via `init(profile)`
//! - Operation boundary macros (`log_op_start!`, `log_op_end!`, `log_op_error!`)
//! - Test capture mode for deterministic assertions
//!
//! Boundary logging belongs to the layer that owns the operation: the entity
//! executor and the enrichment cache. Dispatch and event application only
//! emit `debug`/`trace` events.
//!
//! # Usage
//!
//! ```rust
//! use twinstate_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
