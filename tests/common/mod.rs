//! Common test infrastructure
//!
//! Spins up the reminder runtime on a temporary SQLite database with a sink
//! that records every message instead of delivering it.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::TestHarness;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let harness = TestHarness::spawn();
//!     let user = harness.manager.create_user("ada", "ada@example.com").unwrap();
//!     harness.shutdown().await;
//! }
//! ```

mod fixtures;
mod sink;

// Not every test file uses every helper
#[allow(unused_imports)]
pub use fixtures::{today, todo_due_today, todo_due_tomorrow, TestHarness, FIRE_TIMEOUT, QUIET_PERIOD};
#[allow(unused_imports)]
pub use sink::RecordingSink;
