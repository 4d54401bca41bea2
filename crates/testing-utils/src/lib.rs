//! # Groupcall Testing Utils
//!
//! Shared testing utilities for the group dispatch workspace: mock
//! collaborators and test data builders.
//!
//! ## Usage
//!
//! Add this crate as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! groupcall-testing-utils = { path = "../testing-utils" }
//! ```
//!
//! Then use the mocks in your tests:
//!
//! ```rust
//! use groupcall_testing_utils::{GroupBuilder, MockInvoker};
//!
//! let invoker = MockInvoker::new().failing_on("member-1");
//! let members = GroupBuilder::new().with_members(3).build();
//! assert_eq!(members.len(), 3);
//! # let _ = invoker;
//! ```

pub mod builders;
pub mod mocks;

pub use builders::*;
pub use mocks::*;
