//! Test utilities for methodgen unit tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use methodgen::test_support::SourceTreeFixture;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = SourceTreeFixture::new()
//!         .file("rh_point.cpp", "RH_C_FUNCTION void F(int x);\n")
//!         .build();
//!     let target = fixture.target();
//!     // Run the pipeline against `target`...
//! }
//! ```

pub mod fixtures;

// Re-export fixtures for convenience
pub use fixtures::*;
