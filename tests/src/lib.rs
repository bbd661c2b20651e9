//! # Courier Test Suite
//!
//! Unified test crate for the courier workspace.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/
//! │   ├── fixtures.rs        # Shared messages and recording handlers
//! │   └── integration/       # Cross-crate behavior of the bus
//! │       ├── fan_out.rs     # Direct publish: completeness + isolation
//! │       ├── queueing.rs    # Per-type FIFOs and consumer lifecycle
//! │       ├── pipelines.rs   # Behavior chains through the facade
//! │       └── lifecycle.rs   # Start/stop/dispose semantics
//! └── benches/
//!     └── bus_benchmarks.rs  # criterion: publish, send, pipeline depth
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p courier-tests
//!
//! # By category
//! cargo test -p courier-tests integration::queueing::
//!
//! # Benchmarks
//! cargo bench -p courier-tests
//! ```

#![allow(dead_code)]

pub mod integration;
