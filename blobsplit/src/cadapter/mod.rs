//! Object store adapter (cAdapter)
//!
//! Submodules:
//! - `client`: the `ObjectBackend` seam and the `ObjectClient` wrapper used by the splitter
//! - `s3`: S3-compatible adapter implementation
//! - `localfs`: local directory backend for demos and mocks
//! - `memory`: in-memory backend for tests
//!
//! Responsibilities summary:
//! - Provide an async API for range reads, metadata, put, compose, copy and delete.
//! - Keep store-specific workarounds (multipart uploads, server-side copies) out of the core.
pub mod client;
pub mod localfs;
pub mod memory;
pub mod s3;
