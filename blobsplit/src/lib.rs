//! Library crate for blobsplit: line-safe splitting and header prepending for
//! large text objects held in an S3-compatible object store.

pub mod cadapter;
pub mod config;
pub mod error;
pub mod header;
pub mod object;
pub mod range;
pub mod split;

pub use cadapter::client::{ObjectBackend, ObjectClient, ObjectMeta};
pub use config::SplitConfig;
pub use error::{HeaderError, SplitError, StoreError};
pub use header::HeaderComposer;
pub use object::RemoteObject;
pub use range::ByteRange;
pub use split::Splitter;
pub use split::plan::SplitPlan;
