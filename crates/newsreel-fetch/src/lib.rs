mod coordinator;
#[cfg(feature = "http")]
mod http;
mod memory;
mod storage;

pub use coordinator::{
    DEFAULT_MAX_BYTES, DEFAULT_TIMEOUT, FetchConfig, FetchCoordinator, FetchState,
};
#[cfg(feature = "http")]
pub use http::HttpObjectStorage;
pub use memory::MemoryObjectStorage;
pub use storage::{DynObjectStorage, ObjectStorage};
