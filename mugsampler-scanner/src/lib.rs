pub mod blob;
pub mod error;
pub mod fetcher;
pub mod page;

pub use blob::{BlobStore, DirectoryBlobStore, GcsBlobStore};
pub use error::{ScanError, StoreError};
pub use fetcher::{HttpFetcher, PageFetcher};
pub use page::{Page, TreeNode};
