pub mod hash;
pub mod page;

pub use hash::ContentHash;
pub use page::{Page, PageContent, PageVersion, VersionEdit, VersionStatus};
