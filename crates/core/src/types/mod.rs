pub mod descriptor;
pub mod source;
pub mod tag;
pub mod unique_id;

// Re-export commonly used types
pub use descriptor::{DescriptorType, TestDescriptor};
pub use source::TestSource;
pub use tag::TestTag;
pub use unique_id::{Segment, UniqueId, ENGINE_SEGMENT_TYPE};
