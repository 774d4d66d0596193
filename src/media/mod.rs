//! Media Merge Pipeline
//!
//! Reassembles a response's buffered video fragments into one finalized
//! mp4 artifact and hands it to local or remote storage.

mod merge;
mod storage;

pub use merge::{FfmpegEncoder, FragmentEncoder, MergePipeline};
pub use storage::{HttpObjectStorage, ObjectStorage};
