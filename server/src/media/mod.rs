//! Media attachments: storage paths, upload validation, and release of
//! files that are no longer referenced by any record.

pub mod attachments;
pub mod storage;
pub mod validation;
