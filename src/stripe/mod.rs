//! Record Striping Module
//!
//! Maps logical file byte ranges onto peers. Every file has a fixed record size;
//! record `k` (numbered from 1) lives on `peers[k % n]` at the same absolute offset
//! it has in the logical file, so each peer holds a sparse copy of the file.

pub mod coordinator;
pub mod layout;

pub use coordinator::{RecordSizes, StripeCoordinator};
pub use layout::{MAX_REQUEST_BYTES, RecordPlan, RecordSlice};
