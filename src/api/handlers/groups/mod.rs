//! Course-group membership endpoints.
//!
//! Membership admission mirrors enrollment admission one entity shallower:
//! the group is resolved under its course (archived groups read as not
//! found), its row is locked before capacity is counted, and the insert
//! happens in the same transaction. The strict whole-batch headroom rule of
//! bulk enrollment applies to bulk adds here as well. Removing a member never
//! unenrolls the student.

pub(crate) mod members;
mod storage;
pub(crate) mod types;

const MAX_BULK_MEMBERS: usize = 200;
