//! Enrollment endpoints and admission control.
//!
//! An enrollment ties a student to a course, unique per pair, optionally
//! placed in one cohort and/or one course group at admission time. Cohorts
//! and groups carry optional capacity limits; counts are derived from rows at
//! check time. When a request also names a cohort and/or group, the
//! enrollment and the membership are created as one atomic unit; "enrolled
//! but not grouped" is never observable.
//!
//! This module is split into small route-focused files plus a shared storage
//! layer so the HTTP surface stays easy to read and the SQL logic stays easy
//! to test. The handler modules only parse inputs and map the high-level
//! flow, while `storage` owns database queries and response shaping.
//!
//! Flow Overview:
//! 1) Authenticate via session token and require a staff role.
//! 2) Open one transaction and run the admission checks in order.
//! 3) Lock the capacity-bearing cohort/group row before counting, so two
//!    concurrent requests cannot both observe headroom and overshoot a limit.
//! 4) Perform the admitted writes and commit, or abort with a typed error.

pub(crate) mod enroll;
pub(crate) mod list;
pub(crate) mod manage;
mod storage;
pub(crate) mod types;

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
const MAX_BULK_STUDENTS: usize = 200;
const PROGRESS_COMPLETE: i32 = 100;
