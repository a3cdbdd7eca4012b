//! # Rollcall (Enrollment & Membership Admission)
//!
//! `rollcall` is the admission-control service of a course back office. It
//! decides whether enrollment and group-membership requests are allowed given
//! capacity and uniqueness constraints, and performs the admitted writes
//! atomically against PostgreSQL.
//!
//! ## Admission Model (Courses, Cohorts, Groups)
//!
//! Courses own cohorts and course groups. An enrollment ties a student to a
//! course (unique per pair) and optionally to one cohort; a group membership
//! ties an enrollment to a course group (unique per group and student).
//!
//! - **Capacity:** cohorts carry an optional `enrollment_limit`, groups an
//!   optional `max_members`. Counts are derived from rows at check time, never
//!   cached.
//! - **Atomicity:** every admission runs inside one database transaction; the
//!   capacity-bearing cohort/group row is locked first, so concurrent requests
//!   cannot overshoot a limit. "Enrolled but not grouped" is never observable.
//! - **Bulk admission:** already-enrolled students are skipped and reported,
//!   invalid ids fail the whole batch, and headroom is checked for the batch
//!   as a whole. A batch that would exceed a limit is rejected in full.
//!
//! ## Authorization
//!
//! Callers authenticate with an opaque session token (cookie or bearer).
//! Enrollment and membership mutations require the `owner` or `instructor`
//! role; students can never admit themselves.
//!
//! ## Error Contract
//!
//! Failures use a stable JSON envelope `{success:false, error:{code, message}}`
//! with codes `VALIDATION_ERROR`, `NOT_FOUND`, `FORBIDDEN`, `CONFLICT`, and
//! `INTERNAL_ERROR`; successes use `{success:true, data, message}`.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
