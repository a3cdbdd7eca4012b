//! OpenAPI document assembly.
//!
//! Every documented route carries a `#[utoipa::path]` annotation; new
//! endpoints must be added to `paths(...)` here so the served spec and the
//! `openapi` binary stay in sync with the router.

use utoipa::OpenApi;

use super::handlers::{enrollments, groups, health};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "rollcall",
        description = "Enrollment and group membership admission control",
    ),
    paths(
        health::health,
        enrollments::enroll::create_enrollment,
        enrollments::list::list_enrollments,
        enrollments::manage::update_enrollment,
        enrollments::manage::reassign_cohort,
        enrollments::manage::unenroll,
        groups::members::add_members,
        groups::members::set_leader,
        groups::members::remove_member,
    ),
    components(schemas(
        health::Health,
        enrollments::types::EnrollRequest,
        enrollments::types::SingleEnrollRequest,
        enrollments::types::BulkEnrollRequest,
        enrollments::types::UpdateEnrollmentRequest,
        enrollments::types::ReassignCohortRequest,
        enrollments::types::StatusFilter,
        enrollments::types::EnrollmentResponse,
        enrollments::types::BulkEnrollOutcome,
        enrollments::types::UnenrollOutcome,
        enrollments::types::EnrollmentListItem,
        enrollments::types::Pagination,
        enrollments::types::EnrollmentPage,
        groups::types::AddMembersRequest,
        groups::types::SingleMemberRequest,
        groups::types::BulkMemberRequest,
        groups::types::SetLeaderRequest,
        groups::types::MembershipResponse,
        groups::types::BulkMemberOutcome,
        groups::types::RemovalOutcome,
    )),
    tags(
        (name = "health", description = "Service and database health"),
        (name = "enrollments", description = "Enrollment admission and lifecycle"),
        (name = "groups", description = "Course group membership"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_admission_routes() {
        let spec = openapi();
        let paths: Vec<&str> = spec.paths.paths.keys().map(String::as_str).collect();
        assert!(paths.contains(&"/health"));
        assert!(paths.contains(&"/v1/courses/{course_id}/enrollments"));
        assert!(paths.contains(&"/v1/courses/{course_id}/enrollments/{enrollment_id}"));
        assert!(paths.contains(&"/v1/courses/{course_id}/groups/{group_id}/members"));
        assert!(
            paths.contains(&"/v1/courses/{course_id}/groups/{group_id}/members/{membership_id}")
        );
    }

    #[test]
    fn openapi_info_is_stable() {
        let spec = openapi();
        assert_eq!(spec.info.title, "rollcall");
    }
}
