//! Paginated enrollment listing with cohort/group/status/date filters.

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use uuid::Uuid;

use super::super::{auth::require_auth, json_ok, require_staff, valid_date, ApiError};
use super::types::{EnrollmentPage, ListEnrollmentsQuery};
use super::storage;

#[utoipa::path(
    get,
    path = "/v1/courses/{course_id}/enrollments",
    params(
        ("course_id" = Uuid, Path, description = "Course id"),
        ("page" = Option<i64>, Query, description = "1-based page number"),
        ("limit" = Option<i64>, Query, description = "Page size, capped at 100"),
        ("search" = Option<String>, Query, description = "Matches student email or name"),
        ("cohortId" = Option<Uuid>, Query, description = "Filter by cohort"),
        ("groupId" = Option<Uuid>, Query, description = "Filter by group membership"),
        ("status" = Option<String>, Query, description = "completed | in_progress | not_started"),
        ("startDate" = Option<String>, Query, description = "Enrolled on or after, YYYY-MM-DD"),
        ("endDate" = Option<String>, Query, description = "Enrolled on or before, YYYY-MM-DD"),
    ),
    responses(
        (status = 200, description = "Enrollment page.", body = EnrollmentPage),
        (status = 400, description = "Invalid filter value."),
        (status = 401, description = "Missing or invalid session token."),
        (status = 404, description = "Course not found."),
    ),
    tag = "enrollments"
)]
pub async fn list_enrollments(
    Path(course_id): Path<Uuid>,
    Query(params): Query<ListEnrollmentsQuery>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };
    if let Err(err) = require_staff(&principal) {
        return err.into_response();
    }

    if let Some(date) = params.start_date.as_deref() {
        if !valid_date(date) {
            return ApiError::validation("startDate must be YYYY-MM-DD.").into_response();
        }
    }
    if let Some(date) = params.end_date.as_deref() {
        if !valid_date(date) {
            return ApiError::validation("endDate must be YYYY-MM-DD.").into_response();
        }
    }

    match storage::fetch_enrollment_page(&pool, course_id, &params).await {
        Ok(page) => json_ok(StatusCode::OK, page, "Enrollments retrieved."),
        Err(err) => err.into_response(),
    }
}
