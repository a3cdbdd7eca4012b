//! Enrollment lifecycle: progress updates, cohort reassignment, unenrollment.

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use uuid::Uuid;

use super::super::{auth::require_auth, json_ok, require_staff, ApiError};
use super::types::{
    EnrollmentResponse, ReassignCohortRequest, UnenrollOutcome, UnenrollQuery,
    UpdateEnrollmentRequest,
};
use super::{storage, PROGRESS_COMPLETE};

#[utoipa::path(
    put,
    path = "/v1/courses/{course_id}/enrollments/{enrollment_id}",
    request_body = UpdateEnrollmentRequest,
    params(
        ("course_id" = Uuid, Path, description = "Course id"),
        ("enrollment_id" = Uuid, Path, description = "Enrollment id"),
    ),
    responses(
        (status = 200, description = "Enrollment updated.", body = EnrollmentResponse),
        (status = 400, description = "Invalid input."),
        (status = 401, description = "Missing or invalid session token."),
        (status = 404, description = "Enrollment or cohort not found."),
        (status = 409, description = "Cohort is full."),
    ),
    tag = "enrollments"
)]
/// Updates progress and/or cohort placement. `completedAt` is set exactly
/// when progress reaches 100 and cleared when it drops below.
pub async fn update_enrollment(
    Path((course_id, enrollment_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<UpdateEnrollmentRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };
    if let Err(err) = require_staff(&principal) {
        return err.into_response();
    }

    let Some(Json(payload)) = payload else {
        return ApiError::validation("Missing or malformed request body.").into_response();
    };

    if payload.progress.is_none() && payload.cohort_id.is_none() {
        return ApiError::validation("No updates provided.").into_response();
    }
    if let Some(progress) = payload.progress {
        if !(0..=PROGRESS_COMPLETE).contains(&progress) {
            return ApiError::validation("progress must be between 0 and 100.").into_response();
        }
    }

    let cohort = payload.cohort_id.map(Some);
    match storage::update_enrollment(&pool, course_id, enrollment_id, payload.progress, cohort)
        .await
    {
        Ok(enrollment) => json_ok(StatusCode::OK, enrollment, "Enrollment updated."),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    patch,
    path = "/v1/courses/{course_id}/enrollments/{enrollment_id}",
    request_body = ReassignCohortRequest,
    params(
        ("course_id" = Uuid, Path, description = "Course id"),
        ("enrollment_id" = Uuid, Path, description = "Enrollment id"),
    ),
    responses(
        (status = 200, description = "Cohort updated.", body = EnrollmentResponse),
        (status = 400, description = "Missing cohortId field."),
        (status = 401, description = "Missing or invalid session token."),
        (status = 404, description = "Enrollment or cohort not found."),
        (status = 409, description = "New cohort is full."),
    ),
    tag = "enrollments"
)]
/// Reassigns (or clears, with `cohortId: null`) the student's cohort. Only
/// the new cohort's capacity is checked; the old slot frees implicitly.
pub async fn reassign_cohort(
    Path((course_id, enrollment_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<ReassignCohortRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };
    if let Err(err) = require_staff(&principal) {
        return err.into_response();
    }

    let Some(Json(payload)) = payload else {
        return ApiError::validation("Missing or malformed request body.").into_response();
    };
    let Some(cohort_change) = payload.cohort_id else {
        return ApiError::validation("cohortId is required.").into_response();
    };

    match storage::update_enrollment(&pool, course_id, enrollment_id, None, Some(cohort_change))
        .await
    {
        Ok(enrollment) => json_ok(StatusCode::OK, enrollment, "Cohort updated."),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/courses/{course_id}/enrollments/{enrollment_id}",
    params(
        ("course_id" = Uuid, Path, description = "Course id"),
        ("enrollment_id" = Uuid, Path, description = "Enrollment id"),
        ("force" = Option<bool>, Query, description = "Required when the enrollment has recorded progress"),
    ),
    responses(
        (status = 200, description = "Student unenrolled.", body = UnenrollOutcome),
        (status = 401, description = "Missing or invalid session token."),
        (status = 404, description = "Enrollment not found."),
        (status = 409, description = "Recorded progress requires force=true."),
    ),
    tag = "enrollments"
)]
/// Hard-deletes the enrollment plus its memberships and progress records in
/// one transaction. Recorded progress requires an explicit `?force=true`.
pub async fn unenroll(
    Path((course_id, enrollment_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<UnenrollQuery>,
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

    match storage::unenroll(&pool, course_id, enrollment_id, query.force).await {
        Ok(outcome) => json_ok(StatusCode::OK, outcome, "Student unenrolled."),
        Err(err) => err.into_response(),
    }
}
