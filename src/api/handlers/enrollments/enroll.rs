//! Enrollment creation: single-student and bulk admission.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use uuid::Uuid;

use super::super::{auth::require_auth, json_ok, require_staff, ApiError};
use super::types::{BulkEnrollOutcome, EnrollRequest, EnrollmentResponse};
use super::{storage, MAX_BULK_STUDENTS};

#[utoipa::path(
    post,
    path = "/v1/courses/{course_id}/enrollments",
    request_body = EnrollRequest,
    params(("course_id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 201, description = "Student(s) enrolled.", body = EnrollmentResponse),
        (status = 400, description = "Malformed input or non-student user."),
        (status = 401, description = "Missing or invalid session token."),
        (status = 403, description = "Enrollment closed, or caller lacks a staff role."),
        (status = 404, description = "Course, cohort, or group not found."),
        (status = 409, description = "Duplicate enrollment or capacity exceeded.", body = BulkEnrollOutcome),
    ),
    tag = "enrollments"
)]
/// Admits one student or a batch into a course, optionally into a cohort
/// and/or group. A single student is either fully admitted (enrollment plus
/// requested memberships) or not at all; a batch skips already-enrolled
/// students and reports them, but rejects in full on invalid ids or
/// insufficient headroom.
pub async fn create_enrollment(
    Path(course_id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<EnrollRequest>>,
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

    match payload {
        EnrollRequest::Single(request) => {
            match storage::enroll_single(&pool, course_id, &request).await {
                Ok(enrollment) => json_ok(StatusCode::CREATED, enrollment, "Student enrolled."),
                Err(err) => err.into_response(),
            }
        }
        EnrollRequest::Bulk(request) => {
            if request.student_ids.is_empty() {
                return ApiError::validation("studentIds must not be empty.").into_response();
            }
            if request.student_ids.len() > MAX_BULK_STUDENTS {
                return ApiError::validation("Too many students in one batch.").into_response();
            }
            match storage::enroll_bulk(&pool, course_id, &request).await {
                Ok(outcome) => json_ok(StatusCode::CREATED, outcome, "Students enrolled."),
                Err(err) => err.into_response(),
            }
        }
    }
}
