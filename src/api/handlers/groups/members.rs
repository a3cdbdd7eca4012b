//! Group-member add/toggle/remove handlers.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use uuid::Uuid;

use super::super::{auth::require_auth, json_ok, require_staff, ApiError};
use super::types::{
    AddMembersRequest, BulkMemberOutcome, MembershipResponse, RemovalOutcome, SetLeaderRequest,
};
use super::{storage, MAX_BULK_MEMBERS};

#[utoipa::path(
    post,
    path = "/v1/courses/{course_id}/groups/{group_id}/members",
    request_body = AddMembersRequest,
    params(
        ("course_id" = Uuid, Path, description = "Course id"),
        ("group_id" = Uuid, Path, description = "Group id"),
    ),
    responses(
        (status = 201, description = "Member(s) added.", body = MembershipResponse),
        (status = 400, description = "Malformed input or invalid enrollment ids."),
        (status = 401, description = "Missing or invalid session token."),
        (status = 403, description = "Caller lacks a staff role."),
        (status = 404, description = "Group (or archived group) or enrollment not found."),
        (status = 409, description = "Duplicate membership or capacity exceeded.", body = BulkMemberOutcome),
    ),
    tag = "groups"
)]
/// Adds one enrollment or a batch to a course group. Archived groups reject
/// new members (they read as not found); a batch that would exceed
/// `maxMembers` is rejected in full.
pub async fn add_members(
    Path((course_id, group_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<AddMembersRequest>>,
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
        AddMembersRequest::Single(request) => {
            match storage::add_member(
                &pool,
                course_id,
                group_id,
                request.enrollment_id,
                request.is_leader,
            )
            .await
            {
                Ok(membership) => json_ok(StatusCode::CREATED, membership, "Member added."),
                Err(err) => err.into_response(),
            }
        }
        AddMembersRequest::Bulk(request) => {
            if request.enrollment_ids.is_empty() {
                return ApiError::validation("enrollmentIds must not be empty.").into_response();
            }
            if request.enrollment_ids.len() > MAX_BULK_MEMBERS {
                return ApiError::validation("Too many enrollments in one batch.").into_response();
            }
            match storage::add_members_bulk(&pool, course_id, group_id, &request.enrollment_ids)
                .await
            {
                Ok(outcome) => json_ok(StatusCode::CREATED, outcome, "Members added."),
                Err(err) => err.into_response(),
            }
        }
    }
}

#[utoipa::path(
    patch,
    path = "/v1/courses/{course_id}/groups/{group_id}/members/{membership_id}",
    request_body = SetLeaderRequest,
    params(
        ("course_id" = Uuid, Path, description = "Course id"),
        ("group_id" = Uuid, Path, description = "Group id"),
        ("membership_id" = Uuid, Path, description = "Membership id"),
    ),
    responses(
        (status = 200, description = "Membership updated.", body = MembershipResponse),
        (status = 400, description = "Malformed input."),
        (status = 401, description = "Missing or invalid session token."),
        (status = 404, description = "Group or membership not found."),
    ),
    tag = "groups"
)]
/// Toggles the leader flag on a membership.
pub async fn set_leader(
    Path((course_id, group_id, membership_id)): Path<(Uuid, Uuid, Uuid)>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<SetLeaderRequest>>,
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

    match storage::set_leader(&pool, course_id, group_id, membership_id, payload.is_leader).await {
        Ok(membership) => json_ok(StatusCode::OK, membership, "Membership updated."),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/courses/{course_id}/groups/{group_id}/members/{membership_id}",
    params(
        ("course_id" = Uuid, Path, description = "Course id"),
        ("group_id" = Uuid, Path, description = "Group id"),
        ("membership_id" = Uuid, Path, description = "Membership id"),
    ),
    responses(
        (status = 200, description = "Member removed.", body = RemovalOutcome),
        (status = 401, description = "Missing or invalid session token."),
        (status = 404, description = "Group or membership not found."),
    ),
    tag = "groups"
)]
/// Removes a member from a group. The underlying enrollment is untouched.
pub async fn remove_member(
    Path((course_id, group_id, membership_id)): Path<(Uuid, Uuid, Uuid)>,
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

    match storage::remove_member(&pool, course_id, group_id, membership_id).await {
        Ok(outcome) => json_ok(StatusCode::OK, outcome, "Member removed."),
        Err(err) => err.into_response(),
    }
}
