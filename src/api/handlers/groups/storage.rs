//! Transactional storage for group-membership admission.
//!
//! Same locking discipline as enrollment admission: the group row is locked
//! with `SELECT ... FOR UPDATE` before its member count is read, so
//! concurrent adds serialize and `max_members` cannot be overshot.

use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::super::{dedupe_ids, is_unique_violation, ApiError};
use super::types::{BulkMemberOutcome, MembershipResponse, RemovalOutcome};

const TS_FORMAT: &str = r#"YYYY-MM-DD"T"HH24:MI:SS"Z""#;

/// Adds one enrollment to a group. Per the admission order: group
/// existence/archive/capacity first, then duplicate membership, then insert.
pub(super) async fn add_member(
    pool: &PgPool,
    course_id: Uuid,
    group_id: Uuid,
    enrollment_id: Uuid,
    is_leader: bool,
) -> Result<MembershipResponse, ApiError> {
    let mut tx = pool.begin().await.map_err(ApiError::database)?;

    let max_members = lock_group(&mut tx, course_id, group_id).await?;

    let row = sqlx::query("SELECT student_id FROM enrollments WHERE id = $1 AND course_id = $2")
        .bind(enrollment_id)
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(ApiError::database)?;
    let Some(row) = row else {
        return Err(ApiError::not_found("Enrollment not found."));
    };
    let student_id: Uuid = row.get("student_id");

    if let Some(max_members) = max_members {
        let count = member_count(&mut tx, group_id).await?;
        if count >= i64::from(max_members) {
            return Err(ApiError::conflict("Group has reached its member limit."));
        }
    }

    let duplicate =
        sqlx::query("SELECT 1 FROM group_memberships WHERE group_id = $1 AND student_id = $2")
            .bind(group_id)
            .bind(student_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(ApiError::database)?;
    if duplicate.is_some() {
        return Err(ApiError::conflict(
            "Student is already a member of this group.",
        ));
    }

    let insert = format!(
        r"
        INSERT INTO group_memberships (group_id, enrollment_id, student_id, is_leader)
        VALUES ($1, $2, $3, $4)
        RETURNING
            id,
            to_char(joined_at AT TIME ZONE 'utc', '{TS_FORMAT}') AS joined_at
        "
    );
    let row = sqlx::query(&insert)
        .bind(group_id)
        .bind(enrollment_id)
        .bind(student_id)
        .bind(is_leader)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ApiError::conflict("Student is already a member of this group.")
            } else {
                ApiError::database(err)
            }
        })?;

    tx.commit().await.map_err(ApiError::database)?;

    Ok(MembershipResponse {
        id: row.get::<Uuid, _>("id").to_string(),
        group_id: group_id.to_string(),
        enrollment_id: enrollment_id.to_string(),
        student_id: student_id.to_string(),
        is_leader,
        joined_at: row.get("joined_at"),
    })
}

/// Adds a batch of enrollments. Invalid enrollment ids fail the whole batch,
/// existing members are skipped and reported, and the strict whole-batch
/// headroom rule applies, same policy as bulk enrollment.
pub(super) async fn add_members_bulk(
    pool: &PgPool,
    course_id: Uuid,
    group_id: Uuid,
    enrollment_ids: &[Uuid],
) -> Result<BulkMemberOutcome, ApiError> {
    let enrollment_ids = dedupe_ids(enrollment_ids);

    let mut tx = pool.begin().await.map_err(ApiError::database)?;

    let max_members = lock_group(&mut tx, course_id, group_id).await?;

    let rows =
        sqlx::query("SELECT id, student_id FROM enrollments WHERE id = ANY($1) AND course_id = $2")
            .bind(&enrollment_ids)
            .bind(course_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(ApiError::database)?;
    let students: HashMap<Uuid, Uuid> = rows
        .iter()
        .map(|row| (row.get("id"), row.get("student_id")))
        .collect();
    let invalid: Vec<String> = enrollment_ids
        .iter()
        .filter(|id| !students.contains_key(id))
        .map(ToString::to_string)
        .collect();
    if !invalid.is_empty() {
        return Err(ApiError::validation(format!(
            "Invalid enrollment ids: {}",
            invalid.join(", ")
        )));
    }

    let student_ids: Vec<Uuid> = enrollment_ids.iter().map(|id| students[id]).collect();
    let rows =
        sqlx::query("SELECT student_id FROM group_memberships WHERE group_id = $1 AND student_id = ANY($2)")
            .bind(group_id)
            .bind(&student_ids)
            .fetch_all(&mut *tx)
            .await
            .map_err(ApiError::database)?;
    let already_members: HashSet<Uuid> = rows.iter().map(|row| row.get("student_id")).collect();

    let to_add: Vec<(Uuid, Uuid)> = enrollment_ids
        .iter()
        .map(|id| (*id, students[id]))
        .filter(|(_, student_id)| !already_members.contains(student_id))
        .collect();
    let skipped: Vec<Uuid> = enrollment_ids
        .iter()
        .copied()
        .filter(|id| already_members.contains(&students[id]))
        .collect();

    if to_add.is_empty() {
        return Err(ApiError::conflict(
            "All students are already members of this group.",
        ));
    }

    let batch = i64::try_from(to_add.len()).unwrap_or(i64::MAX);
    if let Some(max_members) = max_members {
        let count = member_count(&mut tx, group_id).await?;
        if count + batch > i64::from(max_members) {
            return Err(ApiError::conflict(
                "Group does not have room for this batch.",
            ));
        }
    }

    for (enrollment_id, student_id) in &to_add {
        sqlx::query(
            "INSERT INTO group_memberships (group_id, enrollment_id, student_id) VALUES ($1, $2, $3)",
        )
        .bind(group_id)
        .bind(enrollment_id)
        .bind(student_id)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ApiError::conflict("Student is already a member of this group.")
            } else {
                ApiError::database(err)
            }
        })?;
    }

    tx.commit().await.map_err(ApiError::database)?;

    Ok(BulkMemberOutcome {
        added: batch,
        skipped: i64::try_from(skipped.len()).unwrap_or(i64::MAX),
        skipped_ids: skipped.iter().map(ToString::to_string).collect(),
    })
}

/// Toggles the leader flag on a membership. Archive state does not gate
/// leader changes, only new members.
pub(super) async fn set_leader(
    pool: &PgPool,
    course_id: Uuid,
    group_id: Uuid,
    membership_id: Uuid,
    is_leader: bool,
) -> Result<MembershipResponse, ApiError> {
    require_group(pool, course_id, group_id).await?;

    let update = format!(
        r"
        UPDATE group_memberships
        SET is_leader = $1
        WHERE id = $2 AND group_id = $3
        RETURNING
            enrollment_id,
            student_id,
            is_leader,
            to_char(joined_at AT TIME ZONE 'utc', '{TS_FORMAT}') AS joined_at
        "
    );
    let row = sqlx::query(&update)
        .bind(is_leader)
        .bind(membership_id)
        .bind(group_id)
        .fetch_optional(pool)
        .await
        .map_err(ApiError::database)?;
    let Some(row) = row else {
        return Err(ApiError::not_found("Membership not found."));
    };

    Ok(MembershipResponse {
        id: membership_id.to_string(),
        group_id: group_id.to_string(),
        enrollment_id: row.get::<Uuid, _>("enrollment_id").to_string(),
        student_id: row.get::<Uuid, _>("student_id").to_string(),
        is_leader: row.get("is_leader"),
        joined_at: row.get("joined_at"),
    })
}

/// Removes a membership. The enrollment itself is untouched.
pub(super) async fn remove_member(
    pool: &PgPool,
    course_id: Uuid,
    group_id: Uuid,
    membership_id: Uuid,
) -> Result<RemovalOutcome, ApiError> {
    require_group(pool, course_id, group_id).await?;

    let result = sqlx::query("DELETE FROM group_memberships WHERE id = $1 AND group_id = $2")
        .bind(membership_id)
        .bind(group_id)
        .execute(pool)
        .await
        .map_err(ApiError::database)?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Membership not found."));
    }

    Ok(RemovalOutcome {
        membership_id: membership_id.to_string(),
    })
}

/// Locks the group row and returns its member limit. Archived groups are
/// filtered out of the existence probe, so they read as not found.
async fn lock_group(
    tx: &mut Transaction<'_, Postgres>,
    course_id: Uuid,
    group_id: Uuid,
) -> Result<Option<i32>, ApiError> {
    let row = sqlx::query(
        "SELECT max_members FROM course_groups WHERE id = $1 AND course_id = $2 AND NOT is_archived FOR UPDATE",
    )
    .bind(group_id)
    .bind(course_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(ApiError::database)?;
    let Some(row) = row else {
        return Err(ApiError::not_found("Group not found."));
    };
    Ok(row.get("max_members"))
}

/// Existence probe for leader/removal paths; archived groups stay reachable.
async fn require_group(pool: &PgPool, course_id: Uuid, group_id: Uuid) -> Result<(), ApiError> {
    let row = sqlx::query("SELECT 1 FROM course_groups WHERE id = $1 AND course_id = $2")
        .bind(group_id)
        .bind(course_id)
        .fetch_optional(pool)
        .await
        .map_err(ApiError::database)?;
    if row.is_none() {
        return Err(ApiError::not_found("Group not found."));
    }
    Ok(())
}

async fn member_count(
    tx: &mut Transaction<'_, Postgres>,
    group_id: Uuid,
) -> Result<i64, ApiError> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM group_memberships WHERE group_id = $1")
        .bind(group_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(ApiError::database)?;
    Ok(row.get("count"))
}
