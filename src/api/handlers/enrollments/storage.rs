//! Transactional storage for enrollment admission.
//!
//! Every admission runs in a single transaction. The capacity-bearing parent
//! row (cohort, group) is locked with `SELECT ... FOR UPDATE` before its row
//! count is read, so concurrent admissions against the same cohort/group
//! serialize and a limit can never be overshot by racing requests. Unique
//! constraints remain the backstop and map to `CONFLICT`.

use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::super::{dedupe_ids, is_unique_violation, ApiError};
use super::types::{
    BulkEnrollOutcome, BulkEnrollRequest, EnrollmentListItem, EnrollmentPage,
    EnrollmentResponse, ListEnrollmentsQuery, Pagination, SingleEnrollRequest, StatusFilter,
    UnenrollOutcome,
};
use super::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

const TS_FORMAT: &str = r#"YYYY-MM-DD"T"HH24:MI:SS"Z""#;

/// Admits one student into a course, optionally into a cohort and/or group.
/// Checks run in order and short-circuit; the writes commit together or not
/// at all.
pub(super) async fn enroll_single(
    pool: &PgPool,
    course_id: Uuid,
    request: &SingleEnrollRequest,
) -> Result<EnrollmentResponse, ApiError> {
    let mut tx = pool.begin().await.map_err(ApiError::database)?;

    require_open_course(&mut tx, course_id).await?;
    require_student(&mut tx, request.student_id).await?;

    let existing = sqlx::query("SELECT 1 FROM enrollments WHERE course_id = $1 AND student_id = $2")
        .bind(course_id)
        .bind(request.student_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(ApiError::database)?;
    if existing.is_some() {
        return Err(ApiError::conflict(
            "Student is already enrolled in this course.",
        ));
    }

    if let Some(cohort_id) = request.cohort_id {
        if let Some(limit) = lock_cohort(&mut tx, course_id, cohort_id).await? {
            let count = cohort_enrollment_count(&mut tx, cohort_id).await?;
            if count >= i64::from(limit) {
                return Err(ApiError::conflict(
                    "Cohort has reached its enrollment limit.",
                ));
            }
        }
    }

    if let Some(group_id) = request.group_id {
        if let Some(max_members) = lock_group(&mut tx, course_id, group_id).await? {
            let count = group_member_count(&mut tx, group_id).await?;
            if count >= i64::from(max_members) {
                return Err(ApiError::conflict("Group has reached its member limit."));
            }
        }
    }

    let insert = format!(
        r"
        INSERT INTO enrollments (course_id, student_id, cohort_id)
        VALUES ($1, $2, $3)
        RETURNING
            id,
            progress,
            to_char(enrolled_at AT TIME ZONE 'utc', '{TS_FORMAT}') AS enrolled_at
        "
    );
    let row = sqlx::query(&insert)
        .bind(course_id)
        .bind(request.student_id)
        .bind(request.cohort_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ApiError::conflict("Student is already enrolled in this course.")
            } else {
                ApiError::database(err)
            }
        })?;

    let enrollment_id: Uuid = row.get("id");

    if let Some(group_id) = request.group_id {
        insert_membership(&mut tx, group_id, enrollment_id, request.student_id).await?;
    }

    tx.commit().await.map_err(ApiError::database)?;

    Ok(EnrollmentResponse {
        id: enrollment_id.to_string(),
        course_id: course_id.to_string(),
        student_id: request.student_id.to_string(),
        cohort_id: request.cohort_id.map(|id| id.to_string()),
        progress: row.get("progress"),
        enrolled_at: row.get("enrolled_at"),
        completed_at: None,
    })
}

/// Admits a batch: invalid ids fail the whole request, already-enrolled
/// students are skipped and reported, and headroom is checked for the batch
/// as a whole: a batch landing exactly on a limit passes, one over fails in
/// full with nothing inserted.
pub(super) async fn enroll_bulk(
    pool: &PgPool,
    course_id: Uuid,
    request: &BulkEnrollRequest,
) -> Result<BulkEnrollOutcome, ApiError> {
    let student_ids = dedupe_ids(&request.student_ids);

    let mut tx = pool.begin().await.map_err(ApiError::database)?;

    require_open_course(&mut tx, course_id).await?;

    let rows = sqlx::query("SELECT id, role FROM users WHERE id = ANY($1)")
        .bind(&student_ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(ApiError::database)?;
    let roles: HashMap<Uuid, String> = rows
        .iter()
        .map(|row| (row.get("id"), row.get("role")))
        .collect();
    let invalid: Vec<String> = student_ids
        .iter()
        .filter(|id| roles.get(id).map_or(true, |role| role != "student"))
        .map(ToString::to_string)
        .collect();
    if !invalid.is_empty() {
        return Err(ApiError::validation(format!(
            "Invalid student ids: {}",
            invalid.join(", ")
        )));
    }

    let rows =
        sqlx::query("SELECT student_id FROM enrollments WHERE course_id = $1 AND student_id = ANY($2)")
            .bind(course_id)
            .bind(&student_ids)
            .fetch_all(&mut *tx)
            .await
            .map_err(ApiError::database)?;
    let already_enrolled: HashSet<Uuid> = rows.iter().map(|row| row.get("student_id")).collect();

    let to_enroll: Vec<Uuid> = student_ids
        .iter()
        .copied()
        .filter(|id| !already_enrolled.contains(id))
        .collect();
    let skipped: Vec<Uuid> = student_ids
        .iter()
        .copied()
        .filter(|id| already_enrolled.contains(id))
        .collect();

    if to_enroll.is_empty() {
        return Err(ApiError::conflict(
            "All students are already enrolled in this course.",
        ));
    }

    let batch = i64::try_from(to_enroll.len()).unwrap_or(i64::MAX);

    if let Some(cohort_id) = request.cohort_id {
        if let Some(limit) = lock_cohort(&mut tx, course_id, cohort_id).await? {
            let count = cohort_enrollment_count(&mut tx, cohort_id).await?;
            if count + batch > i64::from(limit) {
                return Err(ApiError::conflict(
                    "Cohort does not have room for this batch.",
                ));
            }
        }
    }

    if let Some(group_id) = request.group_id {
        if let Some(max_members) = lock_group(&mut tx, course_id, group_id).await? {
            let count = group_member_count(&mut tx, group_id).await?;
            if count + batch > i64::from(max_members) {
                return Err(ApiError::conflict(
                    "Group does not have room for this batch.",
                ));
            }
        }
    }

    for student_id in &to_enroll {
        let row = sqlx::query(
            "INSERT INTO enrollments (course_id, student_id, cohort_id) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(course_id)
        .bind(student_id)
        .bind(request.cohort_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ApiError::conflict("Student is already enrolled in this course.")
            } else {
                ApiError::database(err)
            }
        })?;

        if let Some(group_id) = request.group_id {
            let enrollment_id: Uuid = row.get("id");
            insert_membership(&mut tx, group_id, enrollment_id, *student_id).await?;
        }
    }

    tx.commit().await.map_err(ApiError::database)?;

    Ok(BulkEnrollOutcome {
        enrolled: batch,
        skipped: i64::try_from(skipped.len()).unwrap_or(i64::MAX),
        skipped_ids: skipped.iter().map(ToString::to_string).collect(),
    })
}

/// Updates progress and/or cohort placement. `cohort` is `None` to leave the
/// cohort untouched, `Some(None)` to clear it, `Some(Some(id))` to (re)assign.
/// Reassignment checks capacity against the new cohort only; the student's
/// own row never counts against headroom, so a same-cohort reassign passes.
pub(super) async fn update_enrollment(
    pool: &PgPool,
    course_id: Uuid,
    enrollment_id: Uuid,
    progress: Option<i32>,
    cohort: Option<Option<Uuid>>,
) -> Result<EnrollmentResponse, ApiError> {
    let mut tx = pool.begin().await.map_err(ApiError::database)?;

    let current = sqlx::query(
        "SELECT student_id FROM enrollments WHERE id = $1 AND course_id = $2 FOR UPDATE",
    )
    .bind(enrollment_id)
    .bind(course_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(ApiError::database)?;
    let Some(current) = current else {
        return Err(ApiError::not_found("Enrollment not found."));
    };
    let student_id: Uuid = current.get("student_id");

    if let Some(Some(new_cohort)) = cohort {
        if let Some(limit) = lock_cohort(&mut tx, course_id, new_cohort).await? {
            let count =
                sqlx::query("SELECT COUNT(*) AS count FROM enrollments WHERE cohort_id = $1 AND id <> $2")
                    .bind(new_cohort)
                    .bind(enrollment_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(ApiError::database)?
                    .get::<i64, _>("count");
            if count >= i64::from(limit) {
                return Err(ApiError::conflict(
                    "Cohort has reached its enrollment limit.",
                ));
            }
        }
    }

    let update = format!(
        r"
        UPDATE enrollments
        SET
            progress = COALESCE($1::int, progress),
            cohort_id = CASE WHEN $2::bool THEN $3::uuid ELSE cohort_id END,
            completed_at = CASE
                WHEN COALESCE($1::int, progress) = 100 THEN COALESCE(completed_at, NOW())
                ELSE NULL
            END
        WHERE id = $4
        RETURNING
            cohort_id,
            progress,
            to_char(enrolled_at AT TIME ZONE 'utc', '{TS_FORMAT}') AS enrolled_at,
            to_char(completed_at AT TIME ZONE 'utc', '{TS_FORMAT}') AS completed_at
        "
    );
    let row = sqlx::query(&update)
        .bind(progress)
        .bind(cohort.is_some())
        .bind(cohort.flatten())
        .bind(enrollment_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(ApiError::database)?;

    tx.commit().await.map_err(ApiError::database)?;

    Ok(EnrollmentResponse {
        id: enrollment_id.to_string(),
        course_id: course_id.to_string(),
        student_id: student_id.to_string(),
        cohort_id: row.get::<Option<Uuid>, _>("cohort_id").map(|id| id.to_string()),
        progress: row.get("progress"),
        enrolled_at: row.get("enrolled_at"),
        completed_at: row.get("completed_at"),
    })
}

/// Removes an enrollment and its dependent rows in one transaction.
/// Recorded progress requires `force`; the guard message tells the caller how
/// to re-invoke.
pub(super) async fn unenroll(
    pool: &PgPool,
    course_id: Uuid,
    enrollment_id: Uuid,
    force: bool,
) -> Result<UnenrollOutcome, ApiError> {
    let mut tx = pool.begin().await.map_err(ApiError::database)?;

    let row = sqlx::query(
        "SELECT progress FROM enrollments WHERE id = $1 AND course_id = $2 FOR UPDATE",
    )
    .bind(enrollment_id)
    .bind(course_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(ApiError::database)?;
    let Some(row) = row else {
        return Err(ApiError::not_found("Enrollment not found."));
    };
    let progress: i32 = row.get("progress");

    let tracked = sqlx::query("SELECT COUNT(*) AS count FROM progress_records WHERE enrollment_id = $1")
        .bind(enrollment_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(ApiError::database)?
        .get::<i64, _>("count");

    if !force && (progress > 0 || tracked > 0) {
        return Err(ApiError::conflict(
            "Enrollment has recorded progress. Add ?force=true to remove it.",
        ));
    }

    // Ordered deletes; the schema has no cascade on these foreign keys.
    let memberships = sqlx::query("DELETE FROM group_memberships WHERE enrollment_id = $1")
        .bind(enrollment_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::database)?
        .rows_affected();
    let records = sqlx::query("DELETE FROM progress_records WHERE enrollment_id = $1")
        .bind(enrollment_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::database)?
        .rows_affected();
    sqlx::query("DELETE FROM enrollments WHERE id = $1")
        .bind(enrollment_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::database)?;

    tx.commit().await.map_err(ApiError::database)?;

    Ok(UnenrollOutcome {
        enrollment_id: enrollment_id.to_string(),
        removed_memberships: i64::try_from(memberships).unwrap_or(i64::MAX),
        removed_progress_records: i64::try_from(records).unwrap_or(i64::MAX),
    })
}

/// Paginated listing with optional cohort/group/status/search/date filters.
/// Filters are nullable binds so the SQL stays static.
pub(super) async fn fetch_enrollment_page(
    pool: &PgPool,
    course_id: Uuid,
    params: &ListEnrollmentsQuery,
) -> Result<EnrollmentPage, ApiError> {
    let course = sqlx::query("SELECT 1 FROM courses WHERE id = $1")
        .bind(course_id)
        .fetch_optional(pool)
        .await
        .map_err(ApiError::database)?;
    if course.is_none() {
        return Err(ApiError::not_found("Course not found."));
    }

    let page = params.page.unwrap_or(DEFAULT_PAGE).max(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1) * limit;
    let status = params.status.map(StatusFilter::as_str);

    const FILTER: &str = r"
        e.course_id = $1
        AND ($2::uuid IS NULL OR e.cohort_id = $2)
        AND ($3::uuid IS NULL OR EXISTS (
            SELECT 1 FROM group_memberships m
            WHERE m.enrollment_id = e.id AND m.group_id = $3
        ))
        AND ($4::text IS NULL
            OR u.email ILIKE '%' || $4 || '%'
            OR u.display_name ILIKE '%' || $4 || '%')
        AND ($5::text IS NULL
            OR ($5 = 'completed' AND e.progress = 100)
            OR ($5 = 'in_progress' AND e.progress > 0 AND e.progress < 100)
            OR ($5 = 'not_started' AND e.progress = 0))
        AND ($6::text IS NULL OR e.enrolled_at >= $6::date)
        AND ($7::text IS NULL OR e.enrolled_at < $7::date + 1)
    ";

    let count_sql = format!(
        "SELECT COUNT(*) AS count FROM enrollments e JOIN users u ON u.id = e.student_id WHERE {FILTER}"
    );
    let total = sqlx::query(&count_sql)
        .bind(course_id)
        .bind(params.cohort_id)
        .bind(params.group_id)
        .bind(params.search.as_deref())
        .bind(status)
        .bind(params.start_date.as_deref())
        .bind(params.end_date.as_deref())
        .fetch_one(pool)
        .await
        .map_err(ApiError::database)?
        .get::<i64, _>("count");

    let data_sql = format!(
        r"
        SELECT
            e.id::text AS id,
            e.student_id::text AS student_id,
            u.email AS student_email,
            u.display_name AS student_name,
            e.cohort_id::text AS cohort_id,
            e.progress,
            to_char(e.enrolled_at AT TIME ZONE 'utc', '{TS_FORMAT}') AS enrolled_at,
            to_char(e.completed_at AT TIME ZONE 'utc', '{TS_FORMAT}') AS completed_at
        FROM enrollments e
        JOIN users u ON u.id = e.student_id
        WHERE {FILTER}
        ORDER BY e.enrolled_at DESC
        LIMIT $8 OFFSET $9
        "
    );
    let rows = sqlx::query(&data_sql)
        .bind(course_id)
        .bind(params.cohort_id)
        .bind(params.group_id)
        .bind(params.search.as_deref())
        .bind(status)
        .bind(params.start_date.as_deref())
        .bind(params.end_date.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(ApiError::database)?;

    let items = rows
        .into_iter()
        .map(|row| EnrollmentListItem {
            id: row.get("id"),
            student_id: row.get("student_id"),
            student_email: row.get("student_email"),
            student_name: row.get("student_name"),
            cohort_id: row.get("cohort_id"),
            progress: row.get("progress"),
            enrolled_at: row.get("enrolled_at"),
            completed_at: row.get("completed_at"),
        })
        .collect();

    let total_pages = if total == 0 { 0 } else { (total + limit - 1) / limit };

    Ok(EnrollmentPage {
        items,
        pagination: Pagination {
            page,
            limit,
            total,
            total_pages,
        },
    })
}

/// Course must exist and be open for enrollment.
async fn require_open_course(
    tx: &mut Transaction<'_, Postgres>,
    course_id: Uuid,
) -> Result<(), ApiError> {
    let row = sqlx::query("SELECT enrollment_open FROM courses WHERE id = $1")
        .bind(course_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(ApiError::database)?;
    let Some(row) = row else {
        return Err(ApiError::not_found("Course not found."));
    };
    if !row.get::<bool, _>("enrollment_open") {
        return Err(ApiError::forbidden("Enrollment is closed for this course."));
    }
    Ok(())
}

/// Target user must exist and carry the student role.
async fn require_student(
    tx: &mut Transaction<'_, Postgres>,
    student_id: Uuid,
) -> Result<(), ApiError> {
    let row = sqlx::query("SELECT role FROM users WHERE id = $1")
        .bind(student_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(ApiError::database)?;
    let Some(row) = row else {
        return Err(ApiError::not_found("Student not found."));
    };
    if row.get::<String, _>("role") != "student" {
        return Err(ApiError::validation("User is not a student."));
    }
    Ok(())
}

/// Locks the cohort row for the rest of the transaction and returns its
/// enrollment limit (None when unbounded).
async fn lock_cohort(
    tx: &mut Transaction<'_, Postgres>,
    course_id: Uuid,
    cohort_id: Uuid,
) -> Result<Option<i32>, ApiError> {
    let row = sqlx::query(
        "SELECT enrollment_limit FROM cohorts WHERE id = $1 AND course_id = $2 FOR UPDATE",
    )
    .bind(cohort_id)
    .bind(course_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(ApiError::database)?;
    let Some(row) = row else {
        return Err(ApiError::not_found("Cohort not found."));
    };
    Ok(row.get("enrollment_limit"))
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

async fn cohort_enrollment_count(
    tx: &mut Transaction<'_, Postgres>,
    cohort_id: Uuid,
) -> Result<i64, ApiError> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM enrollments WHERE cohort_id = $1")
        .bind(cohort_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(ApiError::database)?;
    Ok(row.get("count"))
}

async fn group_member_count(
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

async fn insert_membership(
    tx: &mut Transaction<'_, Postgres>,
    group_id: Uuid,
    enrollment_id: Uuid,
    student_id: Uuid,
) -> Result<(), ApiError> {
    sqlx::query(
        "INSERT INTO group_memberships (group_id, enrollment_id, student_id) VALUES ($1, $2, $3)",
    )
    .bind(group_id)
    .bind(enrollment_id)
    .bind(student_id)
    .execute(&mut **tx)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            ApiError::conflict("Student is already a member of this group.")
        } else {
            ApiError::database(err)
        }
    })?;
    Ok(())
}
