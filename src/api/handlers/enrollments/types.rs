//! Request/response types for enrollment APIs.
//!
//! Field names follow the existing UI contract (camelCase on the wire).

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Enrollment creation body: one student or a batch.
///
/// The two shapes are explicit, separately validated variants;
/// `deny_unknown_fields` keeps the untagged resolution unambiguous.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum EnrollRequest {
    Single(SingleEnrollRequest),
    Bulk(BulkEnrollRequest),
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SingleEnrollRequest {
    pub student_id: Uuid,
    pub cohort_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BulkEnrollRequest {
    pub student_ids: Vec<Uuid>,
    pub cohort_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateEnrollmentRequest {
    pub cohort_id: Option<Uuid>,
    pub progress: Option<i32>,
}

/// `cohortId` must be present; `null` clears the cohort.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReassignCohortRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub cohort_id: Option<Option<Uuid>>,
}

/// Distinguishes an absent field from an explicit `null`.
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<Uuid>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Uuid>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct UnenrollQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEnrollmentsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub cohort_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub status: Option<StatusFilter>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    Completed,
    InProgress,
    NotStarted,
}

impl StatusFilter {
    /// Canonical query-param value, also used as the SQL discriminant.
    pub(super) const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::InProgress => "in_progress",
            Self::NotStarted => "not_started",
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentResponse {
    pub id: String,
    pub course_id: String,
    pub student_id: String,
    pub cohort_id: Option<String>,
    pub progress: i32,
    pub enrolled_at: String,
    pub completed_at: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkEnrollOutcome {
    pub enrolled: i64,
    pub skipped: i64,
    pub skipped_ids: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnenrollOutcome {
    pub enrollment_id: String,
    pub removed_memberships: i64,
    pub removed_progress_records: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentListItem {
    pub id: String,
    pub student_id: String,
    pub student_email: String,
    pub student_name: Option<String>,
    pub cohort_id: Option<String>,
    pub progress: i32,
    pub enrolled_at: String,
    pub completed_at: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentPage {
    pub items: Vec<EnrollmentListItem>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enroll_request_resolves_single() {
        let value = json!({ "studentId": "c6f1f3b0-0000-4000-8000-000000000001" });
        let request: EnrollRequest = serde_json::from_value(value).unwrap();
        assert!(matches!(request, EnrollRequest::Single(_)));
    }

    #[test]
    fn enroll_request_resolves_bulk() {
        let value = json!({
            "studentIds": ["c6f1f3b0-0000-4000-8000-000000000001"],
            "cohortId": "c6f1f3b0-0000-4000-8000-000000000002"
        });
        let request: EnrollRequest = serde_json::from_value(value).unwrap();
        assert!(matches!(request, EnrollRequest::Bulk(_)));
    }

    #[test]
    fn enroll_request_rejects_mixed_shape() {
        let value = json!({
            "studentId": "c6f1f3b0-0000-4000-8000-000000000001",
            "studentIds": ["c6f1f3b0-0000-4000-8000-000000000002"]
        });
        assert!(serde_json::from_value::<EnrollRequest>(value).is_err());
    }

    #[test]
    fn reassign_distinguishes_null_from_absent() {
        let explicit_null: ReassignCohortRequest =
            serde_json::from_value(json!({ "cohortId": null })).unwrap();
        assert_eq!(explicit_null.cohort_id, Some(None));

        let absent: ReassignCohortRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(absent.cohort_id, None);
    }

    #[test]
    fn status_filter_parses_snake_case() {
        let status: StatusFilter = serde_json::from_value(json!("in_progress")).unwrap();
        assert_eq!(status.as_str(), "in_progress");
    }

    #[test]
    fn responses_serialize_camel_case() {
        let outcome = BulkEnrollOutcome {
            enrolled: 2,
            skipped: 1,
            skipped_ids: vec!["a".to_string()],
        };
        let value = serde_json::to_value(outcome).unwrap();
        assert_eq!(value["enrolled"], 2);
        assert_eq!(value["skippedIds"][0], "a");
    }
}
