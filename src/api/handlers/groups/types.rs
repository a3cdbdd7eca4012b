//! Request/response types for group-membership APIs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Member-add body: one enrollment or a batch, as explicit variants.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum AddMembersRequest {
    Single(SingleMemberRequest),
    Bulk(BulkMemberRequest),
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SingleMemberRequest {
    pub enrollment_id: Uuid,
    #[serde(default)]
    pub is_leader: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BulkMemberRequest {
    pub enrollment_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SetLeaderRequest {
    pub is_leader: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MembershipResponse {
    pub id: String,
    pub group_id: String,
    pub enrollment_id: String,
    pub student_id: String,
    pub is_leader: bool,
    pub joined_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkMemberOutcome {
    pub added: i64,
    pub skipped: i64,
    pub skipped_ids: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemovalOutcome {
    pub membership_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn add_members_resolves_single_with_default_leader() {
        let value = json!({ "enrollmentId": "c6f1f3b0-0000-4000-8000-000000000001" });
        let request: AddMembersRequest = serde_json::from_value(value).unwrap();
        match request {
            AddMembersRequest::Single(single) => assert!(!single.is_leader),
            AddMembersRequest::Bulk(_) => panic!("expected single variant"),
        }
    }

    #[test]
    fn add_members_resolves_bulk() {
        let value = json!({ "enrollmentIds": ["c6f1f3b0-0000-4000-8000-000000000001"] });
        let request: AddMembersRequest = serde_json::from_value(value).unwrap();
        assert!(matches!(request, AddMembersRequest::Bulk(_)));
    }

    #[test]
    fn add_members_rejects_unknown_fields() {
        let value = json!({
            "enrollmentId": "c6f1f3b0-0000-4000-8000-000000000001",
            "studentId": "c6f1f3b0-0000-4000-8000-000000000002"
        });
        assert!(serde_json::from_value::<AddMembersRequest>(value).is_err());
    }
}
