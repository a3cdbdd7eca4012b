//! Authenticated principal extraction and authorization helpers.

use axum::http::{HeaderMap, StatusCode};
use sqlx::PgPool;

use super::session::authenticate_session;

/// Platform role attached to a user row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Owner,
    Instructor,
    Student,
}

impl Role {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "owner" => Some(Self::Owner),
            "instructor" => Some(Self::Instructor),
            "student" => Some(Self::Student),
            _ => None,
        }
    }
}

/// Authenticated user context derived from the session token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: uuid::Uuid,
    pub email: String,
    pub role: Role,
}

impl Principal {
    /// Enrollment and membership writes are reserved for back-office staff.
    #[must_use]
    pub const fn can_manage_enrollments(&self) -> bool {
        matches!(self.role, Role::Owner | Role::Instructor)
    }
}

/// Resolve a session token into a principal, or return 401 for missing sessions.
pub async fn require_auth(headers: &HeaderMap, pool: &PgPool) -> Result<Principal, StatusCode> {
    match authenticate_session(headers, pool).await {
        Ok(Some(record)) => {
            // Unknown role values fail closed.
            let Some(role) = Role::parse(&record.role) else {
                return Err(StatusCode::UNAUTHORIZED);
            };
            Ok(Principal {
                user_id: record.user_id,
                email: record.email,
                role,
            })
        }
        Ok(None) => Err(StatusCode::UNAUTHORIZED),
        Err(status) => Err(status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_roles_can_manage() {
        for role in [Role::Owner, Role::Instructor] {
            let principal = Principal {
                user_id: uuid::Uuid::new_v4(),
                email: "staff@example.com".to_string(),
                role,
            };
            assert!(principal.can_manage_enrollments());
        }
    }

    #[test]
    fn students_cannot_manage() {
        let principal = Principal {
            user_id: uuid::Uuid::new_v4(),
            email: "student@example.com".to_string(),
            role: Role::Student,
        };
        assert!(!principal.can_manage_enrollments());
    }

    #[test]
    fn role_parse_rejects_unknown() {
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::parse("owner"), Some(Role::Owner));
        assert_eq!(Role::parse("instructor"), Some(Role::Instructor));
        assert_eq!(Role::parse("student"), Some(Role::Student));
    }
}
