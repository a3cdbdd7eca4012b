//! Session authentication for back-office callers.
//!
//! Flow Overview: read the session token (cookie or bearer header), resolve it
//! to a user row, and hand downstream handlers a [`principal::Principal`]
//! carrying the platform role. Role checks happen in the handlers so the
//! failure can use the shared error envelope.

pub(crate) mod principal;
pub(crate) mod session;

pub(crate) use principal::require_auth;

const SESSION_COOKIE: &str = "rollcall_session";
