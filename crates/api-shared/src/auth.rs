//! Caller authentication.
//!
//! Every protected request carries a shared API key plus the caller's identity in
//! [`USER_ID_HEADER`] and [`USER_ROLE_HEADER`]. Establishing that identity (login, sessions) is
//! the job of whatever sits in front of the API; here it is parsed and then checked against the
//! registered account with [`confirm_registered_role`].

use riskcare_core::{CallerContext, Role, UserId};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("invalid API key")]
    InvalidApiKey,
    #[error("invalid {header} header: {value}")]
    InvalidHeader { header: &'static str, value: String },
    #[error("no account registered for user {0}")]
    UnknownUser(UserId),
    #[error("user {user_id} is registered as a {registered}, not a {claimed}")]
    RoleMismatch {
        user_id: UserId,
        claimed: Role,
        registered: Role,
    },
}

/// Validates the provided API key against the key configured at startup.
///
/// Returns `Ok(())` if the key matches, or an error if it is invalid or missing.
pub fn validate_api_key(provided_key: Option<&str>, expected_key: &str) -> Result<(), AuthError> {
    let provided_key = provided_key.ok_or(AuthError::MissingHeader(API_KEY_HEADER))?;
    if provided_key == expected_key {
        Ok(())
    } else {
        Err(AuthError::InvalidApiKey)
    }
}

/// Builds the caller context from the identity header values.
///
/// # Errors
///
/// Returns [`AuthError::MissingHeader`] if either value is absent and
/// [`AuthError::InvalidHeader`] if the id is not a canonical record id or the role is unknown.
pub fn caller_from_headers(
    user_id: Option<&str>,
    role: Option<&str>,
) -> Result<CallerContext, AuthError> {
    let user_id = user_id.ok_or(AuthError::MissingHeader(USER_ID_HEADER))?;
    let role = role.ok_or(AuthError::MissingHeader(USER_ROLE_HEADER))?;

    let user_id = UserId::parse(user_id.trim()).map_err(|_| AuthError::InvalidHeader {
        header: USER_ID_HEADER,
        value: user_id.to_string(),
    })?;
    let role = role.parse::<Role>().map_err(|_| AuthError::InvalidHeader {
        header: USER_ROLE_HEADER,
        value: role.to_string(),
    })?;

    Ok(CallerContext::new(user_id, role))
}

/// Checks the claimed role against the role the account was registered with.
///
/// `registered` is `None` when no account exists for the caller.
pub fn confirm_registered_role(
    caller: &CallerContext,
    registered: Option<Role>,
) -> Result<(), AuthError> {
    match registered {
        None => Err(AuthError::UnknownUser(caller.user_id)),
        Some(role) if role != caller.role => Err(AuthError::RoleMismatch {
            user_id: caller.user_id,
            claimed: caller.role,
            registered: role,
        }),
        Some(_) => Ok(()),
    }
}
