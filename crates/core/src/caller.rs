//! Explicit identity of whoever invoked a core operation.
//!
//! The API layers build a [`CallerContext`] per request and pass it into every service call;
//! core never consults ambient session state.

use crate::ids::UserId;
use crate::model::Role;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerContext {
    pub user_id: UserId,
    pub role: Role,
}

impl CallerContext {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn patient(user_id: UserId) -> Self {
        Self::new(user_id, Role::Patient)
    }

    pub fn doctor(user_id: UserId) -> Self {
        Self::new(user_id, Role::Doctor)
    }

    /// # Errors
    ///
    /// Returns [`CoreError::RoleRequired`] when the caller holds a different role.
    pub fn require_role(&self, role: Role) -> CoreResult<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(CoreError::RoleRequired(role.as_str()))
        }
    }
}
