//! Authorization rules for the user endpoints. Pure functions over the
//! caller's identity facts; no transport or storage concerns.

use thiserror::Error;

use crate::error::ApiError;

/// Actions exposed by the user endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Register,
    Login,
    List,
    Retrieve,
    PartialUpdate,
    Destroy,
}

/// Minimum role an action demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredRole {
    Anyone,
    Authenticated,
    Admin,
}

/// Identity facts the policy needs about the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub id: i64,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl Requester {
    /// An ordinary authenticated member. Sufficient wherever staff flags do
    /// not matter.
    pub fn member(id: i64) -> Self {
        Self {
            id,
            is_staff: false,
            is_superuser: false,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PolicyError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("administrator role required")]
    Forbidden,
}

impl From<PolicyError> for ApiError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::Unauthenticated => ApiError::Unauthorized(err.to_string()),
            PolicyError::Forbidden => ApiError::Forbidden(err.to_string()),
        }
    }
}

pub fn required_role(action: UserAction) -> RequiredRole {
    match action {
        UserAction::Register | UserAction::Login => RequiredRole::Anyone,
        UserAction::List | UserAction::Retrieve | UserAction::PartialUpdate => {
            RequiredRole::Authenticated
        }
        UserAction::Destroy => RequiredRole::Admin,
    }
}

pub fn authorize(action: UserAction, requester: Option<&Requester>) -> Result<(), PolicyError> {
    match required_role(action) {
        RequiredRole::Anyone => Ok(()),
        RequiredRole::Authenticated => {
            requester.map(|_| ()).ok_or(PolicyError::Unauthenticated)
        }
        RequiredRole::Admin => match requester {
            None => Err(PolicyError::Unauthenticated),
            Some(r) if r.is_staff => Ok(()),
            Some(_) => Err(PolicyError::Forbidden),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff() -> Requester {
        Requester {
            id: 1,
            is_staff: true,
            is_superuser: true,
        }
    }

    #[test]
    fn role_map_matches_the_action_table() {
        assert_eq!(required_role(UserAction::Register), RequiredRole::Anyone);
        assert_eq!(required_role(UserAction::Login), RequiredRole::Anyone);
        assert_eq!(required_role(UserAction::List), RequiredRole::Authenticated);
        assert_eq!(
            required_role(UserAction::Retrieve),
            RequiredRole::Authenticated
        );
        assert_eq!(
            required_role(UserAction::PartialUpdate),
            RequiredRole::Authenticated
        );
        assert_eq!(required_role(UserAction::Destroy), RequiredRole::Admin);
    }

    #[test]
    fn open_actions_allow_anonymous_callers() {
        assert!(authorize(UserAction::Register, None).is_ok());
        assert!(authorize(UserAction::Login, None).is_ok());
    }

    #[test]
    fn authenticated_actions_reject_anonymous_callers() {
        for action in [
            UserAction::List,
            UserAction::Retrieve,
            UserAction::PartialUpdate,
        ] {
            assert_eq!(
                authorize(action, None),
                Err(PolicyError::Unauthenticated)
            );
            assert!(authorize(action, Some(&Requester::member(3))).is_ok());
        }
    }

    #[test]
    fn destroy_requires_staff() {
        assert_eq!(
            authorize(UserAction::Destroy, None),
            Err(PolicyError::Unauthenticated)
        );
        assert_eq!(
            authorize(UserAction::Destroy, Some(&Requester::member(3))),
            Err(PolicyError::Forbidden)
        );
        assert!(authorize(UserAction::Destroy, Some(&staff())).is_ok());
    }

    #[test]
    fn superuser_flag_alone_does_not_grant_admin() {
        // Admin gate keys off is_staff, as the destroy permission does.
        let requester = Requester {
            id: 9,
            is_staff: false,
            is_superuser: true,
        };
        assert_eq!(
            authorize(UserAction::Destroy, Some(&requester)),
            Err(PolicyError::Forbidden)
        );
    }
}
