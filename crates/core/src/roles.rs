//! Well-known role name constants.
//!
//! These must match the `chk_users_role` constraint in
//! `20260301000001_create_users_table.sql`.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_PLAYER: &str = "player";

/// Every role a user row may carry.
pub const ALL_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_PLAYER];

/// Returns `true` if `role` is one of [`ALL_ROLES`].
pub fn is_known_role(role: &str) -> bool {
    ALL_ROLES.contains(&role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_roles_are_recognised() {
        assert!(is_known_role("admin"));
        assert!(is_known_role("player"));
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(!is_known_role("script"));
        assert!(!is_known_role(""));
    }
}
