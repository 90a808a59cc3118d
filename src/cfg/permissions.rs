use std::fmt;

/// Named role sets used to authorize commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Admin,
    Moderator,
    LtAdmin,
}

impl Permission {
    /// Key of the role list in the `permissions` section.
    pub fn config_key(self) -> &'static str {
        match self {
            Permission::Admin => "admin_roles",
            Permission::Moderator => "moderator_roles",
            Permission::LtAdmin => "lt_admin_roles",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Admin => write!(f, "admin"),
            Permission::Moderator => write!(f, "moderator"),
            Permission::LtAdmin => write!(f, "lt_admin"),
        }
    }
}

/// Role names granting each permission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions {
    pub admin: Vec<String>,
    pub moderator: Vec<String>,
    pub lt_admin: Vec<String>,
}

impl Permissions {
    pub fn roles(&self, permission: Permission) -> &[String] {
        match permission {
            Permission::Admin => &self.admin,
            Permission::Moderator => &self.moderator,
            Permission::LtAdmin => &self.lt_admin,
        }
    }

    /// Whether a member holding `member_roles` (role names) has any of the `required` permissions.
    /// An empty requirement is open to everyone.
    pub fn allows(&self, required: &[Permission], member_roles: &[String]) -> bool {
        if required.is_empty() {
            return true;
        }

        required.iter().any(|permission| {
            self.roles(*permission)
                .iter()
                .any(|allowed| {
                    let allowed = allowed.trim_start_matches('@');
                    member_roles.iter().any(|role| role == allowed)
                })
        })
    }
}

#[cfg(test)]
mod test {
    use super::{Permission, Permissions};

    fn permissions() -> Permissions {
        Permissions {
            admin: vec!["Administrator".to_string()],
            moderator: vec!["Moderator".to_string()],
            lt_admin: vec!["@LT Admin".to_string()],
        }
    }

    #[test]
    fn open_commands_need_no_role() {
        assert!(permissions().allows(&[], &[]));
    }

    #[test]
    fn any_matching_set_is_enough() {
        let perms = permissions();
        let required = [Permission::Admin, Permission::Moderator, Permission::LtAdmin];

        assert!(perms.allows(&required, &["LT Admin".to_string()]));
        assert!(perms.allows(&required, &["Moderator".to_string()]));
        assert!(!perms.allows(&required, &["Member".to_string()]));
    }

    #[test]
    fn lt_admins_cannot_run_admin_commands() {
        let perms = permissions();
        let required = [Permission::Admin, Permission::Moderator];

        assert!(!perms.allows(&required, &["LT Admin".to_string()]));
    }
}
