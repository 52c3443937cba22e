// Permission catalog and default role definitions
// Seeded into the database when the first user registers

/// A permission definition: (name, display name, category, description)
pub type PermissionDef = (&'static str, &'static str, &'static str, &'static str);

/// The full permission catalog. Names are stable identifiers used by route
/// guards; categories group them for the admin UI.
pub const DEFAULT_PERMISSIONS: &[PermissionDef] = &[
    // User management
    ("users.view", "View users", "users", "View the user list and user details"),
    ("users.create", "Create users", "users", "Add new users"),
    ("users.edit", "Edit users", "users", "Edit user details"),
    ("users.delete", "Delete users", "users", "Delete users"),
    ("users.restore", "Restore users", "users", "Restore soft-deleted users"),
    // Link management
    ("urls.view_all", "View all links", "urls", "View every shortened link"),
    ("urls.view_own", "View own links", "urls", "View only the user's own links"),
    ("urls.create", "Create links", "urls", "Create new shortened links"),
    ("urls.edit_all", "Edit all links", "urls", "Edit every shortened link"),
    ("urls.edit_own", "Edit own links", "urls", "Edit only the user's own links"),
    ("urls.delete_all", "Delete all links", "urls", "Delete every shortened link"),
    ("urls.delete_own", "Delete own links", "urls", "Delete only the user's own links"),
    // Role management
    ("roles.view", "View roles", "roles", "View roles and permissions"),
    ("roles.create", "Create roles", "roles", "Add new roles"),
    ("roles.edit", "Edit roles", "roles", "Edit roles and their permissions"),
    ("roles.delete", "Delete roles", "roles", "Delete roles"),
    ("roles.restore", "Restore roles", "roles", "Restore soft-deleted roles"),
    // Reports and analytics
    ("reports.view_all", "View all reports", "reports", "View reports for every user"),
    ("reports.view_own", "View own reports", "reports", "View the user's own reports"),
    ("reports.export", "Export reports", "reports", "Export reports and statistics"),
    // Security and audit
    ("security.view", "View security status", "security", "View security status and blocked IPs"),
    ("security.manage", "Manage security", "security", "Block IPs and change security settings"),
    ("audit.view", "View audit logs", "security", "View audit logs and statistics"),
    ("audit.manage", "Manage audit logs", "security", "Clean up old audit logs"),
    // System
    ("system.settings", "System settings", "system", "Access global system settings"),
    ("system.logs", "System logs", "system", "View system logs and activity"),
];

/// A role definition: (name, display name, description, permission names)
pub type RoleDef = (&'static str, &'static str, &'static str, &'static [&'static str]);

/// Default roles created at bootstrap. All are system roles.
pub const DEFAULT_ROLES: &[RoleDef] = &[
    (
        "super_admin",
        "Super administrator",
        "Full access to every permission",
        // Empty slice means "all permissions"
        &[],
    ),
    (
        "admin",
        "Administrator",
        "Administrative access without role or security management",
        &[
            "users.view",
            "users.create",
            "users.edit",
            "urls.view_all",
            "urls.create",
            "urls.edit_all",
            "urls.delete_all",
            "reports.view_all",
            "reports.export",
            "system.logs",
        ],
    ),
    (
        "employee",
        "Employee",
        "Regular employee limited to their own links and reports",
        &[
            "urls.view_own",
            "urls.create",
            "urls.edit_own",
            "urls.delete_own",
            "reports.view_own",
        ],
    ),
    (
        "viewer",
        "Viewer",
        "Read-only access to own links and reports",
        &["urls.view_own", "reports.view_own"],
    ),
];

/// The role assigned to newly registered users (after the first admin)
pub const DEFAULT_NEW_USER_ROLE: &str = "employee";

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_permission_names_unique() {
        let mut seen = HashSet::new();
        for (name, _, _, _) in DEFAULT_PERMISSIONS {
            assert!(seen.insert(*name), "duplicate permission: {}", name);
        }
    }

    #[test]
    fn test_role_permissions_exist_in_catalog() {
        let catalog: HashSet<&str> = DEFAULT_PERMISSIONS.iter().map(|(n, _, _, _)| *n).collect();
        for (role, _, _, perms) in DEFAULT_ROLES {
            for perm in *perms {
                assert!(
                    catalog.contains(perm),
                    "role {} references unknown permission {}",
                    role,
                    perm
                );
            }
        }
    }

    #[test]
    fn test_default_new_user_role_defined() {
        assert!(DEFAULT_ROLES
            .iter()
            .any(|(name, _, _, _)| *name == DEFAULT_NEW_USER_ROLE));
    }
}
