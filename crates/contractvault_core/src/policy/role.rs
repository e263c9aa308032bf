//! Contract-management roles.
//!
//! Resolution is a first-match chain:
//! superuser, admin group, legal-user group, finance group, staff flag,
//! then the plain `USER` fallback.

const LEGAL_ADMIN_GROUPS: &[&str] = &["Legal Admin", "legal_admin"];
const LEGAL_USER_GROUPS: &[&str] = &["Legal User", "legal_user"];
const FINANCE_VIEWER_GROUPS: &[&str] = &["Finance Viewer", "finance_viewer"];

db_enum! {
    /// Role of a principal inside the contract module.
    pub enum Role {
        LegalAdmin => "LEGAL_ADMIN",
        LegalUser => "LEGAL_USER",
        FinanceViewer => "FINANCE_VIEWER",
        User => "USER",
    }
}

impl Role {
    pub fn is_legal_admin(self) -> bool {
        self == Self::LegalAdmin
    }

    /// LEGAL_USER or higher.
    pub fn is_legal_user(self) -> bool {
        matches!(self, Self::LegalAdmin | Self::LegalUser)
    }

    pub fn is_finance_viewer(self) -> bool {
        self == Self::FinanceViewer
    }
}

/// Resolves the role for the given principal attributes.
///
/// Group names match exactly; stored memberships are already trimmed.
pub fn resolve_role<S: AsRef<str>>(is_superuser: bool, is_staff: bool, groups: &[S]) -> Role {
    let in_any = |names: &[&str]| groups.iter().any(|group| names.contains(&group.as_ref()));

    if is_superuser || in_any(LEGAL_ADMIN_GROUPS) {
        Role::LegalAdmin
    } else if in_any(LEGAL_USER_GROUPS) {
        Role::LegalUser
    } else if in_any(FINANCE_VIEWER_GROUPS) {
        Role::FinanceViewer
    } else if is_staff {
        Role::LegalUser
    } else {
        Role::User
    }
}
