use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role carried by a principal within its tenant.
///
/// Roles stay opaque strings so the identity provider can introduce new ones;
/// only the four built-in names below take part in rank comparisons; any
/// other name ranks as `viewer`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const VIEWER: &'static str = "viewer";
    pub const EDITOR: &'static str = "editor";
    pub const ADMIN: &'static str = "admin";
    pub const OWNER: &'static str = "owner";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Least-privileged role; assigned when a token names none.
    pub fn viewer() -> Self {
        Self(Cow::Borrowed(Self::VIEWER))
    }

    pub fn editor() -> Self {
        Self(Cow::Borrowed(Self::EDITOR))
    }

    pub fn admin() -> Self {
        Self(Cow::Borrowed(Self::ADMIN))
    }

    pub fn owner() -> Self {
        Self(Cow::Borrowed(Self::OWNER))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn rank(&self) -> u8 {
        match self.as_str() {
            Self::OWNER => 3,
            Self::ADMIN => 2,
            Self::EDITOR => 1,
            _ => 0,
        }
    }

    /// `true` if this role grants at least what `minimum` grants.
    pub fn satisfies(&self, minimum: &Role) -> bool {
        self.rank() >= minimum.rank()
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::viewer()
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_are_ordered() {
        assert!(Role::owner().satisfies(&Role::admin()));
        assert!(Role::admin().satisfies(&Role::editor()));
        assert!(Role::editor().satisfies(&Role::viewer()));
        assert!(!Role::viewer().satisfies(&Role::editor()));
    }

    #[test]
    fn unknown_roles_rank_as_viewer() {
        let role = Role::new("authenticated");
        assert_eq!(role.rank(), Role::viewer().rank());
        assert!(!role.satisfies(&Role::editor()));
    }
}
