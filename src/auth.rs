//! Roles, mutation rights and password hashes.
//!
//! Reading published articles and searching never needs a role. Every
//! mutation of a partition goes through [`can_mutate`] first.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    partition::{Partition, Region},
};

/// Name of the role allowed to edit every partition.
pub const EDITOR_ROLE: &str = "editor";

/// What an authenticated admin is allowed to edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    /// May edit the homepage and every region.
    Editor,
    /// May edit only its own region.
    Regional(Region),
}

impl Role {
    /// Page an admin lands on after logging in.
    pub fn admin_page(self) -> String {
        match self {
            Role::Editor => "/admin.html".to_string(),
            Role::Regional(region) => format!("/{region}/admin.html"),
        }
    }

    /// Page an admin is sent to after logging out.
    pub fn home_page(self) -> String {
        match self {
            Role::Editor => "/".to_string(),
            Role::Regional(region) => format!("/{region}/"),
        }
    }
}

/// Whether `role` may create, update or delete records in `partition`.
pub fn can_mutate(role: Role, partition: Partition) -> bool {
    match role {
        Role::Editor => true,
        Role::Regional(region) => partition == Partition::Region(region),
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Editor => f.write_str(EDITOR_ROLE),
            Role::Regional(region) => f.write_str(region.key()),
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == EDITOR_ROLE {
            return Ok(Role::Editor);
        }
        s.parse::<Region>()
            .map(Role::Regional)
            .map_err(|_| Error::InvalidRole(s.to_string()))
    }
}

impl TryFrom<String> for Role {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.to_string()
    }
}

/// bcrypt work factor. Tests use the minimum so fixtures stay fast.
#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4; // bcrypt minimum cost (`bcrypt::MIN_COST` is private)

/// Hash a password with bcrypt. The result carries its own salt and cost,
/// so hashes written by other bcrypt implementations verify too.
pub fn hash_password(password: &str) -> Result<String, Error> {
    Ok(bcrypt::hash(password, HASH_COST)?)
}

/// Check a password against a bcrypt hash. A malformed hash never matches.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match bcrypt::verify(password, stored) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is not valid bcrypt");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editor_can_mutate_everything() {
        for partition in Partition::all() {
            assert!(can_mutate(Role::Editor, partition));
        }
    }

    #[test]
    fn regional_role_is_scoped_to_its_region() {
        let role = Role::Regional(Region::Europe);

        assert!(can_mutate(role, Partition::Region(Region::Europe)));
        assert!(!can_mutate(role, Partition::Region(Region::Asia)));
        assert!(!can_mutate(role, Partition::Homepage));
    }

    #[test]
    fn global_region_role_does_not_grant_homepage() {
        let role = Role::Regional(Region::Global);
        assert!(!can_mutate(role, Partition::Homepage));
        assert!(can_mutate(role, Partition::Region(Region::Global)));
    }

    #[test]
    fn roles_parse_from_names() {
        assert_eq!("editor".parse::<Role>().unwrap(), Role::Editor);
        assert_eq!(
            "south-america".parse::<Role>().unwrap(),
            Role::Regional(Region::SouthAmerica)
        );
        assert!(matches!(
            "admin".parse::<Role>(),
            Err(Error::InvalidRole(name)) if name == "admin"
        ));
    }

    #[test]
    fn role_serializes_as_plain_string() {
        let json = serde_json::to_string(&Role::Regional(Region::India)).unwrap();
        assert_eq!(json, "\"india\"");
        let role: Role = serde_json::from_str("\"editor\"").unwrap();
        assert_eq!(role, Role::Editor);
    }

    #[test]
    fn landing_pages() {
        assert_eq!(Role::Editor.admin_page(), "/admin.html");
        assert_eq!(
            Role::Regional(Region::NorthAmerica).admin_page(),
            "/north-america/admin.html"
        );
        assert_eq!(Role::Editor.home_page(), "/");
        assert_eq!(Role::Regional(Region::Asia).home_page(), "/asia/");
    }

    #[test]
    fn password_hash_verifies() {
        let stored = hash_password("hunter2").unwrap();

        assert!(stored.starts_with("$2"));
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
        assert!(!verify_password("hunter2", "not-a-hash"));
    }

    #[test]
    fn password_hashes_are_salted() {
        assert_ne!(
            hash_password("same").unwrap(),
            hash_password("same").unwrap()
        );
    }

    #[test]
    fn hashes_from_other_bcrypt_versions_verify() {
        // Written with the `$2a$` prefix, as Node's bcrypt does.
        let stored = bcrypt::hash_with_result("legacy", 4)
            .unwrap()
            .format_for_version(bcrypt::Version::TwoA);

        assert!(stored.starts_with("$2a$04$"));
        assert!(verify_password("legacy", &stored));
    }
}
