use super::{fold_case, names_match, urn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Identity of the entity metadata is attached to.
///
/// Two identities are equal when tenant and owner id match and the owner
/// types match case-insensitively. The same owner id under two different
/// owner types is two distinct owners.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerIdentity {
    pub tenant_id: Uuid,
    pub owner_type: String,
    pub owner_id: Uuid,
}

impl OwnerIdentity {
    pub fn new(tenant_id: Uuid, owner_type: impl Into<String>, owner_id: Uuid) -> Self {
        Self {
            tenant_id,
            owner_type: owner_type.into(),
            owner_id,
        }
    }

    /// Owner type folded for comparison and storage keys
    pub fn normalized_type(&self) -> String {
        fold_case(&self.owner_type)
    }

    /// URN form of the owner id, as handed back to callers
    pub fn owner_urn(&self) -> String {
        urn::owner_urn(&self.owner_id)
    }
}

impl PartialEq for OwnerIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.tenant_id == other.tenant_id
            && self.owner_id == other.owner_id
            && names_match(&self.owner_type, &other.owner_type)
    }
}

impl Eq for OwnerIdentity {}

impl Hash for OwnerIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tenant_id.hash(state);
        self.normalized_type().hash(state);
        self.owner_id.hash(state);
    }
}

impl Ord for OwnerIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tenant_id
            .cmp(&other.tenant_id)
            .then_with(|| self.normalized_type().cmp(&other.normalized_type()))
            .then_with(|| self.owner_id.cmp(&other.owner_id))
    }
}

impl PartialOrd for OwnerIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for OwnerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.tenant_id, self.owner_type, self.owner_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_owner_type_compares_case_insensitively() {
        let tenant = Uuid::new_v4();
        let id = Uuid::new_v4();

        let a = OwnerIdentity::new(tenant, "Thing", id);
        let b = OwnerIdentity::new(tenant, "thing", id);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_same_id_different_type_is_distinct() {
        let tenant = Uuid::new_v4();
        let id = Uuid::new_v4();

        let a = OwnerIdentity::new(tenant, "ownerA", id);
        let b = OwnerIdentity::new(tenant, "ownerB", id);
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn test_owner_urn_rendering() {
        let id = Uuid::parse_str("8614fac9-693d-4bee-886f-f9eefd60180a").unwrap();
        let owner = OwnerIdentity::new(Uuid::new_v4(), "Thing", id);
        assert_eq!(owner.owner_urn(), "urn:thing:uuid:8614fac9-693d-4bee-886f-f9eefd60180a");
    }
}
