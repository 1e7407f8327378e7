//! Tenant and owner references in URN form (`urn:<kind>:uuid:<uuid>`).

use crate::error::{AppError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

static URN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^urn:([A-Za-z][A-Za-z0-9_-]*):uuid:([0-9A-Fa-f-]{32,36})$")
        .expect("URN pattern is a valid regex")
});

const TENANT_KINDS: [&str; 2] = ["tenant", "account"];

fn parse(urn: &str) -> Result<(String, Uuid)> {
    let captures = URN_PATTERN
        .captures(urn.trim())
        .ok_or_else(|| AppError::InvalidIdentifier(format!("malformed URN '{}'", urn)))?;

    let kind = captures[1].to_lowercase();
    let id = Uuid::parse_str(&captures[2])
        .map_err(|e| AppError::InvalidIdentifier(format!("URN '{}': {}", urn, e)))?;

    Ok((kind, id))
}

/// Extract the tenant id from `urn:tenant:uuid:<uuid>` (or the legacy `account` kind)
pub fn parse_tenant_urn(urn: &str) -> Result<Uuid> {
    let (kind, id) = parse(urn)?;
    if TENANT_KINDS.contains(&kind.as_str()) {
        Ok(id)
    } else {
        Err(AppError::InvalidIdentifier(format!(
            "URN '{}' does not reference a tenant",
            urn
        )))
    }
}

/// Extract the owner id from any `urn:<kind>:uuid:<uuid>`
pub fn parse_owner_urn(urn: &str) -> Result<Uuid> {
    parse(urn).map(|(_, id)| id)
}

pub fn tenant_urn(id: &Uuid) -> String {
    format!("urn:tenant:uuid:{}", id)
}

pub fn owner_urn(id: &Uuid) -> String {
    format!("urn:thing:uuid:{}", id)
}
