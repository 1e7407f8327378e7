//! Criterion evaluation: one constraint group against one scope

use crate::error::Result;
use crate::models::{AttributeRow, OwnerIdentity};
use crate::search::{ConstraintGroup, RowPredicate};
use crate::state::{AttributeStore, RowScope};
use std::collections::HashMap;
use std::sync::Arc;

/// Owners satisfying one constraint group.
///
/// Each owner maps to the row that justified its membership; when several
/// rows of the same owner qualify, the one written first is kept.
#[derive(Debug, Clone, Default)]
pub struct CriterionMatch {
    rows: HashMap<OwnerIdentity, AttributeRow>,
}

impl CriterionMatch {
    pub fn from_rows(rows: Vec<AttributeRow>) -> Self {
        let mut by_owner: HashMap<OwnerIdentity, AttributeRow> = HashMap::new();

        for row in rows {
            let owner = row.owner();
            let earlier = by_owner
                .get(&owner)
                .map_or(true, |current| row.seq < current.seq);
            if earlier {
                by_owner.insert(owner, row);
            }
        }

        Self { rows: by_owner }
    }

    pub fn contains(&self, owner: &OwnerIdentity) -> bool {
        self.rows.contains_key(owner)
    }

    pub fn justifying_row(&self, owner: &OwnerIdentity) -> Option<&AttributeRow> {
        self.rows.get(owner)
    }

    pub fn owners(&self) -> impl Iterator<Item = &OwnerIdentity> {
        self.rows.keys()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Translates constraint groups into store scans
#[derive(Clone)]
pub struct CriterionEvaluator {
    store: Arc<dyn AttributeStore>,
}

impl CriterionEvaluator {
    pub fn new(store: Arc<dyn AttributeStore>) -> Self {
        Self { store }
    }

    /// Owners in `scope` with at least one row satisfying every field of `group`
    pub async fn evaluate(&self, scope: &RowScope, group: &ConstraintGroup) -> Result<CriterionMatch> {
        if group.is_degenerate() {
            tracing::debug!(tenant_id = %scope.tenant_id, "Degenerate constraint group matches nothing");
            return Ok(CriterionMatch::default());
        }

        let rows = self.store.find_rows(scope, &group.to_predicate()).await?;
        let matched = CriterionMatch::from_rows(rows);

        tracing::debug!(
            tenant_id = %scope.tenant_id,
            owner_type = ?scope.owner_type,
            key = ?group.key,
            data_type = ?group.data_type,
            owners = matched.len(),
            "Constraint group evaluated"
        );

        Ok(matched)
    }

    /// Every owner with at least one row in `scope`
    pub async fn owners_in_scope(&self, scope: &RowScope) -> Result<CriterionMatch> {
        let rows = self.store.find_rows(scope, &RowPredicate::any()).await?;
        Ok(CriterionMatch::from_rows(rows))
    }
}
