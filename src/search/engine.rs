//! Multi-criteria search over attribute rows

use crate::config::SearchConfig;
use crate::error::Result;
use crate::models::{fold_case, AttributeRow, OwnerIdentity, OwnerMatch};
use crate::search::{
    ConstraintGroup, CriterionEvaluator, CriterionMatch, Page, PageRequest, SortField, SortSpec,
};
use crate::state::{AttributeStore, RowScope};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Owner that survived intersection, with the rows that justified it
#[derive(Debug, Clone)]
struct Candidate {
    owner: OwnerIdentity,
    rows: Vec<AttributeRow>,
    first_seq: u64,
    first_key: String,
}

impl Candidate {
    fn new(owner: OwnerIdentity, rows: Vec<AttributeRow>) -> Self {
        let first_seq = rows.iter().map(|row| row.seq).min().unwrap_or(u64::MAX);
        let first_key = rows
            .first()
            .map(|row| fold_case(&row.key_name))
            .unwrap_or_default();

        Self {
            owner,
            rows,
            first_seq,
            first_key,
        }
    }

    fn into_match(self, project_rows: bool) -> OwnerMatch {
        if project_rows {
            OwnerMatch::new(&self.owner, &self.rows)
        } else {
            OwnerMatch::new(&self.owner, &[])
        }
    }
}

/// Evaluates constraint groups and reduces them to a sorted, paged owner list
#[derive(Clone)]
pub struct SearchEngine {
    evaluator: CriterionEvaluator,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn AttributeStore>, config: SearchConfig) -> Self {
        Self {
            evaluator: CriterionEvaluator::new(store),
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Owners in `scope` satisfying every group. No groups yields an empty page.
    pub async fn search(
        &self,
        scope: &RowScope,
        groups: &[ConstraintGroup],
        request: &PageRequest,
    ) -> Result<Page<OwnerMatch>> {
        let start = Instant::now();

        if groups.is_empty() {
            tracing::debug!(tenant_id = %scope.tenant_id, "Search without constraint groups returns nothing");
            return Ok(Page::empty());
        }

        let matches = self.evaluate_all(scope, groups).await?;
        let owners = intersect(&matches);

        let candidates = owners
            .into_iter()
            .map(|owner| {
                let rows = justifying_rows(&owner, &matches);
                Candidate::new(owner, rows)
            })
            .collect();

        let page = self.paginate(candidates, request, true);

        tracing::debug!(
            tenant_id = %scope.tenant_id,
            owner_type = ?scope.owner_type,
            groups = groups.len(),
            total = page.page.total_elements,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Search completed"
        );

        Ok(page)
    }

    /// Number of owners `search` would return across all pages
    pub async fn count(&self, scope: &RowScope, groups: &[ConstraintGroup]) -> Result<u64> {
        if groups.is_empty() {
            return Ok(0);
        }

        let matches = self.evaluate_all(scope, groups).await?;
        Ok(intersect(&matches).len() as u64)
    }

    /// Owners anywhere in the tenant holding every key with exactly the given value.
    ///
    /// An empty map applies no filter and returns every owner of the tenant,
    /// each without projected attributes.
    pub async fn find_owners_by_attribute_map(
        &self,
        tenant_id: Uuid,
        attributes: &BTreeMap<String, Value>,
        request: &PageRequest,
    ) -> Result<Page<OwnerMatch>> {
        let scope = RowScope::tenant(tenant_id);

        if attributes.is_empty() {
            let everyone = self.evaluator.owners_in_scope(&scope).await?;
            let candidates = everyone
                .owners()
                .map(|owner| {
                    let rows = everyone.justifying_row(owner).cloned().into_iter().collect();
                    Candidate::new(owner.clone(), rows)
                })
                .collect();
            return Ok(self.paginate(candidates, request, false));
        }

        let groups: Vec<ConstraintGroup> = attributes
            .iter()
            .map(|(key, value)| ConstraintGroup::from_entry(key, value))
            .collect();

        self.search(&scope, &groups, request).await
    }

    /// Evaluate groups in order, stopping at the first one nothing satisfies
    async fn evaluate_all(
        &self,
        scope: &RowScope,
        groups: &[ConstraintGroup],
    ) -> Result<Vec<CriterionMatch>> {
        let mut matches = Vec::with_capacity(groups.len());

        for group in groups {
            let matched = self.evaluator.evaluate(scope, group).await?;
            if matched.is_empty() {
                return Ok(Vec::new());
            }
            matches.push(matched);
        }

        Ok(matches)
    }

    fn paginate(
        &self,
        mut candidates: Vec<Candidate>,
        request: &PageRequest,
        project_rows: bool,
    ) -> Page<OwnerMatch> {
        let request = request.clamped(self.config.max_page_size);
        sort_candidates(&mut candidates, request.sort);

        Page::slice(candidates, request.page, request.size)
            .map(|candidate| candidate.into_match(project_rows))
    }
}

/// Owners present in every match set
fn intersect(matches: &[CriterionMatch]) -> Vec<OwnerIdentity> {
    let Some(smallest) = matches.iter().min_by_key(|matched| matched.len()) else {
        return Vec::new();
    };

    smallest
        .owners()
        .filter(|owner| matches.iter().all(|matched| matched.contains(owner)))
        .cloned()
        .collect()
}

/// One justifying row per group, in group order, without repeating a row
fn justifying_rows(owner: &OwnerIdentity, matches: &[CriterionMatch]) -> Vec<AttributeRow> {
    let mut seen = HashSet::new();

    matches
        .iter()
        .filter_map(|matched| matched.justifying_row(owner))
        .filter(|row| seen.insert(row.seq))
        .cloned()
        .collect()
}

fn sort_candidates(candidates: &mut [Candidate], sort: Option<SortSpec>) {
    candidates.sort_by(|a, b| {
        let primary = match sort {
            None => a.first_seq.cmp(&b.first_seq),
            Some(spec) => {
                let ordering = match spec.field {
                    SortField::OwnerType => a.owner.normalized_type().cmp(&b.owner.normalized_type()),
                    SortField::OwnerId => a.owner.owner_id.cmp(&b.owner.owner_id),
                    SortField::KeyName => a.first_key.cmp(&b.first_key),
                };
                spec.order.apply(ordering)
            }
        };

        match primary {
            Ordering::Equal => a.owner.cmp(&b.owner),
            other => other,
        }
    });
}
