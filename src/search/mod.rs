//! Attribute search
//!
//! Constraint groups are evaluated one at a time against the store, each
//! yielding the set of owners with at least one satisfying row; the engine
//! intersects those sets, then sorts and pages the surviving owners.

pub mod criteria;
pub mod engine;
pub mod evaluator;
pub mod page;
pub mod query;

pub use criteria::{Clause, ConstraintGroup, RowPredicate};
pub use engine::SearchEngine;
pub use evaluator::{CriterionEvaluator, CriterionMatch};
pub use page::{Page, PageInfo};
pub use query::{PageRequest, SortField, SortOrder, SortSpec};
