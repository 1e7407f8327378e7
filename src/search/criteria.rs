//! Constraint groups and the row predicate they compile to

use crate::codec;
use crate::error::AppError;
use crate::models::{names_match, AttributeRow, DataType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// One unit of search input.
///
/// Every field that is set must hold on the same row. A group with no
/// fields set matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintGroup {
    pub key: Option<String>,
    pub data_type: Option<DataType>,
    pub raw_value: Option<String>,
}

impl ConstraintGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn with_raw_value(mut self, raw_value: impl Into<String>) -> Self {
        self.raw_value = Some(raw_value.into());
        self
    }

    /// Group for one entry of a key/value map, the value encoded as the codec would store it
    pub fn from_entry(key: &str, value: &Value) -> Self {
        let group = Self::new().with_key(key);
        match codec::encode(value) {
            Some(raw) => group.with_raw_value(raw),
            // null is stored without a raw value, so narrow on its type tag instead
            None => group.with_data_type(DataType::Null),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.key.is_none() && self.data_type.is_none() && self.raw_value.is_none()
    }

    /// Compile into a row-level predicate (AND of the set fields)
    pub fn to_predicate(&self) -> RowPredicate {
        let mut predicate = RowPredicate::any();

        if let Some(key) = &self.key {
            predicate = predicate.and(Clause::KeyName(key.clone()));
        }
        if let Some(data_type) = self.data_type {
            predicate = predicate.and(Clause::DataType(data_type));
        }
        if let Some(raw_value) = &self.raw_value {
            predicate = predicate.and(Clause::RawValue(raw_value.clone()));
        }

        predicate
    }
}

/// Parses `key=K,type=T,value=V` (any subset, in any order)
impl FromStr for ConstraintGroup {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut group = ConstraintGroup::new();

        for part in s.split(',').filter(|p| !p.trim().is_empty()) {
            let (field, value) = part.split_once('=').ok_or_else(|| {
                AppError::Validation(format!("expected field=value, got '{}'", part))
            })?;

            match field.trim().to_lowercase().as_str() {
                "key" => group.key = Some(value.to_string()),
                "type" | "datatype" => {
                    let data_type = DataType::from_str(value.trim()).map_err(|_| {
                        AppError::Validation(format!("unknown data type '{}'", value))
                    })?;
                    group.data_type = Some(data_type);
                }
                "value" => group.raw_value = Some(value.to_string()),
                other => {
                    return Err(AppError::Validation(format!(
                        "unknown constraint field '{}'",
                        other
                    )))
                }
            }
        }

        Ok(group)
    }
}

/// A single equality clause against one row field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// Case-insensitive key name equality
    KeyName(String),
    /// Data type tag equality
    DataType(DataType),
    /// Exact equality of the stored raw encoding
    RawValue(String),
}

impl Clause {
    pub fn matches(&self, row: &AttributeRow) -> bool {
        match self {
            Clause::KeyName(key) => names_match(&row.key_name, key),
            Clause::DataType(data_type) => row.data_type == *data_type,
            Clause::RawValue(raw) => row.raw_value.as_deref() == Some(raw.as_str()),
        }
    }
}

/// Conjunction of equality clauses; the empty conjunction accepts every row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowPredicate {
    clauses: Vec<Clause>,
}

impl RowPredicate {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn and(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn matches(&self, row: &AttributeRow) -> bool {
        self.clauses.iter().all(|clause| clause.matches(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OwnerIdentity;
    use serde_json::json;
    use uuid::Uuid;

    fn row(key: &str, data_type: DataType, raw: Option<&str>) -> AttributeRow {
        let owner = OwnerIdentity::new(Uuid::new_v4(), "Thing", Uuid::new_v4());
        AttributeRow::new(&owner, key, data_type, raw.map(str::to_string))
    }

    #[test]
    fn test_key_and_type_must_hold_on_same_row() {
        let predicate = ConstraintGroup::new()
            .with_key("color")
            .with_data_type(DataType::String)
            .to_predicate();

        assert!(predicate.matches(&row("Color", DataType::String, Some("red"))));
        assert!(!predicate.matches(&row("color", DataType::Integer, Some("1"))));
        assert!(!predicate.matches(&row("size", DataType::String, Some("red"))));
    }

    #[test]
    fn test_raw_value_narrows_and_is_case_sensitive() {
        let group = ConstraintGroup::new().with_key("color");
        let narrowed = group.clone().with_raw_value("red");

        let red = row("color", DataType::String, Some("red"));
        let upper = row("color", DataType::String, Some("RED"));

        assert!(group.to_predicate().matches(&red));
        assert!(group.to_predicate().matches(&upper));
        assert!(narrowed.to_predicate().matches(&red));
        assert!(!narrowed.to_predicate().matches(&upper));
    }

    #[test]
    fn test_empty_group_is_degenerate() {
        assert!(ConstraintGroup::new().is_degenerate());
        assert_eq!(ConstraintGroup::new().to_predicate(), RowPredicate::any());
        assert!(!ConstraintGroup::new().with_key("k").is_degenerate());
    }

    #[test]
    fn test_from_entry_encodes_like_the_codec() {
        assert_eq!(
            ConstraintGroup::from_entry("fbK", &json!(12)),
            ConstraintGroup::new().with_key("fbK").with_raw_value("12")
        );
        assert_eq!(
            ConstraintGroup::from_entry("gone", &Value::Null),
            ConstraintGroup::new().with_key("gone").with_data_type(DataType::Null)
        );
    }

    #[test]
    fn test_parse_group() {
        let group: ConstraintGroup = "key=color,type=string,value=a=b".parse().unwrap();
        assert_eq!(group.key.as_deref(), Some("color"));
        assert_eq!(group.data_type, Some(DataType::String));
        assert_eq!(group.raw_value.as_deref(), Some("a=b"));

        assert!("key".parse::<ConstraintGroup>().is_err());
        assert!("type=decimal".parse::<ConstraintGroup>().is_err());
        assert!("owner=x".parse::<ConstraintGroup>().is_err());
    }
}
