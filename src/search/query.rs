//! Sorting and paging parameters for owner searches

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use strum::{Display, EnumString};

/// Sort order for search results
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, EnumString, Display,
)]
#[strum(ascii_case_insensitive)]
pub enum SortOrder {
    #[default]
    #[strum(to_string = "asc", serialize = "ascending")]
    Ascending,
    #[strum(to_string = "desc", serialize = "descending")]
    Descending,
}

impl SortOrder {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

/// Field of a projected owner record to sort by
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum SortField {
    #[strum(to_string = "ownerType", serialize = "owner_type", serialize = "type")]
    OwnerType,
    #[strum(
        to_string = "ownerId",
        serialize = "owner_id",
        serialize = "ownerUrn",
        serialize = "owner_urn"
    )]
    OwnerId,
    /// Key name of the first attribute that justified the match
    #[strum(to_string = "keyName", serialize = "key_name", serialize = "key")]
    KeyName,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

/// 1-based page request with optional sorting; no sort means storage order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
    pub sort: Option<SortSpec>,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            sort: None,
        }
    }

    pub fn sorted_by(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort = Some(SortSpec { field, order });
        self
    }

    /// Bound the page size by the configured maximum
    pub fn clamped(mut self, max_page_size: u32) -> Self {
        self.size = self.size.min(max_page_size);
        self
    }
}
