pub mod attribute;
pub mod owner;
pub mod response;
pub mod urn;

pub use attribute::*;
pub use owner::*;
pub use response::*;

/// Folds a key name or owner type for case-insensitive comparison
pub fn fold_case(value: &str) -> String {
    value.to_lowercase()
}

/// Case-insensitive equality used for key names and owner types
pub fn names_match(left: &str, right: &str) -> bool {
    left == right || fold_case(left) == fold_case(right)
}
