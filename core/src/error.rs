use thiserror::Error;

use crate::model::EntityKind;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error taxonomy for the entity store and association index.
///
/// Every failure a request can trigger maps onto one of these variants,
/// and each variant maps onto exactly one HTTP status code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Entity, parent or link does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input failed a schema or type check
    #[error("Validation error: {0}")]
    Validation(String),

    /// No relation table connects the two kinds; a routing bug, not user input
    #[error("No relationship defined between {0} and {1}")]
    UnsupportedRelation(EntityKind, EntityKind),

    /// Internal system error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Missing entity by kind and id.
    pub fn no_such_entity(kind: EntityKind, id: u64) -> Self {
        StoreError::NotFound(format!("{} with id {id} does not exist", kind.singular()))
    }

    /// Missing link between two entities.
    pub fn no_such_link(kind: EntityKind, id: u64, other: EntityKind, other_id: u64) -> Self {
        StoreError::NotFound(format!(
            "no link between {} {id} and {} {other_id}",
            kind.singular(),
            other.singular()
        ))
    }

    /// Referenced id is syntactically an id but can never exist (negative).
    pub fn unresolvable_id(raw: &str) -> Self {
        StoreError::NotFound(format!("no entity with id {raw}"))
    }

    /// Required field absent or blank.
    pub fn mandatory_field(field: &str) -> Self {
        StoreError::Validation(format!("{field} : field is mandatory"))
    }

    /// Field present with the wrong wire type.
    pub fn wrong_type(field: &str, expected: &str) -> Self {
        StoreError::Validation(format!("Failed Validation: {field} should be {expected}"))
    }

    /// Payload named a field the schema does not define.
    pub fn unknown_field(field: &str) -> Self {
        StoreError::Validation(format!("Could not find field: {field}"))
    }

    /// Client supplied an id in a create body.
    pub fn client_supplied_id() -> Self {
        StoreError::Validation("Invalid Creation: Failed Validation: Not allowed to create with id".into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Validation(_))
    }

    /// HTTP status code equivalent for API responses.
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::NotFound(_) => 404,
            StoreError::Validation(_) => 400,
            // an unroutable relation surfaces as a missing resource
            StoreError::UnsupportedRelation(_, _) => 404,
            StoreError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(StoreError::no_such_entity(EntityKind::Todo, 7).status_code(), 404);
        assert_eq!(StoreError::mandatory_field("title").status_code(), 400);
        assert_eq!(StoreError::client_supplied_id().status_code(), 400);
        assert_eq!(
            StoreError::UnsupportedRelation(EntityKind::Project, EntityKind::Todo).status_code(),
            404
        );
        assert_eq!(StoreError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn predicates() {
        assert!(StoreError::no_such_entity(EntityKind::Category, 1).is_not_found());
        assert!(!StoreError::mandatory_field("title").is_not_found());
        assert!(StoreError::wrong_type("doneStatus", "BOOLEAN").is_validation());
    }

    #[test]
    fn messages_name_the_offender() {
        let err = StoreError::no_such_entity(EntityKind::Category, 42);
        assert_eq!(format!("{err}"), "Not found: category with id 42 does not exist");

        let err = StoreError::unknown_field("priority");
        assert!(format!("{err}").contains("priority"));

        let err = StoreError::no_such_link(EntityKind::Project, 1, EntityKind::Category, 3);
        assert!(format!("{err}").contains("project 1"));
        assert!(format!("{err}").contains("category 3"));
    }
}
