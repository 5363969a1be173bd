//! Exact-match query filtering for collection GETs.

use crate::model::Entity;

/// Equality clauses taken from the query string, applied in order with AND
/// semantics. Keys that name no schema field (and are not `id`) are
/// ignored rather than rejected, so an unknown filter never fails a
/// request.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    clauses: Vec<(String, String)>,
}

impl ListFilter {
    pub fn new() -> Self {
        ListFilter::default()
    }

    pub fn push(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.clauses.push((field.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// True when the entity satisfies every applicable clause.
    ///
    /// A clause on a known field that the entity does not carry (an unset
    /// optional) matches nothing; `id` compares against the decimal id.
    pub fn matches(&self, entity: &Entity) -> bool {
        self.clauses.iter().all(|(field, wanted)| {
            if field == "id" {
                return entity.id.to_string() == *wanted;
            }
            match entity.kind.field(field) {
                Some(spec) => entity
                    .field(spec.name)
                    .is_some_and(|value| value.render() == *wanted),
                None => true,
            }
        })
    }
}
