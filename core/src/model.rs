use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The four entity kinds managed by the service.
///
/// Categories, projects and todos carry a required `title`; tasks are
/// minimal records that exist mostly to be linked to projects and todos.
/// Every kind lives in its own arena inside the store and has its own
/// id counter.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntityKind {
    /// Grouping label attachable to projects and todos
    Category,
    /// Unit of planning, owns tasks
    Project,
    /// Item on the todo list
    Todo,
    /// Minimal work record referenced by projects and todos
    Task,
}

impl EntityKind {
    /// All kinds, in routing order.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Category,
        EntityKind::Project,
        EntityKind::Todo,
        EntityKind::Task,
    ];

    /// Collection segment as it appears in URLs (`/todos`, `/categories`).
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Category => "categories",
            EntityKind::Project => "projects",
            EntityKind::Todo => "todos",
            EntityKind::Task => "tasks",
        }
    }

    /// Singular noun, used in XML elements and error messages.
    pub fn singular(&self) -> &'static str {
        match self {
            EntityKind::Category => "category",
            EntityKind::Project => "project",
            EntityKind::Todo => "todo",
            EntityKind::Task => "task",
        }
    }

    /// Resolve a URL collection segment to a kind.
    pub fn from_collection(segment: &str) -> Option<EntityKind> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.collection() == segment)
    }

    /// Field schema for this kind, in serialization order.
    pub fn schema(&self) -> &'static [FieldSpec] {
        match self {
            EntityKind::Category => CATEGORY_FIELDS,
            EntityKind::Project => PROJECT_FIELDS,
            EntityKind::Todo => TODO_FIELDS,
            EntityKind::Task => TASK_FIELDS,
        }
    }

    /// Look up a single field spec by its wire name.
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.schema().iter().find(|spec| spec.name == name)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.singular())
    }
}

/// Wire-level type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free-form string
    Text,
    /// Strict boolean; quoted strings are rejected in JSON bodies
    Flag,
}

/// Declarative description of one field of an entity kind.
///
/// The validation pipeline is driven entirely by these specs; there is no
/// per-kind struct with typed fields.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Name as it appears in request and response bodies
    pub name: &'static str,
    pub kind: FieldKind,
    /// Required on create and on full replace
    pub required: bool,
    /// Default applied when a flag is absent on create/replace
    pub default: Option<bool>,
}

impl FieldSpec {
    const fn text(name: &'static str, required: bool) -> Self {
        FieldSpec {
            name,
            kind: FieldKind::Text,
            required,
            default: None,
        }
    }

    const fn flag(name: &'static str, default: bool) -> Self {
        FieldSpec {
            name,
            kind: FieldKind::Flag,
            required: false,
            default: Some(default),
        }
    }
}

const CATEGORY_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("title", true),
    FieldSpec::text("description", false),
];

const PROJECT_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("title", true),
    FieldSpec::text("description", false),
    FieldSpec::flag("completed", false),
    FieldSpec::flag("active", true),
];

const TODO_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("title", true),
    FieldSpec::text("description", false),
    FieldSpec::flag("doneStatus", false),
];

const TASK_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("title", false),
    FieldSpec::text("description", false),
];

/// A validated, stored field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
}

impl FieldValue {
    /// Query-string representation, used for exact-match filtering.
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Flag(b) => b.to_string(),
        }
    }
}

/// A stored entity: server-assigned id plus schema-validated fields.
///
/// Field keys are the `&'static str` names out of the kind's schema, so a
/// map never holds a name the schema does not know.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: u64,
    pub kind: EntityKind,
    pub fields: BTreeMap<&'static str, FieldValue>,
}

impl Entity {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Fields in schema order rather than map order, for serialization.
    pub fn ordered_fields(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.kind
            .schema()
            .iter()
            .filter_map(|spec| self.fields.get(spec.name).map(|v| (spec.name, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_segments_round_trip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_collection(kind.collection()), Some(kind));
        }
        assert_eq!(EntityKind::from_collection("widgets"), None);
        assert_eq!(EntityKind::from_collection("todo"), None);
    }

    #[test]
    fn schemas_declare_expected_fields() {
        let todo = EntityKind::Todo;
        assert!(todo.field("title").is_some_and(|s| s.required));
        assert!(todo.field("description").is_some_and(|s| !s.required));
        let done = todo.field("doneStatus").expect("doneStatus in schema");
        assert_eq!(done.kind, FieldKind::Flag);
        assert_eq!(done.default, Some(false));

        let project = EntityKind::Project;
        assert_eq!(project.field("active").and_then(|s| s.default), Some(true));
        assert_eq!(
            project.field("completed").and_then(|s| s.default),
            Some(false)
        );

        // Tasks have no mandatory fields at all.
        assert!(EntityKind::Task.schema().iter().all(|s| !s.required));
    }

    #[test]
    fn field_lookup_is_case_sensitive() {
        assert!(EntityKind::Project.field("Completed").is_none());
        assert!(EntityKind::Todo.field("donestatus").is_none());
    }

    #[test]
    fn render_matches_query_string_form() {
        assert_eq!(FieldValue::Flag(true).render(), "true");
        assert_eq!(FieldValue::Flag(false).render(), "false");
        assert_eq!(FieldValue::Text("Home".into()).render(), "Home");
    }

    #[test]
    fn ordered_fields_follow_schema_order() {
        let mut fields = BTreeMap::new();
        fields.insert("doneStatus", FieldValue::Flag(false));
        fields.insert("title", FieldValue::Text("file taxes".into()));
        let entity = Entity {
            id: 1,
            kind: EntityKind::Todo,
            fields,
        };
        let names: Vec<_> = entity.ordered_fields().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["title", "doneStatus"]);
    }
}
