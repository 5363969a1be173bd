//! In-memory entity store and its trait seam.
//!
//! [`EntityStore`] is the interface the HTTP layer programs against;
//! [`MemoryStore`] is the process-lifetime implementation: four id-keyed
//! arenas plus the relation tables, all behind one mutex. The working set
//! is tens of records, so a single global lock is the whole concurrency
//! story.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    error::{Result, StoreError},
    filter::ListFilter,
    model::{Entity, EntityKind, FieldValue},
    relations::{Edge, Relation, RelationTable, Side},
    validation::{validate, Payload, WriteMode},
};

/// How an item-level mutation treats fields that were not supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Merge supplied fields over the existing record
    Partial,
    /// Full representation: mandatory fields required, the rest reset
    Replace,
}

impl UpdateMode {
    fn write_mode(self) -> WriteMode {
        match self {
            UpdateMode::Partial => WriteMode::Partial,
            UpdateMode::Replace => WriteMode::Replace,
        }
    }
}

/// Storage interface for entities and their associations.
///
/// Implementations must be thread-safe; every method is a single atomic
/// attempt that either completes or leaves no partial state behind.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Validate and store a new entity, assigning the next id of its kind.
    async fn create(&self, kind: EntityKind, payload: Payload) -> Result<Entity>;

    /// Fetch an entity by id.
    async fn get(&self, kind: EntityKind, id: u64) -> Result<Option<Entity>>;

    /// Mutate an existing entity in the given mode.
    async fn update(
        &self,
        kind: EntityKind,
        id: u64,
        payload: Payload,
        mode: UpdateMode,
    ) -> Result<Entity>;

    /// Remove an entity and every association referencing it.
    async fn delete(&self, kind: EntityKind, id: u64) -> Result<()>;

    /// All entities of a kind passing the filter, ascending by id.
    async fn list(&self, kind: EntityKind, filter: ListFilter) -> Result<Vec<Entity>>;

    /// Associate two existing entities. Idempotent per pair.
    async fn link(
        &self,
        kind: EntityKind,
        id: u64,
        other_kind: EntityKind,
        other_id: u64,
    ) -> Result<Edge>;

    /// Remove the association between two entities.
    async fn unlink(
        &self,
        kind: EntityKind,
        id: u64,
        other_kind: EntityKind,
        other_id: u64,
    ) -> Result<()>;

    /// Entities of `other_kind` linked to `(kind, id)`, ascending by id.
    async fn linked(
        &self,
        kind: EntityKind,
        id: u64,
        other_kind: EntityKind,
    ) -> Result<Vec<Entity>>;
}

/// One kind's rows plus its id counter.
///
/// Ids are handed out monotonically and never reused after deletion, so a
/// stale reference can only miss, never alias a newer record.
#[derive(Debug)]
struct Arena {
    rows: BTreeMap<u64, Entity>,
    next_id: u64,
}

impl Default for Arena {
    fn default() -> Self {
        Arena {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    categories: Arena,
    projects: Arena,
    todos: Arena,
    tasks: Arena,
    category_project: RelationTable,
    category_todo: RelationTable,
    project_task: RelationTable,
    todo_task: RelationTable,
    next_edge_id: u64,
}

impl Inner {
    fn arena(&self, kind: EntityKind) -> &Arena {
        match kind {
            EntityKind::Category => &self.categories,
            EntityKind::Project => &self.projects,
            EntityKind::Todo => &self.todos,
            EntityKind::Task => &self.tasks,
        }
    }

    fn arena_mut(&mut self, kind: EntityKind) -> &mut Arena {
        match kind {
            EntityKind::Category => &mut self.categories,
            EntityKind::Project => &mut self.projects,
            EntityKind::Todo => &mut self.todos,
            EntityKind::Task => &mut self.tasks,
        }
    }

    fn table(&self, relation: Relation) -> &RelationTable {
        match relation {
            Relation::CategoryProject => &self.category_project,
            Relation::CategoryTodo => &self.category_todo,
            Relation::ProjectTask => &self.project_task,
            Relation::TodoTask => &self.todo_task,
        }
    }

    fn table_mut(&mut self, relation: Relation) -> &mut RelationTable {
        match relation {
            Relation::CategoryProject => &mut self.category_project,
            Relation::CategoryTodo => &mut self.category_todo,
            Relation::ProjectTask => &mut self.project_task,
            Relation::TodoTask => &mut self.todo_task,
        }
    }

    fn exists(&self, kind: EntityKind, id: u64) -> bool {
        self.arena(kind).rows.contains_key(&id)
    }

    fn require(&self, kind: EntityKind, id: u64) -> Result<()> {
        if self.exists(kind, id) {
            Ok(())
        } else {
            Err(StoreError::no_such_entity(kind, id))
        }
    }
}

/// Process-lifetime in-memory store. Cheap to clone handles via `Arc`.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: Mutex::new(Inner {
                next_edge_id: 1,
                ..Inner::default()
            }),
        }
    }
}

/// Build a full field map for create/replace: validated values where
/// supplied, flag defaults where not.
fn materialize(
    kind: EntityKind,
    patch: &BTreeMap<&'static str, Option<FieldValue>>,
) -> BTreeMap<&'static str, FieldValue> {
    let mut fields = BTreeMap::new();
    for spec in kind.schema() {
        match patch.get(spec.name) {
            Some(Some(value)) => {
                fields.insert(spec.name, value.clone());
            }
            _ => {
                if let Some(default) = spec.default {
                    fields.insert(spec.name, FieldValue::Flag(default));
                }
            }
        }
    }
    fields
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn create(&self, kind: EntityKind, payload: Payload) -> Result<Entity> {
        let patch = validate(kind, &payload, WriteMode::Create)?;
        let fields = materialize(kind, &patch);

        let mut inner = self.inner.lock();
        let arena = inner.arena_mut(kind);
        let id = arena.next_id;
        arena.next_id += 1;
        let entity = Entity { id, kind, fields };
        arena.rows.insert(id, entity.clone());
        Ok(entity)
    }

    async fn get(&self, kind: EntityKind, id: u64) -> Result<Option<Entity>> {
        let inner = self.inner.lock();
        Ok(inner.arena(kind).rows.get(&id).cloned())
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: u64,
        payload: Payload,
        mode: UpdateMode,
    ) -> Result<Entity> {
        let mut inner = self.inner.lock();
        // a missing target is reported before any body diagnostics, so a
        // PUT to a dead id is a 404 no matter what the body looks like
        inner.require(kind, id)?;
        let patch = validate(kind, &payload, mode.write_mode())?;
        let arena = inner.arena_mut(kind);
        let entity = arena
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::no_such_entity(kind, id))?;

        match mode {
            UpdateMode::Partial => {
                for (name, value) in patch {
                    match value {
                        Some(value) => {
                            entity.fields.insert(name, value);
                        }
                        None => {
                            entity.fields.remove(name);
                        }
                    }
                }
            }
            UpdateMode::Replace => {
                entity.fields = materialize(kind, &patch);
            }
        }
        Ok(entity.clone())
    }

    async fn delete(&self, kind: EntityKind, id: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.require(kind, id)?;

        // cascade: drop the edges before the record so no dangling link
        // can ever be observed
        for relation in Relation::ALL {
            let (left, right) = relation.endpoints();
            if left == kind {
                inner.table_mut(relation).purge(Side::Left, id);
            }
            if right == kind {
                inner.table_mut(relation).purge(Side::Right, id);
            }
        }
        inner.arena_mut(kind).rows.remove(&id);
        Ok(())
    }

    async fn list(&self, kind: EntityKind, filter: ListFilter) -> Result<Vec<Entity>> {
        let inner = self.inner.lock();
        Ok(inner
            .arena(kind)
            .rows
            .values()
            .filter(|entity| filter.matches(entity))
            .cloned()
            .collect())
    }

    async fn link(
        &self,
        kind: EntityKind,
        id: u64,
        other_kind: EntityKind,
        other_id: u64,
    ) -> Result<Edge> {
        let (relation, side) = Relation::between(kind, other_kind)?;

        let mut inner = self.inner.lock();
        inner.require(kind, id)?;
        inner.require(other_kind, other_id)?;

        let (left, right) = match side {
            Side::Left => (id, other_id),
            Side::Right => (other_id, id),
        };
        let mut next_edge_id = inner.next_edge_id;
        let edge = inner.table_mut(relation).insert(left, right, &mut next_edge_id);
        inner.next_edge_id = next_edge_id;
        Ok(edge)
    }

    async fn unlink(
        &self,
        kind: EntityKind,
        id: u64,
        other_kind: EntityKind,
        other_id: u64,
    ) -> Result<()> {
        let (relation, side) = Relation::between(kind, other_kind)?;

        let mut inner = self.inner.lock();
        let (left, right) = match side {
            Side::Left => (id, other_id),
            Side::Right => (other_id, id),
        };
        if inner.table_mut(relation).remove(left, right) {
            Ok(())
        } else {
            Err(StoreError::no_such_link(kind, id, other_kind, other_id))
        }
    }

    async fn linked(
        &self,
        kind: EntityKind,
        id: u64,
        other_kind: EntityKind,
    ) -> Result<Vec<Entity>> {
        let (relation, side) = Relation::between(kind, other_kind)?;

        let inner = self.inner.lock();
        inner.require(kind, id)?;

        let mut ids = inner.table(relation).neighbours(side, id);
        ids.sort_unstable();
        Ok(ids
            .into_iter()
            .filter_map(|other_id| inner.arena(other_kind).rows.get(&other_id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{PayloadSource, RawValue};

    fn payload(fields: &[(&str, RawValue)]) -> Payload {
        let mut payload = Payload::new(PayloadSource::Json);
        for (name, value) in fields {
            payload.insert(*name, value.clone());
        }
        payload
    }

    fn todo_payload(title: &str) -> Payload {
        payload(&[("title", RawValue::Text(title.into()))])
    }

    async fn seed_todo(store: &MemoryStore, title: &str) -> Entity {
        store
            .create(EntityKind::Todo, todo_payload(title))
            .await
            .unwrap()
    }

    async fn seed_category(store: &MemoryStore, title: &str) -> Entity {
        store
            .create(EntityKind::Category, todo_payload(title))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_assigns_monotonic_ids_and_defaults() {
        let store = MemoryStore::new();
        let first = seed_todo(&store, "one").await;
        let second = seed_todo(&store, "two").await;
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        // flag default applied even though doneStatus was never sent
        assert_eq!(first.field("doneStatus"), Some(&FieldValue::Flag(false)));
        assert_eq!(first.field("description"), None);
    }

    #[tokio::test]
    async fn project_defaults_are_per_field() {
        let store = MemoryStore::new();
        let project = store
            .create(EntityKind::Project, todo_payload("office"))
            .await
            .unwrap();
        assert_eq!(project.field("completed"), Some(&FieldValue::Flag(false)));
        assert_eq!(project.field("active"), Some(&FieldValue::Flag(true)));
    }

    #[tokio::test]
    async fn create_rejects_client_supplied_id() {
        let store = MemoryStore::new();
        let bad = payload(&[
            ("id", RawValue::Text("8".into())),
            ("title", RawValue::Text("car vehicle".into())),
        ]);
        let err = store.create(EntityKind::Category, bad).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn get_round_trips_created_fields() {
        let store = MemoryStore::new();
        let created = store
            .create(
                EntityKind::Todo,
                payload(&[
                    ("title", RawValue::Text("file taxes".into())),
                    ("description", RawValue::Text("before april".into())),
                    ("doneStatus", RawValue::Flag(false)),
                ]),
            )
            .await
            .unwrap();
        let fetched = store
            .get(EntityKind::Todo, created.id)
            .await
            .unwrap()
            .expect("created todo fetchable");
        assert_eq!(fetched, created);
        assert!(store.get(EntityKind::Todo, 999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partial_update_preserves_unsent_fields() {
        let store = MemoryStore::new();
        let todo = store
            .create(
                EntityKind::Todo,
                payload(&[
                    ("title", RawValue::Text("original".into())),
                    ("description", RawValue::Text("keep me".into())),
                ]),
            )
            .await
            .unwrap();

        let updated = store
            .update(
                EntityKind::Todo,
                todo.id,
                payload(&[("doneStatus", RawValue::Flag(true))]),
                UpdateMode::Partial,
            )
            .await
            .unwrap();
        assert_eq!(updated.field("title"), Some(&FieldValue::Text("original".into())));
        assert_eq!(updated.field("description"), Some(&FieldValue::Text("keep me".into())));
        assert_eq!(updated.field("doneStatus"), Some(&FieldValue::Flag(true)));
    }

    #[tokio::test]
    async fn replace_resets_fields_not_supplied() {
        let store = MemoryStore::new();
        let todo = store
            .create(
                EntityKind::Todo,
                payload(&[
                    ("title", RawValue::Text("original".into())),
                    ("description", RawValue::Text("drop me".into())),
                    ("doneStatus", RawValue::Flag(true)),
                ]),
            )
            .await
            .unwrap();

        let replaced = store
            .update(
                EntityKind::Todo,
                todo.id,
                todo_payload("fresh"),
                UpdateMode::Replace,
            )
            .await
            .unwrap();
        assert_eq!(replaced.id, todo.id);
        assert_eq!(replaced.field("title"), Some(&FieldValue::Text("fresh".into())));
        assert_eq!(replaced.field("description"), None);
        assert_eq!(replaced.field("doneStatus"), Some(&FieldValue::Flag(false)));
    }

    #[tokio::test]
    async fn replace_without_title_is_a_validation_error() {
        let store = MemoryStore::new();
        let todo = seed_todo(&store, "t").await;
        let err = store
            .update(
                EntityKind::Todo,
                todo.id,
                payload(&[("doneStatus", RawValue::Flag(true))]),
                UpdateMode::Replace,
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn update_missing_entity_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update(
                EntityKind::Todo,
                41,
                todo_payload("x"),
                UpdateMode::Partial,
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        // the dead id wins even when the body would not validate
        let err = store
            .update(
                EntityKind::Todo,
                41,
                payload(&[("bogus", RawValue::Flag(true))]),
                UpdateMode::Replace,
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_is_permanent_and_ids_are_not_reused() {
        let store = MemoryStore::new();
        let first = seed_todo(&store, "one").await;
        store.delete(EntityKind::Todo, first.id).await.unwrap();
        assert!(store
            .delete(EntityKind::Todo, first.id)
            .await
            .unwrap_err()
            .is_not_found());

        let next = seed_todo(&store, "two").await;
        assert!(next.id > first.id);
    }

    #[tokio::test]
    async fn link_requires_both_endpoints() {
        let store = MemoryStore::new();
        let todo = seed_todo(&store, "t").await;
        let err = store
            .link(EntityKind::Todo, todo.id, EntityKind::Category, 99)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = store
            .link(EntityKind::Todo, 99, EntityKind::Category, 1)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        // the failed attempts must leave nothing behind
        seed_category(&store, "c").await;
        let listed = store
            .linked(EntityKind::Todo, todo.id, EntityKind::Category)
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn relink_returns_the_same_edge() {
        let store = MemoryStore::new();
        let todo = seed_todo(&store, "t").await;
        let category = seed_category(&store, "c").await;

        let first = store
            .link(EntityKind::Todo, todo.id, EntityKind::Category, category.id)
            .await
            .unwrap();
        let second = store
            .link(EntityKind::Todo, todo.id, EntityKind::Category, category.id)
            .await
            .unwrap();
        assert_eq!(first, second);

        let listed = store
            .linked(EntityKind::Todo, todo.id, EntityKind::Category)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn links_are_visible_from_both_sides() {
        let store = MemoryStore::new();
        let todo = seed_todo(&store, "t").await;
        let category = seed_category(&store, "c").await;
        store
            .link(EntityKind::Category, category.id, EntityKind::Todo, todo.id)
            .await
            .unwrap();

        let from_category = store
            .linked(EntityKind::Category, category.id, EntityKind::Todo)
            .await
            .unwrap();
        assert_eq!(from_category[0].id, todo.id);

        let from_todo = store
            .linked(EntityKind::Todo, todo.id, EntityKind::Category)
            .await
            .unwrap();
        assert_eq!(from_todo[0].id, category.id);
    }

    #[tokio::test]
    async fn unlink_missing_edge_is_not_found() {
        let store = MemoryStore::new();
        let todo = seed_todo(&store, "t").await;
        let category = seed_category(&store, "c").await;
        let err = store
            .unlink(EntityKind::Todo, todo.id, EntityKind::Category, category.id)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_cascades_into_every_relation() {
        let store = MemoryStore::new();
        let todo = seed_todo(&store, "t").await;
        let project = store
            .create(EntityKind::Project, todo_payload("p"))
            .await
            .unwrap();
        let category = seed_category(&store, "c").await;
        store
            .link(EntityKind::Category, category.id, EntityKind::Todo, todo.id)
            .await
            .unwrap();
        store
            .link(EntityKind::Category, category.id, EntityKind::Project, project.id)
            .await
            .unwrap();

        store.delete(EntityKind::Category, category.id).await.unwrap();

        let todo_side = store
            .linked(EntityKind::Todo, todo.id, EntityKind::Category)
            .await
            .unwrap();
        assert!(todo_side.is_empty());
        let project_side = store
            .linked(EntityKind::Project, project.id, EntityKind::Category)
            .await
            .unwrap();
        assert!(project_side.is_empty());
    }

    #[tokio::test]
    async fn linked_requires_the_parent() {
        let store = MemoryStore::new();
        let err = store
            .linked(EntityKind::Todo, 12, EntityKind::Category)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_applies_filters_and_tolerates_empty_results() {
        let store = MemoryStore::new();
        seed_todo(&store, "wash car").await;
        let done = store
            .create(
                EntityKind::Todo,
                payload(&[
                    ("title", RawValue::Text("mow lawn".into())),
                    ("doneStatus", RawValue::Flag(true)),
                ]),
            )
            .await
            .unwrap();

        let mut filter = ListFilter::new();
        filter.push("doneStatus", "true");
        let matching = store.list(EntityKind::Todo, filter).await.unwrap();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].id, done.id);

        let mut none = ListFilter::new();
        none.push("title", "no such title");
        assert!(store.list(EntityKind::Todo, none).await.unwrap().is_empty());
    }
}
