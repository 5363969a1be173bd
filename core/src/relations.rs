//! Bidirectional many-to-many association tables.
//!
//! Four relations exist, each stored directionally as (left, right) id
//! pairs but resolvable from either side. Edges are idempotent: a pair is
//! stored at most once, and re-linking returns the existing edge.

use crate::{
    error::{Result, StoreError},
    model::EntityKind,
};

/// The four relation tables of the data model.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Relation {
    CategoryProject,
    CategoryTodo,
    ProjectTask,
    TodoTask,
}

/// Which endpoint of a relation a kind sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl Relation {
    pub const ALL: [Relation; 4] = [
        Relation::CategoryProject,
        Relation::CategoryTodo,
        Relation::ProjectTask,
        Relation::TodoTask,
    ];

    /// (left, right) entity kinds of this table.
    pub fn endpoints(&self) -> (EntityKind, EntityKind) {
        match self {
            Relation::CategoryProject => (EntityKind::Category, EntityKind::Project),
            Relation::CategoryTodo => (EntityKind::Category, EntityKind::Todo),
            Relation::ProjectTask => (EntityKind::Project, EntityKind::Task),
            Relation::TodoTask => (EntityKind::Todo, EntityKind::Task),
        }
    }

    /// Resolve the relation connecting two kinds, and which side `a` is on.
    ///
    /// Each unordered kind pair maps to at most one table, so the pair is
    /// enough to pick the relation.
    pub fn between(a: EntityKind, b: EntityKind) -> Result<(Relation, Side)> {
        for relation in Relation::ALL {
            let (left, right) = relation.endpoints();
            if (left, right) == (a, b) {
                return Ok((relation, Side::Left));
            }
            if (left, right) == (b, a) {
                return Ok((relation, Side::Right));
            }
        }
        Err(StoreError::UnsupportedRelation(a, b))
    }

    /// Kind sitting on the given side.
    pub fn kind_on(&self, side: Side) -> EntityKind {
        let (left, right) = self.endpoints();
        match side {
            Side::Left => left,
            Side::Right => right,
        }
    }
}

/// One stored association edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Synthetic row id, unique across all relation tables
    pub id: u64,
    pub left: u64,
    pub right: u64,
}

impl Edge {
    /// Id on the given side.
    fn end(&self, side: Side) -> u64 {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

/// Edge rows of a single relation, in insertion order.
#[derive(Debug, Default)]
pub struct RelationTable {
    edges: Vec<Edge>,
}

impl RelationTable {
    pub fn new() -> Self {
        RelationTable::default()
    }

    /// Insert the pair unless it is already present. Returns the stored
    /// edge either way; `next_edge_id` is only consumed on insertion.
    pub fn insert(&mut self, left: u64, right: u64, next_edge_id: &mut u64) -> Edge {
        if let Some(existing) = self
            .edges
            .iter()
            .find(|e| e.left == left && e.right == right)
        {
            return *existing;
        }
        let edge = Edge {
            id: *next_edge_id,
            left,
            right,
        };
        *next_edge_id += 1;
        self.edges.push(edge);
        edge
    }

    /// Remove the pair; false when no such edge was stored.
    pub fn remove(&mut self, left: u64, right: u64) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| !(e.left == left && e.right == right));
        before != self.edges.len()
    }

    /// Ids on the opposite side of `id`, where `id` sits on `side`.
    pub fn neighbours(&self, side: Side, id: u64) -> Vec<u64> {
        self.edges
            .iter()
            .filter(|e| e.end(side) == id)
            .map(|e| e.end(side.other()))
            .collect()
    }

    /// Drop every edge touching `id` on `side`. Used by cascade delete.
    pub fn purge(&mut self, side: Side, id: u64) {
        self.edges.retain(|e| e.end(side) != id);
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
