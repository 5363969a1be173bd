//! REST router: verb + path dispatch onto the entity store.
//!
//! Per-request pipeline: route match, body parse (for mutating verbs),
//! validation (inside the store), execution, serialization. Any stage
//! short-circuits into an error response in the negotiated representation.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::info;

use todo_core::{
    related_id, EntityKind, EntityStore, ListFilter, StoreError, UpdateMode,
};

use crate::{
    body::parse_body,
    error::ApiError,
    negotiate::{
        collection_response, entity_response, link_response, Representation,
    },
};

/// REST server over an [`EntityStore`].
pub struct RestServer<S> {
    store: Arc<S>,
}

impl<S: EntityStore + 'static> RestServer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Bind and serve until the task is cancelled.
    pub async fn serve(self, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.into_router();

        let socket_addr: SocketAddr = addr
            .parse()
            .map_err(|e| format!("Invalid address '{addr}': {e}"))?;

        info!("Starting REST server on {}", socket_addr);

        let listener = tokio::net::TcpListener::bind(socket_addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// The router with all endpoints. HEAD is served automatically for
    /// every GET route with the body discarded.
    pub fn into_router(self) -> Router {
        Router::new()
            .route("/", get(root_redirect))
            .route("/health", get(health_handler))
            .route(
                "/:kind",
                get(collection_handler::<S>).post(create_handler::<S>),
            )
            .route(
                "/:kind/:id",
                get(item_handler::<S>)
                    .post(amend_handler::<S>)
                    .put(replace_handler::<S>)
                    .delete(remove_handler::<S>),
            )
            .route(
                "/:kind/:id/:rel",
                get(related_handler::<S>).post(link_handler::<S>),
            )
            .route(
                "/:kind/:id/:rel/:related_id",
                get(link_probe_handler).delete(unlink_handler::<S>),
            )
            .layer(middleware::from_fn(
                crate::request_log::request_logging_middleware,
            ))
            .with_state(self.store)
    }
}

/// Resolve a URL collection segment or 404.
fn resolve_kind(segment: &str) -> Result<EntityKind, ApiError> {
    EntityKind::from_collection(segment).ok_or_else(|| ApiError::unknown_resource(segment))
}

/// Resolve a relationship segment under a parent kind.
///
/// Each relation is reachable from both ends; `tasksof` is the todo-side
/// name of the todo–task relation, everything else uses the plural of the
/// target kind.
fn resolve_related(parent: EntityKind, segment: &str) -> Result<EntityKind, ApiError> {
    match (parent, segment) {
        (EntityKind::Category, "projects") => Ok(EntityKind::Project),
        (EntityKind::Category, "todos") => Ok(EntityKind::Todo),
        (EntityKind::Project, "categories") => Ok(EntityKind::Category),
        (EntityKind::Project, "tasks") => Ok(EntityKind::Task),
        (EntityKind::Todo, "categories") => Ok(EntityKind::Category),
        (EntityKind::Todo, "tasksof") => Ok(EntityKind::Task),
        (EntityKind::Task, "projects") => Ok(EntityKind::Project),
        (EntityKind::Task, "todos") => Ok(EntityKind::Todo),
        _ => Err(ApiError::unknown_resource(segment)),
    }
}

/// Parse a path id. Anything that is not a non-negative integer can never
/// name a live entity, so it resolves to 404 rather than 400.
fn parse_id(kind: EntityKind, raw: &str) -> Result<u64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|value| u64::try_from(value).ok())
        .ok_or_else(|| {
            ApiError::Store(StoreError::NotFound(format!(
                "{} with id {raw} does not exist",
                kind.singular()
            )))
        })
}

/// `GET /` redirects to the todo collection as the landing resource.
async fn root_redirect() -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, "/todos")],
    )
        .into_response()
}

async fn health_handler() -> &'static str {
    "OK"
}

/// `GET /{kind}` with optional exact-match query filters.
async fn collection_handler<S: EntityStore>(
    State(store): State<Arc<S>>,
    Path(kind): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let repr = Representation::negotiate(&headers);
    let result = async {
        let kind = resolve_kind(&kind)?;
        let mut filter = ListFilter::new();
        for (field, value) in params {
            filter.push(field, value);
        }
        let entities = store.list(kind, filter).await?;
        Ok::<_, ApiError>(collection_response(repr, kind, &entities))
    }
    .await;
    result.unwrap_or_else(|e| e.into_response_as(repr))
}

/// `POST /{kind}`: create.
async fn create_handler<S: EntityStore>(
    State(store): State<Arc<S>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let repr = Representation::negotiate(&headers);
    let result = async {
        let kind = resolve_kind(&kind)?;
        let payload = parse_body(&headers, &body)?;
        let entity = store.create(kind, payload).await?;
        Ok::<_, ApiError>(entity_response(repr, StatusCode::CREATED, &entity))
    }
    .await;
    result.unwrap_or_else(|e| e.into_response_as(repr))
}

/// `GET /{kind}/{id}`.
async fn item_handler<S: EntityStore>(
    State(store): State<Arc<S>>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let repr = Representation::negotiate(&headers);
    let result = async {
        let kind = resolve_kind(&kind)?;
        let id = parse_id(kind, &id)?;
        let entity = store
            .get(kind, id)
            .await?
            .ok_or_else(|| StoreError::no_such_entity(kind, id))?;
        Ok::<_, ApiError>(entity_response(repr, StatusCode::OK, &entity))
    }
    .await;
    result.unwrap_or_else(|e| e.into_response_as(repr))
}

/// `POST /{kind}/{id}`: partial update of the supplied fields only.
async fn amend_handler<S: EntityStore>(
    State(store): State<Arc<S>>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    update_item(store, kind, id, headers, body, UpdateMode::Partial).await
}

/// `PUT /{kind}/{id}`: full replace, mandatory fields required.
async fn replace_handler<S: EntityStore>(
    State(store): State<Arc<S>>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    update_item(store, kind, id, headers, body, UpdateMode::Replace).await
}

async fn update_item<S: EntityStore>(
    store: Arc<S>,
    kind: String,
    id: String,
    headers: HeaderMap,
    body: Bytes,
    mode: UpdateMode,
) -> Response {
    let repr = Representation::negotiate(&headers);
    let result = async {
        let kind = resolve_kind(&kind)?;
        let id = parse_id(kind, &id)?;
        let payload = parse_body(&headers, &body)?;
        let entity = store.update(kind, id, payload, mode).await?;
        Ok::<_, ApiError>(entity_response(repr, StatusCode::OK, &entity))
    }
    .await;
    result.unwrap_or_else(|e| e.into_response_as(repr))
}

/// `DELETE /{kind}/{id}`: remove the entity and cascade its links.
async fn remove_handler<S: EntityStore>(
    State(store): State<Arc<S>>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let repr = Representation::negotiate(&headers);
    let result = async {
        let kind = resolve_kind(&kind)?;
        let id = parse_id(kind, &id)?;
        store.delete(kind, id).await?;
        Ok::<_, ApiError>(StatusCode::OK.into_response())
    }
    .await;
    result.unwrap_or_else(|e| e.into_response_as(repr))
}

/// `GET /{kind}/{id}/{rel}`: entities linked to the parent.
async fn related_handler<S: EntityStore>(
    State(store): State<Arc<S>>,
    Path((kind, id, rel)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    let repr = Representation::negotiate(&headers);
    let result = async {
        let kind = resolve_kind(&kind)?;
        let id = parse_id(kind, &id)?;
        let target = resolve_related(kind, &rel)?;
        let entities = store.linked(kind, id, target).await?;
        Ok::<_, ApiError>(collection_response(repr, target, &entities))
    }
    .await;
    result.unwrap_or_else(|e| e.into_response_as(repr))
}

/// `POST /{kind}/{id}/{rel}`: link the parent to the id named in the body.
async fn link_handler<S: EntityStore>(
    State(store): State<Arc<S>>,
    Path((kind, id, rel)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let repr = Representation::negotiate(&headers);
    let result = async {
        let kind = resolve_kind(&kind)?;
        let id = parse_id(kind, &id)?;
        let target = resolve_related(kind, &rel)?;
        let payload = parse_body(&headers, &body)?;
        let other_id = related_id(&payload)?;
        let edge = store.link(kind, id, target, other_id).await?;
        Ok::<_, ApiError>(link_response(repr, &edge))
    }
    .await;
    result.unwrap_or_else(|e| e.into_response_as(repr))
}

/// Links are deletable but not fetchable; a GET on a link path is always
/// a missing resource.
async fn link_probe_handler(headers: HeaderMap) -> Response {
    let repr = Representation::negotiate(&headers);
    ApiError::unknown_resource("links are not addressable").into_response_as(repr)
}

/// `DELETE /{kind}/{id}/{rel}/{relatedId}`: remove one link.
async fn unlink_handler<S: EntityStore>(
    State(store): State<Arc<S>>,
    Path((kind, id, rel, related)): Path<(String, String, String, String)>,
    headers: HeaderMap,
) -> Response {
    let repr = Representation::negotiate(&headers);
    let result = async {
        let kind = resolve_kind(&kind)?;
        let id = parse_id(kind, &id)?;
        let target = resolve_related(kind, &rel)?;
        let other_id = parse_id(target, &related)?;
        store.unlink(kind, id, target, other_id).await?;
        Ok::<_, ApiError>(StatusCode::OK.into_response())
    }
    .await;
    result.unwrap_or_else(|e| e.into_response_as(repr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn related_segments_resolve_for_every_side() {
        let cases = [
            (EntityKind::Category, "projects", EntityKind::Project),
            (EntityKind::Category, "todos", EntityKind::Todo),
            (EntityKind::Project, "categories", EntityKind::Category),
            (EntityKind::Project, "tasks", EntityKind::Task),
            (EntityKind::Todo, "categories", EntityKind::Category),
            (EntityKind::Todo, "tasksof", EntityKind::Task),
            (EntityKind::Task, "projects", EntityKind::Project),
            (EntityKind::Task, "todos", EntityKind::Todo),
        ];
        for (parent, segment, expected) in cases {
            assert_eq!(resolve_related(parent, segment).unwrap(), expected);
        }
    }

    #[test]
    fn unrelated_segments_are_rejected() {
        assert!(resolve_related(EntityKind::Project, "todos").is_err());
        assert!(resolve_related(EntityKind::Todo, "tasks").is_err());
        assert!(resolve_related(EntityKind::Category, "tasksof").is_err());
    }

    #[test]
    fn path_ids_that_cannot_exist_map_to_not_found() {
        assert!(parse_id(EntityKind::Todo, "3").is_ok());
        for bad in ["-1", "abc", "1.5", ""] {
            let err = parse_id(EntityKind::Todo, bad).unwrap_err();
            assert_eq!(err.status(), StatusCode::NOT_FOUND, "id {bad:?}");
        }
    }

    #[test]
    fn unknown_collections_are_not_found() {
        assert!(resolve_kind("todos").is_ok());
        let err = resolve_kind("widgets").unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
