//! HTTP handlers for the books collection.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde_json::Value;

use bookshelf_authz::{AuthGate, Principal};
use bookshelf_http::{protect, AppError, RateLimiter};
use bookshelf_kernel::settings::RateLimitSettings;

use super::models::{Book, DeleteConfirmation, ListQuery};
use super::store::BookStore;
use super::validation::{validate_new, validate_patch};

const NOT_FOUND: &str = "Book not found";

#[derive(Clone)]
pub struct BooksState {
    pub store: BookStore,
}

/// `/books/` (also reachable without the trailing slash) and `/books/{id}`.
/// Writes sit behind the auth gate; every method carries its own quota.
pub fn router(
    state: BooksState,
    gate: &Arc<AuthGate>,
    limiter: &Arc<RateLimiter>,
    limits: &RateLimitSettings,
) -> Router {
    let create = limiter.quota("books.create", limits.write_per_minute);
    let list = limiter.quota("books.list", limits.read_per_minute);
    let read = limiter.quota("books.read", limits.read_per_minute);
    let update = limiter.quota("books.update", limits.write_per_minute);
    let delete = limiter.quota("books.delete", limits.write_per_minute);

    let collection = create
        .apply(protect(gate, post(create_book)))
        .merge(list.apply(get(list_books)));

    let item = read
        .apply(get(get_book))
        .merge(update.apply(protect(gate, put(update_book))))
        .merge(delete.apply(protect(gate, axum::routing::delete(delete_book))));

    Router::new()
        .route("/books/", collection.clone())
        .route("/books", collection)
        .route("/books/{id}", item)
        .with_state(state)
}

/// Run a store call off the async executor.
async fn blocking<T, F>(store: &BookStore, work: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(BookStore) -> anyhow::Result<T> + Send + 'static,
{
    let store = store.clone();
    let value = tokio::task::spawn_blocking(move || work(store))
        .await
        .context("book store task failed")??;
    Ok(value)
}

async fn create_book(
    State(state): State<BooksState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Book>, AppError> {
    let Json(payload) = payload?;
    let book = validate_new(&payload)?;

    let created = blocking(&state.store, move |store| store.create(book)).await?;
    tracing::info!(id = created.id, by = principal.scheme(), "book created");

    Ok(Json(created))
}

async fn list_books(
    State(state): State<BooksState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<Book>>, AppError> {
    let Query(query) = query?;

    let books = blocking(&state.store, move |store| {
        store.list(query.q.as_deref(), query.limit, query.offset)
    })
    .await?;

    Ok(Json(books))
}

async fn get_book(
    State(state): State<BooksState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Book>, AppError> {
    let Path(id) = id?;

    blocking(&state.store, move |store| store.get(id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(NOT_FOUND))
}

async fn update_book(
    State(state): State<BooksState>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Book>, AppError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let patch = validate_patch(&payload)?;

    let updated = blocking(&state.store, move |store| store.update(id, patch))
        .await?
        .ok_or_else(|| AppError::not_found(NOT_FOUND))?;
    tracing::info!(id, by = principal.scheme(), "book updated");

    Ok(Json(updated))
}

async fn delete_book(
    State(state): State<BooksState>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<DeleteConfirmation>, AppError> {
    let Path(id) = id?;

    if !blocking(&state.store, move |store| store.delete(id)).await? {
        return Err(AppError::not_found(NOT_FOUND));
    }
    tracing::info!(id, by = principal.scheme(), "book deleted");

    Ok(Json(DeleteConfirmation::for_id(id)))
}
