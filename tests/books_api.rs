use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use bookshelf_app::Application;
use bookshelf_kernel::settings::{DatabaseSettings, Settings};

const API_KEY: &str = "test-api-key";

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.database = DatabaseSettings::in_memory();
    settings.auth.api_key = API_KEY.to_string();
    settings.auth.secret_key = "integration-secret".to_string();
    settings.rate_limit.enabled = false;
    settings
}

async fn app_with(settings: Settings) -> Router {
    Application::bootstrap(settings).await.unwrap().router()
}

async fn app() -> Router {
    app_with(settings()).await
}

enum Auth<'a> {
    None,
    Key(&'a str),
    Bearer(&'a str),
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    auth: Auth<'_>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    builder = match auth {
        Auth::None => builder,
        Auth::Key(key) => builder.header("x-api-key", key),
        Auth::Bearer(token) => builder.header("authorization", format!("Bearer {token}")),
    };
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn create(app: &Router, title: &str, author: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/books/",
        Auth::Key(API_KEY),
        Some(json!({"title": title, "author": author, "year": 2020, "price": 19.99})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

fn titles(body: &Value) -> Vec<&str> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|b| b["title"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn root_returns_service_metadata() {
    let app = app().await;
    let (status, body) = send(&app, Method::GET, "/", Auth::None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Welcome to the Books API!");
    assert_eq!(body["version"], "1.0.0");
    assert_eq!(body["docs"], "/swagger-ui");
}

#[tokio::test]
async fn create_assigns_fresh_ids() {
    let app = app().await;
    let first = create(&app, "Dune", "Frank Herbert").await;
    assert_eq!(first["title"], "Dune");
    assert_eq!(first["year"], 2020);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/books/{}", first["id"]),
        Auth::Key(API_KEY),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let second = create(&app, "Emma", "Jane Austen").await;
    assert!(second["id"].as_i64().unwrap() > first["id"].as_i64().unwrap());
}

#[tokio::test]
async fn create_rejects_out_of_range_fields() {
    let app = app().await;
    let base = json!({"title": "T", "author": "A", "year": 2000, "price": 1.0});

    for (field, value, kind) in [
        ("year", json!(3000), "greater_than"),
        ("price", json!(-3.00), "less_than"),
        ("title", json!(""), "too_short"),
    ] {
        let mut payload = base.clone();
        payload[field] = value;
        let (status, body) =
            send(&app, Method::POST, "/books/", Auth::Key(API_KEY), Some(payload)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error_type"], "validation_error");
        assert_eq!(body["message"], "Request validation failed");
        assert_eq!(body["detail"][0]["field"], field);
        assert_eq!(body["detail"][0]["type"], kind);
    }
}

#[tokio::test]
async fn create_enumerates_every_violation() {
    let app = app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/books/",
        Auth::Key(API_KEY),
        Some(json!({"title": "", "author": "A", "year": 3000, "price": -1})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"].as_array().unwrap().len(), 3);
    assert!(body["trace_id"].is_string());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let app = app().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/books/")
        .header("x-api-key", API_KEY)
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_book_is_not_found() {
    let app = app().await;
    let (status, body) = send(&app, Method::GET, "/books/999", Auth::None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("Book not found"));
    assert_eq!(body["error_type"], "error");
}

#[tokio::test]
async fn non_integer_id_is_a_validation_error() {
    let app = app().await;
    let (status, body) = send(&app, Method::GET, "/books/abc", Auth::None, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error_type"], "validation_error");
}

#[tokio::test]
async fn search_matches_title_or_author() {
    let app = app().await;
    create(&app, "Learning Python", "Mark Lutz").await;
    create(&app, "Rust in Action", "Tim McNamara").await;
    create(&app, "Fluent Python", "Luciano Ramalho").await;

    let (status, body) = send(&app, Method::GET, "/books/?q=Python", Auth::None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&body), vec!["Learning Python", "Fluent Python"]);

    let (_, body) = send(&app, Method::GET, "/books?q=McNamara", Auth::None, None).await;
    assert_eq!(titles(&body), vec!["Rust in Action"]);
}

#[tokio::test]
async fn pagination_follows_creation_order() {
    let app = app().await;
    for i in 1..=10 {
        create(&app, &format!("Book {i}"), "Author").await;
    }

    let (_, body) = send(&app, Method::GET, "/books/?limit=2&offset=2", Auth::None, None).await;
    assert_eq!(titles(&body), vec!["Book 3", "Book 4"]);

    let (_, body) = send(&app, Method::GET, "/books/", Auth::None, None).await;
    assert_eq!(body.as_array().unwrap().len(), 10);

    let (status, body) = send(&app, Method::GET, "/books/?offset=100", Auth::None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, _) = send(&app, Method::GET, "/books/?limit=ten", Auth::None, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn negative_pagination_is_not_an_error() {
    let app = app().await;
    for i in 1..=5 {
        create(&app, &format!("Book {i}"), "Author").await;
    }

    // A negative limit means no limit.
    let (status, body) = send(&app, Method::GET, "/books/?limit=-1&offset=1", Auth::None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&body), vec!["Book 2", "Book 3", "Book 4", "Book 5"]);

    // A negative offset starts at the beginning.
    let (status, body) = send(&app, Method::GET, "/books/?limit=2&offset=-5", Auth::None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&body), vec!["Book 1", "Book 2"]);
}

#[tokio::test]
async fn partial_update_changes_only_supplied_fields() {
    let app = app().await;
    let created = create(&app, "Dune", "Frank Herbert").await;
    let uri = format!("/books/{}", created["id"]);

    let (status, updated) = send(
        &app,
        Method::PUT,
        &uri,
        Auth::Key(API_KEY),
        Some(json!({"price": 29.99})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["price"], 29.99);
    assert_eq!(updated["title"], created["title"]);
    assert_eq!(updated["author"], created["author"]);
    assert_eq!(updated["year"], created["year"]);

    let (_, again) = send(
        &app,
        Method::PUT,
        &uri,
        Auth::Key(API_KEY),
        Some(json!({"price": 29.99})),
    )
    .await;
    assert_eq!(again, updated);

    let (_, fetched) = send(&app, Method::GET, &uri, Auth::None, None).await;
    assert_eq!(fetched, updated);
}

#[tokio::test]
async fn empty_update_is_a_no_op() {
    let app = app().await;
    let created = create(&app, "Dune", "Frank Herbert").await;
    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/books/{}", created["id"]),
        Auth::Key(API_KEY),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, created);
}

#[tokio::test]
async fn update_validates_and_reports_missing_books() {
    let app = app().await;
    let created = create(&app, "Dune", "Frank Herbert").await;

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/books/{}", created["id"]),
        Auth::Key(API_KEY),
        Some(json!({"year": 2101})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/books/4242",
        Auth::Key(API_KEY),
        Some(json!({"price": 1.0})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_then_get_is_not_found() {
    let app = app().await;
    let created = create(&app, "Dune", "Frank Herbert").await;
    let uri = format!("/books/{}", created["id"]);

    let (status, body) = send(&app, Method::DELETE, &uri, Auth::Key(API_KEY), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["message"],
        format!("Book with ID {} has been deleted", created["id"])
    );

    let (status, _) = send(&app, Method::GET, &uri, Auth::None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, &uri, Auth::Key(API_KEY), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn protected_routes_require_credentials() {
    let app = app().await;
    let created = create(&app, "Dune", "Frank Herbert").await;
    let uri = format!("/books/{}", created["id"]);
    let payload = json!({"title": "T", "author": "A", "year": 1, "price": 1});

    let cases = [
        (Method::POST, "/books/".to_string(), Some(payload.clone())),
        (Method::PUT, uri.clone(), Some(json!({"price": 2}))),
        (Method::DELETE, uri.clone(), None),
    ];

    for (method, uri, body) in cases.clone() {
        let (status, response) = send(&app, method, &uri, Auth::None, body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(response["error_type"], "error");
        assert_eq!(response["code"], "unauthorized");
    }

    for (method, uri, body) in cases.clone() {
        let (status, _) = send(&app, method, &uri, Auth::Key("wrong-key"), body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    for (method, uri, body) in cases {
        let (status, _) = send(&app, method, &uri, Auth::Key(API_KEY), body).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn bearer_token_from_login_unlocks_writes() {
    let app = app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/token?username=admin&password=wrong",
        Auth::None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Incorrect username or password");

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/token?username=admin&password=admin",
        Auth::None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["expires_in"], 1800);
    let token = body["access_token"].as_str().unwrap().to_string();

    let (status, created) = send(
        &app,
        Method::POST,
        "/books/",
        Auth::Bearer(&token),
        Some(json!({"title": "Dune", "author": "Frank Herbert", "year": 1965, "price": 9.99})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let path = format!("/books/{}", created["id"]);

    let (status, updated) = send(
        &app,
        Method::PUT,
        &path,
        Auth::Bearer(&token),
        Some(json!({"price": 12.5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["price"], 12.5);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &path,
        Auth::Bearer("not.a.token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, Method::DELETE, &path, Auth::Bearer(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], format!("Book with ID {} has been deleted", created["id"]));

    let (status, _) = send(&app, Method::PUT, &path, Auth::Bearer(&token), Some(json!({"price": 1}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn token_endpoint_is_rate_limited() {
    let mut settings = settings();
    settings.rate_limit.enabled = true;
    let app = app_with(settings).await;

    for _ in 0..5 {
        let (status, _) = send(
            &app,
            Method::POST,
            "/auth/token?username=admin&password=admin",
            Auth::None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/token?username=admin&password=admin",
        Auth::None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "rate_limited");
    assert_eq!(body["detail"], "Rate limit exceeded: 5 per 1 minute");
}

#[tokio::test]
async fn independent_instances_do_not_share_state() {
    let first = app().await;
    let second = app().await;
    create(&first, "Dune", "Frank Herbert").await;

    let (_, body) = send(&second, Method::GET, "/books/", Auth::None, None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn openapi_document_lists_book_routes() {
    let app = app().await;
    let (status, body) = send(&app, Method::GET, "/docs/openapi.json", Auth::None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/books/{id}"]["put"].is_object());
    assert!(body["paths"]["/auth/token"]["post"].is_object());
    assert!(body["components"]["securitySchemes"]["APIKeyHeader"].is_object());
}
