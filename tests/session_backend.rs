use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_cookies::{Cookie, CookieManagerLayer};

use kv_session_store::{
    KeyPair, Registry, SessionBackend, SessionStore,
    repositories::session::SessionRepository,
    storage::SqliteStore,
};

#[derive(Clone)]
struct Ctx {
    backend: Arc<SessionBackend>,
    name: &'static str,
}

fn repository() -> SessionRepository {
    SessionRepository::new(Arc::new(SqliteStore::open_in_memory().unwrap())).unwrap()
}

fn backend_with(repo: SessionRepository, keys: &[KeyPair]) -> Arc<SessionBackend> {
    Arc::new(SessionBackend::new(repo, keys).unwrap())
}

fn backend() -> Arc<SessionBackend> {
    backend_with(repository(), &[KeyPair::new(b"secret".to_vec())])
}

/// Increments `count`, saves, and leaks the session ID so tests can inspect the store.
async fn count_handler(State(ctx): State<Ctx>, registry: Registry) -> Response {
    let shared = match ctx.backend.get(&registry, ctx.name) {
        Ok(shared) => shared,
        Err(e) => return e.into_response(),
    };
    let mut session = shared.lock();

    let count = session.get::<i64>("count").unwrap_or(0) + 1;
    session.insert("count", count).unwrap();
    if let Err(e) = ctx.backend.save(registry.cookies(), &mut session) {
        return e.into_response();
    }

    ([("x-session", session.id.clone())], count.to_string()).into_response()
}

async fn forget_handler(State(ctx): State<Ctx>, registry: Registry) -> Response {
    let shared = ctx.backend.get(&registry, ctx.name).unwrap();
    let mut session = shared.lock();
    session.options.max_age = -1;
    match ctx.backend.save(registry.cookies(), &mut session) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn oversized_handler(State(ctx): State<Ctx>, registry: Registry) -> Response {
    let shared = ctx.backend.get(&registry, ctx.name).unwrap();
    let mut session = shared.lock();
    session.insert("a", "a".repeat(512)).unwrap();
    match ctx.backend.save(registry.cookies(), &mut session) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => e.into_response(),
    }
}

/// Loads through `new_session` and clears the handle's ID before saving.
async fn fresh_handle_handler(State(ctx): State<Ctx>, registry: Registry) -> Response {
    let mut session = ctx.backend.new_session(registry.cookies(), ctx.name).unwrap();
    session.id = String::new();
    ctx.backend.save(registry.cookies(), &mut session).unwrap();
    StatusCode::OK.into_response()
}

/// Reports whether `new_session` found a live record for the cookie.
async fn is_new_handler(State(ctx): State<Ctx>, registry: Registry) -> Response {
    let session = ctx.backend.new_session(registry.cookies(), ctx.name).unwrap();
    session.is_new.to_string().into_response()
}

/// Reads the session twice through the registry and saves via `save_all`.
async fn registry_handler(State(ctx): State<Ctx>, registry: Registry) -> Response {
    let first = ctx.backend.get(&registry, ctx.name).unwrap();
    let second = ctx.backend.get(&registry, ctx.name).unwrap();
    let same = Arc::ptr_eq(&first, &second);

    first.lock().insert("visited", true).unwrap();
    let seen_by_second = second.lock().get::<bool>("visited").unwrap_or(false);
    registry.save_all(&*ctx.backend).unwrap();

    format!("{same}:{seen_by_second}").into_response()
}

/// Stores a nested value and echoes back what was loaded.
async fn profile_handler(State(ctx): State<Ctx>, registry: Registry) -> Response {
    let shared = ctx.backend.get(&registry, ctx.name).unwrap();
    let mut session = shared.lock();

    let loaded = session
        .values
        .get("profile")
        .map(|v| sonic_rs::to_string(v).unwrap())
        .unwrap_or_default();
    if session.is_new {
        session
            .insert(
                "profile",
                sonic_rs::json!({"name": "alice", "roles": ["admin", "dev"], "age": 41}),
            )
            .unwrap();
    }
    ctx.backend.save(registry.cookies(), &mut session).unwrap();

    loaded.into_response()
}

fn app(backend: &Arc<SessionBackend>, name: &'static str) -> Router {
    Router::new()
        .route("/count", get(count_handler))
        .route("/forget", post(forget_handler))
        .route("/oversized", get(oversized_handler))
        .route("/fresh", get(fresh_handle_handler))
        .route("/is-new", get(is_new_handler))
        .route("/registry", get(registry_handler))
        .route("/profile", get(profile_handler))
        .with_state(Ctx {
            backend: backend.clone(),
            name,
        })
        .layer(CookieManagerLayer::new())
}

async fn send(app: &Router, method: &str, path: &str, cookie: Option<&Cookie<'static>>) -> Response {
    let mut request = Request::builder().method(method).uri(path);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, format!("{}={}", cookie.name(), cookie.value()));
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn response_cookie(response: &Response, name: &str) -> Option<Cookie<'static>> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| Cookie::parse(value.to_string()).ok())
        .find(|cookie| cookie.name() == name)
}

fn session_id(response: &Response) -> String {
    response
        .headers()
        .get("x-session")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn body(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn counter_survives_between_requests() {
    let backend = backend();
    let app = app(&backend, "session");

    let r1 = send(&app, "GET", "/count", None).await;
    let cookie = response_cookie(&r1, "session").expect("session cookie");
    assert_eq!(body(r1).await, "1");

    let r2 = send(&app, "GET", "/count", Some(&cookie)).await;
    assert_eq!(body(r2).await, "2");

    assert_eq!(backend.repository().count().unwrap(), 1);
}

#[tokio::test]
async fn resave_updates_the_same_record() {
    let backend = backend();
    backend.max_age(3600);
    let app = app(&backend, "session");

    let r1 = send(&app, "GET", "/count", None).await;
    let cookie = response_cookie(&r1, "session").unwrap();
    assert_eq!(cookie.max_age(), Some(tower_cookies::cookie::time::Duration::seconds(3600)));
    let id = session_id(&r1);
    let before = backend.repository().find_live(&id).unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;

    let r2 = send(&app, "GET", "/count", Some(&cookie)).await;
    assert_eq!(session_id(&r2), id);
    assert_eq!(body(r2).await, "2");

    let after = backend.repository().find_live(&id).unwrap().unwrap();
    assert_eq!(after.created_at, before.created_at);
    assert!(after.updated_at > before.updated_at);
    assert!(after.expires_at > before.expires_at);
    assert_ne!(after.data, before.data);
    assert_eq!(backend.repository().count().unwrap(), 1);
}

#[tokio::test]
async fn nested_values_round_trip() {
    let backend = backend();
    let app = app(&backend, "session");

    let r1 = send(&app, "GET", "/profile", None).await;
    let cookie = response_cookie(&r1, "session").unwrap();
    assert_eq!(body(r1).await, "");

    let r2 = send(&app, "GET", "/profile", Some(&cookie)).await;
    let loaded: sonic_rs::Value = sonic_rs::from_str(&body(r2).await).unwrap();
    assert_eq!(
        loaded,
        sonic_rs::json!({"name": "alice", "roles": ["admin", "dev"], "age": 41})
    );
}

#[tokio::test]
async fn expired_record_is_ignored_then_swept() {
    let backend = backend();
    let app = app(&backend, "session");

    let r1 = send(&app, "GET", "/count", None).await;
    let cookie = response_cookie(&r1, "session").unwrap();
    let id = session_id(&r1);

    let repo = backend.repository();
    let mut record = repo.find_by_id(&id).unwrap().unwrap();
    record.expires_at = chrono::Utc::now() - chrono::Duration::days(40);
    repo.update(&record).unwrap();

    let r2 = send(&app, "GET", "/count", Some(&cookie)).await;
    assert_ne!(session_id(&r2), id);
    assert_eq!(body(r2).await, "1");

    assert_eq!(backend.cleanup().unwrap(), 1);
    assert!(repo.find_by_id(&id).unwrap().is_none());
}

#[tokio::test]
async fn tampered_cookie_starts_a_fresh_session() {
    let backend = backend();
    let app = app(&backend, "session");

    let r1 = send(&app, "GET", "/count", None).await;
    let cookie = response_cookie(&r1, "session").unwrap();

    let junk = Cookie::new("session", format!("{}junk", cookie.value()));
    let r2 = send(&app, "GET", "/count", Some(&junk)).await;
    assert_eq!(r2.status(), StatusCode::OK);
    assert_eq!(body(r2).await, "1");

    let mut bytes = cookie.value().as_bytes().to_vec();
    let middle = bytes.len() / 2;
    bytes[middle] = if bytes[middle] == b'x' { b'y' } else { b'x' };
    let flipped = Cookie::new("session", String::from_utf8(bytes).unwrap());
    let r3 = send(&app, "GET", "/count", Some(&flipped)).await;
    assert_eq!(r3.status(), StatusCode::OK);
    assert_eq!(body(r3).await, "1");
}

#[tokio::test]
async fn negative_max_age_deletes_record_and_cookie() {
    let backend = backend();
    let app = app(&backend, "session");

    let r1 = send(&app, "GET", "/count", None).await;
    let cookie = response_cookie(&r1, "session").unwrap();
    let id = session_id(&r1);

    let r2 = send(&app, "POST", "/forget", Some(&cookie)).await;
    assert_eq!(r2.status(), StatusCode::OK);
    let cleared = response_cookie(&r2, "session").expect("expiring cookie");
    assert_eq!(cleared.value(), "");
    assert_eq!(cleared.max_age(), Some(tower_cookies::cookie::time::Duration::ZERO));

    assert!(backend.repository().find_by_id(&id).unwrap().is_none());

    // Deleting without any record is still a success.
    let r3 = send(&app, "POST", "/forget", None).await;
    assert_eq!(r3.status(), StatusCode::OK);
}

#[tokio::test]
async fn oversized_session_is_rejected_without_side_effects() {
    let backend = backend();
    backend.max_length(10);
    let app = app(&backend, "session");

    let r1 = send(&app, "GET", "/oversized", None).await;
    assert_eq!(r1.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(response_cookie(&r1, "session").is_none());
    assert_eq!(backend.repository().count().unwrap(), 0);
}

#[tokio::test]
async fn oversized_resave_leaves_stored_record_untouched() {
    let backend = backend();
    let app = app(&backend, "session");

    let r1 = send(&app, "GET", "/count", None).await;
    let cookie = response_cookie(&r1, "session").unwrap();
    let id = session_id(&r1);
    let before = backend.repository().find_by_id(&id).unwrap().unwrap();

    // Room for the ID cookie and the small record, not for 512 more bytes.
    backend.max_length(400);
    let r2 = send(&app, "GET", "/oversized", Some(&cookie)).await;
    assert_eq!(r2.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(response_cookie(&r2, "session").is_none());

    let after = backend.repository().find_by_id(&id).unwrap().unwrap();
    assert_eq!(after.data, before.data);
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(after.expires_at, before.expires_at);
    assert_eq!(backend.repository().count().unwrap(), 1);

    // The untouched record still loads.
    assert_eq!(body(send(&app, "GET", "/count", Some(&cookie)).await).await, "2");
}

#[tokio::test]
async fn presented_cookie_loads_an_existing_session() {
    let backend = backend();
    let app = app(&backend, "session");

    assert_eq!(body(send(&app, "GET", "/is-new", None).await).await, "true");

    let r1 = send(&app, "GET", "/count", None).await;
    let cookie = response_cookie(&r1, "session").unwrap();
    assert_eq!(body(send(&app, "GET", "/is-new", Some(&cookie)).await).await, "false");
}

#[tokio::test]
async fn out_of_range_max_age_fails_the_save() {
    let backend = backend();
    backend.max_age(10_000_000_000_000);
    let app = app(&backend, "session");

    let r1 = send(&app, "GET", "/count", None).await;
    assert_eq!(r1.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response_cookie(&r1, "session").is_none());
    assert_eq!(backend.repository().count().unwrap(), 0);

    backend.max_age(i64::MAX);
    let r2 = send(&app, "GET", "/count", None).await;
    assert_eq!(r2.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(backend.repository().count().unwrap(), 0);
}

#[tokio::test]
async fn sessions_with_different_names_are_independent() {
    let backend = backend();
    let first = app(&backend, "session1");
    let second = app(&backend, "session2");

    let r1 = send(&first, "GET", "/count", None).await;
    let c1 = response_cookie(&r1, "session1").unwrap();
    assert_eq!(body(r1).await, "1");
    let r2 = send(&second, "GET", "/count", None).await;
    let c2 = response_cookie(&r2, "session2").unwrap();
    assert_eq!(body(r2).await, "1");

    assert_eq!(body(send(&first, "GET", "/count", Some(&c1)).await).await, "2");
    assert_eq!(body(send(&second, "GET", "/count", Some(&c2)).await).await, "2");

    // A cookie minted for one name does not authenticate under another.
    let swapped = Cookie::new("session2", c1.value().to_string());
    assert_eq!(body(send(&second, "GET", "/count", Some(&swapped)).await).await, "1");
}

#[tokio::test]
async fn existing_session_is_reused_by_name() {
    let backend = backend();
    let app = app(&backend, "test-session");

    let r1 = send(&app, "GET", "/fresh", None).await;
    let cookie = response_cookie(&r1, "test-session").unwrap();
    send(&app, "GET", "/fresh", Some(&cookie)).await;

    assert_eq!(backend.repository().count().unwrap(), 1);
}

#[tokio::test]
async fn registry_returns_one_instance_per_request() {
    let backend = backend();
    let app = app(&backend, "session");

    let r1 = send(&app, "GET", "/registry", None).await;
    assert!(response_cookie(&r1, "session").is_some());
    assert_eq!(body(r1).await, "true:true");
    assert_eq!(backend.repository().count().unwrap(), 1);
}

#[tokio::test]
async fn rotated_keys_keep_old_cookies_valid() {
    let repo = repository();
    let old_key = KeyPair::new(b"old-hash-key".to_vec()).with_block_key(vec![7u8; 32]);
    let new_key = KeyPair::new(b"new-hash-key".to_vec()).with_block_key(vec![9u8; 16]);

    let before = backend_with(repo.clone(), &[old_key.clone()]);
    let r1 = send(&app(&before, "session"), "GET", "/count", None).await;
    let cookie = response_cookie(&r1, "session").unwrap();

    let rotated = backend_with(repo.clone(), &[new_key.clone(), old_key]);
    let r2 = send(&app(&rotated, "session"), "GET", "/count", Some(&cookie)).await;
    let rotated_cookie = response_cookie(&r2, "session").unwrap();
    assert_eq!(body(r2).await, "2");

    let retired = backend_with(repo, &[new_key]);
    let retired_app = app(&retired, "session");
    assert_eq!(body(send(&retired_app, "GET", "/count", Some(&cookie)).await).await, "1");
    // The rotated save re-encoded both the cookie and the record under the new key.
    assert_eq!(
        body(send(&retired_app, "GET", "/count", Some(&rotated_cookie)).await).await,
        "3"
    );
}

#[tokio::test]
async fn lowering_max_age_invalidates_issued_cookies() {
    let backend = backend();
    let app = app(&backend, "session");

    let r1 = send(&app, "GET", "/count", None).await;
    let cookie = response_cookie(&r1, "session").unwrap();

    backend.max_age(1);
    tokio::time::sleep(Duration::from_millis(2100)).await;

    let r2 = send(&app, "GET", "/count", Some(&cookie)).await;
    assert_eq!(body(r2).await, "1");
}

#[tokio::test]
async fn hardened_backend_issues_secure_cookies() {
    let backend = Arc::new(
        SessionBackend::hardened(repository(), &[KeyPair::new(b"secret".to_vec())]).unwrap(),
    );
    let app = app(&backend, "session");

    let r1 = send(&app, "GET", "/count", None).await;
    let cookie = response_cookie(&r1, "session").unwrap();
    assert_eq!(cookie.secure(), Some(true));
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.path(), Some("/"));
}

#[tokio::test]
async fn options_setter_applies_to_new_sessions() {
    let backend = backend();
    let mut options = backend.options();
    options.path = "/app".to_string();
    options.same_site = Some(tower_cookies::cookie::SameSite::Strict);
    backend.set_options(options.clone());
    assert_eq!(backend.options(), options);

    let app = app(&backend, "session");
    let r1 = send(&app, "GET", "/count", None).await;
    let cookie = response_cookie(&r1, "session").unwrap();
    assert_eq!(cookie.path(), Some("/app"));
    assert_eq!(cookie.same_site(), Some(tower_cookies::cookie::SameSite::Strict));
}
