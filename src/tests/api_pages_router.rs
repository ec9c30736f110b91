use crate::database::PageRepository;
use crate::domain::ContentHash;
use crate::features::pages::pages_router;
use crate::tests::mocks::{Fixture, MockLauncher, MockOutcome, MockRepository, block};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app(fixture: &Fixture) -> Router {
    // build the real router but plug in the fixture's mocked state
    pages_router().with_state(fixture.state.clone())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>, Option<String>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap().to_string());
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, body.to_vec(), content_type)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn with_json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn as_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_preview_by_hash() {
    let fixture = Fixture::new();
    let (_page, version) = fixture.seed(vec![block("<p>Hello</p>", &["/a.js"])]).await;

    let response = app(&fixture)
        .oneshot(get(&format!("/pages/preview/{}", version.hash)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["cache-control"], "no-cache");
    assert!(response.headers().contains_key("etag"));
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("<p>Hello</p>"));
    assert!(html.contains("<script src=\"/a.js\" async></script>"));
}

fn etag_of(response: &axum::response::Response) -> String {
    response.headers()["etag"].to_str().unwrap().to_string()
}

// the hash only names the blocks: a title edit changes the page under the same
// URL, so the response must be revalidated rather than cached for good
#[tokio::test]
async fn test_preview_revalidates_when_page_changes_under_same_hash() {
    let fixture = Fixture::new();
    let contents = vec![block("<p>Hello</p>", &[])];
    let (_page, draft) = fixture.seed(contents.clone()).await;
    let uri = format!("/pages/preview/{}", draft.hash);

    let before = app(&fixture).oneshot(get(&uri)).await.unwrap();
    assert_eq!(before.status(), StatusCode::OK);
    let cache_control = before.headers()["cache-control"].to_str().unwrap().to_string();
    assert!(!cache_control.contains("immutable"));
    assert!(!cache_control.contains("max-age=31536000"));
    let etag_before = etag_of(&before);

    let saved = fixture
        .state
        .saves
        .save(
            draft.id,
            crate::domain::VersionEdit {
                title: "Renamed".to_string(),
                description: None,
                contents,
            },
        )
        .await
        .unwrap();
    assert_eq!(saved.hash, draft.hash);

    let after = app(&fixture).oneshot(get(&uri)).await.unwrap();
    assert_eq!(after.status(), StatusCode::OK);
    assert_ne!(etag_of(&after), etag_before);

    // a cache still holding the old page is told to refetch it
    let stale = Request::builder()
        .uri(&uri)
        .header("if-none-match", &etag_before)
        .body(Body::empty())
        .unwrap();
    let (status, body, _) = send(app(&fixture), stale).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("<title>Renamed</title>"));
}

#[tokio::test]
async fn test_preview_not_modified_for_current_etag() {
    let fixture = Fixture::new();
    let (_page, version) = fixture.seed(vec![block("<p>Hello</p>", &[])]).await;
    let uri = format!("/pages/preview/{}", version.hash);

    let first = app(&fixture).oneshot(get(&uri)).await.unwrap();
    let etag = etag_of(&first);

    let conditional = Request::builder()
        .uri(&uri)
        .header("if-none-match", format!("\"other\", W/{}", etag))
        .body(Body::empty())
        .unwrap();
    let response = app(&fixture).oneshot(conditional).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(etag_of(&response), etag);
    let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    assert!(body.is_empty());
}

// hex is case-insensitive
#[tokio::test]
async fn test_preview_hash_accepts_uppercase() {
    let fixture = Fixture::new();
    let (_page, version) = fixture.seed(vec![block("<p>Hello</p>", &[])]).await;

    let uri = format!("/pages/preview/{}", version.hash.as_str().to_ascii_uppercase());
    let (status, _, _) = send(app(&fixture), get(&uri)).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_preview_unknown_and_malformed_hash() {
    let fixture = Fixture::new();
    fixture.seed(vec![block("<p>Hello</p>", &[])]).await;
    let unknown = ContentHash::compute(&[block("<p>nobody</p>", &[])]);

    let (status, body, _) = send(app(&fixture), get(&format!("/pages/preview/{}", unknown))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(as_json(&body)["code"], "NOT_FOUND");

    let (status, body, _) = send(app(&fixture), get("/pages/preview/not-a-hash")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(as_json(&body)["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_preview_png() {
    let fixture = Fixture::new();
    let (_page, version) = fixture.seed(vec![block("<p>Hello</p>", &[])]).await;

    let (status, body, content_type) =
        send(app(&fixture), get(&format!("/pages/preview/{}.png", version.id))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));
    assert_eq!(image::guess_format(&body).unwrap(), image::ImageFormat::Png);

    // the browser was pointed at the version's own hash-addressed preview
    let visited = fixture.launcher.visited.lock().unwrap().clone();
    assert_eq!(
        visited,
        vec![format!("http://127.0.0.1:3000/pages/preview/{}", version.hash)]
    );
}

#[tokio::test]
async fn test_preview_png_errors() {
    let fixture = Fixture::with_parts(
        MockRepository::new(),
        MockLauncher::scripted(&[MockOutcome::LaunchFailure]),
    );
    let (_page, version) = fixture.seed(vec![]).await;

    let (status, _, _) = send(
        app(&fixture),
        get(&format!("/pages/preview/{}.png", uuid::Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body, _) = send(app(&fixture), get("/pages/preview/garbage.png")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(as_json(&body)["code"], "NOT_FOUND");

    // a broken browser is a gateway failure, and its details stay out of the body
    let (status, body, _) =
        send(app(&fixture), get(&format!("/pages/preview/{}.png", version.id))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let json = as_json(&body);
    assert_eq!(json["code"], "CAPTURE_ERROR");
    assert!(!json["error"].as_str().unwrap().contains("no browser binary"));
}

#[tokio::test]
async fn test_editable_frame() {
    let fixture = Fixture::new();
    let (_page, version) = fixture.seed(vec![block("<p>Hello</p>", &[])]).await;

    let (status, body, content_type) = send(
        app(&fixture),
        get(&format!("/pages/page-editor/{}.html", version.id)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/html"));
    let html = String::from_utf8(body).unwrap();
    assert_eq!(html.matches("<style type=\"text/css\">").count(), 1);
    assert!(html.contains("<p>Hello</p>"));
}

#[tokio::test]
async fn test_editable_frame_not_found() {
    let fixture = Fixture::new();

    for uri in [
        format!("/pages/page-editor/{}.html", uuid::Uuid::new_v4()),
        "/pages/page-editor/not-a-uuid.html".to_string(),
        format!("/pages/page-editor/{}", uuid::Uuid::new_v4()),
    ] {
        let (status, _, _) = send(app(&fixture), get(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn test_rendering_failure_is_a_server_error() {
    let fixture = Fixture::new();
    let (_page, version) = fixture.seed(vec![]).await;
    fixture.templates.files.lock().unwrap().clear();

    let (status, body, _) = send(
        app(&fixture),
        get(&format!("/pages/page-editor/{}.html", version.id)),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json = as_json(&body);
    assert_eq!(json["code"], "RENDERING_ERROR");
    // no template names or paths leak out
    assert!(!json["error"].as_str().unwrap().contains("default.html"));
}

// the editor flow: create a page, draft it, save, publish, preview
#[tokio::test]
async fn test_editor_workflow() {
    let fixture = Fixture::new();

    let (status, body, _) = send(
        app(&fixture),
        with_json("POST", "/api/pages", json!({"label": "Home", "template": "default.html"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let page_id = as_json(&body)["id"].as_str().unwrap().to_string();

    let (status, body, _) = send(
        app(&fixture),
        Request::builder()
            .method("POST")
            .uri(format!("/api/pages/{}/drafts", page_id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let draft = as_json(&body);
    let version_id = draft["id"].as_str().unwrap().to_string();
    assert_eq!(draft["status"], "draft");

    let (status, body, _) = send(
        app(&fixture),
        with_json(
            "PUT",
            &format!("/api/page-versions/{}", version_id),
            json!({
                "title": "Home",
                "contents": [
                    {"markup": "<p>Hello</p>", "assets": ["/a.js"]},
                    {"markup": "<p>World</p>", "assets": ["/a.js"]}
                ]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let saved = as_json(&body);
    assert_eq!(saved["contents"].as_array().unwrap().len(), 2);
    assert!(saved["contents"][0]["id"].is_string());

    let (status, body, _) = send(
        app(&fixture),
        Request::builder()
            .method("POST")
            .uri(format!("/api/page-versions/{}/publish", version_id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let published = as_json(&body);
    assert_eq!(published["status"], "published");
    assert_eq!(published["hash"], saved["hash"]);

    let preview_url = published["preview_url"].as_str().unwrap().to_string();
    let (status, body, _) = send(app(&fixture), get(&preview_url)).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.find("<p>Hello</p>").unwrap() < html.find("<p>World</p>").unwrap());
    assert_eq!(html.matches("<script src=\"/a.js\" async>").count(), 1);

    let (status, body, _) =
        send(app(&fixture), get(&format!("/api/pages/{}/versions", page_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body).as_array().unwrap().len(), 1);

    // published versions are frozen
    let (status, body, _) = send(
        app(&fixture),
        with_json(
            "PUT",
            &format!("/api/page-versions/{}", version_id),
            json!({"title": "Changed", "contents": []}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(as_json(&body)["code"], "CONFLICT");
}

#[tokio::test]
async fn test_discard_draft() {
    let fixture = Fixture::new();
    let (_page, draft) = fixture.seed(vec![block("<p>temp</p>", &[])]).await;

    let delete = |id: String| {
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/page-versions/{}", id))
            .body(Body::empty())
            .unwrap()
    };

    let (status, _, _) = send(app(&fixture), delete(draft.id.to_string())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(fixture.repo.find_version_by_id(draft.id).await.unwrap().is_none());

    let (status, _, _) = send(app(&fixture), delete(draft.id.to_string())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_payloads() {
    let fixture = Fixture::new();
    let (_page, draft) = fixture.seed(vec![]).await;

    let (status, body, _) = send(
        app(&fixture),
        with_json("POST", "/api/pages", json!({"label": "", "template": "default.html"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(as_json(&body)["code"], "BAD_REQUEST");

    let repeated = uuid::Uuid::new_v4();
    let (status, _, _) = send(
        app(&fixture),
        with_json(
            "PUT",
            &format!("/api/page-versions/{}", draft.id),
            json!({
                "title": "Twice",
                "contents": [
                    {"id": repeated, "markup": "<p>a</p>"},
                    {"id": repeated, "markup": "<p>b</p>"}
                ]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(
        app(&fixture),
        Request::builder()
            .method("POST")
            .uri(format!("/api/pages/{}/drafts", uuid::Uuid::new_v4()))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
