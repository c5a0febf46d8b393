//! Admin document endpoints against mocked RAG service and web pages

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{spawn_app, spawn_app_with};

#[tokio::test]
async fn small_text_upload_becomes_one_processed_chunk() {
    let app = spawn_app().await;
    let (token, _) = app.register("admin").await;
    let text = "x".repeat(50);

    let response = app.upload(&token, "notes.txt", "text/plain", text.as_bytes()).await;

    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
    let document = response.json();
    let id = document["id"].as_str().unwrap().to_string();
    assert_eq!(document["status"], "processed");
    assert_eq!(document["chunk_count"], 1);
    assert_eq!(document["source"], "file");
    assert_eq!(document["name"], "notes.txt");

    let ingests = app.rag_requests("/ingest").await;
    assert_eq!(ingests.len(), 1);
    assert_eq!(ingests[0]["ids"], json!([format!("{}_0", id)]));
    assert_eq!(ingests[0]["documents"], json!([text]));

    let locator = document["locator"].as_str().unwrap();
    assert!(Path::new(locator).starts_with(app.dir.path()));
    assert!(locator.ends_with("-notes.txt"));
}

#[tokio::test]
async fn long_text_is_split_into_ordered_chunks() {
    let app = spawn_app().await;
    let (token, _) = app.register("admin").await;
    let text = format!("{}{}{}", "a".repeat(1000), "b".repeat(1000), "c".repeat(10));

    let response = app.upload(&token, "long.txt", "text/plain", text.as_bytes()).await;
    assert_eq!(response.status, StatusCode::CREATED);
    let id = response.json()["id"].as_str().unwrap().to_string();

    let ingests = app.rag_requests("/ingest").await;
    let ids: Vec<String> = serde_json::from_value(ingests[0]["ids"].clone()).unwrap();
    let documents: Vec<String> = serde_json::from_value(ingests[0]["documents"].clone()).unwrap();
    assert_eq!(ids, vec![format!("{id}_0"), format!("{id}_1"), format!("{id}_2")]);
    assert_eq!(documents.concat(), text);
    assert!(documents.iter().all(|d| d.chars().count() <= 1000));
}

#[tokio::test]
async fn disallowed_type_is_rejected_before_any_record() {
    let app = spawn_app().await;
    let (token, _) = app.register("admin").await;

    let response = app.upload(&token, "photo.png", "image/png", &[0u8; 64]).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_message(), "Only PDF and TXT files are allowed");
    assert!(app.state.documents().list_documents().unwrap().is_empty());
    assert!(app.rag_requests("/ingest").await.is_empty());
}

#[tokio::test]
async fn oversize_upload_is_rejected_before_any_record() {
    let app = spawn_app_with(|config| config.upload.max_file_size = 1024).await;
    let (token, _) = app.register("admin").await;

    // Within the transport allowance, caught by validation
    let response = app.upload(&token, "big.txt", "text/plain", &[b'a'; 2048]).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_message(), "File too large. Max size is 1MB.");

    // Beyond the transport limit
    let response = app
        .upload(&token, "huge.txt", "text/plain", &vec![b'a'; 256 * 1024])
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_message(), "File too large. Max size is 1MB.");

    assert!(app.state.documents().list_documents().unwrap().is_empty());
    assert!(app.rag_requests("/ingest").await.is_empty());
}

#[tokio::test]
async fn upload_requires_admin() {
    let app = spawn_app().await;
    let _ = app.register("admin").await;
    let (user_token, user) = app.register("reader").await;
    assert_eq!(user["is_admin"], false);

    let response = app.upload(&user_token, "a.txt", "text/plain", b"hello").await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app.request(Method::GET, "/api/admin/documents", None, None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app
        .request(Method::GET, "/api/admin/documents", Some("bogus"), None)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_file_field_is_rejected() {
    let app = spawn_app().await;
    let (token, _) = app.register("admin").await;

    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/api/admin/upload")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "multipart/form-data; boundary=kbchatboundary")
        .body(axum::body::Body::from(common::multipart_body(
            "attachment",
            "a.txt",
            "text/plain",
            b"hello",
        )))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_message(), "No file uploaded");
}

#[tokio::test]
async fn indexing_failure_marks_document_failed_and_keeps_file() {
    let app = spawn_app().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .mount(&app.rag)
        .await;
    let (token, _) = app.register("admin").await;

    let response = app.upload(&token, "notes.txt", "text/plain", b"some text").await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    let body = response.json();
    assert_eq!(body["error"]["message"], "Document stored but indexing failed");
    assert_eq!(body["document"]["status"], "failed");
    let locator = body["document"]["locator"].as_str().unwrap();
    assert!(Path::new(locator).exists());

    let listed = app.state.documents().list_documents().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].document.status.as_str(), "failed");
}

async fn page_server(html: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(html.to_string()),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn scraped_page_is_indexed_without_chrome() {
    let app = spawn_app().await;
    let (token, _) = app.register("admin").await;
    let page = page_server(
        "<html><head><style>p{}</style></head><body><nav>Menu</nav>\
         <p>Opening   hours are</p><p>9 to 5.</p><script>track()</script>\
         <footer>Copyright</footer></body></html>",
    )
    .await;
    let url = format!("{}/page", page.uri());

    let response = app
        .request(Method::POST, "/api/admin/scrape", Some(&token), Some(json!({ "url": url })))
        .await;

    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
    let document = response.json();
    assert_eq!(document["status"], "processed");
    assert_eq!(document["source"], "url");
    assert_eq!(document["locator"], url);

    let ingests = app.rag_requests("/ingest").await;
    assert_eq!(ingests[0]["documents"], json!(["Opening hours are 9 to 5."]));
}

#[tokio::test]
async fn empty_page_fails_without_ingest_call() {
    let app = spawn_app().await;
    let (token, _) = app.register("admin").await;
    let page = page_server("<html><body><script>only()</script><nav> </nav></body></html>").await;

    let response = app
        .request(
            Method::POST,
            "/api/admin/scrape",
            Some(&token),
            Some(json!({ "url": format!("{}/page", page.uri()) })),
        )
        .await;

    assert_eq!(response.error_message(), "No readable content found at the URL");
    assert_eq!(response.json()["document"]["status"], "failed");
    assert!(app.rag_requests("/ingest").await.is_empty());
}

#[tokio::test]
async fn scrape_requires_url() {
    let app = spawn_app().await;
    let (token, _) = app.register("admin").await;

    let response = app
        .request(Method::POST, "/api/admin/scrape", Some(&token), Some(json!({})))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_message(), "URL is required");
    assert!(app.state.documents().list_documents().unwrap().is_empty());
}

#[tokio::test]
async fn delete_removes_file_record_and_resets_index() {
    let app = spawn_app().await;
    let (token, _) = app.register("admin").await;
    let document = app.upload(&token, "a.txt", "text/plain", b"hello").await.json();
    let id = document["id"].as_str().unwrap();
    let locator = document["locator"].as_str().unwrap().to_string();

    let response = app
        .request(Method::DELETE, &format!("/api/admin/documents/{}", id), Some(&token), None)
        .await;

    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    assert!(!Path::new(&locator).exists());
    assert!(app.state.documents().list_documents().unwrap().is_empty());
    assert_eq!(app.rag_requests("/reset").await.len(), 1);
}

#[tokio::test]
async fn delete_unknown_document_is_not_found() {
    let app = spawn_app().await;
    let (token, _) = app.register("admin").await;
    let _ = app.upload(&token, "a.txt", "text/plain", b"hello").await;

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/admin/documents/{}", uuid::Uuid::new_v4()),
            Some(&token),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(app.state.documents().list_documents().unwrap().len(), 1);
    assert!(app.rag_requests("/reset").await.is_empty());
}

#[tokio::test]
async fn list_is_newest_first_with_uploader_and_progress() {
    let app = spawn_app().await;
    let (token, _) = app.register("admin").await;
    let first = app.upload(&token, "first.txt", "text/plain", b"one").await.json();
    let second = app.upload(&token, "second.txt", "text/plain", b"two").await.json();

    let listed = app
        .request(Method::GET, "/api/admin/documents", Some(&token), None)
        .await
        .json();
    assert_eq!(listed[0]["id"], second["id"]);
    assert_eq!(listed[1]["id"], first["id"]);
    assert_eq!(listed[0]["uploaded_by_username"], "admin");

    let progress = app
        .request(
            Method::GET,
            &format!("/api/admin/documents/{}/progress", first["id"].as_str().unwrap()),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(progress.status, StatusCode::OK);
    assert_eq!(progress.json()["stage"], "processed");
}

#[tokio::test]
async fn abandoned_upload_still_finishes() {
    let app = spawn_app().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_millis(500)))
        .with_priority(1)
        .mount(&app.rag)
        .await;
    let (token, _) = app.register("admin").await;

    let upload = app.upload(&token, "slow.txt", "text/plain", b"slow to index");
    let abandoned =
        tokio::time::timeout(std::time::Duration::from_millis(150), upload).await;
    assert!(abandoned.is_err());

    let mut status = None;
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let listed = app.state.documents().list_documents().unwrap();
        if let Some(view) = listed.first().filter(|v| v.document.status.is_terminal()) {
            status = Some(view.document.status.as_str());
            break;
        }
    }

    assert_eq!(status, Some("processed"));
    assert_eq!(app.rag_requests("/ingest").await.len(), 1);
}
