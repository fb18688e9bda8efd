//! Tests for the DOCX render server
//!
//! Test categories:
//! - File naming properties
//! - HTTP endpoint behaviour with stubbed fetchers and engines
//! - The real HTTP fetcher against a loopback server

#[cfg(test)]
mod property_tests {
    use proptest::prelude::*;
    use serde_json::json;

    use crate::compose::{content_disposition, resolve_file_name, sanitize_file_name};

    const FORBIDDEN: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

    proptest! {
        /// Property: sanitized names never contain forbidden or control characters
        #[test]
        fn sanitized_names_are_clean(name in any::<String>()) {
            let clean = sanitize_file_name(&name);
            prop_assert!(!clean.contains(FORBIDDEN));
            prop_assert!(!clean.chars().any(char::is_control));
        }

        /// Property: every resolved name ends in .docx and is never just the extension
        #[test]
        fn resolved_names_have_stem_and_extension(
            output in proptest::option::of(any::<String>()),
            from_data in proptest::option::of(any::<String>()),
        ) {
            let data = match &from_data {
                Some(name) => json!({ "FileName": name }),
                None => json!({}),
            };
            let name = resolve_file_name(output.as_deref(), &data);
            prop_assert!(name.to_ascii_lowercase().ends_with(".docx"));
            prop_assert!(name.len() > ".docx".len());
        }

        /// Property: a usable outputName always wins over data.FileName
        #[test]
        fn output_name_takes_precedence(
            output in "[A-Za-z0-9 _-]{0,12}[A-Za-z0-9]",
            from_data in "[A-Za-z0-9]{1,12}",
        ) {
            let name = resolve_file_name(Some(&output), &json!({ "FileName": from_data }));
            prop_assert_eq!(name, format!("{}.docx", output.trim()));
        }

        /// Property: the disposition header value is always ASCII
        #[test]
        fn disposition_is_ascii(name in any::<String>()) {
            let header = content_disposition(&resolve_file_name(Some(&name), &json!({})));
            prop_assert!(header.is_ascii());
            prop_assert!(header.starts_with("attachment; filename=\""));
        }
    }
}

#[cfg(test)]
mod http_endpoint_tests {
    //! HTTP endpoint integration tests using axum-test

    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
    use axum_test::TestServer;
    use docx_engine::{
        extract_text, DocumentEngine, DocxEngine, EngineError, TemplatePackage, DOCX_MIME_TYPE,
    };
    use pretty_assertions::assert_eq;
    use reqwest::Url;
    use serde_json::{json, Value};

    use crate::fetch::{FetchError, TemplateFetcher};
    use crate::{build_router, AppState, RouterConfig};

    /// What the stub fetcher answers with
    enum Upstream {
        Bytes(Vec<u8>),
        Status(u16),
        Unreachable,
    }

    struct StubFetcher {
        upstream: Upstream,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TemplateFetcher for StubFetcher {
        async fn fetch(&self, location: &Url) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.upstream {
                Upstream::Bytes(bytes) => Ok(bytes.clone()),
                Upstream::Status(status) => Err(FetchError::Status {
                    url: location.to_string(),
                    status: *status,
                }),
                Upstream::Unreachable => Err(FetchError::Transport {
                    url: location.to_string(),
                    reason: "connection refused".to_string(),
                }),
            }
        }
    }

    /// Counts render calls before delegating
    struct CountingEngine {
        inner: Arc<dyn DocumentEngine>,
        calls: Arc<AtomicUsize>,
    }

    impl DocumentEngine for CountingEngine {
        fn render(&self, template: &[u8], data: &Value) -> Result<Vec<u8>, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.render(template, data)
        }
    }

    struct SlowEngine;

    impl DocumentEngine for SlowEngine {
        fn render(&self, _template: &[u8], _data: &Value) -> Result<Vec<u8>, EngineError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(Vec::new())
        }
    }

    struct BrokenEngine;

    impl DocumentEngine for BrokenEngine {
        fn render(&self, _template: &[u8], _data: &Value) -> Result<Vec<u8>, EngineError> {
            Err(EngineError::Serialize("disk full".to_string()))
        }
    }

    const TIMEOUT_MS: u64 = 5_000;

    struct Harness {
        server: TestServer,
        fetches: Arc<AtomicUsize>,
        renders: Arc<AtomicUsize>,
    }

    fn docx(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
            .collect();
        TemplatePackage::with_body(&body).save().unwrap()
    }

    fn router_config() -> RouterConfig {
        RouterConfig {
            cors: true,
            templates_dir: PathBuf::from("templates"),
        }
    }

    fn harness_with(
        upstream: Upstream,
        engine: Arc<dyn DocumentEngine>,
        api_key: Option<&str>,
        timeout_ms: u64,
        config: &RouterConfig,
    ) -> Harness {
        let fetches = Arc::new(AtomicUsize::new(0));
        let renders = Arc::new(AtomicUsize::new(0));
        let state = AppState {
            fetcher: Arc::new(StubFetcher {
                upstream,
                calls: Arc::clone(&fetches),
            }),
            engine: Arc::new(CountingEngine {
                inner: engine,
                calls: Arc::clone(&renders),
            }),
            timeout_ms,
            api_key: api_key.map(Arc::from),
        };

        Harness {
            server: TestServer::new(build_router(state, config)).unwrap(),
            fetches,
            renders,
        }
    }

    /// Create a test server whose fetcher answers with `upstream`
    fn create_test_server(upstream: Upstream) -> Harness {
        harness_with(
            upstream,
            Arc::new(DocxEngine::default()),
            None,
            TIMEOUT_MS,
            &router_config(),
        )
    }

    fn company_template() -> Upstream {
        Upstream::Bytes(docx(&["Prepared for {Company}"]))
    }

    #[tokio::test]
    async fn test_health_returns_200() {
        let harness = create_test_server(Upstream::Unreachable);
        let response = harness.server.get("/health").await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["ok"], true);
        assert_eq!(json["service"], "docx-render-server");
    }

    #[tokio::test]
    async fn test_render_company_scenario() {
        let harness = create_test_server(company_template());
        let response = harness
            .server
            .post("/render")
            .json(&json!({
                "templateLocation": "https://templates.example.com/company.docx",
                "data": { "Company": "Acme" }
            }))
            .await;

        response.assert_status_ok();
        assert_eq!(response.header(header::CONTENT_TYPE), DOCX_MIME_TYPE);
        assert_eq!(
            response.header(header::CONTENT_DISPOSITION),
            "attachment; filename=\"Filled.docx\""
        );

        let text = extract_text(response.as_bytes()).unwrap();
        assert_eq!(text, "Prepared for Acme\n");
        assert_eq!(harness.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(harness.renders.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_render_missing_company_reports_tag() {
        let harness = create_test_server(company_template());
        let response = harness
            .server
            .post("/render")
            .json(&json!({
                "templateLocation": "https://templates.example.com/company.docx",
                "data": {}
            }))
            .await;

        response.assert_status_bad_request();
        let json = response.json::<Value>();
        assert_eq!(json["error"], "template_render_error");
        assert_eq!(json["details"][0]["tag"], "Company");
        assert_eq!(json["details"][0]["id"], "undefined_tag");
        assert_eq!(json["details"][0]["part"], "word/document.xml");
        assert!(json["details"][0]["explanation"].is_string());
    }

    #[tokio::test]
    async fn test_render_reports_every_missing_tag() {
        let harness = create_test_server(Upstream::Bytes(docx(&[
            "{Title}",
            "{First} {Last}",
            "{City}",
        ])));
        let response = harness
            .server
            .post("/render")
            .json(&json!({
                "templateLocation": "https://templates.example.com/letter.docx",
                "data": { "First": "Ada" }
            }))
            .await;

        response.assert_status_bad_request();
        let json = response.json::<Value>();
        let tags: Vec<&str> = json["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["tag"].as_str().unwrap())
            .collect();
        assert_eq!(tags, vec!["Title", "Last", "City"]);
    }

    #[tokio::test]
    async fn test_render_linebreaks_in_values() {
        let harness = create_test_server(Upstream::Bytes(docx(&["{Address}"])));
        let response = harness
            .server
            .post("/render")
            .json(&json!({
                "templateLocation": "https://templates.example.com/address.docx",
                "data": { "Address": "1 Main St\nSpringfield" }
            }))
            .await;

        response.assert_status_ok();
        let text = extract_text(response.as_bytes()).unwrap();
        assert_eq!(text, "1 Main St\nSpringfield\n");
    }

    #[tokio::test]
    async fn test_bad_requests_never_fetch() {
        let harness = create_test_server(company_template());

        for body in [
            json!({ "data": { "Company": "Acme" } }),
            json!({ "templateLocation": "https://templates.example.com/t.docx" }),
            json!({ "templateLocation": "", "data": {} }),
            json!({ "templateLocation": "https://templates.example.com/t.docx", "data": [] }),
            json!({ "templateLocation": "::not a uri::", "data": {} }),
        ] {
            let response = harness.server.post("/render").json(&body).await;
            response.assert_status_bad_request();
            assert_eq!(response.json::<Value>()["error"], "bad_request");
        }

        assert_eq!(harness.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let harness = create_test_server(company_template());
        let response = harness
            .server
            .post("/render")
            .content_type("application/json")
            .bytes("{\"templateLocation\": ".into())
            .await;

        response.assert_status_bad_request();
        assert_eq!(response.json::<Value>()["error"], "bad_request");
        assert_eq!(harness.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upstream_status_is_reported_without_rendering() {
        let harness = create_test_server(Upstream::Status(404));
        let response = harness
            .server
            .post("/render")
            .json(&json!({
                "templateLocation": "https://templates.example.com/missing.docx",
                "data": {}
            }))
            .await;

        response.assert_status_bad_request();
        let json = response.json::<Value>();
        assert_eq!(json["error"], "failed_to_fetch_template");
        assert_eq!(json["status"], 404);
        assert_eq!(json["url"], "https://templates.example.com/missing.docx");
        assert_eq!(harness.renders.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_has_no_status() {
        let harness = create_test_server(Upstream::Unreachable);
        let response = harness
            .server
            .post("/render")
            .json(&json!({
                "templateLocation": "https://templates.example.com/t.docx",
                "data": {}
            }))
            .await;

        response.assert_status_bad_request();
        let json = response.json::<Value>();
        assert_eq!(json["error"], "failed_to_fetch_template");
        assert!(json.get("status").is_none());
        assert_eq!(harness.renders.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_zip_template_is_invalid_docx() {
        let harness = create_test_server(Upstream::Bytes(b"<html>not a docx</html>".to_vec()));
        let response = harness
            .server
            .post("/render")
            .json(&json!({
                "templateLocation": "https://templates.example.com/page.html",
                "data": {}
            }))
            .await;

        response.assert_status_bad_request();
        let json = response.json::<Value>();
        assert_eq!(json["error"], "invalid_docx_zip");
        assert!(json["message"].is_string());
        assert!(json.get("details").is_none());
    }

    #[tokio::test]
    async fn test_legacy_field_names_and_file_name() {
        let harness = create_test_server(company_template());
        let response = harness
            .server
            .post("/render")
            .json(&json!({
                "templateUrl": "https://templates.example.com/company.docx",
                "data": { "Company": "Acme", "FileName": "Ignored" },
                "fileName": "Report: Q1"
            }))
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.header(header::CONTENT_DISPOSITION),
            "attachment; filename=\"Report Q1.docx\""
        );
    }

    #[tokio::test]
    async fn test_file_name_from_data() {
        let harness = create_test_server(company_template());
        let response = harness
            .server
            .post("/render")
            .json(&json!({
                "templateLocation": "https://templates.example.com/company.docx",
                "data": { "Company": "Acme", "FileName": "Offer Acme" }
            }))
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.header(header::CONTENT_DISPOSITION),
            "attachment; filename=\"Offer Acme.docx\""
        );
    }

    #[tokio::test]
    async fn test_api_key_required_when_configured() {
        let harness = harness_with(
            company_template(),
            Arc::new(DocxEngine::default()),
            Some("s3cret"),
            TIMEOUT_MS,
            &router_config(),
        );
        let body = json!({
            "templateLocation": "https://templates.example.com/company.docx",
            "data": { "Company": "Acme" }
        });
        let key = HeaderName::from_static("x-api-key");

        let response = harness.server.post("/render").json(&body).await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["error"], "unauthorized");

        let response = harness
            .server
            .post("/render")
            .add_header(key.clone(), HeaderValue::from_static("wrong"))
            .json(&body)
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(harness.fetches.load(Ordering::SeqCst), 0);

        let response = harness
            .server
            .post("/render")
            .add_header(key, HeaderValue::from_static("s3cret"))
            .json(&body)
            .await;
        response.assert_status_ok();

        harness.server.get("/health").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_render_timeout_is_server_error() {
        let harness = harness_with(
            company_template(),
            Arc::new(SlowEngine),
            None,
            50,
            &router_config(),
        );
        let response = harness
            .server
            .post("/render")
            .json(&json!({
                "templateLocation": "https://templates.example.com/company.docx",
                "data": {}
            }))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.json::<Value>()["error"], "server_error");
    }

    #[tokio::test]
    async fn test_serialize_failure_is_server_error() {
        let harness = harness_with(
            company_template(),
            Arc::new(BrokenEngine),
            None,
            TIMEOUT_MS,
            &router_config(),
        );
        let response = harness
            .server
            .post("/render")
            .json(&json!({
                "templateLocation": "https://templates.example.com/company.docx",
                "data": {}
            }))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let json = response.json::<Value>();
        assert_eq!(json["error"], "server_error");
        assert_eq!(json["message"], "Internal error: disk full");
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let harness = create_test_server(company_template());
        let response = harness
            .server
            .method(Method::OPTIONS, "/render")
            .add_header(header::ORIGIN, HeaderValue::from_static("https://app.example.com"))
            .add_header(
                header::ACCESS_CONTROL_REQUEST_METHOD,
                HeaderValue::from_static("POST"),
            )
            .add_header(
                header::ACCESS_CONTROL_REQUEST_HEADERS,
                HeaderValue::from_static("content-type,x-api-key"),
            )
            .await;

        response.assert_status_ok();
        assert_eq!(response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN), "*");
        assert_eq!(harness.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cors_can_be_disabled() {
        let config = RouterConfig {
            cors: false,
            ..router_config()
        };
        let harness = harness_with(
            Upstream::Unreachable,
            Arc::new(DocxEngine::default()),
            None,
            TIMEOUT_MS,
            &config,
        );
        let response = harness
            .server
            .get("/health")
            .add_header(header::ORIGIN, HeaderValue::from_static("https://app.example.com"))
            .await;

        response.assert_status_ok();
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn test_templates_are_served_with_long_cache() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = docx(&["{Company}"]);
        std::fs::write(dir.path().join("company.docx"), &bytes).unwrap();

        let config = RouterConfig {
            cors: true,
            templates_dir: dir.path().to_path_buf(),
        };
        let harness = harness_with(
            Upstream::Unreachable,
            Arc::new(DocxEngine::default()),
            None,
            TIMEOUT_MS,
            &config,
        );

        let response = harness.server.get("/templates/company.docx").await;
        response.assert_status_ok();
        assert_eq!(response.as_bytes().as_ref(), bytes.as_slice());
        assert_eq!(
            response.header(header::CACHE_CONTROL),
            "public, max-age=31536000, immutable"
        );

        harness
            .server
            .get("/templates/missing.docx")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}

#[cfg(test)]
mod fetcher_tests {
    //! The reqwest-backed fetcher against a local axum server

    use std::net::SocketAddr;
    use std::time::Duration;

    use axum::{http::StatusCode, response::Redirect, routing::get, Router};
    use reqwest::Url;

    use crate::fetch::{FetchError, HttpFetcher, LocationPolicy, TemplateFetcher};

    async fn spawn_upstream() -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Same server, reached through a host name instead of the IP
        let elsewhere = format!("http://localhost:{}/template.docx", addr.port());
        let app = Router::new()
            .route("/template.docx", get(|| async { b"PK-template".to_vec() }))
            .route("/gone.docx", get(|| async { StatusCode::GONE }))
            .route(
                "/moved.docx",
                get(|| async { Redirect::temporary("/template.docx") }),
            )
            .route(
                "/elsewhere.docx",
                get(move || async move { Redirect::temporary(&elsewhere) }),
            );

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn fetcher(policy: LocationPolicy) -> HttpFetcher {
        HttpFetcher::new(Duration::from_secs(5), policy).unwrap()
    }

    fn url(addr: SocketAddr, path: &str) -> Url {
        Url::parse(&format!("http://{}{}", addr, path)).unwrap()
    }

    #[tokio::test]
    async fn test_fetches_template_bytes() {
        let addr = spawn_upstream().await;
        let bytes = fetcher(LocationPolicy::default())
            .fetch(&url(addr, "/template.docx"))
            .await
            .unwrap();
        assert_eq!(bytes, b"PK-template".to_vec());
    }

    #[tokio::test]
    async fn test_non_success_status_is_reported() {
        let addr = spawn_upstream().await;
        let location = url(addr, "/gone.docx");
        let err = fetcher(LocationPolicy::default())
            .fetch(&location)
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(410));
        assert_eq!(err.into_url(), location.to_string());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = fetcher(LocationPolicy::default())
            .fetch(&url(addr, "/template.docx"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_redirect_within_allowed_host_is_followed() {
        let addr = spawn_upstream().await;
        let bytes = fetcher(LocationPolicy::new(["127.0.0.1"]))
            .fetch(&url(addr, "/moved.docx"))
            .await
            .unwrap();
        assert_eq!(bytes, b"PK-template".to_vec());
    }

    #[tokio::test]
    async fn test_redirect_to_unlisted_host_is_refused() {
        let addr = spawn_upstream().await;
        let location = url(addr, "/elsewhere.docx");
        let err = fetcher(LocationPolicy::new(["127.0.0.1"]))
            .fetch(&location)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Transport { .. }));
        assert_eq!(err.status(), None);
        assert_eq!(err.into_url(), location.to_string());
    }

    #[tokio::test]
    async fn test_oversized_template_is_refused() {
        let addr = spawn_upstream().await;
        let err = fetcher(LocationPolicy::default())
            .with_max_bytes(4)
            .fetch(&url(addr, "/template.docx"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::TooLarge { limit: 4, .. }));
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_template_at_the_size_limit_is_accepted() {
        let addr = spawn_upstream().await;
        let bytes = fetcher(LocationPolicy::default())
            .with_max_bytes(b"PK-template".len())
            .fetch(&url(addr, "/template.docx"))
            .await
            .unwrap();
        assert_eq!(bytes.len(), 11);
    }

    #[tokio::test]
    async fn test_allow_list_blocks_before_connecting() {
        let addr = spawn_upstream().await;
        let err = fetcher(LocationPolicy::new(["templates.example.com"]))
            .fetch(&url(addr, "/template.docx"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NotAllowed { .. }));
    }
}
