mod common;

use axum::body::Body;
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS,
    ACCESS_CONTROL_REQUEST_METHOD, VARY,
};
use http::{Method, StatusCode};
use serde_json::json;

use ::common::snapshot::Snapshot;

use common::*;

#[tokio::test]
async fn test_allowed_origin_gets_cors_headers() {
    let app = setup_app().await;
    put(&app, "/storage/notes/a", "text/plain", "hi").await;

    let request = from_origin(
        authed(Method::GET, "/storage/notes/a", OWNER_TOKEN),
        GOOD_ORIGIN,
    )
    .body(Body::empty())
    .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, ACCESS_CONTROL_ALLOW_ORIGIN), GOOD_ORIGIN);
    assert_eq!(header(&response, VARY), "Origin");
    assert!(header(&response, ACCESS_CONTROL_EXPOSE_HEADERS).contains("ETag"));
}

#[tokio::test]
async fn test_same_origin_passes_through() {
    let app = setup_app().await;

    let response = put(&app, "/storage/notes/a", "text/plain", "hi").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(header(&response, VARY), "Origin");
    assert!(response
        .headers()
        .get(ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn test_disallowed_origin_is_rejected_before_dispatch() {
    let app = setup_app().await;

    let request = from_origin(
        authed(Method::PUT, "/storage/notes/a", OWNER_TOKEN),
        EVIL_ORIGIN,
    )
    .body(Body::from("pwned"))
    .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(header(&response, VARY), "Origin");
    assert!(response
        .headers()
        .get(ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());

    let request = authed(Method::GET, "/storage/notes/a", OWNER_TOKEN)
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_preflight() {
    let app = setup_app().await;
    put(&app, "/storage/notes/a", "text/plain", "hi").await;

    // creating a document is a preflight on a missing target
    let request = from_origin(anonymous(Method::OPTIONS, "/storage/notes/new"), GOOD_ORIGIN)
        .header(ACCESS_CONTROL_REQUEST_METHOD, "PUT")
        .header(ACCESS_CONTROL_REQUEST_HEADERS, "authorization, content-type")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(header(&response, ACCESS_CONTROL_ALLOW_ORIGIN), GOOD_ORIGIN);
    assert!(header(&response, ACCESS_CONTROL_ALLOW_METHODS).contains("PUT"));
    assert!(header(&response, ACCESS_CONTROL_ALLOW_HEADERS).contains("if-match"));
    assert_eq!(header(&response, ACCESS_CONTROL_MAX_AGE), "3600");
    assert_eq!(header(&response, VARY), "Origin");

    let request = from_origin(anonymous(Method::OPTIONS, "/storage/notes/a"), GOOD_ORIGIN)
        .header(ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_preflight_denials() {
    let app = setup_app().await;
    put(&app, "/storage/notes/a", "text/plain", "hi").await;

    let cases = [
        // unknown origin
        (EVIL_ORIGIN, "/storage/notes/a", "GET", None),
        // reading something that is not there
        (GOOD_ORIGIN, "/storage/notes/missing", "GET", None),
        // folder path over a document
        (GOOD_ORIGIN, "/storage/notes/a/", "GET", None),
        (GOOD_ORIGIN, "/storage/notes/a", "PATCH", None),
        (GOOD_ORIGIN, "/storage/notes/a", "GET", Some("x-custom")),
    ];

    for (origin, uri, method, extra_header) in cases {
        let mut builder = from_origin(anonymous(Method::OPTIONS, uri), origin)
            .header(ACCESS_CONTROL_REQUEST_METHOD, method);
        if let Some(name) = extra_header {
            builder = builder.header(ACCESS_CONTROL_REQUEST_HEADERS, name);
        }
        let response = send(&app, builder.body(Body::empty()).unwrap()).await;
        assert_eq!(
            response.status(),
            StatusCode::FORBIDDEN,
            "{} {} {} {:?}",
            origin,
            uri,
            method,
            extra_header
        );
        assert_eq!(header(&response, VARY), "Origin");
        assert!(response
            .headers()
            .get(ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }
}

#[tokio::test]
async fn test_preflight_checks_origin_before_target() {
    let state = setup_state().await;
    // imported under another instance, so its tag is stale and its bytes
    // were never written
    let snapshot: Snapshot = serde_json::from_value(json!({
        "salt_fingerprint": "another-instance",
        "documents": [{
            "path": "/notes/a",
            "storage_ref": uuid::Uuid::new_v4().simple().to_string(),
            "mime": "text/plain",
            "length": 2,
            "last_modified": "2024-01-01T00:00:00Z",
        }],
    }))
    .unwrap();
    state.drive().import(snapshot).unwrap();
    let app = app(state);

    for uri in ["/storage/notes/", "/storage/notes/a"] {
        let request = from_origin(anonymous(Method::OPTIONS, uri), EVIL_ORIGIN)
            .header(ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(header(&response, VARY), "Origin");
        assert!(body_bytes(response).await.is_empty());
    }

    // an allowed origin only needs the target's shape, not its bytes
    let request = from_origin(anonymous(Method::OPTIONS, "/storage/notes/"), GOOD_ORIGIN)
        .header(ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status(), StatusCode::NO_CONTENT);
}
