//! End-to-end request flow through the protocol layer

mod common;

use bytes::Bytes;
use futures::TryStreamExt;
use http::Method;

use ::common::auth::{FixedPrincipal, Permission};
use ::common::prelude::*;
use ::common::protocol::{self, FolderDescription};

const OWNER: FixedPrincipal = FixedPrincipal(Permission::ReadWrite);

async fn send(drive: &Drive, request: Request) -> Result<Outcome, ProtocolError> {
    protocol::handle(drive, request, Some(&OWNER)).await
}

#[tokio::test]
async fn test_document_lifecycle() {
    let (drive, _temp) = common::setup_test_env().await;
    let a = common::path("/Documents/a.txt");
    let documents = common::path("/Documents/");

    // create
    let request = Request::new(Method::PUT, a.clone()).with_body(Some("text/plain"), "hello");
    let Outcome::Stored { version: v1, created } = send(&drive, request).await.unwrap() else {
        panic!("expected stored");
    };
    assert!(created);

    // listed with the same tag
    let Outcome::Listing(listing) = send(&drive, Request::new(Method::GET, documents.clone()))
        .await
        .unwrap()
    else {
        panic!("expected listing");
    };
    let description = FolderDescription::from(&listing);
    assert_eq!(description.items["a.txt"].etag, v1.to_string());
    assert_eq!(description.items["a.txt"].content_length, Some(5));

    // read back
    let Outcome::Document { info, body } = send(&drive, Request::new(Method::GET, a.clone()))
        .await
        .unwrap()
    else {
        panic!("expected document");
    };
    assert_eq!(info.mime, "text/plain");
    let chunks: Vec<Bytes> = body.unwrap().try_collect().await.unwrap();
    assert_eq!(chunks.concat(), b"hello");

    // conditional update
    let request = Request::new(Method::PUT, a.clone())
        .with_conditions(Conditions::if_match(&v1))
        .with_body(Some("text/plain"), "hello!");
    let Outcome::Stored { version: v2, created } = send(&drive, request).await.unwrap() else {
        panic!("expected stored");
    };
    assert!(!created);
    assert_ne!(v1, v2);

    // conditional delete returns the prior tag
    let request = Request::new(Method::DELETE, a.clone()).with_conditions(Conditions::if_match(&v2));
    let Outcome::Deleted { version } = send(&drive, request).await.unwrap() else {
        panic!("expected deleted");
    };
    assert_eq!(version, v2);

    // the emptied folder is gone
    let err = send(&drive, Request::new(Method::GET, documents)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_not_modified_skips_content_store() {
    let (drive, _temp) = common::setup_test_env().await;
    let version = common::put(&drive, "/doc", b"cached").await;

    // a missing blob would fail the read, so a 304 proves nothing was opened
    let info = drive.document(&common::path("/doc")).await.unwrap();
    drive.store().remove(&info.storage_ref).await.unwrap();

    let request = Request::new(Method::GET, common::path("/doc"))
        .with_conditions(Conditions::if_none_match(&version));
    assert!(matches!(
        send(&drive, request).await.unwrap(),
        Outcome::NotModified { .. }
    ));

    let err = send(&drive, Request::new(Method::GET, common::path("/doc")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[tokio::test]
async fn test_public_documents_are_world_readable() {
    let (drive, _temp) = common::setup_test_env().await;
    common::put(&drive, "/public/photos/cat.jpg", b"meow").await;

    let request = Request::new(Method::GET, common::path("/public/photos/cat.jpg"));
    assert!(protocol::handle(&drive, request, None).await.is_ok());

    let request = Request::new(Method::GET, common::path("/public/photos/"));
    let err = protocol::handle(&drive, request, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let scoped = ScopedPrincipal::parse(&["photos:r"]).unwrap();
    let request = Request::new(Method::GET, common::path("/public/photos/"));
    assert!(protocol::handle(&drive, request, Some(&scoped)).await.is_ok());
    let request = Request::new(Method::PUT, common::path("/public/photos/dog.jpg"));
    let err = protocol::handle(&drive, request, Some(&scoped)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}
