//! End-to-end tests of the simple repository routes.

mod common;

use axum::http::StatusCode;
use common::*;
use regex::Regex;
use simple_pypi_server::digest::sha1_hash;
use simple_pypi_server::server::REBUILD_CONFIRMATION;
use simple_pypi_server::{DigestAlgorithm, ScanPolicy};

#[tokio::test]
async fn test_demo_wheel_and_sdist_are_indexed() {
    let setup = create_test_setup(&demo_files()).unwrap();

    let root = setup.server.get("/simple").await;
    root.assert_status_ok();
    assert_eq!(hrefs(&root.text()), vec!["/simple/demo"]);

    let page = setup.server.get("/simple/demo").await;
    page.assert_status_ok();
    let links = hrefs(&page.text());
    assert_eq!(links.len(), 2);

    let link = Regex::new(r"^/simple/demo-1\.0[^#]*#sha1=[0-9a-f]{40}$").unwrap();
    for href in &links {
        assert!(link.is_match(href), "unexpected link {href}");
    }
    assert!(links.contains(&format!(
        "/simple/{DEMO_SDIST}#sha1={}",
        sha1_hash(DEMO_SDIST_BYTES)
    )));
    assert!(links.contains(&format!(
        "/simple/{DEMO_WHEEL}#sha1={}",
        sha1_hash(DEMO_WHEEL_BYTES)
    )));
}

#[tokio::test]
async fn test_artifacts_are_served_byte_for_byte() {
    let setup = create_test_setup(&demo_files()).unwrap();

    let wheel = setup.server.get(&format!("/simple/{DEMO_WHEEL}")).await;
    wheel.assert_status_ok();
    assert_eq!(&wheel.as_bytes()[..], DEMO_WHEEL_BYTES);
    assert_eq!(wheel.headers()["content-type"], "application/x-tar");

    let sdist = setup.server.get(&format!("/simple/{DEMO_SDIST}")).await;
    sdist.assert_status_ok();
    assert_eq!(&sdist.as_bytes()[..], DEMO_SDIST_BYTES);
    assert_eq!(sdist.headers()["content-type"], "application/octet-stream");
}

#[tokio::test]
async fn test_new_files_need_a_rebuild() {
    let setup = create_test_setup(&demo_files()).unwrap();
    setup.add_file("fresh-0.1.zip", b"fresh");

    setup
        .server
        .get("/simple/fresh")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    setup
        .server
        .get("/simple/fresh-0.1.zip")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let rebuild = setup.server.get("/simple/rebuild-index").await;
    rebuild.assert_status_ok();
    rebuild.assert_text(REBUILD_CONFIRMATION);

    let mut packages = hrefs(&setup.server.get("/simple/").await.text());
    packages.sort();
    assert_eq!(packages, vec!["/simple/demo", "/simple/fresh"]);
    setup.server.get("/simple/fresh/").await.assert_status_ok();

    let download = setup.server.get("/simple/fresh-0.1.zip").await;
    download.assert_status_ok();
    assert_eq!(&download.as_bytes()[..], b"fresh".as_slice());
}

#[tokio::test]
async fn test_failed_rebuild_keeps_serving_old_index() {
    let setup = create_test_setup(&demo_files()).unwrap();
    let before = setup.server.get("/simple").await.text();
    setup.add_file("broken.tar.gz", b"no version here");

    let rebuild = setup.server.get("/simple/rebuild-index").await;
    rebuild.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(rebuild.text().contains("broken.tar.gz"));

    assert_eq!(setup.server.get("/simple").await.text(), before);
    setup.server.get("/simple/demo").await.assert_status_ok();
    assert_eq!(setup.app_state.index.current().generation(), 1);
}

#[tokio::test]
async fn test_legacy_status_answers_200_for_failures() {
    let setup = create_test_setup_with(&demo_files(), |config| {
        config.legacy_status_codes = true;
    })
    .unwrap();
    setup.add_file("broken.tar.gz", b"no version here");

    let rebuild = setup.server.get("/simple/rebuild-index").await;
    rebuild.assert_status_ok();
    assert_ne!(rebuild.text(), REBUILD_CONFIRMATION);

    let missing = setup.server.get("/simple/nothing").await;
    missing.assert_status_ok();
    missing.assert_text("Not Found");
}

#[tokio::test]
async fn test_skip_invalid_policy_rebuilds_around_bad_files() {
    let setup = create_test_setup_with(&demo_files(), |config| {
        config.scan_policy = ScanPolicy::SkipInvalid;
    })
    .unwrap();
    setup.add_file("broken.tar.gz", b"no version here");
    setup.add_file("fresh-0.1.tar.gz", b"fresh");

    setup
        .server
        .get("/simple/rebuild-index")
        .await
        .assert_status_ok();

    let current = setup.app_state.index.current();
    assert_eq!(current.generation(), 2);
    assert!(current.has_package("/simple/fresh"));
    assert_eq!(current.skipped().len(), 1);
    setup
        .server
        .get("/simple/broken.tar.gz")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sha256_fragments() {
    let setup = create_test_setup_with(&[(DEMO_SDIST, DEMO_SDIST_BYTES)], |config| {
        config.hash_algorithm = DigestAlgorithm::Sha256;
    })
    .unwrap();

    let page = setup.server.get("/simple/demo").await.text();
    let links = hrefs(&page);
    assert_eq!(links.len(), 1);
    assert!(
        Regex::new(r"#sha256=[0-9a-f]{64}$").unwrap().is_match(&links[0]),
        "{links:?}"
    );
}

#[tokio::test]
async fn test_deleted_file_is_not_found_until_rebuild() {
    let setup = create_test_setup(&demo_files()).unwrap();
    std::fs::remove_file(setup.package_dir().join(DEMO_SDIST)).unwrap();

    setup
        .server
        .get(&format!("/simple/{DEMO_SDIST}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    setup
        .server
        .get("/simple/rebuild-index")
        .await
        .assert_status_ok();
    let links = hrefs(&setup.server.get("/simple/demo").await.text());
    assert_eq!(links.len(), 1);
    assert!(links[0].starts_with(&format!("/simple/{DEMO_WHEEL}#")));
}

#[tokio::test]
async fn test_empty_directory_serves_empty_index() {
    let setup = create_test_setup(&[]).unwrap();

    let root = setup.server.get("/simple").await;
    root.assert_status_ok();
    assert!(hrefs(&root.text()).is_empty());
    assert!(root.text().contains("<title>Simple Index</title>"));
}
