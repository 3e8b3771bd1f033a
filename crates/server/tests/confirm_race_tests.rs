mod common;

use common::fixtures::{MIB, PART_SIZE};
use common::server::TestServer;
use futures::future::join_all;
use stow_core::SessionStatus;
use stow_core::api::{CreateSessionRequest, MarkPartRequest};
use stow_metadata::{AssetRepo, MultipartRepo, SessionRepo};

fn create_request(tenant: &str, file_name: &str, file_size: u64) -> CreateSessionRequest {
    CreateSessionRequest {
        tenant_id: tenant.to_string(),
        file_name: file_name.to_string(),
        file_size,
        content_type: None,
        kind: None,
        total_parts: None,
        idempotency_key: None,
        checksum: None,
    }
}

#[tokio::test]
async fn n_way_single_confirm_race_converges() {
    let server = TestServer::spawn().await;
    let created = server
        .state
        .sessions
        .create(create_request("tenant-a", "raced.bin", 10 * MIB))
        .await
        .unwrap();
    server
        .backend
        .put_object(&created.storage_key, 10 * MIB, "abc", "application/octet-stream")
        .await;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let confirm = server.state.confirm.clone();
            let id = created.session_id.to_string();
            tokio::spawn(async move { confirm.confirm(&id).await })
        })
        .collect();

    for result in join_all(tasks).await {
        let resp = result.unwrap().unwrap();
        assert_eq!(resp.status, SessionStatus::Completed);
        assert_eq!(resp.etag.as_deref(), Some("abc"));
    }

    // Exactly one writer won the conditional update and exactly one
    // asset record plus notification came out of it.
    let row = server
        .state
        .metadata
        .get_session(*created.session_id.as_uuid())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.version, 1);
    assert_eq!(server.notifier.completed_count(), 1);

    let asset = server
        .state
        .metadata
        .get_asset(*created.session_id.as_uuid())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(asset.size_bytes, (10 * MIB) as i64);
}

#[tokio::test]
async fn n_way_multipart_confirm_race_converges() {
    let server = TestServer::spawn().await;
    let mut req = create_request("tenant-a", "raced.zip", 200 * MIB);
    req.total_parts = Some(2);
    let created = server.state.sessions.create(req).await.unwrap();

    let multipart = server
        .state
        .metadata
        .get_multipart(*created.session_id.as_uuid())
        .await
        .unwrap()
        .unwrap();

    for part_number in 1..=2u32 {
        let etag = format!("etag-{part_number}");
        server
            .backend
            .register_part(&multipart.provider_upload_id, part_number, &etag, PART_SIZE)
            .await
            .unwrap();
        server
            .state
            .sessions
            .mark_part_uploaded(
                &created.session_id.to_string(),
                MarkPartRequest {
                    part_number,
                    etag,
                    size: PART_SIZE,
                },
            )
            .await
            .unwrap();
    }

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let confirm = server.state.confirm.clone();
            let id = created.session_id.to_string();
            tokio::spawn(async move { confirm.confirm(&id).await })
        })
        .collect();

    // Losers of the provider call fall through to the assembled object
    // and every caller sees the same completed session.
    for result in join_all(tasks).await {
        let resp = result.unwrap().unwrap();
        assert_eq!(resp.status, SessionStatus::Completed);
    }
    assert_eq!(server.notifier.completed_count(), 1);

    let asset = server
        .state
        .metadata
        .get_asset(*created.session_id.as_uuid())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(asset.size_bytes, (2 * PART_SIZE) as i64);
}

#[tokio::test]
async fn confirm_and_fail_race_yields_one_terminal_status() {
    let server = TestServer::spawn().await;
    let created = server
        .state
        .sessions
        .create(create_request("tenant-a", "contested.bin", MIB))
        .await
        .unwrap();
    server
        .backend
        .put_object(&created.storage_key, MIB, "abc", "application/octet-stream")
        .await;

    let confirm = server.state.confirm.clone();
    let id = created.session_id.to_string();
    let confirm_task = tokio::spawn(async move { confirm.confirm(&id).await });

    let failer = server.state.confirm.clone();
    let id = created.session_id.to_string();
    let fail_task = tokio::spawn(async move { failer.fail(&id, "operator abort").await });

    let confirm_result = confirm_task.await.unwrap();
    let fail_result = fail_task.await.unwrap();

    let row = server
        .state
        .metadata
        .get_session(*created.session_id.as_uuid())
        .await
        .unwrap()
        .unwrap();

    // Whichever write landed first decided the terminal status. The
    // loser re-read the session and reported it instead of clobbering.
    match row.status.as_str() {
        "completed" => {
            let resp = confirm_result.unwrap();
            assert_eq!(resp.status, SessionStatus::Completed);
            assert!(fail_result.is_err());
            assert_eq!(server.notifier.completed_count(), 1);
            assert_eq!(server.notifier.failed_count(), 0);
        }
        "failed" => {
            let resp = fail_result.unwrap();
            assert_eq!(resp.status, SessionStatus::Failed);
            assert!(confirm_result.is_err());
            assert_eq!(server.notifier.completed_count(), 0);
            assert_eq!(server.notifier.failed_count(), 1);
        }
        other => panic!("unexpected terminal status {other}"),
    }
    assert_eq!(row.version, 1);
}
