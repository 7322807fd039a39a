//! Integration tests for price uploads and upload task polling
//!
//! Polling runs on the real clock against a mock server, so every test that
//! waits keeps the number of checks small.

#[path = "support.rs"]
mod support;

use std::sync::atomic::Ordering;
use std::time::Duration;

use serde_json::json;
use wbgate_domain::{ProgressNotify, TaskHandle, TaskProgress, TaskStatus, WbError};
use wbgate_infra::api::{ClubDiscount, Price};
use wbgate_infra::{WaitOptions, WbClient};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{client_for, config_for, sequence};

fn upload_accepted(id: u64) -> serde_json::Value {
    json!({"data": {"id": id, "alreadyExists": false}, "error": false, "errorText": ""})
}

#[tokio::test]
async fn upload_prices_posts_wire_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/upload/task"))
        .and(body_json(json!({"data": [
            {"nmID": 123, "price": 999, "discount": 30},
            {"nmID": 456, "price": 1500, "discount": 0}
        ]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(upload_accepted(42)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let prices = [
        Price { nm_id: 123, price: 999, discount: 30 },
        Price { nm_id: 456, price: 1500, discount: 0 },
    ];
    let task = client.prices().upload_prices(&prices).await.expect("upload");

    assert_eq!(task.upload_id, 42);
    assert!(!task.already_exists);
    assert_eq!(task.task_id().as_str(), "42");
}

#[tokio::test]
async fn club_discounts_use_their_own_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/upload/task/club-discount"))
        .and(body_json(json!({"data": [{"nmID": 7, "clubDiscount": 15}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(upload_accepted(8)))
        .expect(1)
        .mount(&server)
        .await;

    let task = client_for(&server)
        .prices()
        .upload_club_discounts(&[ClubDiscount { nm_id: 7, club_discount: 15 }])
        .await
        .expect("upload");
    assert_eq!(task.upload_id, 8);
}

#[tokio::test]
async fn empty_batch_is_rejected_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let client = client_for(&server);
    let err = client.prices().upload_prices(&[]).await.unwrap_err();

    assert!(matches!(err, WbError::Validation(_)), "{err:?}");
    assert_eq!(client.rate_limiter().state(wbgate_domain::Category::Prices).available(), 5);
}

#[tokio::test]
async fn envelope_error_becomes_validation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/upload/task"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "error": true,
            "errorText": "The specified prices and discounts are already set"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .prices()
        .upload_prices(&[Price { nm_id: 1, price: 100, discount: 0 }])
        .await
        .unwrap_err();
    match err {
        WbError::Validation(message) => {
            assert_eq!(message, "The specified prices and discounts are already set");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn task_report_falls_back_to_buffer_then_unknown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/history/tasks"))
        .and(query_param("uploadID", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/buffer/tasks"))
        .and(query_param("uploadID", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"uploadID": 5, "status": 1, "overAllGoodsNumber": 3, "successGoodsNumber": 0}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/history/tasks"))
        .and(query_param("uploadID", "6"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/buffer/tasks"))
        .and(query_param("uploadID", "6"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
        .mount(&server)
        .await;

    let prices = client_for(&server);
    let pending = prices.prices().task_report(5).await.expect("report");
    assert_eq!(pending.status, TaskStatus::Processing);
    assert_eq!(pending.progress.map(|p| p.total), Some(3));

    let missing = prices.prices().task_report(6).await.expect("report");
    assert_eq!(missing.status, TaskStatus::Unknown);
}

#[tokio::test]
async fn wait_for_task_completes_with_goods_counters() {
    let server = MockServer::start().await;
    let (history_calls, history) = sequence(vec![
        json!({"data": null}),
        json!({"data": {
            "uploadID": 77,
            "status": 3,
            "overAllGoodsNumber": 2,
            "successGoodsNumber": 2
        }}),
    ]);
    Mock::given(method("GET"))
        .and(path("/api/v2/history/tasks"))
        .and(query_param("uploadID", "77"))
        .respond_with(history)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/buffer/tasks"))
        .and(query_param("uploadID", "77"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"uploadID": 77, "status": 1, "overAllGoodsNumber": 2, "successGoodsNumber": 0}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut seen: Vec<TaskStatus> = Vec::new();
    let outcome = client
        .prices()
        .wait_for_task(
            77,
            WaitOptions::new().interval(Duration::from_secs(1)).timeout(Duration::from_secs(10)),
            Some(Box::new(|handle: TaskHandle| seen.push(handle.status()))),
        )
        .await
        .expect("upload should complete");

    let completion = outcome.completed().expect("not cancelled");
    assert_eq!(completion.task_id.as_str(), "77");
    assert_eq!(completion.checks, 2);
    assert_eq!(completion.processed_items, Some(2));
    assert_eq!(completion.total_items, Some(2));
    assert_eq!(seen, vec![TaskStatus::Processing, TaskStatus::Done]);
    assert_eq!(history_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn on_change_skips_buffer_checks_without_counters() {
    let server = MockServer::start().await;
    let (_, history) = sequence(vec![
        json!({"data": null}),
        json!({"data": null}),
        json!({"data": null}),
        json!({"data": {"uploadID": 81, "status": 3, "overAllGoodsNumber": 2, "successGoodsNumber": 2}}),
    ]);
    Mock::given(method("GET"))
        .and(path("/api/v2/history/tasks"))
        .and(query_param("uploadID", "81"))
        .respond_with(history)
        .mount(&server)
        .await;
    let (buffer_calls, buffer) = sequence(vec![
        json!({"data": {"uploadID": 81, "status": 1, "overAllGoodsNumber": 2, "successGoodsNumber": 0}}),
        json!({"data": {"uploadID": 81, "status": 1}}),
    ]);
    Mock::given(method("GET"))
        .and(path("/api/v2/buffer/tasks"))
        .and(query_param("uploadID", "81"))
        .respond_with(buffer)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.polling.notify = ProgressNotify::OnChange;
    let client = WbClient::new(config).expect("client should build");

    let mut seen: Vec<(TaskStatus, Option<TaskProgress>)> = Vec::new();
    let outcome = client
        .prices()
        .wait_for_task(
            81,
            WaitOptions::new(),
            Some(Box::new(|handle: TaskHandle| seen.push((handle.status(), handle.progress())))),
        )
        .await
        .expect("upload should complete");

    let completion = outcome.completed().expect("not cancelled");
    assert_eq!(completion.checks, 4);
    assert_eq!(buffer_calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        seen,
        vec![
            (TaskStatus::Processing, Some(TaskProgress::new(0, 2))),
            (TaskStatus::Done, Some(TaskProgress::new(2, 2))),
        ]
    );
}

#[tokio::test]
async fn wait_for_task_surfaces_failed_upload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/history/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"uploadID": 9, "status": 6, "overAllGoodsNumber": 4, "successGoodsNumber": 0}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .prices()
        .wait_for_task(9, WaitOptions::new(), None)
        .await
        .unwrap_err();

    match err {
        WbError::TaskFailed { task_id, status, errors } => {
            assert_eq!(task_id.as_str(), "9");
            assert_eq!(status, TaskStatus::Failed);
            assert_eq!(errors, vec!["no goods were updated".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn wait_for_task_times_out_while_processing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/history/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/buffer/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"uploadID": 3, "status": 1}})))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .prices()
        .wait_for_task(3, WaitOptions::new().timeout(Duration::from_millis(1_500)), None)
        .await
        .unwrap_err();

    match err {
        WbError::TaskTimeout { task_id, last_known, .. } => {
            assert_eq!(task_id.as_str(), "3");
            assert_eq!(last_known.status(), TaskStatus::Processing);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
