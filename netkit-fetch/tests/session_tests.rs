//! Integration tests for request dispatch through an armed stub.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use netkit_core::{
    NetworkObserver, Networkable, NetworkingError, Request, ResponseMeta, TaskId, TransportError,
};
use netkit_fetch::{Session, SessionSettings, StubOutcome};
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "resultCount")]
    result_count: u32,
}

enum ITunesApi {
    Search { term: String },
}

impl Networkable for ITunesApi {
    fn request(&self) -> Request {
        match self {
            Self::Search { term } => Request::get("https://itunes.apple.com/search")
                .unwrap()
                .with_query([("term", term.as_str()), ("limit", "1")]),
        }
    }
}

fn session() -> Session {
    Session::builder().interception(true).build().unwrap()
}

fn search_request() -> Request {
    ITunesApi::Search {
        term: "rust".to_string(),
    }
    .request()
}

#[tokio::test]
async fn test_stub_success_decodes() {
    let session = session();
    assert!(session.set_stub_outcome(
        StubOutcome::Success(br#"{"resultCount":0}"#.to_vec()),
        Duration::ZERO
    ));

    let response: SearchResponse = session.dispatch(search_request()).await.unwrap();
    assert_eq!(response.result_count, 0);
}

#[tokio::test]
async fn test_endpoint_dispatch() {
    let session = session();
    session.set_stub_outcome(
        StubOutcome::json(&serde_json::json!({ "resultCount": 7 })).unwrap(),
        Duration::ZERO,
    );

    let endpoint = ITunesApi::Search {
        term: "netkit".to_string(),
    };
    let response: SearchResponse = session.dispatch_endpoint(&endpoint).await.unwrap();
    assert_eq!(response.result_count, 7);
}

#[tokio::test]
async fn test_stub_status_code_is_http_error_for_every_request() {
    let session = session();
    session.set_stub_outcome(StubOutcome::FailureStatusCode(500), Duration::ZERO);

    let handles: Vec<_> = (0..3)
        .map(|_| session.dispatch::<SearchResponse>(search_request()))
        .collect();
    let results = join_all(handles).await;

    assert_eq!(results.len(), 3);
    for result in results {
        let err = result.unwrap_err();
        assert!(matches!(err, NetworkingError::Http { .. }), "got {err:?}");
        assert_eq!(err.status_code(), Some(500));
    }
    assert_eq!(session.in_flight_count(), 0);
}

#[tokio::test]
async fn test_stub_not_connected_is_network_connection() {
    let session = session();
    session.set_stub_outcome(
        StubOutcome::Failure(TransportError::not_connected()),
        Duration::ZERO,
    );

    let err = session
        .dispatch::<SearchResponse>(search_request())
        .await
        .unwrap_err();
    assert!(matches!(err, NetworkingError::NetworkConnection(_)));
    assert_eq!(err.title(), "Network Connection Error");
}

#[tokio::test]
async fn test_invalid_json_is_decoding_error() {
    let session = session();
    session.set_stub_outcome(StubOutcome::Success(b"<html>".to_vec()), Duration::ZERO);

    let err = session
        .dispatch::<SearchResponse>(search_request())
        .await
        .unwrap_err();
    assert!(matches!(err, NetworkingError::Decoding { .. }));
    assert_eq!(err.status_code(), Some(200));
    assert_eq!(err.body(), Some(&b"<html>"[..]));
}

#[tokio::test]
async fn test_bytes_are_returned_verbatim() {
    let session = session();
    let image = vec![0xff, 0xd8, 0xff, 0xe0, 0x00];
    session.set_stub_outcome(StubOutcome::Success(image.clone()), Duration::ZERO);

    let body = session.dispatch_bytes(search_request()).await.unwrap();
    assert_eq!(body, image);
}

#[tokio::test]
async fn test_registry_balance() {
    let session = session();
    session.set_stub_outcome(
        StubOutcome::Success(br#"{"resultCount":1}"#.to_vec()),
        Duration::from_millis(50),
    );

    let handles: Vec<_> = (0..4)
        .map(|_| session.dispatch::<SearchResponse>(search_request()))
        .collect();
    assert_eq!(session.in_flight_count(), 4);
    assert_eq!(session.in_flight_tasks().len(), 4);

    for result in join_all(handles).await {
        assert_eq!(result.unwrap().result_count, 1);
    }
    assert_eq!(session.in_flight_count(), 0);
    assert!(session.in_flight_tasks().is_empty());
}

#[tokio::test]
async fn test_registry_balance_across_cancel_and_completion() {
    let session = session();
    session.set_stub_outcome(
        StubOutcome::Success(b"slow".to_vec()),
        Duration::from_millis(300),
    );

    let first = session.dispatch_bytes(search_request());
    let second = session.dispatch_bytes(search_request());
    assert_eq!(session.in_flight_count(), 2);

    assert!(first.cancel());
    assert_eq!(session.in_flight_count(), 1);
    assert!(!first.cancel());
    assert_eq!(session.in_flight_count(), 1);

    session.set_stub_outcome(StubOutcome::Success(b"fast".to_vec()), Duration::ZERO);
    let third = session.dispatch_bytes(search_request());
    let third_id = third.id();
    assert_eq!(session.in_flight_count(), 2);
    assert_eq!(third.await.unwrap(), b"fast");
    assert_eq!(session.in_flight_count(), 1);

    // Cancelling a finished request changes nothing.
    assert!(!session.cancel(third_id));
    assert_eq!(session.in_flight_count(), 1);

    assert!(first.await.unwrap_err().is_cancelled());
    assert_eq!(session.in_flight_count(), 1);

    let second_id = second.id();
    assert_eq!(second.await.unwrap(), b"slow");
    assert_eq!(session.in_flight_count(), 0);
    assert!(!session.cancel(second_id));
    assert_eq!(session.cancel_all(), 0);

    let fourth = session.dispatch_bytes(search_request());
    assert_eq!(session.in_flight_count(), 1);
    assert_eq!(fourth.await.unwrap(), b"fast");
    assert_eq!(session.in_flight_count(), 0);
}

#[tokio::test]
async fn test_cancel_all_completes_every_request_as_cancelled() {
    let session = session();
    session.set_stub_outcome(
        StubOutcome::Success(b"never".to_vec()),
        Duration::from_secs(30),
    );

    let handles: Vec<_> = (0..4)
        .map(|_| session.dispatch_bytes(search_request()))
        .collect();
    assert_eq!(session.in_flight_count(), 4);

    assert_eq!(session.cancel_all(), 4);
    assert_eq!(session.in_flight_count(), 0);

    let results = join_all(handles).await;
    assert_eq!(results.len(), 4);
    for result in results {
        assert!(result.unwrap_err().is_cancelled());
    }
}

#[tokio::test]
async fn test_fetch_callbacks_after_cancel_all() {
    let session = session();
    session.set_stub_outcome(
        StubOutcome::Success(b"never".to_vec()),
        Duration::from_secs(30),
    );

    let (sender, mut receiver) = mpsc::unbounded_channel();
    for _ in 0..4 {
        let sender = sender.clone();
        session.fetch_bytes(search_request(), move |result| {
            let _ = sender.send(result);
        });
    }
    drop(sender);
    assert_eq!(session.in_flight_count(), 4);

    session.cancel_all();

    let mut errors = Vec::new();
    while let Some(result) = receiver.recv().await {
        errors.push(result.unwrap_err());
    }
    assert_eq!(errors.len(), 4);
    assert!(errors.iter().all(NetworkingError::is_cancelled));
    assert_eq!(session.in_flight_count(), 0);
}

#[tokio::test]
async fn test_fetch_callback_sees_request_deregistered() {
    let session = session();
    session.set_stub_outcome(
        StubOutcome::Success(br#"{"resultCount":0}"#.to_vec()),
        Duration::ZERO,
    );

    let (sender, receiver) = oneshot::channel();
    let observer = session.clone();
    session.fetch::<SearchResponse, _>(search_request(), move |result| {
        let _ = sender.send((result.map(|r| r.result_count), observer.in_flight_count()));
    });

    let (result, in_flight) = receiver.await.unwrap();
    assert_eq!(result.unwrap(), 0);
    assert_eq!(in_flight, 0);
}

#[tokio::test]
async fn test_rearming_does_not_affect_in_flight_requests() {
    let session = session();
    session.set_stub_outcome(
        StubOutcome::Success(b"first".to_vec()),
        Duration::from_millis(100),
    );
    let first = session.dispatch_bytes(search_request());

    session.set_stub_outcome(StubOutcome::FailureStatusCode(503), Duration::ZERO);
    let second = session.dispatch_bytes(search_request());

    session.clear_stub_outcome();
    assert!(!session.is_stub_armed());

    assert_eq!(first.await.unwrap(), b"first");
    assert_eq!(second.await.unwrap_err().status_code(), Some(503));
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl NetworkObserver for Recorder {
    fn task_created(&self, _id: TaskId, request: &Request) {
        self.events
            .lock()
            .unwrap()
            .push(format!("created {}", request.method()));
    }

    fn task_received(&self, _id: TaskId, response: &ResponseMeta, body: &[u8]) {
        self.events
            .lock()
            .unwrap()
            .push(format!("received {} ({} bytes)", response.status, body.len()));
    }

    fn task_completed(
        &self,
        _id: TaskId,
        _request: &Request,
        outcome: Result<(), &NetworkingError>,
    ) {
        let event = match outcome {
            Ok(()) => "completed".to_string(),
            Err(e) => format!("failed {}", e.title()),
        };
        self.events.lock().unwrap().push(event);
    }
}

#[tokio::test]
async fn test_observer_sees_every_lifecycle_event() {
    let recorder = Arc::new(Recorder::default());
    let session = Session::builder()
        .settings(SessionSettings::default().with_developer_mode(true))
        .interception(true)
        .observer(recorder.clone())
        .build()
        .unwrap();

    session.set_stub_outcome(StubOutcome::FailureStatusCode(404), Duration::ZERO);
    let _ = session.dispatch_bytes(search_request()).await;
    session.set_stub_outcome(StubOutcome::Success(b"ok".to_vec()), Duration::ZERO);
    let _ = session.dispatch_bytes(search_request()).await;
    session.set_stub_outcome(
        StubOutcome::Failure(TransportError::not_connected()),
        Duration::ZERO,
    );
    let _ = session.dispatch_bytes(search_request()).await;

    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec![
            "created GET".to_string(),
            "received 404 (0 bytes)".to_string(),
            "failed HTTP Error".to_string(),
            "created GET".to_string(),
            "received 200 (2 bytes)".to_string(),
            "completed".to_string(),
            "created GET".to_string(),
            "failed Network Connection Error".to_string(),
        ]
    );
}

#[test]
fn test_fetch_callbacks_survive_runtime_restart() {
    let session = session();
    session.set_stub_outcome(StubOutcome::Success(b"ok".to_vec()), Duration::ZERO);

    for round in 0..2 {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let body = runtime.block_on(async {
            let (sender, receiver) = oneshot::channel();
            session.fetch_bytes(search_request(), move |result| {
                let _ = sender.send(result);
            });
            tokio::time::timeout(Duration::from_secs(5), receiver).await
        });
        let body = body
            .unwrap_or_else(|_| panic!("round {round}: completion never delivered"))
            .unwrap()
            .unwrap();
        assert_eq!(body, b"ok");
        drop(runtime);
    }
    assert_eq!(session.in_flight_count(), 0);
}
