#[macro_use]
extern crate lazy_static;

use futures::StreamExt;
use lookout::{
    Client, Delivery, HeaderPair, Method, RequestOptions, RequestTemplate, Response,
    ViewController
};
use lookout_test::{
    eventually, settle, within, Event, Handshake, HttpServer, Reply, SocketServer
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const SUBSCRIPTION: &str = "subscription { system { cpu } }";

lazy_static! {
    static ref CPU_42: Value = json!({ "data": { "system": { "cpu": 42 } } });
    static ref CPU_43: Value = json!({ "data": { "system": { "cpu": 43 } } });
}

fn build_client() -> Client {
    Client::builder().build()
}

fn template(endpoint: String, delivery: Delivery) -> RequestTemplate {
    RequestTemplate::new(endpoint, SUBSCRIPTION).with_delivery(delivery)
}

#[tokio::test]
async fn test_fetch_post() {
    let server = HttpServer::start(|_| Reply::json(200, CPU_42.clone()))
        .await
        .unwrap();
    let template = template(server.url("/test/graphql"), Delivery::Fetch)
        .with_variables(json!({ "interval": 1 }))
        .with_operation_name("Cpu");
    let mut view = ViewController::new(build_client(), template);

    view.activate();
    assert!(eventually(|| view.state().is_complete()).await);

    let state = view.state();
    assert_eq!(state.last_payload(), Some(&*CPU_42));
    assert!(state.last_error().is_none());

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path(), "/test/graphql");
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert_eq!(request.header("accept"), Some("application/json"));
    assert_eq!(
        request.json(),
        json!({
            "query": SUBSCRIPTION,
            "variables": { "interval": 1 },
            "operationName": "Cpu"
        })
    );
}

#[tokio::test]
async fn test_fetch_get() {
    let server = HttpServer::start(|_| Reply::json(200, CPU_42.clone()))
        .await
        .unwrap();
    let template = template(server.url("/test/graphql"), Delivery::Fetch)
        .with_options(RequestOptions::new(Delivery::Fetch).with_method(Method::Get))
        .with_variables(json!({ "interval": 1 }));
    let mut view = ViewController::new(build_client(), template);

    view.activate();
    assert!(eventually(|| view.state().is_complete()).await);

    let request = &server.requests()[0];
    assert_eq!(request.method, "GET");
    assert_eq!(
        request.query_params(),
        vec![
            ("query".to_string(), SUBSCRIPTION.to_string()),
            ("variables".to_string(), "{\"interval\":1}".to_string())
        ]
    );
}

#[tokio::test]
async fn test_fetch_error_status() {
    let server = HttpServer::start(|_| Reply::text(500, "boom")).await.unwrap();
    let mut view = ViewController::new(
        build_client(),
        template(server.url("/test/graphql"), Delivery::Fetch)
    );

    view.activate();
    assert!(eventually(|| view.state().last_error().is_some()).await);

    let state = view.state();
    let message = state.last_error().unwrap().message.clone().unwrap();
    assert!(message.contains("500"), "{}", message);
    assert!(message.contains("boom"), "{}", message);
    assert!(!state.is_complete());
    assert!(state.last_payload().is_none());
}

#[tokio::test]
async fn test_fetch_rejects_created_subscription() {
    let server = HttpServer::start(|_| Reply::created("/test/streams/1"))
        .await
        .unwrap();
    let mut view = ViewController::new(
        build_client(),
        template(server.url("/test/graphql"), Delivery::Fetch)
    );

    view.activate();
    assert!(eventually(|| view.state().last_error().is_some()).await);
    settle().await;

    let error = view.presentation().error;
    assert!(error.contains("/test/streams/1"), "{}", error);
    assert!(error.contains("use streaming fetch"), "{}", error);
    assert!(!view.state().is_complete());
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_caller_headers_replace_defaults() {
    let server = HttpServer::start(|_| Reply::json(200, CPU_42.clone()))
        .await
        .unwrap();
    let options = RequestOptions::new(Delivery::Fetch)
        .with_header("accept", "application/graphql-response+json")
        .with_header("Content-Type", "application/json; charset=utf-8");
    let template = template(server.url("/test/graphql"), Delivery::Fetch).with_options(options);
    let mut view = ViewController::new(build_client(), template);

    view.activate();
    assert!(eventually(|| view.state().is_complete()).await);

    let request = &server.requests()[0];
    assert_eq!(
        request.header_values("accept"),
        vec!["application/graphql-response+json"]
    );
    assert_eq!(
        request.header_values("content-type"),
        vec!["application/json; charset=utf-8"]
    );
}

#[tokio::test]
async fn test_extra_headers() {
    let server = HttpServer::start(|_| Reply::json(200, CPU_42.clone()))
        .await
        .unwrap();
    let client = Client::builder()
        .with_extra_headers(|| vec![HeaderPair::new("x-client", "lookout")])
        .build();
    let options = RequestOptions::new(Delivery::Fetch).with_header("x-request", "1");
    let template = template(server.url("/test/graphql"), Delivery::Fetch).with_options(options);
    let mut view = ViewController::new(client, template);

    view.activate();
    assert!(eventually(|| view.state().is_complete()).await);

    let request = &server.requests()[0];
    assert_eq!(request.header("x-client"), Some("lookout"));
    assert_eq!(request.header("x-request"), Some("1"));
}

#[tokio::test]
async fn test_streaming_fetch_follows_location() {
    let server = HttpServer::start(|request| {
        if request.path() == "/test/graphql" {
            Reply::created("/test/streams/1")
        } else {
            Reply::event_stream(vec![
                "event: message\ndata: {\"cpu\": 42}\n\n",
                "event: ping\ndata: 1\n\n",
                "event: message\nda",
                "ta: {\"cpu\": 43}\n\n",
            ])
        }
    })
    .await
    .unwrap();
    let mut view = ViewController::new(
        build_client(),
        template(server.url("/test/graphql"), Delivery::StreamingFetch)
    );

    view.activate();
    assert!(eventually(|| view.state().is_complete()).await);
    assert_eq!(view.state().last_payload(), Some(&json!({ "cpu": 43 })));

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[1].method, "GET");
    assert_eq!(requests[1].path(), "/test/streams/1");
    assert_eq!(requests[1].header("accept"), Some("text/event-stream"));
}

#[tokio::test]
async fn test_streaming_fetch_plain_response() {
    let server = HttpServer::start(|_| Reply::json(200, CPU_42.clone()))
        .await
        .unwrap();
    let mut view = ViewController::new(
        build_client(),
        template(server.url("/test/graphql"), Delivery::StreamingFetch)
    );

    view.activate();
    assert!(eventually(|| view.state().is_complete()).await);
    assert_eq!(view.state().last_payload(), Some(&*CPU_42));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_streaming_fetch_missing_location() {
    let server = HttpServer::start(|_| Reply::status(201)).await.unwrap();
    let mut view = ViewController::new(
        build_client(),
        template(server.url("/test/graphql"), Delivery::StreamingFetch)
    );

    view.activate();
    assert!(eventually(|| view.state().last_error().is_some()).await);
    assert!(view
        .presentation()
        .error
        .contains("subscription was created without a location"));
}

#[tokio::test]
async fn test_event_source() {
    let server = HttpServer::start(|_| {
        Reply::events(vec![
            Event::default().comment("connected"),
            Event::default().event("message").data("{\"cpu\": 42}"),
        ])
    })
    .await
    .unwrap();
    let template = template(server.url("/test/sse-subscription"), Delivery::EventSource)
        .with_variables(json!({ "interval": 1 }));
    let mut view = ViewController::new(build_client(), template);

    view.activate();
    assert!(eventually(|| view.state().is_complete()).await);
    assert_eq!(view.state().last_payload(), Some(&json!({ "cpu": 42 })));

    let request = &server.requests()[0];
    assert_eq!(request.method, "GET");
    assert_eq!(request.header("accept"), Some("text/event-stream"));
    assert_eq!(
        request.query_params(),
        vec![
            ("query".to_string(), format!("\"{}\"", SUBSCRIPTION)),
            ("variables".to_string(), "{\"interval\":1}".to_string())
        ]
    );
}

#[tokio::test]
async fn test_event_source_undecodable_data() {
    let server = HttpServer::start(|_| {
        Reply::events(vec![
            Event::default().data("{\"cpu\": 42}"),
            Event::default().data("not json"),
            Event::default().data("{\"cpu\": 43}"),
        ])
    })
    .await
    .unwrap();
    let mut view = ViewController::new(
        build_client(),
        template(server.url("/test/sse-subscription"), Delivery::EventSource)
    );

    view.activate();
    assert!(eventually(|| view.state().last_error().is_some()).await);
    settle().await;

    let state = view.state();
    assert_eq!(state.last_payload(), Some(&json!({ "cpu": 42 })));
    assert!(!state.is_complete());
}

#[tokio::test]
async fn test_event_source_release_closes_connection() {
    let server = HttpServer::start(|_| {
        Reply::events(vec![Event::default().data("{\"cpu\": 42}")]).held_open()
    })
    .await
    .unwrap();
    let client = build_client();
    let mut view = ViewController::new(
        client.clone(),
        template(server.url("/test/sse-subscription"), Delivery::EventSource)
    );

    view.activate();
    assert!(eventually(|| view.state().last_payload().is_some()).await);
    assert_eq!(client.active_feeds(), 1);

    view.deactivate();
    assert!(eventually(|| client.active_feeds() == 0).await);
    assert!(eventually(|| server.disconnects() == 1).await);
    assert!(!view.state().is_complete());
}

#[tokio::test]
async fn test_websocket() {
    let server = SocketServer::start(
        Handshake::Ack,
        vec![
            json!({ "type": "data", "id": "1", "payload": *CPU_42 }),
            json!({ "type": "ka" }),
            json!({ "type": "data", "id": "1", "payload": *CPU_43 }),
            json!({ "type": "complete", "id": "1" }),
        ]
    )
    .await
    .unwrap();
    let client = build_client();
    let mut view = ViewController::new(
        client.clone(),
        template(server.url("/test/graphql"), Delivery::WebSocket)
    );

    view.activate();
    assert!(eventually(|| view.state().is_complete()).await);
    assert_eq!(view.state().last_payload(), Some(&*CPU_43));
    assert!(eventually(|| server.closed() == 1).await);
    assert!(eventually(|| client.active_feeds() == 0).await);

    let received = server.received();
    assert_eq!(received[0], json!({ "type": "connection_init" }));
    assert_eq!(
        received[1],
        json!({ "type": "start", "id": "1", "payload": { "query": SUBSCRIPTION } })
    );
    assert_eq!(
        server.received_types(),
        vec!["connection_init", "start", "connection_terminate"]
    );
}

#[tokio::test]
async fn test_websocket_release_stops_operation() {
    let server = SocketServer::start(
        Handshake::Ack,
        vec![json!({ "type": "data", "id": "1", "payload": *CPU_42 })]
    )
    .await
    .unwrap();
    let client = build_client();
    let mut view = ViewController::new(
        client.clone(),
        template(server.url("/test/graphql"), Delivery::WebSocket)
    );

    view.activate();
    assert!(eventually(|| view.state().last_payload().is_some()).await);
    view.deactivate();

    assert!(eventually(|| server.closed() == 1).await);
    assert_eq!(
        server.received_types(),
        vec!["connection_init", "start", "stop", "connection_terminate"]
    );
    assert!(eventually(|| client.active_feeds() == 0).await);
    assert!(!view.state().is_complete());
}

#[tokio::test]
async fn test_websocket_error_message() {
    let server = SocketServer::start(
        Handshake::Ack,
        vec![json!({ "type": "error", "id": "1", "payload": { "message": "boom" } })]
    )
    .await
    .unwrap();
    let mut view = ViewController::new(
        build_client(),
        template(server.url("/test/graphql"), Delivery::WebSocket)
    );

    view.activate();
    assert!(eventually(|| view.state().last_error().is_some()).await);
    assert_eq!(
        view.state().last_error().unwrap().message.as_deref(),
        Some("boom")
    );
}

#[tokio::test]
async fn test_websocket_rejected() {
    let server = SocketServer::start(Handshake::Reject("nope".to_string()), Vec::new())
        .await
        .unwrap();
    let mut view = ViewController::new(
        build_client(),
        template(server.url("/test/graphql"), Delivery::WebSocket)
    );

    view.activate();
    assert!(eventually(|| view.state().last_error().is_some()).await);
    assert_eq!(view.presentation().error, "connection rejected: nope");
}

#[tokio::test]
async fn test_websocket_ack_timeout() {
    let server = SocketServer::start(Handshake::Silent, Vec::new())
        .await
        .unwrap();
    let client = Client::builder()
        .with_ack_timeout(Duration::from_millis(100))
        .build();
    let mut view = ViewController::new(
        client,
        template(server.url("/test/graphql"), Delivery::WebSocket)
    );

    view.activate();
    assert!(eventually(|| view.state().last_error().is_some()).await);
    assert_eq!(
        view.presentation().error,
        "timed out waiting for connection_ack"
    );
}

#[tokio::test]
async fn test_websocket_maps_http_endpoint() {
    let server = SocketServer::start(
        Handshake::Ack,
        vec![json!({ "type": "complete", "id": "1" })]
    )
    .await
    .unwrap();
    let endpoint = server.url("/test/graphql").replacen("ws://", "http://", 1);
    let mut view = ViewController::new(build_client(), template(endpoint, Delivery::WebSocket));

    view.activate();
    assert!(eventually(|| view.state().is_complete()).await);
    assert!(view.state().last_payload().is_none());
}

#[tokio::test]
async fn test_websocket_secure_endpoint_uses_tls() {
    let server = SocketServer::start(Handshake::Ack, Vec::new())
        .await
        .unwrap();
    let endpoint = server.url("/test/graphql").replacen("ws://", "wss://", 1);
    let mut view = ViewController::new(build_client(), template(endpoint, Delivery::WebSocket));

    view.activate();
    assert!(eventually(|| view.state().last_error().is_some()).await);

    // The loopback server speaks plain TCP, so the TLS handshake itself has to fail.
    let error = view.presentation().error;
    assert!(error.starts_with("websocket error"), "{}", error);
    assert!(!error.contains("TLS support not compiled in"), "{}", error);
    assert!(server.received().is_empty());
}

#[derive(Debug, Deserialize, PartialEq)]
struct System {
    cpu: u32
}

#[derive(Debug, Deserialize, PartialEq)]
struct ResponseData {
    system: System
}

#[tokio::test]
async fn test_query_and_observe() {
    let server = HttpServer::start(|_| Reply::json(200, CPU_42.clone()))
        .await
        .unwrap();
    let client = build_client();
    let request = template(server.url("/test/graphql"), Delivery::Fetch)
        .build()
        .unwrap();

    let response: Response<ResponseData> = within(client.query(&request)).await.unwrap();
    assert_eq!(
        response.data,
        Some(ResponseData {
            system: System { cpu: 42 }
        })
    );
    assert_eq!(client.active_feeds(), 0);

    let mut observable = within(client.observe(&request)).await.unwrap();
    assert_eq!(client.active_feeds(), 1);
    assert_eq!(observable.key(), request.key());
    assert_eq!(within(observable.next()).await.unwrap().unwrap(), *CPU_42);
    assert!(within(observable.next()).await.is_none());
    drop(observable);
    assert_eq!(client.active_feeds(), 0);
}

#[test]
fn test_no_runtime() {
    let mut view = ViewController::new(
        build_client(),
        template("http://localhost:9009/test/graphql".to_string(), Delivery::Fetch)
    );

    view.activate();
    assert!(!view.has_subscription());
    assert_eq!(
        view.presentation().error,
        "no tokio runtime is available to drive the subscription"
    );
}
