//! BDD step definitions for gateway requests

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request};
use cucumber::{given, then, when};
use relay_protocol::API_TOKEN_HEADER;
use tower::ServiceExt;

use crate::world::{GatewayWorld, Sent};

const LOCAL_PEER: &str = "127.0.0.1:50123";

async fn send(
    world: &mut GatewayWorld,
    method: Method,
    peer: &str,
    token: Option<&str>,
    body: Body,
) {
    let peer: SocketAddr = peer.parse().expect("peer address");
    let mut builder = Request::builder()
        .method(method)
        .uri("/")
        .extension(ConnectInfo(peer));
    if let Some(token) = token {
        builder = builder.header(API_TOKEN_HEADER, token);
    }
    let request = builder.body(body).expect("request");

    let response = world
        .router()
        .oneshot(request)
        .await
        .expect("router is infallible");

    world.statuses.push(response.status().as_u16());
    world.headers = Some(response.headers().clone());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    world.body = serde_json::from_slice(&bytes).ok();
}

async fn post_json(world: &mut GatewayWorld, body: serde_json::Value) {
    let token = world.token.clone();
    send(
        world,
        Method::POST,
        LOCAL_PEER,
        Some(&token),
        Body::from(body.to_string()),
    )
    .await;
}

#[given(expr = "the gateway token is {string}")]
fn gateway_token(world: &mut GatewayWorld, token: String) {
    world.token = token;
}

#[given("the messaging client is connected")]
fn client_connected(world: &mut GatewayWorld) {
    world.ready = true;
}

#[given("the messaging client is disconnected")]
fn client_disconnected(world: &mut GatewayWorld) {
    world.ready = false;
}

#[given(expr = "the chat bridge fails with {string}")]
fn bridge_fails(world: &mut GatewayWorld, error: String) {
    world.sender_error = Some(error);
}

#[given(expr = "at most {int} request(s) per minute is/are allowed")]
fn rate_ceiling(world: &mut GatewayWorld, max: u32) {
    world.max_per_minute = Some(max);
}

#[given(expr = "a checkpoint image {string} exists")]
fn image_exists(world: &mut GatewayWorld, name: String) {
    let path = world.image_dir().join(name);
    std::fs::write(path, b"\x89PNG").expect("write image");
}

#[when(expr = "a local client posts the alert {string} to {string}")]
async fn post_alert(world: &mut GatewayWorld, message: String, group: String) {
    post_json(
        world,
        serde_json::json!({"groupId": group, "message": message, "tipo": 2}),
    )
    .await;
}

#[when(expr = "a local client posts {int} alerts")]
async fn post_many(world: &mut GatewayWorld, count: usize) {
    for i in 0..count {
        post_json(
            world,
            serde_json::json!({"groupId": "g", "message": format!("alert {}", i), "tipo": 2}),
        )
        .await;
    }
}

#[when(expr = "a local client posts the checkpoint {string} with caption {string} to {string}")]
async fn post_checkpoint(world: &mut GatewayWorld, name: String, caption: String, group: String) {
    let path = world.image_dir().join(name);
    post_json(
        world,
        serde_json::json!({"groupId": group, "message": caption, "tipo": 1, "imagePath": path}),
    )
    .await;
}

#[when(expr = "a local client posts a request with tipo {int}")]
async fn post_with_kind(world: &mut GatewayWorld, tipo: i64) {
    post_json(
        world,
        serde_json::json!({"groupId": "g", "message": "m", "tipo": tipo}),
    )
    .await;
}

#[when(expr = "a local client posts a request without a {word}")]
async fn post_without(world: &mut GatewayWorld, field: String) {
    let mut body = serde_json::json!({"groupId": "g", "message": "m", "tipo": 2});
    if let Some(object) = body.as_object_mut() {
        object.remove(&field);
    }
    post_json(world, body).await;
}

#[when("a local client posts malformed JSON")]
async fn post_malformed(world: &mut GatewayWorld) {
    let token = world.token.clone();
    send(
        world,
        Method::POST,
        LOCAL_PEER,
        Some(&token),
        Body::from("{\"groupId\": "),
    )
    .await;
}

#[when(expr = "a local client posts a body of {int} bytes")]
async fn post_sized(world: &mut GatewayWorld, size: usize) {
    let token = world.token.clone();
    send(
        world,
        Method::POST,
        LOCAL_PEER,
        Some(&token),
        Body::from(vec![b' '; size]),
    )
    .await;
}

#[when(expr = "a local client posts an alert with token {string}")]
async fn post_with_token(world: &mut GatewayWorld, token: String) {
    let body = serde_json::json!({"groupId": "g", "message": "m", "tipo": 2});
    send(
        world,
        Method::POST,
        LOCAL_PEER,
        Some(&token),
        Body::from(body.to_string()),
    )
    .await;
}

#[when("a local client posts an alert without a token")]
async fn post_without_token(world: &mut GatewayWorld) {
    let body = serde_json::json!({"groupId": "g", "message": "m", "tipo": 2});
    send(
        world,
        Method::POST,
        LOCAL_PEER,
        None,
        Body::from(body.to_string()),
    )
    .await;
}

#[when(expr = "a client at {string} asks for the status")]
async fn remote_status(world: &mut GatewayWorld, peer: String) {
    let token = world.token.clone();
    send(world, Method::GET, &peer, Some(&token), Body::empty()).await;
}

#[when("a local client asks for the status")]
async fn local_status(world: &mut GatewayWorld) {
    let token = world.token.clone();
    send(world, Method::GET, LOCAL_PEER, Some(&token), Body::empty()).await;
}

#[when(expr = "a local client asks for the status with token {string}")]
async fn local_status_with_token(world: &mut GatewayWorld, token: String) {
    send(world, Method::GET, LOCAL_PEER, Some(&token), Body::empty()).await;
}

#[when(expr = "a local client sends a {word} request")]
async fn local_method(world: &mut GatewayWorld, method: String) {
    let method = Method::from_bytes(method.as_bytes()).expect("method");
    let token = world.token.clone();
    send(world, method, LOCAL_PEER, Some(&token), Body::empty()).await;
}

#[then(expr = "the response status is {int}")]
fn response_status(world: &mut GatewayWorld, expected: u16) {
    assert_eq!(world.statuses.last().copied(), Some(expected));
}

#[then(expr = "the response statuses are {string}")]
fn response_statuses(world: &mut GatewayWorld, expected: String) {
    let expected: Vec<u16> = expected
        .split(',')
        .map(|s| s.trim().parse().expect("status code"))
        .collect();
    assert_eq!(world.statuses, expected);
}

#[then(expr = "the response succeeds with {string}")]
fn response_succeeds(world: &mut GatewayWorld, message: String) {
    let body = world.body.as_ref().expect("json body");
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], message.as_str());
    assert!(body["timestamp"].is_string());
}

#[then(expr = "the error is {string}")]
fn error_is(world: &mut GatewayWorld, error: String) {
    let body = world.body.as_ref().expect("json body");
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], error.as_str());
}

#[then(expr = "the status reports the messaging client as {string}")]
fn status_reports(world: &mut GatewayWorld, connection: String) {
    let body = world.body.as_ref().expect("json body");
    assert_eq!(body["status"], "online");
    assert_eq!(body["whatsapp"], connection.as_str());
    assert!(body["server"]["uptime"].is_number());
    assert!(body["server"]["memoryUsage"].is_string());
}

#[then(expr = "the text {string} is delivered to {string}")]
fn text_delivered(world: &mut GatewayWorld, text: String, target: String) {
    assert_eq!(world.sent(), vec![Sent::Text { target, text }]);
}

#[then(expr = "the image {string} is delivered to {string} with caption {string}")]
fn image_delivered(world: &mut GatewayWorld, name: String, target: String, caption: String) {
    let path = world.image_dir().join(name);
    assert_eq!(
        world.sent(),
        vec![Sent::Media {
            target,
            path,
            caption
        }]
    );
}

#[then("nothing is delivered")]
fn nothing_delivered(world: &mut GatewayWorld) {
    assert!(world.sent().is_empty(), "sent: {:?}", world.sent());
}

#[then("the response carries the hardening headers")]
fn hardening_headers(world: &mut GatewayWorld) {
    let headers = world.headers.as_ref().expect("response headers");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-xss-protection"], "1; mode=block");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["content-security-policy"], "default-src 'none'");
    assert_eq!(headers[header::SERVER], "Message Gateway");
}

#[then("the connection is closed")]
fn connection_closed(world: &mut GatewayWorld) {
    let headers = world.headers.as_ref().expect("response headers");
    assert_eq!(headers[header::CONNECTION], "close");
}
