//! End-to-end scenarios against an in-process scripted WebSocket server.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use gremlin_driver::driver::config::DriverConfig;
use gremlin_driver::gremlin::Credentials;
use gremlin_driver::{
    Connection, ConnectionSettings, DriverError, GremlinClient, GremlinQuery, LocalLockClient,
    QueryContext, Request,
};

type ServerSocket = WebSocketStream<TcpStream>;

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept_ws(listener: &TcpListener) -> ServerSocket {
    let (stream, _) = listener.accept().await.unwrap();
    accept_async(stream).await.unwrap()
}

/// Read the next binary request frame, returning (request id, request body).
async fn read_request(ws: &mut ServerSocket) -> (String, serde_json::Value) {
    loop {
        let msg = ws.next().await.unwrap().unwrap();
        if !msg.is_binary() {
            continue;
        }
        let frame = msg.into_data();
        let mime_len = frame[0] as usize;
        let body: serde_json::Value = serde_json::from_slice(&frame[1 + mime_len..]).unwrap();
        let id = body["requestId"]["@value"].as_str().unwrap().to_string();
        return (id, body);
    }
}

fn response_text(id: &str, status_code: u16, data: serde_json::Value) -> Message {
    Message::Text(
        json!({
            "requestId": id,
            "status": {"code": status_code, "message": "", "attributes": {}},
            "result": {"data": data, "meta": {}}
        })
        .to_string(),
    )
}

#[tokio::test]
async fn single_success_returns_data() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let (id, _body) = read_request(&mut ws).await;
        ws.send(response_text(&id, 200, json!([1, 2, 3])))
            .await
            .unwrap();
    });

    let mut conn = Connection::connect(&url, ConnectionSettings::default())
        .await
        .unwrap();
    let bytes = conn.exec_query("g.V()").await.unwrap();
    assert_eq!(bytes, b"[1,2,3]");

    conn.close().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn no_content_returns_empty_bytes() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let (id, _) = read_request(&mut ws).await;
        // data on a 204 is ignored by the client
        ws.send(response_text(&id, 204, json!([1, 2, 3])))
            .await
            .unwrap();
    });

    let mut conn = Connection::connect(&url, ConnectionSettings::default())
        .await
        .unwrap();
    let bytes = conn.exec_query("g.V()").await.unwrap();
    assert!(bytes.is_empty());

    conn.close().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn batched_chunks_are_concatenated() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let (id, _) = read_request(&mut ws).await;
        ws.send(response_text(&id, 206, json!([1, 2]))).await.unwrap();
        ws.send(response_text(&id, 206, json!([3, 4]))).await.unwrap();
        ws.send(response_text(&id, 200, json!([5, 6]))).await.unwrap();
    });

    let mut conn = Connection::connect(&url, ConnectionSettings::default())
        .await
        .unwrap();
    let bytes = conn.exec_query("g.V()").await.unwrap();
    assert_eq!(bytes, b"[1,2,3,4,5,6]");

    conn.close().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn interleaved_requests_are_routed_by_id() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        // collect both requests before answering out of order
        let (id_a, body_a) = read_request(&mut ws).await;
        let (id_b, _body_b) = read_request(&mut ws).await;
        let (id_one, id_two) = if body_a["args"]["gremlin"] == "one" {
            (id_a, id_b)
        } else {
            (id_b, id_a)
        };
        ws.send(response_text(&id_one, 206, json!([1, 2])))
            .await
            .unwrap();
        ws.send(response_text(&id_two, 200, json!([3, 4])))
            .await
            .unwrap();
        ws.send(response_text(&id_one, 200, json!([5, 6])))
            .await
            .unwrap();
    });

    let mut conn = Connection::connect(&url, ConnectionSettings::default())
        .await
        .unwrap();
    let rx_one = conn.send(Request::eval("one")).unwrap();
    let rx_two = conn.send(Request::eval("two")).unwrap();

    assert_eq!(rx_one.await.unwrap().unwrap(), b"[1,2,5,6]");
    assert_eq!(rx_two.await.unwrap().unwrap(), b"[3,4]");

    conn.close().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn server_error_maps_through_fixed_table() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let (id, _) = read_request(&mut ws).await;
        ws.send(response_text(&id, 500, json!(null))).await.unwrap();
        // keep the socket open so the client side stays healthy
        while let Some(Ok(_)) = ws.next().await {}
    });

    let mut conn = Connection::connect(&url, ConnectionSettings::default())
        .await
        .unwrap();
    let err = conn.exec_query("g.V()").await.unwrap_err();
    assert_eq!(err.to_string(), "Server error");
    // protocol errors leave the connection usable
    assert!(conn.healthy());

    conn.close().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn protocol_error_is_not_retried() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let (id, _) = read_request(&mut ws).await;
        ws.send(response_text(&id, 597, json!(null))).await.unwrap();
        // a retry would show up as another frame or a fresh dial; neither
        // may arrive before the deadline
        let deadline = tokio::time::sleep(std::time::Duration::from_millis(200));
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => return,
                accepted = listener.accept() => {
                    let _ = accepted;
                    panic!("engine re-dialed after a protocol error");
                }
                msg = ws.next() => match msg {
                    Some(Ok(m)) if m.is_binary() => panic!("engine retried a protocol error"),
                    Some(Ok(_)) => continue,
                    _ => return,
                }
            }
        }
    });

    let config = DriverConfig::builder(&url)
        .with_max_pool_size(1)
        .with_max_retries(3)
        .build();
    let client = GremlinClient::connect(config, Arc::new(LocalLockClient::new()))
        .await
        .unwrap();

    let err = client
        .exec_query_f(&QueryContext::new(), GremlinQuery::new("g.V()"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Script evaluation error");

    client.close().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn retry_reconnects_after_server_drops_socket() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        // connection created for the pool fill; the first query arrives
        // here and the socket is dropped without an answer
        let mut ws = accept_ws(&listener).await;
        let (_id, _) = read_request(&mut ws).await;
        drop(ws);

        // the engine re-dials in place on the second attempt
        let mut ws = accept_ws(&listener).await;
        let (id, _) = read_request(&mut ws).await;
        ws.send(response_text(&id, 200, json!(["ok"]))).await.unwrap();
    });

    let config = DriverConfig::builder(&url)
        .with_max_pool_size(1)
        .with_max_retries(2)
        .build();
    let client = GremlinClient::connect(config, Arc::new(LocalLockClient::new()))
        .await
        .unwrap();

    let bytes = client
        .exec_query_f(&QueryContext::new(), GremlinQuery::new("g.V()"))
        .await
        .unwrap();
    assert_eq!(bytes, b"[\"ok\"]");

    client.close().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn authenticate_challenge_is_answered_with_sasl() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let (id, body) = read_request(&mut ws).await;
        assert_eq!(body["op"], "eval");
        ws.send(response_text(&id, 407, json!(null))).await.unwrap();

        // the client answers on the same request id
        let (auth_id, auth_body) = read_request(&mut ws).await;
        assert_eq!(auth_id, id);
        assert_eq!(auth_body["op"], "authentication");
        assert_eq!(auth_body["processor"], "traversal");
        assert_eq!(
            auth_body["args"]["sasl"],
            Credentials::new("user", "pass").sasl_token()
        );

        ws.send(response_text(&id, 200, json!([42]))).await.unwrap();
    });

    let settings = ConnectionSettings {
        credentials: Some(Credentials::new("user", "pass")),
        ..ConnectionSettings::default()
    };
    let mut conn = Connection::connect(&url, settings).await.unwrap();
    let bytes = conn.exec_query("g.V()").await.unwrap();
    assert_eq!(bytes, b"[42]");

    conn.close().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn send_after_close_fails_synchronously() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        // hold the socket open until the client goes away
        while let Some(Ok(_)) = ws.next().await {}
    });

    let mut conn = Connection::connect(&url, ConnectionSettings::default())
        .await
        .unwrap();
    conn.close().await.unwrap();
    assert!(!conn.healthy());
    assert!(matches!(
        conn.send(Request::eval("g.V()")),
        Err(DriverError::ConnectionClosed)
    ));
    server.await.unwrap();
}

#[tokio::test]
async fn dropped_socket_fails_in_flight_requests_once() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let (_id, _) = read_request(&mut ws).await;
        let (_id, _) = read_request(&mut ws).await;
        drop(ws);
    });

    let conn = Connection::connect(&url, ConnectionSettings::default())
        .await
        .unwrap();
    let rx_a = conn.send(Request::eval("a")).unwrap();
    let rx_b = conn.send(Request::eval("b")).unwrap();

    for rx in [rx_a, rx_b] {
        match rx.await.unwrap() {
            Err(DriverError::ConnectionClosed) => {}
            other => panic!("expected ConnectionClosed, got {other:?}"),
        }
    }
    server.await.unwrap();
}

#[tokio::test]
async fn unknown_request_ids_are_dropped_silently() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let (id, _) = read_request(&mut ws).await;
        // noise for a request nobody registered
        ws.send(response_text("not-a-known-id", 200, json!([9])))
            .await
            .unwrap();
        ws.send(response_text(&id, 200, json!([1]))).await.unwrap();
    });

    let mut conn = Connection::connect(&url, ConnectionSettings::default())
        .await
        .unwrap();
    let bytes = conn.exec_query("g.V()").await.unwrap();
    assert_eq!(bytes, b"[1]");

    conn.close().await.unwrap();
    server.await.unwrap();
}
