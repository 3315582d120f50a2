//! Integration tests for the chat history and session endpoints.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use forum_server::db::DbPool;

async fn start_test_server() -> (String, SocketAddr, DbPool) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = forum_server::db::init_db(&data_dir).expect("Failed to init DB");
    let mut config = forum_server::config::Config::default();
    config.history_page_size = 3;
    let state = forum_server::state::AppState::new(db.clone(), &config);

    let app = forum_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        let _keep = tmp_dir;
    });

    (format!("http://{}", addr), addr, db)
}

fn login(db: &DbPool, username: &str) -> String {
    forum_server::auth::session::create_session(db, username, chrono::Duration::hours(1))
        .expect("Failed to create session")
}

async fn get_history(base_url: &str, token: &str, query: &str) -> reqwest::Response {
    reqwest::Client::new()
        .get(format!("{}/messages?{}", base_url, query))
        .header("Cookie", format!("session_token={}", token))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (base_url, _addr, _db) = start_test_server().await;
    let resp = reqwest::get(format!("{}/health", base_url)).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_logged_reports_session_owner() {
    let (base_url, _addr, db) = start_test_server().await;
    let token = login(&db, "alice");

    let resp = reqwest::Client::new()
        .get(format!("{}/logged", base_url))
        .header("Cookie", format!("session_token={}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"username": "alice"}));

    let resp = reqwest::get(format!("{}/logged", base_url)).await.unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_history_access_rules() {
    let (base_url, _addr, db) = start_test_server().await;
    let carol = login(&db, "carol");

    let resp = reqwest::get(format!("{}/messages?from=alice&to=bob", base_url))
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    assert_eq!(get_history(&base_url, &carol, "from=alice").await.status(), 400);
    assert_eq!(
        get_history(&base_url, &carol, "from=alice&to=bob").await.status(),
        403
    );
    assert_eq!(
        get_history(&base_url, &carol, "from=carol&to=bob").await.status(),
        200
    );
}

#[tokio::test]
async fn test_offline_recipient_gets_history_in_order() {
    let (base_url, addr, db) = start_test_server().await;
    let alice = login(&db, "alice");
    let bob = login(&db, "bob");

    let (ws_stream, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws?token={}", addr, alice))
        .await
        .expect("Failed to connect");
    let (mut write, mut read) = ws_stream.split();

    for i in 1..=5 {
        write
            .send(Message::Text(
                json!({"to": "bob", "content": format!("msg {i}")}).to_string().into(),
            ))
            .await
            .unwrap();
    }

    // Bob is offline: alice's only tab gets presence frames, never chat echoes.
    while let Ok(Some(Ok(frame))) =
        tokio::time::timeout(Duration::from_millis(300), read.next()).await
    {
        if let Message::Text(text) = frame {
            let value: Value = serde_json::from_str(text.as_str()).unwrap();
            assert_eq!(value["type"], "user_list");
        }
    }

    // Writes are persisted before the next frame is read, so all five are
    // stored once the socket has gone quiet.
    let page: Vec<Value> = get_history(&base_url, &bob, "from=bob&to=alice")
        .await
        .json()
        .await
        .unwrap();
    let contents: Vec<_> = page.iter().map(|m| m["content"].as_str().unwrap()).collect();
    assert_eq!(contents, vec!["msg 3", "msg 4", "msg 5"]);
    assert!(page.iter().all(|m| m["from"] == "alice" && m["to"] == "bob"));

    let older: Vec<Value> = get_history(&base_url, &bob, "from=bob&to=alice&offset=3")
        .await
        .json()
        .await
        .unwrap();
    let contents: Vec<_> = older.iter().map(|m| m["content"].as_str().unwrap()).collect();
    assert_eq!(contents, vec!["msg 1", "msg 2"]);
}

#[tokio::test]
async fn test_logout_revokes_session() {
    let (base_url, _addr, db) = start_test_server().await;
    let token = login(&db, "alice");
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/logout", base_url))
        .header("Cookie", format!("session_token={}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    let cleared = resp
        .headers()
        .get("set-cookie")
        .expect("Logout should clear the cookie")
        .to_str()
        .unwrap();
    assert!(cleared.starts_with("session_token="));

    let resp = client
        .get(format!("{}/logged", base_url))
        .header("Cookie", format!("session_token={}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client.post(format!("{}/logout", base_url)).send().await.unwrap();
    assert_eq!(resp.status(), 400);
}
