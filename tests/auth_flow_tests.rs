use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use folio::config::ServerConfig;
use folio::identity::TokenSubject;
use folio::server::{serve_on, AppState};

const DAY: i64 = 24 * 60 * 60;

async fn start_ephemeral(config: ServerConfig) -> (JoinHandle<()>, String, AppState) {
    let state = AppState::new(&config).expect("app state");
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.expect("bind 127.0.0.1:0");
    let base = format!("http://{}", listener.local_addr().unwrap());
    let for_server = state.clone();
    let handle = tokio::spawn(async move {
        if let Err(e) = serve_on(listener, for_server).await { eprintln!("server task error: {e:?}"); }
    });
    (handle, base, state)
}

async fn call(req: reqwest::RequestBuilder) -> (StatusCode, Value) {
    let resp = req.send().await.expect("request");
    let status = resp.status();
    (status, resp.json().await.unwrap_or(Value::Null))
}

#[tokio::test]
async fn admin_scenario_end_to_end() {
    let (handle, base, state) = start_ephemeral(ServerConfig::ephemeral("scenario-secret")).await;
    let http = reqwest::Client::new();
    let admin_route = format!("{base}/api/admin/messages");

    // register
    let (status, body) = call(http.post(format!("{base}/api/auth/register")).json(&json!({"username": "alice", "password": "secret123"}))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "User registered");
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["role"], "admin");
    assert!(body["user"].get("password_hash").is_none());
    let token = body["token"].as_str().unwrap().to_string();
    let claims = state.codec().verify(&token).unwrap();
    assert_eq!(claims.username, "alice");
    assert_eq!(claims.role.as_str(), "admin");

    // wrong password
    let (status, body) = call(http.post(format!("{base}/api/auth/login")).json(&json!({"username": "alice", "password": "wrong"}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid credentials");

    // no header
    let (status, body) = call(http.get(&admin_route)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Auth failed");

    // valid token passes through to the handler
    let (status, body) = call(http.get(&admin_route).bearer_auth(&token)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 0);

    // expired token
    let subject = TokenSubject { user_id: claims.user_id.clone(), username: "alice".into(), role: claims.role };
    let expired = state.codec().sign_at(&subject, Utc::now().timestamp() - 7 * DAY - 1).unwrap();
    let (status, body) = call(http.get(&admin_route).bearer_auth(&expired)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Auth failed");

    handle.abort();
}

#[tokio::test]
async fn login_hides_whether_the_user_exists() {
    let (handle, base, _state) = start_ephemeral(ServerConfig::ephemeral("enum-secret")).await;
    let http = reqwest::Client::new();
    call(http.post(format!("{base}/api/auth/register")).json(&json!({"username": "alice", "password": "pw"}))).await;

    let wrong = call(http.post(format!("{base}/api/auth/login")).json(&json!({"username": "alice", "password": "nope"}))).await;
    let unknown = call(http.post(format!("{base}/api/auth/login")).json(&json!({"username": "nobody", "password": "nope"}))).await;
    assert_eq!(wrong, unknown);

    let (status, body) = call(http.post(format!("{base}/api/auth/login")).json(&json!({"username": "alice", "password": "pw"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");
    assert!(body["token"].as_str().is_some());
    handle.abort();
}

#[tokio::test]
async fn register_validation_and_duplicates() {
    let (handle, base, _state) = start_ephemeral(ServerConfig::ephemeral("reg-secret")).await;
    let http = reqwest::Client::new();
    let url = format!("{base}/api/auth/register");

    for bad in [json!({}), json!({"username": "bob"}), json!({"username": "  ", "password": "x"})] {
        let (status, body) = call(http.post(&url).json(&bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Username & password required");
    }
    let (status, _) = call(http.post(&url).body("not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(http.post(&url).json(&json!({"username": "bob", "password": "pw"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = call(http.post(&url).json(&json!({"username": "bob", "password": "other"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Username already exists");
    handle.abort();
}

#[tokio::test]
async fn gate_failures_all_look_the_same() {
    let (handle, base, state) = start_ephemeral(ServerConfig::ephemeral("gate-secret")).await;
    let http = reqwest::Client::new();
    let url = format!("{base}/api/auth/profile");

    let ghost = TokenSubject { user_id: "deleted-user".into(), username: "ghost".into(), role: folio::identity::Role::Admin };
    let unknown_user = state.codec().sign(&ghost).unwrap();
    let other_secret = folio::identity::TokenCodec::new(&folio::config::AuthConfig::new("elsewhere")).sign(&ghost).unwrap();

    let responses = vec![
        call(http.get(&url)).await,
        call(http.get(&url).header("Authorization", "Basic abc")).await,
        call(http.get(&url).bearer_auth("garbage")).await,
        call(http.get(&url).bearer_auth(&unknown_user)).await,
        call(http.get(&url).bearer_auth(&other_secret)).await,
    ];
    for (status, body) in &responses {
        assert_eq!(*status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, &responses[0].1);
    }
    assert_eq!(responses[0].1["message"], "Auth failed");
    handle.abort();
}

#[tokio::test]
async fn profile_and_inbox_lifecycle() {
    let (handle, base, _state) = start_ephemeral(ServerConfig::ephemeral("inbox-secret")).await;
    let http = reqwest::Client::new();
    let (_, reg) = call(http.post(format!("{base}/api/auth/register")).json(&json!({"username": "alice", "password": "pw"}))).await;
    let token = reg["token"].as_str().unwrap().to_string();

    let (status, body) = call(http.get(format!("{base}/api/auth/profile")).bearer_auth(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"], reg["user"]);

    let (status, body) = call(http.post(format!("{base}/api/contact")).json(&json!({"name": "Bob", "email": "bob@example.com"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "All fields are required");

    let mut ids = Vec::new();
    for n in 1..=2 {
        let (status, body) = call(http.post(format!("{base}/api/contact")).json(&json!({"name": "Bob", "email": "bob@example.com", "message": format!("hello {n}")}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Message sent successfully");
        assert_eq!(body["data"]["read"], false);
        ids.push(body["data"]["id"].as_str().unwrap().to_string());
    }

    let (_, list) = call(http.get(format!("{base}/api/admin/messages")).bearer_auth(&token)).await;
    assert_eq!(list["count"], 2);
    assert_eq!(list["data"][0]["message"], "hello 2");

    let (_, unread) = call(http.get(format!("{base}/api/admin/messages/unread/count")).bearer_auth(&token)).await;
    assert_eq!(unread["count"], 2);

    let (status, body) = call(http.put(format!("{base}/api/admin/messages/{}/read", ids[0])).bearer_auth(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["read"], true);
    let (_, unread) = call(http.get(format!("{base}/api/admin/messages/unread/count")).bearer_auth(&token)).await;
    assert_eq!(unread["count"], 1);

    let (status, body) = call(http.get(format!("{base}/api/admin/messages/{}", ids[1])).bearer_auth(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["message"], "hello 2");

    let (status, body) = call(http.delete(format!("{base}/api/admin/messages/{}", ids[1])).bearer_auth(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Message deleted successfully");
    for req in [
        http.get(format!("{base}/api/admin/messages/{}", ids[1])),
        http.delete(format!("{base}/api/admin/messages/{}", ids[1])),
        http.put(format!("{base}/api/admin/messages/missing/read")),
    ] {
        let (status, body) = call(req.bearer_auth(&token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Message not found");
    }
    handle.abort();
}

#[tokio::test]
async fn non_admin_user_gets_403_on_admin_routes() {
    let tmp = tempfile::tempdir().unwrap();
    let hash = folio::identity::hash_password("pw").unwrap();
    let users = json!([{"id": "u-ed", "username": "erin", "password_hash": hash, "role": "editor"}]);
    std::fs::write(tmp.path().join("users.json"), users.to_string()).unwrap();
    let mut config = ServerConfig::ephemeral("roles-secret");
    config.db_root = Some(tmp.path().to_path_buf());

    let (handle, base, _state) = start_ephemeral(config).await;
    let http = reqwest::Client::new();

    let (status, body) = call(http.post(format!("{base}/api/auth/login")).json(&json!({"username": "erin", "password": "pw"}))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user"]["role"], "user");
    let token = body["token"].as_str().unwrap().to_string();

    // authenticated routes still work for a non-admin
    let (status, _) = call(http.get(format!("{base}/api/auth/profile")).bearer_auth(&token)).await;
    assert_eq!(status, StatusCode::OK);

    for req in [
        http.get(format!("{base}/api/admin/messages")),
        http.get(format!("{base}/api/admin/messages/unread/count")),
        http.delete(format!("{base}/api/admin/messages/anything")),
    ] {
        let (status, body) = call(req.bearer_auth(&token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Not admin");
    }
    handle.abort();
}

#[tokio::test]
async fn accounts_and_messages_survive_restart() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = ServerConfig::ephemeral("restart-secret");
    config.db_root = Some(tmp.path().to_path_buf());

    let (handle, base, _state) = start_ephemeral(config.clone()).await;
    let http = reqwest::Client::new();
    let (_, reg) = call(http.post(format!("{base}/api/auth/register")).json(&json!({"username": "alice", "password": "pw"}))).await;
    let token = reg["token"].as_str().unwrap().to_string();
    call(http.post(format!("{base}/api/contact")).json(&json!({"name": "Bob", "email": "b@x", "message": "hi"}))).await;
    handle.abort();

    let (handle, base, _state) = start_ephemeral(config).await;
    // tokens are stateless and survive the restart as long as the secret does
    let (status, list) = call(http.get(format!("{base}/api/admin/messages")).bearer_auth(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 1);
    let (status, _) = call(http.post(format!("{base}/api/auth/login")).json(&json!({"username": "alice", "password": "pw"}))).await;
    assert_eq!(status, StatusCode::OK);
    handle.abort();
}

#[tokio::test]
async fn liveness() {
    let (handle, base, _state) = start_ephemeral(ServerConfig::ephemeral("live")).await;
    let text = reqwest::get(format!("{base}/")).await.unwrap().text().await.unwrap();
    assert_eq!(text, "folio ok");
    handle.abort();
}
