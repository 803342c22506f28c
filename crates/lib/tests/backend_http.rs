//! Integration test: run an in-memory chat backend and completion endpoint (axum) on a free
//! port and drive the real HTTP gateways through `ChatClient`.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chatter::api::{ChatApi, HttpBackend};
use chatter::credential::CredentialStore;
use chatter::llm::OpenRouterClient;
use chatter::model::{Conversation, Message, SenderType};
use chatter::{ChatClient, ClientError, ClientOptions, Composer};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

const TOKEN: &str = "tok-ada";
const COMPLETION_KEY: &str = "test-key";

#[derive(Default)]
struct Mock {
    chats: Vec<Conversation>,
    next_id: u32,
    completions: Vec<Value>,
}

type Shared = Arc<Mutex<Mock>>;
type Reject = (StatusCode, Json<Value>);

fn reject(status: StatusCode, message: &str) -> Reject {
    (status, Json(json!({ "message": message })))
}

fn authorize(headers: &HeaderMap) -> Result<(), Reject> {
    let expected = format!("Bearer {}", TOKEN);
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(v) if v == expected => Ok(()),
        _ => Err(reject(StatusCode::UNAUTHORIZED, "Unauthorized")),
    }
}

fn fresh_id(m: &mut Mock, prefix: &str) -> String {
    m.next_id += 1;
    format!("{}{}", prefix, m.next_id)
}

async fn login(Json(body): Json<Value>) -> Result<Json<Value>, Reject> {
    if body["username"] == "ada" && body["password"] == "secret" {
        Ok(Json(json!({ "access_token": TOKEN })))
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": { "message": "Invalid credentials", "statusCode": 401 } })),
        ))
    }
}

async fn register(Json(body): Json<Value>) -> Result<(StatusCode, Json<Value>), Reject> {
    if body["username"] == "ada" {
        return Err((StatusCode::CONFLICT, Json(json!({ "message": { "message": "Username already exists" } }))));
    }
    Ok((
        StatusCode::CREATED,
        Json(json!({ "_id": "u2", "username": body["username"] })),
    ))
}

async fn list_chats(
    State(s): State<Shared>,
    headers: HeaderMap,
) -> Result<Json<Vec<Conversation>>, Reject> {
    authorize(&headers)?;
    Ok(Json(s.lock().unwrap().chats.clone()))
}

async fn create_chat(
    State(s): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Conversation>), Reject> {
    authorize(&headers)?;
    let title = body["title"].as_str().unwrap_or_default().to_string();
    let mut m = s.lock().unwrap();
    let now = chrono::Utc::now();
    let chat = Conversation {
        id: fresh_id(&mut m, "c"),
        title,
        created_at: now,
        updated_at: now,
        messages: Vec::new(),
    };
    m.chats.push(chat.clone());
    Ok((StatusCode::CREATED, Json(chat)))
}

async fn update_chat(
    State(s): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Conversation>, Reject> {
    authorize(&headers)?;
    let mut m = s.lock().unwrap();
    let chat = m
        .chats
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Chat not found"))?;
    chat.title = body["title"].as_str().unwrap_or_default().to_string();
    chat.updated_at = chrono::Utc::now();
    Ok(Json(chat.clone()))
}

async fn delete_chat(
    State(s): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, Reject> {
    authorize(&headers)?;
    let mut m = s.lock().unwrap();
    let before = m.chats.len();
    m.chats.retain(|c| c.id != id);
    if m.chats.len() == before {
        return Err(reject(StatusCode::NOT_FOUND, "Chat not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn add_message(
    State(s): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, Reject> {
    authorize(&headers)?;
    let sender_type: SenderType = serde_json::from_value(body["senderType"].clone())
        .map_err(|_| reject(StatusCode::BAD_REQUEST, "Invalid senderType"))?;
    let content = body["content"].as_str().unwrap_or_default().to_string();
    let mut m = s.lock().unwrap();
    let msg_id = fresh_id(&mut m, "m");
    let chat = m
        .chats
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Chat not found"))?;
    chat.messages.push(Message {
        id: msg_id,
        content,
        sender_type,
        created_at: chrono::Utc::now(),
    });
    Ok(Json(json!({ "messages": chat.messages })))
}

async fn completions(
    State(s): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, Reject> {
    let expected = format!("Bearer {}", COMPLETION_KEY);
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
        return Err(reject(StatusCode::UNAUTHORIZED, "No auth credentials found"));
    }
    let n = body["messages"].as_array().map(|a| a.len()).unwrap_or(0);
    s.lock().unwrap().completions.push(body);
    Ok(Json(json!({
        "id": "gen-1",
        "choices": [{ "message": { "role": "assistant", "content": format!("seen {} messages", n) } }]
    })))
}

async fn start_mock() -> (String, Shared) {
    let shared: Shared = Arc::default();
    let app = Router::new()
        .route("/users/login", post(login))
        .route("/users/register", post(register))
        .route("/chats", get(list_chats).post(create_chat))
        .route("/chats/:id", patch(update_chat).delete(delete_chat))
        .route("/chats/:id/messages", post(add_message))
        .route("/v1/chat/completions", post(completions))
        .with_state(shared.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind free port");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}", addr), shared)
}

fn client_for(base: &str, credentials: CredentialStore) -> ChatClient {
    let backend = Arc::new(HttpBackend::new(base));
    let completion = Arc::new(OpenRouterClient::new(
        Some(format!("{}/v1", base)),
        Some(COMPLETION_KEY.to_string()),
    ));
    ChatClient::new(
        backend.clone(),
        backend,
        completion,
        credentials,
        ClientOptions::default(),
    )
    .expect("build client")
}

#[tokio::test]
async fn login_failure_reason_comes_from_nested_message() {
    let (base, _) = start_mock().await;
    let client = client_for(&base, CredentialStore::memory());
    let err = client.login("ada", "wrong").await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid credentials");
    let err = client.register("ada", "pw").await.unwrap_err();
    assert_eq!(err.to_string(), "Username already exists");
    client.register("grace", "pw").await.expect("register");
    assert!(!client.read(|s| s.auth.is_authenticated()).await);
}

#[tokio::test]
async fn chat_crud_round_trip_over_http() {
    let (base, shared) = start_mock().await;
    let client = client_for(&base, CredentialStore::memory());
    client.login("ada", "secret").await.expect("login");

    client.fetch_history().await.expect("fetch");
    assert!(client.read(|s| s.chat.history().is_empty()).await);

    let a = client.add_conversation("Trip").await.expect("add");
    let b = client.add_conversation("Work").await.expect("add");
    client.update_conversation(&a.id, "Trip to Lisbon").await.expect("update");
    client.delete_conversation(&b.id).await.expect("delete");

    let titles = client
        .read(|s| s.chat.history().iter().map(|c| c.title.clone()).collect::<Vec<_>>())
        .await;
    assert_eq!(titles, ["Trip to Lisbon"]);
    assert_eq!(shared.lock().unwrap().chats.len(), 1);

    let err = client.delete_conversation("missing").await.unwrap_err();
    assert_eq!(err.to_string(), "Chat not found");
    assert_eq!(
        client.read(|s| s.chat.error().map(str::to_string)).await.as_deref(),
        Some("Chat not found")
    );
}

#[tokio::test]
async fn full_turn_over_http() {
    let (base, shared) = start_mock().await;
    let client = client_for(&base, CredentialStore::memory());
    client.login("ada", "secret").await.expect("login");
    let chat = client.add_conversation("Hello").await.expect("add");
    client.select_conversation(Some(&chat.id)).await.expect("select");

    let mut composer = Composer::new("hi");
    let turn = client
        .send_turn(&mut composer, "meta-llama/llama-4-maverick")
        .await
        .expect("turn");
    assert_eq!(turn.reply, "seen 2 messages");
    assert!(composer.text().is_empty());

    let stored = client
        .read(|s| s.chat.selected_chat().map(|c| c.messages.clone()).unwrap_or_default())
        .await;
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].sender_type, SenderType::User);
    assert_eq!(stored[1].content, "seen 2 messages");

    let m = shared.lock().unwrap();
    let sent = &m.completions[0];
    assert_eq!(sent["model"], "meta-llama/llama-4-maverick");
    assert_eq!(sent["messages"][0]["role"], "system");
    assert_eq!(sent["messages"][1], json!({ "role": "user", "content": "hi" }));
}

#[tokio::test]
async fn credential_survives_restart_and_logout_removes_it() {
    let (base, _) = start_mock().await;
    let path = std::env::temp_dir()
        .join(format!("chatter-http-test-{}", uuid::Uuid::new_v4()))
        .join("credentials.json");

    let first = client_for(&base, CredentialStore::file(&path));
    first.login("ada", "secret").await.expect("login");
    first.add_conversation("Kept").await.expect("add");

    let second = client_for(&base, CredentialStore::file(&path));
    second.fetch_history().await.expect("fetch with restored token");
    assert_eq!(second.read(|s| s.chat.history().len()).await, 1);

    second.logout().await.expect("logout");
    let third = client_for(&base, CredentialStore::file(&path));
    assert!(matches!(
        third.fetch_history().await,
        Err(ClientError::Unauthenticated)
    ));
}

#[tokio::test]
async fn bad_token_is_rejected_by_backend() {
    let (base, _) = start_mock().await;
    let backend = HttpBackend::new(format!("{}/", base));
    assert_eq!(backend.base_url(), base);
    let err = backend.list_chats("nope").await.unwrap_err();
    assert_eq!(err.reason_or("Failed to fetch chat history"), "Unauthorized");
}

#[tokio::test]
async fn ids_with_reserved_characters_reach_the_right_chat() {
    let (base, shared) = start_mock().await;
    let odd_id = "team/notes?draft#1";
    let now = chrono::Utc::now();
    shared.lock().unwrap().chats.push(Conversation {
        id: odd_id.to_string(),
        title: "Old".to_string(),
        created_at: now,
        updated_at: now,
        messages: Vec::new(),
    });

    let backend = HttpBackend::new(&base);
    let renamed = backend.update_chat(TOKEN, odd_id, "New").await.expect("update");
    assert_eq!(renamed.id, odd_id);
    assert_eq!(renamed.title, "New");
    backend.delete_chat(TOKEN, odd_id).await.expect("delete");
    assert!(shared.lock().unwrap().chats.is_empty());
}
