use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::due::{parse_timestamp, timestamp_from_millis, to_iso};
use crate::models::{AuthUser, NewTask, Session, Task, TaskUpdate};

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const SIGNUP_PATH: &str = "/api/auth/signup";
pub const LIST_TASKS_PATH: &str = "/api/tasks/all";
pub const CREATE_TASK_PATH: &str = "/api/tasks/createtask";

const DEFAULT_SIGNUP_MESSAGE: &str = "Account created successfully";
const DEFAULT_CREATE_MESSAGE: &str = "Task created successfully";

pub fn task_path(id: &str) -> String {
    format!("/api/tasks/{id}")
}

/// The only failure kind the gateway surfaces: a message fit for a dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(feature = "app")]
impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        ApiError::new(format!("network error: {value}"))
    }
}

#[allow(async_fn_in_trait)]
pub trait AuthApi {
    async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError>;

    /// Returns the server's confirmation message.
    async fn signup(&self, display_name: &str, email: &str, password: &str)
        -> Result<String, ApiError>;
}

#[allow(async_fn_in_trait)]
pub trait TaskApi {
    async fn list_tasks(&self, token: &str) -> Result<Vec<Task>, ApiError>;

    /// Returns the server's confirmation message; the created document is not echoed back.
    async fn create_task(&self, token: &str, task: &NewTask) -> Result<String, ApiError>;

    async fn update_task(&self, token: &str, id: &str, update: &TaskUpdate)
        -> Result<Task, ApiError>;

    async fn delete_task(&self, token: &str, id: &str) -> Result<(), ApiError>;
}

/// A 2xx exchange. `data` is `None` when the body was empty or not JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub data: Option<Value>,
}

impl Response {
    /// For endpoints whose payload matters: an unreadable body is a server error.
    pub fn json(self) -> Result<Value, ApiError> {
        self.data.ok_or_else(|| {
            ApiError::new(format!("Invalid response from server (status {})", self.status))
        })
    }

    /// For endpoints that only carry an optional message.
    pub fn json_or_null(self) -> Value {
        self.data.unwrap_or(Value::Null)
    }
}

/// Non-2xx statuses take their message from `message`, then `error`, then a synthesized
/// status line.
pub fn handle_response(status: u16, body: &str) -> Result<Response, ApiError> {
    let data: Option<Value> = serde_json::from_str(body).ok();
    if (200..300).contains(&status) {
        return Ok(Response { status, data });
    }
    let data = data.unwrap_or(Value::Null);
    let message = non_empty_str(&data, "message")
        .or_else(|| non_empty_str(&data, "error"))
        .map(str::to_string)
        .unwrap_or_else(|| format!("Request failed with status {status}"));
    Err(ApiError::new(message))
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn message_or(data: &Value, default: &str) -> String {
    non_empty_str(data, "message").unwrap_or(default).to_string()
}

pub fn signup_message(data: &Value) -> String {
    message_or(data, DEFAULT_SIGNUP_MESSAGE)
}

pub fn create_message(data: &Value) -> String {
    message_or(data, DEFAULT_CREATE_MESSAGE)
}

/// Builds a session from a login body. Profile fields are read top-level first, then from a
/// nested `user` object.
pub fn session_from_login_body(data: &Value) -> Result<Session, ApiError> {
    let token = match non_empty_str(data, "token") {
        Some(token) => token.to_string(),
        None => {
            log::warn!("login response carried no token");
            return Err(ApiError::new("No token found in the API response"));
        }
    };
    let nested = data.get("user").filter(|user| user.is_object());
    let field = |key: &str| {
        non_empty_str(data, key)
            .or_else(|| nested.and_then(|user| non_empty_str(user, key)))
            .map(str::to_string)
    };
    let user = AuthUser {
        email: field("email").unwrap_or_default(),
        display_name: field("displayName"),
    };
    Ok(Session::new(token, user))
}

fn id_value(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.trim().is_empty() => Some(id.trim().to_string()),
        Value::Number(id) => Some(id.to_string()),
        // Extended JSON as emitted by some Mongo serializers.
        Value::Object(map) => map.get("$oid").and_then(id_value),
        _ => None,
    }
}

/// `_id`, then `id`.
fn document_id(doc: &Value) -> Option<String> {
    doc.get("_id")
        .and_then(id_value)
        .or_else(|| doc.get("id").and_then(id_value))
}

/// Populated `user` object, then raw `user` id, then `userId`.
fn owner_id(doc: &Value) -> Option<String> {
    let owner = match doc.get("user") {
        Some(user @ Value::Object(_)) => document_id(user),
        Some(user) => id_value(user),
        None => None,
    };
    owner.or_else(|| doc.get("userId").and_then(id_value))
}

fn timestamp_field(doc: &Value, key: &str) -> Option<DateTime<Utc>> {
    match doc.get(key)? {
        Value::String(raw) => parse_timestamp(raw),
        Value::Number(millis) => millis.as_i64().and_then(timestamp_from_millis),
        _ => None,
    }
}

/// Normalized to ISO when parseable; an unparseable string is kept as-is and later classified
/// as having no due date.
fn due_date_field(doc: &Value) -> Option<String> {
    match doc.get("dueDate")? {
        Value::String(raw) if raw.trim().is_empty() => None,
        Value::String(raw) => match parse_timestamp(raw) {
            Some(at) => Some(to_iso(&at)),
            None => {
                log::debug!("unparseable dueDate kept verbatim value={raw}");
                Some(raw.clone())
            }
        },
        Value::Number(millis) => millis
            .as_i64()
            .and_then(timestamp_from_millis)
            .map(|at| to_iso(&at)),
        _ => None,
    }
}

/// Maps a server task document, tolerating the shapes the server is known to produce.
pub fn map_task(doc: &Value, now: DateTime<Utc>) -> Result<Task, ApiError> {
    if !doc.is_object() {
        return Err(ApiError::new("Malformed task in server response"));
    }
    let id = document_id(doc).ok_or_else(|| ApiError::new("Task in server response has no id"))?;

    Ok(Task {
        id,
        title: doc
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        description: non_empty_str(doc, "description").map(str::to_string),
        completed: doc.get("completed").and_then(Value::as_bool).unwrap_or(false),
        due_date: due_date_field(doc),
        created_at: timestamp_field(doc, "createdAt").unwrap_or(now),
        updated_at: timestamp_field(doc, "updatedAt").unwrap_or(now),
        user_id: owner_id(doc),
    })
}

/// A missing or non-array `tasks` field is an empty list. Documents that cannot be mapped are
/// skipped.
pub fn tasks_from_list_body(data: &Value, now: DateTime<Utc>) -> Vec<Task> {
    let Some(Value::Array(items)) = data.get("tasks") else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|doc| match map_task(doc, now) {
            Ok(task) => Some(task),
            Err(error) => {
                log::warn!("skipping task document err={error}");
                None
            }
        })
        .collect()
}

/// `task`, then the body itself.
pub fn task_from_update_body(data: &Value, now: DateTime<Utc>) -> Result<Task, ApiError> {
    let doc = data.get("task").filter(|task| task.is_object()).unwrap_or(data);
    map_task(doc, now)
}

#[cfg(feature = "app")]
pub use http::HttpClient;

#[cfg(feature = "app")]
mod http {
    use super::*;
    use crate::config::ClientConfig;

    /// Gateway over `reqwest`. No timeout or retry beyond the transport defaults.
    pub struct HttpClient {
        client: reqwest::Client,
        config: ClientConfig,
    }

    impl HttpClient {
        pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
            let client = reqwest::Client::builder()
                .build()
                .map_err(|err| ApiError::new(format!("failed to build http client: {err}")))?;
            Ok(Self { client, config })
        }

        async fn send(
            &self,
            label: &str,
            request: reqwest::RequestBuilder,
        ) -> Result<Response, ApiError> {
            log::debug!("api request op={label}");
            let resp = request.send().await.map_err(|err| {
                log::warn!("api request failed op={label} err={err}");
                ApiError::from(err)
            })?;
            let status = resp.status().as_u16();
            let text = resp.text().await.map_err(|err| {
                log::warn!("api response unreadable op={label} status={status} err={err}");
                ApiError::from(err)
            })?;
            let result = handle_response(status, &text);
            if let Err(error) = &result {
                log::warn!("api error op={label} status={status} err={error}");
            }
            result
        }
    }

    impl AuthApi for HttpClient {
        async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
            let request = self
                .client
                .post(self.config.endpoint(LOGIN_PATH))
                .json(&serde_json::json!({ "email": email, "password": password }));
            let data = self.send("login", request).await?.json()?;
            session_from_login_body(&data)
        }

        async fn signup(
            &self,
            display_name: &str,
            email: &str,
            password: &str,
        ) -> Result<String, ApiError> {
            let request = self.client.post(self.config.endpoint(SIGNUP_PATH)).json(
                &serde_json::json!({
                    "displayName": display_name,
                    "email": email,
                    "password": password,
                }),
            );
            let data = self.send("signup", request).await?.json_or_null();
            Ok(signup_message(&data))
        }
    }

    impl TaskApi for HttpClient {
        async fn list_tasks(&self, token: &str) -> Result<Vec<Task>, ApiError> {
            let request = self
                .client
                .get(self.config.endpoint(LIST_TASKS_PATH))
                .bearer_auth(token);
            let data = self.send("list_tasks", request).await?.json()?;
            Ok(tasks_from_list_body(&data, Utc::now()))
        }

        async fn create_task(&self, token: &str, task: &NewTask) -> Result<String, ApiError> {
            if task.title.trim().is_empty() {
                return Err(ApiError::new("Title is required"));
            }
            let request = self
                .client
                .post(self.config.endpoint(CREATE_TASK_PATH))
                .bearer_auth(token)
                .json(task);
            let data = self.send("create_task", request).await?.json_or_null();
            Ok(create_message(&data))
        }

        async fn update_task(
            &self,
            token: &str,
            id: &str,
            update: &TaskUpdate,
        ) -> Result<Task, ApiError> {
            let request = self
                .client
                .put(self.config.endpoint(&task_path(id)))
                .bearer_auth(token)
                .json(update);
            let data = self.send("update_task", request).await?.json()?;
            task_from_update_body(&data, Utc::now())
        }

        async fn delete_task(&self, token: &str, id: &str) -> Result<(), ApiError> {
            let request = self
                .client
                .delete(self.config.endpoint(&task_path(id)))
                .bearer_auth(token);
            self.send("delete_task", request).await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 2, 0, 0).single().unwrap()
    }

    #[test]
    fn handle_response_passes_success_bodies_through() {
        let data = handle_response(200, r#"{"tasks":[]}"#).unwrap().json().unwrap();
        assert_eq!(data, json!({ "tasks": [] }));
        assert_eq!(handle_response(204, "").unwrap().json_or_null(), Value::Null);
    }

    #[test]
    fn unreadable_success_body_fails_payload_endpoints() {
        let resp = handle_response(200, "<html>captive portal</html>").unwrap();
        assert_eq!(resp.data, None);
        assert_eq!(resp.clone().json_or_null(), Value::Null);

        let tasks = resp.json().map(|data| tasks_from_list_body(&data, now()));
        assert_eq!(
            tasks.unwrap_err().message,
            "Invalid response from server (status 200)"
        );

        let login = handle_response(201, "")
            .and_then(Response::json)
            .and_then(|data| session_from_login_body(&data));
        assert_eq!(
            login.unwrap_err().message,
            "Invalid response from server (status 201)"
        );
    }

    #[test]
    fn handle_response_error_message_precedence() {
        let err = handle_response(400, r#"{"message":"Email taken","error":"x"}"#).unwrap_err();
        assert_eq!(err.message, "Email taken");

        let err = handle_response(401, r#"{"error":"Unauthorized"}"#).unwrap_err();
        assert_eq!(err.message, "Unauthorized");

        let err = handle_response(502, "<html>bad gateway</html>").unwrap_err();
        assert_eq!(err.message, "Request failed with status 502");

        let err = handle_response(500, r#"{"message":""}"#).unwrap_err();
        assert_eq!(err.message, "Request failed with status 500");
    }

    #[test]
    fn login_body_requires_token() {
        let err = session_from_login_body(&json!({ "email": "a@b.c" })).unwrap_err();
        assert_eq!(err.message, "No token found in the API response");
        assert!(session_from_login_body(&Value::Null).is_err());
    }

    #[test]
    fn login_body_reads_top_level_then_nested_profile() {
        let session = session_from_login_body(&json!({
            "token": "t",
            "email": "top@x.io",
            "user": { "email": "nested@x.io", "displayName": "Nested" }
        }))
        .unwrap();
        assert_eq!(session.token, "t");
        let user = session.user.unwrap();
        assert_eq!(user.email, "top@x.io");
        assert_eq!(user.display_name.as_deref(), Some("Nested"));

        let session = session_from_login_body(&json!({ "token": "t" })).unwrap();
        let user = session.user.unwrap();
        assert_eq!(user.email, "");
        assert_eq!(user.display_name, None);
    }

    #[test]
    fn default_messages_apply_when_server_is_silent() {
        assert_eq!(signup_message(&Value::Null), "Account created successfully");
        assert_eq!(create_message(&json!({})), "Task created successfully");
        assert_eq!(create_message(&json!({ "message": "ok!" })), "ok!");
    }

    #[test]
    fn map_task_prefers_underscore_id_then_id() {
        let task = map_task(&json!({ "_id": "mongo", "id": "plain", "title": "a" }), now()).unwrap();
        assert_eq!(task.id, "mongo");

        let task = map_task(&json!({ "id": "plain", "title": "a" }), now()).unwrap();
        assert_eq!(task.id, "plain");

        let task = map_task(&json!({ "id": 42, "title": "a" }), now()).unwrap();
        assert_eq!(task.id, "42");

        let task = map_task(&json!({ "_id": { "$oid": "abc" }, "title": "a" }), now()).unwrap();
        assert_eq!(task.id, "abc");

        assert!(map_task(&json!({ "title": "a" }), now()).is_err());
        assert!(map_task(&json!("nope"), now()).is_err());
    }

    #[test]
    fn map_task_owner_fallbacks() {
        let populated = json!({ "_id": "1", "title": "a", "user": { "_id": "u1", "email": "x" } });
        assert_eq!(map_task(&populated, now()).unwrap().user_id.as_deref(), Some("u1"));

        let raw = json!({ "_id": "1", "title": "a", "user": "u2" });
        assert_eq!(map_task(&raw, now()).unwrap().user_id.as_deref(), Some("u2"));

        let legacy = json!({ "_id": "1", "title": "a", "userId": "u3" });
        assert_eq!(map_task(&legacy, now()).unwrap().user_id.as_deref(), Some("u3"));

        let none = json!({ "_id": "1", "title": "a", "user": null });
        assert_eq!(map_task(&none, now()).unwrap().user_id, None);
    }

    #[test]
    fn map_task_defaults_missing_fields() {
        let task = map_task(&json!({ "_id": "1", "title": "a", "description": "" }), now()).unwrap();
        assert!(!task.completed);
        assert_eq!(task.description, None);
        assert_eq!(task.due_date, None);
        assert_eq!(task.created_at, now());
        assert_eq!(task.updated_at, now());

        let task = map_task(&json!({ "_id": "1", "title": "a", "completed": "yes" }), now()).unwrap();
        assert!(!task.completed);
    }

    #[test]
    fn map_task_normalizes_timestamps() {
        let task = map_task(
            &json!({
                "_id": "1",
                "title": "a",
                "completed": true,
                "dueDate": "2024-05-12T15:00:00+07:00",
                "createdAt": "2024-05-01T00:00:00Z",
                "updatedAt": 1714521600000i64
            }),
            now(),
        )
        .unwrap();
        assert!(task.completed);
        assert_eq!(task.due_date.as_deref(), Some("2024-05-12T08:00:00.000Z"));
        assert_eq!(
            task.created_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).single().unwrap()
        );
        assert_eq!(
            task.updated_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).single().unwrap()
        );

        let garbage = map_task(&json!({ "_id": "1", "title": "a", "dueDate": "soon" }), now()).unwrap();
        assert_eq!(garbage.due_date.as_deref(), Some("soon"));
    }

    #[test]
    fn list_body_without_array_is_empty() {
        assert!(tasks_from_list_body(&json!({ "tasks": null }), now()).is_empty());
        assert!(tasks_from_list_body(&json!({}), now()).is_empty());
        let null_body = handle_response(200, "null").unwrap().json().unwrap();
        assert!(tasks_from_list_body(&null_body, now()).is_empty());
        assert!(tasks_from_list_body(&json!({ "tasks": "x" }), now()).is_empty());
    }

    #[test]
    fn list_body_keeps_server_order_and_skips_bad_documents() {
        let data = json!({ "tasks": [
            { "_id": "b", "title": "second" },
            { "title": "no id" },
            { "_id": "a", "title": "first" }
        ]});
        let ids: Vec<_> = tasks_from_list_body(&data, now())
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn update_body_reads_task_then_root() {
        let wrapped = json!({ "task": { "_id": "1", "title": "wrapped" } });
        assert_eq!(task_from_update_body(&wrapped, now()).unwrap().title, "wrapped");

        let bare = json!({ "_id": "2", "title": "bare" });
        assert_eq!(task_from_update_body(&bare, now()).unwrap().title, "bare");

        assert!(task_from_update_body(&json!({ "message": "ok" }), now()).is_err());
    }

    #[test]
    fn task_path_embeds_id() {
        assert_eq!(task_path("abc"), "/api/tasks/abc");
    }
}
