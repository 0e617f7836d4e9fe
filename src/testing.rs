//! In-memory stand-ins for the remote API, used by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{TimeZone, Utc};

use crate::api::{ApiError, AuthApi, TaskApi};
use crate::models::{NewTask, Session, Task, TaskUpdate};

pub fn make_task(id: &str, title: &str) -> Task {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).single().unwrap();
    Task {
        id: id.to_string(),
        title: title.to_string(),
        description: None,
        completed: false,
        due_date: None,
        created_at: at,
        updated_at: at,
        user_id: Some("u1".to_string()),
    }
}

#[derive(Default)]
pub struct FakeApi {
    logins: Mutex<VecDeque<Result<Session, ApiError>>>,
    signups: Mutex<VecDeque<Result<String, ApiError>>>,
    lists: Mutex<VecDeque<Result<Vec<Task>, ApiError>>>,
    creates: Mutex<VecDeque<Result<String, ApiError>>>,
    updates: Mutex<VecDeque<Result<Task, ApiError>>>,
    deletes: Mutex<VecDeque<Result<(), ApiError>>>,
    pub calls: Mutex<Vec<String>>,
    pub created: Mutex<Vec<NewTask>>,
    pub updated: Mutex<Vec<(String, TaskUpdate)>>,
}

fn next<T>(queue: &Mutex<VecDeque<Result<T, ApiError>>>, op: &str) -> Result<T, ApiError> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(ApiError::new(format!("no {op} response queued"))))
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_login(&self, result: Result<Session, ApiError>) {
        self.logins.lock().unwrap().push_back(result);
    }

    pub fn push_signup(&self, result: Result<String, ApiError>) {
        self.signups.lock().unwrap().push_back(result);
    }

    pub fn push_list(&self, result: Result<Vec<Task>, ApiError>) {
        self.lists.lock().unwrap().push_back(result);
    }

    pub fn push_create(&self, result: Result<String, ApiError>) {
        self.creates.lock().unwrap().push_back(result);
    }

    pub fn push_update(&self, result: Result<Task, ApiError>) {
        self.updates.lock().unwrap().push_back(result);
    }

    pub fn push_delete(&self, result: Result<(), ApiError>) {
        self.deletes.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl AuthApi for FakeApi {
    async fn login(&self, email: &str, _password: &str) -> Result<Session, ApiError> {
        self.record(format!("login {email}"));
        next(&self.logins, "login")
    }

    async fn signup(
        &self,
        _display_name: &str,
        email: &str,
        _password: &str,
    ) -> Result<String, ApiError> {
        self.record(format!("signup {email}"));
        next(&self.signups, "signup")
    }
}

impl TaskApi for FakeApi {
    async fn list_tasks(&self, token: &str) -> Result<Vec<Task>, ApiError> {
        self.record(format!("list {token}"));
        next(&self.lists, "list")
    }

    async fn create_task(&self, token: &str, task: &NewTask) -> Result<String, ApiError> {
        self.record(format!("create {token}"));
        self.created.lock().unwrap().push(task.clone());
        next(&self.creates, "create")
    }

    async fn update_task(
        &self,
        token: &str,
        id: &str,
        update: &TaskUpdate,
    ) -> Result<Task, ApiError> {
        self.record(format!("update {token} {id}"));
        self.updated
            .lock()
            .unwrap()
            .push((id.to_string(), update.clone()));
        next(&self.updates, "update")
    }

    async fn delete_task(&self, token: &str, id: &str) -> Result<(), ApiError> {
        self.record(format!("delete {token} {id}"));
        next(&self.deletes, "delete")
    }
}
