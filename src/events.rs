pub const TITLE_LOAD_FAILED: &str = "Couldn't load tasks";
pub const TITLE_UPDATE_FAILED: &str = "Couldn't update task";
pub const TITLE_DELETE_FAILED: &str = "Couldn't delete task";
pub const TITLE_LOGIN_FAILED: &str = "Login failed";
pub const TITLE_ERROR: &str = "Error";
pub const TITLE_SUCCESS: &str = "Success";

/// A blocking dialog the UI owes the user.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn new(title: &str, message: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            message: message.into(),
        }
    }
}
