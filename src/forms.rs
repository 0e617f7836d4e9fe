use std::collections::BTreeMap;

use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};

use crate::api::ApiError;
use crate::due::{classify_with, parse_timestamp, to_iso, TimeFormat};
use crate::models::{NewTask, Task, TaskUpdate};

pub const MSG_EMAIL_REQUIRED: &str = "Please enter your email";
pub const MSG_PASSWORD_REQUIRED: &str = "Please enter your password";
pub const MSG_DISPLAY_NAME_REQUIRED: &str = "Please enter a display name";
pub const MSG_TITLE_REQUIRED: &str = "Please enter a title";
pub const NO_DUE_DATE: &str = "No due date";

/// Inline, per-field messages. Keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<&'static str, &'static str>,
}

impl ValidationErrors {
    fn require(&mut self, field: &'static str, value: &str, message: &'static str) {
        if value.trim().is_empty() {
            self.fields.insert(field, message);
        }
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.fields.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    pub fn get(&self, field: &str) -> Option<&'static str> {
        self.fields.get(field).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<&str> = self.fields.values().copied().collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Debug)]
pub enum SubmitError {
    Validation(ValidationErrors),
    /// The same form is already waiting on the server.
    InFlight,
    /// Something the form needs is missing, such as a session or a task being edited.
    Unavailable(&'static str),
    Api(ApiError),
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::Validation(err) => write!(f, "validation failed: {err}"),
            SubmitError::InFlight => write!(f, "a submission is already in progress"),
            SubmitError::Unavailable(what) => write!(f, "cannot submit: {what}"),
            SubmitError::Api(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SubmitError {}

impl From<ValidationErrors> for SubmitError {
    fn from(value: ValidationErrors) -> Self {
        SubmitError::Validation(value)
    }
}

impl From<ApiError> for SubmitError {
    fn from(value: ApiError) -> Self {
        SubmitError::Api(value)
    }
}

/// Double-submit guard for one form flow.
#[derive(Debug, Default)]
pub struct SubmitGuard {
    submitting: bool,
}

impl SubmitGuard {
    pub fn try_begin(&mut self) -> Result<(), SubmitError> {
        if self.submitting {
            return Err(SubmitError::InFlight);
        }
        self.submitting = true;
        Ok(())
    }

    pub fn finish(&mut self) {
        self.submitting = false;
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<Credentials, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.require("email", &self.email, MSG_EMAIL_REQUIRED);
        errors.require("password", &self.password, MSG_PASSWORD_REQUIRED);
        errors.into_result(Credentials {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub display_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub display_name: String,
    pub email: String,
    pub password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<Registration, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.require("display_name", &self.display_name, MSG_DISPLAY_NAME_REQUIRED);
        errors.require("email", &self.email, MSG_EMAIL_REQUIRED);
        errors.require("password", &self.password, MSG_PASSWORD_REQUIRED);
        errors.into_result(Registration {
            display_name: self.display_name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

/// Shortcut buttons next to the date picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueChoice {
    None,
    Today,
    Tomorrow,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub due: Option<DateTime<Utc>>,
    /// Stored due date that could not be parsed; sent back untouched until the due is changed.
    pub unparsed_due: Option<String>,
    pub completed: bool,
}

impl TaskForm {
    pub fn from_task(task: &Task) -> Self {
        let raw = task.due_date.as_deref().filter(|raw| !raw.trim().is_empty());
        let due = raw.and_then(parse_timestamp);
        Self {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            due,
            unparsed_due: raw.filter(|_| due.is_none()).map(str::to_string),
            completed: task.completed,
        }
    }

    pub fn choose_due(&mut self, choice: DueChoice, now: &DateTime<FixedOffset>) {
        self.unparsed_due = None;
        self.due = match choice {
            DueChoice::None => None,
            DueChoice::Today => Some(now.with_timezone(&Utc)),
            DueChoice::Tomorrow => {
                let next = *now + Duration::days(1);
                let next = next
                    .with_second(0)
                    .and_then(|at| at.with_nanosecond(0))
                    .unwrap_or(next);
                Some(next.with_timezone(&Utc))
            }
        };
    }

    pub fn set_due(&mut self, due: Option<DateTime<Utc>>) {
        self.unparsed_due = None;
        self.due = due;
    }

    fn due_date(&self) -> Option<String> {
        self.due
            .as_ref()
            .map(to_iso)
            .or_else(|| self.unparsed_due.clone())
    }

    /// Text shown under the due field.
    pub fn due_display(&self, now: &DateTime<FixedOffset>, format: TimeFormat) -> String {
        let Some(due) = self.due else {
            return NO_DUE_DATE.to_string();
        };
        classify_with(Some(&to_iso(&due)), now, format)
            .label
            .unwrap_or_else(|| NO_DUE_DATE.to_string())
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.require("title", &self.title, MSG_TITLE_REQUIRED);
        errors.into_result(())
    }

    fn description(&self) -> Option<String> {
        Some(self.description.trim())
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    }

    pub fn to_new_task(&self) -> Result<NewTask, ValidationErrors> {
        self.validate()?;
        Ok(NewTask {
            title: self.title.trim().to_string(),
            description: self.description(),
            due_date: self.due_date(),
        })
    }

    pub fn to_update(&self) -> Result<TaskUpdate, ValidationErrors> {
        self.validate()?;
        Ok(TaskUpdate {
            title: self.title.trim().to_string(),
            description: self.description(),
            completed: self.completed,
            due_date: self.due_date(),
        })
    }
}
