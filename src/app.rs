use std::sync::Arc;

use crate::api::{ApiError, AuthApi, TaskApi};
use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::due::TimeFormat;
use crate::events::{Alert, TITLE_ERROR, TITLE_LOGIN_FAILED, TITLE_SUCCESS};
use crate::forms::{
    Credentials, LoginForm, Registration, SignupForm, SubmitError, SubmitGuard, TaskForm,
    ValidationErrors,
};
use crate::models::{NewTask, Session, Task, TaskUpdate};
use crate::screens::{transition, NavEvent, Screen};
use crate::storage::SessionStore;
use crate::task_list::{Outcome, TaskList};
use crate::view::Greeting;

/// A validated request and its bearer token.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission<T> {
    pub token: String,
    pub body: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskEdit {
    pub id: String,
    pub update: TaskUpdate,
}

/// Root controller over the session, the current screen and the mounted task list.
pub struct App<A> {
    api: A,
    store: SessionStore,
    session: Option<Session>,
    screen: Screen,
    task_list: Option<TaskList>,
    delete_requested: bool,
    guard: SubmitGuard,
    alerts: Vec<Alert>,
    clock: Arc<dyn Clock>,
    time_format: TimeFormat,
}

impl<A> App<A> {
    pub fn boot(api: A, config: &ClientConfig) -> Self {
        Self::boot_with_clock(api, config, Arc::new(SystemClock), TimeFormat::detect())
    }

    pub fn boot_with_clock(
        api: A,
        config: &ClientConfig,
        clock: Arc<dyn Clock>,
        time_format: TimeFormat,
    ) -> Self {
        let store = SessionStore::new(config.data_dir().to_path_buf());
        let session = store.load();
        let first = Screen::boot(session.is_some());
        log::info!(
            "app booted signed_in={} screen={}",
            session.is_some(),
            first.name()
        );

        let mut app = Self {
            api,
            store,
            session,
            screen: Screen::Login,
            task_list: None,
            delete_requested: false,
            guard: SubmitGuard::default(),
            alerts: Vec::new(),
            clock,
            time_format,
        };
        app.enter(first);
        app
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.token.as_str())
    }

    pub fn task_list(&self) -> Option<&TaskList> {
        self.task_list.as_ref()
    }

    pub fn task_list_mut(&mut self) -> Option<&mut TaskList> {
        self.task_list.as_mut()
    }

    pub fn is_submitting(&self) -> bool {
        self.guard.is_submitting()
    }

    /// The list screen was just mounted and has not fetched yet.
    pub fn needs_hydrate(&self) -> bool {
        self.task_list
            .as_ref()
            .is_some_and(TaskList::needs_hydrate)
    }

    pub fn greeting(&self) -> Option<Greeting> {
        let session = self.session.as_ref()?;
        let list = self.task_list.as_ref()?;
        Some(list.greeting(&session.user_name()))
    }

    /// Drains pending dialogs, form alerts first.
    pub fn take_alerts(&mut self) -> Vec<Alert> {
        let mut alerts = std::mem::take(&mut self.alerts);
        if let Some(list) = self.task_list.as_mut() {
            alerts.extend(list.take_alerts());
        }
        alerts
    }

    pub fn dispatch(&mut self, event: NavEvent) -> &Screen {
        if event == NavEvent::Back && self.guard.is_submitting() {
            log::debug!("back ignored while submitting screen={}", self.screen.name());
            return &self.screen;
        }
        match &event {
            NavEvent::AuthSucceeded(session) if self.screen == Screen::Login => {
                self.store.save(session);
                self.session = Some(session.clone());
            }
            NavEvent::Logout if self.screen == Screen::TaskList => {
                log::info!("signing out");
                self.session = None;
                self.store.clear();
            }
            _ => {}
        }
        let next = transition(&self.screen, &event, self.session.is_some());
        self.enter(next);
        &self.screen
    }

    fn enter(&mut self, next: Screen) {
        if next != Screen::TaskList {
            if let Some(mut list) = self.task_list.take() {
                list.unmount();
            }
        } else if self.task_list.is_none() {
            self.task_list = Some(TaskList::with_clock(self.clock.clone(), self.time_format));
        }
        if !matches!(next, Screen::EditTask(_)) {
            self.delete_requested = false;
        }
        self.screen = next;
    }

    /// Opens the edit screen for a task in the list.
    pub fn edit_task(&mut self, id: &str) -> &Screen {
        let task = self.task_list.as_ref().and_then(|list| list.task_for_edit(id));
        self.dispatch(NavEvent::EditRequested(task))
    }

    /// Opens the edit screen for the task shown in the detail view.
    pub fn edit_selected(&mut self) -> &Screen {
        let task = self.task_list.as_mut().and_then(TaskList::edit_selected);
        self.dispatch(NavEvent::EditRequested(task))
    }

    fn begin<T>(&mut self, validated: Result<T, ValidationErrors>) -> Result<T, SubmitError> {
        if self.guard.is_submitting() {
            return Err(SubmitError::InFlight);
        }
        let value = validated?;
        self.guard.try_begin()?;
        Ok(value)
    }

    fn signed_in(&self) -> Result<String, SubmitError> {
        self.token()
            .map(str::to_string)
            .ok_or(SubmitError::Unavailable("not signed in"))
    }

    fn editing(&self) -> Result<&Task, SubmitError> {
        match &self.screen {
            Screen::EditTask(task) => Ok(task),
            _ => Err(SubmitError::Unavailable("no task is being edited")),
        }
    }

    fn fail(&mut self, title: &str, error: ApiError) -> SubmitError {
        self.alerts.push(Alert::new(title, error.message.clone()));
        SubmitError::Api(error)
    }

    pub fn begin_login(&mut self, form: &LoginForm) -> Result<Credentials, SubmitError> {
        self.begin(form.validate())
    }

    pub fn finish_login(&mut self, result: Result<Session, ApiError>) -> Result<(), SubmitError> {
        self.guard.finish();
        match result {
            Ok(session) => {
                self.dispatch(NavEvent::AuthSucceeded(session));
                Ok(())
            }
            Err(error) => {
                log::warn!("login failed err={error}");
                Err(self.fail(TITLE_LOGIN_FAILED, error))
            }
        }
    }

    pub fn begin_signup(&mut self, form: &SignupForm) -> Result<Registration, SubmitError> {
        self.begin(form.validate())
    }

    /// On success returns the server's confirmation and moves back to login.
    pub fn finish_signup(&mut self, result: Result<String, ApiError>) -> Result<String, SubmitError> {
        self.guard.finish();
        match result {
            Ok(message) => {
                log::info!("account created");
                self.alerts.push(Alert::new(TITLE_SUCCESS, message.clone()));
                self.dispatch(NavEvent::SignupSucceeded);
                Ok(message)
            }
            Err(error) => {
                log::warn!("signup failed err={error}");
                Err(self.fail(TITLE_ERROR, error))
            }
        }
    }

    pub fn begin_create(&mut self, form: &TaskForm) -> Result<Submission<NewTask>, SubmitError> {
        let token = self.signed_in()?;
        let body = self.begin(form.to_new_task())?;
        Ok(Submission { token, body })
    }

    pub fn finish_create(&mut self, result: Result<String, ApiError>) -> Result<String, SubmitError> {
        self.guard.finish();
        match result {
            Ok(message) => {
                log::info!("task created message={message}");
                self.dispatch(NavEvent::Done);
                Ok(message)
            }
            Err(error) => {
                log::error!("failed to create task err={error}");
                Err(self.fail(TITLE_ERROR, error))
            }
        }
    }

    pub fn begin_save(&mut self, form: &TaskForm) -> Result<Submission<TaskEdit>, SubmitError> {
        let token = self.signed_in()?;
        let id = self.editing()?.id.clone();
        let update = self.begin(form.to_update())?;
        Ok(Submission {
            token,
            body: TaskEdit { id, update },
        })
    }

    pub fn finish_save(&mut self, result: Result<Task, ApiError>) -> Result<Task, SubmitError> {
        self.guard.finish();
        match result {
            Ok(task) => {
                self.dispatch(NavEvent::Done);
                Ok(task)
            }
            Err(error) => {
                log::error!("failed to save task err={error}");
                Err(self.fail(TITLE_ERROR, error))
            }
        }
    }

    /// Asks to delete the task on the edit screen. Returns the prompt to show.
    pub fn request_delete_editing(&mut self) -> Option<String> {
        if self.guard.is_submitting() {
            return None;
        }
        let prompt = format!("Delete \"{}\"?", self.editing().ok()?.title);
        self.delete_requested = true;
        Some(prompt)
    }

    pub fn cancel_delete_editing(&mut self) {
        self.delete_requested = false;
    }

    pub fn begin_delete_editing(&mut self) -> Result<Submission<String>, SubmitError> {
        if !self.delete_requested {
            return Err(SubmitError::Unavailable("delete was not confirmed"));
        }
        let token = self.signed_in()?;
        let id = self.editing()?.id.clone();
        self.begin(Ok(id.clone()))?;
        self.delete_requested = false;
        Ok(Submission { token, body: id })
    }

    pub fn finish_delete_editing(&mut self, result: Result<(), ApiError>) -> Result<(), SubmitError> {
        self.guard.finish();
        match result {
            Ok(()) => {
                self.dispatch(NavEvent::Done);
                Ok(())
            }
            Err(error) => {
                log::error!("failed to delete task err={error}");
                Err(self.fail(TITLE_ERROR, error))
            }
        }
    }
}

impl<A: AuthApi> App<A> {
    pub async fn login(&mut self, form: &LoginForm) -> Result<(), SubmitError> {
        let credentials = self.begin_login(form)?;
        let result = self
            .api
            .login(&credentials.email, &credentials.password)
            .await;
        self.finish_login(result)
    }

    pub async fn signup(&mut self, form: &SignupForm) -> Result<String, SubmitError> {
        let registration = self.begin_signup(form)?;
        let result = self
            .api
            .signup(
                &registration.display_name,
                &registration.email,
                &registration.password,
            )
            .await;
        self.finish_signup(result)
    }
}

impl<A: TaskApi> App<A> {
    /// Fetches the task list if it is mounted.
    pub async fn hydrate(&mut self) -> Result<Outcome, ApiError> {
        let (Some(list), Some(session)) = (self.task_list.as_mut(), self.session.as_ref()) else {
            return Ok(Outcome::NotFound);
        };
        list.hydrate(&self.api, &session.token).await
    }

    pub async fn toggle_task(&mut self, id: &str) -> Result<Outcome, ApiError> {
        let (Some(list), Some(session)) = (self.task_list.as_mut(), self.session.as_ref()) else {
            return Ok(Outcome::NotFound);
        };
        list.toggle(&self.api, &session.token, id).await
    }

    /// Sends the delete confirmed on the list screen.
    pub async fn delete_confirmed(&mut self) -> Result<Outcome, ApiError> {
        let (Some(list), Some(session)) = (self.task_list.as_mut(), self.session.as_ref()) else {
            return Ok(Outcome::NotFound);
        };
        list.delete_confirmed(&self.api, &session.token).await
    }

    pub async fn create_task(&mut self, form: &TaskForm) -> Result<String, SubmitError> {
        let submission = self.begin_create(form)?;
        let result = self
            .api
            .create_task(&submission.token, &submission.body)
            .await;
        self.finish_create(result)
    }

    pub async fn save_task(&mut self, form: &TaskForm) -> Result<Task, SubmitError> {
        let submission = self.begin_save(form)?;
        let edit = &submission.body;
        let result = self
            .api
            .update_task(&submission.token, &edit.id, &edit.update)
            .await;
        self.finish_save(result)
    }

    pub async fn delete_editing(&mut self) -> Result<(), SubmitError> {
        let submission = self.begin_delete_editing()?;
        let result = self
            .api
            .delete_task(&submission.token, &submission.body)
            .await;
        self.finish_delete_editing(result)
    }
}
