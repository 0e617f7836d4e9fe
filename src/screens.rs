use crate::models::{Session, Task};

#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Login,
    Signup,
    TaskList,
    CreateTask,
    EditTask(Task),
}

impl Screen {
    pub fn boot(has_session: bool) -> Self {
        if has_session {
            Screen::TaskList
        } else {
            Screen::Login
        }
    }

    /// Screens that need a signed-in user.
    pub fn requires_session(&self) -> bool {
        matches!(
            self,
            Screen::TaskList | Screen::CreateTask | Screen::EditTask(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Screen::Login => "login",
            Screen::Signup => "signup",
            Screen::TaskList => "task_list",
            Screen::CreateTask => "create_task",
            Screen::EditTask(_) => "edit_task",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NavEvent {
    SignupLink,
    LoginLink,
    SignupSucceeded,
    AuthSucceeded(Session),
    CreatePressed,
    EditRequested(Option<Task>),
    Done,
    Back,
    Logout,
}

impl NavEvent {
    fn name(&self) -> &'static str {
        match self {
            NavEvent::SignupLink => "signup_link",
            NavEvent::LoginLink => "login_link",
            NavEvent::SignupSucceeded => "signup_succeeded",
            NavEvent::AuthSucceeded(_) => "auth_succeeded",
            NavEvent::CreatePressed => "create_pressed",
            NavEvent::EditRequested(_) => "edit_requested",
            NavEvent::Done => "done",
            NavEvent::Back => "back",
            NavEvent::Logout => "logout",
        }
    }
}

/// Next screen for `event`. Events that make no sense on `current` leave it unchanged.
///
/// `has_session` is the session state after the event's side effects have run.
pub fn transition(current: &Screen, event: &NavEvent, has_session: bool) -> Screen {
    let next = match (current, event) {
        (Screen::Login, NavEvent::SignupLink) => Some(Screen::Signup),
        (Screen::Signup, NavEvent::LoginLink | NavEvent::SignupSucceeded) => Some(Screen::Login),
        (Screen::Login, NavEvent::AuthSucceeded(_)) => Some(Screen::TaskList),
        (Screen::TaskList, NavEvent::CreatePressed) => Some(Screen::CreateTask),
        (Screen::TaskList, NavEvent::EditRequested(Some(task))) => {
            Some(Screen::EditTask(task.clone()))
        }
        (Screen::TaskList, NavEvent::EditRequested(None)) => {
            log::warn!("edit requested without a task; staying on task list");
            Some(Screen::TaskList)
        }
        (Screen::CreateTask | Screen::EditTask(_), NavEvent::Done | NavEvent::Back) => {
            Some(Screen::TaskList)
        }
        (Screen::TaskList, NavEvent::Logout) => Some(Screen::Login),
        _ => None,
    };

    let next = match next {
        Some(next) => next,
        None => {
            log::warn!(
                "ignoring navigation event={} screen={}",
                event.name(),
                current.name()
            );
            current.clone()
        }
    };

    if next.requires_session() && !has_session {
        log::warn!("no session for screen={}; falling back to login", next.name());
        return Screen::Login;
    }
    next
}
