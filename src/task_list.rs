use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::api::{ApiError, TaskApi};
use crate::clock::{Clock, SystemClock};
use crate::due::TimeFormat;
use crate::events::{Alert, TITLE_DELETE_FAILED, TITLE_LOAD_FAILED, TITLE_UPDATE_FAILED};
use crate::models::{DateFilter, Filters, StatusFilter, Task, TaskUpdate};
use crate::view::{apply_filters, build_views, greeting, Greeting, TaskCounts, TaskView};

/// What happened to a network result when it came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Superseded by newer local state; dropped without touching the cache.
    Stale,
    NotFound,
}

/// Handle for one in-flight fetch. Cancelled when a newer fetch starts or the list unmounts.
#[derive(Debug)]
pub struct HydrateTicket {
    cancelled: Arc<AtomicBool>,
}

impl HydrateTicket {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct PendingToggle {
    pub id: String,
    /// Full field set with the flipped completion, as sent to the server.
    pub update: TaskUpdate,
    snapshot: Vec<Task>,
    revision: u64,
}

#[derive(Debug)]
pub struct PendingDelete {
    pub id: String,
    index: usize,
    removed: Task,
    snapshot: Vec<Task>,
    revision: u64,
}

/// A task taken out by an in-flight delete.
#[derive(Debug, Default)]
struct Held {
    /// Revision of the toggle that was still pending when the delete started.
    prior: Option<u64>,
    /// Completion to put back if the delete fails; set when that toggle failed meanwhile.
    completed: Option<bool>,
}

/// All cache writes go through `commit`. A rollback restores the full snapshot only if nothing
/// else touched the cache since, otherwise undoes just its own task if that task's revision is
/// still current.
pub struct TaskList {
    tasks: Vec<Task>,
    views: Vec<TaskView>,
    visible: Vec<TaskView>,
    counts: TaskCounts,
    filters: Filters,
    search_open: bool,
    loading: bool,
    selected: Option<Task>,
    confirm_delete: Option<String>,
    alerts: Vec<Alert>,
    revision: u64,
    task_revisions: HashMap<String, u64>,
    held: HashMap<String, Held>,
    hydration: Option<Arc<AtomicBool>>,
    needs_hydrate: bool,
    clock: Box<dyn Clock>,
    time_format: TimeFormat,
}

impl Default for TaskList {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskList {
    pub fn new() -> Self {
        Self::with_clock(SystemClock, TimeFormat::detect())
    }

    pub fn with_clock(clock: impl Clock + 'static, time_format: TimeFormat) -> Self {
        Self {
            tasks: Vec::new(),
            views: Vec::new(),
            visible: Vec::new(),
            counts: TaskCounts::default(),
            filters: Filters::default(),
            search_open: false,
            loading: false,
            selected: None,
            confirm_delete: None,
            alerts: Vec::new(),
            revision: 0,
            task_revisions: HashMap::new(),
            held: HashMap::new(),
            hydration: None,
            needs_hydrate: true,
            clock: Box::new(clock),
            time_format,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Every task with its due classification, in server order.
    pub fn views(&self) -> &[TaskView] {
        &self.views
    }

    /// The filtered list the screen renders.
    pub fn visible(&self) -> &[TaskView] {
        &self.visible
    }

    pub fn counts(&self) -> TaskCounts {
        self.counts
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// True until the first fetch is started on this list.
    pub fn needs_hydrate(&self) -> bool {
        self.needs_hydrate
    }

    pub fn search_open(&self) -> bool {
        self.search_open
    }

    pub fn selected(&self) -> Option<&Task> {
        self.selected.as_ref()
    }

    pub fn pending_confirmation(&self) -> Option<&str> {
        self.confirm_delete.as_deref()
    }

    pub fn take_alerts(&mut self) -> Vec<Alert> {
        std::mem::take(&mut self.alerts)
    }

    pub fn greeting(&self, user_name: &str) -> Greeting {
        greeting(user_name, &self.clock.now())
    }

    fn commit(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.revision += 1;
        self.refresh();
    }

    /// Re-derives views against the current clock, e.g. after midnight passes.
    pub fn refresh(&mut self) {
        let now = self.clock.now();
        self.views = build_views(&self.tasks, &now, self.time_format);
        self.visible = apply_filters(&self.views, &self.filters);
        self.counts = TaskCounts::of(&self.tasks);
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|task| task.id == id)
    }

    fn task_is_current(&self, id: &str, revision: u64) -> bool {
        self.task_revisions.get(id) == Some(&revision)
    }

    /// The delete holding `id` started while the toggle at `revision` was pending.
    fn held_over(&mut self, id: &str, revision: u64) -> Option<&mut Held> {
        self.held
            .get_mut(id)
            .filter(|held| held.prior == Some(revision))
    }

    pub fn set_date_filter(&mut self, date: DateFilter) {
        self.filters.date = date;
        self.refresh();
    }

    pub fn set_status_filter(&mut self, status: StatusFilter) {
        self.filters.status = status;
        self.refresh();
    }

    pub fn set_query(&mut self, query: &str) {
        self.filters.query = query.to_string();
        self.refresh();
    }

    /// Closing the search bar clears the query.
    pub fn toggle_search(&mut self) {
        self.search_open = !self.search_open;
        if !self.search_open && !self.filters.query.is_empty() {
            self.filters.query.clear();
            self.refresh();
        }
    }

    pub fn select(&mut self, id: &str) -> Option<&Task> {
        let index = self.position(id)?;
        self.selected = Some(self.tasks[index].clone());
        self.selected.as_ref()
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Closes the detail view and hands back its task for the edit screen.
    pub fn edit_selected(&mut self) -> Option<Task> {
        self.selected.take()
    }

    pub fn task_for_edit(&self, id: &str) -> Option<Task> {
        self.position(id).map(|index| self.tasks[index].clone())
    }

    pub fn begin_hydrate(&mut self) -> HydrateTicket {
        if let Some(previous) = self.hydration.take() {
            previous.store(true, Ordering::SeqCst);
        }
        let cancelled = Arc::new(AtomicBool::new(false));
        self.hydration = Some(cancelled.clone());
        self.needs_hydrate = false;
        self.loading = true;
        HydrateTicket { cancelled }
    }

    pub fn finish_hydrate(
        &mut self,
        ticket: HydrateTicket,
        result: Result<Vec<Task>, ApiError>,
    ) -> Result<Outcome, ApiError> {
        if ticket.is_cancelled() {
            log::debug!("discarding superseded task list response");
            return Ok(Outcome::Stale);
        }
        self.hydration = None;
        self.loading = false;
        match result {
            Ok(tasks) => {
                log::info!("task list hydrated count={}", tasks.len());
                self.task_revisions.clear();
                self.held.clear();
                self.commit(tasks);
                Ok(Outcome::Applied)
            }
            Err(error) => {
                log::error!("failed to fetch tasks err={error}");
                self.alerts
                    .push(Alert::new(TITLE_LOAD_FAILED, error.message.clone()));
                Err(error)
            }
        }
    }

    /// The view is going away; any in-flight fetch must not land.
    pub fn unmount(&mut self) {
        if let Some(flag) = self.hydration.take() {
            flag.store(true, Ordering::SeqCst);
        }
        self.loading = false;
    }

    pub async fn hydrate(&mut self, api: &impl TaskApi, token: &str) -> Result<Outcome, ApiError> {
        let ticket = self.begin_hydrate();
        let result = api.list_tasks(token).await;
        self.finish_hydrate(ticket, result)
    }

    /// Flips completion locally and returns what must be sent to the server.
    pub fn begin_toggle(&mut self, id: &str) -> Option<PendingToggle> {
        let index = self.position(id)?;
        let snapshot = self.tasks.clone();
        let mut update = TaskUpdate::from_task(&snapshot[index]);
        update.completed = !update.completed;

        let mut next = snapshot.clone();
        next[index].completed = update.completed;
        self.commit(next);
        self.task_revisions.insert(id.to_string(), self.revision);

        Some(PendingToggle {
            id: id.to_string(),
            update,
            snapshot,
            revision: self.revision,
        })
    }

    pub fn finish_toggle(
        &mut self,
        pending: PendingToggle,
        result: Result<Task, ApiError>,
    ) -> Result<Outcome, ApiError> {
        let task_current = self.task_is_current(&pending.id, pending.revision);
        match result {
            Ok(server_task) => {
                if !task_current {
                    if let Some(held) = self.held_over(&pending.id, pending.revision) {
                        held.prior = None;
                    }
                    log::debug!("dropping stale toggle result id={}", pending.id);
                    return Ok(Outcome::Stale);
                }
                self.task_revisions.remove(&pending.id);
                if server_task.id != pending.id {
                    log::warn!(
                        "update response id mismatch expected={} got={}",
                        pending.id,
                        server_task.id
                    );
                    return Ok(Outcome::Applied);
                }
                if let Some(index) = self.position(&pending.id) {
                    let mut next = self.tasks.clone();
                    next[index] = server_task;
                    self.commit(next);
                }
                Ok(Outcome::Applied)
            }
            Err(error) => {
                log::error!("failed to toggle task id={} err={error}", pending.id);
                self.alerts
                    .push(Alert::new(TITLE_UPDATE_FAILED, error.message.clone()));
                let undone = !pending.update.completed;
                if self.revision == pending.revision {
                    self.task_revisions.remove(&pending.id);
                    self.commit(pending.snapshot);
                } else if task_current {
                    self.task_revisions.remove(&pending.id);
                    if let Some(index) = self.position(&pending.id) {
                        let mut next = self.tasks.clone();
                        next[index].completed = undone;
                        self.commit(next);
                    }
                } else if let Some(held) = self.held_over(&pending.id, pending.revision) {
                    held.prior = None;
                    held.completed = Some(undone);
                } else {
                    log::debug!("dropping stale toggle rollback id={}", pending.id);
                }
                Err(error)
            }
        }
    }

    pub async fn toggle(
        &mut self,
        api: &impl TaskApi,
        token: &str,
        id: &str,
    ) -> Result<Outcome, ApiError> {
        let Some(pending) = self.begin_toggle(id) else {
            return Ok(Outcome::NotFound);
        };
        let result = api.update_task(token, &pending.id, &pending.update).await;
        self.finish_toggle(pending, result)
    }

    /// Asks for confirmation; returns the prompt to show.
    pub fn request_delete(&mut self, id: &str) -> Option<String> {
        let index = self.position(id)?;
        let prompt = format!("Delete \"{}\"?", self.tasks[index].title);
        self.confirm_delete = Some(id.to_string());
        Some(prompt)
    }

    pub fn cancel_delete(&mut self) {
        self.confirm_delete = None;
    }

    /// Removes the confirmed task locally and returns the request to send.
    pub fn confirm_delete(&mut self) -> Option<PendingDelete> {
        let id = self.confirm_delete.take()?;
        let index = self.position(&id)?;
        let snapshot = self.tasks.clone();
        let mut next = snapshot.clone();
        let removed = next.remove(index);
        self.commit(next);
        let prior = self.task_revisions.insert(id.clone(), self.revision);
        self.held.insert(
            id.clone(),
            Held {
                prior,
                completed: None,
            },
        );

        Some(PendingDelete {
            id,
            index,
            removed,
            snapshot,
            revision: self.revision,
        })
    }

    pub fn finish_delete(
        &mut self,
        pending: PendingDelete,
        result: Result<(), ApiError>,
    ) -> Result<Outcome, ApiError> {
        let task_current = self.task_is_current(&pending.id, pending.revision);
        let held = self.held.remove(&pending.id).unwrap_or_default();
        match result {
            Ok(()) => {
                if task_current {
                    self.task_revisions.remove(&pending.id);
                }
                Ok(Outcome::Applied)
            }
            Err(error) => {
                log::error!("failed to delete task id={} err={error}", pending.id);
                self.alerts
                    .push(Alert::new(TITLE_DELETE_FAILED, error.message.clone()));
                let next = if self.revision == pending.revision {
                    Some(pending.snapshot)
                } else if task_current && self.position(&pending.id).is_none() {
                    let mut next = self.tasks.clone();
                    let index = pending.index.min(next.len());
                    next.insert(index, pending.removed);
                    Some(next)
                } else {
                    log::debug!("dropping stale delete rollback id={}", pending.id);
                    None
                };
                if let Some(mut next) = next {
                    if let Some(completed) = held.completed {
                        for task in next.iter_mut().filter(|task| task.id == pending.id) {
                            task.completed = completed;
                        }
                    }
                    // A toggle still in flight owns the task again.
                    match held.prior {
                        Some(prior) => self.task_revisions.insert(pending.id.clone(), prior),
                        None => self.task_revisions.remove(&pending.id),
                    };
                    self.commit(next);
                }
                Err(error)
            }
        }
    }

    pub async fn delete_confirmed(
        &mut self,
        api: &impl TaskApi,
        token: &str,
    ) -> Result<Outcome, ApiError> {
        let Some(pending) = self.confirm_delete() else {
            return Ok(Outcome::NotFound);
        };
        let result = api.delete_task(token, &pending.id).await;
        self.finish_delete(pending, result)
    }
}
