use chrono::{DateTime, TimeZone, Timelike};

use crate::due::{classify_with, DueMeta, TimeFormat};
use crate::models::{DateFilter, DueStatus, Filters, StatusFilter, Task};

/// A task as rendered: the task plus its due classification at render time.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskView {
    pub task: Task,
    pub due: DueMeta,
}

pub fn build_views<Tz>(tasks: &[Task], now: &DateTime<Tz>, format: TimeFormat) -> Vec<TaskView>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    tasks
        .iter()
        .map(|task| TaskView {
            due: classify_with(task.due_date.as_deref(), now, format),
            task: task.clone(),
        })
        .collect()
}

fn date_matches(filter: DateFilter, status: DueStatus) -> bool {
    match filter {
        DateFilter::All => true,
        DateFilter::Today => matches!(
            status,
            DueStatus::Today | DueStatus::Overdue | DueStatus::None
        ),
    }
}

fn status_matches(filter: StatusFilter, completed: bool) -> bool {
    match filter {
        StatusFilter::All => true,
        StatusFilter::Active => !completed,
        StatusFilter::Done => completed,
    }
}

fn query_matches(task: &Task, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    task.title.to_lowercase().contains(query)
        || task
            .description
            .as_deref()
            .is_some_and(|desc| desc.to_lowercase().contains(query))
}

/// Date, then status, then search. Output keeps the input order.
pub fn apply_filters(views: &[TaskView], filters: &Filters) -> Vec<TaskView> {
    let query = filters.query.trim().to_lowercase();
    views
        .iter()
        .filter(|view| date_matches(filters.date, view.due.status))
        .filter(|view| status_matches(filters.status, view.task.completed))
        .filter(|view| query_matches(&view.task, &query))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub total: usize,
    pub active: usize,
    pub done: usize,
}

impl TaskCounts {
    pub fn of(tasks: &[Task]) -> Self {
        let done = tasks.iter().filter(|task| task.completed).count();
        Self {
            total: tasks.len(),
            active: tasks.len() - done,
            done,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    pub label: &'static str,
    pub text: String,
}

pub fn greeting<Tz: TimeZone>(user_name: &str, now: &DateTime<Tz>) -> Greeting {
    let label = match now.hour() {
        hour if hour < 12 => "GOOD MORNING",
        hour if hour < 18 => "GOOD AFTERNOON",
        _ => "GOOD EVENING",
    };
    let name = match user_name.trim() {
        "" => "there",
        name => name,
    };
    Greeting {
        label,
        text: format!("{name}, what are you doing today?"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 10, 9, 0, 0)
            .single()
            .unwrap()
    }

    fn task(id: &str, title: &str, completed: bool, due: Option<&str>) -> Task {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).single().unwrap();
        Task {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            completed,
            due_date: due.map(str::to_string),
            created_at: at,
            updated_at: at,
            user_id: None,
        }
    }

    fn sample() -> Vec<Task> {
        let mut with_desc = task("e", "Groceries", false, Some("2024-05-15T02:00:00Z"));
        with_desc.description = Some("Buy MILK and eggs".to_string());
        vec![
            task("a", "Pay rent", false, Some("2024-05-09T02:00:00Z")),
            task("b", "Call mom", true, Some("2024-05-10T05:00:00Z")),
            task("c", "Read book", false, None),
            task("d", "Ship release", true, Some("2024-05-11T02:00:00Z")),
            with_desc,
            task("f", "Broken date", false, Some("someday")),
        ]
    }

    fn ids(views: &[TaskView]) -> Vec<&str> {
        views.iter().map(|v| v.task.id.as_str()).collect()
    }

    fn filters(date: DateFilter, status: StatusFilter, query: &str) -> Filters {
        Filters {
            date,
            status,
            query: query.to_string(),
        }
    }

    #[test]
    fn today_filter_keeps_today_overdue_and_undated() {
        let views = build_views(&sample(), &now(), TimeFormat::H24);
        let out = apply_filters(&views, &filters(DateFilter::Today, StatusFilter::All, ""));
        assert_eq!(ids(&out), vec!["a", "b", "c", "f"]);
    }

    #[test]
    fn status_filter_narrows_by_completion() {
        let views = build_views(&sample(), &now(), TimeFormat::H24);
        let active = apply_filters(&views, &filters(DateFilter::All, StatusFilter::Active, ""));
        assert_eq!(ids(&active), vec!["a", "c", "e", "f"]);
        let done = apply_filters(&views, &filters(DateFilter::All, StatusFilter::Done, ""));
        assert_eq!(ids(&done), vec!["b", "d"]);
    }

    #[test]
    fn search_matches_title_or_description_case_insensitively() {
        let views = build_views(&sample(), &now(), TimeFormat::H24);
        let out = apply_filters(&views, &filters(DateFilter::All, StatusFilter::All, "  milk "));
        assert_eq!(ids(&out), vec!["e"]);
        let out = apply_filters(&views, &filters(DateFilter::All, StatusFilter::All, "CALL"));
        assert_eq!(ids(&out), vec!["b"]);
        let out = apply_filters(&views, &filters(DateFilter::All, StatusFilter::All, "zzz"));
        assert!(out.is_empty());
    }

    #[test]
    fn narrower_filters_yield_subsets() {
        let tasks = sample();
        let views = build_views(&tasks, &now(), TimeFormat::H24);
        let everything = apply_filters(&views, &Filters::default());
        let today = apply_filters(&views, &filters(DateFilter::Today, StatusFilter::All, ""));
        let today_active =
            apply_filters(&views, &filters(DateFilter::Today, StatusFilter::Active, ""));

        assert_eq!(everything, views);
        assert!(today.iter().all(|v| everything.contains(v)));
        assert!(today_active.iter().all(|v| today.contains(v)));
        assert_eq!(ids(&today_active), vec!["a", "c", "f"]);
    }

    #[test]
    fn counts_ignore_filters() {
        let counts = TaskCounts::of(&sample());
        assert_eq!(
            counts,
            TaskCounts {
                total: 6,
                active: 4,
                done: 2
            }
        );
        assert_eq!(TaskCounts::of(&[]), TaskCounts::default());
    }

    #[test]
    fn greeting_depends_on_hour_and_name() {
        let morning = greeting("Ann", &now());
        assert_eq!(morning.label, "GOOD MORNING");
        assert_eq!(morning.text, "Ann, what are you doing today?");

        let afternoon = now() + chrono::Duration::hours(5);
        assert_eq!(greeting("Ann", &afternoon).label, "GOOD AFTERNOON");

        let evening = now() + chrono::Duration::hours(10);
        let g = greeting(" ", &evening);
        assert_eq!(g.label, "GOOD EVENING");
        assert_eq!(g.text, "there, what are you doing today?");
    }
}
