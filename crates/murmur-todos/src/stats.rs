use crate::{TodoError, TodoFilter, TodoStatus};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use murmur_db::parse_timestamp;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

/// Counts over a user's todo list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TodoStats {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub done: usize,
    /// Open todos whose due date has passed.
    pub overdue: usize,
    /// Open todos due today (UTC).
    pub due_today: usize,
    /// Share of todos that are done, 0 to 100.
    pub completion_rate: u8,
    /// Todo count per category name; uncategorized todos are omitted.
    pub by_category: BTreeMap<String, usize>,
}

/// Date-only values are due at the end of that day.
fn due_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let end = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?;
        return Some(date.and_time(end).and_utc());
    }
    parse_timestamp(raw)
}

pub fn todo_stats(conn: &Connection, user_id: &str) -> Result<TodoStats, TodoError> {
    todo_stats_at(conn, user_id, Utc::now())
}

pub(crate) fn todo_stats_at(
    conn: &Connection,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<TodoStats, TodoError> {
    let todos = crate::list_todos(conn, user_id, &TodoFilter::default())?;
    let today = now.date_naive();

    let mut stats = TodoStats {
        total: todos.len(),
        ..TodoStats::default()
    };
    for todo in &todos {
        match todo.status {
            TodoStatus::Todo => stats.todo += 1,
            TodoStatus::InProgress => stats.in_progress += 1,
            TodoStatus::Done => stats.done += 1,
        }
        if let Some(category) = &todo.category {
            *stats.by_category.entry(category.clone()).or_default() += 1;
        }
        if todo.status == TodoStatus::Done {
            continue;
        }
        if let Some(due) = todo.due_date.as_deref().and_then(due_instant) {
            if due < now {
                stats.overdue += 1;
            } else if due.date_naive() == today {
                stats.due_today += 1;
            }
        }
    }
    if stats.total > 0 {
        stats.completion_rate = ((stats.done * 100) / stats.total) as u8;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{complete_todo, create_todo, NewTodo};
    use chrono::TimeZone;

    #[test]
    fn counts_statuses_and_due_dates() {
        let conn = Connection::open_in_memory().unwrap();
        murmur_db::run_migrations(&conn).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap();

        let mk = |title: &str, due: Option<&str>| {
            create_todo(
                &conn,
                "u1",
                &NewTodo {
                    title: title.into(),
                    due_date: due.map(str::to_string),
                    ..NewTodo::default()
                },
            )
            .unwrap()
        };
        mk("buy bread", Some("2026-05-09"));
        mk("team meeting notes", Some("2026-05-10"));
        let done = mk("read a book", Some("2026-05-01"));
        mk("water plants", None);
        complete_todo(&conn, "u1", &done.id).unwrap();

        let stats = todo_stats_at(&conn, "u1", now).unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!((stats.todo, stats.in_progress, stats.done), (3, 0, 1));
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.due_today, 1);
        assert_eq!(stats.completion_rate, 25);
        assert_eq!(stats.by_category.get("Grocery"), Some(&1));
        assert_eq!(stats.by_category.get("Others"), Some(&1));
    }

    #[test]
    fn empty_list_has_zero_rate() {
        let conn = Connection::open_in_memory().unwrap();
        murmur_db::run_migrations(&conn).unwrap();
        assert_eq!(todo_stats(&conn, "nobody").unwrap(), TodoStats::default());
    }
}
