use crate::{LearningError, LearningTopic, NewTopic, TopicFilter, TopicStatus, TopicUpdate};
use chrono::Utc;
use murmur_db::format_timestamp;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(crate) const TOPIC_COLUMNS: &str = "id, user_id, title, description, category, difficulty,
    status, progress_percentage, concepts_json, last_summary, next_steps, session_count,
    total_time_minutes, last_studied_at, created_at, updated_at";

fn conversion<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn map_row_to_topic(row: &Row<'_>) -> rusqlite::Result<LearningTopic> {
    let difficulty: String = row.get(5)?;
    let status: String = row.get(6)?;
    let progress: i64 = row.get(7)?;
    let concepts_json: String = row.get(8)?;
    Ok(LearningTopic {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        difficulty: difficulty.parse().map_err(|e| conversion(5, e))?,
        status: status.parse().map_err(|e| conversion(6, e))?,
        progress_percentage: progress.clamp(0, 100) as u8,
        concepts_covered: serde_json::from_str(&concepts_json).map_err(|e| conversion(8, e))?,
        last_summary: row.get(9)?,
        next_steps: row.get(10)?,
        session_count: row.get(11)?,
        total_time_minutes: row.get(12)?,
        last_studied_at: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

pub(crate) fn validate_progress(value: i64) -> Result<i64, LearningError> {
    if (0..=100).contains(&value) {
        Ok(value)
    } else {
        Err(LearningError::Validation(format!(
            "progress_percentage must be between 0 and 100, got {value}"
        )))
    }
}

pub fn create_topic(
    conn: &Connection,
    user_id: &str,
    new: &NewTopic,
) -> Result<LearningTopic, LearningError> {
    let title = new.title.trim();
    if title.is_empty() {
        return Err(LearningError::Validation("title is required".into()));
    }
    let category = new
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("General");

    let id = uuid::Uuid::new_v4().to_string();
    let now = format_timestamp(Utc::now());
    conn.execute(
        "INSERT INTO learning_topics (
            id, user_id, title, description, category, difficulty, status,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            id,
            user_id,
            title,
            new.description,
            category,
            new.difficulty.unwrap_or_default().as_str(),
            TopicStatus::NotStarted.as_str(),
            now,
        ],
    )?;
    tracing::debug!(user_id, topic_id = %id, "learning topic created");
    get_topic(conn, user_id, &id)
}

pub fn get_topic(conn: &Connection, user_id: &str, id: &str) -> Result<LearningTopic, LearningError> {
    let sql = format!("SELECT {TOPIC_COLUMNS} FROM learning_topics WHERE id = ?1 AND user_id = ?2");
    conn.query_row(&sql, params![id, user_id], map_row_to_topic)
        .optional()?
        .ok_or_else(|| LearningError::NotFound(id.to_string()))
}

/// Finds a topic by title fragment (case-insensitive), preferring the most
/// recently studied one.
pub fn find_topic_by_title(
    conn: &Connection,
    user_id: &str,
    fragment: &str,
) -> Result<LearningTopic, LearningError> {
    let pattern = format!("%{}%", fragment.trim());
    let sql = format!(
        "SELECT {TOPIC_COLUMNS} FROM learning_topics
        WHERE user_id = ?1 AND title LIKE ?2
        ORDER BY last_studied_at IS NULL, last_studied_at DESC, created_at ASC, id ASC
        LIMIT 1"
    );
    conn.query_row(&sql, params![user_id, pattern], map_row_to_topic)
        .optional()?
        .ok_or_else(|| LearningError::NotFound(fragment.to_string()))
}

/// Lists topics, most recently studied first, never-studied topics last.
pub fn list_topics(
    conn: &Connection,
    user_id: &str,
    filter: &TopicFilter,
) -> Result<Vec<LearningTopic>, LearningError> {
    let sql = format!(
        "SELECT {TOPIC_COLUMNS} FROM learning_topics
        WHERE user_id = ?1
            AND (?2 IS NULL OR status = ?2)
            AND (?3 IS NULL OR category = ?3 COLLATE NOCASE)
        ORDER BY last_studied_at IS NULL, last_studied_at DESC, created_at DESC
        LIMIT ?4 OFFSET ?5"
    );
    // SQLite treats a negative LIMIT as no limit.
    let limit = filter.limit.map_or(-1, i64::from);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![
            user_id,
            filter.status.map(|s| s.as_str()),
            filter.category.as_deref().map(str::trim),
            limit,
            filter.offset,
        ],
        map_row_to_topic,
    )?;
    let mut topics = Vec::new();
    for row in rows {
        topics.push(row?);
    }
    Ok(topics)
}

/// Applies a partial update in a single statement.
pub fn update_topic(
    conn: &Connection,
    user_id: &str,
    id: &str,
    update: &TopicUpdate,
) -> Result<LearningTopic, LearningError> {
    let mut set_parts: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(title) = &update.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(LearningError::Validation("title must not be empty".into()));
        }
        values.push(Box::new(title.to_string()));
        set_parts.push(format!("title = ?{}", values.len()));
    }
    if let Some(description) = &update.description {
        values.push(Box::new(description.clone()));
        set_parts.push(format!("description = ?{}", values.len()));
    }
    if let Some(category) = &update.category {
        values.push(Box::new(category.trim().to_string()));
        set_parts.push(format!("category = ?{}", values.len()));
    }
    if let Some(difficulty) = update.difficulty {
        values.push(Box::new(difficulty.as_str()));
        set_parts.push(format!("difficulty = ?{}", values.len()));
    }
    if let Some(status) = update.status {
        values.push(Box::new(status.as_str()));
        set_parts.push(format!("status = ?{}", values.len()));
    }
    if let Some(progress) = update.progress_percentage {
        values.push(Box::new(validate_progress(progress)?));
        set_parts.push(format!("progress_percentage = ?{}", values.len()));
    }
    if let Some(next_steps) = &update.next_steps {
        values.push(Box::new(next_steps.clone()));
        set_parts.push(format!("next_steps = ?{}", values.len()));
    }

    if set_parts.is_empty() {
        return get_topic(conn, user_id, id);
    }

    values.push(Box::new(format_timestamp(Utc::now())));
    set_parts.push(format!("updated_at = ?{}", values.len()));
    values.push(Box::new(id.to_string()));
    let id_idx = values.len();
    values.push(Box::new(user_id.to_string()));
    let user_idx = values.len();

    let sql = format!(
        "UPDATE learning_topics SET {} WHERE id = ?{id_idx} AND user_id = ?{user_idx}",
        set_parts.join(", ")
    );
    let params: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    if conn.execute(&sql, params.as_slice())? == 0 {
        return Err(LearningError::NotFound(id.to_string()));
    }
    get_topic(conn, user_id, id)
}

/// Deletes a topic and its study sessions. Returns `false` if it did not exist.
pub fn delete_topic(conn: &Connection, user_id: &str, id: &str) -> Result<bool, LearningError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM learning_sessions WHERE topic_id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    let deleted = tx.execute(
        "DELETE FROM learning_topics WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    tx.commit()?;
    Ok(deleted > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Difficulty;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        murmur_db::run_migrations(&conn).unwrap();
        conn
    }

    fn topic(title: &str) -> NewTopic {
        NewTopic {
            title: title.into(),
            ..NewTopic::default()
        }
    }

    #[test]
    fn create_applies_defaults() {
        let conn = setup();
        let t = create_topic(&conn, "u1", &topic("Rust lifetimes")).unwrap();
        assert_eq!(t.category, "General");
        assert_eq!(t.difficulty, Difficulty::Beginner);
        assert_eq!(t.status, TopicStatus::NotStarted);
        assert_eq!(t.progress_percentage, 0);
        assert!(t.concepts_covered.is_empty());
        assert!(create_topic(&conn, "u1", &topic(" ")).is_err());
    }

    #[test]
    fn update_validates_progress() {
        let conn = setup();
        let t = create_topic(&conn, "u1", &topic("Spanish")).unwrap();
        let err = update_topic(
            &conn,
            "u1",
            &t.id,
            &TopicUpdate {
                progress_percentage: Some(140),
                ..TopicUpdate::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, LearningError::Validation(_)));

        let updated = update_topic(
            &conn,
            "u1",
            &t.id,
            &TopicUpdate {
                progress_percentage: Some(40),
                difficulty: Some(Difficulty::Intermediate),
                ..TopicUpdate::default()
            },
        )
        .unwrap();
        assert_eq!(updated.progress_percentage, 40);
        assert_eq!(updated.difficulty, Difficulty::Intermediate);
    }

    #[test]
    fn topics_are_scoped_to_their_owner() {
        let conn = setup();
        let t = create_topic(&conn, "u1", &topic("Chess openings")).unwrap();
        assert!(matches!(get_topic(&conn, "u2", &t.id), Err(LearningError::NotFound(_))));
        assert!(!delete_topic(&conn, "u2", &t.id).unwrap());
        assert_eq!(find_topic_by_title(&conn, "u1", "chess").unwrap().id, t.id);
        assert!(find_topic_by_title(&conn, "u2", "chess").is_err());
        assert!(delete_topic(&conn, "u1", &t.id).unwrap());
        assert!(list_topics(&conn, "u1", &TopicFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn list_filters_by_category_and_pages() {
        let conn = setup();
        for (title, category) in [("Go", "Programming"), ("Rust", "programming"), ("Piano", "Music")] {
            create_topic(
                &conn,
                "u1",
                &NewTopic {
                    category: Some(category.into()),
                    ..topic(title)
                },
            )
            .unwrap();
        }

        let programming = list_topics(
            &conn,
            "u1",
            &TopicFilter {
                category: Some("PROGRAMMING".into()),
                ..TopicFilter::default()
            },
        )
        .unwrap();
        assert_eq!(programming.len(), 2);

        let page = list_topics(
            &conn,
            "u1",
            &TopicFilter {
                limit: Some(2),
                offset: 2,
                ..TopicFilter::default()
            },
        )
        .unwrap();
        assert_eq!(page.len(), 1);

        let in_progress = list_topics(
            &conn,
            "u1",
            &TopicFilter {
                status: Some(TopicStatus::InProgress),
                ..TopicFilter::default()
            },
        )
        .unwrap();
        assert!(in_progress.is_empty());
    }
}
