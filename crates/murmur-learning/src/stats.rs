use crate::{list_topics, LearningError, TopicFilter, TopicStatus};
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LearningStats {
    pub total_topics: usize,
    pub not_started: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub paused: usize,
    pub total_sessions: i64,
    pub total_time_minutes: i64,
    /// Distinct concepts across all topics.
    pub concepts_learned: usize,
    pub average_progress: u8,
}

pub fn learning_stats(conn: &Connection, user_id: &str) -> Result<LearningStats, LearningError> {
    let topics = list_topics(conn, user_id, &TopicFilter::default())?;
    let mut stats = LearningStats {
        total_topics: topics.len(),
        ..LearningStats::default()
    };
    let mut concepts: Vec<String> = Vec::new();
    let mut progress_sum: usize = 0;

    for topic in &topics {
        match topic.status {
            TopicStatus::NotStarted => stats.not_started += 1,
            TopicStatus::InProgress => stats.in_progress += 1,
            TopicStatus::Completed => stats.completed += 1,
            TopicStatus::Paused => stats.paused += 1,
        }
        stats.total_sessions += topic.session_count;
        stats.total_time_minutes += topic.total_time_minutes;
        progress_sum += usize::from(topic.progress_percentage);
        for concept in &topic.concepts_covered {
            let key = concept.to_lowercase();
            if !concepts.contains(&key) {
                concepts.push(key);
            }
        }
    }

    stats.concepts_learned = concepts.len();
    if !topics.is_empty() {
        stats.average_progress = (progress_sum / topics.len()) as u8;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_topic, save_progress, NewTopic, ProgressUpdate};

    #[test]
    fn aggregates_across_topics() {
        let conn = Connection::open_in_memory().unwrap();
        murmur_db::run_migrations(&conn).unwrap();
        let new = |title: &str| NewTopic {
            title: title.into(),
            ..NewTopic::default()
        };
        let a = create_topic(&conn, "u1", &new("Rust")).unwrap();
        let b = create_topic(&conn, "u1", &new("Go")).unwrap();
        create_topic(&conn, "u1", &new("Zig")).unwrap();

        save_progress(
            &conn,
            "u1",
            &a.id,
            &ProgressUpdate {
                concepts: vec!["traits".into(), "generics".into()],
                progress_percentage: Some(60),
                ..ProgressUpdate::default()
            },
        )
        .unwrap();
        save_progress(
            &conn,
            "u1",
            &b.id,
            &ProgressUpdate {
                concepts: vec!["Generics".into(), "goroutines".into()],
                progress_percentage: Some(30),
                ..ProgressUpdate::default()
            },
        )
        .unwrap();

        let stats = learning_stats(&conn, "u1").unwrap();
        assert_eq!(stats.total_topics, 3);
        assert_eq!((stats.not_started, stats.in_progress), (1, 2));
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.concepts_learned, 3);
        assert_eq!(stats.average_progress, 30);
        assert_eq!(learning_stats(&conn, "u2").unwrap(), LearningStats::default());
    }
}
