//! Chat history loading

use uuid::Uuid;

use crate::error::Result;
use crate::storage::Database;
use crate::types::{flatten_exchanges, ChatMessage};

/// All messages of a user, oldest first, each question before its answer
pub fn get_history(db: &Database, user_id: Uuid) -> Result<Vec<ChatMessage>> {
    Ok(flatten_exchanges(&db.history(user_id)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatExchange, Role};
    use chrono::{Duration, Utc};

    #[test]
    fn test_history_is_flattened_in_order() {
        let db = Database::in_memory().unwrap();
        let user = Uuid::new_v4();
        let start = Utc::now() - Duration::minutes(1);

        let mut first = ChatExchange::new(user, "q1", "a1", start);
        first.answered_at = start + Duration::seconds(1);
        let mut second = ChatExchange::new(user, "q2", "a2", start + Duration::seconds(2));
        second.answered_at = start + Duration::seconds(3);
        db.insert_exchange(&second).unwrap();
        db.insert_exchange(&first).unwrap();

        let messages = get_history(&db, user).unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2", "a2"]);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[test]
    fn test_unknown_user_has_empty_history() {
        let db = Database::in_memory().unwrap();
        assert!(get_history(&db, Uuid::new_v4()).unwrap().is_empty());
    }
}
