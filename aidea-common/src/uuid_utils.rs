//! UUID utilities

use uuid::Uuid;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new UUIDv4 in its hyphenated lowercase string form
pub fn generate_string() -> String {
    generate().to_string()
}

/// True if `s` only contains the characters an activity id may carry (`[0-9a-f-]+`)
pub fn is_activity_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f' | '-'))
}
