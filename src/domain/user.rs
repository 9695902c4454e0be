use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

/// A wallet holder. The handle (e.g. a phone number) is how other users address
/// transfers; the id is internal and never changes once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub handle: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            handle: handle.into(),
            name: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name for display, falling back to the handle.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.handle)
    }
}

/// Normalize a user-supplied handle. Returns `None` if it is empty or contains
/// whitespace after trimming.
pub fn normalize_handle(raw: &str) -> Option<String> {
    let handle = raw.trim();
    if handle.is_empty() || handle.chars().any(char::is_whitespace) {
        return None;
    }
    Some(handle.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_handle() {
        assert_eq!(normalize_handle(" 5551234 "), Some("5551234".to_string()));
        assert_eq!(normalize_handle(""), None);
        assert_eq!(normalize_handle("   "), None);
        assert_eq!(normalize_handle("555 1234"), None);
    }

    #[test]
    fn test_display_name_falls_back_to_handle() {
        let user = User::new("5551234");
        assert_eq!(user.display_name(), "5551234");

        let named = User::new("5551234").with_name("Alice");
        assert_eq!(named.display_name(), "Alice");
    }
}
