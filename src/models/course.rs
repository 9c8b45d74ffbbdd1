use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructor {
    pub name: String,
    pub expertise_level: String,
}

/// A catalog entry. Every field except `is_enrolled` is owned by the remote
/// catalog; `is_enrolled` only ever changes on this device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub course_id: String,
    pub title: String,
    pub description_short: String,
    pub instructor: Instructor,
    pub duration_weeks: u32,
    pub price_usd: f64,
    pub is_premium: bool,
    pub tags: Vec<String>,
    pub rating: f64,
    #[serde(default)]
    pub is_enrolled: bool,
}

impl Course {
    /// Case-insensitive substring match against the title or any tag.
    /// An empty query matches every course.
    pub fn matches(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let needle = query.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.tags.iter().any(|tag| tag.to_lowercase().contains(&needle))
    }
}
