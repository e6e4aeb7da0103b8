//! User-facing failure notices. Repeats of the same failure collapse into one
//! entry with a counter instead of stacking up.

use crate::error::EditorError;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Notification {
    pub key: String,
    pub code: &'static str,
    pub message: String,
    pub count: u32,
}

#[derive(Clone, Debug, Default)]
pub struct NotificationCenter {
    entries: Vec<Notification>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: &EditorError) {
        let key = error.identity();
        if let Some(n) = self.entries.iter_mut().find(|n| n.key == key) {
            n.count = n.count.saturating_add(1);
            n.message = error.to_string();
            return;
        }
        tracing::warn!(code = error.code(), %error, "editor notification");
        self.entries.push(Notification {
            key,
            code: error.code(),
            message: error.to_string(),
            count: 1,
        });
    }

    pub fn entries(&self) -> &[Notification] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dismiss(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|n| n.key != key);
        self.entries.len() != before
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeats_collapse() {
        let mut c = NotificationCenter::new();
        c.push(&EditorError::network("503", "unavailable"));
        c.push(&EditorError::network("503", "still unavailable"));
        c.push(&EditorError::network("500", "boom"));
        assert_eq!(c.entries().len(), 2);
        assert_eq!(c.entries()[0].count, 2);
        assert_eq!(c.entries()[0].message, "still unavailable");
        assert!(c.dismiss("network:500"));
        assert_eq!(c.drain().len(), 1);
        assert!(c.is_empty());
    }
}
