use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::types::GenerationParams;

/// Ephemeral copy of all editable form fields.
///
/// Written on every submission attempt and read back when a new view is
/// constructed, so a reload does not lose what the user typed. Its lifecycle
/// is independent of the task handle: restoring a form says nothing about
/// whether a task is in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSnapshot {
    pub prompt: String,
    pub params: GenerationParams,
}

impl FormSnapshot {
    pub fn capture(prompt: &str, params: &GenerationParams) -> Self {
        Self {
            prompt: prompt.to_string(),
            params: params.clone(),
        }
    }
}

/// Session-scoped store for the latest [`FormSnapshot`].
///
/// Lives as long as the process (the session); unlike the task registry it
/// is deliberately not durable.
#[derive(Debug, Default)]
pub struct SessionFormCache {
    slot: Mutex<Option<FormSnapshot>>,
}

impl SessionFormCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, snapshot: FormSnapshot) {
        match self.slot.lock() {
            Ok(mut slot) => *slot = Some(snapshot),
            Err(e) => {
                eprintln!("[zimage-client] WARNING: form cache mutex poisoned: {}", e);
            }
        }
    }

    pub fn load(&self) -> Option<FormSnapshot> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_and_restore() {
        let cache = SessionFormCache::new();
        assert_eq!(cache.load(), None);

        let params = GenerationParams::builder().steps(12).build().unwrap();
        cache.save(FormSnapshot::capture("a lighthouse at dusk", &params));

        let restored = cache.load().unwrap();
        assert_eq!(restored.prompt, "a lighthouse at dusk");
        assert_eq!(restored.params.steps, 12);
    }

    #[test]
    fn test_latest_snapshot_wins() {
        let cache = SessionFormCache::new();
        let params = GenerationParams::builder().build().unwrap();

        cache.save(FormSnapshot::capture("first", &params));
        cache.save(FormSnapshot::capture("second", &params));
        assert_eq!(cache.load().unwrap().prompt, "second");
    }

    #[test]
    fn test_clear() {
        let cache = SessionFormCache::new();
        let params = GenerationParams::builder().build().unwrap();
        cache.save(FormSnapshot::capture("p", &params));
        cache.clear();
        assert_eq!(cache.load(), None);
    }
}
