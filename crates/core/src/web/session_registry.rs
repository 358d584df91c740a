use std::collections::HashMap;

use crate::tracking::domain::attention_tracker::AttentionTracker;
use crate::tracking::domain::landmark_estimator::LandmarkEstimator;

/// Session used when a client sends no `X-Session-Id`.
pub const DEFAULT_SESSION_ID: &str = "default";

pub const DEFAULT_MAX_SESSIONS: usize = 64;

struct Entry {
    tracker: AttentionTracker,
    last_used: u64,
}

/// Per-client trackers for the HTTP front end.
///
/// Holds at most `capacity` sessions; creating one more evicts the least
/// recently used.
pub struct SessionRegistry {
    sessions: HashMap<String, Entry>,
    estimator: LandmarkEstimator,
    capacity: usize,
    clock: u64,
}

impl SessionRegistry {
    pub fn new(estimator: LandmarkEstimator, capacity: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            estimator,
            capacity: capacity.max(1),
            clock: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Runs `f` against the session's tracker, creating it on first use.
    pub fn with_tracker<R>(&mut self, id: &str, f: impl FnOnce(&mut AttentionTracker) -> R) -> R {
        self.clock += 1;
        if !self.sessions.contains_key(id) {
            self.evict_if_full();
            log::debug!("New tracking session {id}");
        }
        let estimator = self.estimator;
        let entry = self.sessions.entry(id.to_string()).or_insert_with(|| Entry {
            tracker: AttentionTracker::new(estimator),
            last_used: 0,
        });
        entry.last_used = self.clock;
        f(&mut entry.tracker)
    }

    /// Drops the session and its sticky memory. Returns whether it existed.
    pub fn end(&mut self, id: &str) -> bool {
        let existed = self.sessions.remove(id).is_some();
        if existed {
            log::debug!("Ended tracking session {id}");
        }
        existed
    }

    fn evict_if_full(&mut self) {
        if self.sessions.len() < self.capacity {
            return;
        }
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(id, _)| id.clone());
        if let Some(id) = oldest {
            log::info!("Evicting idle tracking session {id}");
            self.sessions.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detector::testing::ScriptedDetector;
    use crate::detection::domain::detector::{DetectorRole, DetectorSet};
    use crate::shared::geometry::Rect;
    use crate::tracking::domain::band::Band;
    use image::GrayImage;

    fn registry(capacity: usize) -> SessionRegistry {
        SessionRegistry::new(LandmarkEstimator::default(), capacity)
    }

    fn remember(registry: &mut SessionRegistry, id: &str, face: Rect) {
        registry.with_tracker(id, |tracker| {
            let mut detectors =
                DetectorSet::new().with(DetectorRole::Face, Box::new(ScriptedDetector::always(vec![face])));
            tracker.analyze_gray(&mut detectors, &GrayImage::new(320, 240), &Band::Line { y: 200 });
        });
    }

    #[test]
    fn test_sessions_are_isolated() {
        let mut registry = registry(8);
        remember(&mut registry, "a", Rect::new(10, 10, 40, 40));
        let b_face = registry.with_tracker("b", |t| t.memory().last_face());
        let a_face = registry.with_tracker("a", |t| t.memory().last_face());
        assert_eq!(b_face, None);
        assert_eq!(a_face, Some(Rect::new(10, 10, 40, 40)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_end_clears_memory() {
        let mut registry = registry(8);
        remember(&mut registry, "a", Rect::new(10, 10, 40, 40));
        assert!(registry.end("a"));
        assert!(!registry.end("a"));
        assert_eq!(registry.with_tracker("a", |t| t.memory().last_face()), None);
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let mut registry = registry(2);
        registry.with_tracker("a", |_| ());
        registry.with_tracker("b", |_| ());
        registry.with_tracker("a", |_| ());
        registry.with_tracker("c", |_| ());
        assert!(registry.contains("a"));
        assert!(!registry.contains("b"));
        assert!(registry.contains("c"));
        assert_eq!(registry.len(), 2);
    }
}
