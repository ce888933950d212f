//! Quiet-period scheduling for per-file recomputation

use crate::types::Uri;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const DEFAULT_RECOMPUTE_DELAY: Duration = Duration::from_millis(300);

/// Tracks the last change per file; a file is due once it has been quiet
/// for `delay`
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    last_change: HashMap<Uri, Instant>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_RECOMPUTE_DELAY)
    }
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_change: HashMap::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record a change, pushing the file's deadline back
    pub fn schedule(&mut self, uri: &Uri, now: Instant) {
        self.last_change.insert(uri.clone(), now);
    }

    pub fn cancel(&mut self, uri: &Uri) {
        self.last_change.remove(uri);
    }

    pub fn is_pending(&self, uri: &Uri) -> bool {
        self.last_change.contains_key(uri)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.last_change.values().map(|t| *t + self.delay).min()
    }

    /// Remove and return every file whose quiet period has elapsed
    pub fn take_due(&mut self, now: Instant) -> Vec<Uri> {
        let mut due: Vec<Uri> = self
            .last_change
            .iter()
            .filter(|(_, changed)| now.saturating_duration_since(**changed) >= self.delay)
            .map(|(uri, _)| uri.clone())
            .collect();
        due.sort();
        for uri in &due {
            self.last_change.remove(uri);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_after_quiet_period() {
        let mut debouncer = Debouncer::default();
        let uri = Uri::from("file:///a");
        let t0 = Instant::now();

        debouncer.schedule(&uri, t0);
        assert!(debouncer.take_due(t0 + Duration::from_millis(299)).is_empty());
        assert_eq!(debouncer.take_due(t0 + Duration::from_millis(300)), vec![uri.clone()]);
        assert!(!debouncer.is_pending(&uri));
    }

    #[test]
    fn test_new_change_pushes_deadline_back() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let uri = Uri::from("file:///a");
        let t0 = Instant::now();

        debouncer.schedule(&uri, t0);
        debouncer.schedule(&uri, t0 + Duration::from_millis(80));
        assert!(debouncer.take_due(t0 + Duration::from_millis(120)).is_empty());
        assert_eq!(
            debouncer.next_deadline(),
            Some(t0 + Duration::from_millis(180))
        );
        assert_eq!(debouncer.take_due(t0 + Duration::from_millis(180)).len(), 1);
    }
}
