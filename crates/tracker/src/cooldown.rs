use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Post-rebuild apply delays, keyed by stable identity rather than slot index
/// so a slot handed to someone else mid-window does not inherit the delay.
#[derive(Debug)]
pub(crate) struct CooldownTable<K> {
    stamps: HashMap<K, Instant>,
}

impl<K> Default for CooldownTable<K> {
    fn default() -> Self {
        Self {
            stamps: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> CooldownTable<K> {
    pub(crate) fn stamp(&mut self, key: K, now: Instant) {
        self.stamps.insert(key, now);
    }

    pub(crate) fn is_cooling(&self, key: &K, now: Instant, delay: Duration) -> bool {
        self.stamps
            .get(key)
            .is_some_and(|stamp| now.saturating_duration_since(*stamp) < delay)
    }

    /// Drops every stamp whose delay has fully elapsed. Returns how many.
    pub(crate) fn expire(&mut self, now: Instant, delay: Duration) -> usize {
        let before = self.stamps.len();
        self.stamps
            .retain(|_, stamp| now.saturating_duration_since(*stamp) < delay);
        before - self.stamps.len()
    }

    pub(crate) fn clear(&mut self) {
        self.stamps.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.stamps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooling_until_delay_elapses() {
        let mut table = CooldownTable::default();
        let base = Instant::now();
        let delay = Duration::from_millis(2000);
        table.stamp("y", base);

        assert!(table.is_cooling(&"y", base + Duration::from_millis(500), delay));
        assert!(table.is_cooling(&"y", base + Duration::from_millis(1999), delay));
        assert!(!table.is_cooling(&"y", base + Duration::from_millis(2000), delay));
        assert!(!table.is_cooling(&"y", base + Duration::from_millis(2001), delay));
        assert!(!table.is_cooling(&"z", base, delay));
    }

    #[test]
    fn restamp_restarts_window() {
        let mut table = CooldownTable::default();
        let base = Instant::now();
        let delay = Duration::from_secs(1);
        table.stamp(1u32, base);
        table.stamp(1u32, base + Duration::from_millis(900));

        assert!(table.is_cooling(&1, base + Duration::from_millis(1500), delay));
    }

    #[test]
    fn expire_only_drops_elapsed_entries() {
        let mut table = CooldownTable::default();
        let base = Instant::now();
        table.stamp(1u32, base);
        table.stamp(2u32, base + Duration::from_millis(800));

        let dropped = table.expire(base + Duration::from_secs(1), Duration::from_secs(1));
        assert_eq!(dropped, 1);
        assert_eq!(table.len(), 1);
        assert!(table.is_cooling(&2, base + Duration::from_secs(1), Duration::from_secs(1)));
    }

    #[test]
    fn zero_delay_never_cools() {
        let mut table = CooldownTable::default();
        let base = Instant::now();
        table.stamp(1u32, base);
        assert!(!table.is_cooling(&1, base, Duration::ZERO));
    }
}
