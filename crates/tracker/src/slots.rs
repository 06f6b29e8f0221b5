use crate::discovery::BasicInfo;
use crate::pipeline::PersistentInfo;
use crate::visibility::FrameInfo;

/// Lifecycle position of one slot. Exactly one holds at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Unoccupied,
    BasicOnly,
    Resolved,
}

/// Fixed-capacity structure-of-arrays keyed by the host's stable index.
///
/// `keys` marks occupancy: a slot keeps its identity through transient basic
/// failures and only loses it on definitive absence, invalidation, or reset.
/// A persistent record never outlives its slot's key.
pub(crate) struct SlotStore<B: BasicInfo> {
    keys: Vec<Option<B::Key>>,
    pub(crate) basic: Vec<Option<B>>,
    pub(crate) frames: Vec<Option<FrameInfo>>,
    pub(crate) persistent: Vec<Option<PersistentInfo>>,
    pub(crate) needs_refetch: Vec<bool>,
    pub(crate) suppressed: Vec<bool>,
    pub(crate) retries: Vec<u32>,
}

impl<B: BasicInfo> SlotStore<B> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: vec![None; capacity],
            basic: vec![None; capacity],
            frames: vec![None; capacity],
            persistent: (0..capacity).map(|_| None).collect(),
            needs_refetch: vec![false; capacity],
            suppressed: vec![false; capacity],
            retries: vec![0; capacity],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn contains(&self, index: usize) -> bool {
        index < self.len()
    }

    pub(crate) fn state(&self, index: usize) -> SlotState {
        if self.persistent[index].is_some() {
            SlotState::Resolved
        } else if self.keys[index].is_some() {
            SlotState::BasicOnly
        } else {
            SlotState::Unoccupied
        }
    }

    pub(crate) fn key(&self, index: usize) -> Option<&B::Key> {
        self.keys[index].as_ref()
    }

    /// Installs a freshly resolved basic record. When the slot now denotes a
    /// different identity, everything learned about the old one is dropped.
    /// Returns whether the identity changed.
    pub(crate) fn seed(&mut self, index: usize, basic: B) -> bool {
        let key = basic.key();
        let changed = self.keys[index].as_ref() != Some(&key);
        if changed {
            self.persistent[index] = None;
            self.retries[index] = 0;
            self.keys[index] = Some(key);
        }
        self.basic[index] = Some(basic);
        changed
    }

    /// Forgets the cached basic record while keeping the slot occupied.
    pub(crate) fn invalidate_basic(&mut self, index: usize) {
        self.basic[index] = None;
        self.frames[index] = None;
    }

    pub(crate) fn drop_persistent(&mut self, index: usize) {
        self.persistent[index] = None;
    }

    /// Records a failed resolution attempt. Returns the new count.
    pub(crate) fn note_failure(&mut self, index: usize) -> u32 {
        let retries = self.retries[index].saturating_add(1);
        self.retries[index] = retries;
        retries
    }

    pub(crate) fn exhausted(&self, index: usize, ceiling: u32) -> bool {
        self.retries[index] >= ceiling
    }

    pub(crate) fn mark_unsupported(&mut self, index: usize) {
        self.basic[index] = None;
        self.frames[index] = None;
        self.persistent[index] = None;
        self.needs_refetch[index] = false;
        self.suppressed[index] = true;
    }

    /// Returns the slot to unoccupied with nothing left behind.
    pub(crate) fn clear_slot(&mut self, index: usize) {
        self.keys[index] = None;
        self.basic[index] = None;
        self.frames[index] = None;
        self.persistent[index] = None;
        self.needs_refetch[index] = false;
        self.suppressed[index] = false;
        self.retries[index] = 0;
    }

    pub(crate) fn reset(&mut self) {
        for index in 0..self.len() {
            self.clear_slot(index);
        }
    }

    pub(crate) fn count(&self, state: SlotState) -> usize {
        (0..self.len())
            .filter(|index| self.state(*index) == state)
            .count()
    }
}
