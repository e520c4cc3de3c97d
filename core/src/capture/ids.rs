//! Identity and sequence counters.

use framescope_shared::ResourceId;

/// Issues resource ids from 1 upward. Never repeats within its lifetime.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn allocate(&mut self) -> ResourceId {
        let id = ResourceId::new(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next - 1
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Command ordering counter shared by every recording level.
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter {
    next: u64,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self) -> u64 {
        let sequence = self.next;
        self.next += 1;
        sequence
    }

    pub fn peek(&self) -> u64 {
        self.next
    }
}
