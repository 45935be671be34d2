// ABOUTME: Cancellable deadline slots driven by an explicit millisecond clock
// ABOUTME: Backs the slide-commit delay and the resize debounce

/// A single pending task with a due time. Scheduling again replaces (cancels)
/// the pending one, so at most one task per slot can ever fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deadline<T> {
    pending: Option<(u64, T)>,
}

impl<T> Default for Deadline<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> Deadline<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `payload` to fire at `due_ms`, returning any task it replaced.
    pub fn schedule(&mut self, due_ms: u64, payload: T) -> Option<T> {
        self.pending.replace((due_ms, payload)).map(|(_, old)| old)
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, payload)| payload)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn due_ms(&self) -> Option<u64> {
        self.pending.as_ref().map(|(due, _)| *due)
    }

    pub fn payload(&self) -> Option<&T> {
        self.pending.as_ref().map(|(_, payload)| payload)
    }

    /// Take the payload if its due time has been reached.
    pub fn take_due(&mut self, now_ms: u64) -> Option<T> {
        match self.pending {
            Some((due, _)) if due <= now_ms => self.cancel(),
            _ => None,
        }
    }
}

/// Earliest of several optional due times.
pub fn earliest(due: &[Option<u64>]) -> Option<u64> {
    due.iter().flatten().copied().min()
}
