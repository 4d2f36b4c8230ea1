use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a movie writer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WritingState {
    /// No session; holds no container resources.
    Idle,
    /// Accepting sample buffers.
    Writing,
    /// Finalization in flight; new sample buffers are rejected.
    Finishing,
}

impl WritingState {
    fn as_u8(self) -> u8 {
        match self {
            WritingState::Idle => 0,
            WritingState::Writing => 1,
            WritingState::Finishing => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => WritingState::Writing,
            2 => WritingState::Finishing,
            _ => WritingState::Idle,
        }
    }
}

impl fmt::Display for WritingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WritingState::Idle => write!(f, "idle"),
            WritingState::Writing => write!(f, "writing"),
            WritingState::Finishing => write!(f, "finishing"),
        }
    }
}

/// Lock-free readable cell holding a `WritingState`.
///
/// Readers never observe anything but one of the three states. Writers are
/// expected to hold the owning writer's lock so transitions stay linearizable.
#[derive(Debug)]
pub struct AtomicWritingState(AtomicU8);

impl AtomicWritingState {
    pub fn new(state: WritingState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub fn load(&self) -> WritingState {
        WritingState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: WritingState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

impl Default for AtomicWritingState {
    fn default() -> Self {
        Self::new(WritingState::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        assert_eq!(AtomicWritingState::default().load(), WritingState::Idle);
    }

    #[test]
    fn test_store_then_load() {
        let cell = AtomicWritingState::default();
        for state in [
            WritingState::Writing,
            WritingState::Finishing,
            WritingState::Idle,
        ] {
            cell.store(state);
            assert_eq!(cell.load(), state);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(WritingState::Finishing.to_string(), "finishing");
    }
}
