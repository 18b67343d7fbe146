//! Action sinks
//!
//! The engine reports every applied action to an injected sink. Nothing in
//! the engine reads it back.

/// Receives one call per applied action.
pub trait ActionSink {
    fn record_action(&mut self);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ActionSink for NoopSink {
    fn record_action(&mut self) {}
}

/// In-process counter, reset when created.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemovalCounter {
    count: u64,
}

impl RemovalCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl ActionSink for RemovalCounter {
    fn record_action(&mut self) {
        self.count = self.count.saturating_add(1);
    }
}

impl<S: ActionSink + ?Sized> ActionSink for &mut S {
    fn record_action(&mut self) {
        (**self).record_action();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_increments() {
        let mut counter = RemovalCounter::new();
        counter.record_action();
        counter.record_action();
        assert_eq!(counter.count(), 2);
    }

    #[test]
    fn test_borrowed_sink() {
        fn bump<S: ActionSink>(mut sink: S) {
            sink.record_action();
        }

        let mut counter = RemovalCounter::new();
        bump(&mut counter);
        bump(&mut counter);
        assert_eq!(counter.count(), 2);
    }
}
