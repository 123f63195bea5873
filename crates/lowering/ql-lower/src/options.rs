//! Lowering configuration

/// Knobs for a lowering run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LowerOptions {
    /// Upper bound on continuations run from the deferred queue;
    /// `None` means unlimited
    pub max_deferred: Option<usize>,
}

impl LowerOptions {
    /// Cap the number of deferred continuations
    #[must_use]
    pub fn with_max_deferred(mut self, limit: usize) -> Self {
        self.max_deferred = Some(limit);
        self
    }
}
