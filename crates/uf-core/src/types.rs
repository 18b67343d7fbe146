//! Core type definitions for Unfeed
//!
//! These types cross the boundary between the configuration provider, the
//! host bindings and the engine.

// =============================================================================
// Action Mode
// =============================================================================

/// What to do with a content unit whose text matches a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ActionMode {
    /// Excise the unit from the document
    #[default]
    Remove = 0,
    /// Keep the unit but outline it and reduce its opacity
    Mark = 1,
}

impl ActionMode {
    /// Map the persisted "reveal instead of remove" flag.
    pub fn from_reveal(reveal: bool) -> Self {
        if reveal {
            Self::Mark
        } else {
            Self::Remove
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remove => "remove",
            Self::Mark => "mark",
        }
    }
}

impl TryFrom<u8> for ActionMode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Remove),
            1 => Ok(Self::Mark),
            _ => Err(()),
        }
    }
}

// =============================================================================
// Filter Configuration
// =============================================================================

/// Fully resolved configuration for one page load.
///
/// An empty `selectors` list means the site is unsupported and the engine
/// stays inert.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterConfig {
    /// Site-specific structural selectors, OR'd together
    pub selectors: Vec<String>,
    /// Keywords to filter on
    pub filters: Vec<String>,
    /// Action applied to matching units
    pub action_mode: ActionMode,
}

impl FilterConfig {
    pub fn new(selectors: Vec<String>, filters: Vec<String>, action_mode: ActionMode) -> Self {
        Self {
            selectors,
            filters,
            action_mode,
        }
    }

    /// True when there is nothing to look for on this site.
    pub fn is_inert(&self) -> bool {
        self.selectors.iter().all(|s| s.trim().is_empty())
    }
}

// =============================================================================
// Pass Report
// =============================================================================

/// Work done by one sweep or one mutation batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassReport {
    /// Distinct candidate units examined
    pub candidates: usize,
    /// Candidates whose text matched a filter
    pub matched: usize,
    /// Units excised from the document
    pub removed: usize,
    /// Units given the mark treatment
    pub marked: usize,
    /// Candidates skipped because they were no longer connected
    pub stale: usize,
    /// New subscriptions attached (document body or boundaries)
    pub subscriptions: usize,
}

impl PassReport {
    /// Fold another report into this one.
    pub fn merge(&mut self, other: &PassReport) {
        self.candidates += other.candidates;
        self.matched += other.matched;
        self.removed += other.removed;
        self.marked += other.marked;
        self.stale += other.stale;
        self.subscriptions += other.subscriptions;
    }

    /// Number of actions actually applied.
    pub fn actions(&self) -> usize {
        self.removed + self.marked
    }
}
