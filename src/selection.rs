//! Hover tracking across successive pointing searches

use serde::Serialize;

use crate::mapper::WidgetHit;

/// How the pointed-at element changed since the previous search
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum SelectionChange<H> {
    /// Nothing was hovered and still nothing is, or the same element stays hovered
    Unchanged,
    Entered { current: WidgetHit<H> },
    Left { previous: WidgetHit<H> },
    Changed {
        previous: WidgetHit<H>,
        current: WidgetHit<H>,
    },
}

impl<H> SelectionChange<H> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, SelectionChange::Unchanged)
    }
}

/// Remembers the most recent hit so callers can fire hover-enter/exit
#[derive(Debug, Clone)]
pub struct SelectionTracker<H> {
    current: Option<WidgetHit<H>>,
}

impl<H> Default for SelectionTracker<H> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<H: PartialEq + Clone> SelectionTracker<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&WidgetHit<H>> {
        self.current.as_ref()
    }

    /// Record the latest search result and report the transition
    pub fn update(&mut self, hit: Option<WidgetHit<H>>) -> SelectionChange<H> {
        let change = match (self.current.take(), hit.clone()) {
            (None, None) => SelectionChange::Unchanged,
            (None, Some(current)) => SelectionChange::Entered { current },
            (Some(previous), None) => SelectionChange::Left { previous },
            (Some(previous), Some(current)) => {
                if previous.same_target(&current) {
                    SelectionChange::Unchanged
                } else {
                    SelectionChange::Changed { previous, current }
                }
            }
        };
        self.current = hit;
        change
    }

    pub fn clear(&mut self) -> SelectionChange<H> {
        self.update(None)
    }
}
