//! Selection and navigation over a filtered view
//!
//! The selection is held by packet number, never by position: the filtered
//! view shifts whenever records arrive or the filter changes, so every move
//! recomputes the selected record's position against the view it is given.

use crate::PacketRecord;

/// Selected packet plus auto-follow mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigator {
    selected: Option<u64>,
    auto_follow: bool,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    /// Nothing selected, following the newest record
    pub fn new() -> Self {
        Self {
            selected: None,
            auto_follow: true,
        }
    }

    /// Number of the selected record
    pub fn selected(&self) -> Option<u64> {
        self.selected
    }

    pub fn auto_follow(&self) -> bool {
        self.auto_follow
    }

    /// Position of the selected record in `view`, or `None` when nothing is
    /// selected or the selection has been filtered out
    pub fn position(&self, view: &[&PacketRecord]) -> Option<usize> {
        let number = self.selected?;
        view.iter().position(|r| r.number == number)
    }

    /// The selected record, if it is present in `view`
    pub fn current<'a>(&self, view: &[&'a PacketRecord]) -> Option<&'a PacketRecord> {
        self.position(view).map(|pos| view[pos])
    }

    /// Select the first record and stop following
    pub fn first(&mut self, view: &[&PacketRecord]) {
        if let Some(rec) = view.first() {
            self.selected = Some(rec.number);
            self.auto_follow = false;
        }
    }

    /// Select the record before the current one and stop following
    pub fn previous(&mut self, view: &[&PacketRecord]) {
        if let Some(pos) = self.position(view) {
            if pos > 0 {
                self.selected = Some(view[pos - 1].number);
                self.auto_follow = false;
            }
        }
    }

    /// Select the record after the current one and stop following
    pub fn next(&mut self, view: &[&PacketRecord]) {
        if let Some(pos) = self.position(view) {
            if let Some(rec) = view.get(pos + 1) {
                self.selected = Some(rec.number);
                self.auto_follow = false;
            }
        }
    }

    /// Select the newest record and resume following
    pub fn last(&mut self, view: &[&PacketRecord]) {
        if let Some(rec) = view.last() {
            self.selected = Some(rec.number);
        }
        self.auto_follow = true;
    }

    /// Select a record by number
    ///
    /// Picking a record explicitly stops following. Returns false (and leaves
    /// the selection alone) if the record is not in `view`.
    pub fn select(&mut self, number: u64, view: &[&PacketRecord]) -> bool {
        if !view.iter().any(|r| r.number == number) {
            return false;
        }
        self.selected = Some(number);
        self.auto_follow = false;
        true
    }

    /// Forget the selection (e.g. after the store was cleared)
    pub fn reset(&mut self) {
        self.selected = None;
        self.auto_follow = true;
    }

    /// Bring the selection up to date with a freshly computed view.
    ///
    /// With auto-follow on, the newest record becomes selected.
    pub fn sync(&mut self, view: &[&PacketRecord]) {
        if self.auto_follow {
            if let Some(rec) = view.last() {
                self.selected = Some(rec.number);
            }
        }
    }
}
