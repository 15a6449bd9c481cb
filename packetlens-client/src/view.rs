//! Client-side capture state
//!
//! A [`CaptureView`] holds what a front end renders: the latest snapshot and
//! status delivered by the poller, the user's [`FilterState`] and the
//! [`Navigator`] selection. The filtered view is recomputed from the snapshot
//! on demand, so it always reflects the current filter.

use packetlens_core::filter::{self, count_by_category};
use packetlens_core::{CaptureStatus, FilterState, Navigator, PacketRecord, ProtocolCategory};

use crate::poller::PollEvent;

/// What a front end renders for one capture service
#[derive(Debug, Default)]
pub struct CaptureView {
    packets: Vec<PacketRecord>,
    status: Option<CaptureStatus>,
    filter: FilterState,
    navigator: Navigator,
    warning: Option<String>,
}

impl CaptureView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: FilterState) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Fold a poller event into the view
    pub fn apply(&mut self, event: PollEvent) {
        match event {
            PollEvent::Update { status, packets } => self.update(status, packets),
            PollEvent::ConnectivityWarning {
                consecutive_failures,
                error,
            } => {
                self.warning = Some(format!(
                    "service unreachable ({} failed polls): {}",
                    consecutive_failures, error
                ));
            }
            PollEvent::ConnectivityRestored => self.warning = None,
        }
    }

    /// Install a new snapshot and status.
    ///
    /// A snapshot that shrank, or belongs to a different session, starts a
    /// fresh selection.
    pub fn update(&mut self, status: CaptureStatus, packets: Vec<PacketRecord>) {
        let new_session = self
            .status
            .as_ref()
            .map_or(false, |old| old.session_id != status.session_id);
        if new_session || packets.len() < self.packets.len() {
            self.navigator.reset();
        }
        self.packets = packets;
        self.status = Some(status);
        self.sync();
    }

    /// Full, unfiltered snapshot
    pub fn packets(&self) -> &[PacketRecord] {
        &self.packets
    }

    pub fn status(&self) -> Option<&CaptureStatus> {
        self.status.as_ref()
    }

    pub fn is_capturing(&self) -> bool {
        self.status.as_ref().map_or(false, |s| s.capturing)
    }

    /// Connectivity warning, if the service is currently unreachable
    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Snapshot records that pass the current filter, in capture order
    pub fn visible(&self) -> Vec<&PacketRecord> {
        filter::filter(&self.packets, &self.filter)
    }

    /// Selected record, if it passes the current filter
    pub fn selected(&self) -> Option<&PacketRecord> {
        self.navigator.current(&self.visible())
    }

    /// Records per category in the full snapshot
    pub fn category_counts(&self) -> Vec<(ProtocolCategory, usize)> {
        count_by_category(&self.packets)
    }

    pub fn set_filter(&mut self, filter: FilterState) {
        self.filter = filter;
        self.sync();
    }

    pub fn toggle_category(&mut self, category: ProtocolCategory) {
        let enabled = self.filter.is_enabled(category);
        self.filter.set_enabled(category, !enabled);
        self.sync();
    }

    pub fn add_ip(&mut self, ip: &str) -> bool {
        let added = self.filter.add_ip(ip);
        self.sync();
        added
    }

    pub fn remove_ip(&mut self, ip: &str) -> bool {
        let removed = self.filter.remove_ip(ip);
        self.sync();
        removed
    }

    pub fn first(&mut self) {
        let view = filter::filter(&self.packets, &self.filter);
        self.navigator.first(&view);
    }

    pub fn previous(&mut self) {
        let view = filter::filter(&self.packets, &self.filter);
        self.navigator.previous(&view);
    }

    pub fn next(&mut self) {
        let view = filter::filter(&self.packets, &self.filter);
        self.navigator.next(&view);
    }

    pub fn last(&mut self) {
        let view = filter::filter(&self.packets, &self.filter);
        self.navigator.last(&view);
    }

    pub fn select(&mut self, number: u64) -> bool {
        let view = filter::filter(&self.packets, &self.filter);
        self.navigator.select(number, &view)
    }

    fn sync(&mut self) {
        let view = filter::filter(&self.packets, &self.filter);
        self.navigator.sync(&view);
    }
}
