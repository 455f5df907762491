use std::rc::Rc;

use targetweave_core::prune_assignment;
use tracing::{debug, error, info};

use crate::host::HostBindings;
use crate::store::TargetStore;
use crate::sync::SyncProtocol;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub participants: usize,
    pub changed: usize,
    pub failed: usize,
    pub removed: usize,
    pub broadcast: bool,
}

/// Authority-side cleanup of target records that point at entities which no longer exist.
pub struct Reconciler {
    bindings: HostBindings,
    store: Rc<TargetStore>,
    sync: Rc<SyncProtocol>,
}

impl Reconciler {
    pub fn new(bindings: HostBindings, store: Rc<TargetStore>, sync: Rc<SyncProtocol>) -> Self {
        Self {
            bindings,
            store,
            sync,
        }
    }

    /// Prunes every participant. A failed write is logged and the sweep moves on; at most one
    /// broadcast goes out, after the whole pass.
    pub async fn sweep(&self) -> SweepReport {
        let session = &*self.bindings.session;
        let mut report = SweepReport::default();
        if !session.local_is_authority() || !session.is_started() {
            return report;
        }

        for participant in session.participants() {
            report.participants += 1;
            let current = self.store.get(&participant.id);
            let Some(pruned) = prune_assignment(&current, |entity| session.entity_exists(entity))
            else {
                continue;
            };
            let proposers: Vec<String> = pruned
                .assignment
                .proposers()
                .map(ToString::to_string)
                .collect();
            match self.store.write(&participant.id, pruned.assignment).await {
                Ok(()) => {
                    report.changed += 1;
                    report.removed += pruned.removed.len();
                    debug!(
                        "pruned {} stale targets (participant={})",
                        pruned.removed.len(),
                        participant.id
                    );
                }
                Err(err) => {
                    report.failed += 1;
                    error!(
                        "prune write failed (participant={} proposers=[{}]): {err}",
                        participant.id,
                        proposers.join(",")
                    );
                }
            }
        }

        self.finish(&mut report);
        if report.changed > 0 {
            info!(
                "reconcile pruned {} stale targets across {} participants",
                report.removed, report.changed
            );
        }
        report
    }

    /// Session end: empties every record. Local overlays are the caller's concern.
    pub async fn clear_all(&self) -> SweepReport {
        let session = &*self.bindings.session;
        let mut report = SweepReport::default();
        if !session.local_is_authority() {
            return report;
        }

        for participant in session.participants() {
            report.participants += 1;
            let mut current = self.store.get(&participant.id);
            if current.is_empty() {
                continue;
            }
            let removed: usize = current.entries().map(|(_, targets)| targets.len()).sum();
            current.clear_all();
            match self.store.write(&participant.id, current).await {
                Ok(()) => {
                    report.changed += 1;
                    report.removed += removed;
                }
                Err(err) => {
                    report.failed += 1;
                    error!("clear failed (participant={}): {err}", participant.id);
                }
            }
        }

        self.finish(&mut report);
        if report.changed > 0 {
            info!("cleared targets for {} participants", report.changed);
        }
        report
    }

    fn finish(&self, report: &mut SweepReport) {
        if report.changed == 0 {
            return;
        }
        // The authority does not hear its own broadcast.
        self.sync.on_redraw_signal();
        self.sync.broadcast_redraw();
        report.broadcast = true;
    }
}
