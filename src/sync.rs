use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use targetweave_core::gate::{self, RequestVerdict};
use targetweave_core::{
    DropReason, EntityId, ParticipantId, SocketMsg, TargetEdit, TargetSet, TargetsConfig, UserId,
};
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::host::HostBindings;
use crate::schedule::RedrawScheduler;
use crate::store::TargetStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Proposal {
    /// Written to the canonical store by this client.
    Committed(TargetSet),
    /// Sent to the authority; shown locally as an optimistic echo only.
    Requested(TargetSet),
    Denied,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    Applied(TargetSet),
    Dropped(DropReason),
}

/// Routes target mutations either straight to the store (authority) or through a request to
/// the authority, and turns commits into redraw broadcasts.
pub struct SyncProtocol {
    bindings: HostBindings,
    store: Rc<TargetStore>,
    scheduler: Rc<RedrawScheduler>,
    config: Rc<TargetsConfig>,
    echoes: RefCell<HashMap<(ParticipantId, UserId), TargetSet>>,
}

impl SyncProtocol {
    pub fn new(
        bindings: HostBindings,
        store: Rc<TargetStore>,
        scheduler: Rc<RedrawScheduler>,
        config: Rc<TargetsConfig>,
    ) -> Self {
        Self {
            bindings,
            store,
            scheduler,
            config,
            echoes: RefCell::new(HashMap::new()),
        }
    }

    pub async fn propose(
        &self,
        participant: &ParticipantId,
        proposer: &UserId,
        edit: TargetEdit,
    ) -> Result<Proposal, ClientError> {
        let session = &*self.bindings.session;
        let Some(actor) = session.user(proposer) else {
            debug!("proposal ignored: unknown proposer (proposer={proposer})");
            return Ok(Proposal::Denied);
        };
        match gate::active_for(&actor, session) {
            Some(active) if active.id == *participant => {}
            _ => {
                debug!(
                    "proposal ignored: not allowed (participant={participant} proposer={proposer})"
                );
                return Ok(Proposal::Denied);
            }
        }

        if session.local_is_authority() {
            let base = self.store.get_for(participant, proposer);
            let next = edit.apply(&base);
            self.commit(participant, proposer, next.clone()).await?;
            self.mirror_native(&next);
            return Ok(Proposal::Committed(next));
        }

        let base = self
            .echoes
            .borrow()
            .get(&(participant.clone(), proposer.clone()))
            .cloned()
            .unwrap_or_else(|| self.store.get_for(participant, proposer));
        let next = edit.apply(&base);
        self.echoes
            .borrow_mut()
            .insert((participant.clone(), proposer.clone()), next.clone());
        self.mirror_native(&next);
        if let Err(err) = self
            .bindings
            .transport
            .emit(&SocketMsg::request(participant, proposer, &next))
        {
            warn!("target request not sent (participant={participant} proposer={proposer}): {err}");
        }
        Ok(Proposal::Requested(next))
    }

    /// Authority side of a remote request. Never trusts the sender's own gate check.
    pub async fn apply_request(
        &self,
        participant: &ParticipantId,
        requester: &UserId,
        target_ids: &[EntityId],
    ) -> Result<RequestOutcome, ClientError> {
        let session = &*self.bindings.session;
        match gate::check_request(participant, requester, session) {
            RequestVerdict::Drop(reason) => {
                debug!(
                    "request dropped: {reason:?} (participant={participant} requester={requester})"
                );
                Ok(RequestOutcome::Dropped(reason))
            }
            RequestVerdict::Accept(active) => {
                // Ids removed while the request was in flight are not re-persisted.
                let targets: TargetSet = target_ids
                    .iter()
                    .filter(|entity| session.entity_exists(entity))
                    .cloned()
                    .collect();
                if targets.len() < target_ids.len() {
                    debug!(
                        "request targets trimmed from {} to {} (participant={participant})",
                        target_ids.len(),
                        targets.len()
                    );
                }
                self.commit(&active.id, requester, targets.clone()).await?;
                info!(
                    "request applied (participant={} requester={requester} targets={})",
                    active.id,
                    targets.len()
                );
                Ok(RequestOutcome::Applied(targets))
            }
        }
    }

    pub async fn on_message(&self, msg: SocketMsg) -> Result<Option<RequestOutcome>, ClientError> {
        match msg {
            SocketMsg::Redraw => {
                self.on_redraw_signal();
                Ok(None)
            }
            SocketMsg::RequestTargetsUpdate {
                participant_id,
                proposer_identity,
                target_entity_ids,
            } => {
                if !self.bindings.session.local_is_authority() {
                    return Ok(None);
                }
                self.apply_request(&participant_id, &proposer_identity, &target_entity_ids)
                    .await
                    .map(Some)
            }
        }
    }

    /// Canonical state moved: drop every optimistic echo and re-derive from the store.
    pub fn on_redraw_signal(&self) {
        self.echoes.borrow_mut().clear();
        if let Some(canonical) = self.own_canonical() {
            self.mirror_native(&canonical);
        }
        self.scheduler.request();
    }

    /// The turn moved on. A request still in flight is now stale and will be dropped without
    /// a broadcast, so its echo must not outlive the turn it was made in.
    pub fn on_turn_changed(&self) {
        let dropped = std::mem::take(&mut *self.echoes.borrow_mut()).len();
        if dropped > 0 {
            debug!("turn changed: dropped {dropped} optimistic echoes");
        }
        if !self.config.sync_native_targets {
            return;
        }
        match self.own_canonical() {
            Some(canonical) => self.mirror_native(&canonical),
            None => self.bindings.native_targets.clear(),
        }
    }

    pub fn echo(&self, participant: &ParticipantId, proposer: &UserId) -> Option<TargetSet> {
        self.echoes
            .borrow()
            .get(&(participant.clone(), proposer.clone()))
            .cloned()
    }

    pub fn clear_echoes(&self) {
        self.echoes.borrow_mut().clear();
    }

    /// Tells every other client to re-read canonical state. Failures are logged only.
    pub fn broadcast_redraw(&self) {
        if let Err(err) = self.bindings.transport.emit(&SocketMsg::Redraw) {
            warn!("redraw broadcast failed: {err}");
        }
    }

    async fn commit(
        &self,
        participant: &ParticipantId,
        proposer: &UserId,
        targets: TargetSet,
    ) -> Result<(), ClientError> {
        self.store
            .commit(participant, proposer, targets, self.config.authorship)
            .await
            .map_err(|source| ClientError::Commit {
                participant: participant.clone(),
                proposer: proposer.clone(),
                source,
            })?;
        self.scheduler.request();
        self.broadcast_redraw();
        Ok(())
    }

    /// The stored set of the participant this viewer may currently act for.
    fn own_canonical(&self) -> Option<TargetSet> {
        let session = &*self.bindings.session;
        let viewer = session.viewer();
        gate::active_for(&viewer, session).map(|active| self.store.get_for(&active.id, &viewer.id))
    }

    fn mirror_native(&self, targets: &TargetSet) {
        if !self.config.sync_native_targets {
            return;
        }
        let visible: Vec<_> = targets
            .iter()
            .filter(|entity| self.bindings.visibility.is_visible(entity))
            .cloned()
            .collect();
        self.bindings.native_targets.replace(&visible);
    }
}
