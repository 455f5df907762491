use std::rc::Rc;

use targetweave_core::{EntityId, SocketMsg, TargetsConfig};
use tracing::{debug, error, warn};

use crate::error::ClientError;
use crate::host::HostBindings;
use crate::input::{InputDispatcher, InputModifiers, PointerEvent};
use crate::reconciler::{Reconciler, SweepReport};
use crate::renderer::ConnectionRenderer;
use crate::schedule::RedrawScheduler;
use crate::store::TargetStore;
use crate::sync::SyncProtocol;

/// Lifecycle and input notifications delivered by the host.
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    SceneReady,
    SceneTornDown,
    /// `started` is `Some` only when the started flag itself changed.
    SessionUpdated { started: Option<bool> },
    SessionDeleted,
    TurnChanged,
    ParticipantUpdated,
    ParticipantRemoved,
    EntityUpdated { entity: EntityId, moved: bool },
    EntityRemoved { entity: EntityId },
    EntityRefreshed { entity: EntityId },
    Hover { entity: EntityId, hovered: bool },
    Socket(SocketMsg),
    Pointer(PointerEvent),
    EntitySecondaryClick {
        entity: EntityId,
        modifiers: InputModifiers,
    },
}

impl HostEvent {
    fn name(&self) -> &'static str {
        match self {
            HostEvent::SceneReady => "scene-ready",
            HostEvent::SceneTornDown => "scene-torn-down",
            HostEvent::SessionUpdated { .. } => "session-updated",
            HostEvent::SessionDeleted => "session-deleted",
            HostEvent::TurnChanged => "turn-changed",
            HostEvent::ParticipantUpdated => "participant-updated",
            HostEvent::ParticipantRemoved => "participant-removed",
            HostEvent::EntityUpdated { .. } => "entity-updated",
            HostEvent::EntityRemoved { .. } => "entity-removed",
            HostEvent::EntityRefreshed { .. } => "entity-refreshed",
            HostEvent::Hover { .. } => "hover",
            HostEvent::Socket(_) => "socket",
            HostEvent::Pointer(_) => "pointer",
            HostEvent::EntitySecondaryClick { .. } => "entity-secondary-click",
        }
    }
}

/// One client's targeting runtime. Everything runs on the host's single event thread.
pub struct TargetsClient {
    bindings: HostBindings,
    config: Rc<TargetsConfig>,
    store: Rc<TargetStore>,
    scheduler: Rc<RedrawScheduler>,
    sync: Rc<SyncProtocol>,
    reconciler: Reconciler,
    renderer: ConnectionRenderer,
    input: InputDispatcher,
}

impl TargetsClient {
    pub fn new(bindings: HostBindings, config: TargetsConfig) -> Self {
        let config = Rc::new(config);
        let store = Rc::new(TargetStore::new(bindings.flags.clone()));
        let scheduler = Rc::new(RedrawScheduler::new());
        let sync = Rc::new(SyncProtocol::new(
            bindings.clone(),
            store.clone(),
            scheduler.clone(),
            config.clone(),
        ));
        let reconciler = Reconciler::new(bindings.clone(), store.clone(), sync.clone());
        let renderer = ConnectionRenderer::new(
            bindings.clone(),
            store.clone(),
            scheduler.clone(),
            config.clone(),
        );
        let input = InputDispatcher::new(bindings.clone(), sync.clone(), config.clone());
        Self {
            bindings,
            config,
            store,
            scheduler,
            sync,
            reconciler,
            renderer,
            input,
        }
    }

    /// Handler boundary: every failure is logged here and never reaches the host.
    pub async fn handle(&self, event: HostEvent) {
        let name = event.name();
        if let Err(err) = self.dispatch(event).await {
            error!("{name} handler failed: {err}");
        }
    }

    /// Decodes one transport frame and handles it. Undecodable frames are dropped.
    pub async fn handle_frame(&self, bytes: &[u8]) {
        match SocketMsg::from_frame(bytes) {
            Ok(msg) => self.handle(HostEvent::Socket(msg)).await,
            Err(err) => debug!("socket frame dropped: {err}"),
        }
    }

    async fn dispatch(&self, event: HostEvent) -> Result<(), ClientError> {
        let started = self.bindings.session.is_started();
        match event {
            HostEvent::SceneReady => {
                self.renderer.attach()?;
                if started {
                    self.sweep().await;
                }
                self.scheduler.request();
            }
            HostEvent::SceneTornDown => {
                self.renderer.detach();
                self.sync.clear_echoes();
            }
            HostEvent::SessionUpdated {
                started: Some(false),
            }
            | HostEvent::SessionDeleted => self.session_ended().await,
            HostEvent::SessionUpdated {
                started: Some(true),
            } => {
                self.sync.on_turn_changed();
                self.scheduler.request();
            }
            HostEvent::SessionUpdated { started: None } => {
                self.scheduler.request();
            }
            HostEvent::TurnChanged => {
                self.sync.on_turn_changed();
                if started {
                    self.sweep().await;
                }
                self.scheduler.request();
            }
            HostEvent::EntityRemoved { .. } => {
                if started {
                    self.sweep().await;
                }
                self.scheduler.request();
            }
            HostEvent::ParticipantUpdated | HostEvent::ParticipantRemoved => {
                self.scheduler.request();
            }
            HostEvent::EntityUpdated { moved, .. } => {
                if moved && started {
                    self.scheduler.request_next_frame();
                } else {
                    self.scheduler.request();
                }
            }
            HostEvent::EntityRefreshed { .. } => {
                if started {
                    self.scheduler.request();
                }
            }
            HostEvent::Hover { entity, hovered } => {
                self.renderer.set_hover(&entity, hovered);
                self.scheduler.request();
            }
            HostEvent::Socket(msg) => {
                debug!("socket message: {}", msg.kind());
                self.sync.on_message(msg).await?;
            }
            HostEvent::Pointer(event) => {
                self.input.on_pointer_down(&event).await?;
            }
            HostEvent::EntitySecondaryClick { entity, modifiers } => {
                self.input
                    .on_entity_secondary_click(entity, modifiers)
                    .await?;
            }
        }
        Ok(())
    }

    async fn sweep(&self) -> SweepReport {
        let report = self.reconciler.sweep().await;
        if report.failed > 0 {
            warn!(
                "reconcile finished with {} failed participants of {}",
                report.failed, report.participants
            );
        }
        report
    }

    async fn session_ended(&self) {
        self.renderer.clear_now();
        self.renderer.clear_hover();
        self.sync.clear_echoes();
        if self.config.sync_native_targets {
            self.bindings.native_targets.clear();
        }
        self.reconciler.clear_all().await;
        self.scheduler.request();
    }

    /// Runs the coalesced redraw, if one is due. Returns whether a redraw happened.
    pub fn flush(&self) -> bool {
        if !self.scheduler.take_due() {
            return false;
        }
        match self.renderer.redraw() {
            Ok(_) => true,
            Err(err) => {
                error!("redraw failed: {err}");
                false
            }
        }
    }

    /// Animation-frame tick: promotes frame-deferred requests, then flushes.
    pub fn on_frame(&self) -> bool {
        self.scheduler.on_frame();
        self.flush()
    }

    pub fn renderer(&self) -> &ConnectionRenderer {
        &self.renderer
    }

    pub fn store(&self) -> &TargetStore {
        &self.store
    }

    pub fn sync(&self) -> &SyncProtocol {
        &self.sync
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn scheduler(&self) -> &RedrawScheduler {
        &self.scheduler
    }

    pub fn input(&self) -> &InputDispatcher {
        &self.input
    }

    pub fn config(&self) -> &TargetsConfig {
        &self.config
    }
}
