//! An in-memory host: one shared world, any number of viewers, and a loopback bus between them.
//!
//! Drives the integration tests and the CLI simulator. Each connected client gets its own
//! viewer-scoped view of the world plus its own transport, surface and native-target recorder.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use serde_json::Value;
use targetweave_core::{
    encode, EntityId, Footprint, GridShape, Participant, ParticipantId, Primitive, SceneQuery,
    SessionHost, SocketMsg, TargetAssignment, TargetsConfig, UserId, UserInfo, VisibilityOracle,
    FLAG_KEY, FLAG_SCOPE,
};

use crate::error::{StoreError, SurfaceError, TransportError};
use crate::host::{
    DrawableId, DrawableTree, FlagStore, HostBindings, LayerHandle, NativeTargets, Surface,
    Transport,
};
use crate::runtime::{HostEvent, TargetsClient};

#[derive(Clone, Debug, PartialEq)]
pub struct EntityRecord {
    pub id: EntityId,
    pub footprint: Footprint,
    pub owners: Vec<UserId>,
    /// Hidden entities are only visible to the referee and their owners.
    pub hidden: bool,
}

#[derive(Clone, Copy, Debug, Default)]
struct DrawableNode {
    parent: Option<DrawableId>,
}

#[derive(Default)]
pub struct World {
    users: Vec<UserInfo>,
    entities: Vec<EntityRecord>,
    participants: Vec<Participant>,
    turn: Option<usize>,
    started: bool,
    grid: GridShape,
    flags: HashMap<(ParticipantId, String, String), Value>,
    failing: HashSet<ParticipantId>,
    writes: u64,
    drawables: HashMap<DrawableId, DrawableNode>,
    drawable_owners: HashMap<DrawableId, EntityId>,
}

pub type SharedWorld = Rc<RefCell<World>>;

impl World {
    pub fn shared() -> SharedWorld {
        Rc::new(RefCell::new(World::default()))
    }

    pub fn add_user(&mut self, user: UserInfo) {
        self.users.retain(|existing| existing.id != user.id);
        self.users.push(user);
    }

    /// Appends on top of the draw order.
    pub fn add_entity(&mut self, entity: EntityRecord) {
        self.entities.retain(|existing| existing.id != entity.id);
        self.entities.push(entity);
    }

    pub fn remove_entity(&mut self, entity: &EntityId) -> bool {
        let before = self.entities.len();
        self.entities.retain(|existing| existing.id != *entity);
        self.drawable_owners.retain(|_, owner| owner != entity);
        self.entities.len() != before
    }

    pub fn move_entity(&mut self, entity: &EntityId, x: f32, y: f32) -> bool {
        match self.entities.iter_mut().find(|record| record.id == *entity) {
            Some(record) => {
                record.footprint.x = x;
                record.footprint.y = y;
                true
            }
            None => false,
        }
    }

    pub fn set_hidden(&mut self, entity: &EntityId, hidden: bool) {
        if let Some(record) = self.entities.iter_mut().find(|record| record.id == *entity) {
            record.hidden = hidden;
        }
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityRecord> {
        self.entities.iter()
    }

    pub fn add_participant(&mut self, participant: Participant) {
        self.participants
            .retain(|existing| existing.id != participant.id);
        self.participants.push(participant);
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn users(&self) -> &[UserInfo] {
        &self.users
    }

    pub fn set_grid(&mut self, grid: GridShape) {
        self.grid = grid;
    }

    pub fn start(&mut self) {
        self.started = true;
        if self.turn.is_none() && !self.participants.is_empty() {
            self.turn = Some(0);
        }
    }

    pub fn end(&mut self) {
        self.started = false;
        self.turn = None;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn set_turn(&mut self, index: usize) {
        self.turn = (index < self.participants.len()).then_some(index);
    }

    /// Moves to the next participant, wrapping around.
    pub fn advance_turn(&mut self) {
        if self.participants.is_empty() {
            self.turn = None;
            return;
        }
        self.turn = Some(self.turn.map_or(0, |turn| (turn + 1) % self.participants.len()));
    }

    pub fn active_participant(&self) -> Option<&Participant> {
        self.turn.and_then(|turn| self.participants.get(turn))
    }

    /// Attaches a drawable. `owner` marks it as the handle of an entity.
    pub fn add_drawable(
        &mut self,
        drawable: DrawableId,
        parent: Option<DrawableId>,
        owner: Option<EntityId>,
    ) {
        self.drawables.insert(drawable, DrawableNode { parent });
        match owner {
            Some(entity) => {
                self.drawable_owners.insert(drawable, entity);
            }
            None => {
                self.drawable_owners.remove(&drawable);
            }
        }
    }

    pub fn fail_writes_for(&mut self, participant: &ParticipantId, failing: bool) {
        if failing {
            self.failing.insert(participant.clone());
        } else {
            self.failing.remove(participant);
        }
    }

    pub fn write_count(&self) -> u64 {
        self.writes
    }

    /// The persisted record, decoded the same way clients read it.
    pub fn assignment(&self, participant: &ParticipantId) -> TargetAssignment {
        let key = (participant.clone(), FLAG_SCOPE.to_string(), FLAG_KEY.to_string());
        TargetAssignment::from_flag(self.flags.get(&key))
    }

    /// Stores a raw flag value, bypassing validation.
    pub fn put_flag(&mut self, participant: &ParticipantId, value: Value) {
        let key = (participant.clone(), FLAG_SCOPE.to_string(), FLAG_KEY.to_string());
        self.flags.insert(key, value);
    }

    fn entity(&self, entity: &EntityId) -> Option<&EntityRecord> {
        self.entities.iter().find(|record| record.id == *entity)
    }

    fn user(&self, user: &UserId) -> Option<&UserInfo> {
        self.users.iter().find(|info| info.id == *user)
    }

    fn owns(&self, user: &UserId, entity: &EntityId) -> bool {
        let Some(record) = self.entity(entity) else {
            return false;
        };
        self.user(user).is_some_and(|info| info.referee) || record.owners.contains(user)
    }

    fn write(
        &mut self,
        participant: &ParticipantId,
        scope: &str,
        key: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        if !self.participants.iter().any(|entry| entry.id == *participant) {
            return Err(StoreError::MissingParticipant(participant.clone()));
        }
        if self.failing.contains(participant) {
            return Err(StoreError::Rejected {
                participant: participant.clone(),
                reason: "write refused by document store".to_string(),
            });
        }
        self.flags
            .insert((participant.clone(), scope.to_string(), key.to_string()), value);
        self.writes += 1;
        Ok(())
    }
}

/// The world as seen by one viewer.
pub struct MemoryHost {
    world: SharedWorld,
    viewer: UserId,
}

impl MemoryHost {
    pub fn new(world: SharedWorld, viewer: UserId) -> Self {
        Self { world, viewer }
    }
}

impl SessionHost for MemoryHost {
    fn is_started(&self) -> bool {
        self.world.borrow().started
    }

    fn active_participant(&self) -> Option<Participant> {
        self.world.borrow().active_participant().cloned()
    }

    fn participants(&self) -> Vec<Participant> {
        self.world.borrow().participants.clone()
    }

    fn entity_exists(&self, entity: &EntityId) -> bool {
        self.world.borrow().entity(entity).is_some()
    }

    fn user_owns(&self, user: &UserId, entity: &EntityId) -> bool {
        self.world.borrow().owns(user, entity)
    }

    fn user(&self, user: &UserId) -> Option<UserInfo> {
        self.world.borrow().user(user).cloned()
    }

    fn viewer(&self) -> UserInfo {
        self.world
            .borrow()
            .user(&self.viewer)
            .cloned()
            .unwrap_or_else(|| UserInfo {
                id: self.viewer.clone(),
                referee: false,
                color: None,
            })
    }
}

impl VisibilityOracle for MemoryHost {
    fn is_visible(&self, entity: &EntityId) -> bool {
        let world = self.world.borrow();
        match world.entity(entity) {
            Some(record) => !record.hidden || world.owns(&self.viewer, entity),
            None => false,
        }
    }

    fn viewer_owns(&self, entity: &EntityId) -> bool {
        self.world.borrow().owns(&self.viewer, entity)
    }
}

impl SceneQuery for MemoryHost {
    fn footprint(&self, entity: &EntityId) -> Option<Footprint> {
        self.world.borrow().entity(entity).map(|record| record.footprint)
    }

    fn grid_shape(&self) -> GridShape {
        self.world.borrow().grid
    }
}

impl DrawableTree for MemoryHost {
    fn parent(&self, drawable: DrawableId) -> Option<DrawableId> {
        self.world
            .borrow()
            .drawables
            .get(&drawable)
            .and_then(|node| node.parent)
    }

    fn owning_entity(&self, drawable: DrawableId) -> Option<EntityId> {
        self.world.borrow().drawable_owners.get(&drawable).cloned()
    }

    fn placeables(&self) -> Vec<EntityId> {
        self.world
            .borrow()
            .entities
            .iter()
            .map(|record| record.id.clone())
            .collect()
    }
}

impl FlagStore for MemoryHost {
    fn read_flag(&self, participant: &ParticipantId, scope: &str, key: &str) -> Option<Value> {
        self.world
            .borrow()
            .flags
            .get(&(participant.clone(), scope.to_string(), key.to_string()))
            .cloned()
    }

    fn write_flag<'a>(
        &'a self,
        participant: &'a ParticipantId,
        scope: &'a str,
        key: &'a str,
        value: Value,
    ) -> LocalBoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.world
                .borrow_mut()
                .write(participant, scope, key, value)
        })
    }
}

/// Loopback broadcast bus. Frames are rkyv-encoded and delivered to every inbox but the
/// sender's, in send order unless the caller reorders them.
#[derive(Default)]
pub struct MemoryBus {
    inboxes: RefCell<Vec<VecDeque<Vec<u8>>>>,
    frames: Cell<u64>,
}

impl MemoryBus {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn join(self: &Rc<Self>) -> Rc<MemoryTransport> {
        let mut inboxes = self.inboxes.borrow_mut();
        inboxes.push(VecDeque::new());
        Rc::new(MemoryTransport {
            bus: self.clone(),
            client: inboxes.len() - 1,
            sent: RefCell::new(Vec::new()),
            connected: Cell::new(true),
        })
    }

    pub fn take_inbox(&self, client: usize) -> Vec<Vec<u8>> {
        self.inboxes
            .borrow_mut()
            .get_mut(client)
            .map(|inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }

    /// Frames waiting in any inbox.
    pub fn pending(&self) -> usize {
        self.inboxes.borrow().iter().map(VecDeque::len).sum()
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames.get()
    }

    fn publish(&self, sender: usize, frame: Vec<u8>) {
        let mut inboxes = self.inboxes.borrow_mut();
        for (index, inbox) in inboxes.iter_mut().enumerate() {
            if index != sender {
                inbox.push_back(frame.clone());
            }
        }
        self.frames.set(self.frames.get() + 1);
    }
}

pub struct MemoryTransport {
    bus: Rc<MemoryBus>,
    client: usize,
    sent: RefCell<Vec<SocketMsg>>,
    connected: Cell<bool>,
}

impl MemoryTransport {
    pub fn client(&self) -> usize {
        self.client
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.set(connected);
    }

    pub fn sent(&self) -> Vec<SocketMsg> {
        self.sent.borrow().clone()
    }

    pub fn redraws_sent(&self) -> usize {
        self.sent
            .borrow()
            .iter()
            .filter(|msg| matches!(msg, SocketMsg::Redraw))
            .count()
    }
}

impl Transport for MemoryTransport {
    fn emit(&self, msg: &SocketMsg) -> Result<(), TransportError> {
        if !self.connected.get() {
            return Err(TransportError::Disconnected);
        }
        let frame = encode(msg)?;
        self.bus.publish(self.client, frame);
        self.sent.borrow_mut().push(msg.clone());
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct RecordedLayer {
    pub handle: LayerHandle,
    pub name: String,
    pub primitives: Vec<Primitive>,
    pub clears: u64,
}

#[derive(Default)]
pub struct RecordingSurface {
    unavailable: Cell<bool>,
    next_handle: Cell<u64>,
    layers: RefCell<Vec<RecordedLayer>>,
}

impl RecordingSurface {
    pub fn set_available(&self, available: bool) {
        self.unavailable.set(!available);
    }

    pub fn layer(&self, name: &str) -> Option<RecordedLayer> {
        self.layers
            .borrow()
            .iter()
            .find(|layer| layer.name == name)
            .cloned()
    }

    pub fn contents(&self, name: &str) -> Vec<Primitive> {
        self.layer(name)
            .map(|layer| layer.primitives)
            .unwrap_or_default()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.borrow().len()
    }

    fn with_layer(&self, handle: LayerHandle, apply: impl FnOnce(&mut RecordedLayer)) {
        if let Some(layer) = self
            .layers
            .borrow_mut()
            .iter_mut()
            .find(|layer| layer.handle == handle)
        {
            apply(layer);
        }
    }
}

impl Surface for RecordingSurface {
    fn is_ready(&self) -> bool {
        !self.unavailable.get()
    }

    fn create_layer(&self, name: &str) -> Result<LayerHandle, SurfaceError> {
        if self.unavailable.get() {
            return Err(SurfaceError::NotReady);
        }
        let handle = LayerHandle(self.next_handle.get() + 1);
        self.next_handle.set(handle.0);
        self.layers.borrow_mut().push(RecordedLayer {
            handle,
            name: name.to_string(),
            primitives: Vec::new(),
            clears: 0,
        });
        Ok(handle)
    }

    fn clear_layer(&self, layer: LayerHandle) {
        self.with_layer(layer, |layer| {
            layer.primitives.clear();
            layer.clears += 1;
        });
    }

    fn remove_layer(&self, layer: LayerHandle) {
        self.layers.borrow_mut().retain(|entry| entry.handle != layer);
    }

    fn draw(&self, layer: LayerHandle, primitive: &Primitive) {
        self.with_layer(layer, |layer| layer.primitives.push(primitive.clone()));
    }
}

#[derive(Default)]
pub struct RecordingTargets {
    marked: RefCell<Vec<EntityId>>,
}

impl RecordingTargets {
    pub fn marked(&self) -> Vec<EntityId> {
        self.marked.borrow().clone()
    }
}

impl NativeTargets for RecordingTargets {
    fn replace(&self, targets: &[EntityId]) {
        *self.marked.borrow_mut() = targets.to_vec();
    }

    fn clear(&self) {
        self.marked.borrow_mut().clear();
    }
}

/// A full client wired to the in-memory world and bus.
pub struct MemoryClient {
    viewer: UserId,
    client: TargetsClient,
    bus: Rc<MemoryBus>,
    transport: Rc<MemoryTransport>,
    surface: Rc<RecordingSurface>,
    native: Rc<RecordingTargets>,
}

impl MemoryClient {
    pub fn connect(
        world: &SharedWorld,
        bus: &Rc<MemoryBus>,
        viewer: UserId,
        config: TargetsConfig,
    ) -> Self {
        let host = Rc::new(MemoryHost::new(world.clone(), viewer.clone()));
        let transport = bus.join();
        let surface = Rc::new(RecordingSurface::default());
        let native = Rc::new(RecordingTargets::default());
        let bindings = HostBindings {
            session: host.clone(),
            visibility: host.clone(),
            scene: host.clone(),
            drawables: host.clone(),
            flags: host,
            transport: transport.clone(),
            surface: surface.clone(),
            native_targets: native.clone(),
        };
        Self {
            viewer,
            client: TargetsClient::new(bindings, config),
            bus: bus.clone(),
            transport,
            surface,
            native,
        }
    }

    pub fn viewer(&self) -> &UserId {
        &self.viewer
    }

    pub fn client(&self) -> &TargetsClient {
        &self.client
    }

    pub fn transport(&self) -> &MemoryTransport {
        &self.transport
    }

    pub fn surface(&self) -> &RecordingSurface {
        &self.surface
    }

    pub fn native(&self) -> &RecordingTargets {
        &self.native
    }

    pub async fn handle(&self, event: HostEvent) {
        self.client.handle(event).await;
    }

    /// Takes this client's queued frames without handling them.
    pub fn take_inbox(&self) -> Vec<Vec<u8>> {
        self.bus.take_inbox(self.transport.client())
    }

    /// Handles every queued frame in arrival order. Returns how many were handled.
    pub async fn deliver(&self) -> usize {
        let frames = self.take_inbox();
        for frame in &frames {
            self.client.handle_frame(frame).await;
        }
        frames.len()
    }
}

/// Delivers frames until the bus is quiet, then flushes every client once.
pub async fn settle(clients: &[MemoryClient]) -> usize {
    let mut delivered = 0;
    loop {
        let mut round = 0;
        for client in clients {
            round += client.deliver().await;
        }
        if round == 0 {
            break;
        }
        delivered += round;
    }
    for client in clients {
        client.client().flush();
    }
    delivered
}
