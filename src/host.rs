use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use serde_json::Value;
use targetweave_core::{
    EntityId, ParticipantId, Primitive, SceneQuery, SessionHost, SocketMsg, VisibilityOracle,
};

use crate::error::{StoreError, SurfaceError, TransportError};

/// The host's replicated document store, addressed by participant and module-scoped flag key.
pub trait FlagStore {
    fn read_flag(&self, participant: &ParticipantId, scope: &str, key: &str) -> Option<Value>;

    fn write_flag<'a>(
        &'a self,
        participant: &'a ParticipantId,
        scope: &'a str,
        key: &'a str,
        value: Value,
    ) -> LocalBoxFuture<'a, Result<(), StoreError>>;
}

/// Best-effort, unordered delivery to every other connected participant.
pub trait Transport {
    fn emit(&self, msg: &SocketMsg) -> Result<(), TransportError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerHandle(pub u64);

pub trait Surface {
    fn is_ready(&self) -> bool;
    fn create_layer(&self, name: &str) -> Result<LayerHandle, SurfaceError>;
    fn clear_layer(&self, layer: LayerHandle);
    fn remove_layer(&self, layer: LayerHandle);
    fn draw(&self, layer: LayerHandle, primitive: &Primitive);
}

/// The host's own per-client target marking.
pub trait NativeTargets {
    fn replace(&self, targets: &[EntityId]);
    fn clear(&self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DrawableId(pub u64);

/// Drawable ownership links plus the placed entities, bottom-most first.
pub trait DrawableTree {
    fn parent(&self, drawable: DrawableId) -> Option<DrawableId>;
    fn owning_entity(&self, drawable: DrawableId) -> Option<EntityId>;
    fn placeables(&self) -> Vec<EntityId>;
}

#[derive(Clone)]
pub struct HostBindings {
    pub session: Rc<dyn SessionHost>,
    pub visibility: Rc<dyn VisibilityOracle>,
    pub scene: Rc<dyn SceneQuery>,
    pub drawables: Rc<dyn DrawableTree>,
    pub flags: Rc<dyn FlagStore>,
    pub transport: Rc<dyn Transport>,
    pub surface: Rc<dyn Surface>,
    pub native_targets: Rc<dyn NativeTargets>,
}
