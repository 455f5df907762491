pub mod error;
pub mod host;
pub mod input;
pub mod memory;
pub mod reconciler;
pub mod renderer;
pub mod runtime;
pub mod schedule;
pub mod store;
pub mod sync;

pub use error::{ClientError, StoreError, SurfaceError, TransportError};
pub use host::{
    DrawableId, DrawableTree, FlagStore, HostBindings, LayerHandle, NativeTargets, Surface,
    Transport,
};
pub use input::{Dispatch, InputDispatcher, InputModifiers, PointerButton, PointerEvent};
pub use reconciler::{Reconciler, SweepReport};
pub use renderer::{ConnectionRenderer, OverlayLayers, RendererContext, HOVER_LAYER, PERSISTENT_LAYER};
pub use runtime::{HostEvent, TargetsClient};
pub use schedule::RedrawScheduler;
pub use store::TargetStore;
pub use sync::{Proposal, RequestOutcome, SyncProtocol};
