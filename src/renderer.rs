use std::cell::{Cell, RefCell};
use std::rc::Rc;

use targetweave_core::{compose_frame, EntityId, FrameInputs, RenderFrame, TargetsConfig};
use tracing::debug;

use crate::error::SurfaceError;
use crate::host::{HostBindings, LayerHandle};
use crate::schedule::RedrawScheduler;
use crate::store::TargetStore;

pub const PERSISTENT_LAYER: &str = "targetweave-connections";
pub const HOVER_LAYER: &str = "targetweave-hover";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlayLayers {
    pub persistent: LayerHandle,
    pub hover: LayerHandle,
}

/// Per-scene render state: the two overlay layers and the hovered entity.
#[derive(Debug, Default)]
pub struct RendererContext {
    pub layers: Option<OverlayLayers>,
    pub hovered: Option<EntityId>,
}

pub struct ConnectionRenderer {
    bindings: HostBindings,
    store: Rc<TargetStore>,
    scheduler: Rc<RedrawScheduler>,
    config: Rc<TargetsConfig>,
    context: RefCell<RendererContext>,
    last_frame: RefCell<RenderFrame>,
    redraws: Cell<u64>,
}

impl ConnectionRenderer {
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
            context: RefCell::new(RendererContext::default()),
            last_frame: RefCell::new(RenderFrame::default()),
            redraws: Cell::new(0),
        }
    }

    /// Creates the overlay layers once the surface is up and opens the scheduler.
    pub fn attach(&self) -> Result<OverlayLayers, SurfaceError> {
        let layers = self.ensure_layers()?;
        self.scheduler.set_ready(true);
        Ok(layers)
    }

    pub fn detach(&self) {
        self.scheduler.set_ready(false);
        let mut context = self.context.borrow_mut();
        if let Some(layers) = context.layers.take() {
            let surface = &self.bindings.surface;
            surface.clear_layer(layers.persistent);
            surface.clear_layer(layers.hover);
            surface.remove_layer(layers.persistent);
            surface.remove_layer(layers.hover);
        }
        context.hovered = None;
        *self.last_frame.borrow_mut() = RenderFrame::default();
    }

    pub fn is_attached(&self) -> bool {
        self.context.borrow().layers.is_some()
    }

    pub fn hovered(&self) -> Option<EntityId> {
        self.context.borrow().hovered.clone()
    }

    /// Applies a hover transition. Leaving an entity only clears the hover when it is the one
    /// currently highlighted.
    pub fn set_hover(&self, entity: &EntityId, hovered: bool) {
        let mut context = self.context.borrow_mut();
        if hovered {
            context.hovered = Some(entity.clone());
        } else if context.hovered.as_ref() == Some(entity) {
            context.hovered = None;
        }
    }

    pub fn clear_hover(&self) {
        self.context.borrow_mut().hovered = None;
    }

    /// Clears both layers and redraws everything from canonical state.
    pub fn redraw(&self) -> Result<RenderFrame, SurfaceError> {
        let layers = self.ensure_layers()?;
        let surface = &self.bindings.surface;
        surface.clear_layer(layers.persistent);
        surface.clear_layer(layers.hover);

        let hovered = self.hovered();
        let frame = compose_frame(&FrameInputs {
            session: &*self.bindings.session,
            oracle: &*self.bindings.visibility,
            scene: &*self.bindings.scene,
            assignments: &*self.store,
            hovered: hovered.as_ref(),
            config: &self.config,
        });
        for primitive in &frame.persistent {
            surface.draw(layers.persistent, primitive);
        }
        for primitive in &frame.hover {
            surface.draw(layers.hover, primitive);
        }

        self.redraws.set(self.redraws.get() + 1);
        debug!(
            "redraw #{} (persistent={} hover={})",
            self.redraws.get(),
            frame.persistent.len(),
            frame.hover.len()
        );
        *self.last_frame.borrow_mut() = frame.clone();
        Ok(frame)
    }

    /// Empties both layers without recomposing.
    pub fn clear_now(&self) {
        if let Some(layers) = self.context.borrow().layers {
            self.bindings.surface.clear_layer(layers.persistent);
            self.bindings.surface.clear_layer(layers.hover);
        }
        *self.last_frame.borrow_mut() = RenderFrame::default();
    }

    pub fn last_frame(&self) -> RenderFrame {
        self.last_frame.borrow().clone()
    }

    pub fn redraw_count(&self) -> u64 {
        self.redraws.get()
    }

    fn ensure_layers(&self) -> Result<OverlayLayers, SurfaceError> {
        if let Some(layers) = self.context.borrow().layers {
            return Ok(layers);
        }
        let surface = &self.bindings.surface;
        if !surface.is_ready() {
            return Err(SurfaceError::NotReady);
        }
        let layers = OverlayLayers {
            persistent: surface.create_layer(PERSISTENT_LAYER)?,
            hover: surface.create_layer(HOVER_LAYER)?,
        };
        self.context.borrow_mut().layers = Some(layers);
        Ok(layers)
    }
}
