use std::rc::Rc;

use targetweave_core::gate;
use targetweave_core::{EntityId, Point, TargetEdit, TargetsConfig, ToggleModifier};
use tracing::debug;

use crate::error::ClientError;
use crate::host::{DrawableId, HostBindings};
use crate::sync::{Proposal, SyncProtocol};

/// Guards the ownership walk against malformed (cyclic) drawable trees.
const MAX_DRAWABLE_DEPTH: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
    Other(u16),
}

impl PointerButton {
    /// Maps DOM-style button numbers.
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => PointerButton::Primary,
            1 => PointerButton::Middle,
            2 => PointerButton::Secondary,
            other => PointerButton::Other(other),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputModifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl InputModifiers {
    pub fn holds(&self, modifier: ToggleModifier) -> bool {
        match modifier {
            ToggleModifier::CtrlOrMeta => self.ctrl || self.meta,
            ToggleModifier::Shift => self.shift,
            ToggleModifier::Alt => self.alt,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub button: PointerButton,
    /// World coordinates.
    pub position: Point,
    /// Topmost drawable under the pointer, if the host reports one.
    pub target: Option<DrawableId>,
    pub modifiers: InputModifiers,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    Ignored,
    Proposed(Proposal),
}

pub struct InputDispatcher {
    bindings: HostBindings,
    sync: Rc<SyncProtocol>,
    config: Rc<TargetsConfig>,
}

impl InputDispatcher {
    pub fn new(bindings: HostBindings, sync: Rc<SyncProtocol>, config: Rc<TargetsConfig>) -> Self {
        Self {
            bindings,
            sync,
            config,
        }
    }

    pub async fn on_pointer_down(&self, event: &PointerEvent) -> Result<Dispatch, ClientError> {
        match event.button {
            PointerButton::Primary => {
                if event.target.and_then(|d| self.entity_from_drawable(d)).is_some() {
                    return Ok(Dispatch::Ignored);
                }
                self.propose_for_viewer(TargetEdit::Clear).await
            }
            PointerButton::Secondary => {
                let Some(entity) = self.resolve_entity(event) else {
                    return Ok(Dispatch::Ignored);
                };
                self.on_entity_secondary_click(entity, event.modifiers).await
            }
            _ => Ok(Dispatch::Ignored),
        }
    }

    /// Entry point for hosts that already know which entity was secondary-clicked.
    pub async fn on_entity_secondary_click(
        &self,
        entity: EntityId,
        modifiers: InputModifiers,
    ) -> Result<Dispatch, ClientError> {
        let edit = if modifiers.holds(self.config.toggle_modifier) {
            TargetEdit::Toggle(entity)
        } else {
            TargetEdit::Replace(entity)
        };
        self.propose_for_viewer(edit).await
    }

    /// Ownership chain of the hit drawable first, then a topmost-first footprint scan.
    pub fn resolve_entity(&self, event: &PointerEvent) -> Option<EntityId> {
        event
            .target
            .and_then(|drawable| self.entity_from_drawable(drawable))
            .or_else(|| self.entity_at(event.position))
    }

    fn entity_from_drawable(&self, drawable: DrawableId) -> Option<EntityId> {
        let tree = &self.bindings.drawables;
        let mut current = Some(drawable);
        for _ in 0..MAX_DRAWABLE_DEPTH {
            let node = current?;
            if let Some(entity) = tree.owning_entity(node) {
                return Some(entity);
            }
            current = tree.parent(node);
        }
        None
    }

    fn entity_at(&self, point: Point) -> Option<EntityId> {
        let scene = &self.bindings.scene;
        self.bindings
            .drawables
            .placeables()
            .into_iter()
            .rev()
            .find(|entity| {
                scene
                    .footprint(entity)
                    .is_some_and(|footprint| footprint.contains(point))
            })
    }

    async fn propose_for_viewer(&self, edit: TargetEdit) -> Result<Dispatch, ClientError> {
        let session = &*self.bindings.session;
        let viewer = session.viewer();
        let Some(active) = gate::active_for(&viewer, session) else {
            debug!("input ignored: viewer cannot act (viewer={})", viewer.id);
            return Ok(Dispatch::Ignored);
        };
        let proposal = self.sync.propose(&active.id, &viewer.id, edit).await?;
        Ok(Dispatch::Proposed(proposal))
    }
}
