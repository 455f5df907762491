use crate::assignment::TargetSet;
use crate::color::Color;
use crate::config::TargetsConfig;
use crate::geometry::{outline_points, Footprint, Point};
use crate::ids::{EntityId, UserId};
use crate::session::{AssignmentSource, SceneQuery, SessionHost, VisibilityOracle};

pub const ACTIVE_LINE_WIDTH: f32 = 4.0;
pub const OWNED_LINE_WIDTH: f32 = 3.0;
pub const HOVER_LINE_WIDTH: f32 = 2.0;

pub const LINE_ALPHA: f32 = 0.9;
pub const HOVER_LINE_ALPHA: f32 = 0.6;
pub const FILL_ALPHA: f32 = 0.8;
pub const HOVER_FILL_ALPHA: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layer {
    Persistent,
    Hover,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Emphasis {
    /// Connections of the participant whose turn it is.
    Active,
    /// The viewer's own non-active participants.
    Owned,
    Hover,
}

impl Emphasis {
    pub fn line_width(self) -> f32 {
        match self {
            Emphasis::Active => ACTIVE_LINE_WIDTH,
            Emphasis::Owned => OWNED_LINE_WIDTH,
            Emphasis::Hover => HOVER_LINE_WIDTH,
        }
    }

    pub fn line_alpha(self) -> f32 {
        match self {
            Emphasis::Hover => HOVER_LINE_ALPHA,
            _ => LINE_ALPHA,
        }
    }

    pub fn fill_alpha(self) -> f32 {
        match self {
            Emphasis::Hover => HOVER_FILL_ALPHA,
            _ => FILL_ALPHA,
        }
    }

    pub fn layer(self) -> Layer {
        match self {
            Emphasis::Hover => Layer::Hover,
            _ => Layer::Persistent,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stroke {
    pub width: f32,
    pub color: Color,
    pub alpha: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fill {
    pub color: Color,
    pub alpha: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Line {
        from_entity: EntityId,
        to_entity: EntityId,
        from: Point,
        to: Point,
        stroke: Stroke,
    },
    Outline {
        entity: EntityId,
        points: Vec<Point>,
        stroke: Stroke,
        fill: Fill,
    },
}

impl Primitive {
    pub fn references(&self, entity: &EntityId) -> bool {
        match self {
            Primitive::Line {
                from_entity,
                to_entity,
                ..
            } => from_entity == entity || to_entity == entity,
            Primitive::Outline { entity: target, .. } => target == entity,
        }
    }

    pub fn is_line(&self) -> bool {
        matches!(self, Primitive::Line { .. })
    }
}

/// Everything drawn for one redraw. Rebuilt from scratch every time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderFrame {
    pub persistent: Vec<Primitive>,
    pub hover: Vec<Primitive>,
}

impl RenderFrame {
    pub fn is_empty(&self) -> bool {
        self.persistent.is_empty() && self.hover.is_empty()
    }

    pub fn layer(&self, layer: Layer) -> &[Primitive] {
        match layer {
            Layer::Persistent => &self.persistent,
            Layer::Hover => &self.hover,
        }
    }

    pub fn primitives(&self) -> impl Iterator<Item = &Primitive> {
        self.persistent.iter().chain(self.hover.iter())
    }

    fn layer_mut(&mut self, layer: Layer) -> &mut Vec<Primitive> {
        match layer {
            Layer::Persistent => &mut self.persistent,
            Layer::Hover => &mut self.hover,
        }
    }
}

pub struct FrameInputs<'a> {
    pub session: &'a dyn SessionHost,
    pub oracle: &'a dyn VisibilityOracle,
    pub scene: &'a dyn SceneQuery,
    pub assignments: &'a dyn AssignmentSource,
    pub hovered: Option<&'a EntityId>,
    pub config: &'a TargetsConfig,
}

pub fn compose_frame(inputs: &FrameInputs<'_>) -> RenderFrame {
    let mut frame = RenderFrame::default();
    let session = inputs.session;
    if !session.is_started() {
        return frame;
    }

    let active = session.active_participant();
    let active_token = active.as_ref().and_then(|participant| participant.token.clone());

    if let Some((participant, origin)) = active
        .as_ref()
        .and_then(|participant| Some((participant, participant.token.as_ref()?)))
    {
        let assignment = inputs.assignments.assignment(&participant.id);
        if let Some(author) = assignment.first_non_empty_proposer() {
            let targets = assignment.targets_for(author);
            draw_connections(inputs, &mut frame, origin, &targets, author, Emphasis::Active);
        }
    }

    let viewer = session.viewer();
    if !viewer.referee && inputs.config.show_owned_persistent {
        for participant in session.participants() {
            let Some(origin) = participant.token.as_ref() else {
                continue;
            };
            if Some(origin) == active_token.as_ref() {
                continue;
            }
            if !inputs.oracle.viewer_owns(origin) {
                continue;
            }
            let targets = inputs
                .assignments
                .assignment(&participant.id)
                .targets_for(&viewer.id);
            draw_connections(inputs, &mut frame, origin, &targets, &viewer.id, Emphasis::Owned);
        }
    }

    if let Some(hovered) = inputs.hovered {
        if let Some(participant) = session.participant_for_entity(hovered) {
            let assignment = inputs.assignments.assignment(&participant.id);
            if let Some(author) = assignment.first_non_empty_proposer() {
                let targets = assignment.targets_for(author);
                draw_connections(inputs, &mut frame, hovered, &targets, author, Emphasis::Hover);
            }
        }
    }

    frame
}

fn draw_connections(
    inputs: &FrameInputs<'_>,
    frame: &mut RenderFrame,
    origin: &EntityId,
    targets: &TargetSet,
    author: &UserId,
    emphasis: Emphasis,
) {
    if targets.is_empty() {
        return;
    }
    let Some(origin_footprint) = inputs.scene.footprint(origin) else {
        return;
    };
    let color = Color::resolve(
        inputs
            .session
            .user(author)
            .and_then(|info| info.color)
            .as_deref(),
    );
    let stroke = Stroke {
        width: emphasis.line_width(),
        color,
        alpha: emphasis.line_alpha(),
    };
    let out = frame.layer_mut(emphasis.layer());
    let mut origin_outlined = false;

    for target in targets {
        let Some(target_footprint) = inputs.scene.footprint(target) else {
            continue;
        };
        if !inputs.oracle.is_visible(target) {
            continue;
        }
        if !origin_outlined {
            out.push(outline(inputs, origin, &origin_footprint, stroke, emphasis));
            origin_outlined = true;
        }
        if target == origin {
            continue;
        }
        out.push(Primitive::Line {
            from_entity: origin.clone(),
            to_entity: target.clone(),
            from: origin_footprint.center(),
            to: target_footprint.center(),
            stroke,
        });
        out.push(outline(inputs, target, &target_footprint, stroke, emphasis));
    }
}

fn outline(
    inputs: &FrameInputs<'_>,
    entity: &EntityId,
    footprint: &Footprint,
    line: Stroke,
    emphasis: Emphasis,
) -> Primitive {
    Primitive::Outline {
        entity: entity.clone(),
        points: outline_points(footprint, inputs.scene.grid_shape()),
        stroke: Stroke {
            width: line.width.floor().max(1.0),
            color: line.color,
            alpha: line.alpha,
        },
        fill: Fill {
            color: line.color,
            alpha: emphasis.fill_alpha(),
        },
    }
}
