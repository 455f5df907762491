use std::collections::HashMap;
use std::error::Error;
use std::fmt::Write as _;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use targetweave::memory::{settle, EntityRecord, MemoryBus, MemoryClient, SharedWorld, World};
use targetweave::{DrawableId, HostEvent, InputModifiers, PointerButton, PointerEvent};
use targetweave_core::{
    EntityId, Footprint, Participant, ParticipantId, Point, Primitive, RenderFrame, TargetSet,
    TargetsConfig, UserId, UserInfo,
};
use tracing::{debug, info};

const CELL: f32 = 100.0;
const COLUMNS: usize = 8;
const SCENERY: usize = 6;
const PALETTE: [&str; 6] = ["#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4"];
/// Drawable ids of child sprites are offset from their entity handle.
const CHILD_DRAWABLE_OFFSET: u64 = 10_000;

/// A seeded table: a referee, `players` players with one token each, two NPCs, scenery.
pub struct Table {
    pub world: SharedWorld,
    pub referee: UserId,
    pub players: Vec<UserId>,
    placed: usize,
    handles: HashMap<EntityId, DrawableId>,
}

impl Table {
    pub fn build(players: usize) -> Result<Self, Box<dyn Error>> {
        let world = World::shared();
        let referee: UserId = "gm".parse()?;
        let mut table = Table {
            world,
            referee: referee.clone(),
            players: Vec::with_capacity(players),
            placed: 0,
            handles: HashMap::new(),
        };
        table.world.borrow_mut().add_user(UserInfo {
            id: referee,
            referee: true,
            color: Some("#ffffff".to_string()),
        });

        for index in 1..=players {
            let user: UserId = format!("u{index}").parse()?;
            table.world.borrow_mut().add_user(UserInfo {
                id: user.clone(),
                referee: false,
                color: Some(PALETTE[(index - 1) % PALETTE.len()].to_string()),
            });
            let token = table.place(&format!("tok-{index}"), Some(&user), false)?;
            table.world.borrow_mut().add_participant(Participant {
                id: format!("p{index}").parse()?,
                token: Some(token),
                owner: Some(user.clone()),
                npc: false,
            });
            table.players.push(user);
        }
        for index in 1..=2 {
            let token = table.place(&format!("npc-{index}"), None, false)?;
            table.world.borrow_mut().add_participant(Participant {
                id: format!("p-npc-{index}").parse()?,
                token: Some(token),
                owner: None,
                npc: true,
            });
        }
        for index in 1..=SCENERY {
            table.place(&format!("e{index}"), None, index == SCENERY)?;
        }
        Ok(table)
    }

    /// Places an entity in the next free grid cell, with a handle drawable and a child sprite.
    pub fn place(
        &mut self,
        id: &str,
        owner: Option<&UserId>,
        hidden: bool,
    ) -> Result<EntityId, Box<dyn Error>> {
        let entity: EntityId = id.parse()?;
        let slot = self.placed;
        self.placed += 1;
        let footprint = Footprint {
            x: (slot % COLUMNS) as f32 * CELL,
            y: (slot / COLUMNS) as f32 * CELL,
            width: CELL,
            height: CELL,
        };
        let mut world = self.world.borrow_mut();
        world.add_entity(EntityRecord {
            id: entity.clone(),
            footprint,
            owners: owner.cloned().into_iter().collect(),
            hidden,
        });
        let handle = DrawableId(slot as u64 + 1);
        world.add_drawable(handle, None, Some(entity.clone()));
        world.add_drawable(DrawableId(handle.0 + CHILD_DRAWABLE_OFFSET), Some(handle), None);
        self.handles.insert(entity.clone(), handle);
        Ok(entity)
    }

    pub fn viewers(&self) -> Vec<UserId> {
        std::iter::once(self.referee.clone())
            .chain(self.players.iter().cloned())
            .collect()
    }

    pub fn connect(&self, bus: &Rc<MemoryBus>, config: &TargetsConfig) -> Vec<MemoryClient> {
        self.viewers()
            .into_iter()
            .map(|viewer| MemoryClient::connect(&self.world, bus, viewer, config.clone()))
            .collect()
    }

    /// The child sprite of an entity's handle, as a host hit test would report it.
    pub fn sprite_of(&self, entity: &EntityId) -> Option<DrawableId> {
        self.handles
            .get(entity)
            .map(|handle| DrawableId(handle.0 + CHILD_DRAWABLE_OFFSET))
    }

    pub fn center_of(&self, entity: &EntityId) -> Option<Point> {
        self.world
            .borrow()
            .entities()
            .find(|record| record.id == *entity)
            .map(|record| record.footprint.center())
    }
}

pub fn secondary_click(position: Point, target: Option<DrawableId>, toggle: bool) -> PointerEvent {
    PointerEvent {
        button: PointerButton::Secondary,
        position,
        target,
        modifiers: InputModifiers {
            ctrl: toggle,
            ..InputModifiers::default()
        },
    }
}

pub fn primary_click(position: Point) -> PointerEvent {
    PointerEvent {
        button: PointerButton::Primary,
        position,
        target: None,
        modifiers: InputModifiers::default(),
    }
}

pub fn describe_frame(frame: &RenderFrame) -> String {
    let mut out = String::new();
    for (layer, primitives) in [("persistent", &frame.persistent), ("hover", &frame.hover)] {
        for primitive in primitives.iter() {
            let _ = match primitive {
                Primitive::Line {
                    from_entity,
                    to_entity,
                    stroke,
                    ..
                } => writeln!(
                    out,
                    "  [{layer}] line {from_entity} -> {to_entity} width={} color={}",
                    stroke.width, stroke.color
                ),
                Primitive::Outline {
                    entity,
                    points,
                    stroke,
                    ..
                } => writeln!(
                    out,
                    "  [{layer}] outline {entity} points={} color={}",
                    points.len(),
                    stroke.color
                ),
            };
        }
    }
    if out.is_empty() {
        out.push_str("  (empty)\n");
    }
    out
}

#[derive(Debug)]
pub struct StepReport {
    pub label: String,
    pub expected: TargetSet,
    pub persisted: TargetSet,
    /// Redraws each client performed during the step, in viewer order.
    pub redraws: Vec<u64>,
}

impl StepReport {
    pub fn passed(&self) -> bool {
        self.expected == self.persisted && self.redraws.iter().all(|count| *count == 1)
    }
}

/// Replays the reference scenario: U1 replaces with E2, toggles E3, then clears.
pub async fn run_scenario(config: TargetsConfig) -> Result<Vec<StepReport>, Box<dyn Error>> {
    let mut table = Table::build(2)?;
    let e2 = table.place("scenario-e2", None, false)?;
    let e3 = table.place("scenario-e3", None, false)?;
    table.world.borrow_mut().start();

    let bus = MemoryBus::new();
    let clients = table.connect(&bus, &config);
    for client in &clients {
        client.handle(HostEvent::SceneReady).await;
    }
    settle(&clients).await;

    let p1: ParticipantId = "p1".parse()?;
    let u1 = table.players.first().cloned().ok_or("scenario needs a player")?;
    let actor = clients
        .iter()
        .find(|client| *client.viewer() == u1)
        .ok_or("player client missing")?;

    let e2_center = table.center_of(&e2).ok_or("e2 not placed")?;
    let e3_center = table.center_of(&e3).ok_or("e3 not placed")?;
    let steps = [
        (
            "secondary click e2",
            secondary_click(e2_center, None, false),
            TargetSet::single(e2.clone()),
        ),
        (
            "secondary click e3 with modifier",
            secondary_click(e3_center, None, true),
            [e2.clone(), e3.clone()].into_iter().collect(),
        ),
        (
            "primary click on empty space",
            primary_click(Point { x: -5.0 * CELL, y: -5.0 * CELL }),
            TargetSet::new(),
        ),
    ];

    let mut reports = Vec::with_capacity(steps.len());
    for (label, event, expected) in steps {
        let before: Vec<u64> = clients
            .iter()
            .map(|client| client.client().renderer().redraw_count())
            .collect();
        actor.handle(HostEvent::Pointer(event)).await;
        settle(&clients).await;
        let redraws = clients
            .iter()
            .zip(before)
            .map(|(client, before)| client.client().renderer().redraw_count() - before)
            .collect();
        let persisted = table.world.borrow().assignment(&p1).targets_for(&u1);

        println!("step: {label}");
        for client in &clients {
            println!("viewer {}:", client.viewer());
            print!("{}", describe_frame(&client.client().renderer().last_frame()));
        }
        let report = StepReport {
            label: label.to_string(),
            expected,
            persisted,
            redraws,
        };
        info!(
            "{} -> persisted={:?} redraws={:?} ok={}",
            report.label,
            report.persisted.as_slice(),
            report.redraws,
            report.passed()
        );
        reports.push(report);
    }
    Ok(reports)
}

#[derive(Clone, Copy, Debug)]
pub struct SoakOptions {
    pub players: usize,
    pub steps: usize,
    pub seed: u64,
    pub reorder: bool,
}

#[derive(Debug, Default)]
pub struct SoakReport {
    pub steps: usize,
    pub frames: u64,
    pub writes: u64,
    pub violations: Vec<String>,
}

impl SoakReport {
    pub fn converged(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Random clicks, hovers, removals and turn changes, with optional message reordering. After
/// the bus drains every client must render exactly what canonical state implies.
pub async fn run_soak(
    config: TargetsConfig,
    options: SoakOptions,
) -> Result<SoakReport, Box<dyn Error>> {
    let mut table = Table::build(options.players.max(1))?;
    table.world.borrow_mut().start();
    let bus = MemoryBus::new();
    let clients = table.connect(&bus, &config);
    for client in &clients {
        client.handle(HostEvent::SceneReady).await;
    }
    settle(&clients).await;

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut spawned = 0usize;
    for step in 0..options.steps {
        let roll = rng.random_range(0..100u32);
        match roll {
            0..=39 => {
                let Some(client) = controller(&table, &clients) else {
                    continue;
                };
                click_random_entity(&table, client, &mut rng).await;
            }
            40..=49 => {
                let client = &clients[rng.random_range(0..clients.len())];
                click_random_entity(&table, client, &mut rng).await;
            }
            50..=57 => {
                if let Some(client) = controller(&table, &clients) {
                    let point = Point {
                        x: -3.0 * CELL,
                        y: -3.0 * CELL,
                    };
                    client.handle(HostEvent::Pointer(primary_click(point))).await;
                }
            }
            58..=69 => {
                let entities = entity_ids(&table);
                if let Some(entity) = pick(&entities, &mut rng) {
                    let hovered = rng.random_bool(0.7);
                    let client = &clients[rng.random_range(0..clients.len())];
                    client.handle(HostEvent::Hover { entity, hovered }).await;
                }
            }
            70..=77 => {
                table.world.borrow_mut().advance_turn();
                for client in &clients {
                    client.handle(HostEvent::TurnChanged).await;
                }
            }
            78..=82 => {
                let scenery: Vec<EntityId> = entity_ids(&table)
                    .into_iter()
                    .filter(|entity| entity.as_str().starts_with('e'))
                    .collect();
                if let Some(entity) = pick(&scenery, &mut rng) {
                    table.world.borrow_mut().remove_entity(&entity);
                    debug!("step {step}: removed {entity}");
                    for client in &clients {
                        client
                            .handle(HostEvent::EntityRemoved {
                                entity: entity.clone(),
                            })
                            .await;
                    }
                }
            }
            83..=86 => {
                spawned += 1;
                table.place(&format!("e-spawn-{spawned}"), None, rng.random_bool(0.2))?;
                for client in &clients {
                    client.handle(HostEvent::ParticipantUpdated).await;
                }
            }
            _ => {
                let client = &clients[rng.random_range(0..clients.len())];
                let mut frames = client.take_inbox();
                if options.reorder {
                    frames.shuffle(&mut rng);
                }
                for frame in &frames {
                    client.client().handle_frame(frame).await;
                }
            }
        }
        if rng.random_bool(0.5) {
            clients[rng.random_range(0..clients.len())].client().on_frame();
        }
    }

    settle(&clients).await;

    let mut report = SoakReport {
        steps: options.steps,
        frames: bus.frames_sent(),
        writes: table.world.borrow().write_count(),
        violations: Vec::new(),
    };
    check_convergence(&table, &clients, &config, &mut report);
    Ok(report)
}

fn check_convergence(
    table: &Table,
    clients: &[MemoryClient],
    config: &TargetsConfig,
    report: &mut SoakReport,
) {
    let world = table.world.borrow();
    let live: Vec<EntityId> = world.entities().map(|record| record.id.clone()).collect();
    for participant in world.participants() {
        for (proposer, targets) in world.assignment(&participant.id).entries() {
            for target in targets {
                if !live.contains(target) {
                    report.violations.push(format!(
                        "{} / {proposer} still targets removed {target}",
                        participant.id
                    ));
                }
            }
        }
    }
    let active = world.active_participant().cloned();
    let participants: Vec<_> = world.participants().iter().map(|p| p.id.clone()).collect();
    let hidden: Vec<EntityId> = world
        .entities()
        .filter(|record| record.hidden)
        .map(|record| record.id.clone())
        .collect();
    let referee = table.referee.clone();
    drop(world);

    for client in clients {
        let viewer = client.viewer();
        let shown = client.client().renderer().last_frame();
        let fresh = match client.client().renderer().redraw() {
            Ok(frame) => frame,
            Err(err) => {
                report.violations.push(format!("{viewer}: redraw failed: {err}"));
                continue;
            }
        };
        if shown != fresh {
            report
                .violations
                .push(format!("{viewer}: rendered frame is stale"));
        }
        if *viewer != referee {
            for entity in &hidden {
                let owned = table
                    .world
                    .borrow()
                    .entities()
                    .any(|record| record.id == *entity && record.owners.contains(viewer));
                if !owned && fresh.primitives().any(|primitive| primitive.references(entity)) {
                    report
                        .violations
                        .push(format!("{viewer}: frame reveals hidden {entity}"));
                }
            }
        }
        for participant in &participants {
            if active.as_ref().is_some_and(|active| active.id == *participant) {
                continue;
            }
            if let Some(echo) = client.client().sync().echo(participant, viewer) {
                report.violations.push(format!(
                    "{viewer}: echo {echo:?} left on inactive {participant}"
                ));
            }
        }
        if config.sync_native_targets {
            if let Some(active) = &active {
                let actor = active.owner.as_ref().unwrap_or(&referee);
                if actor == viewer {
                    let canonical = table.world.borrow().assignment(&active.id).targets_for(viewer);
                    let visible: Vec<EntityId> = canonical
                        .iter()
                        .filter(|entity| *viewer == referee || !hidden.contains(entity))
                        .cloned()
                        .collect();
                    if client.native().marked() != visible {
                        report.violations.push(format!(
                            "{viewer}: native marking {:?} differs from canonical {:?}",
                            client.native().marked(),
                            visible
                        ));
                    }
                }
            }
        }
    }
}

/// The client allowed to act for the active participant: its owner, or the referee for NPCs.
fn controller<'a>(table: &Table, clients: &'a [MemoryClient]) -> Option<&'a MemoryClient> {
    let world = table.world.borrow();
    let active = world.active_participant()?;
    let actor = active.owner.clone().unwrap_or_else(|| table.referee.clone());
    clients.iter().find(|client| *client.viewer() == actor)
}

async fn click_random_entity(table: &Table, client: &MemoryClient, rng: &mut StdRng) {
    let entities = entity_ids(table);
    let Some(entity) = pick(&entities, rng) else {
        return;
    };
    let Some(center) = table.center_of(&entity) else {
        return;
    };
    let toggle = rng.random_bool(0.3);
    if rng.random_bool(0.3) {
        client
            .handle(HostEvent::EntitySecondaryClick {
                entity,
                modifiers: InputModifiers {
                    ctrl: toggle,
                    ..InputModifiers::default()
                },
            })
            .await;
        return;
    }
    let target = drawable_for(table, &entity, rng);
    client
        .handle(HostEvent::Pointer(secondary_click(center, target, toggle)))
        .await;
}

/// Sometimes reports the entity's child sprite as the hit drawable, sometimes nothing.
fn drawable_for(table: &Table, entity: &EntityId, rng: &mut StdRng) -> Option<DrawableId> {
    if rng.random_bool(0.5) {
        table.sprite_of(entity)
    } else {
        None
    }
}

fn entity_ids(table: &Table) -> Vec<EntityId> {
    table
        .world
        .borrow()
        .entities()
        .map(|record| record.id.clone())
        .collect()
}

fn pick<T: Clone>(items: &[T], rng: &mut StdRng) -> Option<T> {
    if items.is_empty() {
        return None;
    }
    Some(items[rng.random_range(0..items.len())].clone())
}
