#![allow(dead_code)]

use std::rc::Rc;

use targetweave::memory::{settle, EntityRecord, MemoryBus, MemoryClient, SharedWorld, World};
use targetweave::{DrawableId, HostEvent, InputModifiers, PointerButton, PointerEvent};
use targetweave_core::{
    EntityId, Footprint, Participant, ParticipantId, Point, TargetSet, TargetsConfig, UserId,
    UserInfo,
};

pub fn uid(raw: &str) -> UserId {
    UserId::parse(raw).expect("valid user id")
}

pub fn eid(raw: &str) -> EntityId {
    EntityId::parse(raw).expect("valid entity id")
}

pub fn pid(raw: &str) -> ParticipantId {
    ParticipantId::parse(raw).expect("valid participant id")
}

pub fn set(ids: &[&str]) -> TargetSet {
    ids.iter().map(|raw| eid(raw)).collect()
}

fn cell(column: f32, row: f32) -> Footprint {
    Footprint {
        x: column * 100.0,
        y: row * 100.0,
        width: 100.0,
        height: 100.0,
    }
}

fn entity(id: &str, footprint: Footprint, owner: Option<&str>, hidden: bool) -> EntityRecord {
    EntityRecord {
        id: eid(id),
        footprint,
        owners: owner.map(uid).into_iter().collect(),
        hidden,
    }
}

/// gm (referee), u1 and u2. p1 = tok-1 (u1), p2 = tok-2 (u2), p3 = npc-1. Scenery e2, e3 and a
/// hidden e4. Not started.
pub fn world() -> SharedWorld {
    let world = World::shared();
    {
        let mut w = world.borrow_mut();
        w.add_user(UserInfo {
            id: uid("gm"),
            referee: true,
            color: Some("#ffffff".to_string()),
        });
        w.add_user(UserInfo {
            id: uid("u1"),
            referee: false,
            color: Some("#ff0000".to_string()),
        });
        w.add_user(UserInfo {
            id: uid("u2"),
            referee: false,
            color: Some("#00ff00".to_string()),
        });

        w.add_entity(entity("tok-1", cell(0.0, 0.0), Some("u1"), false));
        w.add_entity(entity("tok-2", cell(1.0, 0.0), Some("u2"), false));
        w.add_entity(entity("npc-1", cell(2.0, 0.0), None, false));
        w.add_entity(entity("e2", cell(0.0, 1.0), None, false));
        w.add_entity(entity("e3", cell(1.0, 1.0), None, false));
        w.add_entity(entity("e4", cell(2.0, 1.0), None, true));

        w.add_participant(Participant {
            id: pid("p1"),
            token: Some(eid("tok-1")),
            owner: Some(uid("u1")),
            npc: false,
        });
        w.add_participant(Participant {
            id: pid("p2"),
            token: Some(eid("tok-2")),
            owner: Some(uid("u2")),
            npc: false,
        });
        w.add_participant(Participant {
            id: pid("p3"),
            token: Some(eid("npc-1")),
            owner: None,
            npc: true,
        });

        // tok-1 handle with a nested sprite two levels deep.
        w.add_drawable(DrawableId(1), None, Some(eid("tok-1")));
        w.add_drawable(DrawableId(2), Some(DrawableId(1)), None);
        w.add_drawable(DrawableId(3), Some(DrawableId(2)), None);
        w.add_drawable(DrawableId(40), None, Some(eid("e4")));
    }
    world
}

pub struct Fixture {
    pub world: SharedWorld,
    pub bus: Rc<MemoryBus>,
    pub clients: Vec<MemoryClient>,
}

impl Fixture {
    pub async fn connect(world: SharedWorld, config: TargetsConfig) -> Self {
        let bus = MemoryBus::new();
        let clients = ["gm", "u1", "u2"]
            .into_iter()
            .map(|viewer| MemoryClient::connect(&world, &bus, uid(viewer), config.clone()))
            .collect::<Vec<_>>();
        for client in &clients {
            client.handle(HostEvent::SceneReady).await;
        }
        settle(&clients).await;
        Self {
            world,
            bus,
            clients,
        }
    }

    /// Started session with p1 active, default config.
    pub async fn started() -> Self {
        let world = world();
        world.borrow_mut().start();
        Self::connect(world, TargetsConfig::default()).await
    }

    pub fn gm(&self) -> &MemoryClient {
        &self.clients[0]
    }

    pub fn u1(&self) -> &MemoryClient {
        &self.clients[1]
    }

    pub fn u2(&self) -> &MemoryClient {
        &self.clients[2]
    }

    pub async fn settle(&self) -> usize {
        settle(&self.clients).await
    }

    pub async fn broadcast(&self, event: HostEvent) {
        for client in &self.clients {
            client.handle(event.clone()).await;
        }
    }

    pub fn persisted(&self, participant: &str, proposer: &str) -> TargetSet {
        self.world
            .borrow()
            .assignment(&pid(participant))
            .targets_for(&uid(proposer))
    }

    pub fn redraw_counts(&self) -> Vec<u64> {
        self.clients
            .iter()
            .map(|client| client.client().renderer().redraw_count())
            .collect()
    }

    pub fn center(&self, entity: &str) -> Point {
        let target = eid(entity);
        self.world
            .borrow()
            .entities()
            .find(|record| record.id == target)
            .map(|record| record.footprint.center())
            .expect("entity is placed")
    }
}

pub fn secondary(position: Point, target: Option<DrawableId>, toggle: bool) -> HostEvent {
    HostEvent::Pointer(PointerEvent {
        button: PointerButton::Secondary,
        position,
        target,
        modifiers: InputModifiers {
            ctrl: toggle,
            ..InputModifiers::default()
        },
    })
}

pub fn primary(position: Point) -> HostEvent {
    HostEvent::Pointer(PointerEvent {
        button: PointerButton::Primary,
        position,
        target: None,
        modifiers: InputModifiers::default(),
    })
}
