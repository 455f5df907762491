mod common;

use common::{eid, pid, set, uid, world, Fixture};
use targetweave::{HostEvent, HOVER_LAYER, PERSISTENT_LAYER};
use targetweave_core::frame::{ACTIVE_LINE_WIDTH, HOVER_LINE_WIDTH, OWNED_LINE_WIDTH};
use targetweave_core::{Color, GridShape, Primitive, TargetAssignment, TargetsConfig};

fn seed(world: &targetweave::memory::SharedWorld, participant: &str, proposer: &str, ids: &[&str]) {
    let mut record = TargetAssignment::new();
    record.set(uid(proposer), set(ids));
    world.borrow_mut().put_flag(&pid(participant), record.to_flag());
}

fn lines(primitives: &[Primitive]) -> usize {
    primitives.iter().filter(|p| p.is_line()).count()
}

fn outlines(primitives: &[Primitive]) -> usize {
    primitives.iter().filter(|p| !p.is_line()).count()
}

#[tokio::test]
async fn redraw_is_idempotent() {
    let world = world();
    world.borrow_mut().start();
    seed(&world, "p1", "u1", &["e2", "e3"]);
    let fixture = Fixture::connect(world, TargetsConfig::default()).await;

    let renderer = fixture.u2().client().renderer();
    let first = renderer.redraw().expect("redraw");
    let second = renderer.redraw().expect("redraw");
    assert_eq!(first, second);
    assert_eq!(
        fixture.u2().surface().contents(PERSISTENT_LAYER),
        second.persistent
    );
}

#[tokio::test]
async fn hidden_targets_never_leak() {
    let world = world();
    world.borrow_mut().start();
    seed(&world, "p1", "u1", &["e2", "e4"]);
    let fixture = Fixture::connect(world, TargetsConfig::default()).await;

    let hidden = eid("e4");
    let player_view = fixture.u2().client().renderer().last_frame();
    assert!(!player_view.primitives().any(|p| p.references(&hidden)));
    assert_eq!(lines(&player_view.persistent), 1);

    // The referee may see it.
    let referee_view = fixture.gm().client().renderer().last_frame();
    assert!(referee_view.primitives().any(|p| p.references(&hidden)));
    assert_eq!(lines(&referee_view.persistent), 2);
}

#[tokio::test]
async fn only_invisible_targets_draw_nothing_at_all() {
    let world = world();
    world.borrow_mut().start();
    seed(&world, "p1", "u1", &["e4"]);
    let fixture = Fixture::connect(world, TargetsConfig::default()).await;
    assert!(fixture.u2().client().renderer().last_frame().is_empty());
}

#[tokio::test]
async fn self_target_is_one_outline_and_no_line() {
    let world = world();
    world.borrow_mut().start();
    seed(&world, "p1", "u1", &["tok-1"]);
    let fixture = Fixture::connect(world, TargetsConfig::default()).await;

    let frame = fixture.u2().client().renderer().last_frame();
    assert_eq!(lines(&frame.persistent), 0);
    assert_eq!(outlines(&frame.persistent), 1);
    assert!(frame.persistent[0].references(&eid("tok-1")));
}

#[tokio::test]
async fn active_connections_use_author_color_and_weight() {
    let world = world();
    world.borrow_mut().start();
    seed(&world, "p1", "u1", &["e2"]);
    let fixture = Fixture::connect(world, TargetsConfig::default()).await;

    let frame = fixture.gm().client().renderer().last_frame();
    let line = frame
        .persistent
        .iter()
        .find(|p| p.is_line())
        .expect("one line");
    let Primitive::Line { stroke, from, to, .. } = line else {
        unreachable!();
    };
    assert_eq!(stroke.width, ACTIVE_LINE_WIDTH);
    assert_eq!(stroke.color, Color(0xff0000));
    assert_eq!((from.x, from.y), (50.0, 50.0));
    assert_eq!((to.x, to.y), (50.0, 150.0));
}

#[tokio::test]
async fn hover_previews_go_to_their_own_layer() {
    let world = world();
    world.borrow_mut().start();
    seed(&world, "p2", "u2", &["e3"]);
    let fixture = Fixture::connect(world, TargetsConfig::default()).await;

    let client = fixture.u1();
    client
        .handle(HostEvent::Hover {
            entity: eid("tok-2"),
            hovered: true,
        })
        .await;
    assert!(client.client().flush());

    let frame = client.client().renderer().last_frame();
    assert!(frame.persistent.is_empty());
    assert_eq!(lines(&frame.hover), 1);
    let Some(Primitive::Line { stroke, .. }) = frame.hover.iter().find(|p| p.is_line()) else {
        panic!("hover line expected");
    };
    assert_eq!(stroke.width, HOVER_LINE_WIDTH);
    assert_eq!(client.surface().contents(HOVER_LAYER), frame.hover);

    // Leaving some other entity keeps the preview; leaving tok-2 drops it.
    client
        .handle(HostEvent::Hover {
            entity: eid("e2"),
            hovered: false,
        })
        .await;
    client.client().flush();
    assert_eq!(lines(&client.client().renderer().last_frame().hover), 1);
    client
        .handle(HostEvent::Hover {
            entity: eid("tok-2"),
            hovered: false,
        })
        .await;
    client.client().flush();
    assert!(client.client().renderer().last_frame().hover.is_empty());
}

#[tokio::test]
async fn owned_persistent_connections_follow_config() {
    for (show, expected) in [(false, 0), (true, 1)] {
        let world = world();
        world.borrow_mut().start();
        world.borrow_mut().set_turn(1);
        seed(&world, "p1", "u1", &["e2"]);
        let config = TargetsConfig {
            show_owned_persistent: show,
            ..TargetsConfig::default()
        };
        let fixture = Fixture::connect(world, config).await;

        let own = fixture.u1().client().renderer().last_frame();
        assert_eq!(lines(&own.persistent), expected, "show={show}");
        if let Some(Primitive::Line { stroke, .. }) = own.persistent.iter().find(|p| p.is_line()) {
            assert_eq!(stroke.width, OWNED_LINE_WIDTH);
        }
        // Other players and the referee never get this pass.
        assert!(fixture.u2().client().renderer().last_frame().is_empty());
        assert!(fixture.gm().client().renderer().last_frame().is_empty());
    }
}

#[tokio::test]
async fn hex_grids_outline_six_points() {
    let world = world();
    world.borrow_mut().start();
    world.borrow_mut().set_grid(GridShape::HexFlatTop);
    seed(&world, "p1", "u1", &["e2"]);
    let fixture = Fixture::connect(world, TargetsConfig::default()).await;

    let frame = fixture.u2().client().renderer().last_frame();
    for primitive in &frame.persistent {
        if let Primitive::Outline { points, .. } = primitive {
            assert_eq!(points.len(), 6);
        }
    }
    assert_eq!(outlines(&frame.persistent), 2);
}

#[tokio::test]
async fn bursts_of_events_coalesce_into_one_redraw() {
    let fixture = Fixture::started().await;
    let client = fixture.u2();
    let before = client.client().renderer().redraw_count();

    for _ in 0..5 {
        client.handle(HostEvent::ParticipantUpdated).await;
        client
            .handle(HostEvent::EntityRefreshed { entity: eid("e2") })
            .await;
    }
    assert!(client.client().flush());
    assert!(!client.client().flush());
    assert_eq!(client.client().renderer().redraw_count(), before + 1);
    assert!(client.client().scheduler().coalesced() >= 9);
}

#[tokio::test]
async fn movement_waits_for_the_next_frame() {
    let fixture = Fixture::started().await;
    let client = fixture.u2();
    let before = client.client().renderer().redraw_count();

    for step in 0..4 {
        fixture
            .world
            .borrow_mut()
            .move_entity(&eid("tok-1"), step as f32 * 10.0, 0.0);
        client
            .handle(HostEvent::EntityUpdated {
                entity: eid("tok-1"),
                moved: true,
            })
            .await;
    }
    assert!(!client.client().flush());
    assert!(client.client().on_frame());
    assert_eq!(client.client().renderer().redraw_count(), before + 1);
}

#[tokio::test]
async fn torn_down_scene_ignores_redraw_requests() {
    let fixture = Fixture::started().await;
    let client = fixture.u2();
    client.handle(HostEvent::SceneTornDown).await;
    assert_eq!(client.surface().layer_count(), 0);

    client.handle(HostEvent::ParticipantUpdated).await;
    assert!(!client.client().flush());

    client.handle(HostEvent::SceneReady).await;
    assert_eq!(client.surface().layer_count(), 2);
    assert!(client.client().flush());
}

#[tokio::test]
async fn unavailable_surface_is_logged_not_raised() {
    let world = world();
    world.borrow_mut().start();
    let bus = targetweave::memory::MemoryBus::new();
    let client = targetweave::memory::MemoryClient::connect(
        &world,
        &bus,
        uid("u2"),
        TargetsConfig::default(),
    );
    client.surface().set_available(false);
    client.handle(HostEvent::SceneReady).await;
    assert!(!client.client().renderer().is_attached());
    assert!(!client.client().flush());
}
