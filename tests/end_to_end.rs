mod common;

use common::{eid, primary, secondary, set, Fixture};
use targetweave_core::Point;

#[tokio::test]
async fn replace_toggle_clear_redraws_once_per_step() {
    let fixture = Fixture::started().await;
    let steps = [
        (secondary(fixture.center("e2"), None, false), set(&["e2"])),
        (secondary(fixture.center("e3"), None, true), set(&["e2", "e3"])),
        (primary(Point { x: -400.0, y: -400.0 }), set(&[])),
    ];

    for (event, expected) in steps {
        let before = fixture.redraw_counts();
        fixture.u1().handle(event).await;
        fixture.settle().await;
        let after = fixture.redraw_counts();

        assert_eq!(fixture.persisted("p1", "u1"), expected);
        for (viewer, (before, after)) in before.iter().zip(&after).enumerate() {
            assert_eq!(after - before, 1, "viewer #{viewer} redraw count");
        }
        for client in &fixture.clients {
            let frame = client.client().renderer().last_frame();
            let lines = frame.persistent.iter().filter(|p| p.is_line()).count();
            assert_eq!(lines, expected.len(), "viewer {}", client.viewer());
        }
    }
}

#[tokio::test]
async fn requester_marks_its_own_targets_natively() {
    let fixture = Fixture::started().await;

    fixture
        .u1()
        .handle(secondary(fixture.center("e2"), None, false))
        .await;
    assert_eq!(fixture.u1().native().marked(), vec![eid("e2")]);
    // Nothing is persisted until the authority has seen the request.
    assert!(fixture.persisted("p1", "u1").is_empty());

    fixture.settle().await;
    assert_eq!(fixture.persisted("p1", "u1"), set(&["e2"]));
    assert_eq!(fixture.u1().native().marked(), vec![eid("e2")]);
    assert!(fixture.u2().native().marked().is_empty());
}

#[tokio::test]
async fn session_end_clears_overlays_and_records() {
    let fixture = Fixture::started().await;
    fixture
        .u1()
        .handle(secondary(fixture.center("e2"), None, false))
        .await;
    fixture.settle().await;
    assert!(!fixture.u2().client().renderer().last_frame().is_empty());

    fixture.world.borrow_mut().end();
    fixture
        .broadcast(targetweave::HostEvent::SessionUpdated {
            started: Some(false),
        })
        .await;
    fixture.settle().await;

    assert!(fixture.persisted("p1", "u1").is_empty());
    for client in &fixture.clients {
        assert!(client.client().renderer().last_frame().is_empty());
        assert!(client.native().marked().is_empty());
    }
}
