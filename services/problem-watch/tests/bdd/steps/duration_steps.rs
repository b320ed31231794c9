//! BDD step definitions for duration parsing

use cucumber::{then, when};
use problem_watch::duration::parse_minutes;

use crate::world::WatchWorld;

#[when(expr = "the duration {string} is parsed")]
fn parse_duration(world: &mut WatchWorld, text: String) {
    world.parsed_minutes = Some(parse_minutes(&text));
}

#[then(expr = "the result is {float} minutes")]
fn result_is(world: &mut WatchWorld, expected: f64) {
    let actual = world.parsed_minutes.expect("no duration parsed");
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {} minutes, got {}",
        expected,
        actual
    );
}
