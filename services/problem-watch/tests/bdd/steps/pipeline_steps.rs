//! BDD step definitions for the alert relay run

use std::sync::Arc;

use cucumber::{given, then, when};
use problem_watch::config::Config;
use problem_watch::pipeline::Pipeline;
use problem_watch::WatchError;

use crate::world::{
    LoginScript, MemoryKeyStore, RecordingNotifier, ScriptedLauncher, WatchWorld, LOGIN_URL,
    START_TIME,
};

const ALERT_CHAT: &str = "alerts@g.us";
const CONTROL_CHAT: &str = "control@g.us";

fn test_config() -> Config {
    let mut config = Config::default();
    config.dashboard.login_url = LOGIN_URL.to_string();
    config.dashboard.username = "watcher".to_string();
    config.dashboard.password = "secret".to_string();
    config.dashboard.settle_delay_ms = 0;
    config.extraction.settle_delay_ms = 0;
    config.gateway.alert_chat_id = ALERT_CHAT.to_string();
    config.gateway.control_chat_id = CONTROL_CHAT.to_string();
    config.gateway.drain_timeout_seconds = 1;
    config
}

fn problem_row(host: &str, problem: &str, severity: &str, duration: &str) -> Vec<String> {
    [START_TIME, "", severity, "", host, problem, duration, "No"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

#[given("the dashboard accepts the login")]
fn login_accepted(world: &mut WatchWorld) {
    world.login = LoginScript::Accepts;
}

#[given("the dashboard rejects the credentials")]
fn login_rejected(world: &mut WatchWorld) {
    world.login = LoginScript::RejectsCredentials;
}

#[given("the dashboard login page times out")]
fn login_times_out(world: &mut WatchWorld) {
    world.login = LoginScript::TimesOut;
}

#[given("the dashboard hides the logout link after login")]
fn logout_link_hidden(world: &mut WatchWorld) {
    world.login = LoginScript::HidesLogoutLink;
}

#[given(expr = "the problem {string} on {string} has lasted {string}")]
fn problem_listed(world: &mut WatchWorld, problem: String, host: String, duration: String) {
    world
        .rows
        .push(problem_row(&host, &problem, "High", &duration));
}

#[given(expr = "the {string} problem {string} on {string} has lasted {string}")]
fn problem_with_severity(
    world: &mut WatchWorld,
    severity: String,
    problem: String,
    host: String,
    duration: String,
) {
    world
        .rows
        .push(problem_row(&host, &problem, &severity, &duration));
}

#[given(expr = "{int} distinct problems have lasted {string}")]
fn many_problems(world: &mut WatchWorld, count: usize, duration: String) {
    for i in 0..count {
        world
            .rows
            .push(problem_row(&format!("host-{:02}", i), "Unreachable", "High", &duration));
    }
}

#[given(expr = "the problem {string} on {string} was already notified")]
fn already_notified(world: &mut WatchWorld, problem: String, host: String) {
    world
        .cached
        .push(format!("{}|{}|{}", host, problem, START_TIME));
}

#[when("the watcher runs")]
async fn watcher_runs(world: &mut WatchWorld) {
    let launcher = ScriptedLauncher {
        login: world.login,
        rows: world.rows.clone(),
        table_reads: Arc::clone(&world.table_reads),
    };
    let store = MemoryKeyStore {
        initial: world.cached.clone(),
        saved: Arc::clone(&world.saved),
    };
    let notifier = RecordingNotifier {
        sent: Arc::clone(&world.sent),
    };

    let pipeline = Pipeline::new(
        test_config(),
        Arc::new(launcher),
        Arc::new(store),
        Arc::new(notifier),
    );
    world.outcome = Some(pipeline.run_once().await.map_err(|e| match e {
        WatchError::Session(failure) => format!("{:?}", failure.kind),
        other => other.to_string(),
    }));
}

#[then(expr = "{int} alert notice(s) is/are sent to the alert chat")]
fn alert_notices(world: &mut WatchWorld, expected: usize) {
    let sent = world.sent_to(ALERT_CHAT);
    assert_eq!(sent.len(), expected, "alert chat received {:?}", sent);
    assert!(sent.iter().all(|r| u8::from(r.kind) == 2));
}

#[then(expr = "{int} notice(s) is/are sent to the control chat")]
fn control_notices(world: &mut WatchWorld, expected: usize) {
    let sent = world.sent_to(CONTROL_CHAT);
    assert_eq!(sent.len(), expected, "control chat received {:?}", sent);
}

#[then(expr = "the control chat is told {string}")]
fn control_told(world: &mut WatchWorld, fragment: String) {
    let sent = world.sent_to(CONTROL_CHAT);
    assert!(
        sent.iter().any(|r| r.message.contains(&fragment)),
        "no control notice contains {:?}: {:?}",
        fragment,
        sent
    );
}

#[then(expr = "the alert chat is told about {string}")]
fn alert_told(world: &mut WatchWorld, host: String) {
    let sent = world.sent_to(ALERT_CHAT);
    assert!(
        sent.iter().any(|r| r.message.contains(&host)),
        "no alert notice mentions {:?}",
        host
    );
}

#[then(expr = "the cache holds {int} key(s)")]
fn cache_holds(world: &mut WatchWorld, expected: usize) {
    let saved = world
        .saved
        .lock()
        .expect("saved lock")
        .clone()
        .expect("cache was not written");
    assert_eq!(saved.len(), expected);
}

#[then("the cache is not written")]
fn cache_not_written(world: &mut WatchWorld) {
    assert!(world.saved.lock().expect("saved lock").is_none());
}

#[then("the problem table is never read")]
fn table_not_read(world: &mut WatchWorld) {
    assert_eq!(*world.table_reads.lock().expect("reads lock"), 0);
}

#[then(expr = "the run fails with a {word} session failure")]
fn run_fails(world: &mut WatchWorld, kind: String) {
    match world.outcome.as_ref().expect("watcher did not run") {
        Err(actual) => assert_eq!(actual, &kind),
        Ok(report) => panic!("expected {} failure, run succeeded: {:?}", kind, report),
    }
}

#[then("the run succeeds")]
fn run_succeeds(world: &mut WatchWorld) {
    let outcome = world.outcome.as_ref().expect("watcher did not run");
    assert!(outcome.is_ok(), "run failed: {:?}", outcome);
}
