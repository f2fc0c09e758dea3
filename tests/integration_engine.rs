//! End-to-end tests: load a YAML workflow, run it against scripted
//! frames, and observe the dispatched actions.

use std::sync::Arc;

use image::RgbImage;
use tempfile::TempDir;

use tapdance::backend::mock::{as_frame, paste, pattern, FrameCapture, RecordingActions};
use tapdance::domain::StopFlag;
use tapdance::vision::TemplateMatcher;
use tapdance::workflow::{RunOutcome, WorkflowEngine, WorkflowLoader};

const THRESHOLD_LINE: &str = "threshold: 0.9";

fn save_template(dir: &TempDir, name: &str, seed: u64) {
    as_frame(&pattern(seed, 16, 16)).save(dir.path().join(name)).unwrap();
}

/// A frame showing the template patches for the given seeds, spaced apart.
fn frame_showing(seeds: &[u64]) -> RgbImage {
    let mut canvas = pattern(99, 240, 100);
    for (slot, seed) in seeds.iter().enumerate() {
        paste(&mut canvas, &pattern(*seed, 16, 16), 20 + slot as u32 * 50, 30);
    }
    as_frame(&canvas)
}

fn load(dir: &TempDir, yaml: &str) -> Vec<tapdance::domain::WorkflowItem> {
    let path = dir.path().join("plan.yaml");
    std::fs::write(&path, yaml).unwrap();
    WorkflowLoader::new().load(&path).unwrap()
}

fn engine_for(
    items: Vec<tapdance::domain::WorkflowItem>,
    templates: &TempDir,
    frames: Vec<RgbImage>,
    actions: Arc<RecordingActions>,
) -> WorkflowEngine {
    WorkflowEngine::new(
        items,
        Arc::new(FrameCapture::scripted(frames)),
        Arc::new(TemplateMatcher::new(templates.path())),
        actions,
    )
}

#[tokio::test]
async fn test_yaml_workflow_end_to_end() {
    let dir = TempDir::new().unwrap();
    save_template(&dir, "menu.png", 1);
    save_template(&dir, "play.png", 2);

    let yaml = format!(
        "name: Launch game\n\
         steps:\n\
         \x20 - name: Open menu\n\
         \x20   find: menu.png\n\
         \x20   {THRESHOLD_LINE}\n\
         \x20   end_delay: 0\n\
         \x20 - name: Press play\n\
         \x20   find: play.png\n\
         \x20   {THRESHOLD_LINE}\n\
         \x20   end_delay: 0\n\
         \x20   offset: [0, 10]\n"
    );
    let items = load(&dir, &yaml);
    let actions = Arc::new(RecordingActions::new());
    let engine = engine_for(
        items,
        &dir,
        vec![frame_showing(&[1]), frame_showing(&[2])],
        actions.clone(),
    );

    let outcome = engine.run(StopFlag::new()).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);

    let calls = actions.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, "click");
    // Template pasted at (20, 30), so the 16x16 match centers at (28, 38).
    assert_eq!(calls[0].1, tapdance::domain::Position::new(28, 38));
    assert_eq!(calls[1].2, tapdance::domain::Position::new(0, 10));
}

#[tokio::test]
async fn test_loop_runs_body_per_iteration() {
    let dir = TempDir::new().unwrap();
    save_template(&dir, "collect.png", 1);

    let yaml = format!(
        "steps:\n\
         \x20 - loop: 3\n\
         \x20   steps:\n\
         \x20     - name: Collect reward\n\
         \x20       find: collect.png\n\
         \x20       {THRESHOLD_LINE}\n\
         \x20       end_delay: 0\n\
         \x20       retry_delay: 0\n"
    );
    let items = load(&dir, &yaml);
    let actions = Arc::new(RecordingActions::new());
    let engine = engine_for(items, &dir, vec![frame_showing(&[1])], actions.clone());

    assert_eq!(engine.run(StopFlag::new()).await.unwrap(), RunOutcome::Completed);
    assert_eq!(actions.calls().len(), 3);
}

#[tokio::test]
async fn test_break_on_find_ends_infinite_loop() {
    let dir = TempDir::new().unwrap();
    save_template(&dir, "grind.png", 1);
    save_template(&dir, "victory.png", 2);

    let yaml = format!(
        "steps:\n\
         \x20 - loop: infinite\n\
         \x20   break_on_find: victory.png\n\
         \x20   break_threshold: 0.9\n\
         \x20   steps:\n\
         \x20     - name: Grind\n\
         \x20       find: grind.png\n\
         \x20       {THRESHOLD_LINE}\n\
         \x20       end_delay: 0\n\
         \x20       retry_delay: 0\n"
    );
    let items = load(&dir, &yaml);
    let actions = Arc::new(RecordingActions::new());
    // Each wrap costs one step capture plus two break checks (before and
    // after the iteration delay). The victory screen appears on the
    // third pass's first break check.
    let frames = vec![
        frame_showing(&[1]), // pass 1: step hit
        frame_showing(&[1]), // pass 1: break check misses
        frame_showing(&[1]), // pass 1: post-delay break check misses
        frame_showing(&[1]), // pass 2: step hit
        frame_showing(&[1]), // pass 2: break check misses
        frame_showing(&[1]), // pass 2: post-delay break check misses
        frame_showing(&[1]), // pass 3: step hit
        frame_showing(&[2]), // pass 3: break check sees victory
    ];
    let engine = engine_for(items, &dir, frames, actions.clone());

    assert_eq!(engine.run(StopFlag::new()).await.unwrap(), RunOutcome::Completed);
    assert_eq!(actions.calls().len(), 3);
}

#[tokio::test]
async fn test_self_healing_resumes_from_recognized_screen() {
    let dir = TempDir::new().unwrap();
    save_template(&dir, "home.png", 1);
    save_template(&dir, "shop.png", 2);

    let yaml = format!(
        "steps:\n\
         \x20 - name: Go home\n\
         \x20   find: home.png\n\
         \x20   {THRESHOLD_LINE}\n\
         \x20   end_delay: 0\n\
         \x20   retries: 2\n\
         \x20   retry_delay: 0\n\
         \x20 - name: Open shop\n\
         \x20   find: shop.png\n\
         \x20   {THRESHOLD_LINE}\n\
         \x20   end_delay: 0\n\
         \x20   retries: 2\n\
         \x20   retry_delay: 0\n"
    );
    let items = load(&dir, &yaml);
    let actions = Arc::new(RecordingActions::new());
    // "shop" never appears, but "home" stays visible: recovery keeps
    // resuming at step 0 until the budget runs out.
    let engine = engine_for(items, &dir, vec![frame_showing(&[1])], actions.clone())
        .with_max_recovery_attempts(2);

    let outcome = engine.run(StopFlag::new()).await.unwrap();
    assert_eq!(outcome, RunOutcome::RecoveryExhausted { last_index: 1 });

    // Step 0 dispatched once per recovery pass on top of the initial run.
    let home_clicks = actions.calls().len();
    assert_eq!(home_clicks, 3);
}

#[tokio::test]
async fn test_recovery_fails_on_unknown_screen() {
    let dir = TempDir::new().unwrap();
    save_template(&dir, "home.png", 1);

    let yaml = format!(
        "steps:\n\
         \x20 - name: Go home\n\
         \x20   find: home.png\n\
         \x20   {THRESHOLD_LINE}\n\
         \x20   retries: 2\n\
         \x20   retry_delay: 0\n"
    );
    let items = load(&dir, &yaml);
    let actions = Arc::new(RecordingActions::new());
    // Nothing recognizable on screen at all.
    let engine = engine_for(items, &dir, vec![frame_showing(&[])], actions.clone());

    let outcome = engine.run(StopFlag::new()).await.unwrap();
    assert_eq!(outcome, RunOutcome::RecoveryExhausted { last_index: 0 });
    assert!(actions.calls().is_empty());
}

#[tokio::test]
async fn test_include_workflow_runs_spliced_steps() {
    let dir = TempDir::new().unwrap();
    save_template(&dir, "login.png", 1);
    save_template(&dir, "play.png", 2);

    std::fs::write(
        dir.path().join("common.yaml"),
        format!(
            "steps:\n\
             \x20 - name: Log in\n\
             \x20   find: login.png\n\
             \x20   {THRESHOLD_LINE}\n\
             \x20   end_delay: 0\n"
        ),
    )
    .unwrap();
    let yaml = format!(
        "steps:\n\
         \x20 - include: common.yaml\n\
         \x20 - name: Play\n\
         \x20   find: play.png\n\
         \x20   {THRESHOLD_LINE}\n\
         \x20   end_delay: 0\n"
    );
    let items = load(&dir, &yaml);
    let actions = Arc::new(RecordingActions::new());
    let engine = engine_for(
        items,
        &dir,
        vec![frame_showing(&[1]), frame_showing(&[2])],
        actions.clone(),
    );

    assert_eq!(engine.run(StopFlag::new()).await.unwrap(), RunOutcome::Completed);
    assert_eq!(actions.calls().len(), 2);
}

#[tokio::test]
async fn test_unknown_action_aborts_run() {
    let dir = TempDir::new().unwrap();
    save_template(&dir, "home.png", 1);

    let yaml = format!(
        "steps:\n\
         \x20 - name: Warp home\n\
         \x20   find: home.png\n\
         \x20   action: warp\n\
         \x20   {THRESHOLD_LINE}\n"
    );
    let items = load(&dir, &yaml);
    // Backend only knows "click"; a typoed action name is a plan bug and
    // must not be retried or recovered around.
    let actions = Arc::new(RecordingActions::with_allowed(&["click"]));
    let engine = engine_for(items, &dir, vec![frame_showing(&[1])], actions);

    let err = engine.run(StopFlag::new()).await.unwrap_err();
    assert!(matches!(err, tapdance::TapdanceError::UnknownAction(name) if name == "warp"));
}

#[tokio::test]
async fn test_nested_loop_iteration_counts_persist_within_run() {
    let dir = TempDir::new().unwrap();
    save_template(&dir, "tap.png", 1);
    save_template(&dir, "next.png", 2);

    let yaml = format!(
        "steps:\n\
         \x20 - loop: 2\n\
         \x20   steps:\n\
         \x20     - loop: 3\n\
         \x20       steps:\n\
         \x20         - name: Tap\n\
         \x20           find: tap.png\n\
         \x20           {THRESHOLD_LINE}\n\
         \x20           end_delay: 0\n\
         \x20           retry_delay: 0\n\
         \x20     - name: Next\n\
         \x20       find: next.png\n\
         \x20       {THRESHOLD_LINE}\n\
         \x20       end_delay: 0\n\
         \x20       retry_delay: 0\n"
    );
    let items = load(&dir, &yaml);
    let actions = Arc::new(RecordingActions::new());
    // Both templates stay visible: tap centers at (28, 38), next at (78, 38).
    let engine = engine_for(items, &dir, vec![frame_showing(&[1, 2])], actions.clone());

    assert_eq!(engine.run(StopFlag::new()).await.unwrap(), RunOutcome::Completed);

    // Inner loop counts are not reset when the outer loop wraps: the inner
    // body runs 3 times on the first outer pass but only once (already
    // exhausted) on the second. Outer pass 2 still executes the inner
    // leaf it lands on before consulting the loop state.
    let calls = actions.calls();
    let taps = calls.iter().filter(|(_, p, _)| p.x == 28).count();
    let nexts = calls.iter().filter(|(_, p, _)| p.x == 78).count();
    assert_eq!(taps, 4);
    assert_eq!(nexts, 2);
}
