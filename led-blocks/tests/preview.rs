//! Preview runs against a recording panel, on tokio's paused clock.

use std::sync::Arc;

use led_blocks::Document;
use serde_json::json;
use tokio::time::{Duration, sleep};

mod common;

use common::{Recorder, previewer, program};

#[tokio::test(start_paused = true)]
async fn variables_drive_branches() {
    let recorder = Arc::new(Recorder::default());
    let previewer = previewer(&recorder);
    let program = program(json!({
        "type": "start",
        "actions": [{
            "type": "set_variable", "var_name": "x", "value": 1,
            "next": {
                "type": "if",
                "condition": { "type": "compare", "operator": "EQ",
                               "left": { "type": "get_variable", "var_name": "x" }, "right": 1 },
                "true_branch": [{ "type": "display_image", "filename": "a" }],
                "false_branch": [{ "type": "display_image", "filename": "b" }]
            }
        }]
    }));

    previewer.start(program).await.finished().await.unwrap();
    let calls = recorder.calls();
    assert!(calls.contains(&"image a".to_string()));
    assert!(!calls.contains(&"image b".to_string()));
}

#[tokio::test(start_paused = true)]
async fn repeat_runs_its_body_each_time() {
    let recorder = Arc::new(Recorder::default());
    let previewer = previewer(&recorder);
    let program = program(json!({
        "type": "start",
        "actions": [{
            "type": "repeat", "times": 3,
            "loop_body": [{ "type": "display_image", "filename": "tick",
                            "next": { "type": "wait", "time": 100 } }]
        }]
    }));

    let report = previewer.start(program).await.finished().await.unwrap();
    assert_eq!(recorder.count("image tick"), 3);
    assert_eq!(report.executed, 7);
    assert!((300..310).contains(&report.elapsed.as_millis()));
}

#[tokio::test(start_paused = true)]
async fn stop_halts_repeat_within_one_wait() {
    let recorder = Arc::new(Recorder::default());
    let previewer = previewer(&recorder);
    let program = program(json!({
        "type": "start",
        "actions": [{
            "type": "repeat", "times": 100,
            "loop_body": [{ "type": "display_image", "filename": "tick",
                            "next": { "type": "wait", "time": 1000 } }]
        }]
    }));

    let handle = previewer.start(program).await;
    sleep(Duration::from_millis(2500)).await;
    handle.stop();
    let report = handle.finished().await.unwrap();

    assert!(report.cancelled);
    assert_eq!(recorder.count("image tick"), 3);
}

#[tokio::test(start_paused = true)]
async fn forever_runs_until_stopped() {
    let recorder = Arc::new(Recorder::default());
    let previewer = previewer(&recorder);
    let program = program(json!({
        "type": "start",
        "actions": [{
            "type": "forever",
            "loop_body": [{ "type": "set_color", "color": "RANDOM",
                            "next": { "type": "wait", "time": 50 } }]
        }]
    }));

    let handle = previewer.start(program).await;
    sleep(Duration::from_millis(1000)).await;
    assert!(previewer.status().is_running());
    previewer.stop();
    handle.finished().await.unwrap();

    let after_stop = recorder.calls().len();
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(recorder.calls().len(), after_stop);
    assert!(recorder.count("color ") >= 20);
    assert!(!previewer.status().is_running());
}

#[tokio::test(start_paused = true)]
async fn forever_without_waits_still_stops() {
    let recorder = Arc::new(Recorder::default());
    let previewer = previewer(&recorder);
    let program = program(json!({
        "type": "start",
        "actions": [{
            "type": "forever",
            "loop_body": [{ "type": "set_variable", "var_name": "spin", "value": 1 }]
        }]
    }));

    let handle = previewer.start(program).await;
    tokio::task::yield_now().await;
    previewer.stop();
    let report = handle.finished().await.unwrap();
    assert!(report.cancelled);
}

#[tokio::test(start_paused = true)]
async fn random_colors_come_from_the_palette() {
    let recorder = Arc::new(Recorder::default());
    let previewer = previewer(&recorder);
    let program = program(json!({
        "type": "start",
        "actions": [{
            "type": "repeat", "times": 20,
            "loop_body": [{ "type": "set_color", "color": "RANDOM" }],
            "next": { "type": "set_color",
                      "color": { "type": "rgb_color", "red": 1, "green": 2, "blue": 3 } }
        }]
    }));

    previewer.start(program).await.finished().await.unwrap();
    let colors: Vec<_> = recorder
        .calls()
        .into_iter()
        .filter_map(|call| call.strip_prefix("color ").map(str::to_string))
        .collect();
    assert_eq!(colors.first().map(String::as_str), Some("#FFFFFF"));
    assert_eq!(colors.last().map(String::as_str), Some("rgb(1, 2, 3)"));
    for color in &colors[1..colors.len() - 1] {
        assert!(led_blocks::interpreter::RANDOM_PALETTE.contains(&color.as_str()), "{color}");
    }
}

#[tokio::test(start_paused = true)]
async fn gpio_state_outlives_runs() {
    let recorder = Arc::new(Recorder::default());
    let previewer = previewer(&recorder);
    let set_pin = program(json!({
        "type": "start",
        "actions": [{ "type": "gpio", "pin": 12, "state": "HIGH" }]
    }));
    previewer.start(set_pin).await.finished().await.unwrap();
    assert!(previewer.gpio().read(12));

    let read_pin = program(json!({
        "type": "start",
        "actions": [{ "type": "if_gpio", "pin": 12, "state": "HIGH",
                      "true_branch": [{ "type": "display_image", "filename": "on" }],
                      "false_branch": [{ "type": "display_image", "filename": "off" }] }]
    }));
    previewer.start(read_pin).await.finished().await.unwrap();
    assert_eq!(recorder.count("image on"), 1);
    assert_eq!(recorder.count("image off"), 0);
}

#[tokio::test(start_paused = true)]
async fn no_program_document_is_not_run() {
    let recorder = Arc::new(Recorder::default());
    let previewer = previewer(&recorder);
    let document = Document::parse(r#"{ "error": "No start block found" }"#).unwrap();
    assert!(previewer.start_document(document).await.is_none());
    assert!(recorder.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn animation_frames_follow_the_duration() {
    let recorder = Arc::new(Recorder::with_frames(5));
    let previewer = previewer(&recorder);
    let program = program(json!({
        "type": "start",
        "actions": [{ "type": "play_animation", "folder": "fire", "play_for": 1000 }]
    }));

    let report = previewer.start(program).await.finished().await.unwrap();
    assert_eq!(recorder.count("frame fire"), 5);
    assert!((1000..1100).contains(&report.elapsed.as_millis()));
}

#[tokio::test(start_paused = true)]
async fn while_rechecks_its_condition() {
    let recorder = Arc::new(Recorder::default());
    let previewer = previewer(&recorder);
    let x = json!({ "type": "get_variable", "var_name": "x" });
    let program = program(json!({
        "type": "start",
        "actions": [{
            "type": "set_variable", "var_name": "x", "value": 0,
            "next": {
                "type": "while",
                "condition": { "type": "compare", "operator": "LT", "left": x, "right": 2 },
                "loop_body": [{
                    "type": "display_image", "filename": "w",
                    "next": {
                        "type": "if",
                        "condition": { "type": "compare", "operator": "EQ", "left": x, "right": 1 },
                        "true_branch": [{ "type": "set_variable", "var_name": "x", "value": 2 }],
                        "next": {
                            "type": "if",
                            "condition": { "type": "compare", "operator": "EQ", "left": x, "right": 0 },
                            "true_branch": [{ "type": "set_variable", "var_name": "x", "value": 1 }]
                        }
                    }
                }],
                "next": { "type": "display_image", "filename": "done" }
            }
        }]
    }));

    let report = previewer.start(program).await.finished().await.unwrap();
    assert!(!report.cancelled);
    assert_eq!(recorder.count("image w"), 2);
    assert_eq!(recorder.calls().last().map(String::as_str), Some("image done"));
}

#[tokio::test(start_paused = true)]
async fn break_does_not_leave_the_loop() {
    let recorder = Arc::new(Recorder::default());
    let previewer = previewer(&recorder);
    let program = program(json!({
        "type": "start",
        "actions": [{
            "type": "repeat", "times": 3,
            "loop_body": [{
                "type": "display_image", "filename": "b",
                "next": {
                    "type": "break",
                    "next": { "type": "display_image", "filename": "after break" }
                }
            }],
            "next": { "type": "display_image", "filename": "end" }
        }]
    }));

    previewer.start(program).await.finished().await.unwrap();
    assert_eq!(recorder.count("image b"), 3);
    assert_eq!(recorder.count("image after break"), 3);
    assert_eq!(recorder.count("image end"), 1);
}

#[tokio::test(start_paused = true)]
async fn gpio_triggers_are_skipped() {
    let recorder = Arc::new(Recorder::default());
    let previewer = previewer(&recorder);
    let program = program(json!({
        "type": "start",
        "actions": [{
            "type": "gpio_trigger", "pin": 4, "trigger": "RISING",
            "actions": [{ "type": "display_image", "filename": "trigger" }],
            "next": { "type": "display_image", "filename": "after" }
        }]
    }));

    previewer.start(program).await.finished().await.unwrap();
    assert_eq!(recorder.count("image trigger"), 0);
    assert_eq!(recorder.count("gpio "), 0);
    assert_eq!(recorder.count("image after"), 1);
}

#[tokio::test(start_paused = true)]
async fn value_blocks_in_a_chain_fall_through() {
    let recorder = Arc::new(Recorder::default());
    let previewer = previewer(&recorder);
    let program = program(json!({
        "type": "start",
        "actions": [{
            "type": "number", "value": 5,
            "next": { "type": "display_image", "filename": "fell" }
        }]
    }));

    let report = previewer.start(program).await.finished().await.unwrap();
    assert_eq!(recorder.count("image fell"), 1);
    assert!(!report.cancelled);
}

#[tokio::test(start_paused = true)]
async fn numeric_colors_reach_the_panel_as_text() {
    let recorder = Arc::new(Recorder::default());
    let previewer = previewer(&recorder);
    let program = program(json!({
        "type": "start",
        "actions": [{
            "type": "set_variable", "var_name": "c", "value": 5,
            "next": { "type": "set_color", "color": { "type": "get_variable", "var_name": "c" } }
        }]
    }));

    previewer.start(program).await.finished().await.unwrap();
    assert_eq!(recorder.count("color 5"), 1);
}
