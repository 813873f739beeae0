use super::runtime_test_support::*;
use crate::events::EventKind;
use crate::host::{EntityWorld, OutputFired};
use crate::sandbox::SandboxWorld;

#[test]
fn timed_event_fires_after_delay_and_rearms() {
    let mut engine = engine();
    let mut world = world();
    load(
        &mut engine,
        &mut world,
        r#"maphack
{
    "vars" { "ticks" { "type" "int" "value" "0" } }
    "events" { "clock" { "type" "EVENT_TIMED" "delay" "2" } }
    "clock" { "$increment" { "var" "ticks" } }
}"#,
    );

    world.set_time(1.0);
    engine.think(&mut world);
    assert_eq!(engine.variables().get("ticks").expect("ticks").text(), "0");

    world.set_time(2.0);
    engine.think(&mut world);
    assert_eq!(engine.variables().get("ticks").expect("ticks").text(), "1");
    let next = engine
        .events()
        .get("clock")
        .and_then(|event| event.timed())
        .map(|state| state.next_fire_time)
        .expect("timed state");
    assert_eq!(next, 4.0);

    world.set_time(3.0);
    engine.think(&mut world);
    world.set_time(4.0);
    engine.think(&mut world);
    assert_eq!(engine.variables().get("ticks").expect("ticks").text(), "2");
}

#[test]
fn stop_suppresses_and_start_rearms() {
    let mut engine = engine();
    let mut world = world();
    load(
        &mut engine,
        &mut world,
        r#"maphack
{
    "vars" { "ticks" { "type" "int" } }
    "events" { "clock" { "type" "event_timed" "delay" "1" } }
    "clock" { "$increment" { "var" "ticks" } }
    "halt" { "$stop" { "event" "clock" } }
    "resume" { "$start" { "event" "clock" "delay" "5" } }
}"#,
    );

    assert!(engine.trigger_event_by_name(&mut world, "halt", 0.0));
    world.set_time(3.0);
    engine.think(&mut world);
    assert_eq!(engine.variables().get("ticks").expect("ticks").text(), "0");

    assert!(engine.trigger_event_by_name(&mut world, "resume", 0.0));
    world.set_time(7.0);
    engine.think(&mut world);
    assert_eq!(engine.variables().get("ticks").expect("ticks").text(), "0");
    world.set_time(8.0);
    engine.think(&mut world);
    assert_eq!(engine.variables().get("ticks").expect("ticks").text(), "1");
}

#[test]
fn non_repeating_timer_fires_once_and_startdisabled_waits() {
    let mut engine = engine();
    let mut world = world();
    load(
        &mut engine,
        &mut world,
        r#"maphack
{
    "vars" { "once" { "type" "int" } "later" { "type" "int" } }
    "events"
    {
        "single" { "type" "EVENT_TIMED" "delay" "1" "repeat" "0" }
        "dormant" { "type" "EVENT_TIMED" "delay" "1" "startdisabled" "1" }
    }
    "single" { "$increment" { "var" "once" } }
    "dormant" { "$increment" { "var" "later" } }
}"#,
    );

    for time in [1.0, 2.0, 3.0] {
        world.set_time(time);
        engine.think(&mut world);
    }
    assert_eq!(engine.variables().get("once").expect("once").text(), "1");
    assert_eq!(engine.variables().get("later").expect("later").text(), "0");
}

#[test]
fn delayed_trigger_waits_for_queue() {
    let mut engine = engine();
    let mut world = world();
    load(
        &mut engine,
        &mut world,
        r#"maphack
{
    "vars" { "hits" { "type" "int" } }
    "ping" { "$increment" { "var" "hits" } }
    "entities" { "$trigger" { "event" "ping" "delay" "1.5" } }
}"#,
    );

    assert_eq!(engine.events().queued().len(), 1);
    world.set_time(1.0);
    engine.think(&mut world);
    assert_eq!(engine.variables().get("hits").expect("hits").text(), "0");
    world.set_time(1.5);
    engine.think(&mut world);
    assert_eq!(engine.variables().get("hits").expect("hits").text(), "1");
    assert!(engine.events().queued().is_empty());
}

#[test]
fn implicit_events_and_labels() {
    let mut engine = engine();
    let mut world = world();
    load(
        &mut engine,
        &mut world,
        r#"maphack
{
    "spawn_crates" { "prop_physics" { "targetname" "extra" } }
    "precache:sounds" { "sound" "ambient/wind.wav" }
}"#,
    );

    let sounds = engine.events().get("sounds").expect("label event");
    assert!(matches!(sounds.kind, EventKind::Trigger));
    assert_eq!(sounds.data_kind, crate::events::EventDataKind::Precache);

    assert!(engine.trigger_event_by_name(&mut world, "SPAWN_CRATES", 0.0));
    assert!(world.find_by_target_name("extra").is_some());
    assert!(engine.trigger_event_by_name(&mut world, "sounds", 0.0));
    assert!(world
        .precached
        .iter()
        .any(|(_, name)| name == "ambient/wind.wav"));
    assert!(!engine.trigger_event_by_name(&mut world, "nothing", 0.0));
    assert!(engine.diagnostics().iter().any(|entry| entry.code == "MH_EVENT_MISSING"));
}

#[test]
fn reserved_and_unknown_event_declarations_are_reported() {
    let mut engine = engine();
    let mut world = world();
    load(
        &mut engine,
        &mut world,
        r#"maphack
{
    "events"
    {
        "vars" { "type" "EVENT_TRIGGER" }
        "odd" { "type" "EVENT_SOMETHING" }
    }
}"#,
    );

    let codes: Vec<&str> = engine.diagnostics().iter().map(|entry| entry.code.as_str()).collect();
    assert!(codes.contains(&"MH_EVENT_KEYWORD"));
    assert!(codes.contains(&"MH_EVENT_TYPE_UNKNOWN"));
    assert!(matches!(
        engine.events().get("odd").expect("odd").kind,
        EventKind::Invalid
    ));
}

#[test]
fn output_event_triggers_with_delay() {
    let mut engine = engine();
    let mut world = world();
    load(
        &mut engine,
        &mut world,
        r#"maphack
{
    "vars" { "opened" { "type" "int" } }
    "events" { "pressed" { "type" "EVENT_OUTPUT" "targetname" "crate" "output" "OnTrigger" } }
    "pressed" { "$increment" { "var" "opened" } }
}"#,
    );

    let crate_entity = world.find_by_target_name("crate").expect("crate").handle;
    assert!(engine.output_watches().contains(crate_entity));

    let lamp = world.find_by_target_name("lamp").expect("lamp").handle;
    engine.on_entity_output_fired(
        &mut world,
        &OutputFired {
            caller: lamp,
            output: "OnTrigger".to_string(),
            value: None,
            activator: None,
            delay: 0.0,
        },
    );
    assert_eq!(engine.variables().get("opened").expect("opened").text(), "0");

    engine.on_entity_output_fired(
        &mut world,
        &OutputFired {
            caller: crate_entity,
            output: "ontrigger".to_string(),
            value: None,
            activator: None,
            delay: 0.0,
        },
    );
    assert_eq!(engine.variables().get("opened").expect("opened").text(), "1");

    engine.on_entity_output_fired(
        &mut world,
        &OutputFired {
            caller: crate_entity,
            output: "OnTrigger".to_string(),
            value: None,
            activator: None,
            delay: 2.0,
        },
    );
    assert_eq!(engine.events().queued().len(), 1);
}

#[test]
fn output_event_rebinds_to_spawned_entity() {
    let mut engine = engine();
    let mut world = SandboxWorld::new("test_map");
    load(
        &mut engine,
        &mut world,
        r#"maphack
{
    "events" { "used" { "type" "EVENT_OUTPUT" "targetname" "button" "output" "OnUser1" } }
    "used" { "$console" { "msg" "used" } }
    "entities" { "func_button" { "targetname" "button" } }
}"#,
    );

    let button = world.find_by_target_name("button").expect("button").handle;
    assert!(engine.output_watches().contains(button));
    engine.on_entity_output_fired(
        &mut world,
        &OutputFired {
            caller: button,
            output: "OnUser1".to_string(),
            value: None,
            activator: None,
            delay: 0.0,
        },
    );
    assert_eq!(world.messages(), vec!["used\n"]);
    assert!(world.is_alive(button));
}

#[test]
fn game_event_subscribes_and_fires() {
    let mut engine = engine();
    let mut world = world();
    load(
        &mut engine,
        &mut world,
        r#"maphack
{
    "events" { "round" { "type" "EVENT_GAMEEVENT" "eventname" "round_start" } }
    "round" { "$console" { "msg" "round begins" } }
}"#,
    );

    assert!(world.listening.contains("round_start"));
    engine.on_game_event(&mut world, "player_death");
    assert!(world.messages().is_empty());
    engine.on_game_event(&mut world, "ROUND_START");
    assert_eq!(world.messages(), vec!["round begins\n"]);
}

#[test]
fn repeating_warning_keeps_diagnostics_bounded() {
    let mut engine = engine();
    let mut world = world();
    load(
        &mut engine,
        &mut world,
        r#"maphack
{
    "events" { "nag" { "type" "EVENT_TIMED" "delay" "1" } }
    "nag" { "$if" { "cond" "no operator here" "entities" { } } }
}"#,
    );

    for second in 1..=2000 {
        world.set_time(second as f32);
        engine.think(&mut world);
    }
    assert_eq!(engine.diagnostics().len(), crate::MAX_DIAGNOSTICS);
    assert_eq!(engine.dropped_diagnostics(), 2000 - crate::MAX_DIAGNOSTICS);
    assert!(engine
        .diagnostics()
        .iter()
        .all(|entry| entry.code == "MH_COND_NO_OPERATOR"));
}

#[test]
fn rebinding_after_respawn_drops_the_old_watch() {
    let mut engine = engine();
    let mut world = world();
    load(
        &mut engine,
        &mut world,
        r#"maphack
{
    "events" { "lit" { "type" "EVENT_OUTPUT" "targetname" "lamp" "output" "OnUser1" } }
    "lit" { "$console" { "msg" "lit" } }
    "cycle" { "$respawn" { "targetname" "lamp" } }
}"#,
    );

    let original = world.find_by_target_name("lamp").expect("lamp").handle;
    assert!(engine.output_watches().contains(original));

    for _ in 0..5 {
        assert!(engine.trigger_event_by_name(&mut world, "cycle", 0.0));
    }
    let lamp = world.find_by_target_name("lamp").expect("respawned lamp").handle;
    assert_ne!(lamp, original);
    assert!(!engine.output_watches().contains(original));
    assert!(engine.output_watches().contains(lamp));
    assert_eq!(engine.output_watches().len(), 1);

    engine.on_entity_output_fired(
        &mut world,
        &OutputFired {
            caller: lamp,
            output: "OnUser1".to_string(),
            value: None,
            activator: None,
            delay: 0.0,
        },
    );
    assert_eq!(world.messages(), vec!["lit\n"]);
}
