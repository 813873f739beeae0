use super::runtime_test_support::*;
use super::MapHackEngine;
use crate::entdata::{parse_lump, EntityRecord};
use crate::host::{EntityWorld, FieldValue};
use crate::sandbox::SandboxWorld;

const SCRIPT_PATH: &str = "maps/maphacks/test_map.txt";

/// Runs `script` as the level's pre-entity pass over the test lump.
fn patch(script: &str) -> (MapHackEngine, SandboxWorld, Vec<EntityRecord>) {
    let mut engine = engine_with_files(&[(SCRIPT_PATH, script)]);
    let mut world = SandboxWorld::new("test_map");
    let lump = engine
        .level_init(&mut world, TEST_LUMP)
        .expect("pre_entities should patch the lump");
    (engine, world, parse_lump(&lump))
}

fn by_name<'a>(records: &'a [EntityRecord], name: &str) -> Option<&'a EntityRecord> {
    records.iter().find(|record| record.target_name() == Some(name))
}

#[test]
fn edit_changes_staged_records_by_name_and_id() {
    let (engine, _, records) = patch(
        r#"maphack
{
    "pre_entities"
    {
        "$edit" { "targetname" "crate" "keyvalues" { "skin" "2" } }
        "$edit" { "id" "11" "keyvalues" { "_light" "0 0 255 100" } }
        "$edit" { "targetname" "ghost" "keyvalues" { "skin" "1" } }
    }
}"#,
    );

    assert_eq!(by_name(&records, "crate").and_then(|r| r.get_key_value("skin")), Some("2"));
    assert_eq!(
        by_name(&records, "lamp").and_then(|r| r.get_key_value("_light")),
        Some("0 0 255 100")
    );
    assert!(engine
        .diagnostics()
        .iter()
        .any(|entry| entry.code == "MH_RECORD_NOT_FOUND"));
}

#[test]
fn edit_all_and_filter_work_on_classes() {
    let (_, _, records) = patch(
        r#"maphack
{
    "pre_entities"
    {
        "$edit_all" { "classname" "light" "keyvalues" { "style" "5" } }
        "$filter" { "targetname" "lamp2" }
    }
}"#,
    );

    assert_eq!(by_name(&records, "lamp").and_then(|r| r.get_key_value("style")), Some("5"));
    assert!(by_name(&records, "lamp2").is_none());
    assert_eq!(records.len(), 3);
}

#[test]
fn modify_applies_replace_delete_insert_in_order() {
    let (_, _, records) = patch(
        r#"maphack
{
    "vars" { "mdl" { "type" "string" "value" "models/barrel.mdl" } }
    "pre_entities"
    {
        "$modify"
        {
            "match" { "classname" "prop_physics" "model" "models/crate.mdl" }
            "replace" { "model" "%mdl" }
            "delete" { "origin" "0 0 0" }
            "insert" { "OnBreak" "lamp,TurnOff,,0,-1" }
        }
    }
}"#,
    );

    let crate_record = by_name(&records, "crate").expect("crate record");
    assert_eq!(crate_record.get_key_value("model"), Some("models/barrel.mdl"));
    assert_eq!(crate_record.get_key_value("origin"), None);
    assert_eq!(crate_record.get_key_value("OnBreak"), Some("lamp,TurnOff,,0,-1"));
}

#[test]
fn staged_entities_and_removals_shape_the_lump() {
    let (_, world, records) = patch(
        r#"maphack
{
    "pre_entities"
    {
        "$remove" { "id" "10" }
        "$remove_all" { "targetname" "lamp2" }
        "info_player_start" { "origin" "1 2 3" }
        "$fire" { "targetname" "lamp" "input" "TurnOff" }
    }
}"#,
    );

    let classes: Vec<&str> = records.iter().filter_map(EntityRecord::class_name).collect();
    assert_eq!(classes, vec!["worldspawn", "light", "info_player_start"]);
    assert!(world.inputs.is_empty());
}

#[test]
fn level_init_without_pre_entities_leaves_lump_alone() {
    let mut engine = engine_with_files(&[(SCRIPT_PATH, r#"maphack { "entities" { } }"#)]);
    let mut world = SandboxWorld::new("test_map");
    assert_eq!(engine.level_init(&mut world, TEST_LUMP), None);
    assert!(engine.has_document());
}

#[test]
fn live_edit_and_modify_change_entities() {
    let mut engine = engine();
    let mut world = world();
    load(
        &mut engine,
        &mut world,
        r#"maphack
{
    "entities"
    {
        "$edit" { "targetname" "crate" "keyvalues" { "skin" "3" "model" "models/crate2.mdl" } }
        "$edit_all" { "classname" "light" "keyvalues" { "style" "1" } }
        "$modify"
        {
            "match" { "targetname" "lamp" }
            "delete" { "_light" "255 255 255 200" }
            "insert" { "spawnflags" "1" }
        }
    }
}"#,
    );

    let crate_entity = world.find_by_target_name("crate").expect("crate");
    assert_eq!(crate_entity.key_value("skin"), Some("3"));
    assert_eq!(crate_entity.model.as_deref(), Some("models/crate2.mdl"));
    let lamp = world.find_by_target_name("lamp").expect("lamp");
    assert_eq!(lamp.key_value("_light"), Some(""));
    assert_eq!(lamp.key_value("spawnflags"), Some("1"));
    assert_eq!(lamp.key_value("style"), Some("1"));
}

#[test]
fn live_filter_skips_protected_entities() {
    let mut engine = engine();
    let mut world = world();
    load(
        &mut engine,
        &mut world,
        r#"maphack
{
    "entities"
    {
        "$filter" { "classname" "light" }
        "$filter" { "classname" "worldspawn" }
    }
}"#,
    );

    assert_eq!(world.count_class("light"), 0);
    assert!(world.world_entity().is_some());
}

#[test]
fn edit_field_writes_typed_values() {
    let mut engine = engine();
    let mut world = world();
    load(
        &mut engine,
        &mut world,
        r#"maphack
{
    "entities"
    {
        "$edit_field" { "targetname" "crate" "fieldname" "m_iHealth" "value" "75" }
        "$edit_field" { "targetname" "crate" "fieldname" "m_vecMins" "value" "-1 -2 -3" }
        "$edit_field" { "targetname" "crate" "fieldname" "m_hOwnerEntity" "value" "1" }
        "$edit_field" { "targetname" "crate" "fieldname" "m_nothing" "value" "1" }
    }
}"#,
    );

    let crate_entity = world.find_by_target_name("crate").expect("crate");
    assert_eq!(crate_entity.fields.get("m_ihealth"), Some(&FieldValue::Integer(75)));
    assert_eq!(
        crate_entity.fields.get("m_vecmins"),
        Some(&FieldValue::Vector([-1.0, -2.0, -3.0]))
    );
    let codes: Vec<&str> = engine.diagnostics().iter().map(|entry| entry.code.as_str()).collect();
    assert!(codes.contains(&"MH_FIELD_UNSUPPORTED"));
    assert!(codes.contains(&"MH_FIELD_NOT_FOUND"));
}

#[test]
fn remove_connections_clears_every_output() {
    let mut engine = engine();
    let mut world = world();
    let crate_handle = world.find_by_target_name("crate").expect("crate").handle;
    world.apply_key_value(crate_handle, "OnTrigger", "lamp,TurnOn,,0,-1");
    world.apply_key_value(crate_handle, "OnUser1", "lamp,TurnOff,,0,-1");
    load(
        &mut engine,
        &mut world,
        r#"maphack { "entities" { "$remove_connections" { "targetname" "crate" } } }"#,
    );

    let crate_entity = world.find_by_target_name("crate").expect("crate");
    assert!(crate_entity.outputs.is_empty());
}
