use std::collections::BTreeMap;
use std::sync::Arc;

use mh_core::{MapHackError, Vec3};
use mh_runtime::sandbox::{ConsoleLine, SandboxWorld};
use mh_runtime::{
    GameHost, MapHackConfig, MapHackEngine, MapHackEngineOptions, OutputFired, ScriptSource,
};
use serde::{Deserialize, Serialize};
use tracing::info;

mod check;
mod file_source;

pub use check::{check_script, ScriptCheck};
pub use file_source::FileScriptSource;

#[derive(Clone)]
pub struct LevelLoadOptions {
    pub map_name: String,
    /// The level's raw entity stream as compiled into the map.
    pub entity_lump: String,
    pub config: MapHackConfig,
    pub script_source: Option<Arc<dyn ScriptSource>>,
    /// Sound names the simulated level knows about.
    pub sounds: Vec<String>,
    pub random_seed: Option<u64>,
}

/// A simulated level: the interpreter plus the sandbox world it drives.
pub struct LevelSession {
    pub engine: MapHackEngine,
    pub world: SandboxWorld,
    pub patched_lump: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReport {
    pub handle: u32,
    pub class_name: String,
    pub target_name: Option<String>,
    pub origin: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventReport {
    pub name: String,
    pub kind: String,
    pub triggered: bool,
    pub stopped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelReport {
    pub map_name: String,
    pub identifier: String,
    pub time: f32,
    pub patched: bool,
    pub entities: Vec<EntityReport>,
    pub variables: BTreeMap<String, String>,
    pub events: Vec<EventReport>,
    pub messages: Vec<String>,
    pub warnings: Vec<String>,
    pub commands: Vec<String>,
    pub diagnostics: Vec<MapHackError>,
    pub dropped_diagnostics: usize,
}

/// Runs the level-load cycle: pre-entity pass over `entity_lump`, spawn of
/// the (possibly patched) stream, then the post-entity pass.
pub fn run_level_load(options: LevelLoadOptions) -> Result<LevelSession, MapHackError> {
    let LevelLoadOptions {
        map_name,
        entity_lump,
        config,
        script_source,
        sounds,
        random_seed,
    } = options;

    if config.enabled {
        let path = config.script_path(&map_name);
        let exists = script_source
            .as_ref()
            .is_some_and(|source| source.exists(&path));
        if !exists {
            return Err(MapHackError::new(
                "API_SCRIPT_NOT_FOUND",
                format!("No maphack script at \"{}\".", path),
            ));
        }
    }

    let mut engine = MapHackEngine::new(MapHackEngineOptions {
        config: config.clone(),
        script_source,
        random_seed,
    });
    let mut world = SandboxWorld::new(&map_name);
    for sound in &sounds {
        world.add_sound(sound);
    }

    let patched_lump = engine.level_init(&mut world, &entity_lump);
    if config.enabled && !engine.has_document() {
        let detail = engine
            .diagnostics()
            .last()
            .map(|error| error.message.clone())
            .unwrap_or_else(|| "script did not load".to_string());
        return Err(MapHackError::new("API_SCRIPT_LOAD_FAILED", detail));
    }

    world.spawn_lump(patched_lump.as_deref().unwrap_or(&entity_lump));
    engine.level_init_post_entity(&mut world);
    info!(
        map = map_name.as_str(),
        entities = world.all().len(),
        patched = patched_lump.is_some(),
        "level loaded"
    );

    Ok(LevelSession {
        engine,
        world,
        patched_lump,
    })
}

/// Advances the session clock `ticks` times by `interval` seconds, letting
/// the scheduler run after each step.
pub fn run_ticks(session: &mut LevelSession, ticks: usize, interval: f32) {
    for _ in 0..ticks {
        session.world.advance(interval);
        session.engine.think(&mut session.world);
    }
}

impl LevelSession {
    pub fn console_command(&mut self, line: &str) -> bool {
        self.engine.console_command(&mut self.world, line)
    }

    /// Fires `output` on the entity named `target_name`, as the game would
    /// when the entity's output triggers. Returns `false` when no entity has
    /// that name.
    pub fn fire_output(&mut self, target_name: &str, output: &str) -> bool {
        let Some(caller) = self
            .world
            .find_by_target_name(target_name)
            .map(|entity| entity.handle)
        else {
            return false;
        };
        self.engine.on_entity_output_fired(
            &mut self.world,
            &OutputFired {
                caller,
                output: output.to_string(),
                value: None,
                activator: None,
                delay: 0.0,
            },
        );
        true
    }

    /// Drains the engine's diagnostics, so a long-running session can poll
    /// them between batches of ticks.
    pub fn take_diagnostics(&mut self) -> Vec<MapHackError> {
        self.engine.take_diagnostics()
    }

    pub fn game_event(&mut self, name: &str) {
        self.engine.on_game_event(&mut self.world, name);
    }

    pub fn report(&self) -> LevelReport {
        let entities = self
            .world
            .all()
            .iter()
            .map(|entity| EntityReport {
                handle: entity.handle.0,
                class_name: entity.class_name.clone(),
                target_name: entity.key_value("targetname").map(str::to_string),
                origin: entity.origin,
            })
            .collect();
        let variables = self
            .engine
            .variables()
            .iter()
            .map(|variable| (variable.name().to_string(), variable.text().to_string()))
            .collect();
        let events = self
            .engine
            .events()
            .iter()
            .map(|event| EventReport {
                name: event.name.clone(),
                kind: event.kind.type_name().to_string(),
                triggered: event.triggered,
                stopped: event.stopped,
            })
            .collect();

        let mut messages = Vec::new();
        let mut warnings = Vec::new();
        for line in &self.world.console {
            match line {
                ConsoleLine::Message(text) => messages.push(text.trim_end().to_string()),
                ConsoleLine::Warning(text) => warnings.push(text.trim_end().to_string()),
            }
        }

        LevelReport {
            map_name: self.world.map_name(),
            identifier: self.engine.identifier().to_string(),
            time: self.world.cur_time(),
            patched: self.patched_lump.is_some(),
            entities,
            variables,
            events,
            messages,
            warnings,
            commands: self.world.commands.clone(),
            diagnostics: self.engine.diagnostics().to_vec(),
            dropped_diagnostics: self.engine.dropped_diagnostics(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mh_runtime::sandbox::MemoryScriptSource;

    const LUMP: &str = "{\n\"classname\" \"worldspawn\"\n}\n{\n\"classname\" \"func_button\"\n\"targetname\" \"btn\"\n\"hammerid\" \"3\"\n}\n";

    fn options(script: &str) -> LevelLoadOptions {
        LevelLoadOptions {
            map_name: "demo".to_string(),
            entity_lump: LUMP.to_string(),
            config: MapHackConfig::default(),
            script_source: Some(Arc::new(MemoryScriptSource::new([(
                "maps/maphacks/demo.txt",
                script,
            )]))),
            sounds: vec!["buttons/button1.wav".to_string()],
            random_seed: Some(3),
        }
    }

    #[test]
    fn run_level_load_spawns_and_reports() {
        let mut session = run_level_load(options(
            r#"maphack
{
    "vars" { "presses" { "type" "int" } }
    "pre_entities" { "info_target" { "targetname" "spot" } }
    "events"
    {
        "press" { "type" "EVENT_OUTPUT" "targetname" "btn" "output" "OnPressed" }
        "beat" { "type" "EVENT_TIMED" "delay" "0.5" }
    }
    "press" { "$increment" { "var" "presses" } "$playsound" { "name" "buttons/button1.wav" "source" "btn" } }
    "beat" { "$console" { "msg" "beat" } }
}"#,
        ))
        .expect("level should load");

        assert!(session.patched_lump.is_some());
        assert!(session.fire_output("btn", "OnPressed"));
        assert!(!session.fire_output("nobody", "OnPressed"));
        run_ticks(&mut session, 3, 0.25);

        let report = session.report();
        assert_eq!(report.identifier, "maps/maphacks/demo.txt");
        assert_eq!(report.variables.get("presses").map(String::as_str), Some("1"));
        assert_eq!(report.messages, vec!["beat".to_string()]);
        assert!(report
            .entities
            .iter()
            .any(|entity| entity.target_name.as_deref() == Some("spot")));
        assert_eq!(session.world.sounds.len(), 1);
        assert!((report.time - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn warning_timer_keeps_diagnostics_bounded() {
        let mut session = run_level_load(options(
            r#"maphack
{
    "events" { "nag" { "type" "EVENT_TIMED" "delay" "0.1" } }
    "nag" { "$console" { "msg" "%nowhere" } }
}"#,
        ))
        .expect("level should load");

        run_ticks(&mut session, 1000, 0.1);
        let report = session.report();
        assert_eq!(report.diagnostics.len(), mh_runtime::MAX_DIAGNOSTICS);
        assert!(report.dropped_diagnostics > 0);
        assert!(report
            .diagnostics
            .iter()
            .all(|entry| entry.code == "MH_VAR_MISSING"));

        assert_eq!(session.take_diagnostics().len(), mh_runtime::MAX_DIAGNOSTICS);
        run_ticks(&mut session, 3, 0.1);
        let report = session.report();
        assert_eq!(report.diagnostics.len(), 3);
        assert_eq!(report.dropped_diagnostics, 0);
    }

    #[test]
    fn missing_script_is_an_error() {
        let mut options = options("maphack { }");
        options.map_name = "other".to_string();
        let error = run_level_load(options).err().expect("no script for map");
        assert_eq!(error.code, "API_SCRIPT_NOT_FOUND");
    }

    #[test]
    fn unparsable_script_is_an_error() {
        let error = run_level_load(options("maphack {")).err().expect("bad script");
        assert_eq!(error.code, "API_SCRIPT_LOAD_FAILED");
    }

    #[test]
    fn disabled_config_spawns_level_untouched() {
        let mut options = options("maphack { }");
        options.config.enabled = false;
        let session = run_level_load(options).expect("loads without script");
        assert!(session.patched_lump.is_none());
        assert!(session.world.find_by_target_name("btn").is_some());
        assert_eq!(session.report().identifier, "");
    }

    #[test]
    fn level_report_serializes_camel_case() {
        let session = run_level_load(options("maphack { }")).expect("loads");
        let json = serde_json::to_string(&session.report()).expect("report json");
        assert!(json.contains("\"mapName\":\"demo\""));
        assert!(json.contains("\"patched\":false"));
    }
}
