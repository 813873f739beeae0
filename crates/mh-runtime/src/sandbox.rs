//! In-memory game host used by tests and the CLI.
//!
//! Entities keep their key/values as an ordered list; `origin` and `angles`
//! are mirrored into the transform. The reflected field table is the same
//! small table for every entity.

use std::collections::{BTreeMap, BTreeSet};

use mh_core::{format_vec3, scan_vec3, EntityHandle, MapHackError, Vec3};

use crate::entdata::{parse_lump, EntityRecord};
use crate::host::{
    Console, EntityWorld, FieldDesc, FieldKind, FieldValue, GameEventBus, GameHost, InputValue,
    PrecacheKind, ResourceSystem, ScriptSource,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SandboxEntity {
    pub handle: EntityHandle,
    pub class_name: String,
    pub key_values: Vec<(String, String)>,
    pub origin: Vec3,
    pub angles: Vec3,
    pub model: Option<String>,
    pub spawned: bool,
    pub player: bool,
    pub fields: BTreeMap<String, FieldValue>,
    /// Output name (lowercase) to connection strings.
    pub outputs: BTreeMap<String, Vec<String>>,
}

impl SandboxEntity {
    fn new(handle: EntityHandle, class_name: &str) -> Self {
        Self {
            handle,
            class_name: class_name.to_string(),
            key_values: vec![("classname".to_string(), class_name.to_string())],
            origin: [0.0; 3],
            angles: [0.0; 3],
            model: None,
            spawned: false,
            player: false,
            fields: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn key_value(&self, key: &str) -> Option<&str> {
        self.key_values
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }

    fn set_key_value(&mut self, key: &str, value: &str) {
        match self
            .key_values
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.key_values.push((key.to_string(), value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleLine {
    Message(String),
    Warning(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentInput {
    pub entity: EntityHandle,
    pub input: String,
    pub value: InputValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmittedSound {
    pub name: String,
    pub source: Option<EntityHandle>,
}

/// A level with a flat entity list and recorded side effects.
#[derive(Debug, Clone)]
pub struct SandboxWorld {
    entities: Vec<SandboxEntity>,
    next_handle: u32,
    time: f32,
    map_name: String,
    lump: String,
    pub console: Vec<ConsoleLine>,
    pub commands: Vec<String>,
    pub precached: Vec<(PrecacheKind, String)>,
    pub sounds: Vec<EmittedSound>,
    pub inputs: Vec<SentInput>,
    pub known_sounds: BTreeSet<String>,
    pub listening: BTreeSet<String>,
}

pub fn default_field_table() -> Vec<FieldDesc> {
    let mut collision = FieldDesc::new("m_Collision", FieldKind::Custom);
    collision.nested = vec![
        FieldDesc::new("m_vecMins", FieldKind::Vector),
        FieldDesc::new("m_vecMaxs", FieldKind::Vector),
    ];
    vec![
        FieldDesc::new("m_iHealth", FieldKind::Integer),
        FieldDesc::new("m_iMaxHealth", FieldKind::Integer),
        FieldDesc::new("m_flSpeed", FieldKind::Float),
        FieldDesc::new("m_flNextThink", FieldKind::Time),
        FieldDesc::new("m_bDisabled", FieldKind::Boolean),
        FieldDesc::new("m_chFlag", FieldKind::Character),
        FieldDesc::new("m_nSkinGroup", FieldKind::Short),
        FieldDesc::new("m_iszMessage", FieldKind::String),
        FieldDesc::new("m_ModelName", FieldKind::ModelName),
        FieldDesc::new("m_vecVelocity", FieldKind::Vector),
        FieldDesc::new("m_vecAbsOrigin", FieldKind::PositionVector),
        FieldDesc::new("m_matTransform", FieldKind::Matrix3x4WorldSpace),
        FieldDesc::new("m_clrRender", FieldKind::Color32),
        FieldDesc::new("m_hOwnerEntity", FieldKind::ClassPtr),
        FieldDesc::new("m_nModelIndex", FieldKind::ModelIndex),
        FieldDesc::new("OnTrigger", FieldKind::Output),
        FieldDesc::new("OnUser1", FieldKind::Output),
        FieldDesc::new("OnStartTouch", FieldKind::Output),
        collision,
    ]
}

fn find_field<'a>(table: &'a [FieldDesc], name: &str) -> Option<&'a FieldDesc> {
    table.iter().find_map(|field| {
        if field.name.eq_ignore_ascii_case(name) {
            Some(field)
        } else {
            find_field(&field.nested, name)
        }
    })
}

impl SandboxWorld {
    /// A fresh level holding only `worldspawn` and one player.
    pub fn new(map_name: &str) -> Self {
        let mut world = Self {
            entities: Vec::new(),
            next_handle: 0,
            time: 0.0,
            map_name: map_name.to_string(),
            lump: String::new(),
            console: Vec::new(),
            commands: Vec::new(),
            precached: Vec::new(),
            sounds: Vec::new(),
            inputs: Vec::new(),
            known_sounds: BTreeSet::new(),
            listening: BTreeSet::new(),
        };
        if let Some(world_entity) = world.create_entity("worldspawn") {
            world.finalize_spawn(world_entity);
        }
        if let Some(player) = world.create_entity("player") {
            if let Some(entity) = world.entity_mut(player) {
                entity.player = true;
            }
            world.finalize_spawn(player);
        }
        world
    }

    /// Stores `lump` as the level's raw entity stream and spawns every record
    /// in it. `worldspawn` records update the existing world entity.
    pub fn spawn_lump(&mut self, lump: &str) -> Vec<EntityHandle> {
        self.lump = lump.to_string();
        let mut spawned = Vec::new();
        for record in parse_lump(lump) {
            if record
                .class_name()
                .is_some_and(|class| class.eq_ignore_ascii_case("worldspawn"))
            {
                if let Some(world) = self.world_entity() {
                    for (key, value) in record.pairs() {
                        self.apply_key_value(world, key, value);
                    }
                }
                continue;
            }
            if let Some(entity) = self.spawn_from_record(record.as_str()) {
                self.finalize_spawn(entity);
                spawned.push(entity);
            }
        }
        spawned
    }

    pub fn set_time(&mut self, time: f32) {
        self.time = time;
    }

    pub fn advance(&mut self, seconds: f32) -> f32 {
        self.time += seconds;
        self.time
    }

    pub fn add_sound(&mut self, name: &str) {
        self.known_sounds.insert(name.to_ascii_lowercase());
    }

    pub fn entity(&self, handle: EntityHandle) -> Option<&SandboxEntity> {
        self.entities.iter().find(|entity| entity.handle == handle)
    }

    fn entity_mut(&mut self, handle: EntityHandle) -> Option<&mut SandboxEntity> {
        self.entities
            .iter_mut()
            .find(|entity| entity.handle == handle)
    }

    pub fn all(&self) -> &[SandboxEntity] {
        &self.entities
    }

    pub fn find_by_target_name(&self, name: &str) -> Option<&SandboxEntity> {
        self.entities.iter().find(|entity| {
            entity
                .key_value("targetname")
                .is_some_and(|target| target.eq_ignore_ascii_case(name))
        })
    }

    pub fn count_class(&self, class_name: &str) -> usize {
        self.entities
            .iter()
            .filter(|entity| entity.class_name.eq_ignore_ascii_case(class_name))
            .count()
    }

    pub fn world_entity(&self) -> Option<EntityHandle> {
        self.entities
            .iter()
            .find(|entity| entity.class_name.eq_ignore_ascii_case("worldspawn"))
            .map(|entity| entity.handle)
    }

    pub fn player(&self) -> Option<EntityHandle> {
        self.entities
            .iter()
            .find(|entity| entity.player)
            .map(|entity| entity.handle)
    }

    pub fn messages(&self) -> Vec<&str> {
        self.console
            .iter()
            .filter_map(|line| match line {
                ConsoleLine::Message(text) => Some(text.as_str()),
                ConsoleLine::Warning(_) => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<&str> {
        self.console
            .iter()
            .filter_map(|line| match line {
                ConsoleLine::Warning(text) => Some(text.as_str()),
                ConsoleLine::Message(_) => None,
            })
            .collect()
    }
}

impl EntityWorld for SandboxWorld {
    fn create_entity(&mut self, class_name: &str) -> Option<EntityHandle> {
        if class_name.trim().is_empty() {
            return None;
        }
        let handle = EntityHandle(self.next_handle);
        self.next_handle += 1;
        self.entities.push(SandboxEntity::new(handle, class_name));
        Some(handle)
    }

    fn apply_key_value(&mut self, entity: EntityHandle, key: &str, value: &str) -> bool {
        let Some(target) = self.entity_mut(entity) else {
            return false;
        };
        let table = default_field_table();
        if let Some(field) = find_field(&table, key).filter(|field| field.kind == FieldKind::Output)
        {
            target
                .outputs
                .entry(field.name.to_ascii_lowercase())
                .or_default()
                .push(value.to_string());
            return true;
        }
        if key.eq_ignore_ascii_case("origin") {
            target.origin = scan_vec3(value).unwrap_or_default();
        } else if key.eq_ignore_ascii_case("angles") {
            target.angles = scan_vec3(value).unwrap_or_default();
        } else if key.eq_ignore_ascii_case("classname") {
            target.class_name = value.to_string();
        }
        target.set_key_value(key, value);
        true
    }

    fn set_model(&mut self, entity: EntityHandle, model: &str) {
        if let Some(target) = self.entity_mut(entity) {
            target.model = Some(model.to_string());
        }
    }

    fn finalize_spawn(&mut self, entity: EntityHandle) {
        if let Some(target) = self.entity_mut(entity) {
            target.spawned = true;
        }
    }

    fn destroy(&mut self, entity: EntityHandle) {
        self.entities.retain(|target| target.handle != entity);
    }

    fn entities(&self) -> Vec<EntityHandle> {
        self.entities.iter().map(|entity| entity.handle).collect()
    }

    fn is_alive(&self, entity: EntityHandle) -> bool {
        self.entity(entity).is_some()
    }

    fn class_name(&self, entity: EntityHandle) -> Option<String> {
        self.entity(entity).map(|target| target.class_name.clone())
    }

    fn target_name(&self, entity: EntityHandle) -> Option<String> {
        self.entity(entity)
            .and_then(|target| target.key_value("targetname"))
            .map(str::to_string)
    }

    fn hammer_id(&self, entity: EntityHandle) -> Option<i32> {
        self.entity(entity)
            .and_then(|target| target.key_value("hammerid"))
            .map(mh_core::parse_int_lenient)
    }

    fn get_key_value(&self, entity: EntityHandle, key: &str) -> Option<String> {
        let target = self.entity(entity)?;
        if key.eq_ignore_ascii_case("origin") {
            return Some(format_vec3(&target.origin));
        }
        if key.eq_ignore_ascii_case("angles") {
            return Some(format_vec3(&target.angles));
        }
        target.key_value(key).map(str::to_string)
    }

    fn origin(&self, entity: EntityHandle) -> Option<Vec3> {
        self.entity(entity).map(|target| target.origin)
    }

    fn set_origin(&mut self, entity: EntityHandle, origin: Vec3) {
        if let Some(target) = self.entity_mut(entity) {
            target.origin = origin;
        }
    }

    fn angles(&self, entity: EntityHandle) -> Option<Vec3> {
        self.entity(entity).map(|target| target.angles)
    }

    fn set_angles(&mut self, entity: EntityHandle, angles: Vec3) {
        if let Some(target) = self.entity_mut(entity) {
            target.angles = angles;
        }
    }

    fn field_table(&self, entity: EntityHandle) -> Vec<FieldDesc> {
        if self.is_alive(entity) {
            default_field_table()
        } else {
            Vec::new()
        }
    }

    fn write_field(&mut self, entity: EntityHandle, field: &str, value: FieldValue) -> bool {
        match self.entity_mut(entity) {
            Some(target) => {
                target.fields.insert(field.to_ascii_lowercase(), value);
                true
            }
            None => false,
        }
    }

    fn clear_output(&mut self, entity: EntityHandle, output: &str) -> bool {
        match self.entity_mut(entity) {
            Some(target) => target.outputs.remove(&output.to_ascii_lowercase()).is_some(),
            None => false,
        }
    }

    fn send_input(&mut self, entity: EntityHandle, input: &str, value: InputValue) {
        self.inputs.push(SentInput {
            entity,
            input: input.to_string(),
            value,
        });
    }

    fn debug_name(&self, entity: EntityHandle) -> String {
        match self.entity(entity) {
            Some(target) => match target.key_value("targetname") {
                Some(name) => format!("{} ({}) {}", target.class_name, name, entity),
                None => format!("{} {}", target.class_name, entity),
            },
            None => format!("<dead> {}", entity),
        }
    }

    fn is_player(&self, entity: EntityHandle) -> bool {
        self.entity(entity).is_some_and(|target| target.player)
    }

    fn is_world(&self, entity: EntityHandle) -> bool {
        self.entity(entity)
            .is_some_and(|target| target.class_name.eq_ignore_ascii_case("worldspawn"))
    }

    fn spawn_from_record(&mut self, record: &str) -> Option<EntityHandle> {
        let record = EntityRecord::parse(record)?;
        let entity = self.create_entity(record.class_name()?)?;
        for (key, value) in record.pairs() {
            self.apply_key_value(entity, key, value);
        }
        Some(entity)
    }

    fn level_entity_lump(&self) -> String {
        self.lump.clone()
    }
}

impl ResourceSystem for SandboxWorld {
    fn precache(&mut self, kind: PrecacheKind, name: &str) {
        self.precached.push((kind, name.to_string()));
    }

    fn sound_exists(&self, name: &str) -> bool {
        self.known_sounds.contains(&name.to_ascii_lowercase())
    }

    fn emit_sound(&mut self, name: &str, source: Option<EntityHandle>) {
        self.sounds.push(EmittedSound {
            name: name.to_string(),
            source,
        });
    }
}

impl GameEventBus for SandboxWorld {
    fn listen_for_game_event(&mut self, name: &str) {
        self.listening.insert(name.to_string());
    }

    fn stop_listening_for_all_game_events(&mut self) {
        self.listening.clear();
    }
}

impl Console for SandboxWorld {
    fn message(&mut self, text: &str) {
        self.console.push(ConsoleLine::Message(text.to_string()));
    }

    fn warning(&mut self, text: &str) {
        self.console.push(ConsoleLine::Warning(text.to_string()));
    }

    fn execute_command(&mut self, command: &str) {
        self.commands.push(command.to_string());
    }
}

impl GameHost for SandboxWorld {
    fn cur_time(&self) -> f32 {
        self.time
    }

    fn map_name(&self) -> String {
        self.map_name.clone()
    }
}

/// Script files held in memory, keyed by path.
#[derive(Debug, Default, Clone)]
pub struct MemoryScriptSource {
    files: BTreeMap<String, String>,
}

impl MemoryScriptSource {
    pub fn new<K: Into<String>, V: Into<String>>(files: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            files: files
                .into_iter()
                .map(|(path, text)| (normalize_path(&path.into()), text.into()))
                .collect(),
        }
    }

    pub fn insert(&mut self, path: &str, text: &str) {
        self.files.insert(normalize_path(path), text.to_string());
    }
}

fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").to_ascii_lowercase()
}

impl ScriptSource for MemoryScriptSource {
    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    fn load(&self, path: &str) -> Result<String, MapHackError> {
        self.files.get(&normalize_path(path)).cloned().ok_or_else(|| {
            MapHackError::new(
                "MH_SCRIPT_NOT_FOUND",
                format!("Script file \"{}\" does not exist.", path),
            )
        })
    }
}
