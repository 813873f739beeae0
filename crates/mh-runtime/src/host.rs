//! Contracts for the game runtime the interpreter drives.

use mh_core::{EntityHandle, MapHackError, Vec3};

/// Primitive kind of a reflected entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    ModelName,
    SoundName,
    Time,
    Float,
    Boolean,
    Character,
    Short,
    Integer,
    Tick,
    Vector,
    PositionVector,
    VMatrix,
    VMatrixWorldSpace,
    Matrix3x4WorldSpace,
    Color32,
    Interval,
    ClassPtr,
    ModelIndex,
    MaterialIndex,
    Edict,
    Custom,
    /// An output connection list.
    Output,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDesc {
    pub name: String,
    pub kind: FieldKind,
    pub nested: Vec<FieldDesc>,
}

impl FieldDesc {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nested: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Float(f32),
    Boolean(bool),
    Character(i8),
    Short(i16),
    Integer(i32),
    Vector(Vec3),
    Matrix(Vec<f32>),
    Color32([u8; 4]),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    String(String),
    Int(i32),
    Float(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecacheKind {
    Model,
    Material,
    Sound,
    Particle,
    Entity,
}

impl PrecacheKind {
    pub fn from_name(name: &str) -> Option<Self> {
        [
            ("model", Self::Model),
            ("material", Self::Material),
            ("sound", Self::Sound),
            ("particle", Self::Particle),
            ("entity", Self::Entity),
        ]
        .into_iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, kind)| kind)
    }
}

/// Notification delivered when an entity fires one of its outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFired {
    pub caller: EntityHandle,
    pub output: String,
    pub value: Option<String>,
    pub activator: Option<EntityHandle>,
    pub delay: f32,
}

pub trait EntityWorld {
    fn create_entity(&mut self, class_name: &str) -> Option<EntityHandle>;
    fn apply_key_value(&mut self, entity: EntityHandle, key: &str, value: &str) -> bool;
    fn set_model(&mut self, entity: EntityHandle, model: &str);
    fn finalize_spawn(&mut self, entity: EntityHandle);
    fn destroy(&mut self, entity: EntityHandle);
    /// Live entities in creation order.
    fn entities(&self) -> Vec<EntityHandle>;
    fn is_alive(&self, entity: EntityHandle) -> bool;
    fn class_name(&self, entity: EntityHandle) -> Option<String>;
    fn target_name(&self, entity: EntityHandle) -> Option<String>;
    fn hammer_id(&self, entity: EntityHandle) -> Option<i32>;
    fn get_key_value(&self, entity: EntityHandle, key: &str) -> Option<String>;
    fn origin(&self, entity: EntityHandle) -> Option<Vec3>;
    fn set_origin(&mut self, entity: EntityHandle, origin: Vec3);
    fn angles(&self, entity: EntityHandle) -> Option<Vec3>;
    fn set_angles(&mut self, entity: EntityHandle, angles: Vec3);
    /// Reflected field table, most-derived type first.
    fn field_table(&self, entity: EntityHandle) -> Vec<FieldDesc>;
    fn write_field(&mut self, entity: EntityHandle, field: &str, value: FieldValue) -> bool;
    fn clear_output(&mut self, entity: EntityHandle, output: &str) -> bool;
    fn send_input(&mut self, entity: EntityHandle, input: &str, value: InputValue);
    fn debug_name(&self, entity: EntityHandle) -> String;
    fn is_player(&self, entity: EntityHandle) -> bool;
    fn is_world(&self, entity: EntityHandle) -> bool;
    /// Creates an entity from one raw `{ ... }` record, without finalizing it.
    fn spawn_from_record(&mut self, record: &str) -> Option<EntityHandle>;
    /// The level's unmodified raw entity stream.
    fn level_entity_lump(&self) -> String;
}

pub trait ResourceSystem {
    fn precache(&mut self, kind: PrecacheKind, name: &str);
    fn sound_exists(&self, name: &str) -> bool;
    /// Plays `name` from `source`, or world-scoped when `source` is `None`.
    fn emit_sound(&mut self, name: &str, source: Option<EntityHandle>);
}

pub trait GameEventBus {
    fn listen_for_game_event(&mut self, name: &str);
    fn stop_listening_for_all_game_events(&mut self);
}

pub trait Console {
    fn message(&mut self, text: &str);
    fn warning(&mut self, text: &str);
    fn execute_command(&mut self, command: &str);
}

pub trait GameHost: EntityWorld + ResourceSystem + GameEventBus + Console {
    fn cur_time(&self) -> f32;
    fn map_name(&self) -> String;
}

/// Script and include file access.
pub trait ScriptSource: Send + Sync {
    fn exists(&self, path: &str) -> bool;
    fn load(&self, path: &str) -> Result<String, MapHackError>;
}

#[derive(Debug, Default)]
pub struct EmptyScriptSource;

impl ScriptSource for EmptyScriptSource {
    fn exists(&self, _path: &str) -> bool {
        false
    }

    fn load(&self, path: &str) -> Result<String, MapHackError> {
        Err(MapHackError::new(
            "MH_SCRIPT_SOURCE_EMPTY",
            format!("No script source configured for \"{}\".", path),
        ))
    }
}
