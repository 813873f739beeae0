pub mod config;
pub mod condition;
pub mod diagnostics;
pub mod engine;
pub mod entdata;
pub mod events;
pub mod function;
pub mod host;
pub mod matcher;
pub mod sandbox;
pub mod vars;

pub use config::{LoadFlags, MapHackConfig};
pub use diagnostics::{Diagnostics, MAX_DIAGNOSTICS};
pub use engine::{is_protected_entity, MapHackEngine, MapHackEngineOptions, Phase};
pub use entdata::{finalize_lump, parse_lump, EntityRecord};
pub use events::{Event, EventDataKind, EventKind, EventRegistry, OutputWatchTable};
pub use function::FunctionKind;
pub use host::*;
pub use vars::{Variable, VariableStore};

pub const MAPHACK_ROOT_NAME: &str = "maphack";
pub const MAPHACK_DEFAULT_IDENTIFIER: &str = "maphack";
pub const MAX_RECURSION_DEPTH: usize = 64;

/// Top-level section names that are never treated as event labels.
pub const KEYWORDS: [&str; 6] = [
    "entities",
    "events",
    "precache",
    "vars",
    "includes",
    "pre_entities",
];

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS
        .iter()
        .any(|keyword| keyword.eq_ignore_ascii_case(name))
}
