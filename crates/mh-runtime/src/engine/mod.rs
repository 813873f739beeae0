mod edit;
mod entity_ops;
mod events;
mod lifecycle;
mod lookup;
mod run;
mod script;
mod variables;

pub use lifecycle::{MapHackEngine, MapHackEngineOptions, Phase};
pub use lookup::is_protected_entity;

#[cfg(test)]
pub(super) mod runtime_test_support {
    use std::sync::Arc;

    use mh_parser::parse_kv_document;

    use super::*;
    use crate::config::{LoadFlags, MapHackConfig};
    use crate::sandbox::{MemoryScriptSource, SandboxWorld};

    pub(crate) const TEST_LUMP: &str = "{\n\"classname\" \"worldspawn\"\n}\n\
{\n\"classname\" \"prop_physics\"\n\"targetname\" \"crate\"\n\"hammerid\" \"10\"\n\"origin\" \"0 0 0\"\n\"model\" \"models/crate.mdl\"\n}\n\
{\n\"classname\" \"light\"\n\"targetname\" \"lamp\"\n\"hammerid\" \"11\"\n\"_light\" \"255 255 255 200\"\n}\n\
{\n\"classname\" \"light\"\n\"targetname\" \"lamp2\"\n\"hammerid\" \"12\"\n}\n";

    pub(crate) fn engine_with_files(files: &[(&str, &str)]) -> MapHackEngine {
        MapHackEngine::new(MapHackEngineOptions {
            config: MapHackConfig::default(),
            script_source: Some(Arc::new(MemoryScriptSource::new(files.iter().copied()))),
            random_seed: Some(1),
        })
    }

    pub(crate) fn engine() -> MapHackEngine {
        engine_with_files(&[])
    }

    /// A sandbox level with the test lump spawned.
    pub(crate) fn world() -> SandboxWorld {
        let mut world = SandboxWorld::new("test_map");
        world.spawn_lump(TEST_LUMP);
        world
    }

    /// Loads `source` as the active document with post-entity flags.
    pub(crate) fn load(engine: &mut MapHackEngine, world: &mut SandboxWorld, source: &str) {
        let document = parse_kv_document(source).expect("document should parse");
        engine
            .load_document(world, document, LoadFlags::POST_ENTITY, "test")
            .expect("document should load");
    }
}

#[cfg(test)]
mod edit_tests;
#[cfg(test)]
mod events_tests;
