use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use mh_core::{EntityHandle, MapHackError, ValueKind};
use mh_parser::{parse_base_directives, parse_kv_document, KvNode};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::config::{LoadFlags, MapHackConfig};
use crate::diagnostics::Diagnostics;
use crate::entdata::{finalize_lump, parse_lump, EntityRecord};
use crate::events::{EventKind, EventRegistry, OutputWatchTable};
use crate::host::{EmptyScriptSource, GameHost, PrecacheKind, ScriptSource};
use crate::vars::VariableStore;
use crate::{MAPHACK_DEFAULT_IDENTIFIER, MAPHACK_ROOT_NAME};

/// Which side of the spawn pipeline the interpreter is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Directives edit staged entity records.
    Pre,
    /// Directives act on live entities.
    #[default]
    Post,
}

#[derive(Clone, Default)]
pub struct MapHackEngineOptions {
    pub config: MapHackConfig,
    pub script_source: Option<Arc<dyn ScriptSource>>,
    pub random_seed: Option<u64>,
}

pub struct MapHackEngine {
    pub(super) config: MapHackConfig,
    pub(super) script_source: Arc<dyn ScriptSource>,
    pub(super) rng: SmallRng,
    pub(super) document: Option<Rc<KvNode>>,
    pub(super) included: Vec<Rc<KvNode>>,
    pub(super) identifier: String,
    pub(super) phase: Phase,
    pub(super) vars: VariableStore,
    pub(super) events: EventRegistry,
    pub(super) output_watches: OutputWatchTable,
    pub(super) records: Vec<EntityRecord>,
    pub(super) patched_lump: Option<String>,
    /// Entities created by the interpreter, keyed by lowercase target name.
    pub(super) spawned: BTreeMap<String, EntityHandle>,
    pub(super) recursion_depth: usize,
    pub(super) recursion_aborted: bool,
    pub(super) include_stack: Vec<String>,
    pub(super) diagnostics: Diagnostics,
}

impl MapHackEngine {
    pub fn new(options: MapHackEngineOptions) -> Self {
        let rng = match options.random_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self {
            config: options.config,
            script_source: options
                .script_source
                .unwrap_or_else(|| Arc::new(EmptyScriptSource)),
            rng,
            document: None,
            included: Vec::new(),
            identifier: String::new(),
            phase: Phase::default(),
            vars: VariableStore::default(),
            events: EventRegistry::default(),
            output_watches: OutputWatchTable::default(),
            records: Vec::new(),
            patched_lump: None,
            spawned: BTreeMap::new(),
            recursion_depth: 0,
            recursion_aborted: false,
            include_stack: Vec::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn config(&self) -> &MapHackConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    pub fn document(&self) -> Option<&KvNode> {
        self.document.as_deref()
    }

    pub fn variables(&self) -> &VariableStore {
        &self.vars
    }

    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    pub fn output_watches(&self) -> &OutputWatchTable {
        &self.output_watches
    }

    /// Records staged by the pre-entity pass currently running.
    pub fn records(&self) -> &[EntityRecord] {
        &self.records
    }

    /// The entity stream produced by the last pre-entity pass.
    pub fn patched_lump(&self) -> Option<&str> {
        self.patched_lump.as_deref()
    }

    pub fn spawned_entity(&self, target_name: &str) -> Option<EntityHandle> {
        self.spawned.get(&target_name.to_ascii_lowercase()).copied()
    }

    pub fn diagnostics(&self) -> &[MapHackError] {
        self.diagnostics.entries()
    }

    pub fn take_diagnostics(&mut self) -> Vec<MapHackError> {
        self.diagnostics.take()
    }

    /// Diagnostics discarded since the last take because the buffer was full.
    pub fn dropped_diagnostics(&self) -> usize {
        self.diagnostics.dropped()
    }

    pub fn dump_variables(&self) -> String {
        self.vars.dump()
    }

    /// Drops runtime state. Output watches and game event subscriptions are
    /// released first; the document survives unless `delete_document`.
    pub fn reset(&mut self, host: &mut dyn GameHost, delete_document: bool) {
        for event in self.events.iter() {
            if let EventKind::Output(binding) = &event.kind {
                if let Some(entity) = binding.entity {
                    self.output_watches.remove(entity);
                }
            }
        }
        host.stop_listening_for_all_game_events();
        self.events.clear();
        self.spawned.clear();
        self.vars.clear();
        self.included.clear();
        self.recursion_depth = 0;
        self.recursion_aborted = false;
        if delete_document {
            self.document = None;
            self.identifier.clear();
        }
        debug!(delete_document, "reset maphack state");
    }

    pub fn load_document(
        &mut self,
        host: &mut dyn GameHost,
        document: KvNode,
        flags: LoadFlags,
        identifier: &str,
    ) -> Result<(), MapHackError> {
        if !document.name.eq_ignore_ascii_case(MAPHACK_ROOT_NAME) {
            return Err(MapHackError::new(
                "MH_LOAD_BAD_ROOT",
                format!(
                    "Root block is \"{}\", expected \"{}\".",
                    document.name, MAPHACK_ROOT_NAME
                ),
            ));
        }

        let document = Rc::new(document);
        if flags.contains(LoadFlags::INCLUDE) {
            self.included.push(Rc::clone(&document));
        } else {
            self.reset(host, true);
            self.identifier = if identifier.is_empty() {
                MAPHACK_DEFAULT_IDENTIFIER.to_string()
            } else {
                identifier.to_string()
            };
            self.document = Some(Rc::clone(&document));
        }

        self.apply_sections(host, &document, flags);
        info!(
            identifier,
            include = flags.contains(LoadFlags::INCLUDE),
            "loaded maphack"
        );
        Ok(())
    }

    /// Parses `source` and loads it. `#base`/`#include` lines become leading
    /// entries of the document's `includes` block.
    pub fn load_from_str(
        &mut self,
        host: &mut dyn GameHost,
        source: &str,
        flags: LoadFlags,
        identifier: &str,
    ) -> Result<(), MapHackError> {
        let mut document = parse_kv_document(source)?;
        merge_base_includes(&mut document, parse_base_directives(source));
        self.load_document(host, document, flags, identifier)
    }

    pub fn load_from_file(
        &mut self,
        host: &mut dyn GameHost,
        path: &str,
        flags: LoadFlags,
    ) -> Result<(), MapHackError> {
        self.include_stack.push(path.to_string());
        let result = self
            .script_source
            .load(path)
            .and_then(|source| self.load_from_str(host, &source, flags, path));
        self.include_stack.pop();

        if let Err(error) = &result {
            if flags.contains(LoadFlags::COMPLAIN) {
                self.diagnostics.warn(
                    "MH_LOAD_FAILED",
                    format!("Failed to load maphack \"{}\": {}", path, error.message),
                );
            }
            if !flags.contains(LoadFlags::INCLUDE) {
                self.reset(host, true);
            }
        }
        result
    }

    pub(super) fn apply_sections(
        &mut self,
        host: &mut dyn GameHost,
        document: &KvNode,
        flags: LoadFlags,
    ) {
        if flags.contains(LoadFlags::LOAD_INCLUDES) {
            if let Some(includes) = document.find_block("includes") {
                for entry in includes.values() {
                    let path = entry.as_text().unwrap_or_default();
                    self.load_include(host, path, flags);
                }
            }
        }
        if flags.contains(LoadFlags::REGISTER_VARS) {
            if let Some(vars) = document.find_block("vars") {
                self.register_variables(vars);
            }
        }
        if flags.contains(LoadFlags::PRECACHE) {
            if let Some(precache) = document.find_block("precache") {
                self.precache(host, precache);
            }
        }
        if flags.contains(LoadFlags::REGISTER_EVENTS) {
            self.register_events(host, document);
        }
        if flags.contains(LoadFlags::RUN_ENTITIES) {
            if let Some(entities) = document.find_block("entities") {
                self.run_entities(host, entities);
            }
        }
    }

    fn load_include(&mut self, host: &mut dyn GameHost, path: &str, flags: LoadFlags) {
        if self
            .include_stack
            .iter()
            .any(|loading| loading.eq_ignore_ascii_case(path))
        {
            self.diagnostics.warn(
                "MH_INCLUDE_CYCLE",
                format!("Include \"{}\" is already being loaded.", path),
            );
            return;
        }
        if !self.script_source.exists(path) {
            self.diagnostics.warn(
                "MH_INCLUDE_MISSING",
                format!("Include file \"{}\" does not exist.", path),
            );
            return;
        }
        let flags = (flags | LoadFlags::INCLUDE).difference(LoadFlags::COMPLAIN);
        if let Err(error) = self.load_from_file(host, path, flags) {
            self.diagnostics.warn(
                "MH_INCLUDE_FAILED",
                format!("Failed to load include \"{}\": {}", path, error.message),
            );
        }
    }

    pub(super) fn register_variables(&mut self, node: &KvNode) {
        for declaration in node.true_subkeys() {
            let type_name = declaration.get_string_or("type", "int");
            let kind = ValueKind::from_identifier(type_name);
            if kind == ValueKind::None {
                self.diagnostics.warn(
                    "MH_VAR_TYPE_UNKNOWN",
                    format!(
                        "Variable \"{}\" has unknown type \"{}\".",
                        declaration.name, type_name
                    ),
                );
                continue;
            }
            let value = declaration.get_string_or("value", "0");
            let variable = self.vars.register(&declaration.name, kind, value);
            debug!(name = variable.name(), kind = kind.type_name(), value = variable.text(), "registered variable");
        }
    }

    /// Precaches every `kind "name"` pair of `node`.
    pub fn precache(&mut self, host: &mut dyn GameHost, node: &KvNode) {
        for entry in node.values() {
            let Some(kind) = PrecacheKind::from_name(&entry.name) else {
                self.diagnostics.warn(
                    "MH_PRECACHE_KIND_UNKNOWN",
                    format!("Unknown precache category \"{}\".", entry.name),
                );
                continue;
            };
            let name = self
                .vars
                .substitute(entry.as_text().unwrap_or_default(), &mut self.diagnostics);
            host.precache(kind, &name);
            debug!(?kind, name = name.as_str(), "precached resource");
        }
    }

    /// Runs before the level's entities spawn. Returns the patched entity
    /// stream when the loaded documents carry a `pre_entities` block.
    pub fn level_init(&mut self, host: &mut dyn GameHost, map_entities: &str) -> Option<String> {
        self.phase = Phase::Pre;
        self.patched_lump = None;

        if self.config.enabled {
            let path = self.config.script_path(&host.map_name());
            if self.script_source.exists(&path) {
                if let Err(error) = self.load_from_file(host, &path, LoadFlags::PRE_ENTITY) {
                    debug!(code = error.code.as_str(), "level maphack not loaded");
                }
            } else {
                debug!(path = path.as_str(), "no maphack for level");
            }
        }

        let sources = self.document_chain();
        let blocks: Vec<&KvNode> = sources
            .iter()
            .filter_map(|document| document.find_block("pre_entities"))
            .collect();
        if blocks.is_empty() {
            return None;
        }

        self.records = parse_lump(map_entities);
        for block in blocks {
            self.run_entities(host, block);
        }
        let lump = finalize_lump(&self.records);
        info!(records = self.records.len(), "patched level entity data");
        self.records.clear();
        self.patched_lump = Some(lump.clone());
        Some(lump)
    }

    /// Runs after the level's entities spawn: registers events and runs the
    /// `entities` blocks.
    pub fn level_init_post_entity(&mut self, host: &mut dyn GameHost) {
        self.phase = Phase::Post;
        let sources = self.document_chain();
        for document in &sources {
            self.register_events(host, document);
        }
        for document in &sources {
            if let Some(entities) = document.find_block("entities") {
                self.run_entities(host, entities);
            }
        }
    }

    pub fn level_shutdown(&mut self, host: &mut dyn GameHost) {
        self.reset(host, true);
        self.records.clear();
        self.patched_lump = None;
    }

    /// Rebuilds runtime state from the loaded document.
    pub fn reload(&mut self, host: &mut dyn GameHost) {
        let Some(document) = self.document.clone() else {
            self.diagnostics
                .warn("MH_RELOAD_NO_DOCUMENT", "No maphack is loaded to reload.");
            return;
        };
        self.reset(host, false);
        let flags = LoadFlags::POST_ENTITY.difference(LoadFlags::PRECACHE);
        self.apply_sections(host, &document, flags);
        info!(identifier = self.identifier.as_str(), "reloaded maphack");
    }

    /// Advances timers and the delayed queue.
    pub fn think(&mut self, host: &mut dyn GameHost) {
        if self.document.is_none() || self.events.is_empty() {
            return;
        }
        self.handle_events(host);
    }

    /// Swaps in a new configuration and reloads the level's script under it.
    pub fn apply_config(&mut self, host: &mut dyn GameHost, config: MapHackConfig) {
        self.config = config;
        self.reset(host, true);
        if !self.config.enabled {
            return;
        }
        let path = self.config.script_path(&host.map_name());
        if let Err(error) = self.load_from_file(host, &path, LoadFlags::POST_ENTITY) {
            debug!(code = error.code.as_str(), "maphack not reloaded after config change");
        }
    }

    /// Handles one `maphack_*` console command line. Returns `false` for
    /// commands this engine does not own.
    pub fn console_command(&mut self, host: &mut dyn GameHost, line: &str) -> bool {
        let mut parts = line.split_whitespace().map(|part| part.trim_matches('"'));
        let Some(command) = parts.next() else {
            return false;
        };
        let argument = parts.next().filter(|argument| !argument.is_empty());

        match command.to_ascii_lowercase().as_str() {
            "maphack_load" => match argument {
                Some(path) => {
                    if let Err(error) = self.load_from_file(host, path, LoadFlags::POST_ENTITY) {
                        host.warning(&format!("Failed to load \"{}\": {}\n", path, error.message));
                    }
                }
                None => host.message("Usage: maphack_load <file>\n"),
            },
            "maphack_include" => match argument {
                Some(_) if self.document.is_none() => {
                    host.warning("No maphack is loaded to include into.\n");
                }
                Some(path) => {
                    let flags = LoadFlags::POST_ENTITY | LoadFlags::INCLUDE;
                    if let Err(error) = self.load_from_file(host, path, flags) {
                        host.warning(&format!("Failed to include \"{}\": {}\n", path, error.message));
                    }
                }
                None => host.message("Usage: maphack_include <file>\n"),
            },
            "maphack_reload" => self.reload(host),
            "maphack_trigger" => match argument {
                Some(name) => {
                    self.trigger_event_by_name(host, name, 0.0);
                }
                None => host.message("Usage: maphack_trigger <event>\n"),
            },
            "maphack_dump_vars" => {
                let dump = self.vars.dump();
                host.message(&dump);
            }
            _ => return false,
        }
        true
    }

    /// Included documents in load order, then the main document.
    fn document_chain(&self) -> Vec<Rc<KvNode>> {
        let mut chain = self.included.clone();
        chain.extend(self.document.clone());
        chain
    }
}

fn merge_base_includes(document: &mut KvNode, bases: Vec<String>) {
    if bases.is_empty() {
        return;
    }
    let Some(children) = document.children_mut() else {
        return;
    };
    let index = match children
        .iter()
        .position(|child| child.is_block() && child.name.eq_ignore_ascii_case("includes"))
    {
        Some(index) => index,
        None => {
            children.insert(0, KvNode::block("includes", Vec::new()));
            0
        }
    };
    if let Some(entries) = children[index].children_mut() {
        for (offset, base) in bases.into_iter().enumerate() {
            entries.insert(offset, KvNode::text("file", base));
        }
    }
}
