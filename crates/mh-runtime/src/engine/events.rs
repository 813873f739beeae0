use std::rc::Rc;

use mh_parser::KvNode;
use tracing::debug;

use super::MapHackEngine;
use crate::events::{parse_label, Event, EventDataKind, EventKind, OutputBinding, TimedState};
use crate::function::is_function_name;
use crate::host::{GameHost, OutputFired};
use crate::is_keyword;

impl MapHackEngine {
    /// Registers the `events` block of `document`, adds implicit trigger
    /// events for its labelled blocks and attaches each event's sub-tree.
    pub(super) fn register_events(&mut self, host: &mut dyn GameHost, document: &KvNode) {
        let now = host.cur_time();

        if let Some(events) = document.find_block("events") {
            for declaration in events.true_subkeys() {
                if is_keyword(&declaration.name) {
                    self.diagnostics.warn(
                        "MH_EVENT_KEYWORD",
                        format!("\"{}\" is reserved and cannot name an event.", declaration.name),
                    );
                    continue;
                }
                let kind = self.event_kind(host, declaration, now);
                let mut event = Event::new(declaration.name.clone(), kind);
                event.stopped = matches!(event.kind, EventKind::Timed(_))
                    && declaration.get_bool("startdisabled", false);
                debug!(name = event.name.as_str(), kind = event.kind.type_name(), "registered event");
                self.events.insert(event);
            }
        }

        for block in document.true_subkeys() {
            if is_keyword(&block.name) || is_function_name(&block.name) {
                continue;
            }
            let (name, _) = parse_label(&block.name);
            if self.events.find(name).is_none() {
                debug!(name, "registered implicit trigger event");
                self.events.insert(Event::new(name, EventKind::Trigger));
            }
        }

        for block in document.true_subkeys() {
            if is_keyword(&block.name) || is_function_name(&block.name) {
                continue;
            }
            let (name, data_kind) = parse_label(&block.name);
            if let Some(event) = self.events.get_mut(name) {
                if event.data.is_none() {
                    event.data = Some(Rc::new(block.clone()));
                    event.data_kind = data_kind;
                }
            }
        }
    }

    fn event_kind(&mut self, host: &mut dyn GameHost, declaration: &KvNode, now: f32) -> EventKind {
        let type_name = declaration.get_string_or("type", "EVENT_TRIGGER");
        if type_name.eq_ignore_ascii_case("EVENT_TRIGGER") {
            EventKind::Trigger
        } else if type_name.eq_ignore_ascii_case("EVENT_TIMED") {
            let delay = declaration.get_float("delay", 1.0);
            EventKind::Timed(TimedState {
                delay,
                repeat: declaration.get_bool("repeat", true),
                next_fire_time: now + delay,
            })
        } else if type_name.eq_ignore_ascii_case("EVENT_OUTPUT") {
            let target_name = declaration.get_string("targetname").map(str::to_string);
            let entity = match &target_name {
                Some(name) => self.entity_by_target_name(host, name),
                None => self.entity_by_class_name(host, declaration.get_string_or("classname", "")),
            };
            if let Some(entity) = entity {
                self.output_watches.register(entity);
            }
            EventKind::Output(OutputBinding {
                target_name,
                entity,
                output: declaration.get_string_or("output", "").to_string(),
            })
        } else if type_name.eq_ignore_ascii_case("EVENT_GAMEEVENT") {
            let event_name = declaration.get_string_or("eventname", "");
            if event_name.is_empty() {
                self.diagnostics.warn(
                    "MH_EVENT_NO_GAMEEVENT",
                    format!("Game event \"{}\" is missing \"eventname\".", declaration.name),
                );
            } else {
                host.listen_for_game_event(event_name);
            }
            EventKind::GameEvent(event_name.to_string())
        } else {
            self.diagnostics.warn(
                "MH_EVENT_TYPE_UNKNOWN",
                format!("Event \"{}\" has unknown type \"{}\".", declaration.name, type_name),
            );
            EventKind::Invalid
        }
    }

    /// Binds output events whose entity is gone or was never found, looking
    /// the entity up again by name.
    pub(super) fn resolve_output_events(&mut self, host: &mut dyn GameHost) {
        let mut resolved = Vec::new();
        for (index, event) in self.events.iter().enumerate() {
            let EventKind::Output(binding) = &event.kind else {
                continue;
            };
            if binding.entity.is_some_and(|entity| host.is_alive(entity)) {
                continue;
            }
            let Some(name) = &binding.target_name else {
                continue;
            };
            if let Some(entity) = self.entity_by_target_name(host, name) {
                resolved.push((index, binding.entity, entity));
            }
        }
        for (index, stale, entity) in resolved {
            if let Some(stale) = stale {
                self.output_watches.remove(stale);
            }
            if let Some(Event {
                kind: EventKind::Output(binding),
                name,
                ..
            }) = self.events.at_mut(index)
            {
                binding.entity = Some(entity);
                debug!(name = name.as_str(), entity = %entity, "bound output event");
            }
            self.output_watches.register(entity);
        }
    }

    /// Fires the event at `index`: queued when `delay` is positive, run now
    /// otherwise.
    pub(super) fn trigger_event(&mut self, host: &mut dyn GameHost, index: usize, delay: f32) {
        let Some(event) = self.events.at(index) else {
            return;
        };
        let Some(data) = event.data.clone() else {
            debug!(name = event.name.as_str(), "event has no data");
            return;
        };
        let data_kind = event.data_kind;
        if delay > 0.0 {
            debug!(name = event.name.as_str(), delay, "queued event");
            let fire_time = host.cur_time() + delay;
            self.events.schedule(index, fire_time);
            return;
        }

        debug!(name = event.name.as_str(), "triggered event");
        match data_kind {
            EventDataKind::Entities => self.run_entities(host, &data),
            EventDataKind::Precache => self.precache(host, &data),
        }

        let now = host.cur_time();
        if let Some(event) = self.events.at_mut(index) {
            event.triggered = true;
            if let EventKind::Timed(state) = &mut event.kind {
                if state.repeat {
                    state.next_fire_time = now + state.delay;
                }
            }
        }
    }

    /// Triggers an event by name. Returns `false` when no event has that name.
    pub fn trigger_event_by_name(&mut self, host: &mut dyn GameHost, name: &str, delay: f32) -> bool {
        match self.events.find(name) {
            Some(index) => {
                self.trigger_event(host, index, delay);
                true
            }
            None => {
                self.diagnostics.warn(
                    "MH_EVENT_MISSING",
                    format!("Event \"{}\" does not exist.", name),
                );
                false
            }
        }
    }

    /// Fires due timed events, then due entries of the delayed queue.
    pub(super) fn handle_events(&mut self, host: &mut dyn GameHost) {
        let now = host.cur_time();
        for index in 0..self.events.len() {
            if self.events.at(index).is_some_and(|event| event.is_due(now)) {
                self.trigger_event(host, index, 0.0);
            }
        }
        for entry in self.events.take_due(now) {
            self.trigger_event(host, entry.event, 0.0);
        }
    }

    /// Entry point for output notifications from the host.
    pub fn on_entity_output_fired(&mut self, host: &mut dyn GameHost, fired: &OutputFired) {
        if !self.output_watches.contains(fired.caller) {
            return;
        }
        let matching: Vec<usize> = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, event)| match &event.kind {
                EventKind::Output(binding) => {
                    binding.entity == Some(fired.caller)
                        && binding.output.eq_ignore_ascii_case(&fired.output)
                }
                _ => false,
            })
            .map(|(index, _)| index)
            .collect();
        for index in matching {
            self.trigger_event(host, index, fired.delay);
        }
    }

    /// Entry point for game events reported by the bus.
    pub fn on_game_event(&mut self, host: &mut dyn GameHost, name: &str) {
        let matching: Vec<usize> = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, event)| {
                matches!(&event.kind, EventKind::GameEvent(listened) if listened.eq_ignore_ascii_case(name))
            })
            .map(|(index, _)| index)
            .collect();
        for index in matching {
            self.trigger_event(host, index, 0.0);
        }
    }

    pub(super) fn fn_trigger(&mut self, host: &mut dyn GameHost, node: &KvNode) {
        let Some(raw) = node.get_string("event") else {
            self.diagnostics
                .warn("MH_EVENT_NAME_MISSING", "$trigger is missing \"event\".");
            return;
        };
        let name = self.vars.substitute(raw, &mut self.diagnostics);
        let delay = self
            .vars
            .substitute(node.get_string_or("delay", "0.0"), &mut self.diagnostics);
        self.trigger_event_by_name(host, &name, mh_core::parse_float_lenient(&delay));
    }

    /// Re-enables an event; a timed event is armed `delay` seconds from now.
    pub(super) fn fn_start(&mut self, host: &mut dyn GameHost, node: &KvNode) {
        let Some(raw) = node.get_string("event") else {
            self.diagnostics
                .warn("MH_EVENT_NAME_MISSING", "$start is missing \"event\".");
            return;
        };
        let name = self.vars.substitute(raw, &mut self.diagnostics);
        let delay = node
            .get_string("delay")
            .map(|raw| self.vars.substitute(raw, &mut self.diagnostics))
            .map(|text| mh_core::parse_float_lenient(&text));
        let now = host.cur_time();

        let Some(event) = self.events.get_mut(&name) else {
            self.diagnostics.warn(
                "MH_EVENT_MISSING",
                format!("Event \"{}\" does not exist.", name),
            );
            return;
        };
        event.stopped = false;
        if let EventKind::Timed(state) = &mut event.kind {
            if let Some(delay) = delay {
                state.delay = delay;
            }
            state.next_fire_time = now + state.delay;
        }
        debug!(name = name.as_str(), "started event");
    }

    pub(super) fn fn_stop(&mut self, node: &KvNode) {
        let Some(raw) = node.get_string("event") else {
            self.diagnostics
                .warn("MH_EVENT_NAME_MISSING", "$stop is missing \"event\".");
            return;
        };
        let name = self.vars.substitute(raw, &mut self.diagnostics);
        match self.events.get_mut(&name) {
            Some(event) => {
                event.triggered = false;
                event.stopped = true;
                debug!(name = name.as_str(), "stopped event");
            }
            None => self.diagnostics.warn(
                "MH_EVENT_MISSING",
                format!("Event \"{}\" does not exist.", name),
            ),
        }
    }
}
