use std::rc::Rc;

use mh_core::EntityHandle;
use mh_parser::KvNode;

/// Which entry point runs an event's sub-tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventDataKind {
    #[default]
    Entities,
    Precache,
}

impl EventDataKind {
    pub fn from_label_part(part: &str) -> Option<Self> {
        if part.eq_ignore_ascii_case("entities") {
            Some(Self::Entities)
        } else if part.eq_ignore_ascii_case("precache") {
            Some(Self::Precache)
        } else {
            None
        }
    }
}

/// Splits a top-level block name into its event name and data kind.
///
/// `name:entities`, `name:precache` and the reversed `precache:name` forms
/// are recognized; anything else is a bare label for entities data.
pub fn parse_label(label: &str) -> (&str, EventDataKind) {
    if let Some((head, tail)) = label.split_once(':') {
        if let Some(kind) = EventDataKind::from_label_part(tail) {
            return (head, kind);
        }
        if let Some(kind) = EventDataKind::from_label_part(head) {
            return (tail, kind);
        }
    }
    (label, EventDataKind::Entities)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimedState {
    pub delay: f32,
    pub repeat: bool,
    pub next_fire_time: f32,
}

/// Where an output watch points: a resolved handle, the name used to find it
/// again, and the output to listen for.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputBinding {
    pub target_name: Option<String>,
    pub entity: Option<EntityHandle>,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Unknown `type`; only fires when triggered by name.
    Invalid,
    Trigger,
    Timed(TimedState),
    Output(OutputBinding),
    GameEvent(String),
}

impl EventKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Invalid => "EVENT_INVALID",
            Self::Trigger => "EVENT_TRIGGER",
            Self::Timed(_) => "EVENT_TIMED",
            Self::Output(_) => "EVENT_OUTPUT",
            Self::GameEvent(_) => "EVENT_GAMEEVENT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub kind: EventKind,
    pub triggered: bool,
    pub stopped: bool,
    pub data: Option<Rc<KvNode>>,
    pub data_kind: EventDataKind,
}

impl Event {
    pub fn new(name: impl Into<String>, kind: EventKind) -> Self {
        Self {
            name: name.into(),
            kind,
            triggered: false,
            stopped: false,
            data: None,
            data_kind: EventDataKind::Entities,
        }
    }

    pub fn timed(&self) -> Option<&TimedState> {
        match &self.kind {
            EventKind::Timed(state) => Some(state),
            _ => None,
        }
    }

    /// A timed event is due when it is neither stopped nor spent and its fire
    /// time has come.
    pub fn is_due(&self, now: f32) -> bool {
        let Some(state) = self.timed() else {
            return false;
        };
        if self.stopped || (self.triggered && !state.repeat) {
            return false;
        }
        state.next_fire_time <= now
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayedFire {
    pub event: usize,
    pub fire_time: f32,
}

/// Events in registration order plus the delayed-fire queue.
///
/// Queue entries refer to events by index; both are cleared together.
#[derive(Debug, Default)]
pub struct EventRegistry {
    events: Vec<Event>,
    queue: Vec<DelayedFire>,
}

impl EventRegistry {
    pub fn find(&self, name: &str) -> Option<usize> {
        self.events
            .iter()
            .position(|event| event.name.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, name: &str) -> Option<&Event> {
        self.find(name).map(|index| &self.events[index])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Event> {
        let index = self.find(name)?;
        self.events.get_mut(index)
    }

    pub fn at(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    pub fn at_mut(&mut self, index: usize) -> Option<&mut Event> {
        self.events.get_mut(index)
    }

    /// Adds an event, replacing one with the same name in place.
    pub fn insert(&mut self, event: Event) -> usize {
        match self.find(&event.name) {
            Some(index) => {
                self.events[index] = event;
                index
            }
            None => {
                self.events.push(event);
                self.events.len() - 1
            }
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Event> {
        self.events.iter_mut()
    }

    pub fn schedule(&mut self, event: usize, fire_time: f32) {
        self.queue.push(DelayedFire { event, fire_time });
    }

    pub fn queued(&self) -> &[DelayedFire] {
        &self.queue
    }

    /// Removes and returns due queue entries in queue order.
    pub fn take_due(&mut self, now: f32) -> Vec<DelayedFire> {
        let (due, pending): (Vec<_>, Vec<_>) = self
            .queue
            .drain(..)
            .partition(|entry| entry.fire_time <= now);
        self.queue = pending;
        due
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.queue.clear();
    }
}

/// Entities whose outputs are forwarded to the engine.
#[derive(Debug, Default, Clone)]
pub struct OutputWatchTable {
    entities: Vec<EntityHandle>,
}

impl OutputWatchTable {
    pub fn register(&mut self, entity: EntityHandle) {
        if !self.contains(entity) {
            self.entities.push(entity);
        }
    }

    pub fn remove(&mut self, entity: EntityHandle) {
        self.entities.retain(|watched| *watched != entity);
    }

    pub fn remove_all(&mut self) {
        self.entities.clear();
    }

    pub fn contains(&self, entity: EntityHandle) -> bool {
        self.entities.contains(&entity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
