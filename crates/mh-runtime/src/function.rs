/// The closed set of `$` directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    If,
    Set,
    Increment,
    Decrement,
    Rand,
    Console,
    Fire,
    Edit,
    EditAll,
    Modify,
    Filter,
    Trigger,
    Start,
    Stop,
    Respawn,
    Remove,
    RemoveAll,
    RemoveConnections,
    GetPos,
    SetPos,
    GetAng,
    SetAng,
    EditField,
    PlaySound,
    Script,
}

const FUNCTION_NAMES: [(&str, FunctionKind); 25] = [
    ("$if", FunctionKind::If),
    ("$set", FunctionKind::Set),
    ("$increment", FunctionKind::Increment),
    ("$decrement", FunctionKind::Decrement),
    ("$rand", FunctionKind::Rand),
    ("$console", FunctionKind::Console),
    ("$fire", FunctionKind::Fire),
    ("$edit", FunctionKind::Edit),
    ("$edit_all", FunctionKind::EditAll),
    ("$modify", FunctionKind::Modify),
    ("$filter", FunctionKind::Filter),
    ("$trigger", FunctionKind::Trigger),
    ("$start", FunctionKind::Start),
    ("$stop", FunctionKind::Stop),
    ("$respawn", FunctionKind::Respawn),
    ("$remove", FunctionKind::Remove),
    ("$remove_all", FunctionKind::RemoveAll),
    ("$remove_connections", FunctionKind::RemoveConnections),
    ("$getpos", FunctionKind::GetPos),
    ("$setpos", FunctionKind::SetPos),
    ("$getang", FunctionKind::GetAng),
    ("$setang", FunctionKind::SetAng),
    ("$edit_field", FunctionKind::EditField),
    ("$playsound", FunctionKind::PlaySound),
    ("$script", FunctionKind::Script),
];

pub const FUNCTION_SIGIL: char = '$';

impl FunctionKind {
    pub fn from_name(name: &str) -> Option<Self> {
        FUNCTION_NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, kind)| *kind)
    }

    pub fn name(self) -> &'static str {
        FUNCTION_NAMES
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(name, _)| *name)
            .unwrap_or("$unknown")
    }

    pub fn all() -> impl Iterator<Item = FunctionKind> {
        FUNCTION_NAMES.iter().map(|(_, kind)| *kind)
    }

    /// Directives that do nothing before entities spawn.
    pub fn is_post_only(self) -> bool {
        matches!(
            self,
            Self::Console
                | Self::Fire
                | Self::Trigger
                | Self::Start
                | Self::Stop
                | Self::Respawn
                | Self::RemoveConnections
                | Self::GetPos
                | Self::SetPos
                | Self::GetAng
                | Self::SetAng
                | Self::EditField
                | Self::PlaySound
                | Self::Script
        )
    }
}

pub fn is_function_name(name: &str) -> bool {
    name.starts_with(FUNCTION_SIGIL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for kind in FunctionKind::all() {
            assert_eq!(FunctionKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(FunctionKind::all().count(), 25);
    }

    #[test]
    fn lookup_is_exact() {
        assert_eq!(FunctionKind::from_name("$edit_all"), Some(FunctionKind::EditAll));
        assert_eq!(FunctionKind::from_name("$EDIT"), None);
        assert_eq!(FunctionKind::from_name("edit"), None);
        assert!(is_function_name("$whatever"));
        assert!(!is_function_name("prop_dynamic"));
    }
}
