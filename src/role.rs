use std::fmt;
use std::str::FromStr;

/// A Drive permission role.
///
/// Drive speaks in API names (`writer`), people editing a sheet speak in the
/// names the Drive sharing dialog shows (`Editor`). Both directions live here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Reader,
    Commenter,
    Writer,
    FileOrganizer,
    Organizer,
    Owner,
}

const ALL: [Role; 6] = [
    Role::Reader,
    Role::Commenter,
    Role::Writer,
    Role::FileOrganizer,
    Role::Organizer,
    Role::Owner,
];

impl Role {
    pub fn api_name(self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Commenter => "commenter",
            Role::Writer => "writer",
            Role::FileOrganizer => "fileOrganizer",
            Role::Organizer => "organizer",
            Role::Owner => "owner",
        }
    }

    pub fn ui_name(self) -> &'static str {
        match self {
            Role::Reader => "Viewer",
            Role::Commenter => "Commenter",
            Role::Writer => "Editor",
            Role::FileOrganizer => "File Organizer",
            Role::Organizer => "Organizer",
            Role::Owner => "Owner",
        }
    }

    pub fn from_api(name: &str) -> Option<Self> {
        ALL.into_iter().find(|role| role.api_name() == name)
    }

    /// Parse a sheet value. Case and surrounding whitespace are ignored.
    pub fn from_ui(name: &str) -> Option<Self> {
        let name = name.trim();
        ALL.into_iter()
            .find(|role| role.ui_name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ui_name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Accepts either naming scheme.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::from_ui(s)
            .or_else(|| Role::from_api(s.trim()))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ui_names_are_case_insensitive() {
        assert_eq!(Role::from_ui("editor"), Some(Role::Writer));
        assert_eq!(Role::from_ui("  VIEWER "), Some(Role::Reader));
        assert_eq!(Role::from_ui("file organizer"), Some(Role::FileOrganizer));
        assert_eq!(Role::from_ui("writer"), None);
    }

    #[test]
    fn api_names_round_trip() {
        for role in ALL {
            assert_eq!(Role::from_api(role.api_name()), Some(role));
        }
        assert_eq!(Role::from_api("Writer"), None);
    }

    #[test]
    fn from_str_accepts_both_schemes() {
        assert_eq!("Editor".parse::<Role>().unwrap(), Role::Writer);
        assert_eq!("fileOrganizer".parse::<Role>().unwrap(), Role::FileOrganizer);
        assert!("admin".parse::<Role>().is_err());
    }
}
