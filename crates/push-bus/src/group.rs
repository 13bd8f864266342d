use std::fmt;
use std::str::FromStr;

/// Addressable subscriber groups. `Session` is a per-connection singleton
/// group keyed by an opaque session id issued by the collaborator that
/// authenticates connections.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Group {
    All,
    Authenticated,
    Admin,
    Guest,
    Session(String),
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::All => write!(f, "all"),
            Group::Authenticated => write!(f, "authenticated"),
            Group::Admin => write!(f, "admin"),
            Group::Guest => write!(f, "guest"),
            Group::Session(id) => write!(f, "session:{id}"),
        }
    }
}

impl FromStr for Group {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Group::All),
            "authenticated" => Ok(Group::Authenticated),
            "admin" => Ok(Group::Admin),
            "guest" => Ok(Group::Guest),
            other => other
                .strip_prefix("session:")
                .map(|id| Group::Session(id.to_string()))
                .ok_or(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_roundtrip_for_every_named_group() {
        for g in [Group::All, Group::Authenticated, Group::Admin, Group::Guest] {
            let s = g.to_string();
            assert_eq!(s.parse::<Group>().unwrap(), g);
        }
    }

    #[test]
    fn session_group_roundtrips() {
        let g = Group::Session("abc123".to_string());
        assert_eq!(g.to_string(), "session:abc123");
        assert_eq!("session:abc123".parse::<Group>().unwrap(), g);
    }

    #[test]
    fn unrecognized_group_fails_to_parse() {
        assert!("nonsense".parse::<Group>().is_err());
    }
}
