//! Tenant identifier newtype

use serde::{Deserialize, Serialize};

/// Chat-server (guild) identifier. One playback engine exists per guild;
/// nothing is ever shared between two guilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildId(pub u64);

impl std::fmt::Display for GuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for GuildId {
    fn from(id: u64) -> Self {
        GuildId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_from() {
        let id = GuildId::from(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(id, GuildId(42));
    }
}
