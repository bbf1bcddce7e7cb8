use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Lifecycle stage a dedicated server reports to the pool.
///
/// No transition table is enforced; the pool accepts any value at any time.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum Status {
    #[default]
    Unknown,
    /// Server initializing
    Initializing,
    /// Server ready to accept a game
    Ready,
    /// Game in progress
    InProgress,
    /// Game complete
    Complete,
}

/// A named cluster of players within a team.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Group {
    pub group_id: String,
    pub player_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Team {
    pub team_id: String,
    pub groups: Vec<Group>,
}

impl Team {
    /// The team's players, i.e. the players of all of its groups in group
    /// order.
    pub fn player_ids(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|g| g.player_ids.iter().map(String::as_str))
    }
}

/// One session assignment produced by the pool.
///
/// `T` carries game-specific settings chosen by the integrating
/// application; the protocol itself never looks inside it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GameSessionConfiguration<T> {
    pub is_public: bool,
    pub can_restart: bool,
    pub host_user_id: String,
    pub teams: Vec<Team>,
    // Flat roster. May repeat players already listed through team groups.
    pub player_ids: Vec<String>,
    pub parameters: T,
}

/// Full payload delivered to a server when a session is assigned to it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GameSessionStartupParameters<T> {
    /// Token players use to connect to this server once the session is up.
    pub game_session_connection_token: String,
    pub config: GameSessionConfiguration<T>,
}

impl<T: Serialize> GameSessionStartupParameters<T> {
    /// Encodes the assignment as the opaque payload carried on the wire.
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }
}

impl<T: DeserializeOwned> GameSessionStartupParameters<T> {
    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
