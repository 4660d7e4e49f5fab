use serde::{Deserialize, Serialize};
use std::fmt;

pub const ARENA_WIDTH: i32 = 1280;
pub const ARENA_HEIGHT: i32 = 680;
pub const PLAYER_SIZE: i32 = 40;
pub const PICKUP_SIZE: i32 = 40;
pub const MAX_HEALTH: i32 = 100;
pub const MAX_PLAYERS: usize = 2;
pub const DEFAULT_PORT: u16 = 5000;
/// Longest client line accepted, in bytes, not counting the newline.
pub const MAX_LINE_LEN: usize = 256;

/// Keys a client can hold down. Anything else a client reports is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputKey {
    Up,
    Left,
    Down,
    Right,
    Fire,
}

impl InputKey {
    /// Maps a raw key symbol (`w`, `a`, `s`, `d`, ` `) to a key.
    ///
    /// Letters are matched case-insensitively so a held shift key does not
    /// swallow movement. `space` is accepted as a spelled-out fire key.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        if symbol == " " || symbol.eq_ignore_ascii_case("space") {
            return Some(InputKey::Fire);
        }

        match symbol.to_ascii_lowercase().as_str() {
            "w" => Some(InputKey::Up),
            "a" => Some(InputKey::Left),
            "s" => Some(InputKey::Down),
            "d" => Some(InputKey::Right),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            InputKey::Up => "w",
            InputKey::Left => "a",
            InputKey::Down => "s",
            InputKey::Right => "d",
            InputKey::Fire => " ",
        }
    }
}

/// One line sent by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    Press(InputKey),
    Release(InputKey),
    Restart,
}

impl ClientCommand {
    /// Parses a single line without its trailing newline.
    ///
    /// Returns `None` for anything unrecognized; callers drop those lines.
    /// The symbol is everything after the first space, so `"PRESS  "` is a
    /// press of the space bar.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.trim() == "RESTART" {
            return Some(ClientCommand::Restart);
        }

        if let Some(symbol) = line.strip_prefix("PRESS ") {
            return InputKey::from_symbol(symbol).map(ClientCommand::Press);
        }

        if let Some(symbol) = line.strip_prefix("RELEASE ") {
            return InputKey::from_symbol(symbol).map(ClientCommand::Release);
        }

        None
    }
}

impl fmt::Display for ClientCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientCommand::Press(key) => write!(f, "PRESS {}", key.symbol()),
            ClientCommand::Release(key) => write!(f, "RELEASE {}", key.symbol()),
            ClientCommand::Restart => write!(f, "RESTART"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Yellow,
    Blue,
    Green,
    Red,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectileView {
    pub x: i32,
    pub y: i32,
    pub direction: i32,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub health: i32,
    pub player_color: Color,
    pub projectile_color: Color,
    pub projectiles: Vec<ProjectileView>,
}

/// Every player with its projectiles, as of the end of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub players: Vec<PlayerView>,
}

impl WorldSnapshot {
    pub fn player(&self, id: u32) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.id == id)
    }
}

/// Pickup presence with an explicit tag, so "absent" can never be mistaken
/// for a pickup lying at some coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PickupStatus {
    Present { x: i32, y: i32 },
    Absent,
}

/// Messages the server writes to clients, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    // Identity assigned on admission; always the first line a client sees.
    Welcome { player_id: u32 },
    Snapshot(WorldSnapshot),
    Pickup(PickupStatus),
    GameOver { winner: u32 },
    Reset,
    // Sent to a connection that cannot be admitted, right before closing it.
    Rejected { reason: String },
    Shutdown { reason: String },
}

impl ServerMessage {
    /// Encodes the message as a single line, without the trailing newline.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim_end())
    }

    /// Snapshots are superseded by the next tick, so a lagging client can
    /// miss one. Every other message must arrive.
    pub fn is_droppable(&self) -> bool {
        matches!(self, ServerMessage::Snapshot(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> WorldSnapshot {
        WorldSnapshot {
            tick: 7,
            players: vec![PlayerView {
                id: 0,
                x: 50,
                y: 340,
                health: MAX_HEALTH,
                player_color: Color::Yellow,
                projectile_color: Color::Blue,
                projectiles: vec![ProjectileView {
                    x: 74,
                    y: 360,
                    direction: 1,
                    color: Color::Blue,
                }],
            }],
        }
    }

    #[test]
    fn test_parse_press_and_release() {
        assert_eq!(
            ClientCommand::parse("PRESS w"),
            Some(ClientCommand::Press(InputKey::Up))
        );
        assert_eq!(
            ClientCommand::parse("RELEASE d"),
            Some(ClientCommand::Release(InputKey::Right))
        );
        assert_eq!(
            ClientCommand::parse("PRESS A"),
            Some(ClientCommand::Press(InputKey::Left))
        );
    }

    #[test]
    fn test_parse_space_symbol_is_fire() {
        assert_eq!(
            ClientCommand::parse("PRESS  "),
            Some(ClientCommand::Press(InputKey::Fire))
        );
        assert_eq!(
            ClientCommand::parse("RELEASE space"),
            Some(ClientCommand::Release(InputKey::Fire))
        );
    }

    #[test]
    fn test_parse_tolerates_carriage_return() {
        assert_eq!(
            ClientCommand::parse("PRESS s\r"),
            Some(ClientCommand::Press(InputKey::Down))
        );
        assert_eq!(ClientCommand::parse("RESTART\r"), Some(ClientCommand::Restart));
    }

    #[test]
    fn test_parse_rejects_unknown_lines() {
        for line in ["", "PRESS", "PRESS q", "press w", "JUMP", "RESTART NOW", "RELEASE "] {
            assert_eq!(ClientCommand::parse(line), None, "line {:?}", line);
        }
    }

    #[test]
    fn test_command_display_parses_back() {
        for command in [
            ClientCommand::Press(InputKey::Fire),
            ClientCommand::Release(InputKey::Up),
            ClientCommand::Restart,
        ] {
            assert_eq!(ClientCommand::parse(&command.to_string()), Some(command));
        }
    }

    #[test]
    fn test_pickup_absent_has_no_coordinates() {
        let absent = ServerMessage::Pickup(PickupStatus::Absent).encode().unwrap();
        assert_eq!(absent, r#"{"type":"Pickup","data":{"status":"absent"}}"#);

        let present = ServerMessage::Pickup(PickupStatus::Present { x: 0, y: 0 })
            .encode()
            .unwrap();
        assert_eq!(
            present,
            r#"{"type":"Pickup","data":{"status":"present","x":0,"y":0}}"#
        );
    }

    #[test]
    fn test_control_messages_are_tagged() {
        assert_eq!(ServerMessage::Reset.encode().unwrap(), r#"{"type":"Reset"}"#);
        assert_eq!(
            ServerMessage::GameOver { winner: 1 }.encode().unwrap(),
            r#"{"type":"GameOver","data":{"winner":1}}"#
        );

        let snapshot = ServerMessage::Snapshot(sample_snapshot()).encode().unwrap();
        assert!(snapshot.starts_with(r#"{"type":"Snapshot""#));
        assert!(!snapshot.contains('\n'));
    }

    #[test]
    fn test_snapshot_decodes_losslessly() {
        let message = ServerMessage::Snapshot(sample_snapshot());
        let line = message.encode().unwrap();
        let decoded = ServerMessage::decode(&format!("{}\n", line)).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_only_snapshots_are_droppable() {
        assert!(ServerMessage::Snapshot(sample_snapshot()).is_droppable());
        assert!(!ServerMessage::Reset.is_droppable());
        assert!(!ServerMessage::GameOver { winner: 0 }.is_droppable());
        assert!(!ServerMessage::Pickup(PickupStatus::Absent).is_droppable());
    }

    #[test]
    fn test_snapshot_player_lookup() {
        let snapshot = sample_snapshot();
        assert_eq!(snapshot.player(0).map(|p| p.x), Some(50));
        assert!(snapshot.player(1).is_none());
    }
}
