//! Packet catalogue.
//!
//! Every packet is a payload struct wrapped in one [`Packet`] variant. The
//! `packets!` table below assigns each variant its wire tag and direction and
//! generates the per-type encode/decode dispatch used by the codec.

use bincode::Options;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::types::{Direction, EntityId, MapInstanceKey, Position, StatType, Vital};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketDirection {
    ClientToServer,
    ServerToClient,
}

// ============================================
// Shared payload parts
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatChannel {
    /// Only the player running the event
    #[default]
    Player,
    /// Everyone observing the map
    Local,
    /// Every connected player
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementUpdate {
    pub entity: EntityId,
    pub position: Position,
    pub direction: Direction,
    /// Server overrode a client-predicted step.
    pub correction: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimationAnchor {
    Entity(EntityId),
    Tile(Position),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationUpdate {
    pub animation_id: Uuid,
    pub anchor: AnimationAnchor,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageColor {
    Damage,
    Heal,
    Info,
}

/// Floating text over a tile (damage numbers, heals).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMessage {
    pub position: Position,
    pub text: String,
    pub color: MessageColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: Uuid,
    pub item_id: Uuid,
    pub quantity: u32,
    pub position: Position,
}

// ============================================
// Client -> server
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinGame {
    pub player_id: EntityId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerMove {
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInteract {
    pub event_id: Uuid,
}

/// Reply to an event dialog: 0 acknowledges text, 1..=n picks an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResponse {
    pub event_id: Uuid,
    pub response: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickUpItems;

// ============================================
// Server -> client
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong {
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinAccepted {
    pub player_id: EntityId,
    pub server_time: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapChanged {
    pub map: MapInstanceKey,
    pub position: Position,
    pub direction: Direction,
}

/// Everything batched for one observer in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapBatch {
    pub movements: Vec<MovementUpdate>,
    pub animations: Vec<AnimationUpdate>,
    pub action_messages: Vec<ActionMessage>,
}

impl MapBatch {
    pub fn is_empty(&self) -> bool {
        self.movements.is_empty() && self.animations.is_empty() && self.action_messages.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpawned {
    pub entity: EntityId,
    pub name: String,
    pub is_player: bool,
    pub position: Position,
    pub direction: Direction,
    pub level: i32,
    pub vitals: [i32; Vital::COUNT],
    pub max_vitals: [i32; Vital::COUNT],
    pub passable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityLeft {
    pub entity: EntityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStats {
    pub entity: EntityId,
    pub stats: [i32; StatType::COUNT],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityVitals {
    pub entity: EntityId,
    pub vitals: [i32; Vital::COUNT],
    pub max_vitals: [i32; Vital::COUNT],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDialog {
    pub event_id: Uuid,
    pub text: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSpawned {
    pub event_id: Uuid,
    pub position: Position,
    pub direction: Direction,
    /// `None` hides the event (no page applies).
    pub page: Option<u32>,
    pub passable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub channel: ChatChannel,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapItemUpdate {
    pub added: Vec<ItemSummary>,
    pub removed: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectileRemoved {
    pub projectile_id: Uuid,
}

macro_rules! packets {
    ($( $tag:literal => $variant:ident($payload:ty), $dir:ident; )*) => {
        #[derive(Debug, Clone, PartialEq)]
        pub enum Packet {
            $( $variant($payload), )*
        }

        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum PacketType {
            $( $variant, )*
        }

        impl PacketType {
            pub const ALL: &'static [PacketType] = &[ $( PacketType::$variant, )* ];

            pub fn tag(self) -> u16 {
                match self {
                    $( PacketType::$variant => $tag, )*
                }
            }

            pub fn from_tag(tag: u16) -> Option<Self> {
                match tag {
                    $( $tag => Some(PacketType::$variant), )*
                    _ => None,
                }
            }

            pub fn direction(self) -> PacketDirection {
                match self {
                    $( PacketType::$variant => PacketDirection::$dir, )*
                }
            }
        }

        impl Packet {
            pub fn packet_type(&self) -> PacketType {
                match self {
                    $( Packet::$variant(_) => PacketType::$variant, )*
                }
            }

            pub(crate) fn encode_payload<O: Options>(&self, options: O) -> bincode::Result<Vec<u8>> {
                match self {
                    $( Packet::$variant(payload) => options.serialize(payload), )*
                }
            }

            pub(crate) fn decode_payload<O: Options>(
                packet_type: PacketType,
                bytes: &[u8],
                options: O,
            ) -> bincode::Result<Packet> {
                match packet_type {
                    $( PacketType::$variant => options.deserialize::<$payload>(bytes).map(Packet::$variant), )*
                }
            }
        }

        $(
            impl From<$payload> for Packet {
                fn from(payload: $payload) -> Self {
                    Packet::$variant(payload)
                }
            }
        )*
    };
}

packets! {
    0x0001 => Ping(Ping), ClientToServer;
    0x0002 => JoinGame(JoinGame), ClientToServer;
    0x0003 => PlayerMove(PlayerMove), ClientToServer;
    0x0004 => EventInteract(EventInteract), ClientToServer;
    0x0005 => EventResponse(EventResponse), ClientToServer;
    0x0006 => PickUpItems(PickUpItems), ClientToServer;

    0x0101 => Pong(Pong), ServerToClient;
    0x0102 => JoinAccepted(JoinAccepted), ServerToClient;
    0x0103 => MapChanged(MapChanged), ServerToClient;
    0x0104 => MapBatch(MapBatch), ServerToClient;
    0x0105 => EntitySpawned(EntitySpawned), ServerToClient;
    0x0106 => EntityLeft(EntityLeft), ServerToClient;
    0x0107 => EntityStats(EntityStats), ServerToClient;
    0x0108 => EntityVitals(EntityVitals), ServerToClient;
    0x0109 => EventDialog(EventDialog), ServerToClient;
    0x010A => EventSpawned(EventSpawned), ServerToClient;
    0x010B => ChatMessage(ChatMessage), ServerToClient;
    0x010C => MapItemUpdate(MapItemUpdate), ServerToClient;
    0x010D => ProjectileRemoved(ProjectileRemoved), ServerToClient;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tags_are_unique_and_reversible() {
        let mut seen = HashSet::new();
        for ty in PacketType::ALL {
            assert!(seen.insert(ty.tag()), "duplicate tag {:#06x}", ty.tag());
            assert_eq!(PacketType::from_tag(ty.tag()), Some(*ty));
        }
        assert_eq!(PacketType::from_tag(0xFFFF), None);
    }

    #[test]
    fn test_directions() {
        assert_eq!(PacketType::JoinGame.direction(), PacketDirection::ClientToServer);
        assert_eq!(PacketType::MapBatch.direction(), PacketDirection::ServerToClient);
    }

    #[test]
    fn test_from_payload() {
        let packet: Packet = Ping { timestamp: 5 }.into();
        assert_eq!(packet.packet_type(), PacketType::Ping);
        assert!(MapBatch::default().is_empty());
    }
}
