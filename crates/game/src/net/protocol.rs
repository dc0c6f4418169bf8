use std::fmt;

use serde::{Deserialize, Serialize};

pub const MAX_FRAME_SIZE: usize = 1024;
pub const CHANNEL_ID: u8 = 0;
pub const DEFAULT_PORT: u16 = 25565;
pub const MAX_USERNAME_LEN: usize = 255;
pub const ITEM_COST: u32 = 25;

pub const CLIENT_VERSION: Version = Version::new(0, 1, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl Version {
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        CLIENT_VERSION
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Declares a `u8`-backed wire enum with lossless `TryFrom<u8>`.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value),+
        }

        impl TryFrom<u8> for $name {
            type Error = u8;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    other => Err(other),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value as u8
            }
        }
    };
}

wire_enum!(ClientOpcode {
    Disconnect = 0,
    PurchaseItem = 1,
    CreateAccount = 2,
    Login = 3,
});

wire_enum!(ServerOpcode {
    ClientDisconnected = 0,
    PurchasedItem = 1,
    CreatedAccount = 2,
    LoginResponse = 3,
});

wire_enum!(LoginResponseCode {
    LoginSuccess = 0,
    VersionMismatch = 1,
});

wire_enum!(PurchaseItemResponseCode {
    Purchased = 0,
    NotEnoughGold = 1,
});

wire_enum!(DisconnectReason {
    Disconnected = 0,
    Maintenance = 1,
    Restarting = 2,
    Kicked = 3,
    Banned = 4,
});

wire_enum!(ItemType {
    Hut = 0,
    Farm = 1,
});

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Disconnected => "Disconnected from the server",
            DisconnectReason::Maintenance => "The server is down for maintenance",
            DisconnectReason::Restarting => "The server is restarting",
            DisconnectReason::Kicked => "You were kicked from the server",
            DisconnectReason::Banned => "You are banned from the server",
        }
    }
}

impl ItemType {
    pub fn from_id(id: u16) -> Option<Self> {
        u8::try_from(id).ok().and_then(|id| Self::try_from(id).ok())
    }

    pub fn id(&self) -> u16 {
        *self as u16
    }

    pub fn cost(&self) -> u32 {
        ITEM_COST
    }

    /// Whether owning this item adds to a structure count on the player.
    pub fn counts_structures(&self) -> bool {
        match self {
            ItemType::Hut => true,
            ItemType::Farm => false,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::Hut => f.write_str("Hut"),
            ItemType::Farm => f.write_str("Farm"),
        }
    }
}

/// Display name for a raw item id, tolerating ids this build doesn't know.
pub fn item_name(item_id: u16) -> String {
    match ItemType::from_id(item_id) {
        Some(item) => item.to_string(),
        None => format!("item #{}", item_id),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Disconnect,
    PurchaseItem { item_id: u16 },
    Login { username: String, version: Version },
}

impl ClientMessage {
    pub fn opcode(&self) -> ClientOpcode {
        match self {
            ClientMessage::Disconnect => ClientOpcode::Disconnect,
            ClientMessage::PurchaseItem { .. } => ClientOpcode::PurchaseItem,
            ClientMessage::Login { .. } => ClientOpcode::Login,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginResponse {
    LoginSuccess {
        gold: u32,
        structures: Vec<(u16, u32)>,
    },
    VersionMismatch {
        server_version: Version,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchasedItem {
    pub code: PurchaseItemResponseCode,
    pub item_id: u16,
    pub gold: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    ClientDisconnected { reason: DisconnectReason },
    PurchasedItem(PurchasedItem),
    CreatedAccount,
    LoginResponse(LoginResponse),
}

impl ServerMessage {
    pub fn opcode(&self) -> ServerOpcode {
        match self {
            ServerMessage::ClientDisconnected { .. } => ServerOpcode::ClientDisconnected,
            ServerMessage::PurchasedItem(_) => ServerOpcode::PurchasedItem,
            ServerMessage::CreatedAccount => ServerOpcode::CreatedAccount,
            ServerMessage::LoginResponse(_) => ServerOpcode::LoginResponse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_numbering() {
        assert_eq!(u8::from(ClientOpcode::Login), 3);
        assert_eq!(ServerOpcode::try_from(1), Ok(ServerOpcode::PurchasedItem));
        assert_eq!(ServerOpcode::try_from(9), Err(9));
    }

    #[test]
    fn test_version_display() {
        assert_eq!(Version::new(1, 2, 3).to_string(), "1.2.3");
        assert_eq!(CLIENT_VERSION.to_string(), "0.1.0");
    }

    #[test]
    fn test_item_catalog() {
        assert!(ItemType::Hut.counts_structures());
        assert!(!ItemType::Farm.counts_structures());
        assert_eq!(ItemType::from_id(1), Some(ItemType::Farm));
        assert_eq!(ItemType::from_id(300), None);
        assert_eq!(item_name(0), "Hut");
        assert_eq!(item_name(42), "item #42");
    }
}
