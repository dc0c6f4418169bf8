use crate::net::ItemType;

/// Work handed from the network thread to the application thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// The connection attempt or session timed out.
    NotifyUserOfTimeout,
    /// Feedback for the login screen.
    ServerResponseMessage(String),
    /// A line for the in-game terminal.
    LogMessage(String),
    LoadSceneForDisconnectTimeout,
    LoadMainScene,
    LoginSuccess,
    /// Authoritative player values from the server.
    UpdatePlayer(PlayerUpdate),
}

impl Instruction {
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::NotifyUserOfTimeout => "NotifyUserOfTimeout",
            Instruction::ServerResponseMessage(_) => "ServerResponseMessage",
            Instruction::LogMessage(_) => "LogMessage",
            Instruction::LoadSceneForDisconnectTimeout => "LoadSceneForDisconnectTimeout",
            Instruction::LoadMainScene => "LoadMainScene",
            Instruction::LoginSuccess => "LoginSuccess",
            Instruction::UpdatePlayer(_) => "UpdatePlayer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureChange {
    Set(u32),
    Increment,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerUpdate {
    pub gold: Option<u32>,
    pub structures: Vec<(ItemType, StructureChange)>,
}

impl PlayerUpdate {
    pub fn gold(gold: u32) -> Self {
        Self {
            gold: Some(gold),
            structures: Vec::new(),
        }
    }

    pub fn with_structure(mut self, item: ItemType, change: StructureChange) -> Self {
        self.structures.push((item, change));
        self
    }
}
