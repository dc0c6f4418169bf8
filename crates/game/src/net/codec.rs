//! Opcode-prefixed binary frames.
//!
//! Every frame is `[opcode: u8][fields...]`. Integers are little-endian,
//! strings are a 7-bit variable-length byte count followed by UTF-8.

use super::protocol::{
    ClientMessage, ClientOpcode, DisconnectReason, LoginResponse, LoginResponseCode,
    MAX_FRAME_SIZE, MAX_USERNAME_LEN, PurchaseItemResponseCode, PurchasedItem, ServerMessage,
    ServerOpcode, Version,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("frame ended after {read} of {needed} bytes")]
    UnexpectedEnd { needed: usize, read: usize },
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
    #[error("unknown sub-opcode {code} for {context}")]
    UnknownSubOpcode { context: &'static str, code: u8 },
    #[error("string is not valid UTF-8")]
    InvalidString,
    #[error("string of {0} bytes exceeds the field limit")]
    StringTooLong(usize),
    #[error("malformed length prefix")]
    InvalidLength,
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_SIZE} byte limit")]
    FrameTooLarge(usize),
    #[error("empty frame")]
    EmptyFrame,
}

#[derive(Debug, Default)]
pub struct PacketWriter {
    buffer: Vec<u8>,
}

impl PacketWriter {
    pub fn new(opcode: u8) -> Self {
        let mut buffer = Vec::with_capacity(32);
        buffer.push(opcode);
        Self { buffer }
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buffer.push(value);
        self
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_string(&mut self, value: &str) -> &mut Self {
        let mut len = value.len();
        loop {
            let byte = (len & 0x7f) as u8;
            len >>= 7;
            if len == 0 {
                self.buffer.push(byte);
                break;
            }
            self.buffer.push(byte | 0x80);
        }
        self.buffer.extend_from_slice(value.as_bytes());
        self
    }

    pub fn finish(self) -> Result<Vec<u8>, PacketError> {
        if self.buffer.len() > MAX_FRAME_SIZE {
            return Err(PacketError::FrameTooLarge(self.buffer.len()));
        }
        Ok(self.buffer)
    }
}

/// Sequential reader over one received frame.
pub struct PacketReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], PacketError> {
        if self.remaining() < needed {
            return Err(PacketError::UnexpectedEnd {
                needed,
                read: self.remaining(),
            });
        }
        let slice = &self.data[self.position..self.position + needed];
        self.position += needed;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, PacketError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, PacketError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, PacketError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_string(&mut self) -> Result<String, PacketError> {
        let mut len = 0usize;
        let mut shift = 0;
        loop {
            // A u32 length never needs more than five groups.
            if shift > 28 {
                return Err(PacketError::InvalidLength);
            }
            let byte = self.read_u8()?;
            len |= ((byte & 0x7f) as usize) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }

        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| PacketError::InvalidString)
    }

    fn read_version(&mut self) -> Result<Version, PacketError> {
        Ok(Version::new(
            self.read_u8()?,
            self.read_u8()?,
            self.read_u8()?,
        ))
    }
}

pub fn encode_client_message(message: &ClientMessage) -> Result<Vec<u8>, PacketError> {
    let mut writer = PacketWriter::new(message.opcode().into());

    match message {
        ClientMessage::Disconnect => {}
        ClientMessage::PurchaseItem { item_id } => {
            writer.write_u16(*item_id);
        }
        ClientMessage::Login { username, version } => {
            if username.len() > MAX_USERNAME_LEN {
                return Err(PacketError::StringTooLong(username.len()));
            }
            writer
                .write_string(username)
                .write_u8(version.major)
                .write_u8(version.minor)
                .write_u8(version.patch);
        }
    }

    writer.finish()
}

pub fn decode_client_message(frame: &[u8]) -> Result<ClientMessage, PacketError> {
    let mut reader = PacketReader::new(frame);
    let raw = reader.read_u8().map_err(|_| PacketError::EmptyFrame)?;
    let opcode = ClientOpcode::try_from(raw).map_err(PacketError::UnknownOpcode)?;

    match opcode {
        ClientOpcode::Disconnect => Ok(ClientMessage::Disconnect),
        ClientOpcode::PurchaseItem => Ok(ClientMessage::PurchaseItem {
            item_id: reader.read_u16()?,
        }),
        ClientOpcode::Login => {
            let username = reader.read_string()?;
            if username.len() > MAX_USERNAME_LEN {
                return Err(PacketError::StringTooLong(username.len()));
            }
            let version = reader.read_version()?;
            Ok(ClientMessage::Login { username, version })
        }
        ClientOpcode::CreateAccount => Err(PacketError::UnknownOpcode(raw)),
    }
}

pub fn encode_server_message(message: &ServerMessage) -> Result<Vec<u8>, PacketError> {
    let mut writer = PacketWriter::new(message.opcode().into());

    match message {
        ServerMessage::ClientDisconnected { reason } => {
            writer.write_u8((*reason).into());
        }
        ServerMessage::PurchasedItem(purchase) => {
            writer
                .write_u8(purchase.code.into())
                .write_u16(purchase.item_id)
                .write_u32(purchase.gold);
        }
        ServerMessage::CreatedAccount => {}
        ServerMessage::LoginResponse(LoginResponse::VersionMismatch { server_version }) => {
            writer
                .write_u8(LoginResponseCode::VersionMismatch.into())
                .write_u8(server_version.major)
                .write_u8(server_version.minor)
                .write_u8(server_version.patch);
        }
        ServerMessage::LoginResponse(LoginResponse::LoginSuccess { gold, structures }) => {
            let count = u8::try_from(structures.len())
                .map_err(|_| PacketError::FrameTooLarge(structures.len()))?;
            writer
                .write_u8(LoginResponseCode::LoginSuccess.into())
                .write_u32(*gold)
                .write_u8(count);
            for (item_id, amount) in structures {
                writer.write_u16(*item_id).write_u32(*amount);
            }
        }
    }

    writer.finish()
}

/// Reads the opcode byte and then the fields declared for it.
pub fn decode_server_message(frame: &[u8]) -> Result<ServerMessage, PacketError> {
    if frame.len() > MAX_FRAME_SIZE {
        return Err(PacketError::FrameTooLarge(frame.len()));
    }

    let mut reader = PacketReader::new(frame);
    let raw = reader.read_u8().map_err(|_| PacketError::EmptyFrame)?;
    let opcode = ServerOpcode::try_from(raw).map_err(PacketError::UnknownOpcode)?;
    decode_server_payload(&mut reader, opcode)
}

pub fn decode_server_payload(
    reader: &mut PacketReader<'_>,
    opcode: ServerOpcode,
) -> Result<ServerMessage, PacketError> {
    match opcode {
        ServerOpcode::ClientDisconnected => {
            let code = reader.read_u8()?;
            let reason = DisconnectReason::try_from(code).map_err(|code| {
                PacketError::UnknownSubOpcode {
                    context: "ClientDisconnected",
                    code,
                }
            })?;
            Ok(ServerMessage::ClientDisconnected { reason })
        }
        ServerOpcode::PurchasedItem => {
            let code = reader.read_u8()?;
            let code = PurchaseItemResponseCode::try_from(code).map_err(|code| {
                PacketError::UnknownSubOpcode {
                    context: "PurchasedItem",
                    code,
                }
            })?;
            Ok(ServerMessage::PurchasedItem(PurchasedItem {
                code,
                item_id: reader.read_u16()?,
                gold: reader.read_u32()?,
            }))
        }
        ServerOpcode::CreatedAccount => Ok(ServerMessage::CreatedAccount),
        ServerOpcode::LoginResponse => {
            let code = reader.read_u8()?;
            let code = LoginResponseCode::try_from(code).map_err(|code| {
                PacketError::UnknownSubOpcode {
                    context: "LoginResponse",
                    code,
                }
            })?;
            let response = match code {
                LoginResponseCode::VersionMismatch => LoginResponse::VersionMismatch {
                    server_version: reader.read_version()?,
                },
                LoginResponseCode::LoginSuccess => {
                    let gold = reader.read_u32()?;
                    let count = reader.read_u8()? as usize;
                    let mut structures = Vec::with_capacity(count);
                    for _ in 0..count {
                        structures.push((reader.read_u16()?, reader.read_u32()?));
                    }
                    LoginResponse::LoginSuccess { gold, structures }
                }
            };
            Ok(ServerMessage::LoginResponse(response))
        }
    }
}
