//! The fixed table of message commands

use crate::error::{Result, WireError};
use serde::Serialize;
use std::fmt;

/// Width of the NUL-padded command name field
pub const COMMAND_SIZE: usize = 12;

/// Every command this network speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Block,
    GetBlocks,
    Inv,
    GetData,
    GetHeaders,
    Headers,
    MerkleBlock,
    Mempool,
    Tx,
    NotFound,
    Addr,
    GetAddr,
    Ping,
    Pong,
    SendHeaders,
    Verack,
    Version,
}

impl Command {
    pub const ALL: [Command; 17] = [
        Command::Block,
        Command::GetBlocks,
        Command::Inv,
        Command::GetData,
        Command::GetHeaders,
        Command::Headers,
        Command::MerkleBlock,
        Command::Mempool,
        Command::Tx,
        Command::NotFound,
        Command::Addr,
        Command::GetAddr,
        Command::Ping,
        Command::Pong,
        Command::SendHeaders,
        Command::Verack,
        Command::Version,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Command::Block => "block",
            Command::GetBlocks => "getblocks",
            Command::Inv => "inv",
            Command::GetData => "getdata",
            Command::GetHeaders => "getheaders",
            Command::Headers => "headers",
            Command::MerkleBlock => "merkleblock",
            Command::Mempool => "mempool",
            Command::Tx => "tx",
            Command::NotFound => "notfound",
            Command::Addr => "addr",
            Command::GetAddr => "getaddr",
            Command::Ping => "ping",
            Command::Pong => "pong",
            Command::SendHeaders => "sendheaders",
            Command::Verack => "verack",
            Command::Version => "version",
        }
    }

    /// Commands whose payload is always empty
    pub fn has_empty_payload(&self) -> bool {
        matches!(
            self,
            Command::Verack | Command::GetAddr | Command::Mempool | Command::SendHeaders
        )
    }

    /// The NUL-padded 12-byte wire name
    pub fn to_bytes(&self) -> [u8; COMMAND_SIZE] {
        let mut out = [0u8; COMMAND_SIZE];
        let name = self.name().as_bytes();
        out[..name.len()].copy_from_slice(name);
        out
    }

    /// Look up a wire name. Everything after the first NUL must be NUL.
    pub fn from_bytes(raw: &[u8; COMMAND_SIZE]) -> Result<Self> {
        let end = raw.iter().position(|b| *b == 0).unwrap_or(COMMAND_SIZE);
        let (name, padding) = raw.split_at(end);
        let shown = String::from_utf8_lossy(name).into_owned();

        if padding.iter().any(|b| *b != 0) {
            return Err(WireError::UnknownCommand(
                String::from_utf8_lossy(raw).into_owned(),
            ));
        }

        Self::ALL
            .iter()
            .find(|cmd| cmd.name().as_bytes() == name)
            .copied()
            .ok_or_else(|| WireError::UnknownCommand(shown))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_name_roundtrips() {
        for cmd in Command::ALL {
            let raw = cmd.to_bytes();
            assert!(cmd.name().len() <= COMMAND_SIZE);
            assert_eq!(Command::from_bytes(&raw).unwrap(), cmd);
        }
    }

    #[test]
    fn test_padding() {
        assert_eq!(&Command::Ping.to_bytes(), b"ping\0\0\0\0\0\0\0\0");
        assert_eq!(&Command::MerkleBlock.to_bytes(), b"merkleblock\0");
    }

    #[test]
    fn test_unknown_command() {
        let err = Command::from_bytes(b"unknown_cmd\0").unwrap_err();
        assert!(matches!(err, WireError::UnknownCommand(ref name) if name == "unknown_cmd"));

        // a known name followed by garbage is not that command
        assert!(matches!(
            Command::from_bytes(b"ping\0\0\0\0\0\0\0x"),
            Err(WireError::UnknownCommand(_))
        ));
        assert!(matches!(
            Command::from_bytes(b"PING\0\0\0\0\0\0\0\0"),
            Err(WireError::UnknownCommand(_))
        ));
    }
}
