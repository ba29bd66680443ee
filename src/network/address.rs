//! Peer addresses and service flags
//!
//! Addresses are IPv4 only and travel as IPv4-mapped IPv6
//! (`::ffff:a.b.c.d`). The port is the one big-endian field of the
//! protocol.

use crate::codec::{take_u32, Encodable, Field, Layout};
use crate::error::{Result, WireError};
use bitflags::bitflags;
use bytes::BufMut;
use serde::Serializer;
use std::net::{Ipv4Addr, SocketAddrV4};

bitflags! {
    /// Roles a node advertises
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ServiceFlags: u64 {
        /// Issues audit missions (the top node)
        const ISSUE_TASKS = 0b01;
        /// Accepts audit missions (worker nodes)
        const ACCEPT_TASKS = 0b10;
    }
}

impl serde::Serialize for ServiceFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.bits())
    }
}

const MAPPED_PREFIX: [u8; 12] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF];

/// services:u64 ip[16] port:u16be
pub const NETWORK_ADDRESS_LAYOUT: Layout =
    Layout::from_static(&[Field::U64, Field::Bytes(16), Field::U16_BE]);

/// Encode an IPv4 address in its mapped IPv6 form
pub fn map_ipv4(ip: Ipv4Addr) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..12].copy_from_slice(&MAPPED_PREFIX);
    out[12..].copy_from_slice(&ip.octets());
    out
}

/// Decode a mapped IPv6 address back to IPv4
pub fn unmap_ipv4(raw: &[u8; 16]) -> Result<Ipv4Addr> {
    if raw[..12] != MAPPED_PREFIX {
        return Err(WireError::InvalidAddress(format!(
            "{} is not an IPv4-mapped address",
            hex::encode(raw)
        )));
    }
    Ok(Ipv4Addr::new(raw[12], raw[13], raw[14], raw[15]))
}

/// Services, address and port of a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct NetworkAddress {
    pub services: ServiceFlags,
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl NetworkAddress {
    pub fn new(services: ServiceFlags, ip: Ipv4Addr, port: u16) -> Self {
        Self { services, ip, port }
    }

    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.ip, self.port)
    }
}

impl Encodable for NetworkAddress {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.put_u64_le(self.services.bits());
        buf.put_slice(&map_ipv4(self.ip));
        buf.put_u16(self.port);
    }

    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (mut fields, rest) = NETWORK_ADDRESS_LAYOUT.deserialize(data)?;
        let services = ServiceFlags::from_bits_retain(fields.u64()?);
        let ip = unmap_ipv4(&fields.array()?)?;
        let port = fields.u16()?;
        Ok((Self { services, ip, port }, rest))
    }

    fn encoded_len(&self) -> usize {
        NETWORK_ADDRESS_LAYOUT.len()
    }
}

/// One entry of an `addr` payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct AddrEntry {
    /// Unix time the peer was last seen
    pub time: u32,
    pub address: NetworkAddress,
}

impl Encodable for AddrEntry {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.put_u32_le(self.time);
        self.address.encode_into(buf);
    }

    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (time, rest) = take_u32(data)?;
        let (address, rest) = NetworkAddress::decode(rest)?;
        Ok((Self { time, address }, rest))
    }
}
