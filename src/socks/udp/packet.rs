//! UDP packet encoding/decoding for SOCKS5
//!
//! Handles the encapsulation format for UDP packets in SOCKS5.

use crate::error::Socks5Error;
use crate::socks::consts::*;
use crate::socks::types::{AddressType, TargetAddr};
use bytes::{BufMut, Bytes, BytesMut};

/// UDP packet structure for SOCKS5
///
/// # UDP Request/Response Format
///
/// ```text
/// +----+------+------+----------+----------+----------+
/// |RSV | FRAG | ATYP | DST.ADDR | DST.PORT |   DATA   |
/// +----+------+------+----------+----------+----------+
/// | 2  |  1   |  1   | Variable |    2     | Variable |
/// +----+------+------+----------+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpDatagram {
    /// Fragment number (0 for standalone packets)
    pub frag: u8,
    /// Destination address (client to relay) or sender address (relay to client)
    pub addr: TargetAddr,
    /// Packet data
    pub data: Bytes,
}

impl UdpDatagram {
    /// Create a new unfragmented UDP packet
    pub fn new(addr: TargetAddr, data: Bytes) -> Self {
        UdpDatagram { frag: 0, addr, data }
    }

    /// Check if this is a fragmented packet
    pub fn is_fragmented(&self) -> bool {
        self.frag != 0
    }

    /// Decode a datagram received on the relay socket
    ///
    /// RSV must be zero. FRAG is returned as-is; rejecting fragments is up
    /// to the caller.
    pub fn decode(data: &[u8]) -> Result<Self, Socks5Error> {
        if data.len() < UDP_HEADER_PREFIX_LEN {
            return Err(Socks5Error::BadDatagram(format!(
                "packet too short: {} bytes",
                data.len()
            )));
        }

        let rsv = u16::from_be_bytes([data[0], data[1]]);
        if rsv != 0 {
            return Err(Socks5Error::BadDatagram(format!("invalid RSV field: {}", rsv)));
        }

        let frag = data[2];
        let addr_type = AddressType::try_from(data[3])?;

        let rest = &data[UDP_HEADER_PREFIX_LEN..];
        let (addr, used) = TargetAddr::decode(addr_type, rest)?;

        Ok(UdpDatagram {
            frag,
            addr,
            data: Bytes::copy_from_slice(&rest[used..]),
        })
    }

    /// Length of the encoded header, payload excluded
    pub fn header_len(&self) -> usize {
        3 + self.addr.encoded_len()
    }

    /// Encode the datagram into a new buffer
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.header_len() + self.data.len());
        self.encode_into(&mut buf);
        buf
    }

    /// Append the encoded datagram to `buf`
    pub fn encode_into<B: BufMut>(&self, buf: &mut B) {
        // RSV (2 bytes)
        buf.put_u16(0);
        // FRAG (1 byte)
        buf.put_u8(self.frag);
        self.addr.write_to(buf);
        buf.put_slice(&self.data);
    }
}
