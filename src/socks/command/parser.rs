//! SOCKS5 command parser
//!
//! Parses SOCKS5 command requests from the client.

use crate::error::Socks5Error;
use crate::socks::consts::*;
use crate::socks::types::{AddressType, SocksCommand, TargetAddr};
use tokio::io::{AsyncRead, AsyncReadExt};

/// A parsed client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRequest {
    /// Requested command
    pub command: SocksCommand,
    /// Address type the client used
    pub addr_type: AddressType,
    /// Destination address and port
    pub target: TargetAddr,
}

impl ClientRequest {
    /// Destination port
    pub fn port(&self) -> u16 {
        self.target.port()
    }
}

/// Parse a SOCKS5 request from the stream
///
/// # SOCKS5 Request Format
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
///
/// Fields are validated in wire order. Nothing is ever written to the
/// stream. A port of zero is accepted.
pub async fn parse_request<S>(stream: &mut S) -> Result<ClientRequest, Socks5Error>
where
    S: AsyncRead + Unpin,
{
    // Read: VER CMD RSV ATYP
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;

    let [version, cmd_byte, reserved, atyp] = header;

    if version != SOCKS5_VERSION {
        return Err(Socks5Error::InvalidVersion(version));
    }

    let command =
        SocksCommand::from_byte(cmd_byte).ok_or(Socks5Error::UnsupportedCommand(cmd_byte))?;

    if reserved != SOCKS5_RESERVED {
        return Err(Socks5Error::InvalidReservedField(reserved));
    }

    let addr_type = AddressType::try_from(atyp)?;
    let target = TargetAddr::read_from(stream, addr_type).await?;

    tracing::debug!("Parsed SOCKS5 request: {} to {}", command, target);

    Ok(ClientRequest {
        command,
        addr_type,
        target,
    })
}
