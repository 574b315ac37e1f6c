//! SOCKS5 authentication negotiation
//!
//! Reads the client's offered methods and selects "no authentication".
//! GSSAPI and username/password are recognized on the wire but never chosen.

use super::consts::*;
use crate::error::Socks5Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Authentication method identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// No authentication required
    NoAuth,
    /// GSSAPI
    Gssapi,
    /// Username/password
    UserPassword,
    /// "No acceptable methods" marker
    NoAcceptable,
    /// IANA-assigned or private method this server does not know
    Other(u8),
}

impl AuthMethod {
    /// Convert to SOCKS5 method byte
    pub fn to_byte(self) -> u8 {
        match self {
            AuthMethod::NoAuth => SOCKS5_AUTH_METHOD_NONE,
            AuthMethod::Gssapi => SOCKS5_AUTH_METHOD_GSSAPI,
            AuthMethod::UserPassword => SOCKS5_AUTH_METHOD_PASSWORD,
            AuthMethod::NoAcceptable => SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE,
            AuthMethod::Other(byte) => byte,
        }
    }

    /// Parse from SOCKS5 method byte
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            SOCKS5_AUTH_METHOD_NONE => AuthMethod::NoAuth,
            SOCKS5_AUTH_METHOD_GSSAPI => AuthMethod::Gssapi,
            SOCKS5_AUTH_METHOD_PASSWORD => AuthMethod::UserPassword,
            SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE => AuthMethod::NoAcceptable,
            other => AuthMethod::Other(other),
        }
    }
}

/// Method-selection message sent by the client
///
/// ```text
/// +----+----------+----------+
/// |VER | NMETHODS | METHODS  |
/// +----+----------+----------+
/// | 1  |    1     | 1 to 255 |
/// +----+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAuthMessage {
    /// Protocol version, always 5 once parsed
    pub version: u8,
    /// Number of offered methods
    pub nmethods: u8,
    /// Offered methods in client order
    pub methods: Vec<AuthMethod>,
}

impl ClientAuthMessage {
    /// Read the method-selection message from the stream
    pub async fn read_from<S>(stream: &mut S) -> Result<Self, Socks5Error>
    where
        S: AsyncRead + Unpin,
    {
        let mut buf = [0u8; 2];
        stream.read_exact(&mut buf).await?;

        let version = buf[0];
        let nmethods = buf[1];

        if version != SOCKS5_VERSION {
            return Err(Socks5Error::InvalidVersion(version));
        }

        let mut methods = vec![0u8; nmethods as usize];
        stream.read_exact(&mut methods).await?;

        Ok(ClientAuthMessage {
            version,
            nmethods,
            methods: methods.into_iter().map(AuthMethod::from_byte).collect(),
        })
    }

    /// Whether the client offered `method`
    pub fn offers(&self, method: AuthMethod) -> bool {
        self.methods.contains(&method)
    }

    /// Select the method the server will use
    pub fn select_method(&self) -> AuthMethod {
        if self.offers(AuthMethod::NoAuth) {
            AuthMethod::NoAuth
        } else {
            AuthMethod::NoAcceptable
        }
    }
}

/// Perform authentication negotiation
///
/// Exactly one `[VER, METHOD]` reply is written once the method list has
/// been read. A bad version or a short read fails before any reply.
///
/// # Returns
///
/// The selected method, or `NoAcceptableMethod` after replying 0xFF.
pub async fn negotiate<S>(stream: &mut S) -> Result<AuthMethod, Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let message = ClientAuthMessage::read_from(stream).await?;
    debug!("Client offered auth methods: {:?}", message.methods);

    let selected = message.select_method();

    stream
        .write_all(&[SOCKS5_VERSION, selected.to_byte()])
        .await?;
    stream.flush().await?;

    match selected {
        AuthMethod::NoAcceptable => Err(Socks5Error::NoAcceptableMethod),
        method => Ok(method),
    }
}
