//! Address parsing and server tokens.
//!
//! A server token is the packed ip address of a server, optionally followed by
//! its port when that differs from the default, encoded as URL-safe base64
//! without padding. Raw lengths are 4 or 6 bytes for IPv4 and 16 or 18 bytes
//! for IPv6.

use crate::error::AddressError;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

/// Encodes `addr` as a server token, omitting the port if it equals `default_port`.
pub fn encode_token(addr: SocketAddr, default_port: Option<u16>) -> String {
    let mut blob = match addr.ip() {
        IpAddr::V4(ip) => ip.octets().to_vec(),
        IpAddr::V6(ip) => ip.octets().to_vec(),
    };

    if Some(addr.port()) != default_port {
        blob.extend_from_slice(&addr.port().to_be_bytes());
    }

    base64::encode_config(blob, base64::URL_SAFE_NO_PAD)
}

/// Decodes a server token produced by [`encode_token`].
pub fn decode_token(token: &str, default_port: u16) -> Result<SocketAddr, AddressError> {
    let invalid = || AddressError::InvalidToken(token.to_string());

    let blob = base64::decode_config(token.trim_end_matches('='), base64::URL_SAFE_NO_PAD)
        .map_err(|_| invalid())?;

    let port_of = |bytes: &[u8]| u16::from_be_bytes([bytes[0], bytes[1]]);

    let (ip, port) = match blob.len() {
        4 | 6 => {
            let octets: [u8; 4] = blob[..4].try_into().map_err(|_| invalid())?;
            let port = if blob.len() == 6 {
                port_of(&blob[4..])
            } else {
                default_port
            };
            (IpAddr::V4(Ipv4Addr::from(octets)), port)
        }
        16 | 18 => {
            let octets: [u8; 16] = blob[..16].try_into().map_err(|_| invalid())?;
            let port = if blob.len() == 18 {
                port_of(&blob[16..])
            } else {
                default_port
            };
            (IpAddr::V6(Ipv6Addr::from(octets)), port)
        }
        _ => return Err(invalid()),
    };

    Ok(SocketAddr::new(ip, port))
}

/// Parses an ip address, accepting the constants `all`, `localhost` and `lan`.
pub fn parse_ip(argument: &str) -> Result<IpAddr, AddressError> {
    match argument {
        "all" => Ok(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        "localhost" => Ok(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        "lan" => local_ip(),
        other => other
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .map_err(|_| AddressError::InvalidIp(other.to_string())),
    }
}

pub fn parse_port(argument: &str) -> Result<u16, AddressError> {
    match argument.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(AddressError::InvalidPort(argument.to_string())),
    }
}

/// Parses `ip[:port]`. Without a port, `default_port` is used; if there is no
/// default either, the port is required.
pub fn parse_address(
    argument: &str,
    default_port: Option<u16>,
) -> Result<SocketAddr, AddressError> {
    if let Ok(addr) = argument.parse::<SocketAddr>() {
        if addr.port() == 0 {
            return Err(AddressError::InvalidPort("0".to_string()));
        }
        return Ok(addr);
    }

    if let Some(port) = default_port {
        if let Ok(ip) = parse_ip(argument) {
            return Ok(SocketAddr::new(ip, port));
        }
    }

    match argument.rsplit_once(':') {
        Some((ip, port)) => Ok(SocketAddr::new(parse_ip(ip)?, parse_port(port)?)),
        None => Err(AddressError::InvalidPort(String::new())),
    }
}

/// Parses either an `ip[:port]` address or a server token.
pub fn parse_connection_address(
    argument: &str,
    default_port: u16,
) -> Result<SocketAddr, AddressError> {
    parse_address(argument, Some(default_port)).or_else(|_| decode_token(argument, default_port))
}

/// Address of the interface used for outbound traffic. No packet is sent.
pub fn local_ip() -> Result<IpAddr, AddressError> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("1.1.1.1:80")?;
    Ok(socket.local_addr()?.ip())
}
