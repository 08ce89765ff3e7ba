use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::net::UdpSocket;

/// Every connectionless packet starts with this.
pub const PREAMBLE: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];
pub const QUERY_HEADER: u8 = b'T';
pub const QUERY_PAYLOAD: &[u8] = b"Source Engine Query\0";
pub const CHALLENGE_HEADER: u8 = b'A';

/// Preamble, response header byte and protocol version.
const RESPONSE_HEADER_LEN: usize = 6;
const MIN_RESPONSE_LEN: usize = 25;
const MAX_PACKET_SIZE: usize = 4096;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Timed out after {0:?} waiting for a query response")]
    Timeout(Duration),
    #[error("IO({0})")]
    Io(#[from] std::io::Error),
    #[error("Response too short ({0} bytes)")]
    Truncated(usize),
    #[error("Missing terminator for field \"{0}\"")]
    MissingTerminator(&'static str),
    #[error("Server answered with a malformed challenge")]
    Challenge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasicServerDescriptor {
    pub server_name: String,
    pub map_name: String,
    pub players: u8,
    pub max_players: u8,
}

/// Builds an info query, optionally carrying the challenge the server handed
/// back on a previous attempt.
#[must_use]
pub fn build_request(challenge: Option<[u8; 4]>) -> Vec<u8> {
    let mut packet = Vec::with_capacity(PREAMBLE.len() + 1 + QUERY_PAYLOAD.len() + 4);
    packet.extend_from_slice(&PREAMBLE);
    packet.push(QUERY_HEADER);
    packet.extend_from_slice(QUERY_PAYLOAD);
    if let Some(challenge) = challenge {
        packet.extend_from_slice(&challenge);
    }
    packet
}

/// Returns the challenge if the packet is a challenge reply rather than an
/// info response.
///
/// # Errors
/// If the packet claims to be a challenge but doesn't hold 4 bytes of it.
pub fn challenge_of(data: &[u8]) -> Result<Option<[u8; 4]>, QueryError> {
    if data.len() < 5 || data[..4] != PREAMBLE || data[4] != CHALLENGE_HEADER {
        return Ok(None);
    }

    data.get(5..9)
        .and_then(|c| <[u8; 4]>::try_from(c).ok())
        .map(Some)
        .ok_or(QueryError::Challenge)
}

/// Decodes an info response.
///
/// # Errors
/// - `Truncated` if the packet is shorter than the smallest valid response or
///   ends before the player counters
/// - `MissingTerminator` if one of the string fields runs off the end
pub fn decode_response(data: &[u8]) -> Result<BasicServerDescriptor, QueryError> {
    if data.len() < MIN_RESPONSE_LEN {
        return Err(QueryError::Truncated(data.len()));
    }

    let mut offset = RESPONSE_HEADER_LEN;
    let server_name = read_cstr(data, &mut offset, "name")?;
    let map_name = read_cstr(data, &mut offset, "map")?;
    read_cstr(data, &mut offset, "folder")?;
    read_cstr(data, &mut offset, "game")?;

    // App id
    offset += 2;

    match (data.get(offset), data.get(offset + 1)) {
        (Some(&players), Some(&max_players)) => Ok(BasicServerDescriptor {
            server_name,
            map_name,
            players,
            max_players,
        }),
        _ => Err(QueryError::Truncated(data.len())),
    }
}

fn read_cstr(data: &[u8], offset: &mut usize, field: &'static str) -> Result<String, QueryError> {
    let rest = data
        .get(*offset..)
        .ok_or(QueryError::MissingTerminator(field))?;
    let end = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(QueryError::MissingTerminator(field))?;
    let value = String::from_utf8_lossy(&rest[..end]).into_owned();
    *offset += end + 1;
    Ok(value)
}

/// Sends an info query to `host:port` and decodes the reply. A challenge
/// reply is answered once. The timeout applies to each receive.
///
/// # Errors
/// Any [`QueryError`]; all of them mean the server should be treated as
/// unreachable.
pub async fn probe(
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<BasicServerDescriptor, QueryError> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect((host, port)).await?;

    let mut buf = vec![0u8; MAX_PACKET_SIZE];
    let mut request = build_request(None);
    let mut challenged = false;

    loop {
        socket.send(&request).await?;
        let len = tokio::time::timeout(timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| QueryError::Timeout(timeout))??;
        let data = &buf[..len];

        match challenge_of(data)? {
            Some(challenge) if !challenged => {
                tracing::debug!("{host}:{port} answered with a challenge, retrying query");
                request = build_request(Some(challenge));
                challenged = true;
            }
            Some(_) => return Err(QueryError::Challenge),
            None => return decode_response(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_packet(name: &str, map: &str, players: u8, max: u8) -> Vec<u8> {
        let mut data = PREAMBLE.to_vec();
        data.push(b'I');
        data.push(17);
        for field in [name, map, "iosoccer", "IOSoccer"] {
            data.extend_from_slice(field.as_bytes());
            data.push(0);
        }
        data.extend_from_slice(&[0x3c, 0x2c]);
        data.push(players);
        data.push(max);
        data
    }

    #[test]
    fn request_layout() {
        let packet = build_request(None);
        assert_eq!(&packet[..5], &[0xFF, 0xFF, 0xFF, 0xFF, b'T']);
        assert!(packet.ends_with(b"Source Engine Query\0"));

        let challenged = build_request(Some([1, 2, 3, 4]));
        assert!(challenged.ends_with(&[0, 1, 2, 3, 4]));
    }

    #[test]
    fn decodes_name_map_and_counters() {
        let data = info_packet("IOS Public #1", "8v8_stadium", 11, 16);
        let info = decode_response(&data).expect("valid packet");
        assert_eq!(info.server_name, "IOS Public #1");
        assert_eq!(info.map_name, "8v8_stadium");
        assert_eq!(info.players, 11);
        assert_eq!(info.max_players, 16);
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut data = info_packet("a", "b", 3, 4);
        data.extend_from_slice(&[0xAA; 12]);
        let info = decode_response(&data).expect("valid packet");
        assert_eq!((info.players, info.max_players), (3, 4));
    }

    #[test]
    fn short_packets_are_rejected() {
        let mut data = info_packet("a", "b", 1, 2);
        data.truncate(MIN_RESPONSE_LEN - 1);
        assert!(matches!(
            decode_response(&data),
            Err(QueryError::Truncated(_))
        ));
    }

    #[test]
    fn unterminated_field_is_a_decode_failure() {
        let mut data = PREAMBLE.to_vec();
        data.extend_from_slice(b"I\x11");
        data.extend_from_slice(b"name\0a very long map name with no end");
        assert!(matches!(
            decode_response(&data),
            Err(QueryError::MissingTerminator("map"))
        ));
    }

    #[test]
    fn missing_counters_are_a_decode_failure() {
        let mut data = info_packet("a long enough server name", "map", 1, 2);
        data.truncate(data.len() - 2);
        assert!(matches!(
            decode_response(&data),
            Err(QueryError::Truncated(_))
        ));
    }

    #[test]
    fn challenge_detection() {
        let info = info_packet("server", "map", 1, 2);
        assert!(matches!(challenge_of(&info), Ok(None)));

        let challenge = [0xFF, 0xFF, 0xFF, 0xFF, b'A', 9, 8, 7, 6];
        assert_eq!(challenge_of(&challenge).ok().flatten(), Some([9, 8, 7, 6]));

        let broken = [0xFF, 0xFF, 0xFF, 0xFF, b'A', 9];
        assert!(matches!(challenge_of(&broken), Err(QueryError::Challenge)));
    }
}
