//! Minimal SNTP (RFC 4330) client packet handling.

use core::time::Duration;

use crate::clock_sync::SyncError;

pub const NTP_PORT: u16 = 123;
pub const PACKET_LEN: usize = 48;

/// Seconds between the NTP era (1900) and the Unix epoch.
const NTP_TO_UNIX_SECS: u64 = 2_208_988_800;

const MODE_CLIENT: u8 = 3;
const MODE_SERVER: u8 = 4;
const VERSION: u8 = 4;

const TRANSMIT_TIMESTAMP: usize = 40;

/// A client request: version 4, mode 3, everything else zero.
pub fn request() -> [u8; PACKET_LEN] {
    let mut packet = [0u8; PACKET_LEN];
    packet[0] = (VERSION << 3) | MODE_CLIENT;
    packet
}

/// Extract the server transmit time as time since the Unix epoch.
pub fn parse_reply(reply: &[u8]) -> Result<Duration, SyncError> {
    if reply.len() < PACKET_LEN {
        return Err(SyncError::BadReply("short packet"));
    }
    if reply[0] & 0x07 != MODE_SERVER {
        return Err(SyncError::BadReply("not a server reply"));
    }
    // Stratum 0 is a kiss-of-death message.
    if reply[1] == 0 {
        return Err(SyncError::BadReply("kiss-of-death"));
    }

    let field = |offset: usize| {
        u32::from_be_bytes([
            reply[offset],
            reply[offset + 1],
            reply[offset + 2],
            reply[offset + 3],
        ])
    };
    let seconds = u64::from(field(TRANSMIT_TIMESTAMP));
    let fraction = u64::from(field(TRANSMIT_TIMESTAMP + 4));

    let unix_secs = seconds
        .checked_sub(NTP_TO_UNIX_SECS)
        .ok_or(SyncError::BadReply("timestamp before 1970"))?;
    let nanos = (fraction * 1_000_000_000) >> 32;
    Ok(Duration::new(unix_secs, nanos as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(seconds: u32, fraction: u32) -> [u8; PACKET_LEN] {
        let mut packet = [0u8; PACKET_LEN];
        packet[0] = (VERSION << 3) | MODE_SERVER;
        packet[1] = 2;
        packet[40..44].copy_from_slice(&seconds.to_be_bytes());
        packet[44..48].copy_from_slice(&fraction.to_be_bytes());
        packet
    }

    #[test]
    fn test_request_header() {
        let packet = request();
        assert_eq!(packet[0], 0x23);
        assert!(packet[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_parse_transmit_time() {
        let ntp_secs = (1_700_000_000 + NTP_TO_UNIX_SECS) as u32;
        let time = parse_reply(&reply(ntp_secs, 0x8000_0000)).unwrap();
        assert_eq!(time.as_secs(), 1_700_000_000);
        assert_eq!(time.subsec_millis(), 500);
    }

    #[test]
    fn test_rejects_invalid_replies() {
        assert!(parse_reply(&[0u8; 12]).is_err());

        let mut kiss = reply(3_900_000_000, 0);
        kiss[1] = 0;
        assert_eq!(parse_reply(&kiss), Err(SyncError::BadReply("kiss-of-death")));

        assert!(parse_reply(&reply(5, 0)).is_err());
    }
}
