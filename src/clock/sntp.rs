//! Minimal SNTP client used once at startup

use super::SyncedClock;
use crate::config::TimeSyncConfig;
use crate::error::TimeSyncError;
use ivy_shared::Timestamp;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

const NTP_PACKET_LEN: usize = 48;

/// Seconds between 1900-01-01 (NTP era 0) and 1970-01-01
const NTP_UNIX_OFFSET: i64 = 2_208_988_800;

/// Ask `server` for the current time
pub async fn query(server: &str, request_timeout: Duration) -> Result<Timestamp, TimeSyncError> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(server).await?;

    let mut request = [0u8; NTP_PACKET_LEN];
    request[0] = 0x1B; // LI = 0, VN = 3, mode = client
    socket.send(&request).await?;

    let mut response = [0u8; NTP_PACKET_LEN];
    let len = timeout(request_timeout, socket.recv(&mut response))
        .await
        .map_err(|_| TimeSyncError::Timeout(server.to_string()))??;

    parse_transmit_time(&response[..len])
}

fn parse_transmit_time(packet: &[u8]) -> Result<Timestamp, TimeSyncError> {
    if packet.len() < NTP_PACKET_LEN {
        return Err(TimeSyncError::InvalidResponse("short packet"));
    }
    if packet[0] & 0x07 != 4 {
        return Err(TimeSyncError::InvalidResponse("not a server reply"));
    }
    if packet[1] == 0 {
        return Err(TimeSyncError::InvalidResponse("kiss-of-death"));
    }

    let seconds = u32::from_be_bytes([packet[40], packet[41], packet[42], packet[43]]);
    if seconds == 0 {
        return Err(TimeSyncError::InvalidResponse("empty transmit timestamp"));
    }
    Ok(seconds as i64 - NTP_UNIX_OFFSET)
}

/// Synchronise with bounded retries
pub async fn sync(config: &TimeSyncConfig) -> Result<SyncedClock, TimeSyncError> {
    let request_timeout = Duration::from_secs(config.request_timeout_secs);

    for attempt in 1..=config.attempts {
        match query(&config.server, request_timeout).await {
            Ok(network_time) => {
                let clock = SyncedClock::from_network_time(network_time);
                info!(
                    "[TIME] Synchronised with {} (offset {}s)",
                    config.server,
                    clock.offset_secs()
                );
                return Ok(clock);
            }
            Err(e) => {
                warn!(
                    "[TIME] Sync attempt {}/{} failed: {}",
                    attempt, config.attempts, e
                );
                if attempt < config.attempts {
                    sleep(Duration::from_secs(config.retry_delay_secs)).await;
                }
            }
        }
    }

    Err(TimeSyncError::Exhausted {
        attempts: config.attempts,
    })
}
