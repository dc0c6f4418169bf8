use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::protocol::{CHANNEL_ID, CLIENT_VERSION, DEFAULT_PORT, MAX_FRAME_SIZE, Version};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionParameters {
    pub host: String,
    pub port: u16,
    pub ping_interval_ms: u32,
    pub timeout: LivenessTimeout,
    pub channel_id: u8,
    pub max_frame_size: usize,
    pub poll_interval_ms: u32,
    pub client_version: Version,
}

impl Default for ConnectionParameters {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            ping_interval_ms: 1000,
            timeout: LivenessTimeout::default(),
            channel_id: CHANNEL_ID,
            max_frame_size: MAX_FRAME_SIZE,
            poll_interval_ms: 15,
            client_version: CLIENT_VERSION,
        }
    }
}

impl ConnectionParameters {
    pub fn with_endpoint(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms as u64)
    }

    /// Upper bound on one blocking wait for transport events.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1) as u64)
    }

    /// Frames above the wire cap are never accepted, whatever is configured.
    pub fn frame_limit(&self) -> usize {
        self.max_frame_size.min(MAX_FRAME_SIZE)
    }
}

/// How long a silent peer is tolerated.
///
/// The peer is abandoned once nothing has arrived for `maximum_ms`, or
/// sooner when reliable data is waiting on an ack and the silence exceeds
/// both `base_ms` and `minimum_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessTimeout {
    pub base_ms: u32,
    pub minimum_ms: u32,
    pub maximum_ms: u32,
}

impl Default for LivenessTimeout {
    fn default() -> Self {
        Self {
            base_ms: 5000,
            minimum_ms: 5000,
            maximum_ms: 5000,
        }
    }
}

impl LivenessTimeout {
    pub fn is_expired(&self, silence: Duration, awaiting_ack: bool) -> bool {
        let silence_ms = silence.as_millis();
        if silence_ms >= self.maximum_ms as u128 {
            return true;
        }
        awaiting_ack && silence_ms >= self.base_ms.max(self.minimum_ms) as u128
    }

    pub fn maximum(&self) -> Duration {
        Duration::from_millis(self.maximum_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_wire() {
        let params = ConnectionParameters::default();
        assert_eq!(params.port, 25565);
        assert_eq!(params.frame_limit(), 1024);
        assert_eq!(params.poll_interval(), Duration::from_millis(15));
        assert_eq!(params.client_version, Version::new(0, 1, 0));
    }

    #[test]
    fn test_frame_limit_capped() {
        let params = ConnectionParameters {
            max_frame_size: 4096,
            ..Default::default()
        };
        assert_eq!(params.frame_limit(), MAX_FRAME_SIZE);
    }

    #[test]
    fn test_liveness_bounds() {
        let timeout = LivenessTimeout {
            base_ms: 1000,
            minimum_ms: 2000,
            maximum_ms: 8000,
        };

        assert!(!timeout.is_expired(Duration::from_millis(1500), true));
        assert!(timeout.is_expired(Duration::from_millis(2500), true));
        assert!(!timeout.is_expired(Duration::from_millis(2500), false));
        assert!(timeout.is_expired(Duration::from_millis(8000), false));
    }

    #[test]
    fn test_parse_partial_toml() {
        let params: ConnectionParameters = toml::from_str(
            r#"
            host = "play.example.org"
            port = 7777

            [timeout]
            maximum_ms = 10000
            "#,
        )
        .unwrap();

        assert_eq!(params.host, "play.example.org");
        assert_eq!(params.port, 7777);
        assert_eq!(params.timeout.maximum_ms, 10000);
        assert_eq!(params.timeout.minimum_ms, 5000);
        assert_eq!(params.ping_interval_ms, 1000);
    }
}
