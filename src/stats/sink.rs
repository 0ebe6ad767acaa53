// Fire-and-forget counters ("statsd" style)

use crate::config::StatsdConfig;
use crate::error::{Result, WatchError};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::debug;

/// Destination of the watchers' counter events
///
/// Implementations must never block the caller or report failures back:
/// a lost event must not hold up a tick or a remediation.
pub trait MetricsSink: Send + Sync {
    fn increment(&self, name: &str);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn increment(&self, _name: &str) {}
}

/// Sends counters to a statsd daemon over UDP
#[derive(Debug)]
pub struct StatsdSink {
    socket: UdpSocket,
    prefix: String,
}

impl StatsdSink {
    pub fn new(config: &StatsdConfig) -> Result<Self> {
        let cannot_reach = |reason: String| {
            WatchError::ConfigError(format!(
                "Cannot reach statsd at {}:{}: {}",
                config.host, config.port, reason
            ))
        };

        let target = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| cannot_reach(e.to_string()))?
            .next()
            .ok_or_else(|| cannot_reach("no address found".to_string()))?;

        // Bind in the target's address family
        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = UdpSocket::bind(local)?;
        socket.set_nonblocking(true)?;
        socket
            .connect(target)
            .map_err(|e| cannot_reach(e.to_string()))?;

        Ok(Self {
            socket,
            prefix: config.prefix.clone(),
        })
    }

    fn packet(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            format!("{}:1|c", name)
        } else {
            format!("{}.{}:1|c", self.prefix, name)
        }
    }
}

impl MetricsSink for StatsdSink {
    fn increment(&self, name: &str) {
        if let Err(e) = self.socket.send(self.packet(name).as_bytes()) {
            debug!("Dropped statsd event {}: {}", name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_statsd_packet_reaches_listener() {
        let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
        listener
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = listener.local_addr().unwrap().port();

        let sink = StatsdSink::new(&StatsdConfig {
            host: "127.0.0.1".to_string(),
            port,
            prefix: "adasa".to_string(),
        })
        .unwrap();
        sink.increment("_resource_watcher.web.restarting");

        let mut buf = [0u8; 128];
        let n = listener.recv(&mut buf).unwrap();
        assert_eq!(
            std::str::from_utf8(&buf[..n]).unwrap(),
            "adasa._resource_watcher.web.restarting:1|c"
        );
    }

    #[test]
    fn test_statsd_over_ipv6() {
        // Hosts without IPv6 loopback cannot run this
        let Ok(listener) = UdpSocket::bind("[::1]:0") else {
            return;
        };
        listener
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = listener.local_addr().unwrap().port();

        let sink = StatsdSink::new(&StatsdConfig {
            host: "::1".to_string(),
            port,
            prefix: "adasa".to_string(),
        })
        .unwrap();
        sink.increment("_resource_watcher.web.error");

        let mut buf = [0u8; 128];
        let n = listener.recv(&mut buf).unwrap();
        assert_eq!(
            std::str::from_utf8(&buf[..n]).unwrap(),
            "adasa._resource_watcher.web.error:1|c"
        );
    }

    #[test]
    fn test_packet_without_prefix() {
        let sink = StatsdSink::new(&StatsdConfig {
            host: "127.0.0.1".to_string(),
            port: 8125,
            prefix: String::new(),
        })
        .unwrap();
        assert_eq!(sink.packet("x.error"), "x.error:1|c");
    }

    #[test]
    fn test_noop_sink() {
        NoopSink.increment("anything");
    }
}
