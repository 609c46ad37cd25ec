//! UDP peer discovery for the direct-TCP carrier: a responder that
//! announces a source agent's TCP endpoint on the LAN, and a client
//! helper that broadcasts a discovery request and collects replies
//! within a timeout window.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

const DISCOVER_SENTINEL: &str = "ZIM-AGENT-DISCOVER";
const REPLY_PREFIX: &str = "ZIM-AGENT-HERE";

/// One peer that answered a discovery broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeer {
    pub hostname: String,
    pub addr: SocketAddr,
}

fn parse_reply(payload: &str, from: SocketAddr) -> Option<DiscoveredPeer> {
    let mut parts = payload.split('|');
    if parts.next()? != REPLY_PREFIX {
        return None;
    }
    let hostname = parts.next()?.to_string();
    let port: u16 = parts.next()?.parse().ok()?;
    Some(DiscoveredPeer { hostname, addr: SocketAddr::new(from.ip(), port) })
}

fn format_reply(hostname: &str, tcp_port: u16) -> String {
    format!("{}|{}|{}", REPLY_PREFIX, hostname, tcp_port)
}

/// Runs the source-side responder: listens for `ZIM-AGENT-DISCOVER`
/// broadcasts on `discovery_port` and answers with this host's TCP
/// endpoint, until `cancellation` resolves. Failure to bind the socket
/// is non-fatal to the caller — it should log and continue without
/// discovery rather than aborting the whole source flow.
pub async fn run_responder(
    discovery_port: u16,
    hostname: String,
    tcp_port: u16,
    mut cancellation: tokio::sync::watch::Receiver<bool>,
) -> std::io::Result<()> {
    let socket = UdpSocket::bind(("0.0.0.0", discovery_port)).await?;
    socket.set_broadcast(true)?;
    let mut buf = [0u8; 256];

    loop {
        tokio::select! {
            _ = cancellation.changed() => {
                if *cancellation.borrow() {
                    return Ok(());
                }
            }
            result = socket.recv_from(&mut buf) => {
                let (n, from) = result?;
                if let Ok(text) = std::str::from_utf8(&buf[..n]) {
                    if text == DISCOVER_SENTINEL {
                        let reply = format_reply(&hostname, tcp_port);
                        let _ = socket.send_to(reply.as_bytes(), from).await;
                    }
                }
            }
        }
    }
}

/// Destination-side discovery: broadcasts the sentinel on
/// `discovery_port` and collects distinct replies until `timeout`
/// elapses. Used for up to three attempts at one-second intervals per
/// the agent protocol's destination flow.
pub async fn discover_peers(discovery_port: u16, timeout_duration: Duration) -> std::io::Result<Vec<DiscoveredPeer>> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
    socket.set_broadcast(true)?;
    socket
        .send_to(DISCOVER_SENTINEL.as_bytes(), (std::net::Ipv4Addr::BROADCAST, discovery_port))
        .await?;

    let mut peers = Vec::new();
    let mut buf = [0u8; 256];
    let deadline = tokio::time::Instant::now() + timeout_duration;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(Ok((n, from))) => {
                if let Ok(text) = std::str::from_utf8(&buf[..n]) {
                    if let Some(peer) = parse_reply(text, from) {
                        if !peers.contains(&peer) {
                            peers.push(peer);
                        }
                    }
                }
            }
            _ => break,
        }
    }

    Ok(peers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_reply() {
        let addr: SocketAddr = "192.168.1.50:9999".parse().unwrap();
        let peer = parse_reply("ZIM-AGENT-HERE|WORKSTATION-07|47322", addr).unwrap();
        assert_eq!(peer.hostname, "WORKSTATION-07");
        assert_eq!(peer.addr.port(), 47322);
        assert_eq!(peer.addr.ip(), addr.ip());
    }

    #[test]
    fn rejects_malformed_reply() {
        let addr: SocketAddr = "192.168.1.50:9999".parse().unwrap();
        assert!(parse_reply("not-a-reply", addr).is_none());
        assert!(parse_reply("ZIM-AGENT-HERE|onlyhost", addr).is_none());
        assert!(parse_reply("ZIM-AGENT-HERE|host|not-a-port", addr).is_none());
    }

    #[tokio::test]
    async fn responder_answers_discovery_request() {
        let (tx, rx) = tokio::sync::watch::channel(false);
        let responder = tokio::spawn(run_responder(58201, "TEST-SRC".to_string(), 58202, rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        let peers = discover_peers(58201, Duration::from_millis(500)).await.unwrap();

        let _ = tx.send(true);
        let _ = responder.await;

        assert!(peers.iter().any(|p| p.hostname == "TEST-SRC" && p.addr.port() == 58202));
    }
}
