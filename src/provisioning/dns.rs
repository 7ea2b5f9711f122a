//! Catch-all DNS responder for the access point.
//!
//! Clients on the `AQISetup` network get the gateway as their DNS server.
//! Every A query is answered with the gateway address, so the connectivity
//! checks phones and laptops run land on the portal and the OS opens the form.

use log::{debug, info, warn};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const HEADER_LEN: usize = 12;
const TYPE_A: u16 = 1;
const CLASS_IN: u16 = 1;
const ANSWER_TTL: u32 = 60;

/// Build the reply to `query`, resolving every A question to `ip`.
///
/// Returns `None` for packets that are not a single standard query.
pub fn answer(query: &[u8], ip: Ipv4Addr) -> Option<Vec<u8>> {
    if query.len() < HEADER_LEN {
        return None;
    }
    let flags = u16::from_be_bytes([query[2], query[3]]);
    let is_response = flags & 0x8000 != 0;
    let opcode = (flags >> 11) & 0xF;
    let questions = u16::from_be_bytes([query[4], query[5]]);
    if is_response || opcode != 0 || questions != 1 {
        return None;
    }

    // QNAME labels, then QTYPE and QCLASS.
    let mut pos = HEADER_LEN;
    loop {
        let len = usize::from(*query.get(pos)?);
        if len == 0 {
            pos += 1;
            break;
        }
        if len & 0xC0 != 0 {
            return None;
        }
        pos += 1 + len;
    }
    let question_end = pos + 4;
    let question = query.get(HEADER_LEN..question_end)?;
    let qtype = u16::from_be_bytes([query[pos], query[pos + 1]]);
    let qclass = u16::from_be_bytes([query[pos + 2], query[pos + 3]]);
    let answers: u16 = if qtype == TYPE_A && qclass == CLASS_IN { 1 } else { 0 };

    let mut reply = Vec::with_capacity(question_end + 16);
    reply.extend_from_slice(&query[0..2]);
    // QR, RD copied from the query, RA, NOERROR.
    reply.extend_from_slice(&(0x8080 | (flags & 0x0100)).to_be_bytes());
    reply.extend_from_slice(&1u16.to_be_bytes());
    reply.extend_from_slice(&answers.to_be_bytes());
    reply.extend_from_slice(&[0, 0, 0, 0]);
    reply.extend_from_slice(question);
    if answers == 1 {
        // Name is a pointer to the question at offset 12.
        reply.extend_from_slice(&[0xC0, 0x0C]);
        reply.extend_from_slice(&TYPE_A.to_be_bytes());
        reply.extend_from_slice(&CLASS_IN.to_be_bytes());
        reply.extend_from_slice(&ANSWER_TTL.to_be_bytes());
        reply.extend_from_slice(&4u16.to_be_bytes());
        reply.extend_from_slice(&ip.octets());
    }
    Some(reply)
}

/// DNS responder on a background thread. Drop it to stop.
pub struct CaptiveDns {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    local_addr: SocketAddr,
}

impl CaptiveDns {
    /// Answer queries arriving on `bind` with `ip`.
    pub fn start(bind: SocketAddr, ip: Ipv4Addr) -> io::Result<Self> {
        let socket = UdpSocket::bind(bind)?;
        socket.set_read_timeout(Some(Duration::from_millis(100)))?;
        let local_addr = socket.local_addr()?;
        info!("Captive DNS on {} answering {}", local_addr, ip);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let handle = thread::spawn(move || Self::run(socket, ip, shutdown_clone));

        Ok(Self {
            handle: Some(handle),
            shutdown,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn run(socket: UdpSocket, ip: Ipv4Addr, shutdown: Arc<AtomicBool>) {
        let mut buf = [0u8; 512];
        while !shutdown.load(Ordering::Acquire) {
            let (len, peer) = match socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    continue
                }
                Err(e) => {
                    warn!("Captive DNS receive failed: {}", e);
                    break;
                }
            };
            match answer(&buf[..len], ip) {
                Some(reply) => {
                    if let Err(e) = socket.send_to(&reply, peer) {
                        debug!("Captive DNS reply to {} failed: {}", peer, e);
                    }
                }
                None => debug!("Ignoring malformed DNS packet from {}", peer),
            }
        }
    }
}

impl Drop for CaptiveDns {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GATEWAY: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

    /// Standard query with recursion desired for `name`.
    fn query(id: u16, name: &str, qtype: u16) -> Vec<u8> {
        let mut q = Vec::new();
        q.extend_from_slice(&id.to_be_bytes());
        q.extend_from_slice(&[0x01, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
        for label in name.split('.') {
            q.push(label.len() as u8);
            q.extend_from_slice(label.as_bytes());
        }
        q.push(0);
        q.extend_from_slice(&qtype.to_be_bytes());
        q.extend_from_slice(&CLASS_IN.to_be_bytes());
        q
    }

    #[test]
    fn test_a_query_resolves_to_gateway() {
        let q = query(0xBEEF, "connectivitycheck.gstatic.com", TYPE_A);
        let reply = answer(&q, GATEWAY).unwrap();

        assert_eq!(&reply[0..2], &[0xBE, 0xEF]);
        assert_eq!(reply[2] & 0x80, 0x80);
        assert_eq!(&reply[6..8], &[0, 1]);
        assert_eq!(&reply[12..q.len()], &q[12..]);
        assert_eq!(&reply[reply.len() - 4..], &[192, 168, 4, 1]);
    }

    #[test]
    fn test_aaaa_query_gets_empty_answer() {
        let q = query(7, "captive.apple.com", 28);
        let reply = answer(&q, GATEWAY).unwrap();
        assert_eq!(&reply[6..8], &[0, 0]);
        assert_eq!(reply.len(), q.len());
    }

    #[test]
    fn test_malformed_packets_ignored() {
        assert_eq!(answer(&[0; 5], GATEWAY), None);

        let mut response = query(1, "example.com", TYPE_A);
        response[2] |= 0x80;
        assert_eq!(answer(&response, GATEWAY), None);

        let truncated = query(1, "example.com", TYPE_A);
        assert_eq!(answer(&truncated[..truncated.len() - 3], GATEWAY), None);
    }

    #[test]
    fn test_responder_answers_over_udp() {
        let dns = CaptiveDns::start("127.0.0.1:0".parse().unwrap(), GATEWAY).unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        client
            .send_to(&query(42, "msftconnecttest.com", TYPE_A), dns.local_addr())
            .unwrap();
        let mut buf = [0u8; 512];
        let (len, _) = client.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[0..2], &[0, 42]);
        assert_eq!(&buf[len - 4..len], &[192, 168, 4, 1]);
    }
}
