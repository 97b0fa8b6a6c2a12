//! TXT query client
//!
//! [`TxtResolver`] is the seam between the lookup logic and the network.
//! [`UdpTxtResolver`] is the production implementation: one blocking UDP
//! exchange per query against a single configured resolver, wire format
//! handled by `hickory-proto`.

use super::types::LookupError;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{Name, RData, RecordType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Maximum datagram accepted from the resolver
const MAX_RESPONSE_SIZE: usize = 4096;

/// Anything that can answer a TXT query for a fully qualified name.
///
/// Implementations return the first TXT record of the answer (all of its
/// character strings concatenated), [`LookupError::NoAnswer`] when the
/// resolver reports no usable record, and [`LookupError::TransportFailure`]
/// when no response was obtained.
pub trait TxtResolver: Send + Sync {
    fn query_txt(&self, name: &str) -> Result<String, LookupError>;
}

/// How often a query is re-sent after a transport failure.
///
/// The default is no retries. `NoAnswer` outcomes are never retried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub retries: u32,
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy { retries: 0 };

    pub fn new(retries: u32) -> Self {
        Self { retries }
    }

    /// Total number of sends, the first one included
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Blocking UDP TXT client for a single resolver
#[derive(Debug, Clone)]
pub struct UdpTxtResolver {
    server: SocketAddr,
    timeout: Duration,
    retry: RetryPolicy,
}

impl UdpTxtResolver {
    /// Create a client for `server` with a per-attempt `timeout` and no retries
    pub fn new(server: SocketAddr, timeout: Duration) -> Self {
        Self {
            server,
            timeout,
            retry: RetryPolicy::NONE,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build a recursive TXT query, returning its id and wire bytes
    fn build_query(name: &str) -> Result<(u16, Vec<u8>), LookupError> {
        let fqdn = Name::from_str(name).map_err(|e| LookupError::TransportFailure {
            query: name.to_string(),
            reason: format!("cannot encode query name: {}", e),
        })?;

        let id = fastrand::u16(..);
        let mut message = Message::new();
        message
            .set_id(id)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true)
            .add_query(Query::query(fqdn, RecordType::TXT));

        let mut buf = Vec::with_capacity(512);
        let mut encoder = BinEncoder::new(&mut buf);
        message
            .emit(&mut encoder)
            .map_err(|e| LookupError::TransportFailure {
                query: name.to_string(),
                reason: format!("cannot serialize query: {}", e),
            })?;

        Ok((id, buf))
    }

    /// One send/receive round trip
    fn exchange(&self, name: &str) -> Result<Message, LookupError> {
        let transport = |reason: String| LookupError::TransportFailure {
            query: name.to_string(),
            reason,
        };

        let (id, request) = Self::build_query(name)?;

        let bind_addr: SocketAddr = match self.server {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(bind_addr)
            .map_err(|e| transport(format!("cannot bind local socket: {}", e)))?;
        socket
            .connect(self.server)
            .map_err(|e| transport(format!("cannot reach resolver {}: {}", self.server, e)))?;
        socket
            .send(&request)
            .map_err(|e| transport(io_reason(&e, self.timeout)))?;

        let deadline = Instant::now() + self.timeout;
        let mut buf = [0u8; MAX_RESPONSE_SIZE];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(transport(format!(
                    "timed out after {} ms",
                    self.timeout.as_millis()
                )));
            }
            socket
                .set_read_timeout(Some(remaining))
                .map_err(|e| transport(e.to_string()))?;

            let len = socket
                .recv(&mut buf)
                .map_err(|e| transport(io_reason(&e, self.timeout)))?;

            let response = match Message::from_vec(&buf[..len]) {
                Ok(m) => m,
                Err(e) => {
                    debug!(query = name, error = %e, "discarding undecodable datagram");
                    continue;
                }
            };
            if response.id() != id || response.message_type() != MessageType::Response {
                debug!(
                    query = name,
                    expected = id,
                    received = response.id(),
                    "discarding unrelated datagram"
                );
                continue;
            }
            if response.truncated() {
                warn!(query = name, "truncated response, using partial answer");
            }
            return Ok(response);
        }
    }
}

impl TxtResolver for UdpTxtResolver {
    fn query_txt(&self, name: &str) -> Result<String, LookupError> {
        let attempts = self.retry.attempts();
        let mut attempt = 1;
        loop {
            let result = self
                .exchange(name)
                .and_then(|response| txt_from_response(name, &response));
            match result {
                Err(e) if e.is_transport_failure() && attempt < attempts => {
                    debug!(query = name, attempt, attempts, error = %e, "retrying query");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

/// Interpret a decoded response: first TXT record on success, `NoAnswer`
/// for any non-success rcode or an answer section without TXT data.
pub fn txt_from_response(query: &str, response: &Message) -> Result<String, LookupError> {
    let rcode = response.response_code();
    if rcode != ResponseCode::NoError {
        return Err(LookupError::NoAnswer {
            query: query.to_string(),
            rcode: rcode_label(rcode),
        });
    }

    response
        .answers()
        .iter()
        .find_map(|record| match record.data() {
            RData::TXT(txt) => Some(
                txt.iter()
                    .map(|data| String::from_utf8_lossy(data).to_string())
                    .collect::<Vec<_>>()
                    .join(""),
            ),
            _ => None,
        })
        .ok_or_else(|| LookupError::NoAnswer {
            query: query.to_string(),
            rcode: "NODATA".to_string(),
        })
}

/// Conventional upper-case name of a response code
pub fn rcode_label(rcode: ResponseCode) -> String {
    match rcode {
        ResponseCode::NoError => "NOERROR".to_string(),
        ResponseCode::NXDomain => "NXDOMAIN".to_string(),
        ResponseCode::ServFail => "SERVFAIL".to_string(),
        ResponseCode::Refused => "REFUSED".to_string(),
        ResponseCode::NotImp => "NOTIMP".to_string(),
        ResponseCode::FormErr => "FORMERR".to_string(),
        other => format!("{:?}", other).to_uppercase(),
    }
}

fn io_reason(e: &std::io::Error, timeout: Duration) -> String {
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => {
            format!("timed out after {} ms", timeout.as_millis())
        }
        ErrorKind::ConnectionRefused => "connection refused".to_string(),
        _ => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::rdata::TXT;
    use hickory_proto::rr::Record;
    use std::thread;

    fn encode(message: &Message) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut encoder = BinEncoder::new(&mut buf);
        message.emit(&mut encoder).unwrap();
        buf
    }

    fn response_for(request: &Message, rcode: ResponseCode, txt: Option<&str>) -> Message {
        let mut response = Message::new();
        response
            .set_id(request.id())
            .set_message_type(MessageType::Response)
            .set_op_code(OpCode::Query)
            .set_response_code(rcode);
        let query = request.queries()[0].clone();
        if let Some(txt) = txt {
            response.add_answer(Record::from_rdata(
                query.name().clone(),
                300,
                RData::TXT(TXT::new(vec![txt.to_string()])),
            ));
        }
        response.add_query(query);
        response
    }

    /// Answer exactly one query on a local socket
    fn one_shot_server(rcode: ResponseCode, txt: Option<&'static str>) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = socket.local_addr().unwrap();
        thread::spawn(move || {
            let mut buf = [0u8; 512];
            let (len, peer) = socket.recv_from(&mut buf).unwrap();
            let request = Message::from_vec(&buf[..len]).unwrap();
            assert_eq!(request.queries()[0].query_type(), RecordType::TXT);
            assert!(request.recursion_desired());
            let response = response_for(&request, rcode, txt);
            socket.send_to(&encode(&response), peer).unwrap();
        });
        addr
    }

    #[test]
    fn test_build_query_roundtrip_fields() {
        let (id, bytes) = UdpTxtResolver::build_query("8.8.8.8.origin.asn.cymru.com.").unwrap();
        let message = Message::from_vec(&bytes).unwrap();
        assert_eq!(message.id(), id);
        assert_eq!(message.queries().len(), 1);
        assert_eq!(message.queries()[0].query_type(), RecordType::TXT);
        assert_eq!(
            message.queries()[0].name().to_string(),
            "8.8.8.8.origin.asn.cymru.com."
        );
    }

    #[test]
    fn test_query_txt_success() {
        let server = one_shot_server(
            ResponseCode::NoError,
            Some("15169 | 8.8.8.0/24 | US | arin | 2023-12-28"),
        );
        let resolver = UdpTxtResolver::new(server, Duration::from_secs(2));
        let answer = resolver.query_txt("8.8.8.8.origin.asn.cymru.com.").unwrap();
        assert_eq!(answer, "15169 | 8.8.8.0/24 | US | arin | 2023-12-28");
    }

    #[test]
    fn test_query_txt_nxdomain_is_no_answer() {
        let server = one_shot_server(ResponseCode::NXDomain, None);
        let resolver = UdpTxtResolver::new(server, Duration::from_secs(2));
        let err = resolver
            .query_txt("5.113.0.203.origin.asn.cymru.com.")
            .unwrap_err();
        assert_eq!(
            err,
            LookupError::NoAnswer {
                query: "5.113.0.203.origin.asn.cymru.com.".to_string(),
                rcode: "NXDOMAIN".to_string(),
            }
        );
    }

    #[test]
    fn test_query_txt_timeout_is_transport_failure() {
        // bound but never answers
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let resolver = UdpTxtResolver::new(silent.local_addr().unwrap(), Duration::from_millis(200))
            .with_retry_policy(RetryPolicy::new(1));
        let err = resolver
            .query_txt("8.8.8.8.origin.asn.cymru.com.")
            .unwrap_err();
        assert!(err.is_transport_failure(), "unexpected error: {err}");
        drop(silent);
    }

    /// Count datagrams until the socket stays quiet for `idle`, answering each
    /// with `rcode` when given
    fn counting_server(
        rcode: Option<ResponseCode>,
        idle: Duration,
    ) -> (SocketAddr, thread::JoinHandle<usize>) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = socket.local_addr().unwrap();
        socket.set_read_timeout(Some(idle)).unwrap();
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 512];
            let mut count = 0;
            while let Ok((len, peer)) = socket.recv_from(&mut buf) {
                count += 1;
                if let Some(rcode) = rcode {
                    let request = Message::from_vec(&buf[..len]).unwrap();
                    let response = response_for(&request, rcode, None);
                    socket.send_to(&encode(&response), peer).unwrap();
                }
            }
            count
        });
        (addr, handle)
    }

    #[test]
    fn test_timeouts_are_resent_per_retry_policy() {
        let (server, handle) = counting_server(None, Duration::from_millis(800));
        let retry = RetryPolicy::new(2);
        let resolver =
            UdpTxtResolver::new(server, Duration::from_millis(100)).with_retry_policy(retry);

        let err = resolver
            .query_txt("8.8.8.8.origin.asn.cymru.com.")
            .unwrap_err();
        assert!(err.is_transport_failure());
        assert_eq!(handle.join().unwrap(), retry.attempts() as usize);
    }

    #[test]
    fn test_no_answer_is_never_resent() {
        let (server, handle) =
            counting_server(Some(ResponseCode::NXDomain), Duration::from_millis(800));
        let resolver = UdpTxtResolver::new(server, Duration::from_secs(2))
            .with_retry_policy(RetryPolicy::new(3));

        let err = resolver
            .query_txt("5.113.0.203.origin.asn.cymru.com.")
            .unwrap_err();
        assert!(matches!(err, LookupError::NoAnswer { .. }));
        assert_eq!(handle.join().unwrap(), 1);
    }

    #[test]
    fn test_txt_from_response_without_txt_is_no_answer() {
        let (_, bytes) = UdpTxtResolver::build_query("AS64496.asn.cymru.com.").unwrap();
        let request = Message::from_vec(&bytes).unwrap();
        let response = response_for(&request, ResponseCode::NoError, None);
        let err = txt_from_response("AS64496.asn.cymru.com.", &response).unwrap_err();
        assert!(matches!(err, LookupError::NoAnswer { ref rcode, .. } if rcode == "NODATA"));
    }

    #[test]
    fn test_txt_from_response_servfail() {
        let (_, bytes) = UdpTxtResolver::build_query("AS64496.asn.cymru.com.").unwrap();
        let request = Message::from_vec(&bytes).unwrap();
        let response = response_for(&request, ResponseCode::ServFail, Some("ignored"));
        let err = txt_from_response("AS64496.asn.cymru.com.", &response).unwrap_err();
        assert!(matches!(err, LookupError::NoAnswer { ref rcode, .. } if rcode == "SERVFAIL"));
    }

    #[test]
    fn test_retry_policy_attempts() {
        assert_eq!(RetryPolicy::default().attempts(), 1);
        assert_eq!(RetryPolicy::NONE.attempts(), 1);
        assert_eq!(RetryPolicy::new(2).attempts(), 3);
        assert_eq!(RetryPolicy::new(u32::MAX).attempts(), u32::MAX);
    }
}
