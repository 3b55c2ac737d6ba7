//! DNS message exchange: one question to one nameserver.
//!
//! Queries go out over UDP first. A truncated UDP answer is retried exactly
//! once over TCP and whatever TCP returns is final.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::proto::{
    dnssec::rdata::{DNSKEY, DNSSECRData},
    op::{Edns, Message, MessageType, OpCode, Query, ResponseCode},
    rr::{Name, RData, Record, RecordType},
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket, lookup_host};
use tokio::time::timeout;

use crate::error::ExchangeError;
use crate::types::{DenialRecord, DsRecord, MxRecord, SoaRecord, TlsaRecord};

use super::digest::{algorithm_name, digest_type_name};

/// Well-known DNS port.
const DNS_PORT: u16 = 53;

/// Advertised EDNS0 UDP payload size.
const EDNS_BUFFER_SIZE: u16 = 4096;

/// Receive buffer for UDP answers.
const MAX_UDP_SIZE: usize = 65_535;

/// A typed answer record, reduced to the fields the checks consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// NS target hostname, without trailing dot.
    Ns(String),
    Soa(SoaRecord),
    Ds(DsRecord),
    Dnskey(DNSKEY),
    /// NSEC, NSEC3 or NSEC3PARAM.
    Denial {
        record_type: RecordType,
        record: DenialRecord,
    },
    Mx(MxRecord),
    /// TXT strings concatenated without separator.
    Txt(String),
    Tlsa(TlsaRecord),
}

impl Answer {
    /// Extract the fields of a supported record type; other types yield `None`.
    pub fn from_record(record: &Record) -> Option<Self> {
        match record.data() {
            RData::NS(ns) => Some(Self::Ns(trim_root(&ns.0.to_string()))),
            RData::SOA(soa) => Some(Self::Soa(SoaRecord {
                mname: trim_root(&soa.mname().to_string()),
                rname: trim_root(&soa.rname().to_string()),
                serial: soa.serial(),
                refresh: soa.refresh(),
                retry: soa.retry(),
                expire: soa.expire(),
                minimum: soa.minimum(),
            })),
            RData::DNSSEC(DNSSECRData::DS(ds)) => {
                let algorithm: u8 = ds.algorithm().into();
                let digest_type: u8 = ds.digest_type().into();
                Some(Self::Ds(DsRecord {
                    key_tag: ds.key_tag(),
                    algorithm,
                    algorithm_name: algorithm_name(algorithm),
                    digest_type,
                    digest_type_name: digest_type_name(digest_type),
                    digest: hex::encode(ds.digest()),
                }))
            }
            RData::DNSSEC(DNSSECRData::DNSKEY(dnskey)) => Some(Self::Dnskey(dnskey.clone())),
            RData::DNSSEC(
                DNSSECRData::NSEC(_) | DNSSECRData::NSEC3(_) | DNSSECRData::NSEC3PARAM(_),
            ) => Some(Self::Denial {
                record_type: record.record_type(),
                record: DenialRecord {
                    owner: record.name().to_string(),
                    ttl: record.ttl(),
                    rdata: record.data().to_string(),
                },
            }),
            RData::MX(mx) => Some(Self::Mx(MxRecord {
                exchange: trim_root(&mx.exchange().to_string()),
                preference: mx.preference(),
            })),
            RData::TXT(txt) => Some(Self::Txt(
                txt.txt_data()
                    .iter()
                    .map(|data| String::from_utf8_lossy(data))
                    .collect(),
            )),
            RData::TLSA(tlsa) => Some(Self::Tlsa(TlsaRecord {
                cert_usage: tlsa.cert_usage().into(),
                selector: tlsa.selector().into(),
                matching_type: tlsa.matching().into(),
                cert_data: hex::encode(tlsa.cert_data()),
            })),
            _ => None,
        }
    }
}

/// The exchange primitive every check is built on.
#[async_trait]
pub trait DnsExchange: Send + Sync {
    /// Send `name`/`record_type` to `server` and return the answer section.
    ///
    /// `SERVFAIL`, `NXDOMAIN` and `REFUSED` are errors; every other response
    /// code is a success, possibly with no answers.
    async fn exchange(
        &self,
        name: &str,
        record_type: RecordType,
        server: &str,
    ) -> Result<Vec<Answer>, ExchangeError>;

    /// Request a zone transfer of `zone` from `server` and report whether the
    /// server started handing it out.
    async fn probe_transfer(&self, zone: &str, server: &str) -> Result<bool, ExchangeError>;
}

/// Byte-level carrier for DNS messages.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_udp(&self, server: &str, payload: &[u8]) -> Result<Vec<u8>, ExchangeError>;

    /// Send one length-prefixed message and read the first length-prefixed
    /// reply.
    async fn send_tcp(&self, server: &str, payload: &[u8]) -> Result<Vec<u8>, ExchangeError>;
}

/// Socket transport on the tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioTransport {
    timeout: Duration,
}

impl TokioTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// IP literals are used as-is; hostnames go through the system resolver.
    async fn resolve(server: &str) -> Result<SocketAddr, ExchangeError> {
        if let Ok(ip) = server.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, DNS_PORT));
        }
        let host = server.trim_end_matches('.');
        lookup_host((host, DNS_PORT))
            .await
            .map_err(|e| ExchangeError::Transport(format!("{server}: {e}")))?
            .next()
            .ok_or_else(|| ExchangeError::Transport(format!("{server}: no address found")))
    }

    async fn udp_round_trip(addr: SocketAddr, payload: &[u8]) -> std::io::Result<Vec<u8>> {
        let bind: SocketAddr = if addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(addr).await?;
        socket.send(payload).await?;
        let mut buf = vec![0u8; MAX_UDP_SIZE];
        let len = socket.recv(&mut buf).await?;
        buf.truncate(len);
        Ok(buf)
    }

    async fn tcp_round_trip(addr: SocketAddr, payload: &[u8]) -> std::io::Result<Vec<u8>> {
        let len = u16::try_from(payload.len()).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "query exceeds 65535 bytes")
        })?;
        let mut framed = Vec::with_capacity(payload.len() + 2);
        framed.extend_from_slice(&len.to_be_bytes());
        framed.extend_from_slice(payload);

        let mut stream = TcpStream::connect(addr).await?;
        stream.write_all(&framed).await?;
        let response_len = stream.read_u16().await?;
        let mut buf = vec![0u8; usize::from(response_len)];
        stream.read_exact(&mut buf).await?;
        Ok(buf)
    }
}

#[async_trait]
impl Transport for TokioTransport {
    async fn send_udp(&self, server: &str, payload: &[u8]) -> Result<Vec<u8>, ExchangeError> {
        timeout(self.timeout, async {
            let addr = Self::resolve(server).await?;
            Self::udp_round_trip(addr, payload)
                .await
                .map_err(|e| ExchangeError::Transport(format!("{addr} (udp): {e}")))
        })
        .await
        .map_err(|_| ExchangeError::Timeout(self.timeout))?
    }

    async fn send_tcp(&self, server: &str, payload: &[u8]) -> Result<Vec<u8>, ExchangeError> {
        timeout(self.timeout, async {
            let addr = Self::resolve(server).await?;
            Self::tcp_round_trip(addr, payload)
                .await
                .map_err(|e| ExchangeError::Transport(format!("{addr} (tcp): {e}")))
        })
        .await
        .map_err(|_| ExchangeError::Timeout(self.timeout))?
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Protocol {
    Udp,
    Tcp,
}

/// [`DnsExchange`] implementation over a [`Transport`].
#[derive(Debug, Clone)]
pub struct Exchanger<T = TokioTransport> {
    transport: T,
}

impl Exchanger<TokioTransport> {
    /// Exchanger over real sockets with a per-attempt deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(TokioTransport::new(timeout))
    }
}

impl<T: Transport> Exchanger<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run the UDP → (truncated) → TCP sequence and return the final response
    /// message without interpreting its response code.
    pub async fn query(
        &self,
        name: &str,
        record_type: RecordType,
        server: &str,
    ) -> Result<Message, ExchangeError> {
        let request = build_query(name, record_type)?;
        let payload = encode(&request)?;

        let mut protocol = Protocol::Udp;
        loop {
            let bytes = match protocol {
                Protocol::Udp => self.transport.send_udp(server, &payload).await?,
                Protocol::Tcp => self.transport.send_tcp(server, &payload).await?,
            };
            let response = decode(&bytes, request.id())?;

            if protocol == Protocol::Udp && response.truncated() {
                log::debug!("Truncated {record_type} answer for {name} from {server}, retrying over TCP");
                protocol = Protocol::Tcp;
                continue;
            }
            return Ok(response);
        }
    }
}

#[async_trait]
impl<T: Transport> DnsExchange for Exchanger<T> {
    async fn exchange(
        &self,
        name: &str,
        record_type: RecordType,
        server: &str,
    ) -> Result<Vec<Answer>, ExchangeError> {
        let response = self.query(name, record_type, server).await?;
        check_response_code(response.response_code())?;
        Ok(response
            .answers()
            .iter()
            .filter_map(Answer::from_record)
            .collect())
    }

    async fn probe_transfer(&self, zone: &str, server: &str) -> Result<bool, ExchangeError> {
        let mut request = build_query(zone, RecordType::AXFR)?;
        request.set_recursion_desired(false);
        let bytes = self.transport.send_tcp(server, &encode(&request)?).await?;
        let response = decode(&bytes, request.id())?;

        if response.response_code() != ResponseCode::NoError {
            log::debug!(
                "Zone transfer of {zone} from {server} rejected: {}",
                response.response_code()
            );
            return Ok(false);
        }
        Ok(response
            .answers()
            .first()
            .is_some_and(|record| record.record_type() == RecordType::SOA))
    }
}

/// Whether a query type carries EDNS0 with the DO bit.
fn wants_dnssec_records(record_type: RecordType) -> bool {
    matches!(
        record_type,
        RecordType::DS
            | RecordType::DNSKEY
            | RecordType::NSEC
            | RecordType::NSEC3
            | RecordType::NSEC3PARAM
            | RecordType::SOA
    )
}

/// Build a recursion-desired query for the fully-qualified form of `name`.
pub(crate) fn build_query(name: &str, record_type: RecordType) -> Result<Message, ExchangeError> {
    let fqdn = format!("{}.", name.trim_end_matches('.'));
    let name = Name::from_ascii(&fqdn)
        .map_err(|e| ExchangeError::Malformed(format!("invalid query name {fqdn}: {e}")))?;

    let mut message = Message::new();
    message
        .set_id(rand::random())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true);
    message.add_query(Query::query(name, record_type));

    if wants_dnssec_records(record_type) {
        let mut edns = Edns::new();
        edns.set_max_payload(EDNS_BUFFER_SIZE).set_dnssec_ok(true);
        message.set_edns(edns);
    }
    Ok(message)
}

fn encode(message: &Message) -> Result<Vec<u8>, ExchangeError> {
    message
        .to_vec()
        .map_err(|e| ExchangeError::Malformed(format!("failed to encode query: {e}")))
}

fn decode(bytes: &[u8], expected_id: u16) -> Result<Message, ExchangeError> {
    let response = Message::from_vec(bytes)
        .map_err(|e| ExchangeError::Malformed(format!("failed to decode response: {e}")))?;
    if response.id() != expected_id {
        return Err(ExchangeError::Malformed(format!(
            "response id {} does not match query id {expected_id}",
            response.id()
        )));
    }
    Ok(response)
}

fn check_response_code(code: ResponseCode) -> Result<(), ExchangeError> {
    match code {
        ResponseCode::ServFail => Err(ExchangeError::ServerFailure),
        ResponseCode::NXDomain => Err(ExchangeError::NameError),
        ResponseCode::Refused => Err(ExchangeError::Refused),
        _ => Ok(()),
    }
}

fn trim_root(name: &str) -> String {
    name.trim_end_matches('.').to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use hickory_resolver::proto::rr::rdata::{
        MX, TLSA, TXT,
        tlsa::{CertUsage, Matching, Selector},
    };

    use super::*;
    use crate::services::test_mocks::{MockTransport, ns_record, soa_record};

    // ==================== build_query tests ====================

    #[test]
    fn test_build_query_is_fully_qualified() {
        let message = build_query("example.com", RecordType::NS).unwrap();
        let query = message.queries().first().unwrap();
        assert_eq!(query.name().to_string(), "example.com.");
        assert_eq!(query.query_type(), RecordType::NS);
        assert!(message.recursion_desired());
    }

    #[test]
    fn test_build_query_root() {
        let message = build_query(".", RecordType::NS).unwrap();
        assert!(message.queries().first().unwrap().name().is_root());
    }

    #[test]
    fn test_build_query_edns_only_for_dnssec_types() {
        let ns = build_query("example.com", RecordType::NS).unwrap();
        assert!(ns.extensions().is_none());

        for record_type in [RecordType::DS, RecordType::DNSKEY, RecordType::NSEC3PARAM] {
            let message = build_query("example.com", record_type).unwrap();
            let edns = message.extensions().as_ref().unwrap();
            assert_eq!(edns.max_payload(), EDNS_BUFFER_SIZE);
            assert!(edns.flags().dnssec_ok);
        }
    }

    #[test]
    fn test_build_query_invalid_name() {
        let label = "a".repeat(64);
        let result = build_query(&format!("{label}.com"), RecordType::NS);
        assert!(matches!(result, Err(ExchangeError::Malformed(_))));
    }

    // ==================== response code tests ====================

    #[test]
    fn test_check_response_code() {
        assert_eq!(
            check_response_code(ResponseCode::ServFail),
            Err(ExchangeError::ServerFailure)
        );
        assert_eq!(
            check_response_code(ResponseCode::NXDomain),
            Err(ExchangeError::NameError)
        );
        assert_eq!(
            check_response_code(ResponseCode::Refused),
            Err(ExchangeError::Refused)
        );
        assert!(check_response_code(ResponseCode::NoError).is_ok());
        assert!(check_response_code(ResponseCode::NotImp).is_ok());
    }

    // ==================== answer extraction tests ====================

    #[test]
    fn test_answer_from_ns_record() {
        let record = ns_record("example.com.", "a.iana-servers.net.");
        assert_eq!(
            Answer::from_record(&record),
            Some(Answer::Ns("a.iana-servers.net".to_string()))
        );
    }

    #[test]
    fn test_answer_from_soa_record() {
        let record = soa_record("example.com.");
        let Some(Answer::Soa(soa)) = Answer::from_record(&record) else {
            panic!("expected SOA answer");
        };
        assert_eq!(soa.mname, "ns.icann.org");
        assert_eq!(soa.serial, 2_024_010_101);
    }

    #[test]
    fn test_answer_from_mx_record() {
        let record = Record::from_rdata(
            Name::from_ascii("example.com.").unwrap(),
            300,
            RData::MX(MX::new(10, Name::from_ascii("mail.example.com.").unwrap())),
        );
        assert_eq!(
            Answer::from_record(&record),
            Some(Answer::Mx(MxRecord {
                exchange: "mail.example.com".to_string(),
                preference: 10,
            }))
        );
    }

    #[test]
    fn test_answer_from_txt_record_joins_fragments() {
        let record = Record::from_rdata(
            Name::from_ascii("example.com.").unwrap(),
            300,
            RData::TXT(TXT::new(vec![
                "v=spf1 include:_spf.example.net ".to_string(),
                "-all".to_string(),
            ])),
        );
        assert_eq!(
            Answer::from_record(&record),
            Some(Answer::Txt("v=spf1 include:_spf.example.net -all".to_string()))
        );
    }

    #[test]
    fn test_answer_from_tlsa_record() {
        let record = Record::from_rdata(
            Name::from_ascii("_25._tcp.mail.example.com.").unwrap(),
            300,
            RData::TLSA(TLSA::new(
                CertUsage::from(3),
                Selector::from(1),
                Matching::from(1),
                vec![0xAB, 0xCD],
            )),
        );
        assert_eq!(
            Answer::from_record(&record),
            Some(Answer::Tlsa(TlsaRecord {
                cert_usage: 3,
                selector: 1,
                matching_type: 1,
                cert_data: "abcd".to_string(),
            }))
        );
    }

    // ==================== exchange state machine tests ====================

    #[tokio::test]
    async fn test_udp_answer_is_used_when_not_truncated() {
        let transport = MockTransport::answering(vec![ns_record("example.com.", "ns1.example.com.")]);
        let exchanger = Exchanger::new(transport);

        let answers = exchanger
            .exchange("example.com", RecordType::NS, "192.0.2.1")
            .await
            .unwrap();

        assert_eq!(answers, vec![Answer::Ns("ns1.example.com".to_string())]);
        assert_eq!(exchanger.transport().udp_calls(), 1);
        assert_eq!(exchanger.transport().tcp_calls(), 0);
    }

    #[tokio::test]
    async fn test_truncated_udp_triggers_single_tcp_retry() {
        let transport = MockTransport::answering(vec![ns_record("example.com.", "ns1.example.com.")])
            .truncate_udp();
        let exchanger = Exchanger::new(transport);

        let answers = exchanger
            .exchange("example.com", RecordType::NS, "192.0.2.1")
            .await
            .unwrap();

        assert_eq!(answers.len(), 1);
        assert_eq!(exchanger.transport().udp_calls(), 1);
        assert_eq!(exchanger.transport().tcp_calls(), 1);
    }

    #[tokio::test]
    async fn test_truncated_tcp_is_not_retried_again() {
        let transport = MockTransport::answering(vec![])
            .truncate_udp()
            .truncate_tcp();
        let exchanger = Exchanger::new(transport);

        let result = exchanger
            .exchange("example.com", RecordType::DNSKEY, "192.0.2.1")
            .await;

        assert!(result.unwrap().is_empty());
        assert_eq!(exchanger.transport().udp_calls(), 1);
        assert_eq!(exchanger.transport().tcp_calls(), 1);
    }

    #[tokio::test]
    async fn test_error_response_codes_are_typed() {
        let cases = [
            (ResponseCode::ServFail, ExchangeError::ServerFailure),
            (ResponseCode::NXDomain, ExchangeError::NameError),
            (ResponseCode::Refused, ExchangeError::Refused),
        ];
        for (code, expected) in cases {
            let exchanger = Exchanger::new(MockTransport::answering(vec![]).with_response_code(code));
            let result = exchanger
                .exchange("example.com", RecordType::DS, "192.0.2.1")
                .await;
            assert_eq!(result, Err(expected));
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_propagated() {
        let exchanger = Exchanger::new(MockTransport::unreachable());
        let result = exchanger
            .exchange("example.com", RecordType::NS, "192.0.2.1")
            .await;
        assert!(matches!(result, Err(ExchangeError::Transport(_))));
        assert_eq!(exchanger.transport().tcp_calls(), 0);
    }

    #[tokio::test]
    async fn test_mismatched_id_is_malformed() {
        let exchanger = Exchanger::new(MockTransport::answering(vec![]).with_wrong_id());
        let result = exchanger
            .exchange("example.com", RecordType::NS, "192.0.2.1")
            .await;
        assert!(matches!(result, Err(ExchangeError::Malformed(_))));
    }

    // ==================== zone transfer probe tests ====================

    #[tokio::test]
    async fn test_probe_transfer_allowed() {
        let exchanger = Exchanger::new(MockTransport::answering(vec![
            soa_record("zonetransfer.me."),
            ns_record("zonetransfer.me.", "nsztm1.digi.ninja."),
        ]));
        let allowed = exchanger
            .probe_transfer("zonetransfer.me", "nsztm1.digi.ninja")
            .await
            .unwrap();
        assert!(allowed);
        assert_eq!(exchanger.transport().udp_calls(), 0);
        assert_eq!(exchanger.transport().tcp_calls(), 1);
    }

    #[tokio::test]
    async fn test_probe_transfer_refused() {
        let exchanger = Exchanger::new(
            MockTransport::answering(vec![]).with_response_code(ResponseCode::Refused),
        );
        let allowed = exchanger
            .probe_transfer("example.com", "192.0.2.1")
            .await
            .unwrap();
        assert!(!allowed);
    }

    // ==================== real network ====================

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_tokio_transport_real() {
        let exchanger = Exchanger::with_timeout(Duration::from_secs(5));
        let answers = exchanger
            .exchange(".", RecordType::NS, "8.8.8.8")
            .await
            .unwrap();
        assert!(answers.iter().any(|a| matches!(a, Answer::Ns(_))));
    }
}
