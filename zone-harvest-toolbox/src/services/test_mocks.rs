#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use hickory_resolver::proto::{
    dnssec::{Algorithm, PublicKeyBuf, rdata::DNSKEY},
    op::{Message, MessageType, OpCode, ResponseCode},
    rr::{
        Name, RData, Record, RecordType,
        rdata::{NS, SOA},
    },
};
use tokio::sync::Mutex;

use crate::error::ExchangeError;
use crate::types::SoaRecord;

use super::digest::to_ds;
use super::exchange::{Answer, DnsExchange, Transport};

/// Starting nameserver used by the fixtures.
pub const START: &str = "192.0.2.53";

// ==================== wire-level mock ====================

/// Transport that answers every query with a canned response built from the
/// request, counting UDP and TCP attempts.
pub struct MockTransport {
    answers: Vec<Record>,
    response_code: ResponseCode,
    truncate_udp: bool,
    truncate_tcp: bool,
    wrong_id: bool,
    unreachable: bool,
    udp_calls: AtomicUsize,
    tcp_calls: AtomicUsize,
}

impl MockTransport {
    pub fn answering(answers: Vec<Record>) -> Self {
        Self {
            answers,
            response_code: ResponseCode::NoError,
            truncate_udp: false,
            truncate_tcp: false,
            wrong_id: false,
            unreachable: false,
            udp_calls: AtomicUsize::new(0),
            tcp_calls: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::answering(vec![])
        }
    }

    pub fn truncate_udp(mut self) -> Self {
        self.truncate_udp = true;
        self
    }

    pub fn truncate_tcp(mut self) -> Self {
        self.truncate_tcp = true;
        self
    }

    pub fn with_response_code(mut self, code: ResponseCode) -> Self {
        self.response_code = code;
        self
    }

    pub fn with_wrong_id(mut self) -> Self {
        self.wrong_id = true;
        self
    }

    pub fn udp_calls(&self) -> usize {
        self.udp_calls.load(Ordering::SeqCst)
    }

    pub fn tcp_calls(&self) -> usize {
        self.tcp_calls.load(Ordering::SeqCst)
    }

    fn respond(&self, payload: &[u8], truncated: bool) -> Result<Vec<u8>, ExchangeError> {
        if self.unreachable {
            return Err(ExchangeError::Transport("connection refused".to_string()));
        }
        let request = Message::from_vec(payload).unwrap();
        let id = if self.wrong_id {
            request.id().wrapping_add(1)
        } else {
            request.id()
        };

        let mut response = Message::new();
        response
            .set_id(id)
            .set_message_type(MessageType::Response)
            .set_op_code(OpCode::Query)
            .set_truncated(truncated)
            .set_response_code(self.response_code);
        response.add_queries(request.queries().to_vec());
        response.add_answers(self.answers.clone());
        Ok(response.to_vec().unwrap())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_udp(&self, _server: &str, payload: &[u8]) -> Result<Vec<u8>, ExchangeError> {
        self.udp_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(payload, self.truncate_udp)
    }

    async fn send_tcp(&self, _server: &str, payload: &[u8]) -> Result<Vec<u8>, ExchangeError> {
        self.tcp_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(payload, self.truncate_tcp)
    }
}

pub fn ns_record(owner: &str, target: &str) -> Record {
    Record::from_rdata(
        Name::from_ascii(owner).unwrap(),
        300,
        RData::NS(NS(Name::from_ascii(target).unwrap())),
    )
}

pub fn soa_record(owner: &str) -> Record {
    Record::from_rdata(
        Name::from_ascii(owner).unwrap(),
        3600,
        RData::SOA(SOA::new(
            Name::from_ascii("ns.icann.org.").unwrap(),
            Name::from_ascii("noc.dns.icann.org.").unwrap(),
            2_024_010_101,
            7200,
            3600,
            1_209_600,
            3600,
        )),
    )
}

// ==================== exchange-level mock ====================

/// One recorded `exchange` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeCall {
    pub server: String,
    pub name: String,
    pub record_type: RecordType,
}

type ResponseKey = (String, String, RecordType);

/// Exchange answering from a table keyed by `(server, name, type)`.
///
/// Unknown questions get an empty `NOERROR` answer.
#[derive(Default)]
pub struct MockExchange {
    responses: HashMap<ResponseKey, Result<Vec<Answer>, ExchangeError>>,
    transfers: HashMap<(String, String), Result<bool, ExchangeError>>,
    calls: Mutex<Vec<ExchangeCall>>,
}

fn normalize(name: &str) -> String {
    let trimmed = name.trim_end_matches('.');
    if trimmed.is_empty() {
        ".".to_string()
    } else {
        trimmed.to_ascii_lowercase()
    }
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root, `tld` and `domain` NS levels plus the domain's SOA, all served by
    /// [`START`].
    pub fn delegated(domain: &str, tld: &str) -> Self {
        let tld_servers = [format!("a.nic.{tld}"), format!("b.nic.{tld}")];
        Self::new()
            .with_answers(
                START,
                ".",
                RecordType::NS,
                vec![
                    Answer::Ns("a.root-servers.net".to_string()),
                    Answer::Ns("b.root-servers.net".to_string()),
                ],
            )
            .with_answers(
                START,
                tld,
                RecordType::NS,
                tld_servers.iter().cloned().map(Answer::Ns).collect(),
            )
            .with_answers(
                START,
                domain,
                RecordType::NS,
                vec![
                    Answer::Ns(format!("ns1.{domain}")),
                    Answer::Ns(format!("ns2.{domain}")),
                ],
            )
            .with_answers(START, domain, RecordType::SOA, vec![Answer::Soa(soa(domain))])
    }

    pub fn with_answers(
        mut self,
        server: &str,
        name: &str,
        record_type: RecordType,
        answers: Vec<Answer>,
    ) -> Self {
        self.responses
            .insert((normalize(server), normalize(name), record_type), Ok(answers));
        self
    }

    pub fn with_error(
        mut self,
        server: &str,
        name: &str,
        record_type: RecordType,
        error: ExchangeError,
    ) -> Self {
        self.responses
            .insert((normalize(server), normalize(name), record_type), Err(error));
        self
    }

    pub fn with_transfer(
        mut self,
        server: &str,
        zone: &str,
        result: Result<bool, ExchangeError>,
    ) -> Self {
        self.transfers
            .insert((normalize(server), normalize(zone)), result);
        self
    }

    pub async fn calls(&self) -> Vec<ExchangeCall> {
        self.calls.lock().await.clone()
    }

    pub async fn calls_for(&self, record_type: RecordType) -> Vec<ExchangeCall> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| call.record_type == record_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DnsExchange for MockExchange {
    async fn exchange(
        &self,
        name: &str,
        record_type: RecordType,
        server: &str,
    ) -> Result<Vec<Answer>, ExchangeError> {
        self.calls.lock().await.push(ExchangeCall {
            server: normalize(server),
            name: normalize(name),
            record_type,
        });
        self.responses
            .get(&(normalize(server), normalize(name), record_type))
            .cloned()
            .unwrap_or_else(|| Ok(vec![]))
    }

    async fn probe_transfer(&self, zone: &str, server: &str) -> Result<bool, ExchangeError> {
        self.calls.lock().await.push(ExchangeCall {
            server: normalize(server),
            name: normalize(zone),
            record_type: RecordType::AXFR,
        });
        self.transfers
            .get(&(normalize(server), normalize(zone)))
            .cloned()
            .unwrap_or(Ok(false))
    }
}

// ==================== fixtures ====================

pub fn soa(domain: &str) -> SoaRecord {
    SoaRecord {
        mname: format!("ns1.{domain}"),
        rname: format!("hostmaster.{domain}"),
        serial: 2_024_010_101,
        refresh: 7200,
        retry: 3600,
        expire: 1_209_600,
        minimum: 3600,
    }
}

/// Key signing key built from the RFC 4034 §5.4 key material.
pub fn ksk() -> DNSKEY {
    let public_key = STANDARD
        .decode(
            "AQOeiiR0GOMYkDshWoSKz9XzfwJr1AYtsmx3TGkJaNXVbfi/2pHm822aJ5iI9BMzNXxeYCmZ\
             DRD99WYwYqUSdjMmmAphXdvxegXd/M5+X7OrzKBaMbCVdFLUUh6DhweJBjEVv5f2wwjM9Xzc\
             nOf+EPbtG9DMBmADjFDc2w/rljwvFw==",
        )
        .unwrap();
    DNSKEY::new(
        true,
        true,
        false,
        PublicKeyBuf::new(public_key, Algorithm::RSASHA1),
    )
}

/// Zone signing key with 64 bytes of ECDSA-shaped key material.
pub fn zsk() -> DNSKEY {
    DNSKEY::new(
        true,
        false,
        false,
        PublicKeyBuf::new((0u8..64).collect(), Algorithm::ECDSAP256SHA256),
    )
}

/// DS answer the parent of `domain` would publish for `key`.
pub fn ds_for(domain: &str, key: &DNSKEY, digest_type: u8) -> Answer {
    Answer::Ds(to_ds(domain, key, digest_type).unwrap())
}
