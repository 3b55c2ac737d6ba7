//! Authenticated-denial-of-existence classification.

use chrono::Utc;
use hickory_resolver::proto::rr::RecordType;

use crate::types::{DenialOfExistence, DenialRecord, DomainQuery, NsecCheckResult};

use super::delegation::query_servers;
use super::exchange::{Answer, DnsExchange};

/// Probe order; the first type that yields a record wins.
const PROBES: [RecordType; 3] = [RecordType::NSEC, RecordType::NSEC3, RecordType::NSEC3PARAM];

fn denial_variant(record_type: RecordType, record: DenialRecord) -> Option<DenialOfExistence> {
    match record_type {
        RecordType::NSEC => Some(DenialOfExistence::Nsec(record)),
        RecordType::NSEC3 => Some(DenialOfExistence::Nsec3(record)),
        RecordType::NSEC3PARAM => Some(DenialOfExistence::Nsec3param(record)),
        _ => None,
    }
}

/// Find which NSEC-family mechanism `domain` publishes, asking `servers`.
///
/// Exchange failures count as "not present".
pub async fn classify(
    exchange: &dyn DnsExchange,
    domain: &str,
    servers: &[String],
) -> DenialOfExistence {
    for probe in PROBES {
        let answers = match query_servers(exchange, servers, domain, probe).await {
            Ok(answers) => answers,
            Err(e) => {
                log::debug!("{probe} probe for {domain} failed: {e}");
                continue;
            }
        };

        let found = answers.into_iter().find_map(|answer| match answer {
            Answer::Denial {
                record_type,
                record,
            } if record_type == probe => denial_variant(record_type, record),
            _ => None,
        });
        if let Some(denial) = found {
            return denial;
        }
    }
    DenialOfExistence::None
}

/// Stand-alone classification against the query's starting nameserver.
pub async fn nsec_check(exchange: &dyn DnsExchange, query: &DomainQuery) -> NsecCheckResult {
    let check_time = Utc::now();
    let servers = [query.nameserver.clone()];
    let denial = classify(exchange, &query.registrable, &servers).await;

    NsecCheckResult {
        domain: query.registrable.clone(),
        nameserver: query.nameserver.clone(),
        denial,
        check_time,
    }
}
