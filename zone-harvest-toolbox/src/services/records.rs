//! Companion checks: NS set, SOA, zone-transfer probe and the mail records
//! (MX, SPF, DMARC, DKIM, DANE TLSA).

use chrono::Utc;
use hickory_resolver::proto::rr::RecordType;

use crate::error::ExchangeError;
use crate::types::{
    AxfrCheckResult, CheckStatus, DomainQuery, MailHostTlsa, MxCheckResult, MxRecord,
    NsCheckResult, SoaCheckResult, TlsaCheckResult, TxtPolicyResult,
};

use super::exchange::{Answer, DnsExchange};

/// NS set of the registrable domain as reported by the starting nameserver.
pub async fn ns_check(exchange: &dyn DnsExchange, query: &DomainQuery) -> NsCheckResult {
    let check_time = Utc::now();
    let (nameservers, status, error) = match exchange
        .exchange(&query.registrable, RecordType::NS, &query.nameserver)
        .await
    {
        Ok(answers) => {
            let hosts = answers
                .into_iter()
                .filter_map(|answer| match answer {
                    Answer::Ns(host) => Some(host),
                    _ => None,
                })
                .collect();
            (hosts, CheckStatus::Success, None)
        }
        Err(e) => (Vec::new(), CheckStatus::Failed, Some(e.to_string())),
    };

    NsCheckResult {
        domain: query.registrable.clone(),
        nameserver: query.nameserver.clone(),
        nameservers,
        status,
        error,
        check_time,
    }
}

/// SOA of the registrable domain.
pub async fn soa_check(exchange: &dyn DnsExchange, query: &DomainQuery) -> SoaCheckResult {
    let check_time = Utc::now();
    let (soa, status, error) = match exchange
        .exchange(&query.registrable, RecordType::SOA, &query.nameserver)
        .await
    {
        Ok(answers) => {
            let soa = answers.into_iter().find_map(|answer| match answer {
                Answer::Soa(soa) => Some(soa),
                _ => None,
            });
            (soa, CheckStatus::Success, None)
        }
        Err(e) => (None, CheckStatus::Failed, Some(e.to_string())),
    };

    SoaCheckResult {
        domain: query.registrable.clone(),
        nameserver: query.nameserver.clone(),
        soa,
        status,
        error,
        check_time,
    }
}

/// Ask the starting nameserver for a full zone transfer.
///
/// A refused transfer is a successful check with `transfer_allowed = false`.
pub async fn axfr_check(exchange: &dyn DnsExchange, query: &DomainQuery) -> AxfrCheckResult {
    let check_time = Utc::now();
    let result = exchange
        .probe_transfer(&query.registrable, &query.nameserver)
        .await;

    if let Ok(true) = result {
        log::warn!(
            "{} allows zone transfers of {}",
            query.nameserver,
            query.registrable
        );
    }

    let (transfer_allowed, status, error) = match result {
        Ok(allowed) => (allowed, CheckStatus::Success, None),
        Err(e) => (false, CheckStatus::Failed, Some(e.to_string())),
    };

    AxfrCheckResult {
        domain: query.registrable.clone(),
        nameserver: query.nameserver.clone(),
        transfer_allowed,
        status,
        error,
        check_time,
    }
}

/// Like [`DnsExchange::exchange`], but NXDOMAIN means nothing is published.
async fn lookup(
    exchange: &dyn DnsExchange,
    name: &str,
    record_type: RecordType,
    server: &str,
) -> Result<Vec<Answer>, ExchangeError> {
    match exchange.exchange(name, record_type, server).await {
        Err(ExchangeError::NameError) => Ok(Vec::new()),
        other => other,
    }
}

/// MX records in answer order, stably sorted by preference.
fn mx_records(answers: Vec<Answer>) -> Vec<MxRecord> {
    let mut records: Vec<MxRecord> = answers
        .into_iter()
        .filter_map(|answer| match answer {
            Answer::Mx(mx) => Some(mx),
            _ => None,
        })
        .collect();
    records.sort_by_key(|mx| mx.preference);
    records
}

fn txt_strings(answers: Vec<Answer>) -> impl Iterator<Item = String> {
    answers.into_iter().filter_map(|answer| match answer {
        Answer::Txt(text) => Some(text),
        _ => None,
    })
}

/// `text` starts with the version tag `tag`, compared case-insensitively and
/// followed by a space, a `;` or nothing.
fn has_version_tag(text: &str, tag: &str) -> bool {
    let Some(head) = text.get(..tag.len()) else {
        return false;
    };
    head.eq_ignore_ascii_case(tag)
        && text[tag.len()..]
            .chars()
            .next()
            .is_none_or(|c| c == ' ' || c == ';')
}

/// Mail exchangers of the registrable domain.
pub async fn mx_check(exchange: &dyn DnsExchange, query: &DomainQuery) -> MxCheckResult {
    let check_time = Utc::now();
    let (records, status, error) =
        match lookup(exchange, &query.registrable, RecordType::MX, &query.nameserver).await {
            Ok(answers) => (mx_records(answers), CheckStatus::Success, None),
            Err(e) => (Vec::new(), CheckStatus::Failed, Some(e.to_string())),
        };

    MxCheckResult {
        domain: query.registrable.clone(),
        nameserver: query.nameserver.clone(),
        records,
        status,
        error,
        check_time,
    }
}

async fn txt_policy(
    exchange: &dyn DnsExchange,
    query: &DomainQuery,
    name: String,
    selector: Option<String>,
    accept: impl Fn(&str) -> bool,
) -> TxtPolicyResult {
    let check_time = Utc::now();
    let (records, status, error) =
        match lookup(exchange, &name, RecordType::TXT, &query.nameserver).await {
            Ok(answers) => (
                txt_strings(answers).filter(|text| accept(text)).collect(),
                CheckStatus::Success,
                None,
            ),
            Err(e) => (Vec::new(), CheckStatus::Failed, Some(e.to_string())),
        };

    TxtPolicyResult {
        domain: query.registrable.clone(),
        name,
        nameserver: query.nameserver.clone(),
        selector,
        published: !records.is_empty(),
        records,
        status,
        error,
        check_time,
    }
}

/// `v=spf1` TXT records of the registrable domain.
pub async fn spf_check(exchange: &dyn DnsExchange, query: &DomainQuery) -> TxtPolicyResult {
    let name = query.registrable.clone();
    txt_policy(exchange, query, name, None, |text| has_version_tag(text, "v=spf1")).await
}

/// `v=DMARC1` TXT records at `_dmarc.<domain>`.
pub async fn dmarc_check(exchange: &dyn DnsExchange, query: &DomainQuery) -> TxtPolicyResult {
    let name = format!("_dmarc.{}", query.registrable);
    txt_policy(exchange, query, name, None, |text| {
        has_version_tag(text, "v=DMARC1")
    })
    .await
}

/// DKIM key TXT at `<selector>._domainkey.<domain>`.
///
/// Without a selector only the existence of `_domainkey.<domain>` is tested:
/// any `NOERROR` answer means the subtree exists, NXDOMAIN that it does not.
pub async fn dkim_check(
    exchange: &dyn DnsExchange,
    query: &DomainQuery,
    selector: Option<&str>,
) -> TxtPolicyResult {
    if let Some(selector) = selector {
        let name = format!("{selector}._domainkey.{}", query.registrable);
        return txt_policy(exchange, query, name, Some(selector.to_string()), |_| true).await;
    }

    let check_time = Utc::now();
    let name = format!("_domainkey.{}", query.registrable);
    let (published, status, error) =
        match exchange.exchange(&name, RecordType::A, &query.nameserver).await {
            Ok(_) => (true, CheckStatus::Success, None),
            Err(ExchangeError::NameError) => (false, CheckStatus::Success, None),
            Err(e) => (false, CheckStatus::Failed, Some(e.to_string())),
        };

    TxtPolicyResult {
        domain: query.registrable.clone(),
        name,
        nameserver: query.nameserver.clone(),
        selector: None,
        records: Vec::new(),
        published,
        status,
        error,
        check_time,
    }
}

/// TLSA records at `_25._tcp.<mx>` for every mail exchanger of the domain.
///
/// A failed TLSA lookup is reported on its host; only a failed MX lookup
/// fails the check.
pub async fn tlsa_check(exchange: &dyn DnsExchange, query: &DomainQuery) -> TlsaCheckResult {
    let check_time = Utc::now();
    let mut result = TlsaCheckResult {
        domain: query.registrable.clone(),
        nameserver: query.nameserver.clone(),
        hosts: Vec::new(),
        status: CheckStatus::Success,
        error: None,
        check_time,
    };

    let mail_hosts =
        match lookup(exchange, &query.registrable, RecordType::MX, &query.nameserver).await {
            Ok(answers) => mx_records(answers),
            Err(e) => {
                result.status = CheckStatus::Failed;
                result.error = Some(e.to_string());
                return result;
            }
        };

    // Null MX (RFC 7505) has an empty exchange and no TLSA to look up.
    for mx in mail_hosts.into_iter().filter(|mx| !mx.exchange.is_empty()) {
        let name = format!("_25._tcp.{}", mx.exchange);
        let (records, error) =
            match lookup(exchange, &name, RecordType::TLSA, &query.nameserver).await {
                Ok(answers) => (
                    answers
                        .into_iter()
                        .filter_map(|answer| match answer {
                            Answer::Tlsa(tlsa) => Some(tlsa),
                            _ => None,
                        })
                        .collect(),
                    None,
                ),
                Err(e) => (Vec::new(), Some(e.to_string())),
            };
        result.hosts.push(MailHostTlsa {
            exchange: mx.exchange,
            preference: mx.preference,
            name,
            records,
            error,
        });
    }
    result
}
