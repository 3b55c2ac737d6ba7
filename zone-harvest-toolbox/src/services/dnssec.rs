//! DNSSEC chain-of-trust validation.
//!
//! DS records come from a registry-level nameserver (the parent zone), DNSKEY
//! records from the domain's own nameserver (the child zone). Every DNSKEY is
//! turned back into a DS digest and the result is joined against the
//! published set.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use hickory_resolver::proto::{dnssec::rdata::DNSKEY, rr::RecordType};

use crate::error::ExchangeError;
use crate::types::{
    ChainValidation, CheckOptions, CheckStatus, CheckStep, DenialOfExistence, DigestPolicy,
    DnskeyRecord, DnssecCheckResult, DomainQuery, DsRecord, SecurePolicy, StepError,
};

use super::delegation::{probe_domain_state, query_servers, resolve_delegation};
use super::digest::{key_tag, to_ds, to_record};
use super::exchange::{Answer, DnsExchange};
use super::nsec::classify;

/// A DS record recomputed from a DNSKEY, together with that key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecomputedKey {
    pub key: DnskeyRecord,
    pub ds: DsRecord,
}

/// DS records published for `domain`, asked of registry-level `servers`.
pub async fn fetch_ds(
    exchange: &dyn DnsExchange,
    domain: &str,
    servers: &[String],
) -> Result<Vec<DsRecord>, ExchangeError> {
    let answers = query_servers(exchange, servers, domain, RecordType::DS).await?;
    Ok(answers
        .into_iter()
        .filter_map(|answer| match answer {
            Answer::Ds(ds) => Some(ds),
            _ => None,
        })
        .collect())
}

/// DNSKEY material published by `domain`, asked of its own `servers`.
pub async fn fetch_dnskey(
    exchange: &dyn DnsExchange,
    domain: &str,
    servers: &[String],
) -> Result<Vec<DNSKEY>, ExchangeError> {
    let answers = query_servers(exchange, servers, domain, RecordType::DNSKEY).await?;
    Ok(answers
        .into_iter()
        .filter_map(|answer| match answer {
            Answer::Dnskey(key) => Some(key),
            _ => None,
        })
        .collect())
}

/// Digest types to recompute, in first-seen order of the published set.
pub fn select_digest_types(published: &[DsRecord], policy: DigestPolicy) -> Vec<u8> {
    match policy {
        DigestPolicy::FirstPublished => published.iter().map(|ds| ds.digest_type).take(1).collect(),
        DigestPolicy::AllPublished => {
            let mut types = Vec::new();
            for ds in published {
                if !types.contains(&ds.digest_type) {
                    types.push(ds.digest_type);
                }
            }
            types
        }
    }
}

/// One recomputed DS per key and supported digest type, keys in answer order
/// within each digest type.
pub fn recompute_from_keys(
    domain: &str,
    keys: &[DNSKEY],
    digest_types: &[u8],
) -> Vec<RecomputedKey> {
    let mut recomputed = Vec::with_capacity(keys.len() * digest_types.len());
    for &digest_type in digest_types {
        for key in keys {
            match to_ds(domain, key, digest_type) {
                Some(ds) => recomputed.push(RecomputedKey {
                    key: to_record(key),
                    ds,
                }),
                None => log::debug!(
                    "Skipping digest type {digest_type} for key {} of {domain}",
                    key_tag(key)
                ),
            }
        }
    }
    recomputed
}

/// Re-query the DNSKEY set and recompute DS digests from it.
pub async fn recompute_ds(
    exchange: &dyn DnsExchange,
    domain: &str,
    digest_types: &[u8],
    servers: &[String],
) -> Result<Vec<RecomputedKey>, ExchangeError> {
    let keys = fetch_dnskey(exchange, domain, servers).await?;
    Ok(recompute_from_keys(domain, &keys, digest_types))
}

/// Join published DS records against recomputed ones by digest.
///
/// Matches are listed in published order; `matched_dnskey[i]` is the key
/// behind `matched_ds[i]` and carries it as its `calculated_ds`.
pub fn match_chain(
    published: Vec<DsRecord>,
    fetched: Vec<DnskeyRecord>,
    recomputed: Vec<RecomputedKey>,
    policy: SecurePolicy,
) -> ChainValidation {
    let mut by_digest: HashMap<String, &RecomputedKey> = HashMap::with_capacity(recomputed.len());
    for entry in &recomputed {
        by_digest
            .entry(entry.ds.digest.to_ascii_lowercase())
            .or_insert(entry);
    }

    let mut matched_ds = Vec::new();
    let mut matched_dnskey = Vec::new();
    for ds in &published {
        if let Some(entry) = by_digest.get(&ds.digest.to_ascii_lowercase()) {
            let mut key = entry.key.clone();
            key.calculated_ds = Some(entry.ds.clone());
            matched_ds.push(entry.ds.clone());
            matched_dnskey.push(key);
        }
    }

    let secure = match policy {
        SecurePolicy::Strict => !matched_ds.is_empty(),
        SecurePolicy::Lenient => !published.is_empty() && !recomputed.is_empty(),
    };

    ChainValidation {
        recomputed_ds: recomputed.into_iter().map(|entry| entry.ds).collect(),
        published_ds: published,
        fetched_dnskey: fetched,
        matched_ds,
        matched_dnskey,
        secure,
    }
}

fn step_error(step: CheckStep, error: &ExchangeError) -> StepError {
    StepError {
        step,
        category: error.category().to_string(),
        message: error.to_string(),
    }
}

// u128 -> u64: elapsed millis for one check will never exceed u64::MAX
#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Run the whole chain-of-trust check for an already validated query.
///
/// Only the domain-state probe and a transport failure during the delegation
/// walk can fail the check. Error rcodes at a delegation level, DS, DNSKEY and
/// recomputation failures end up in `step_errors`.
pub async fn dnssec_check(
    exchange: &dyn DnsExchange,
    query: DomainQuery,
    options: &CheckOptions,
) -> DnssecCheckResult {
    let start = Instant::now();
    let mut result = DnssecCheckResult {
        query,
        delegation: None,
        validation: ChainValidation::default(),
        denial: DenialOfExistence::None,
        status: CheckStatus::Success,
        error: None,
        step_errors: Vec::new(),
        check_time: Utc::now(),
        response_time_ms: 0,
    };

    let fatal = if options.probe_domain_state {
        probe_domain_state(exchange, &result.query)
            .await
            .err()
            .map(|e| (CheckStep::DomainState, e))
    } else {
        None
    };

    let delegation = match fatal {
        Some(failure) => Err(failure),
        None => resolve_delegation(exchange, &result.query)
            .await
            .map_err(|e| (CheckStep::Delegation, e)),
    };
    let walk = match delegation {
        Ok(walk) => walk,
        Err((step, e)) => {
            log::warn!("DNSSEC check of {} aborted: {e}", result.query.registrable);
            result.status = CheckStatus::Failed;
            result.error = Some(e.to_string());
            result.step_errors.push(step_error(step, &e));
            result.response_time_ms = elapsed_ms(start);
            return result;
        }
    };

    for level in &walk.degraded {
        result.step_errors.push(StepError {
            step: CheckStep::Delegation,
            category: level.error.category().to_string(),
            message: format!("NS {}: {}", level.zone, level.error),
        });
    }
    let delegation = walk.delegation;

    let domain = result.query.registrable.clone();
    let registry_servers = delegation.registry.servers_for(options.delegation_policy);
    let domain_servers = delegation.domain.servers_for(options.delegation_policy);

    let published = fetch_ds(exchange, &domain, registry_servers)
        .await
        .unwrap_or_else(|e| {
            result.step_errors.push(step_error(CheckStep::FetchDs, &e));
            Vec::new()
        });

    let keys = fetch_dnskey(exchange, &domain, domain_servers)
        .await
        .unwrap_or_else(|e| {
            result.step_errors.push(step_error(CheckStep::FetchDnskey, &e));
            Vec::new()
        });

    let recomputed = if published.is_empty() || keys.is_empty() {
        Vec::new()
    } else {
        let digest_types = select_digest_types(&published, options.digest_policy);
        recompute_ds(exchange, &domain, &digest_types, domain_servers)
            .await
            .unwrap_or_else(|e| {
                result.step_errors.push(step_error(CheckStep::RecomputeDs, &e));
                Vec::new()
            })
    };

    let fetched = keys.iter().map(to_record).collect();
    result.validation = match_chain(published, fetched, recomputed, options.secure_policy);
    result.denial = classify(exchange, &domain, domain_servers).await;
    result.delegation = Some(delegation);
    result.response_time_ms = elapsed_ms(start);

    log::debug!(
        "DNSSEC check of {domain}: secure={}, {} DS, {} DNSKEY, {} matched",
        result.validation.secure,
        result.validation.published_ds.len(),
        result.validation.fetched_dnskey.len(),
        result.validation.matched_ds.len()
    );
    result
}
