//! Delegation walk: NS sets of the root, the registry suffix and the domain.

use hickory_resolver::proto::rr::RecordType;

use crate::error::ExchangeError;
use crate::types::{Delegation, DelegationLevel, DomainQuery};

use super::exchange::{Answer, DnsExchange};

/// SOA probe for the registrable domain against the starting server.
///
/// Any exchange failure means the domain cannot be checked at all.
pub async fn probe_domain_state(
    exchange: &dyn DnsExchange,
    query: &DomainQuery,
) -> Result<(), ExchangeError> {
    exchange
        .exchange(&query.registrable, RecordType::SOA, &query.nameserver)
        .await
        .map(|_| ())
}

/// NS set of `zone` as reported by `server`.
pub async fn resolve_level(
    exchange: &dyn DnsExchange,
    zone: &str,
    server: &str,
) -> Result<DelegationLevel, ExchangeError> {
    let answers = exchange.exchange(zone, RecordType::NS, server).await?;
    let nameservers: Vec<String> = answers
        .into_iter()
        .filter_map(|answer| match answer {
            Answer::Ns(host) => Some(host),
            _ => None,
        })
        .collect();

    log::debug!("{zone}: {} nameserver(s) via {server}", nameservers.len());
    Ok(DelegationLevel {
        zone: zone.to_string(),
        nameservers,
    })
}

/// A delegation level whose NS query got an error response code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradedLevel {
    pub zone: String,
    pub error: ExchangeError,
}

/// Completed delegation walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationWalk {
    pub delegation: Delegation,
    /// Levels left empty because the server answered SERVFAIL, NXDOMAIN or
    /// REFUSED.
    pub degraded: Vec<DegradedLevel>,
}

async fn walk_level(
    exchange: &dyn DnsExchange,
    zone: &str,
    server: &str,
    degraded: &mut Vec<DegradedLevel>,
) -> Result<DelegationLevel, ExchangeError> {
    match resolve_level(exchange, zone, server).await {
        Ok(level) => Ok(level),
        Err(error) if error.is_protocol() => {
            log::debug!("NS {zone} via {server} answered with an error, treating as empty: {error}");
            degraded.push(DegradedLevel {
                zone: zone.to_string(),
                error,
            });
            Ok(DelegationLevel {
                zone: zone.to_string(),
                nameservers: Vec::new(),
            })
        }
        Err(error) => Err(error),
    }
}

/// Walk root, registry and domain, every level asked of the starting server.
///
/// Error response codes leave the level empty; transport, timeout and
/// malformed-message failures abort the walk.
pub async fn resolve_delegation(
    exchange: &dyn DnsExchange,
    query: &DomainQuery,
) -> Result<DelegationWalk, ExchangeError> {
    let mut degraded = Vec::new();
    let root = walk_level(exchange, ".", &query.nameserver, &mut degraded).await?;
    let registry = walk_level(
        exchange,
        &query.registry.suffix,
        &query.nameserver,
        &mut degraded,
    )
    .await?;
    let domain = walk_level(exchange, &query.registrable, &query.nameserver, &mut degraded).await?;

    Ok(DelegationWalk {
        delegation: Delegation {
            root,
            registry,
            domain,
        },
        degraded,
    })
}

/// Ask `servers` in order until one exchange succeeds.
///
/// Returns the last failure when every server fails, or
/// [`ExchangeError::NoNameserver`] when there is nobody to ask.
pub async fn query_servers(
    exchange: &dyn DnsExchange,
    servers: &[String],
    name: &str,
    record_type: RecordType,
) -> Result<Vec<Answer>, ExchangeError> {
    let mut last_error = None;
    for server in servers {
        match exchange.exchange(name, record_type, server).await {
            Ok(answers) => return Ok(answers),
            Err(e) => {
                log::debug!("{record_type} {name} via {server} failed: {e}");
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| ExchangeError::NoNameserver(name.to_string())))
}
