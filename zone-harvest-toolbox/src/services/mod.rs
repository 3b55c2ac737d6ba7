//! Service façade exposing all toolbox operations.
//!
//! [`HarvestService`] owns the exchange primitive and the check options; every
//! check it runs is a fresh, independent resolution.

mod batch;
mod delegation;
mod digest;
mod dnssec;
mod exchange;
mod nsec;
mod records;
#[cfg(test)]
mod test_mocks;

use std::sync::Arc;

use crate::error::{HarvestError, HarvestResult};
use crate::types::{
    AxfrCheckResult, BatchReport, CheckKind, CheckOptions, CheckReport, CheckRequest,
    DnssecCheckResult, DomainQuery, MxCheckResult, NsCheckResult, NsecCheckResult,
    RegistrySuffix, SoaCheckResult, TlsaCheckResult, TxtPolicyResult,
};

pub use digest::{compute_ds_digest, key_tag, to_ds};
pub use exchange::{Answer, DnsExchange, Exchanger, TokioTransport, Transport};

/// Validate and normalise a domain name input.
///
/// Trims whitespace and the trailing root dot, rejects IP addresses, converts
/// internationalised domain names (IDN) to ASCII via IDNA 2008, and rejects
/// empty or overlong inputs.
fn validate_domain(domain: &str) -> HarvestResult<String> {
    let domain = domain.trim().trim_end_matches('.');
    if domain.is_empty() {
        return Err(HarvestError::ValidationError(
            "Domain name is required".to_string(),
        ));
    }
    if domain.parse::<std::net::IpAddr>().is_ok() {
        return Err(HarvestError::ValidationError(format!(
            "Expected a domain name, got an IP address: {domain}"
        )));
    }
    let ascii_domain = idna::domain_to_ascii_strict(domain)
        .map_err(|_| HarvestError::ValidationError(format!("Invalid domain name: {domain}")))?;
    if ascii_domain.len() > 253 {
        return Err(HarvestError::ValidationError(format!(
            "Domain name exceeds maximum length of 253 characters (got {})",
            ascii_domain.len()
        )));
    }
    Ok(ascii_domain)
}

/// Validate a starting nameserver: an IP literal or a hostname.
fn validate_nameserver(nameserver: &str) -> HarvestResult<String> {
    let nameserver = nameserver.trim();
    if nameserver.is_empty() {
        return Err(HarvestError::ValidationError(
            "Nameserver is required".to_string(),
        ));
    }
    if nameserver.parse::<std::net::IpAddr>().is_ok() {
        return Ok(nameserver.to_string());
    }
    idna::domain_to_ascii_strict(nameserver.trim_end_matches('.')).map_err(|_| {
        HarvestError::ValidationError(format!("Invalid DNS server address: {nameserver}"))
    })
}

/// Normalise `input`, extract its registrable domain and validate the
/// nameserver. No network traffic.
pub fn build_domain_query(input: &str, nameserver: &str) -> HarvestResult<DomainQuery> {
    let domain = validate_domain(input)?;
    let nameserver = validate_nameserver(nameserver)?;

    let parsed = psl::domain(domain.as_bytes()).ok_or_else(|| {
        HarvestError::ValidationError(format!("No registrable domain in {domain}"))
    })?;
    let suffix = parsed.suffix();
    let registry = RegistrySuffix {
        suffix: String::from_utf8_lossy(suffix.as_bytes()).into_owned(),
        icann: suffix.typ() == Some(psl::Type::Icann),
    };
    let registrable = String::from_utf8_lossy(parsed.as_bytes()).into_owned();

    Ok(DomainQuery {
        input: input.to_string(),
        domain,
        registrable,
        registry,
        nameserver,
    })
}

/// Entry point for every check.
///
/// ```rust,no_run
/// use zone_harvest_toolbox::{CheckOptions, HarvestService};
/// # async fn demo() -> zone_harvest_toolbox::HarvestResult<()> {
/// let service = HarvestService::new(CheckOptions::default());
/// let result = service.dnssec_check("example.com", "8.8.8.8").await?;
/// println!("secure: {}", result.validation.secure);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HarvestService {
    exchange: Arc<dyn DnsExchange>,
    options: CheckOptions,
}

impl HarvestService {
    /// Service over real UDP/TCP sockets.
    pub fn new(options: CheckOptions) -> Self {
        Self {
            exchange: Arc::new(Exchanger::with_timeout(options.timeout())),
            options,
        }
    }

    /// Service over a caller-supplied exchange.
    pub fn with_exchange(exchange: Arc<dyn DnsExchange>, options: CheckOptions) -> Self {
        Self { exchange, options }
    }

    pub fn options(&self) -> &CheckOptions {
        &self.options
    }

    /// Validate the DNSSEC chain of trust of `domain`'s registrable domain,
    /// starting from `nameserver`.
    ///
    /// Only input validation is reported as `Err`; network failures end up
    /// on the result.
    pub async fn dnssec_check(
        &self,
        domain: &str,
        nameserver: &str,
    ) -> HarvestResult<DnssecCheckResult> {
        let query = build_domain_query(domain, nameserver)?;
        Ok(dnssec::dnssec_check(self.exchange.as_ref(), query, &self.options).await)
    }

    /// Classify the denial-of-existence mechanism, asking `nameserver`
    /// directly.
    pub async fn nsec_check(
        &self,
        domain: &str,
        nameserver: &str,
    ) -> HarvestResult<NsecCheckResult> {
        let query = build_domain_query(domain, nameserver)?;
        Ok(nsec::nsec_check(self.exchange.as_ref(), &query).await)
    }

    pub async fn ns_check(&self, domain: &str, nameserver: &str) -> HarvestResult<NsCheckResult> {
        let query = build_domain_query(domain, nameserver)?;
        Ok(records::ns_check(self.exchange.as_ref(), &query).await)
    }

    pub async fn soa_check(
        &self,
        domain: &str,
        nameserver: &str,
    ) -> HarvestResult<SoaCheckResult> {
        let query = build_domain_query(domain, nameserver)?;
        Ok(records::soa_check(self.exchange.as_ref(), &query).await)
    }

    /// Probe whether `nameserver` hands out the zone over AXFR.
    pub async fn axfr_check(
        &self,
        domain: &str,
        nameserver: &str,
    ) -> HarvestResult<AxfrCheckResult> {
        let query = build_domain_query(domain, nameserver)?;
        Ok(records::axfr_check(self.exchange.as_ref(), &query).await)
    }

    pub async fn mx_check(&self, domain: &str, nameserver: &str) -> HarvestResult<MxCheckResult> {
        let query = build_domain_query(domain, nameserver)?;
        Ok(records::mx_check(self.exchange.as_ref(), &query).await)
    }

    pub async fn spf_check(
        &self,
        domain: &str,
        nameserver: &str,
    ) -> HarvestResult<TxtPolicyResult> {
        let query = build_domain_query(domain, nameserver)?;
        Ok(records::spf_check(self.exchange.as_ref(), &query).await)
    }

    pub async fn dmarc_check(
        &self,
        domain: &str,
        nameserver: &str,
    ) -> HarvestResult<TxtPolicyResult> {
        let query = build_domain_query(domain, nameserver)?;
        Ok(records::dmarc_check(self.exchange.as_ref(), &query).await)
    }

    /// DKIM key lookup using the configured selector, or a `_domainkey`
    /// existence test when none is set.
    pub async fn dkim_check(
        &self,
        domain: &str,
        nameserver: &str,
    ) -> HarvestResult<TxtPolicyResult> {
        let query = build_domain_query(domain, nameserver)?;
        let selector = self.options.dkim_selector.as_deref();
        Ok(records::dkim_check(self.exchange.as_ref(), &query, selector).await)
    }

    /// DANE TLSA records of every mail exchanger.
    pub async fn tlsa_check(
        &self,
        domain: &str,
        nameserver: &str,
    ) -> HarvestResult<TlsaCheckResult> {
        let query = build_domain_query(domain, nameserver)?;
        Ok(records::tlsa_check(self.exchange.as_ref(), &query).await)
    }

    /// Run a single check of the given kind.
    pub async fn run_check(
        &self,
        domain: &str,
        kind: CheckKind,
        nameserver: &str,
    ) -> HarvestResult<CheckReport> {
        Ok(match kind {
            CheckKind::Dnssec => CheckReport::Dnssec(self.dnssec_check(domain, nameserver).await?),
            CheckKind::Nsec => CheckReport::Nsec(self.nsec_check(domain, nameserver).await?),
            CheckKind::Ns => CheckReport::Ns(self.ns_check(domain, nameserver).await?),
            CheckKind::Soa => CheckReport::Soa(self.soa_check(domain, nameserver).await?),
            CheckKind::Axfr => CheckReport::Axfr(self.axfr_check(domain, nameserver).await?),
            CheckKind::Mx => CheckReport::Mx(self.mx_check(domain, nameserver).await?),
            CheckKind::Spf => CheckReport::Spf(self.spf_check(domain, nameserver).await?),
            CheckKind::Dmarc => CheckReport::Dmarc(self.dmarc_check(domain, nameserver).await?),
            CheckKind::Dkim => CheckReport::Dkim(self.dkim_check(domain, nameserver).await?),
            CheckKind::Tlsa => CheckReport::Tlsa(self.tlsa_check(domain, nameserver).await?),
        })
    }

    /// Run independent checks concurrently.
    ///
    /// See [`BatchReport`] for how results and failures are reported.
    pub async fn run_batch(&self, nameserver: &str, requests: &[CheckRequest]) -> BatchReport {
        batch::run_batch(self, nameserver, requests).await
    }
}
