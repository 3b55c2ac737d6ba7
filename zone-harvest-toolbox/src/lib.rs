//! Domain health diagnostics for zone-harvest.
//!
//! Walks the delegation path of a domain, correlates the DS records published
//! by its parent with the DNSKEY records it publishes itself, and classifies
//! its denial-of-existence mechanism. NS, SOA, zone-transfer and mail checks
//! (MX, SPF, DMARC, DKIM, DANE TLSA) ride on the same exchange primitive.
//! Every check is stateless.

mod error;
mod services;
mod types;

pub use error::{ExchangeError, HarvestError, HarvestResult};
pub use hickory_resolver::proto::{dnssec::rdata::DNSKEY, rr::RecordType};
pub use services::{
    Answer, DnsExchange, Exchanger, HarvestService, TokioTransport, Transport,
    build_domain_query, compute_ds_digest, key_tag, to_ds,
};
pub use types::{
    AxfrCheckResult, BatchFailure, BatchReport, ChainValidation, CheckKind, CheckOptions,
    CheckReport, CheckRequest, CheckStatus, CheckStep, Delegation, DelegationLevel,
    DelegationPolicy, DenialOfExistence, DenialRecord, DigestPolicy, DnskeyRecord,
    DnssecCheckResult, DomainQuery, DsRecord, MailHostTlsa, MxCheckResult, MxRecord,
    NsCheckResult, NsecCheckResult, RegistrySuffix, SecurePolicy, SoaCheckResult, SoaRecord,
    StepError, TlsaCheckResult, TlsaRecord, TxtPolicyResult,
};
