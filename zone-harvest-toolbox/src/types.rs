//! Public types returned by toolbox operations.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of check a batch request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    /// DNSSEC chain-of-trust validation (includes denial-of-existence).
    Dnssec,
    /// Stand-alone denial-of-existence classification.
    Nsec,
    /// Name server set of the registrable domain.
    Ns,
    /// Start of authority of the registrable domain.
    Soa,
    /// Zone-transfer probe.
    Axfr,
    /// Mail exchangers.
    Mx,
    /// SPF policy (`v=spf1` TXT).
    Spf,
    /// DMARC policy at `_dmarc.<domain>`.
    Dmarc,
    /// DKIM key or `_domainkey` subtree.
    Dkim,
    /// DANE TLSA records of the mail exchangers.
    Tlsa,
}

impl CheckKind {
    /// Every check kind, in the order the CLI runs them.
    pub const ALL: [Self; 10] = [
        Self::Dnssec,
        Self::Nsec,
        Self::Ns,
        Self::Soa,
        Self::Axfr,
        Self::Mx,
        Self::Spf,
        Self::Dmarc,
        Self::Dkim,
        Self::Tlsa,
    ];
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dnssec => write!(f, "dnssec"),
            Self::Nsec => write!(f, "nsec"),
            Self::Ns => write!(f, "ns"),
            Self::Soa => write!(f, "soa"),
            Self::Axfr => write!(f, "axfr"),
            Self::Mx => write!(f, "mx"),
            Self::Spf => write!(f, "spf"),
            Self::Dmarc => write!(f, "dmarc"),
            Self::Dkim => write!(f, "dkim"),
            Self::Tlsa => write!(f, "tlsa"),
        }
    }
}

/// Which of a delegation level's nameservers the next step talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DelegationPolicy {
    /// Only the first listed nameserver.
    #[default]
    First,
    /// Every listed nameserver in order; the first successful exchange wins.
    InOrder,
}

/// Which digest algorithms DS recomputation covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DigestPolicy {
    /// Every distinct digest type present in the published DS set.
    #[default]
    AllPublished,
    /// Only the digest type of the first published DS record.
    FirstPublished,
}

/// How the `secure` verdict is derived from the chain match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecurePolicy {
    /// Secure only when at least one published DS matches a recomputed one.
    #[default]
    Strict,
    /// Secure whenever both the published and the recomputed DS sets are
    /// non-empty, matched or not.
    Lenient,
}

/// Tunables shared by every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct CheckOptions {
    /// Deadline of a single UDP or TCP attempt, in seconds.
    pub timeout_secs: u64,
    /// Nameserver selection for registry- and domain-level queries.
    pub delegation_policy: DelegationPolicy,
    /// Digest types used for DS recomputation.
    pub digest_policy: DigestPolicy,
    /// Rule for the `secure` verdict.
    pub secure_policy: SecurePolicy,
    /// Run the SOA domain-state probe before walking the delegation.
    pub probe_domain_state: bool,
    /// DKIM selector to look up. Without one the DKIM check only tests
    /// whether `_domainkey.<domain>` exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dkim_selector: Option<String>,
}

impl CheckOptions {
    /// Per-attempt exchange timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            delegation_policy: DelegationPolicy::default(),
            digest_policy: DigestPolicy::default(),
            secure_policy: SecurePolicy::default(),
            probe_domain_state: true,
            dkim_selector: None,
        }
    }
}

/// Terminal status of a check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Success,
    Failed,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Public suffix the registrable domain lives under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySuffix {
    /// Suffix as listed in the Public Suffix List (e.g. `"co.uk"`).
    pub suffix: String,
    /// Whether the suffix comes from the ICANN section of the list.
    pub icann: bool,
}

/// Normalized input of a single check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainQuery {
    /// Domain exactly as supplied by the caller.
    pub input: String,
    /// ASCII (punycode) form of the input.
    pub domain: String,
    /// Effective registrable domain (eTLD+1).
    pub registrable: String,
    /// Registry suffix of the registrable domain.
    pub registry: RegistrySuffix,
    /// Starting nameserver (IP literal or hostname, port 53).
    pub nameserver: String,
}

/// Authoritative nameservers of one zone along the delegation path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationLevel {
    /// Zone name (`"."` for the root).
    pub zone: String,
    /// Nameserver hostnames in answer order, without trailing dot.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nameservers: Vec<String>,
}

impl DelegationLevel {
    /// Nameservers the next step may use under `policy`.
    pub fn servers_for(&self, policy: DelegationPolicy) -> &[String] {
        match policy {
            DelegationPolicy::First => self.nameservers.get(..1).unwrap_or(&[]),
            DelegationPolicy::InOrder => &self.nameservers,
        }
    }
}

/// Root, registry and domain levels of a delegation walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delegation {
    pub root: DelegationLevel,
    pub registry: DelegationLevel,
    pub domain: DelegationLevel,
}

/// A DNSSEC DS (Delegation Signer) record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DsRecord {
    /// Key tag of the referenced DNSKEY.
    pub key_tag: u16,
    /// Algorithm number.
    pub algorithm: u8,
    /// Human-readable algorithm name.
    pub algorithm_name: String,
    /// Digest type (1 = SHA-1, 2 = SHA-256, 4 = SHA-384).
    pub digest_type: u8,
    /// Human-readable digest type name.
    pub digest_type_name: String,
    /// Hex-encoded digest.
    pub digest: String,
}

/// A DNSSEC DNSKEY record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnskeyRecord {
    /// Flags (256 = ZSK, 257 = KSK).
    pub flags: u16,
    /// Protocol (always 3).
    pub protocol: u8,
    /// Algorithm number.
    pub algorithm: u8,
    /// Human-readable algorithm name.
    pub algorithm_name: String,
    /// Base64-encoded public key.
    pub public_key: String,
    /// Computed key tag.
    pub key_tag: u16,
    /// `"ZSK"` or `"KSK"`.
    pub key_type: String,
    /// DS record recomputed from this key, when paired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculated_ds: Option<DsRecord>,
}

/// Outcome of matching published DS records against recomputed ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainValidation {
    /// DS records published in the parent zone.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub published_ds: Vec<DsRecord>,
    /// DNSKEY records published in the domain's own zone.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fetched_dnskey: Vec<DnskeyRecord>,
    /// DS records recomputed from the DNSKEY set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recomputed_ds: Vec<DsRecord>,
    /// Recomputed DS records equal to a published one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_ds: Vec<DsRecord>,
    /// Keys behind `matched_ds`, index-aligned.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_dnskey: Vec<DnskeyRecord>,
    /// Chain-of-trust verdict.
    pub secure: bool,
}

/// A raw NSEC, NSEC3 or NSEC3PARAM record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DenialRecord {
    /// Owner name.
    pub owner: String,
    /// Time-to-live in seconds.
    pub ttl: u32,
    /// Record data in presentation format.
    pub rdata: String,
}

/// Authenticated-denial-of-existence mechanism in use by a zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "record", rename_all = "lowercase")]
pub enum DenialOfExistence {
    Nsec(DenialRecord),
    Nsec3(DenialRecord),
    Nsec3param(DenialRecord),
    #[default]
    None,
}

impl DenialOfExistence {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Short tag (`"nsec"`, `"nsec3"`, `"nsec3param"`, `"none"`).
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Nsec(_) => "nsec",
            Self::Nsec3(_) => "nsec3",
            Self::Nsec3param(_) => "nsec3param",
            Self::None => "none",
        }
    }
}

/// Pipeline step that produced a non-fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckStep {
    DomainState,
    Delegation,
    FetchDs,
    FetchDnskey,
    RecomputeDs,
}

/// An error recorded during a check without aborting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepError {
    pub step: CheckStep,
    /// Error category (`"transport"`, `"server failure"`, ...).
    pub category: String,
    pub message: String,
}

/// DNSSEC chain-of-trust check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnssecCheckResult {
    /// Normalized input.
    pub query: DomainQuery,
    /// Delegation path, absent when the walk did not complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegation: Option<Delegation>,
    /// DS/DNSKEY correlation.
    pub validation: ChainValidation,
    /// Denial-of-existence mechanism.
    #[serde(default, skip_serializing_if = "DenialOfExistence::is_none")]
    pub denial: DenialOfExistence,
    /// Terminal status.
    pub status: CheckStatus,
    /// Message of the failure that aborted the check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Errors recorded by steps that did not abort the check.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub step_errors: Vec<StepError>,
    /// When the check started.
    pub check_time: DateTime<Utc>,
    /// Total check time in milliseconds.
    pub response_time_ms: u64,
}

/// Stand-alone denial-of-existence check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NsecCheckResult {
    /// Registrable domain probed.
    pub domain: String,
    /// Nameserver queried.
    pub nameserver: String,
    /// Mechanism found.
    #[serde(default, skip_serializing_if = "DenialOfExistence::is_none")]
    pub denial: DenialOfExistence,
    pub check_time: DateTime<Utc>,
}

/// Name server check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NsCheckResult {
    pub domain: String,
    pub nameserver: String,
    /// Nameserver hostnames, without trailing dot.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nameservers: Vec<String>,
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub check_time: DateTime<Utc>,
}

/// Start-of-authority fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoaRecord {
    /// Primary nameserver.
    pub mname: String,
    /// Responsible mailbox.
    pub rname: String,
    pub serial: u32,
    pub refresh: i32,
    pub retry: i32,
    pub expire: i32,
    pub minimum: u32,
}

/// SOA check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoaCheckResult {
    pub domain: String,
    pub nameserver: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soa: Option<SoaRecord>,
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub check_time: DateTime<Utc>,
}

/// Zone-transfer probe result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxfrCheckResult {
    pub domain: String,
    pub nameserver: String,
    /// Whether the server handed out the zone.
    pub transfer_allowed: bool,
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub check_time: DateTime<Utc>,
}

/// One MX record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MxRecord {
    /// Mail exchanger hostname, without trailing dot.
    pub exchange: String,
    pub preference: u16,
}

/// MX check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MxCheckResult {
    pub domain: String,
    pub nameserver: String,
    /// Mail exchangers, lowest preference first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<MxRecord>,
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub check_time: DateTime<Utc>,
}

/// Result of a TXT-based mail policy check (SPF, DMARC or DKIM).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxtPolicyResult {
    /// Registrable domain.
    pub domain: String,
    /// Name that was queried (e.g. `_dmarc.example.com`).
    pub name: String,
    pub nameserver: String,
    /// DKIM selector, for DKIM checks that had one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Matching TXT strings, fragments concatenated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<String>,
    /// Whether a policy (or, for DKIM without selector, the `_domainkey`
    /// subtree) was found.
    pub published: bool,
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub check_time: DateTime<Utc>,
}

/// One TLSA record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsaRecord {
    pub cert_usage: u8,
    pub selector: u8,
    pub matching_type: u8,
    /// Hex-encoded certificate association data.
    pub cert_data: String,
}

/// TLSA records published for one mail exchanger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailHostTlsa {
    /// Mail exchanger hostname.
    pub exchange: String,
    pub preference: u16,
    /// TLSA owner name (`_25._tcp.<exchange>`).
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<TlsaRecord>,
    /// Lookup failure for this host only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// DANE TLSA check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsaCheckResult {
    pub domain: String,
    pub nameserver: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<MailHostTlsa>,
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub check_time: DateTime<Utc>,
}

/// One entry of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub domain: String,
    pub kind: CheckKind,
}

impl CheckRequest {
    pub fn new(domain: impl Into<String>, kind: CheckKind) -> Self {
        Self {
            domain: domain.into(),
            kind,
        }
    }
}

/// Result of one check in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "check", content = "result", rename_all = "lowercase")]
pub enum CheckReport {
    Dnssec(DnssecCheckResult),
    Nsec(NsecCheckResult),
    Ns(NsCheckResult),
    Soa(SoaCheckResult),
    Axfr(AxfrCheckResult),
    Mx(MxCheckResult),
    Spf(TxtPolicyResult),
    Dmarc(TxtPolicyResult),
    Dkim(TxtPolicyResult),
    Tlsa(TlsaCheckResult),
}

impl CheckReport {
    pub fn kind(&self) -> CheckKind {
        match self {
            Self::Dnssec(_) => CheckKind::Dnssec,
            Self::Nsec(_) => CheckKind::Nsec,
            Self::Ns(_) => CheckKind::Ns,
            Self::Soa(_) => CheckKind::Soa,
            Self::Axfr(_) => CheckKind::Axfr,
            Self::Mx(_) => CheckKind::Mx,
            Self::Spf(_) => CheckKind::Spf,
            Self::Dmarc(_) => CheckKind::Dmarc,
            Self::Dkim(_) => CheckKind::Dkim,
            Self::Tlsa(_) => CheckKind::Tlsa,
        }
    }
}

/// First fatal error observed by a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    /// Domain of the failing request, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Check of the failing request, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<CheckKind>,
    pub message: String,
}

/// Everything a batch run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Completed checks, in request order.
    pub reports: Vec<CheckReport>,
    /// First fatal error, if any task failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_failure: Option<BatchFailure>,
}
