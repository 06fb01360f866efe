//! Domain-event classification — decodes raw log events emitted by the
//! property-security contracts into a closed set of typed variants.
//!
//! The signature set covers the permissioned-token surface: transfers,
//! claim topics, modular compliance changes, identity registry changes,
//! country restrictions, lockups, holder limits, and compliance violations.
//! Logs whose topic0 matches no known signature classify as `Unrecognized`
//! and are counted by the ingestor, never silently discarded.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tiny_keccak::{Hasher, Keccak};

use crate::error::IndexerError;
use crate::types::LogEvent;

/// Compute the keccak256 topic hash of a canonical event signature string,
/// e.g. `"Transfer(address,address,uint256)"`.
pub fn signature_topic(signature: &str) -> String {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(signature.as_bytes());
    hasher.finalize(&mut output);
    format!("0x{}", hex::encode(output))
}

// ─── Known signatures ────────────────────────────────────────────────────────

/// The closed set of event kinds this engine decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Transfer,
    ClaimAdded,
    ModuleAdded,
    ModuleRemoved,
    IdentityRegistered,
    IdentityRemoved,
    IdentityUpdated,
    CountryBlacklisted,
    CountryWhitelisted,
    LockupSet,
    HolderLimitSet,
    ComplianceViolation,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transfer => "Transfer",
            Self::ClaimAdded => "ClaimAdded",
            Self::ModuleAdded => "ModuleAdded",
            Self::ModuleRemoved => "ModuleRemoved",
            Self::IdentityRegistered => "IdentityRegistered",
            Self::IdentityRemoved => "IdentityRemoved",
            Self::IdentityUpdated => "IdentityUpdated",
            Self::CountryBlacklisted => "CountryBlacklisted",
            Self::CountryWhitelisted => "CountryWhitelisted",
            Self::LockupSet => "LockupSet",
            Self::HolderLimitSet => "HolderLimitSet",
            Self::ComplianceViolation => "ComplianceViolation",
        }
    }
}

/// Canonical signatures of the contract events the platform emits.
pub const SIGNATURES: &[(&str, EventKind)] = &[
    ("Transfer(address,address,uint256)", EventKind::Transfer),
    ("ClaimAdded(bytes32,uint256,address)", EventKind::ClaimAdded),
    ("ModuleAdded(address)", EventKind::ModuleAdded),
    ("ModuleRemoved(address)", EventKind::ModuleRemoved),
    ("IdentityRegistered(address,address)", EventKind::IdentityRegistered),
    ("IdentityRemoved(address,address)", EventKind::IdentityRemoved),
    ("IdentityUpdated(address,address)", EventKind::IdentityUpdated),
    ("CountryBlacklisted(uint16)", EventKind::CountryBlacklisted),
    ("CountryWhitelisted(uint16)", EventKind::CountryWhitelisted),
    ("LockupSet(address,uint256)", EventKind::LockupSet),
    ("HolderLimitSet(uint256)", EventKind::HolderLimitSet),
    (
        "ComplianceViolation(address,address,uint256,string)",
        EventKind::ComplianceViolation,
    ),
];

/// topic0 → event kind lookup, built once per ingestor.
pub struct SignatureRegistry {
    map: HashMap<String, EventKind>,
}

impl SignatureRegistry {
    pub fn new() -> Self {
        let map = SIGNATURES
            .iter()
            .map(|(sig, kind)| (signature_topic(sig), *kind))
            .collect();
        Self { map }
    }

    /// Look up an event kind by its topic0 hash.
    pub fn lookup(&self, topic0: &str) -> Option<EventKind> {
        self.map.get(topic0).copied()
    }

    /// Classify a stored log event into a typed domain event.
    ///
    /// A log with an unknown (or missing) topic0 is `Unrecognized` — a
    /// normal outcome, not an error. A log that matches a known signature
    /// but cannot be decoded is a malformed-data error; the batch carrying
    /// it fails and is retried rather than being treated as empty.
    pub fn classify(&self, event: &LogEvent) -> Result<Classification, IndexerError> {
        let kind = match event.topic0().and_then(|t| self.lookup(t)) {
            Some(kind) => kind,
            None => return Ok(Classification::Unrecognized),
        };
        let prov = Provenance::from_event(event);
        let decoded = match kind {
            EventKind::Transfer => decode_transfer(prov, event)?,
            EventKind::ClaimAdded => decode_claim_added(prov, event)?,
            EventKind::ModuleAdded => decode_module(prov, event, ComplianceAction::ModuleAdded)?,
            EventKind::ModuleRemoved => {
                decode_module(prov, event, ComplianceAction::ModuleRemoved)?
            }
            EventKind::IdentityRegistered => {
                decode_identity(prov, event, IdentityAction::Registered)?
            }
            EventKind::IdentityRemoved => decode_identity(prov, event, IdentityAction::Removed)?,
            EventKind::IdentityUpdated => decode_identity(prov, event, IdentityAction::Updated)?,
            EventKind::CountryBlacklisted => {
                decode_country(prov, event, ComplianceAction::CountryBlacklisted)?
            }
            EventKind::CountryWhitelisted => {
                decode_country(prov, event, ComplianceAction::CountryWhitelisted)?
            }
            EventKind::LockupSet => decode_lockup(prov, event)?,
            EventKind::HolderLimitSet => decode_holder_limit(prov, event)?,
            EventKind::ComplianceViolation => decode_violation(prov, event)?,
        };
        Ok(Classification::Known(decoded))
    }
}

impl Default for SignatureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of classifying a single log.
#[derive(Debug, Clone)]
pub enum Classification {
    Known(DomainEvent),
    Unrecognized,
}

// ─── Domain events ───────────────────────────────────────────────────────────

/// Shared provenance carried by every domain event — ties the decoded row
/// back to the raw log it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub network: String,
    pub block_number: u64,
    pub tx_hash: String,
    pub log_index: u32,
    pub timestamp: i64,
}

impl Provenance {
    pub fn from_event(event: &LogEvent) -> Self {
        Self {
            network: event.network.clone(),
            block_number: event.block_number,
            tx_hash: event.tx_hash.clone(),
            log_index: event.log_index,
            timestamp: event.timestamp,
        }
    }

    /// The natural key shared with the raw event: (network, tx_hash, log_index).
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.network, self.tx_hash, self.log_index)
    }
}

/// A token transfer between two verified investors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferEvent {
    pub provenance: Provenance,
    /// The security-token contract.
    pub token: String,
    pub from: String,
    pub to: String,
    /// Decimal string when the value fits 128 bits, `0x…` hex otherwise.
    pub amount: String,
}

/// A modular-compliance configuration change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceEvent {
    pub provenance: Provenance,
    /// The compliance module (or the compliance contract itself for
    /// country/lockup/limit changes).
    pub module: String,
    pub action: ComplianceAction,
    /// ISO numeric country code, for country actions.
    pub country: Option<u16>,
    /// Affected investor address, where the action has one.
    pub subject: Option<String>,
    /// Action parameter (release timestamp, holder limit), decimal string.
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceAction {
    ModuleAdded,
    ModuleRemoved,
    CountryBlacklisted,
    CountryWhitelisted,
    LockupSet,
    HolderLimitSet,
}

impl ComplianceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModuleAdded => "module_added",
            Self::ModuleRemoved => "module_removed",
            Self::CountryBlacklisted => "country_blacklisted",
            Self::CountryWhitelisted => "country_whitelisted",
            Self::LockupSet => "lockup_set",
            Self::HolderLimitSet => "holder_limit_set",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "module_added" => Some(Self::ModuleAdded),
            "module_removed" => Some(Self::ModuleRemoved),
            "country_blacklisted" => Some(Self::CountryBlacklisted),
            "country_whitelisted" => Some(Self::CountryWhitelisted),
            "lockup_set" => Some(Self::LockupSet),
            "holder_limit_set" => Some(Self::HolderLimitSet),
            _ => None,
        }
    }
}

/// An identity-registry change for an investor wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityEvent {
    pub provenance: Provenance,
    pub investor: String,
    /// The on-chain identity contract bound to the wallet.
    pub identity: String,
    pub action: IdentityAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityAction {
    Registered,
    Removed,
    Updated,
}

impl IdentityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Removed => "removed",
            Self::Updated => "updated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "registered" => Some(Self::Registered),
            "removed" => Some(Self::Removed),
            "updated" => Some(Self::Updated),
            _ => None,
        }
    }
}

/// A claim attached to an investor identity (KYC, accreditation, …).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimEvent {
    pub provenance: Provenance,
    /// The identity contract the claim was added to (the emitter).
    pub identity: String,
    pub claim_id: String,
    pub topic: u64,
    pub issuer: String,
}

/// A transfer the compliance layer rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceViolation {
    pub provenance: Provenance,
    pub token: String,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub reason: String,
}

/// A decoded, typed projection of a raw log event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    Transfer(TransferEvent),
    Compliance(ComplianceEvent),
    Identity(IdentityEvent),
    Claim(ClaimEvent),
    Violation(ComplianceViolation),
}

impl DomainEvent {
    pub fn provenance(&self) -> &Provenance {
        match self {
            Self::Transfer(e) => &e.provenance,
            Self::Compliance(e) => &e.provenance,
            Self::Identity(e) => &e.provenance,
            Self::Claim(e) => &e.provenance,
            Self::Violation(e) => &e.provenance,
        }
    }

    pub fn is_violation(&self) -> bool {
        matches!(self, Self::Violation(_))
    }
}

// ─── Decoders ────────────────────────────────────────────────────────────────

fn decode_err(event: &LogEvent, reason: impl Into<String>) -> IndexerError {
    IndexerError::Decode {
        context: format!("{} log {}", event.network, event.key()),
        reason: reason.into(),
    }
}

/// Extract an address from an indexed topic (last 20 of 32 bytes).
fn topic_address(event: &LogEvent, index: usize) -> Result<String, IndexerError> {
    let topic = event
        .topics
        .get(index)
        .ok_or_else(|| decode_err(event, format!("missing topic[{index}]")))?;
    let raw = topic.strip_prefix("0x").unwrap_or(topic);
    if raw.len() != 64 || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(decode_err(event, format!("topic[{index}] is not a 32-byte word")));
    }
    Ok(format!("0x{}", raw[24..].to_ascii_lowercase()))
}

/// Extract a u64 from an indexed topic. Errors on values beyond 64 bits.
fn topic_u64(event: &LogEvent, index: usize) -> Result<u64, IndexerError> {
    let topic = event
        .topics
        .get(index)
        .ok_or_else(|| decode_err(event, format!("missing topic[{index}]")))?;
    let raw = topic.strip_prefix("0x").unwrap_or(topic);
    if raw.len() != 64 {
        return Err(decode_err(event, format!("topic[{index}] is not a 32-byte word")));
    }
    if raw[..48].chars().any(|c| c != '0') {
        return Err(decode_err(event, format!("topic[{index}] exceeds u64")));
    }
    u64::from_str_radix(&raw[48..], 16)
        .map_err(|e| decode_err(event, format!("topic[{index}]: {e}")))
}

/// Split the data payload into 32-byte words.
fn data_words(event: &LogEvent) -> Result<Vec<[u8; 32]>, IndexerError> {
    let raw = event.data.strip_prefix("0x").unwrap_or(&event.data);
    let bytes = hex::decode(raw).map_err(|e| decode_err(event, format!("data hex: {e}")))?;
    if bytes.len() % 32 != 0 {
        return Err(decode_err(event, "data is not word-aligned"));
    }
    Ok(bytes
        .chunks_exact(32)
        .map(|c| {
            let mut word = [0u8; 32];
            word.copy_from_slice(c);
            word
        })
        .collect())
}

/// Render a uint256 word: decimal when it fits 128 bits, `0x…` hex otherwise.
fn word_quantity(word: &[u8; 32]) -> String {
    if word[..16].iter().all(|&b| b == 0) {
        let mut value = 0u128;
        for &b in &word[16..] {
            value = (value << 8) | b as u128;
        }
        value.to_string()
    } else {
        format!("0x{}", hex::encode(word))
    }
}

/// A uint256 word that must fit u64 (country codes, claim topics).
fn word_u64(event: &LogEvent, word: &[u8; 32]) -> Result<u64, IndexerError> {
    if word[..24].iter().any(|&b| b != 0) {
        return Err(decode_err(event, "word exceeds u64"));
    }
    let mut value = 0u64;
    for &b in &word[24..] {
        value = (value << 8) | b as u64;
    }
    Ok(value)
}

/// Decode an ABI-encoded dynamic string at the given head-word index.
fn abi_string(event: &LogEvent, words: &[[u8; 32]], head_index: usize) -> Result<String, IndexerError> {
    let offset_word = words
        .get(head_index)
        .ok_or_else(|| decode_err(event, format!("missing data word[{head_index}]")))?;
    let offset = word_u64(event, offset_word)? as usize;
    if offset % 32 != 0 || offset / 32 >= words.len() {
        return Err(decode_err(event, "string offset out of range"));
    }
    let length_index = offset / 32;
    let length = word_u64(event, &words[length_index])? as usize;
    let bytes: Vec<u8> = words[length_index + 1..]
        .iter()
        .flatten()
        .copied()
        .take(length)
        .collect();
    if bytes.len() < length {
        return Err(decode_err(event, "string data truncated"));
    }
    String::from_utf8(bytes).map_err(|e| decode_err(event, format!("string utf8: {e}")))
}

fn decode_transfer(prov: Provenance, event: &LogEvent) -> Result<DomainEvent, IndexerError> {
    let from = topic_address(event, 1)?;
    let to = topic_address(event, 2)?;
    let words = data_words(event)?;
    let amount = words
        .first()
        .map(word_quantity)
        .ok_or_else(|| decode_err(event, "transfer missing amount word"))?;
    Ok(DomainEvent::Transfer(TransferEvent {
        provenance: prov,
        token: event.address.clone(),
        from,
        to,
        amount,
    }))
}

fn decode_claim_added(prov: Provenance, event: &LogEvent) -> Result<DomainEvent, IndexerError> {
    let claim_id = event
        .topics
        .get(1)
        .cloned()
        .ok_or_else(|| decode_err(event, "missing claim id topic"))?;
    let topic = topic_u64(event, 2)?;
    let issuer = topic_address(event, 3)?;
    Ok(DomainEvent::Claim(ClaimEvent {
        provenance: prov,
        identity: event.address.clone(),
        claim_id,
        topic,
        issuer,
    }))
}

fn decode_module(
    prov: Provenance,
    event: &LogEvent,
    action: ComplianceAction,
) -> Result<DomainEvent, IndexerError> {
    let module = topic_address(event, 1)?;
    Ok(DomainEvent::Compliance(ComplianceEvent {
        provenance: prov,
        module,
        action,
        country: None,
        subject: None,
        value: None,
    }))
}

fn decode_identity(
    prov: Provenance,
    event: &LogEvent,
    action: IdentityAction,
) -> Result<DomainEvent, IndexerError> {
    let investor = topic_address(event, 1)?;
    let identity = topic_address(event, 2)?;
    Ok(DomainEvent::Identity(IdentityEvent {
        provenance: prov,
        investor,
        identity,
        action,
    }))
}

fn decode_country(
    prov: Provenance,
    event: &LogEvent,
    action: ComplianceAction,
) -> Result<DomainEvent, IndexerError> {
    let words = data_words(event)?;
    let word = words
        .first()
        .ok_or_else(|| decode_err(event, "country event missing data word"))?;
    let code = word_u64(event, word)?;
    let country = u16::try_from(code).map_err(|_| decode_err(event, "country code exceeds u16"))?;
    Ok(DomainEvent::Compliance(ComplianceEvent {
        provenance: prov,
        module: event.address.clone(),
        action,
        country: Some(country),
        subject: None,
        value: None,
    }))
}

fn decode_lockup(prov: Provenance, event: &LogEvent) -> Result<DomainEvent, IndexerError> {
    let investor = topic_address(event, 1)?;
    let words = data_words(event)?;
    let release = words
        .first()
        .map(word_quantity)
        .ok_or_else(|| decode_err(event, "lockup missing release word"))?;
    Ok(DomainEvent::Compliance(ComplianceEvent {
        provenance: prov,
        module: event.address.clone(),
        action: ComplianceAction::LockupSet,
        country: None,
        subject: Some(investor),
        value: Some(release),
    }))
}

fn decode_holder_limit(prov: Provenance, event: &LogEvent) -> Result<DomainEvent, IndexerError> {
    let words = data_words(event)?;
    let limit = words
        .first()
        .map(word_quantity)
        .ok_or_else(|| decode_err(event, "holder limit missing data word"))?;
    Ok(DomainEvent::Compliance(ComplianceEvent {
        provenance: prov,
        module: event.address.clone(),
        action: ComplianceAction::HolderLimitSet,
        country: None,
        subject: None,
        value: Some(limit),
    }))
}

fn decode_violation(prov: Provenance, event: &LogEvent) -> Result<DomainEvent, IndexerError> {
    let from = topic_address(event, 1)?;
    let to = topic_address(event, 2)?;
    let words = data_words(event)?;
    let amount = words
        .first()
        .map(word_quantity)
        .ok_or_else(|| decode_err(event, "violation missing amount word"))?;
    let reason = abi_string(event, &words, 1)?;
    Ok(DomainEvent::Violation(ComplianceViolation {
        provenance: prov,
        token: event.address.clone(),
        from,
        to,
        amount,
        reason,
    }))
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn word_hex(value: u64) -> String {
        format!("{value:064x}")
    }

    fn address_topic(addr: &str) -> String {
        let raw = addr.strip_prefix("0x").unwrap_or(addr);
        format!("0x{}{}", "0".repeat(64 - raw.len()), raw)
    }

    fn base_event(signature: &str, topics: Vec<String>, data: String) -> LogEvent {
        let mut all_topics = vec![signature_topic(signature)];
        all_topics.extend(topics);
        LogEvent {
            network: "sepolia".into(),
            address: "0x1111111111111111111111111111111111111111".into(),
            topics: all_topics,
            data,
            block_number: 100,
            tx_hash: "0xabc".into(),
            tx_index: 0,
            block_hash: "0xblock".into(),
            log_index: 0,
            timestamp: 1_700_000_000,
            removed: false,
        }
    }

    #[test]
    fn transfer_signature_matches_erc20() {
        // Well-known ERC-20 Transfer topic hash.
        assert_eq!(
            signature_topic("Transfer(address,address,uint256)"),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn classify_transfer() {
        let registry = SignatureRegistry::new();
        let event = base_event(
            "Transfer(address,address,uint256)",
            vec![
                address_topic("0x2222222222222222222222222222222222222222"),
                address_topic("0x3333333333333333333333333333333333333333"),
            ],
            format!("0x{}", word_hex(1_000)),
        );
        let classified = registry.classify(&event).unwrap();
        match classified {
            Classification::Known(DomainEvent::Transfer(t)) => {
                assert_eq!(t.from, "0x2222222222222222222222222222222222222222");
                assert_eq!(t.to, "0x3333333333333333333333333333333333333333");
                assert_eq!(t.amount, "1000");
                assert_eq!(t.token, event.address);
            }
            other => panic!("expected transfer, got {other:?}"),
        }
    }

    #[test]
    fn classify_unknown_topic() {
        let registry = SignatureRegistry::new();
        let event = base_event("SomethingElse(uint256)", vec![], "0x".into());
        assert!(matches!(
            registry.classify(&event).unwrap(),
            Classification::Unrecognized
        ));
    }

    #[test]
    fn classify_anonymous_log() {
        let registry = SignatureRegistry::new();
        let mut event = base_event("Transfer(address,address,uint256)", vec![], "0x".into());
        event.topics.clear();
        assert!(matches!(
            registry.classify(&event).unwrap(),
            Classification::Unrecognized
        ));
    }

    #[test]
    fn malformed_known_event_is_error() {
        let registry = SignatureRegistry::new();
        // Transfer with no indexed topics — known signature, undecodable.
        let event = base_event("Transfer(address,address,uint256)", vec![], "0x".into());
        assert!(registry.classify(&event).is_err());
    }

    #[test]
    fn classify_country_blacklisted() {
        let registry = SignatureRegistry::new();
        let event = base_event(
            "CountryBlacklisted(uint16)",
            vec![],
            format!("0x{}", word_hex(840)), // US numeric code
        );
        match registry.classify(&event).unwrap() {
            Classification::Known(DomainEvent::Compliance(c)) => {
                assert_eq!(c.action, ComplianceAction::CountryBlacklisted);
                assert_eq!(c.country, Some(840));
            }
            other => panic!("expected compliance event, got {other:?}"),
        }
    }

    #[test]
    fn classify_violation_with_reason() {
        let registry = SignatureRegistry::new();
        // data: amount, string offset (0x40), string length, string bytes
        let reason = "country restricted";
        let mut data = String::from("0x");
        data.push_str(&word_hex(500));
        data.push_str(&word_hex(0x40));
        data.push_str(&word_hex(reason.len() as u64));
        let mut reason_hex = hex::encode(reason.as_bytes());
        while reason_hex.len() % 64 != 0 {
            reason_hex.push('0');
        }
        data.push_str(&reason_hex);

        let event = base_event(
            "ComplianceViolation(address,address,uint256,string)",
            vec![
                address_topic("0x4444444444444444444444444444444444444444"),
                address_topic("0x5555555555555555555555555555555555555555"),
            ],
            data,
        );
        match registry.classify(&event).unwrap() {
            Classification::Known(DomainEvent::Violation(v)) => {
                assert_eq!(v.amount, "500");
                assert_eq!(v.reason, "country restricted");
                assert_eq!(v.from, "0x4444444444444444444444444444444444444444");
            }
            other => panic!("expected violation, got {other:?}"),
        }
    }

    #[test]
    fn classify_identity_registered() {
        let registry = SignatureRegistry::new();
        let event = base_event(
            "IdentityRegistered(address,address)",
            vec![
                address_topic("0x6666666666666666666666666666666666666666"),
                address_topic("0x7777777777777777777777777777777777777777"),
            ],
            "0x".into(),
        );
        match registry.classify(&event).unwrap() {
            Classification::Known(DomainEvent::Identity(i)) => {
                assert_eq!(i.action, IdentityAction::Registered);
                assert_eq!(i.investor, "0x6666666666666666666666666666666666666666");
                assert_eq!(i.identity, "0x7777777777777777777777777777777777777777");
            }
            other => panic!("expected identity event, got {other:?}"),
        }
    }

    #[test]
    fn word_quantity_large_value_stays_hex() {
        let mut word = [0u8; 32];
        word[0] = 0x01; // > u128
        assert!(word_quantity(&word).starts_with("0x01"));

        let mut small = [0u8; 32];
        small[31] = 42;
        assert_eq!(word_quantity(&small), "42");
    }
}
