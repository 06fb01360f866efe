//! Tracked platform operations — transactions the platform submits and
//! follows to confirmation (deployments, transfers, identity verifications,
//! …). These feed success-rate, gas, confirmation-time, and active-investor
//! metrics.

use serde::{Deserialize, Serialize};

/// The kinds of platform operations tracked for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Deployment,
    Transfer,
    BridgeTransfer,
    IdentityVerification,
    AgentOperation,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployment => "deployment",
            Self::Transfer => "transfer",
            Self::BridgeTransfer => "bridge_transfer",
            Self::IdentityVerification => "identity_verification",
            Self::AgentOperation => "agent_operation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deployment" => Some(Self::Deployment),
            "transfer" => Some(Self::Transfer),
            "bridge_transfer" => Some(Self::BridgeTransfer),
            "identity_verification" => Some(Self::IdentityVerification),
            "agent_operation" => Some(Self::AgentOperation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Confirmed,
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One tracked operation. Upserted by id as its status progresses
/// (pending → confirmed/failed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Caller-chosen identifier, typically the transaction hash.
    pub id: String,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub network: String,
    pub from: Option<String>,
    pub to: Option<String>,
    /// Acting investor wallet, when distinct from `from`/`to`.
    pub user: Option<String>,
    pub gas_used: Option<u64>,
    /// Unix timestamp when the operation was submitted.
    pub started_at: i64,
    /// Unix timestamp of confirmation, once confirmed.
    pub confirmed_at: Option<i64>,
}

impl OperationRecord {
    /// All investor addresses this operation touches.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.from
            .iter()
            .chain(self.to.iter())
            .chain(self.user.iter())
            .map(|s| s.as_str())
    }

    /// Milliseconds from submission to confirmation, when both are known.
    pub fn confirmation_ms(&self) -> Option<u64> {
        let confirmed = self.confirmed_at?;
        let delta = confirmed.checked_sub(self.started_at)?;
        if delta < 0 {
            return None;
        }
        Some(delta as u64 * 1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op() -> OperationRecord {
        OperationRecord {
            id: "0xdeadbeef".into(),
            kind: OperationKind::Transfer,
            status: OperationStatus::Confirmed,
            network: "sepolia".into(),
            from: Some("0x1".into()),
            to: Some("0x2".into()),
            user: None,
            gas_used: Some(65_000),
            started_at: 1_700_000_000,
            confirmed_at: Some(1_700_000_030),
        }
    }

    #[test]
    fn addresses_skips_missing() {
        let record = op();
        let addrs: Vec<&str> = record.addresses().collect();
        assert_eq!(addrs, vec!["0x1", "0x2"]);
    }

    #[test]
    fn confirmation_ms() {
        assert_eq!(op().confirmation_ms(), Some(30_000));

        let mut pending = op();
        pending.confirmed_at = None;
        assert_eq!(pending.confirmation_ms(), None);
    }

    #[test]
    fn kind_parse_roundtrip() {
        for kind in [
            OperationKind::Deployment,
            OperationKind::Transfer,
            OperationKind::BridgeTransfer,
            OperationKind::IdentityVerification,
            OperationKind::AgentOperation,
        ] {
            assert_eq!(OperationKind::parse(kind.as_str()), Some(kind));
        }
    }
}
