//! Capability keys.
//!
//! Keys are a closed set of known capabilities plus an `Other` passthrough
//! bucket. Validation happens once, where external configuration or a write
//! request enters the system; everything downstream works with `FlagKey`.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tenantry_core::DomainError;

pub const MAX_FLAG_KEY_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FlagKey {
    Beta,
    AiAssistant,
    SmsCampaigns,
    EmailCampaigns,
    Automations,
    LeadScoring,
    SlaTimers,
    Invoicing,
    JobScheduling,
    AnalyticsDashboard,
    ClientPortal,
    DocumentTemplates,
    /// A well-formed key this build does not know about (passed through untouched).
    Other(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlagKeyError {
    #[error("flag key is empty")]
    Empty,

    #[error("flag key exceeds {MAX_FLAG_KEY_LEN} characters")]
    TooLong,

    #[error("flag key contains invalid character {0:?}")]
    InvalidChar(char),
}

impl FlagKey {
    pub const KNOWN: [FlagKey; 12] = [
        FlagKey::Beta,
        FlagKey::AiAssistant,
        FlagKey::SmsCampaigns,
        FlagKey::EmailCampaigns,
        FlagKey::Automations,
        FlagKey::LeadScoring,
        FlagKey::SlaTimers,
        FlagKey::Invoicing,
        FlagKey::JobScheduling,
        FlagKey::AnalyticsDashboard,
        FlagKey::ClientPortal,
        FlagKey::DocumentTemplates,
    ];

    /// Validate a raw key and map it onto the known set.
    pub fn parse(raw: &str) -> Result<Self, FlagKeyError> {
        if raw.is_empty() {
            return Err(FlagKeyError::Empty);
        }
        if raw.len() > MAX_FLAG_KEY_LEN {
            return Err(FlagKeyError::TooLong);
        }
        if let Some(c) = raw.chars().find(|c| {
            !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-'))
        }) {
            return Err(FlagKeyError::InvalidChar(c));
        }

        Ok(Self::KNOWN
            .iter()
            .find(|k| k.as_str() == raw)
            .cloned()
            .unwrap_or_else(|| FlagKey::Other(raw.to_string())))
    }

    pub fn as_str(&self) -> &str {
        match self {
            FlagKey::Beta => "beta",
            FlagKey::AiAssistant => "ai_assistant",
            FlagKey::SmsCampaigns => "sms_campaigns",
            FlagKey::EmailCampaigns => "email_campaigns",
            FlagKey::Automations => "automations",
            FlagKey::LeadScoring => "lead_scoring",
            FlagKey::SlaTimers => "sla_timers",
            FlagKey::Invoicing => "invoicing",
            FlagKey::JobScheduling => "job_scheduling",
            FlagKey::AnalyticsDashboard => "analytics_dashboard",
            FlagKey::ClientPortal => "client_portal",
            FlagKey::DocumentTemplates => "document_templates",
            FlagKey::Other(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, FlagKey::Other(_))
    }
}

impl core::fmt::Display for FlagKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlagKey {
    type Err = FlagKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<FlagKeyError> for DomainError {
    fn from(value: FlagKeyError) -> Self {
        DomainError::validation(format!("flag key: {value}"))
    }
}

impl TryFrom<String> for FlagKey {
    type Error = FlagKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FlagKey> for String {
    fn from(value: FlagKey) -> Self {
        match value {
            FlagKey::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}
