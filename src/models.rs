use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Pending,
    Funded,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PledgeStatus {
    Pending,
    Charged,
    Failed,
    Cancelled,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Pending => "pending",
            CampaignStatus::Funded => "funded",
            CampaignStatus::Expired => "expired",
        }
    }
}

impl PledgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PledgeStatus::Pending => "pending",
            PledgeStatus::Charged => "charged",
            PledgeStatus::Failed => "failed",
            PledgeStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PledgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CampaignStatus::Pending),
            "funded" => Ok(CampaignStatus::Funded),
            "expired" => Ok(CampaignStatus::Expired),
            other => Err(format!("unknown campaign status '{}'", other)),
        }
    }
}

impl FromStr for PledgeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PledgeStatus::Pending),
            "charged" => Ok(PledgeStatus::Charged),
            "failed" => Ok(PledgeStatus::Failed),
            "cancelled" => Ok(PledgeStatus::Cancelled),
            other => Err(format!("unknown pledge status '{}'", other)),
        }
    }
}

/// A funding request (a row of `test_requests`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    /// Accumulated pledged amount, minor currency units
    pub current_funding: i64,
    /// Funding goal, minor currency units
    pub test_cost: i64,
    pub status: CampaignStatus,
    pub expiration_date: DateTime<Utc>,
}

impl Campaign {
    pub fn goal_met(&self) -> bool {
        self.current_funding >= self.test_cost
    }
}

/// A user's committed, not yet captured payment toward a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pledge {
    pub id: Uuid,
    pub test_request_id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub amount: i64,
    #[serde(default)]
    pub payment_method_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub status: PledgeStatus,
    #[serde(default)]
    pub charged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
}
