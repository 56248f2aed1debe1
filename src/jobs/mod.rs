pub mod expiration;
pub mod settlement;

pub use expiration::{expire_pledges, ExpirationReport, ExpiredCampaign};
pub use settlement::{
    charge_pledges, ChargedPledge, FailedPledge, SettlementOptions, SettlementReport, SettlementResults,
    SettlementSummary,
};
