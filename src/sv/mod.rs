pub mod affiliate;
pub mod commission;
pub mod directory;
pub mod ledger;
pub mod payout;
pub mod referral;
pub mod split;
pub mod stats;
pub mod stripe;
#[cfg(test)]
pub mod test_utils;
pub mod user;

pub use affiliate::Affiliate;
pub use commission::Commissions;
pub use ledger::Ledger;
pub use referral::Referral;
pub use stats::Stats;
