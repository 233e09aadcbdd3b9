pub mod affiliate;
pub mod commission;
pub mod pool;
pub mod pool_contribution;
pub mod user;

pub use affiliate::Track;
pub use commission::CommissionStatus;
pub use pool::PoolStatus;
