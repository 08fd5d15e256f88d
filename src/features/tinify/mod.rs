pub mod client;
pub mod models;

/// 免费账户的月度压缩次数上限
pub const FREE_TIER_MONTHLY_LIMIT: u64 = 500;

pub use client::TinifyClient;
pub use models::{CommandSet, ServiceUsage};
