pub mod catalog;
pub mod codes;

pub use catalog::{default_catalog, Tier, TierCatalog, TierIdx, TierSpec};
pub use codes::{verify_codes, BonusCode, CodeRegistry};
