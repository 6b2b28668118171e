//! Bonus codes and the validity engine.
//!
//! A code is minted for one tier and counts toward every tier reachable from
//! it through `lower` edges, as long as the target tier's validity window
//! has not passed. `verify_codes` turns a presented set of codes into the
//! set of unlocked tiers and consumes the codes on success.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use skyward_core::error::SkywardError;
use skyward_crypto::generate_bonus_code_id;

use crate::catalog::{TierCatalog, TierIdx};

/// A single-use credential: "one booking happened at this tier".
#[derive(Debug, Clone, Serialize)]
pub struct BonusCode {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub minted_for: TierIdx,
}

impl BonusCode {
    /// Within tier `target`'s validity window at `now`?
    fn in_window(&self, catalog: &TierCatalog, target: TierIdx, now: DateTime<Utc>) -> bool {
        now <= self.created_at + Duration::days(catalog.tier(target).valid_duration_days)
    }

    /// All tiers this code currently counts toward: DFS from `minted_for`
    /// through `lower`, memoised so a diamond never counts a tier twice.
    pub fn valid_tiers(&self, catalog: &TierCatalog, now: DateTime<Utc>) -> Vec<TierIdx> {
        let mut valid = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![self.minted_for];
        while let Some(idx) = stack.pop() {
            if !visited.insert(idx) {
                continue;
            }
            if self.in_window(catalog, idx, now) {
                valid.push(idx);
            }
            stack.extend(catalog.tier(idx).lower.iter().copied());
        }
        valid
    }
}

/// All codes minted and not yet spent.
#[derive(Debug, Default)]
pub struct CodeRegistry {
    codes: HashMap<String, BonusCode>,
}

impl CodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh code for `tier` and register it.
    pub fn mint(&mut self, tier: TierIdx, now: DateTime<Utc>) -> Result<String, SkywardError> {
        let id = generate_bonus_code_id()?;
        self.codes.insert(
            id.clone(),
            BonusCode {
                id: id.clone(),
                created_at: now,
                minted_for: tier,
            },
        );
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<&BonusCode> {
        self.codes.get(id)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn clear(&mut self) {
        self.codes.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &BonusCode> {
        self.codes.values()
    }
}

/// Check which tiers the presented codes unlock.
///
/// Tiers are tried most-senior-first; the first tier whose counted codes
/// reach its threshold wins, and the unlocked set is that tier plus its
/// direct lower tiers. On success every presented code is removed from the
/// registry; on failure the registry is untouched and the result is empty.
pub fn verify_codes(
    registry: &mut CodeRegistry,
    catalog: &TierCatalog,
    presented: &[String],
    now: DateTime<Utc>,
) -> Vec<TierIdx> {
    let mut counts = vec![0usize; catalog.len()];

    // A code id presented twice is still one code.
    let distinct: HashSet<&String> = presented.iter().collect();
    for code_id in &distinct {
        if let Some(code) = registry.get(code_id) {
            for tier in code.valid_tiers(catalog, now) {
                counts[tier] += 1;
            }
        }
    }

    for &tier in catalog.priority_order() {
        if counts[tier] >= catalog.tier(tier).min_codes {
            let mut accessible = catalog.tier(tier).lower.clone();
            accessible.push(tier);
            debug!(
                tier = %catalog.tier(tier).id,
                codes = distinct.len(),
                unlocked = accessible.len(),
                "codes accepted"
            );
            // Spent: the whole presented set is invalidated, valid or not.
            for code_id in &distinct {
                registry.codes.remove(*code_id);
            }
            return accessible;
        }
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{default_catalog, TierSpec};

    fn mint_n(registry: &mut CodeRegistry, tier: TierIdx, n: usize, now: DateTime<Utc>) -> Vec<String> {
        (0..n).map(|_| registry.mint(tier, now).unwrap()).collect()
    }

    #[test]
    fn high_code_counts_for_all_three_tiers() {
        let catalog = default_catalog();
        let mut registry = CodeRegistry::new();
        let now = Utc::now();
        let id = registry.mint(catalog.get("high").unwrap(), now).unwrap();
        let tiers = registry.get(&id).unwrap().valid_tiers(&catalog, now);
        assert_eq!(tiers.len(), 3);
    }

    #[test]
    fn diamond_counts_each_tier_once() {
        let catalog = TierCatalog::build(vec![
            TierSpec {
                id: "base".into(),
                valid_duration_days: 100,
                min_codes: 1,
                lower: vec![],
            },
            TierSpec {
                id: "left".into(),
                valid_duration_days: 100,
                min_codes: 1,
                lower: vec!["base".into()],
            },
            TierSpec {
                id: "right".into(),
                valid_duration_days: 100,
                min_codes: 1,
                lower: vec!["base".into()],
            },
            TierSpec {
                id: "top".into(),
                valid_duration_days: 100,
                min_codes: 1,
                lower: vec!["left".into(), "right".into()],
            },
        ])
        .unwrap();
        let mut registry = CodeRegistry::new();
        let now = Utc::now();
        let id = registry.mint(catalog.get("top").unwrap(), now).unwrap();
        let tiers = registry.get(&id).unwrap().valid_tiers(&catalog, now);
        assert_eq!(tiers.len(), 4, "base must not be counted through both arms");
    }

    #[test]
    fn expired_code_counts_only_toward_longer_windows() {
        let catalog = default_catalog();
        let mut registry = CodeRegistry::new();
        let minted_at = Utc::now() - Duration::days(20);
        let id = registry.mint(catalog.get("high").unwrap(), minted_at).unwrap();
        let tiers = registry.get(&id).unwrap().valid_tiers(&catalog, Utc::now());
        // 20 days old: past high's 10-day window, inside middle's 30 and low's 50.
        let names: Vec<&str> = tiers.iter().map(|&i| catalog.tier(i).id.as_str()).collect();
        assert!(!names.contains(&"high"));
        assert!(names.contains(&"middle"));
        assert!(names.contains(&"low"));
    }

    #[test]
    fn five_high_codes_unlock_everything_once() {
        let catalog = default_catalog();
        let mut registry = CodeRegistry::new();
        let now = Utc::now();
        let codes = mint_n(&mut registry, catalog.get("high").unwrap(), 5, now);

        let unlocked = verify_codes(&mut registry, &catalog, &codes, now);
        assert_eq!(unlocked.len(), 3);
        assert!(registry.is_empty(), "presented codes are consumed");

        // Replay with the same code ids finds nothing.
        let replay = verify_codes(&mut registry, &catalog, &codes, now);
        assert!(replay.is_empty());
    }

    #[test]
    fn insufficient_codes_leave_registry_untouched() {
        let catalog = default_catalog();
        let mut registry = CodeRegistry::new();
        let now = Utc::now();
        let codes = mint_n(&mut registry, catalog.get("middle").unwrap(), 2, now);

        let unlocked = verify_codes(&mut registry, &catalog, &codes, now);
        assert!(unlocked.is_empty());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn three_middle_codes_unlock_middle_and_low() {
        let catalog = default_catalog();
        let mut registry = CodeRegistry::new();
        let now = Utc::now();
        let codes = mint_n(&mut registry, catalog.get("middle").unwrap(), 3, now);

        let unlocked = verify_codes(&mut registry, &catalog, &codes, now);
        let names: Vec<&str> = unlocked.iter().map(|&i| catalog.tier(i).id.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"middle"));
        assert!(names.contains(&"low"));
    }

    #[test]
    fn duplicate_code_ids_count_once() {
        let catalog = default_catalog();
        let mut registry = CodeRegistry::new();
        let now = Utc::now();
        let code = registry.mint(catalog.get("middle").unwrap(), now).unwrap();
        let presented = vec![code.clone(), code.clone(), code];

        let unlocked = verify_codes(&mut registry, &catalog, &presented, now);
        assert!(unlocked.is_empty(), "one code presented thrice is not three codes");
        assert_eq!(registry.len(), 1);
    }
}
