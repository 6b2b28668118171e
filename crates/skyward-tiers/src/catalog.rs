//! The reward-tier hierarchy.
//!
//! Tiers form a DAG: a broader tier lists the narrower tiers its codes also
//! unlock. Cyclic references are a configuration fault and are rejected when
//! the catalog is built. The classic arena trick keeps the graph index-based
//! so tiers need no interior pointers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use skyward_core::error::SkywardError;

pub type TierIdx = usize;

/// One reward tier. Immutable after the catalog is built.
#[derive(Debug, Clone, Serialize)]
pub struct Tier {
    pub id: String,
    /// Days a code minted for this tier stays redeemable toward it.
    pub valid_duration_days: i64,
    /// Codes required to unlock this tier.
    pub min_codes: usize,
    /// Directly covered narrower tiers, in declaration order.
    pub lower: Vec<TierIdx>,
}

/// Declarative input to [`TierCatalog::build`]; lower tiers by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierSpec {
    pub id: String,
    pub valid_duration_days: i64,
    pub min_codes: usize,
    pub lower: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TierCatalog {
    tiers: Vec<Tier>,
    index: HashMap<String, TierIdx>,
    /// Tier indices most-senior-first: descending fan-out, ties broken by id.
    priority: Vec<TierIdx>,
}

impl TierCatalog {
    pub fn build(specs: Vec<TierSpec>) -> Result<Self, SkywardError> {
        let mut index = HashMap::with_capacity(specs.len());
        for (idx, spec) in specs.iter().enumerate() {
            index.insert(spec.id.clone(), idx);
        }

        let mut tiers = Vec::with_capacity(specs.len());
        for spec in &specs {
            let mut lower = Vec::with_capacity(spec.lower.len());
            for lower_id in &spec.lower {
                let lower_idx = *index.get(lower_id).ok_or_else(|| {
                    SkywardError::UnknownLowerTier(spec.id.clone(), lower_id.clone())
                })?;
                lower.push(lower_idx);
            }
            tiers.push(Tier {
                id: spec.id.clone(),
                valid_duration_days: spec.valid_duration_days,
                min_codes: spec.min_codes,
                lower,
            });
        }

        reject_cycles(&tiers)?;

        let mut priority: Vec<TierIdx> = (0..tiers.len()).collect();
        priority.sort_by(|&a, &b| {
            tiers[b]
                .lower
                .len()
                .cmp(&tiers[a].lower.len())
                .then_with(|| tiers[a].id.cmp(&tiers[b].id))
        });

        Ok(Self {
            tiers,
            index,
            priority,
        })
    }

    pub fn get(&self, id: &str) -> Option<TierIdx> {
        self.index.get(id).copied()
    }

    pub fn tier(&self, idx: TierIdx) -> &Tier {
        &self.tiers[idx]
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TierIdx, &Tier)> {
        self.tiers.iter().enumerate()
    }

    /// Tier indices in verification order (most-senior tier first).
    pub fn priority_order(&self) -> &[TierIdx] {
        &self.priority
    }
}

/// Three-colour DFS over the `lower` edges.
fn reject_cycles(tiers: &[Tier]) -> Result<(), SkywardError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        White,
        Grey,
        Black,
    }

    fn visit(tiers: &[Tier], marks: &mut [Mark], idx: TierIdx) -> Result<(), SkywardError> {
        match marks[idx] {
            Mark::Black => return Ok(()),
            Mark::Grey => return Err(SkywardError::TierCycle(tiers[idx].id.clone())),
            Mark::White => {}
        }
        marks[idx] = Mark::Grey;
        for &lower in &tiers[idx].lower {
            visit(tiers, marks, lower)?;
        }
        marks[idx] = Mark::Black;
        Ok(())
    }

    let mut marks = vec![Mark::White; tiers.len()];
    for idx in 0..tiers.len() {
        visit(tiers, &mut marks, idx)?;
    }
    Ok(())
}

/// The stock three-tier hierarchy: low (50 days, 5 codes), middle (30 days,
/// 3 codes), high (10 days, 1 code); high covers middle and low, middle
/// covers low.
pub fn default_catalog() -> TierCatalog {
    let specs = vec![
        TierSpec {
            id: "low".into(),
            valid_duration_days: 50,
            min_codes: 5,
            lower: vec![],
        },
        TierSpec {
            id: "middle".into(),
            valid_duration_days: 30,
            min_codes: 3,
            lower: vec!["low".into()],
        },
        TierSpec {
            id: "high".into(),
            valid_duration_days: 10,
            min_codes: 1,
            lower: vec!["middle".into(), "low".into()],
        },
    ];
    TierCatalog::build(specs).expect("stock catalog is well-formed")
}
