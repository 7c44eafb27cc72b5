//! Risk Classifier
//!
//! Maps a pool's protocol name to a risk tier through a static lookup table.
//! Matching is loose on purpose: a protocol name *containing* a known key
//! (e.g. "aave-v3" contains "aave") takes that key's tier, which tolerates
//! naming variance across feeds. Unknown protocols have no tier and never
//! reach ranking.

use ethers::utils::keccak256;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::types::RiskTier;
use crate::config::RiskConfig;
use crate::market::PoolCandidate;

/// Static protocol -> tier lookup
#[derive(Debug, Clone)]
pub struct ProtocolRiskTable {
    /// Longest key first so the most specific match wins
    entries: Vec<(String, RiskTier)>,
}

impl ProtocolRiskTable {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, RiskTier)>,
        S: AsRef<str>,
    {
        let mut entries: Vec<(String, RiskTier)> = entries
            .into_iter()
            .map(|(name, tier)| (name.as_ref().trim().to_lowercase(), tier))
            .filter(|(name, _)| !name.is_empty())
            .collect();

        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        entries.dedup_by(|later, earlier| later.0 == earlier.0);

        Self { entries }
    }

    pub fn from_config(config: &RiskConfig) -> Self {
        Self::new(config.protocols.iter().map(|(name, tier)| (name.as_str(), *tier)))
    }

    /// Tier for a protocol name, if any known key is contained in it
    pub fn lookup(&self, protocol: &str) -> Option<RiskTier> {
        let normalized = protocol.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(key, _)| normalized.contains(key.as_str()))
            .map(|(_, tier)| *tier)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Numeric risk score in 0..=100
///
/// No scoring model is settled yet; ranking never consults the score.
pub trait RiskScorer: Send + Sync {
    fn score(&self, pool: &PoolCandidate, tier: RiskTier) -> u8;
}

/// Placeholder heuristic: uniform 0..100
pub struct RandomRiskScorer;

impl RiskScorer for RandomRiskScorer {
    fn score(&self, _pool: &PoolCandidate, _tier: RiskTier) -> u8 {
        rand::thread_rng().gen_range(0..100)
    }
}

/// A pool annotated with its tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedPool {
    pub pool: PoolCandidate,
    pub tier: RiskTier,
    pub risk_score: u8,
    /// Stable numeric id derived from the protocol name
    pub strategy_id: u32,
}

impl ClassifiedPool {
    /// Suggested share of funds, inversely proportional to risk
    pub fn allocation_hint_pct(&self) -> u8 {
        100u8.saturating_sub(self.risk_score.min(100))
    }
}

/// First four bytes of keccak256(protocol), big-endian
pub fn strategy_id(protocol: &str) -> u32 {
    let hash = keccak256(protocol.as_bytes());
    u32::from_be_bytes([hash[0], hash[1], hash[2], hash[3]])
}

pub struct RiskClassifier {
    table: ProtocolRiskTable,
    scorer: Box<dyn RiskScorer>,
}

impl RiskClassifier {
    pub fn new(table: ProtocolRiskTable) -> Self {
        Self::with_scorer(table, Box::new(RandomRiskScorer))
    }

    pub fn with_scorer(table: ProtocolRiskTable, scorer: Box<dyn RiskScorer>) -> Self {
        Self { table, scorer }
    }

    pub fn from_config(config: &RiskConfig) -> Self {
        Self::new(ProtocolRiskTable::from_config(config))
    }

    /// Tier for a protocol, `None` when unclassified
    pub fn classify(&self, protocol: &str) -> Option<RiskTier> {
        self.table.lookup(protocol)
    }

    /// Annotate every classifiable pool; unclassified pools are dropped
    pub fn annotate(&self, pools: &[PoolCandidate]) -> Vec<ClassifiedPool> {
        pools
            .iter()
            .filter_map(|pool| {
                let tier = self.classify(&pool.protocol)?;
                Some(ClassifiedPool {
                    risk_score: self.scorer.score(pool, tier).min(100),
                    strategy_id: strategy_id(&pool.protocol),
                    pool: pool.clone(),
                    tier,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedScorer(u8);

    impl RiskScorer for FixedScorer {
        fn score(&self, _pool: &PoolCandidate, _tier: RiskTier) -> u8 {
            self.0
        }
    }

    fn classifier() -> RiskClassifier {
        RiskClassifier::from_config(&RiskConfig::default())
    }

    fn pool(protocol: &str) -> PoolCandidate {
        PoolCandidate {
            pool_id: format!("{}-pool", protocol),
            protocol: protocol.to_string(),
            asset: "usdc".into(),
            apy: 5.0,
            tvl: None,
        }
    }

    #[test]
    fn test_exact_and_substring_match() {
        let c = classifier();
        assert_eq!(c.classify("aave"), Some(RiskTier::Low));
        assert_eq!(c.classify("aave-v3"), Some(RiskTier::Low));
        assert_eq!(c.classify("compound-v2"), Some(RiskTier::Low));
        assert_eq!(c.classify("pendle"), Some(RiskTier::High));
        assert_eq!(c.classify("uniswap-v3"), Some(RiskTier::High));
    }

    #[test]
    fn test_case_insensitive() {
        let c = classifier();
        assert_eq!(c.classify("Aave-V3"), Some(RiskTier::Low));
        assert_eq!(c.classify("  PENDLE "), Some(RiskTier::High));
    }

    #[test]
    fn test_unknown_protocol_is_unclassified() {
        let c = classifier();
        assert_eq!(c.classify("curve-dex"), None);
        assert_eq!(c.classify(""), None);
        assert!(c.annotate(&[pool("curve-dex"), pool("yearn")]).is_empty());
    }

    #[test]
    fn test_longest_key_wins() {
        let table = ProtocolRiskTable::new([
            ("aerodrome", RiskTier::Low),
            ("aerodrome-slipstream", RiskTier::High),
        ]);
        assert_eq!(table.lookup("aerodrome-slipstream"), Some(RiskTier::High));
        assert_eq!(table.lookup("aerodrome-v1"), Some(RiskTier::Low));
    }

    #[test]
    fn test_table_normalizes_keys() {
        let table = ProtocolRiskTable::new([("  Lido ", RiskTier::Low), ("", RiskTier::High)]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("lido"), Some(RiskTier::Low));
    }

    #[test]
    fn test_annotate_attaches_score_and_id() {
        let c = RiskClassifier::with_scorer(
            ProtocolRiskTable::from_config(&RiskConfig::default()),
            Box::new(FixedScorer(30)),
        );
        let annotated = c.annotate(&[pool("aave-v3"), pool("unknown"), pool("pendle")]);
        assert_eq!(annotated.len(), 2);
        assert_eq!(annotated[0].tier, RiskTier::Low);
        assert_eq!(annotated[0].risk_score, 30);
        assert_eq!(annotated[0].allocation_hint_pct(), 70);
        assert_eq!(annotated[0].strategy_id, strategy_id("aave-v3"));
        assert_eq!(annotated[1].tier, RiskTier::High);
    }

    #[test]
    fn test_random_scorer_in_range() {
        let scorer = RandomRiskScorer;
        for _ in 0..100 {
            assert!(scorer.score(&pool("aave"), RiskTier::Low) < 100);
        }
    }

    #[test]
    fn test_strategy_id_is_stable() {
        assert_eq!(strategy_id("aave"), strategy_id("aave"));
        assert_ne!(strategy_id("aave"), strategy_id("pendle"));
    }
}
