//! Canonical rank ladder.
//!
//! The ladder is read from a dedicated two-column region of the roster
//! sheet (rank name, point requirement). It is the only source of rank
//! order: role order on the chat platform and rank strings scattered
//! through roster rows are never used to sequence ranks.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::store::TabularStore;

/// Points cell value marking a rank that is only reachable by explicit flag.
const MANUAL_ONLY_MARKER: &str = "N/A";

/// What it takes to be promoted *into* a rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Requirement {
    Points(u32),
    ManualOnly,
}

impl Requirement {
    /// Parse a ladder points cell: `N/A` (any case), empty (0) or a whole number.
    pub fn parse(rank: &str, raw: &str) -> EngineResult<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case(MANUAL_ONLY_MARKER) {
            return Ok(Requirement::ManualOnly);
        }
        if raw.is_empty() {
            return Ok(Requirement::Points(0));
        }
        if let Ok(points) = raw.parse::<u32>() {
            return Ok(Requirement::Points(points));
        }
        // Sheets may render whole numbers as "20.0"
        match raw.parse::<f64>() {
            Ok(v) if v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => {
                Ok(Requirement::Points(v as u32))
            }
            _ => Err(EngineError::InvalidRequirement {
                rank: rank.to_string(),
                value: raw.to_string(),
            }),
        }
    }

    /// Numeric threshold, 0 for manual-only ranks.
    pub fn points(&self) -> u32 {
        match self {
            Requirement::Points(p) => *p,
            Requirement::ManualOnly => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankLadder {
    order: Vec<String>,
    requirements: HashMap<String, Requirement>,
}

impl RankLadder {
    /// Build from `(rank name, points)` cell pairs in sheet order.
    ///
    /// Blank names are skipped and the first definition of a name wins.
    pub fn build<I, R, P>(rows: I) -> EngineResult<Self>
    where
        I: IntoIterator<Item = (R, P)>,
        R: AsRef<str>,
        P: AsRef<str>,
    {
        let mut order = Vec::new();
        let mut requirements = HashMap::new();

        for (rank, points) in rows {
            let rank = rank.as_ref().trim();
            if rank.is_empty() || requirements.contains_key(rank) {
                continue;
            }
            let requirement = Requirement::parse(rank, points.as_ref())?;
            order.push(rank.to_string());
            requirements.insert(rank.to_string(), requirement);
        }

        if order.is_empty() {
            return Err(EngineError::EmptyLadder);
        }
        Ok(Self { order, requirements })
    }

    /// Build from a raw cell grid: first column rank, second column points.
    /// Missing cells in short rows read as empty.
    pub fn from_grid(grid: &[Vec<String>]) -> EngineResult<Self> {
        Self::build(grid.iter().map(|row| {
            let rank = row.first().map(String::as_str).unwrap_or("");
            let points = row.get(1).map(String::as_str).unwrap_or("");
            (rank, points)
        }))
    }

    /// Read the ladder region from the store.
    pub async fn load(store: &dyn TabularStore, range: &str) -> EngineResult<Self> {
        let grid = store.read_grid(range).await?;
        let ladder = Self::from_grid(&grid)?;
        debug!(range = %range, ranks = ladder.len(), "Loaded rank ladder");
        Ok(ladder)
    }

    /// Position of a rank on the ladder, `None` when unrecognized.
    pub fn index_of(&self, rank: &str) -> Option<usize> {
        self.order.iter().position(|r| r == rank)
    }

    /// The rank after `rank`; the top rank (or an unknown one) maps to itself.
    pub fn next_of<'a>(&'a self, rank: &'a str) -> &'a str {
        match self.index_of(rank) {
            Some(i) if i + 1 < self.order.len() => &self.order[i + 1],
            _ => rank,
        }
    }

    pub fn requirement(&self, rank: &str) -> Option<Requirement> {
        self.requirements.get(rank).copied()
    }

    /// Entry rank for new members.
    pub fn first(&self) -> &str {
        &self.order[0]
    }

    pub fn ranks(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Ladder spelling of a rank name compared trimmed and case-insensitively.
    pub fn canonical(&self, name: &str) -> Option<&str> {
        let wanted = name.trim().to_lowercase();
        self.order
            .iter()
            .find(|r| r.to_lowercase() == wanted)
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn sample() -> RankLadder {
        RankLadder::build([
            ("Rekrut", "0"),
            ("Gemeiner Reiter", "20"),
            ("Sergeant", "N/A"),
        ])
        .unwrap()
    }

    #[test]
    fn test_build_example_ladder() {
        let ladder = sample();
        assert_eq!(ladder.next_of("Rekrut"), "Gemeiner Reiter");
        assert_eq!(ladder.requirement("Gemeiner Reiter"), Some(Requirement::Points(20)));
        assert_eq!(ladder.next_of("Gemeiner Reiter"), "Sergeant");
        assert_eq!(ladder.requirement("Sergeant"), Some(Requirement::ManualOnly));
        assert_eq!(ladder.first(), "Rekrut");
    }

    #[test]
    fn test_next_of_top_rank_is_ceiling() {
        let ladder = sample();
        assert_eq!(ladder.next_of("Sergeant"), "Sergeant");
        let single = RankLadder::build([("Only", "5")]).unwrap();
        assert_eq!(single.next_of("Only"), "Only");
    }

    #[test]
    fn test_skips_blanks_and_duplicates_first_wins() {
        let ladder = RankLadder::build([
            ("  ", "7"),
            (" Rekrut ", "0"),
            ("Gefreiter", "10"),
            ("Rekrut", "99"),
            ("", ""),
            ("Korporal", ""),
        ])
        .unwrap();
        assert_eq!(ladder.ranks(), &["Rekrut", "Gefreiter", "Korporal"]);
        assert_eq!(ladder.requirement("Rekrut"), Some(Requirement::Points(0)));
        assert_eq!(ladder.requirement("Korporal"), Some(Requirement::Points(0)));
    }

    #[test]
    fn test_manual_only_case_insensitive() {
        let ladder = RankLadder::build([("A", "0"), ("B", " n/a ")]).unwrap();
        assert_eq!(ladder.requirement("B"), Some(Requirement::ManualOnly));
    }

    #[test]
    fn test_empty_ladder_fails() {
        let rows: Vec<(&str, &str)> = vec![("", "1"), ("   ", "")];
        assert!(matches!(RankLadder::build(rows), Err(EngineError::EmptyLadder)));
        assert!(matches!(RankLadder::from_grid(&[]), Err(EngineError::EmptyLadder)));
    }

    #[test]
    fn test_invalid_requirement_rejected() {
        let err = RankLadder::build([("A", "0"), ("B", "lots")]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequirement { ref rank, .. } if rank == "B"));
        assert!(RankLadder::build([("A", "-5")]).is_err());
        assert_eq!(
            RankLadder::build([("A", "20.0")]).unwrap().requirement("A"),
            Some(Requirement::Points(20))
        );
    }

    #[test]
    fn test_reparse_is_identical() {
        let grid = vec![
            vec!["Rekrut".to_string(), "0".to_string()],
            vec!["Gemeiner Reiter".to_string()],
            vec![],
            vec!["Sergeant".to_string(), "N/A".to_string()],
        ];
        let a = RankLadder::from_grid(&grid).unwrap();
        let b = RankLadder::from_grid(&grid).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.requirement("Gemeiner Reiter"), Some(Requirement::Points(0)));
    }

    #[test]
    fn test_index_and_canonical() {
        let ladder = sample();
        assert_eq!(ladder.index_of("Sergeant"), Some(2));
        assert_eq!(ladder.index_of("General"), None);
        assert_eq!(ladder.next_of("General"), "General");
        assert_eq!(ladder.canonical(" gemeiner reiter "), Some("Gemeiner Reiter"));
        assert_eq!(ladder.canonical("General"), None);
    }

    #[tokio::test]
    async fn test_load_from_store() {
        let store = MemoryStore::new().with_grid(
            "L1:M100",
            vec![
                vec!["Rekrut".to_string(), "0".to_string()],
                vec!["Gefreiter".to_string(), "15".to_string()],
            ],
        );
        let ladder = RankLadder::load(&store, "L1:M100").await.unwrap();
        assert_eq!(ladder.len(), 2);
        assert!(RankLadder::load(&store, "A1:B2").await.is_err());
    }
}
