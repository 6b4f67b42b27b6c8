//! Catalog-wide proximity search over the spatial grid

use chrono::{DateTime, Utc};

use super::colocation::CoLocationFilter;
use super::grid::{CellKey, SpatialGrid};
use crate::error::Result;
use crate::processing::WorkerPool;
use crate::types::{CatalogEntry, StateVector};

/// A catalog entry with its state vector at the sweep instant
#[derive(Debug, Clone)]
pub struct Positioned<'a> {
    pub entry: &'a CatalogEntry,
    pub state: StateVector,
}

/// Aggregate counts of one proximity scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Distinct pairs examined (intra-cell plus neighbor-cell)
    pub pairs_checked: usize,
    /// Pairs whose current distance was within the radius
    pub within_radius: usize,
    /// Pairs dropped by the co-location filter
    pub co_located: usize,
    /// Pairs handed to the evaluator
    pub evaluated: usize,
    /// Evaluations that failed and were skipped
    pub failed: usize,
}

impl ScanStats {
    fn merge(&mut self, other: &ScanStats) {
        self.pairs_checked += other.pairs_checked;
        self.within_radius += other.within_radius;
        self.co_located += other.co_located;
        self.evaluated += other.evaluated;
        self.failed += other.failed;
    }
}

/// Results of a proximity scan, merged after all cells completed
#[derive(Debug)]
pub struct ScanOutcome<T> {
    pub results: Vec<T>,
    pub stats: ScanStats,
    /// Cells whose scan failed as a whole
    pub failed_cells: usize,
}

struct CellScan<T> {
    results: Vec<T>,
    stats: ScanStats,
}

/// Parallel intra-cell and neighbor-cell pair scan
pub struct ProximitySearch<'g, 'a> {
    grid: &'g SpatialGrid,
    objects: &'g [Positioned<'a>],
    radius_km: f64,
    co_location: &'g CoLocationFilter,
    now: DateTime<Utc>,
}

impl<'g, 'a> ProximitySearch<'g, 'a> {
    /// `grid` must have been built from the positions of `objects`, in order
    pub fn new(
        grid: &'g SpatialGrid,
        objects: &'g [Positioned<'a>],
        co_location: &'g CoLocationFilter,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            grid,
            objects,
            radius_km: grid.cell_size_km(),
            co_location,
            now,
        }
    }

    /// Scan every occupied cell on `pool`, calling `evaluate` for each close pair
    ///
    /// `evaluate` receives the pair with the lower catalog id first plus the
    /// current separation in km. `Ok(None)` means "nothing to report";
    /// `Err` is logged and counted but never aborts the scan.
    pub fn run<T, F>(&self, pool: &WorkerPool, evaluate: F) -> ScanOutcome<T>
    where
        T: Send,
        F: Fn(&Positioned<'a>, &Positioned<'a>, f64) -> Result<Option<T>> + Sync + Send,
    {
        let keys = self.grid.keys();
        let phase = pool.run_phase("Proximity scan", keys, |key| {
            Ok(self.scan_cell(&key, &evaluate))
        });

        let mut results = Vec::new();
        let mut stats = ScanStats::default();
        for cell in phase.completed {
            stats.merge(&cell.stats);
            results.extend(cell.results);
        }

        ScanOutcome {
            results,
            stats,
            failed_cells: phase.failed,
        }
    }

    fn scan_cell<T, F>(&self, key: &CellKey, evaluate: &F) -> CellScan<T>
    where
        F: Fn(&Positioned<'a>, &Positioned<'a>, f64) -> Result<Option<T>>,
    {
        let mut scan = CellScan {
            results: Vec::new(),
            stats: ScanStats::default(),
        };
        let members = self.grid.members(key);

        for (j, &a) in members.iter().enumerate() {
            for &b in &members[j + 1..] {
                self.check_pair(a, b, evaluate, &mut scan);
            }
        }

        // Each cross-cell pair is seen from both cells; only the lower id side keeps it.
        for (_, neighbor_members) in self.grid.neighbors(key) {
            for &a in members {
                for &b in neighbor_members {
                    if self.objects[a].entry.id() < self.objects[b].entry.id() {
                        self.check_pair(a, b, evaluate, &mut scan);
                    }
                }
            }
        }

        scan
    }

    fn check_pair<T, F>(&self, a: usize, b: usize, evaluate: &F, scan: &mut CellScan<T>)
    where
        F: Fn(&Positioned<'a>, &Positioned<'a>, f64) -> Result<Option<T>>,
    {
        let (first, second) = {
            let (x, y) = (&self.objects[a], &self.objects[b]);
            if x.entry.id() <= y.entry.id() {
                (x, y)
            } else {
                (y, x)
            }
        };
        if first.entry.id() == second.entry.id() {
            return;
        }

        scan.stats.pairs_checked += 1;
        let distance = first.state.distance_to(&second.state);
        if distance > self.radius_km {
            return;
        }
        scan.stats.within_radius += 1;

        if let Some(reason) = self.co_location.skip_reason(first.entry, second.entry, self.now) {
            scan.stats.co_located += 1;
            tracing::debug!(
                "Skipping pair {} <-> {}: {}",
                first.entry.name(),
                second.entry.name(),
                reason
            );
            return;
        }

        scan.stats.evaluated += 1;
        match evaluate(first, second, distance) {
            Ok(Some(result)) => scan.results.push(result),
            Ok(None) => {}
            Err(e) => {
                scan.stats.failed += 1;
                tracing::debug!(
                    "Evaluation failed for pair {} <-> {}: {}",
                    first.entry.id(),
                    second.entry.id(),
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoLocationConfig;
    use crate::error::Error;
    use crate::test_support::entry;
    use crate::types::CandidatePair;
    use std::collections::HashSet;

    fn positioned<'a>(entries: &'a [CatalogEntry], positions: &[[f64; 3]]) -> Vec<Positioned<'a>> {
        entries
            .iter()
            .zip(positions)
            .map(|(entry, p)| Positioned {
                entry,
                state: StateVector::new(*p, [0.0, 7.5, 0.0]),
            })
            .collect()
    }

    fn brute_force(objects: &[Positioned<'_>], radius: f64) -> HashSet<CandidatePair> {
        let mut pairs = HashSet::new();
        for (i, a) in objects.iter().enumerate() {
            for b in &objects[i + 1..] {
                if a.state.distance_to(&b.state) <= radius {
                    pairs.insert(CandidatePair::new(a.entry.id(), b.entry.id()));
                }
            }
        }
        pairs
    }

    #[test]
    fn test_scan_matches_brute_force_without_duplicates() {
        let now = Utc::now();
        let mut entries = Vec::new();
        let mut positions = Vec::new();
        // deterministic scatter around a 7000 km shell segment
        for i in 0..300u32 {
            let f = i as f64;
            entries.push(entry(10_000 + i, "DEBRIS", 15.0 + f * 1e-3, 70.0 + f * 0.01, f, now));
            positions.push([
                7000.0 + (f * 37.0) % 900.0 - 450.0,
                (f * 53.0) % 800.0 - 400.0,
                (f * 71.0) % 700.0 - 350.0,
            ]);
        }
        let objects = positioned(&entries, &positions);
        let grid_positions: Vec<[f64; 3]> = objects.iter().map(|o| o.state.position_km).collect();
        let grid = SpatialGrid::build(&grid_positions, 100.0).unwrap();
        let filter = CoLocationFilter::new(&CoLocationConfig::default());
        let pool = WorkerPool::new(4).unwrap();

        let outcome = ProximitySearch::new(&grid, &objects, &filter, now).run(&pool, |a, b, _| {
            assert!(a.entry.id() < b.entry.id());
            Ok(Some(CandidatePair::new(a.entry.id(), b.entry.id())))
        });

        let found: HashSet<CandidatePair> = outcome.results.iter().copied().collect();
        assert_eq!(found.len(), outcome.results.len(), "duplicate pairs reported");
        assert_eq!(found, brute_force(&objects, 100.0));
        assert_eq!(outcome.stats.evaluated, found.len());
    }

    #[test]
    fn test_station_pair_never_reaches_evaluator() {
        let now = Utc::now();
        let entries = vec![
            entry(25544, "ISS (ZARYA)", 15.50, 51.64, 100.0, now),
            entry(60001, "SOYUZ MS-26", 15.49, 51.64, 100.1, now),
        ];
        let objects = positioned(&entries, &[[6790.0, 0.0, 0.0], [6790.0, 0.05, 0.0]]);
        let grid = SpatialGrid::build(&[[6790.0, 0.0, 0.0], [6790.0, 0.05, 0.0]], 100.0).unwrap();
        let filter = CoLocationFilter::new(&CoLocationConfig::default());
        let pool = WorkerPool::new(2).unwrap();

        let outcome = ProximitySearch::new(&grid, &objects, &filter, now)
            .run(&pool, |_, _, _| -> Result<Option<()>> { panic!("evaluated station pair") });

        assert_eq!(outcome.stats.co_located, 1);
        assert_eq!(outcome.stats.evaluated, 0);
    }

    #[test]
    fn test_evaluation_failures_are_isolated() {
        let now = Utc::now();
        let entries = vec![
            entry(1, "A", 15.0, 50.0, 10.0, now),
            entry(2, "B", 15.1, 55.0, 20.0, now),
            entry(3, "C", 15.2, 60.0, 30.0, now),
        ];
        let positions = [[7000.0, 0.0, 0.0], [7010.0, 0.0, 0.0], [7020.0, 0.0, 0.0]];
        let objects = positioned(&entries, &positions);
        let grid = SpatialGrid::build(&positions, 100.0).unwrap();
        let filter = CoLocationFilter::new(&CoLocationConfig::default());
        let pool = WorkerPool::new(2).unwrap();

        let outcome = ProximitySearch::new(&grid, &objects, &filter, now).run(&pool, |a, b, d| {
            if b.entry.id() == 3 {
                Err(Error::propagation(b.entry.id(), "diverged"))
            } else {
                Ok(Some((a.entry.id(), b.entry.id(), d)))
            }
        });

        assert_eq!(outcome.stats.evaluated, 3);
        assert_eq!(outcome.stats.failed, 2);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!((outcome.results[0].0, outcome.results[0].1), (1, 2));
        assert_eq!(outcome.failed_cells, 0);
    }
}
