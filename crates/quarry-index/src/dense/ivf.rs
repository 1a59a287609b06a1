//! Inverted-file coarse quantizer: k-means centroids and per-centroid row
//! lists, persisted as `ivf.json`.

use std::fs;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use quarry_core::config::DistanceMetric;
use quarry_core::errors::QuarryResult;

use super::metric;
use crate::{corrupt, io_err};

pub const IVF_FILE: &str = "ivf.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IvfLists {
    pub centroids: Vec<Vec<f32>>,
    /// Row numbers in `vectors.bin`, one list per centroid.
    pub lists: Vec<Vec<u32>>,
}

impl IvfLists {
    pub fn with_centroids(centroids: Vec<Vec<f32>>) -> Self {
        let lists = vec![Vec::new(); centroids.len()];
        Self { centroids, lists }
    }

    /// Centroid closest to `v` under `metric`. Ties go to the lower index.
    pub fn nearest(&self, metric: DistanceMetric, v: &[f32]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, c) in self.centroids.iter().enumerate() {
            let s = metric::score(metric, v, c);
            match best {
                Some((_, b)) if s <= b => {}
                _ => best = Some((i, s)),
            }
        }
        best.map(|(i, _)| i)
    }

    pub fn assign(&mut self, metric: DistanceMetric, row: u32, v: &[f32]) {
        if let Some(list) = self.nearest(metric, v) {
            self.lists[list].push(row);
        }
    }

    /// The `n_probe` lists whose centroids score highest against `query`.
    pub fn probe(&self, metric: DistanceMetric, query: &[f32], n_probe: usize) -> Vec<usize> {
        let mut scored: Vec<(usize, f64)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, metric::score(metric, query, c)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.into_iter().take(n_probe).map(|(i, _)| i).collect()
    }

    pub fn write(&self, dir: &Path) -> QuarryResult<()> {
        let path = dir.join(IVF_FILE);
        let json = serde_json::to_vec(self)?;
        fs::write(&path, json).map_err(|e| io_err(&path, e))
    }

    pub fn load(dir: &Path, rows: usize, dims: usize) -> QuarryResult<Self> {
        let path = dir.join(IVF_FILE);
        let raw = fs::read(&path).map_err(|_| corrupt(&path, "ivf file missing"))?;
        let ivf: IvfLists =
            serde_json::from_slice(&raw).map_err(|e| corrupt(&path, format!("unparsable ivf file: {e}")))?;
        if ivf.centroids.len() != ivf.lists.len() {
            return Err(corrupt(&path, "centroid and list counts differ"));
        }
        if ivf.centroids.iter().any(|c| c.len() != dims) {
            return Err(corrupt(&path, "centroid dimensionality differs from vectors"));
        }
        let listed: usize = ivf.lists.iter().map(Vec::len).sum();
        if listed != rows || ivf.lists.iter().flatten().any(|&r| r as usize >= rows) {
            return Err(corrupt(&path, "lists do not cover the vector rows"));
        }
        Ok(ivf)
    }
}

/// Train `n_lists` centroids on row-major `sample` with Lloyd iterations.
///
/// Initial centroids are evenly spaced sample rows, so training is
/// deterministic. A cluster that loses all members keeps its centroid.
pub fn train(
    metric: DistanceMetric,
    sample: &[f32],
    dims: usize,
    n_lists: usize,
    iterations: usize,
) -> Vec<Vec<f32>> {
    let n = sample.len() / dims.max(1);
    let k = n_lists.min(n);
    if k == 0 {
        return Vec::new();
    }
    let row = |i: usize| &sample[i * dims..(i + 1) * dims];
    let mut centroids: Vec<Vec<f32>> = (0..k).map(|j| row(j * n / k).to_vec()).collect();

    for iteration in 0..iterations {
        let quantizer = IvfLists::with_centroids(centroids.clone());
        let assignment: Vec<usize> = (0..n)
            .into_par_iter()
            .map(|i| quantizer.nearest(metric, row(i)).unwrap_or(0))
            .collect();

        let mut sums = vec![vec![0f64; dims]; k];
        let mut counts = vec![0usize; k];
        for (i, &c) in assignment.iter().enumerate() {
            counts[c] += 1;
            for (s, x) in sums[c].iter_mut().zip(row(i)) {
                *s += *x as f64;
            }
        }
        let mut moved = 0usize;
        for c in 0..k {
            if counts[c] == 0 {
                continue;
            }
            let mut next: Vec<f32> = sums[c].iter().map(|s| (s / counts[c] as f64) as f32).collect();
            metric::prepare(metric, &mut next);
            if next != centroids[c] {
                moved += 1;
            }
            centroids[c] = next;
        }
        debug!(iteration, moved, clusters = k, "k-means iteration");
        if moved == 0 {
            break;
        }
    }
    centroids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_separates_two_clusters() {
        let sample: Vec<f32> = [
            [0.0, 0.1],
            [0.1, 0.0],
            [0.0, 0.0],
            [10.0, 10.1],
            [10.1, 10.0],
            [10.0, 10.0],
        ]
        .concat();
        let centroids = train(DistanceMetric::L2, &sample, 2, 2, 10);
        assert_eq!(centroids.len(), 2);

        let ivf = IvfLists::with_centroids(centroids);
        let near_origin = ivf.nearest(DistanceMetric::L2, &[0.0, 0.0]).unwrap();
        let far = ivf.nearest(DistanceMetric::L2, &[10.0, 10.0]).unwrap();
        assert_ne!(near_origin, far);
    }

    #[test]
    fn fewer_samples_than_lists() {
        let sample = vec![1.0, 0.0, 0.0, 1.0];
        assert_eq!(train(DistanceMetric::Cosine, &sample, 2, 8, 5).len(), 2);
        assert!(train(DistanceMetric::Cosine, &[], 2, 8, 5).is_empty());
    }

    #[test]
    fn probe_orders_by_centroid_score() {
        let ivf = IvfLists::with_centroids(vec![vec![0.0, 0.0], vec![5.0, 5.0], vec![1.0, 1.0]]);
        assert_eq!(ivf.probe(DistanceMetric::L2, &[0.9, 0.9], 2), vec![2, 0]);
    }

    #[test]
    fn load_rejects_lists_not_covering_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut ivf = IvfLists::with_centroids(vec![vec![0.0, 0.0]]);
        ivf.lists[0] = vec![0, 1];
        ivf.write(dir.path()).unwrap();
        assert!(IvfLists::load(dir.path(), 2, 2).is_ok());
        assert!(IvfLists::load(dir.path(), 3, 2).is_err());
        assert!(IvfLists::load(dir.path(), 2, 3).is_err());
    }
}
