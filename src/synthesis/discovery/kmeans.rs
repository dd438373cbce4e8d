//! Seeded k-means++ clustering
//!
//! Operates on L2-normalised vectors so squared Euclidean distance orders
//! points the same way cosine distance does. Everything random draws from a
//! single `StdRng` seeded by the caller, so identical input yields identical
//! assignments.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Result of one clustering run
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Cluster index per input point
    pub assignments: Vec<usize>,
    pub centroids: Vec<Vec<f32>>,
    /// Euclidean distance of each point to its centroid
    pub distances: Vec<f32>,
    pub iterations: usize,
}

impl Clustering {
    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    /// Point indexes per cluster, in input order
    pub fn members(&self) -> Vec<Vec<usize>> {
        let mut members = vec![Vec::new(); self.k()];
        for (point, &cluster) in self.assignments.iter().enumerate() {
            members[cluster].push(point);
        }
        members
    }
}

/// Unit-length copy of `v`; zero vectors stay zero
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm < f32::EPSILON {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

/// Mean of unit-normalised vectors; `None` when empty or dimensions differ
pub fn centroid<'a>(vectors: impl IntoIterator<Item = &'a [f32]>) -> Option<Vec<f32>> {
    let mut sum: Option<Vec<f32>> = None;
    let mut count = 0usize;
    for v in vectors {
        let v = normalize(v);
        match sum.as_mut() {
            Some(s) if s.len() == v.len() => s.iter_mut().zip(&v).for_each(|(a, b)| *a += b),
            Some(_) => return None,
            None => sum = Some(v),
        }
        count += 1;
    }
    sum.map(|s| s.into_iter().map(|x| x / count as f32).collect())
}

pub(crate) fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Nearest centroid and its squared distance; ties go to the lower index
fn nearest(point: &[f32], centroids: &[Vec<f32>]) -> (usize, f32) {
    let mut best = (0, f32::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// k-means++ seeding: each next centre is drawn with probability
/// proportional to its squared distance from the closest chosen centre.
fn seed_centroids(points: &[Vec<f32>], k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let n = points.len();
    let mut chosen = vec![rng.random_range(0..n)];
    let mut closest: Vec<f32> = points
        .iter()
        .map(|p| squared_distance(p, &points[chosen[0]]))
        .collect();

    while chosen.len() < k {
        let total: f64 = closest.iter().map(|&d| d as f64).sum();
        let next = if total <= f64::EPSILON {
            // Every point sits on a centre; take the first unused index
            (0..n).find(|i| !chosen.contains(i)).unwrap_or(0)
        } else {
            let mut target = rng.random::<f64>() * total;
            let mut pick = closest.iter().rposition(|&d| d > 0.0).unwrap_or(n - 1);
            for (i, &d) in closest.iter().enumerate() {
                target -= d as f64;
                if target <= 0.0 && d > 0.0 {
                    pick = i;
                    break;
                }
            }
            pick
        };

        chosen.push(next);
        for (i, p) in points.iter().enumerate() {
            closest[i] = closest[i].min(squared_distance(p, &points[next]));
        }
    }

    chosen.into_iter().map(|i| points[i].clone()).collect()
}

/// Mean of the assigned points per cluster; `None` for empty clusters
fn update_centroids(points: &[Vec<f32>], assignments: &[usize], k: usize) -> Vec<Option<Vec<f32>>> {
    let dims = points[0].len();
    let mut sums = vec![vec![0.0f32; dims]; k];
    let mut counts = vec![0usize; k];

    for (point, &cluster) in points.iter().zip(assignments) {
        counts[cluster] += 1;
        for (s, x) in sums[cluster].iter_mut().zip(point) {
            *s += x;
        }
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| {
            (count > 0).then(|| sum.into_iter().map(|s| s / count as f32).collect())
        })
        .collect()
}

/// Move the point farthest from its centroid into each empty cluster.
///
/// Donor clusters must keep at least one member.
fn reseed_empty(
    points: &[Vec<f32>],
    assignments: &mut [usize],
    centroids: &mut [Vec<f32>],
    updated: Vec<Option<Vec<f32>>>,
) {
    let k = centroids.len();
    let mut counts = vec![0usize; k];
    for &c in assignments.iter() {
        counts[c] += 1;
    }

    for (cluster, centroid) in updated.into_iter().enumerate() {
        match centroid {
            Some(c) => centroids[cluster] = c,
            None => {
                let donor = points
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| counts[assignments[*i]] > 1)
                    .map(|(i, p)| (i, squared_distance(p, &centroids[assignments[i]])))
                    .fold(None::<(usize, f32)>, |best, (i, d)| match best {
                        Some((_, bd)) if bd >= d => best,
                        _ => Some((i, d)),
                    });

                if let Some((point, _)) = donor {
                    counts[assignments[point]] -= 1;
                    assignments[point] = cluster;
                    counts[cluster] += 1;
                    centroids[cluster] = points[point].clone();
                }
            }
        }
    }
}

/// Cluster `points` into `k` groups.
///
/// Callers guarantee `1 <= k <= points.len()` and equal, non-zero dimensions.
pub fn kmeans(points: &[Vec<f32>], k: usize, max_iterations: usize, seed: u64) -> Clustering {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = seed_centroids(points, k, &mut rng);
    let mut assignments: Vec<usize> = points.iter().map(|p| nearest(p, &centroids).0).collect();
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;

        let updated = update_centroids(points, &assignments, k);
        reseed_empty(points, &mut assignments, &mut centroids, updated);

        let mut changed = false;
        for (i, point) in points.iter().enumerate() {
            let (cluster, _) = nearest(point, &centroids);
            if cluster != assignments[i] {
                assignments[i] = cluster;
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    // Final centroids match the final assignment
    let updated = update_centroids(points, &assignments, k);
    reseed_empty(points, &mut assignments, &mut centroids, updated);

    let distances = points
        .iter()
        .zip(&assignments)
        .map(|(p, &c)| squared_distance(p, &centroids[c]).sqrt())
        .collect();

    Clustering {
        assignments,
        centroids,
        distances,
        iterations,
    }
}

/// Points farther than `mean + z * stddev` from their centroid
pub fn outlier_mask(distances: &[f32], z: f32) -> Vec<bool> {
    if distances.is_empty() {
        return Vec::new();
    }

    let n = distances.len() as f32;
    let mean = distances.iter().sum::<f32>() / n;
    let variance = distances.iter().map(|d| (d - mean) * (d - mean)).sum::<f32>() / n;
    let threshold = mean + z * variance.sqrt();

    distances.iter().map(|&d| d > threshold).collect()
}
