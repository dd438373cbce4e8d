//! Cluster quality and automatic theme count

use tracing::debug;

use super::kmeans::{Clustering, kmeans, squared_distance};

/// Mean simplified silhouette of a clustering.
///
/// For each point `a` is the distance to its own centroid and `b` the
/// distance to the nearest other centroid; the point scores
/// `(b - a) / max(a, b)`. Ranges from -1 to 1, higher is better.
pub fn simplified_silhouette(points: &[Vec<f32>], clustering: &Clustering) -> f32 {
    if points.is_empty() || clustering.k() < 2 {
        return 0.0;
    }

    let total: f32 = points
        .iter()
        .zip(&clustering.assignments)
        .map(|(point, &own)| {
            let a = squared_distance(point, &clustering.centroids[own]).sqrt();
            let b = clustering
                .centroids
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != own)
                .map(|(_, c)| squared_distance(point, c).sqrt())
                .fold(f32::INFINITY, f32::min);
            let denom = a.max(b);
            if denom < f32::EPSILON { 0.0 } else { (b - a) / denom }
        })
        .sum();

    total / points.len() as f32
}

/// Cluster at every k in `[min_k, max_k]` and keep the best silhouette.
///
/// Ties keep the smaller k. Returns the winning k with its clustering.
pub fn select_k(
    points: &[Vec<f32>],
    min_k: usize,
    max_k: usize,
    max_iterations: usize,
    seed: u64,
    mut on_candidate: impl FnMut(usize, f32),
) -> (usize, Clustering) {
    let mut best: Option<(usize, f32, Clustering)> = None;

    for k in min_k..=max_k.max(min_k) {
        let clustering = kmeans(points, k, max_iterations, seed);
        let score = simplified_silhouette(points, &clustering);
        debug!(k, score, iterations = clustering.iterations, "Evaluated theme count");
        on_candidate(k, score);

        let better = match &best {
            Some((_, best_score, _)) => score > *best_score,
            None => true,
        };
        if better {
            best = Some((k, score, clustering));
        }
    }

    match best {
        Some((k, _, clustering)) => (k, clustering),
        // Unreachable for a non-empty range
        None => (min_k, kmeans(points, min_k, max_iterations, seed)),
    }
}

#[cfg(test)]
mod tests {
    use super::super::kmeans::normalize;
    use super::*;

    fn four_blobs() -> Vec<Vec<f32>> {
        let axes = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let mut points = Vec::new();
        for i in 0..8 {
            for axis in &axes {
                let mut p = axis.to_vec();
                p[(i % 4 + 1) % 4] += 0.02 * i as f32;
                points.push(normalize(&p));
            }
        }
        points
    }

    #[test]
    fn test_silhouette_prefers_true_k() {
        let points = four_blobs();
        let good = kmeans(&points, 4, 100, 42);
        let poor = kmeans(&points, 2, 100, 42);
        assert!(simplified_silhouette(&points, &good) > simplified_silhouette(&points, &poor));
        assert!(simplified_silhouette(&points, &good) > 0.5);
    }

    #[test]
    fn test_select_k_finds_four() {
        let points = four_blobs();
        let mut seen = Vec::new();
        let (k, clustering) = select_k(&points, 2, 8, 100, 42, |k, _| seen.push(k));
        assert_eq!(k, 4);
        assert_eq!(clustering.k(), 4);
        assert_eq!(seen, vec![2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_select_k_tie_keeps_smaller() {
        // Identical points score 0 at every k
        let points = vec![normalize(&[1.0, 1.0]); 6];
        let (k, _) = select_k(&points, 2, 4, 10, 1, |_, _| {});
        assert_eq!(k, 2);
    }
}
