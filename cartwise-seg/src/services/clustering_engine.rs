//! K-means clustering for batch segmentation
//!
//! Groups customer feature vectors into clusters with quality metrics
//! (variance, cohesion, silhouette-like score). Centroid initialization
//! samples uniformly from the input vectors through an injectable,
//! seedable random source so batch runs are reproducible in tests.

use crate::config::SegmentationConfig;
use crate::models::{Cluster, ClusteringResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;
use uuid::Uuid;

/// K-means clustering engine
#[derive(Debug, Clone)]
pub struct ClusteringEngine {
    max_iterations: usize,
    convergence_epsilon: f64,
    max_clusters: usize,
    customers_per_cluster: usize,
    seed: Option<u64>,
}

impl ClusteringEngine {
    /// Create an engine from configuration, seeding from system entropy.
    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self {
            max_iterations: config.kmeans_max_iterations,
            convergence_epsilon: config.kmeans_convergence_epsilon,
            max_clusters: config.kmeans_max_clusters,
            customers_per_cluster: config.kmeans_customers_per_cluster,
            seed: None,
        }
    }

    /// Fix the random seed for reproducible centroid initialization.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Cluster count for a given batch size:
    /// `clamp(batch / customers_per_cluster, 1, max_clusters)`.
    pub fn cluster_count(&self, batch_size: usize) -> usize {
        (batch_size / self.customers_per_cluster)
            .max(1)
            .min(self.max_clusters)
    }

    /// Run K-means over one batch of feature vectors.
    ///
    /// `customer_ids` and `vectors` are parallel slices. Points are
    /// assigned to the nearest centroid by Euclidean distance, ties
    /// broken by lowest cluster index; centroids are recomputed as the
    /// arithmetic mean of members (empty clusters keep their previous
    /// centroid); iteration stops early once no centroid moves more
    /// than the convergence epsilon.
    pub fn cluster(&self, customer_ids: &[Uuid], vectors: &[Vec<f64>]) -> ClusteringResult {
        debug_assert_eq!(customer_ids.len(), vectors.len());
        if vectors.is_empty() {
            return ClusteringResult {
                clusters: vec![],
                silhouette_score: 0.0,
                iterations: 0,
                converged: true,
                k: 0,
            };
        }

        let k = self.cluster_count(vectors.len());
        let mut rng: StdRng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        // Initialize centroids by uniform random sampling from the input
        let mut centroids: Vec<Vec<f64>> = (0..k)
            .map(|_| vectors[rng.gen_range(0..vectors.len())].clone())
            .collect();

        let mut memberships: Vec<Vec<usize>> = vec![Vec::new(); k];
        let mut iterations = 0;
        let mut converged = false;

        while !converged && iterations < self.max_iterations {
            // Assignment step: nearest centroid, lowest index wins ties
            for members in memberships.iter_mut() {
                members.clear();
            }
            for (point_index, vector) in vectors.iter().enumerate() {
                let mut best_cluster = 0;
                let mut best_distance = f64::INFINITY;
                for (cluster_index, centroid) in centroids.iter().enumerate() {
                    let distance = euclidean_distance(vector, centroid);
                    if distance < best_distance {
                        best_distance = distance;
                        best_cluster = cluster_index;
                    }
                }
                memberships[best_cluster].push(point_index);
            }

            // Update step: arithmetic mean of members
            converged = true;
            for (cluster_index, members) in memberships.iter().enumerate() {
                if members.is_empty() {
                    continue;
                }
                let new_centroid = mean_vector(members.iter().map(|&i| &vectors[i]));
                let shift = euclidean_distance(&centroids[cluster_index], &new_centroid);
                if shift > self.convergence_epsilon {
                    converged = false;
                }
                centroids[cluster_index] = new_centroid;
            }

            iterations += 1;
        }

        // Quality metrics per cluster
        let clusters: Vec<Cluster> = memberships
            .iter()
            .enumerate()
            .map(|(cluster_index, members)| {
                let variance = if members.is_empty() {
                    0.0
                } else {
                    members
                        .iter()
                        .map(|&i| distance_squared(&vectors[i], &centroids[cluster_index]))
                        .sum::<f64>()
                        / members.len() as f64
                };
                Cluster {
                    cluster_id: cluster_index,
                    centroid: centroids[cluster_index].clone(),
                    members: members.iter().map(|&i| customer_ids[i]).collect(),
                    size: members.len(),
                    variance,
                    cohesion: 1.0 / (1.0 + variance),
                }
            })
            .collect();

        let silhouette_score = silhouette_like_score(&clusters);

        debug!(
            k,
            iterations,
            converged,
            silhouette_score,
            "K-means clustering completed"
        );

        ClusteringResult {
            clusters,
            silhouette_score,
            iterations,
            converged,
            k,
        }
    }
}

/// Euclidean distance between two vectors of equal dimension
fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    distance_squared(a, b).sqrt()
}

fn distance_squared(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

/// Component-wise arithmetic mean of a non-empty set of vectors
fn mean_vector<'a, I>(vectors: I) -> Vec<f64>
where
    I: Iterator<Item = &'a Vec<f64>>,
{
    let mut sum: Vec<f64> = Vec::new();
    let mut count = 0usize;
    for vector in vectors {
        if sum.is_empty() {
            sum = vec![0.0; vector.len()];
        }
        for (acc, value) in sum.iter_mut().zip(vector.iter()) {
            *acc += value;
        }
        count += 1;
    }
    if count > 0 {
        for value in sum.iter_mut() {
            *value /= count as f64;
        }
    }
    sum
}

/// Average cohesion over clusters of size > 1, rescaled to [-1, 1].
/// Zero when no cluster qualifies.
fn silhouette_like_score(clusters: &[Cluster]) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for cluster in clusters {
        if cluster.size > 1 {
            total += cluster.cohesion;
            count += 1;
        }
    }
    if count > 0 {
        (total / count as f64) * 2.0 - 1.0
    } else {
        0.0
    }
}
