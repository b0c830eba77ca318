//! Agglomerative hierarchical clustering for clustermaps.

use crate::error::PlotError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Single,
    Complete,
    Average,
    Ward,
}

impl Method {
    pub fn parse(name: &str) -> Result<Self, PlotError> {
        match name.to_ascii_lowercase().as_str() {
            "single" => Ok(Method::Single),
            "complete" => Ok(Method::Complete),
            "average" => Ok(Method::Average),
            "ward" => Ok(Method::Ward),
            other => Err(PlotError::invalid(
                "method",
                format!("unknown linkage method '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Euclidean,
    Correlation,
    Cityblock,
    Cosine,
}

impl Metric {
    pub fn parse(name: &str) -> Result<Self, PlotError> {
        match name.to_ascii_lowercase().as_str() {
            "euclidean" => Ok(Metric::Euclidean),
            "correlation" => Ok(Metric::Correlation),
            "cityblock" | "manhattan" => Ok(Metric::Cityblock),
            "cosine" => Ok(Metric::Cosine),
            other => Err(PlotError::invalid(
                "metric",
                format!("unknown distance metric '{}'", other),
            )),
        }
    }

    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Metric::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f64>()
                .sqrt(),
            Metric::Cityblock => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
            Metric::Cosine => {
                let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
                let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
                1.0 - dot / (na * nb)
            }
            Metric::Correlation => {
                let n = a.len() as f64;
                let ma = a.iter().sum::<f64>() / n;
                let mb = b.iter().sum::<f64>() / n;
                let ca: Vec<f64> = a.iter().map(|x| x - ma).collect();
                let cb: Vec<f64> = b.iter().map(|x| x - mb).collect();
                Metric::Cosine.distance(&ca, &cb)
            }
        }
    }
}

/// One agglomeration step. Node ids below `n` are leaves; merge `i`
/// creates node `n + i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub height: f64,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dendrogram {
    pub n_leaves: usize,
    pub merges: Vec<Merge>,
}

impl Dendrogram {
    /// Leaf indices in drawing order.
    pub fn order(&self) -> Vec<usize> {
        if self.merges.is_empty() {
            return (0..self.n_leaves).collect();
        }
        let mut out = Vec::with_capacity(self.n_leaves);
        let mut stack = vec![self.n_leaves + self.merges.len() - 1];
        while let Some(node) = stack.pop() {
            if node < self.n_leaves {
                out.push(node);
            } else {
                let merge = &self.merges[node - self.n_leaves];
                stack.push(merge.right);
                stack.push(merge.left);
            }
        }
        out
    }

    /// U-shaped links as polylines in (leaf position, height) space, with
    /// leaf `order[i]` placed at `i + 0.5`.
    pub fn links(&self) -> Vec<[(f64, f64); 4]> {
        let order = self.order();
        let mut position = vec![0.0; self.n_leaves + self.merges.len()];
        for (slot, &leaf) in order.iter().enumerate() {
            position[leaf] = slot as f64 + 0.5;
        }
        let mut height = vec![0.0; self.n_leaves + self.merges.len()];
        let mut links = Vec::with_capacity(self.merges.len());
        for (idx, merge) in self.merges.iter().enumerate() {
            let node = self.n_leaves + idx;
            let (pl, pr) = (position[merge.left], position[merge.right]);
            let (hl, hr) = (height[merge.left], height[merge.right]);
            links.push([(pl, hl), (pl, merge.height), (pr, merge.height), (pr, hr)]);
            position[node] = (pl + pr) / 2.0;
            height[node] = merge.height;
        }
        links
    }

    pub fn max_height(&self) -> f64 {
        self.merges.iter().map(|m| m.height).fold(0.0, f64::max)
    }
}

/// Cluster the rows of `data` bottom-up with Lance-Williams updates.
pub fn linkage(data: &[Vec<f64>], method: Method, metric: Metric) -> Result<Dendrogram, PlotError> {
    if method == Method::Ward && metric != Metric::Euclidean {
        return Err(PlotError::invalid(
            "method",
            "ward linkage requires the euclidean metric",
        ));
    }
    let n = data.len();
    let mut dist = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i + 1..n {
            let d = metric.distance(&data[i], &data[j]);
            if !d.is_finite() {
                return Err(PlotError::invalid(
                    "metric",
                    "distance matrix contains non-finite values (constant rows?)",
                ));
            }
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }

    // Active clusters: (node id, size); `dist` is indexed by slot.
    let mut active: Vec<Option<(usize, usize)>> = (0..n).map(|i| Some((i, 1))).collect();
    let mut merges = Vec::with_capacity(n.saturating_sub(1));

    for step in 0..n.saturating_sub(1) {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..n {
            if active[i].is_none() {
                continue;
            }
            for j in i + 1..n {
                if active[j].is_none() {
                    continue;
                }
                if best.map_or(true, |(_, _, d)| dist[i][j] < d) {
                    best = Some((i, j, dist[i][j]));
                }
            }
        }
        let Some((i, j, d_ij)) = best else { break };
        let (node_i, size_i) = active[i].unwrap_or((i, 1));
        let (node_j, size_j) = active[j].unwrap_or((j, 1));

        for k in 0..n {
            if k == i || k == j {
                continue;
            }
            let Some((_, size_k)) = active[k] else { continue };
            let (d_ki, d_kj) = (dist[k][i], dist[k][j]);
            let updated = match method {
                Method::Single => d_ki.min(d_kj),
                Method::Complete => d_ki.max(d_kj),
                Method::Average => {
                    (size_i as f64 * d_ki + size_j as f64 * d_kj) / (size_i + size_j) as f64
                }
                Method::Ward => {
                    let (ni, nj, nk) = (size_i as f64, size_j as f64, size_k as f64);
                    (((ni + nk) * d_ki * d_ki + (nj + nk) * d_kj * d_kj - nk * d_ij * d_ij)
                        / (ni + nj + nk))
                        .max(0.0)
                        .sqrt()
                }
            };
            dist[k][i] = updated;
            dist[i][k] = updated;
        }

        merges.push(Merge {
            left: node_i,
            right: node_j,
            height: d_ij,
            size: size_i + size_j,
        });
        active[i] = Some((n + step, size_i + size_j));
        active[j] = None;
    }

    Ok(Dendrogram {
        n_leaves: n,
        merges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_rows() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0],
            vec![10.0, 10.0],
            vec![0.1, 0.0],
            vec![10.0, 10.2],
        ]
    }

    #[test]
    fn test_linkage_groups_close_rows() {
        let dendro = linkage(&make_rows(), Method::Average, Metric::Euclidean).unwrap();
        assert_eq!(dendro.merges.len(), 3);
        let order = dendro.order();
        let pos = |leaf: usize| order.iter().position(|&l| l == leaf).unwrap();
        assert_eq!((pos(0) as i64 - pos(2) as i64).abs(), 1);
        assert_eq!((pos(1) as i64 - pos(3) as i64).abs(), 1);
    }

    #[test]
    fn test_first_merge_is_closest_pair() {
        let dendro = linkage(&make_rows(), Method::Single, Metric::Euclidean).unwrap();
        let first = &dendro.merges[0];
        assert_eq!((first.left, first.right), (0, 2));
        assert!((first.height - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_heights_non_decreasing_for_ward() {
        let dendro = linkage(&make_rows(), Method::Ward, Metric::Euclidean).unwrap();
        for pair in dendro.merges.windows(2) {
            assert!(pair[0].height <= pair[1].height);
        }
    }

    #[test]
    fn test_ward_requires_euclidean() {
        let err = linkage(&make_rows(), Method::Ward, Metric::Cosine).unwrap_err();
        assert!(matches!(err, PlotError::InvalidOption { .. }));
    }

    #[test]
    fn test_links_count() {
        let dendro = linkage(&make_rows(), Method::Complete, Metric::Cityblock).unwrap();
        assert_eq!(dendro.links().len(), 3);
        assert_eq!(dendro.order().len(), 4);
    }
}
