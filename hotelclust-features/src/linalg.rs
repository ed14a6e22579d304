use anyhow::{Result, anyhow, bail};
use faer::{Mat, Side};
use ndarray::{Array1, Array2, Axis};

/// Dimensionality reduction contract: learn a projection once, apply it to any matrix
/// with the same number of columns.
pub trait Reducer {
    fn fit(&mut self, data: &Array2<f64>) -> Result<()>;
    fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>>;
    fn n_components(&self) -> usize;

    /// Share of total variance carried by each kept component, when the reducer knows it.
    fn explained_variance_ratio(&self) -> Vec<f64> {
        Vec::new()
    }
}

/// Convert ndarray Array2 to faer Mat (column-major).
fn ndarray_to_faer(arr: &Array2<f64>) -> Mat<f64> {
    let (rows, cols) = (arr.nrows(), arr.ncols());
    Mat::from_fn(rows, cols, |i, j| arr[[i, j]])
}

#[derive(Debug, Clone)]
struct PcaModel {
    mean: Array1<f64>,
    /// [n_components, n_features], one principal axis per row.
    components: Array2<f64>,
    explained_variance_ratio: Vec<f64>,
}

/// Principal component analysis via eigendecomposition of the covariance matrix.
///
/// Components are ordered by decreasing variance. Each axis is oriented so that
/// its largest-magnitude loading is positive, which makes the projection
/// reproducible across runs and platforms.
#[derive(Debug, Clone)]
pub struct Pca {
    n_components: usize,
    model: Option<PcaModel>,
}

impl Pca {
    pub fn new(n_components: usize) -> Self {
        Self { n_components, model: None }
    }

    pub fn is_fitted(&self) -> bool {
        self.model.is_some()
    }
}

/// Covariance matrix of already-centered data: X^T X / (n - 1).
fn covariance(centered: &Array2<f64>) -> Array2<f64> {
    let n = centered.nrows();
    let denom = n.saturating_sub(1).max(1) as f64;
    centered.t().dot(centered) / denom
}

impl Reducer for Pca {
    fn fit(&mut self, data: &Array2<f64>) -> Result<()> {
        let (n, k) = data.dim();
        if n == 0 || k == 0 {
            bail!("PCA: empty matrix ({n}x{k})");
        }
        if self.n_components == 0 || self.n_components > n.min(k) {
            bail!(
                "PCA: n_components={} must be between 1 and min(n_samples={n}, n_features={k})",
                self.n_components
            );
        }

        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| anyhow!("PCA: cannot compute column means"))?;
        let centered = data - &mean;
        let cov = covariance(&centered);
        let total_variance: f64 = cov.diag().sum();

        let evd = ndarray_to_faer(&cov)
            .self_adjoint_eigen(Side::Lower)
            .map_err(|e| anyhow!("PCA: eigendecomposition failed: {e:?}"))?;
        let u = evd.U();

        // Eigenvalues come in nondecreasing order: the leading axes are the last columns.
        let mut components = Array2::zeros((self.n_components, k));
        let mut ratios = Vec::with_capacity(self.n_components);
        for c in 0..self.n_components {
            let j = k - 1 - c;
            let mut axis = Array1::from_shape_fn(k, |i| u[(i, j)]);

            let pivot = axis
                .iter()
                .copied()
                .fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best });
            if pivot < 0.0 {
                axis.mapv_inplace(|v| -v);
            }

            // Rayleigh quotient gives the variance along this axis.
            let variance = axis.dot(&cov.dot(&axis));
            ratios.push(if total_variance > 0.0 { variance / total_variance } else { 0.0 });
            components.row_mut(c).assign(&axis);
        }

        self.model = Some(PcaModel {
            mean,
            components,
            explained_variance_ratio: ratios,
        });
        Ok(())
    }

    fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| anyhow!("PCA: transform called before fit"))?;
        if data.ncols() != model.mean.len() {
            bail!(
                "PCA: expected {} columns, got {}",
                model.mean.len(),
                data.ncols()
            );
        }
        let centered = data - &model.mean;
        Ok(centered.dot(&model.components.t()))
    }

    fn n_components(&self) -> usize {
        self.n_components
    }

    fn explained_variance_ratio(&self) -> Vec<f64> {
        self.model
            .as_ref()
            .map(|m| m.explained_variance_ratio.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn diagonal_cloud() -> Array2<f64> {
        // Points along y = x; each t appears with +w and -w, so the wobble
        // is uncorrelated with t and the leading axis is exactly the diagonal
        Array2::from_shape_fn((20, 2), |(i, j)| {
            let t = (i / 2) as f64 - 5.0;
            let wobble = if i % 2 == 0 { 0.1 } else { -0.1 };
            if j == 0 { t + wobble } else { t - wobble }
        })
    }

    #[test]
    fn test_pca_first_axis_follows_diagonal() {
        let mut pca = Pca::new(1);
        pca.fit(&diagonal_cloud()).unwrap();
        let model = pca.model.as_ref().unwrap();
        let axis = model.components.row(0);
        let expected = 1.0 / 2.0_f64.sqrt();
        assert!((axis[0] - expected).abs() < 1e-6, "axis={axis}");
        assert!((axis[1] - expected).abs() < 1e-6, "axis={axis}");
        assert!(pca.explained_variance_ratio()[0] > 0.99);
    }

    #[test]
    fn test_pca_second_axis_is_orthogonal() {
        let mut pca = Pca::new(2);
        pca.fit(&diagonal_cloud()).unwrap();
        let model = pca.model.as_ref().unwrap();
        let second = model.components.row(1);
        let expected = 1.0 / 2.0_f64.sqrt();
        assert!((second[0].abs() - expected).abs() < 1e-9, "axis={second}");
        assert!((second[0] + second[1]).abs() < 1e-9, "axis={second}");
        let ratios = pca.explained_variance_ratio();
        assert!((ratios[0] + ratios[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_pca_transform_shape_and_centering() {
        let data = diagonal_cloud();
        let mut pca = Pca::new(2);
        pca.fit(&data).unwrap();
        let projected = pca.transform(&data).unwrap();
        assert_eq!(projected.dim(), (20, 2));
        let means = projected.mean_axis(Axis(0)).unwrap();
        for m in means.iter() {
            assert!(m.abs() < 1e-9, "projection should be centered, got {m}");
        }
    }

    #[test]
    fn test_pca_full_rank_preserves_distances() {
        let data = array![[1.0, 0.0, 2.0], [0.0, 3.0, 1.0], [4.0, 1.0, 0.0], [2.0, 2.0, 2.0]];
        let mut pca = Pca::new(3);
        pca.fit(&data).unwrap();
        let projected = pca.transform(&data).unwrap();
        let d_orig = (&data.row(0) - &data.row(2)).mapv(|v| v * v).sum().sqrt();
        let d_proj = (&projected.row(0) - &projected.row(2)).mapv(|v| v * v).sum().sqrt();
        assert!((d_orig - d_proj).abs() < 1e-9, "{d_orig} vs {d_proj}");
    }

    #[test]
    fn test_pca_rejects_too_many_components() {
        let data = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(Pca::new(3).fit(&data).is_err());
        assert!(Pca::new(0).fit(&data).is_err());
    }

    #[test]
    fn test_pca_transform_before_fit() {
        let pca = Pca::new(1);
        assert!(pca.transform(&array![[1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_pca_column_mismatch() {
        let mut pca = Pca::new(1);
        pca.fit(&diagonal_cloud()).unwrap();
        assert!(pca.transform(&array![[1.0, 2.0, 3.0]]).is_err());
    }
}
