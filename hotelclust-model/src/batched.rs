use anyhow::{Result, bail};
use ndarray::{Array2, ArrayView2, Axis, s};

use crate::classifier::Classifier;
use crate::metrics;

pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Enveloppe un classifieur et découpe la prédiction en blocs de
/// `chunk_size` lignes, pour borner la mémoire du modèle sous-jacent.
pub struct BatchedClassifier<C: Classifier> {
    inner: C,
    chunk_size: usize,
}

impl<C: Classifier> BatchedClassifier<C> {
    pub fn new(inner: C, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            bail!("chunk_size doit être strictement positif");
        }
        Ok(Self { inner, chunk_size })
    }

    pub fn with_default_chunk(inner: C) -> Self {
        Self {
            inner,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn classes(&self) -> &[u32] {
        self.inner.classes()
    }

    pub fn fit(&mut self, x: ArrayView2<f64>, y: &[u32]) -> Result<()> {
        self.inner.fit(x, y)
    }

    pub fn predict_probabilities(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.predict_probabilities_with(x, |_, _| {})
    }

    /// Comme [`Self::predict_probabilities`], en appelant `progress(faites, total)`
    /// après chaque bloc.
    pub fn predict_probabilities_with<F>(&self, x: ArrayView2<f64>, mut progress: F) -> Result<Array2<f64>>
    where
        F: FnMut(usize, usize),
    {
        let n_rows = x.nrows();
        let n_classes = self.inner.classes().len();
        if n_rows == 0 {
            return Ok(Array2::zeros((0, n_classes)));
        }

        let mut blocks: Vec<Array2<f64>> = Vec::with_capacity(n_rows.div_ceil(self.chunk_size));
        for start in (0..n_rows).step_by(self.chunk_size) {
            let end = (start + self.chunk_size).min(n_rows);
            let block = self.inner.predict_proba(x.slice(s![start..end, ..]))?;
            if block.dim() != (end - start, n_classes) {
                bail!(
                    "Bloc {}..{} : forme {:?} au lieu de {:?}",
                    start,
                    end,
                    block.dim(),
                    (end - start, n_classes)
                );
            }
            blocks.push(block);
            progress(end, n_rows);
        }

        let views: Vec<ArrayView2<f64>> = blocks.iter().map(|b| b.view()).collect();
        Ok(ndarray::concatenate(Axis(0), &views)?)
    }

    /// MAP@5 des prédictions par blocs contre les labels `y`.
    pub fn rank_score(&self, x: ArrayView2<f64>, y: &[u32]) -> Result<f64> {
        let probs = self.predict_probabilities(x)?;
        metrics::mean_average_precision_at_5(probs.view(), self.inner.classes(), y)
    }

    /// Les `k` meilleures classes par ligne, calculées bloc par bloc sans
    /// garder la matrice complète des probabilités.
    pub fn predict_top_k<F>(&self, x: ArrayView2<f64>, k: usize, mut progress: F) -> Result<Vec<Vec<u32>>>
    where
        F: FnMut(usize, usize),
    {
        let n_rows = x.nrows();
        let classes = self.inner.classes();
        let mut out = Vec::with_capacity(n_rows);
        for start in (0..n_rows).step_by(self.chunk_size) {
            let end = (start + self.chunk_size).min(n_rows);
            let block = self.inner.predict_proba(x.slice(s![start..end, ..]))?;
            if block.dim() != (end - start, classes.len()) {
                bail!("Bloc {}..{} : forme {:?} inattendue", start, end, block.dim());
            }
            out.extend(block.rows().into_iter().map(|row| metrics::top_k_classes(row, classes, k)));
            progress(end, n_rows);
        }
        Ok(out)
    }
}
