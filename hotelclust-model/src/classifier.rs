use std::collections::HashMap;

use anyhow::Result;
use ndarray::{Array2, ArrayView2};

/// Classifieur probabiliste multi-classes.
pub trait Classifier {
    fn name(&self) -> &str;
    fn fit(&mut self, x: ArrayView2<f64>, y: &[u32]) -> Result<()>;
    /// Une ligne par exemple, une colonne par classe de [`Classifier::classes`].
    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>>;
    /// Classes connues, triées par ordre croissant.
    fn classes(&self) -> &[u32];
    fn params(&self) -> HashMap<String, f64>;
}
