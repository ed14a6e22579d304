use std::collections::HashMap;

use anyhow::{Result, bail};
use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::prelude::*;
use rayon::prelude::*;

use crate::classifier::Classifier;
use crate::config::ForestConfig;

/// Forêt de classification : bootstrap par arbre, sous-ensemble aléatoire de
/// features à chaque coupure, critère de Gini. Les feuilles stockent la
/// distribution des classes ; la prédiction est la moyenne des arbres.
pub struct RandomForestClassifier {
    config: ForestConfig,
    classes: Vec<u32>,
    n_features: usize,
    forest: Vec<TreeNode>,
}

impl RandomForestClassifier {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            classes: Vec::new(),
            n_features: 0,
            forest: Vec::new(),
        }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        !self.forest.is_empty()
    }

    /// Moyenne des distributions des feuilles atteintes, écrite dans `out`.
    fn predict_row(&self, row: &[f64], out: &mut [f64]) {
        for tree in &self.forest {
            for (o, p) in out.iter_mut().zip(predict_tree(tree, row)) {
                *o += p;
            }
        }
        let n = self.forest.len() as f64;
        for o in out.iter_mut() {
            *o /= n;
        }
    }
}

impl Classifier for RandomForestClassifier {
    fn name(&self) -> &str {
        "RandomForest"
    }

    fn fit(&mut self, x: ArrayView2<f64>, y: &[u32]) -> Result<()> {
        if x.nrows() != y.len() {
            bail!("{} lignes pour {} labels", x.nrows(), y.len());
        }
        if x.nrows() == 0 || x.ncols() == 0 {
            bail!("Jeu d'entraînement vide ({}x{})", x.nrows(), x.ncols());
        }
        if self.config.n_trees == 0 {
            bail!("n_trees doit être strictement positif");
        }

        let mut classes: Vec<u32> = y.to_vec();
        classes.sort_unstable();
        classes.dedup();
        let class_index: HashMap<u32, usize> =
            classes.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        let targets: Vec<usize> = y.iter().map(|c| class_index[c]).collect();

        let ctx = TreeContext {
            x: x.view(),
            targets: &targets,
            n_classes: classes.len(),
            features_per_split: self.config.features_per_split(x.ncols()),
            min_samples_split: self.config.min_samples_split.max(2),
            threshold_samples: self.config.threshold_samples.max(1),
        };

        // Une graine par arbre : résultat indépendant de l'ordonnancement rayon
        let seed = self.config.seed;
        let max_depth = self.config.max_depth;
        let forest: Vec<TreeNode> = (0..self.config.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
                let n_samples = ctx.x.nrows();
                let indices: Vec<usize> = (0..n_samples).map(|_| rng.random_range(0..n_samples)).collect();
                build_tree(&ctx, indices, max_depth, &mut rng)
            })
            .collect();

        log::info!(
            "{} arbres entraînés sur {} exemples, {} classes",
            forest.len(),
            x.nrows(),
            classes.len()
        );

        self.classes = classes;
        self.n_features = x.ncols();
        self.forest = forest;
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted() {
            bail!("Forêt non entraînée");
        }
        if x.ncols() != self.n_features {
            bail!("{} features au lieu de {}", x.ncols(), self.n_features);
        }

        let n_classes = self.classes.len();
        let mut out = Array2::zeros((x.nrows(), n_classes));
        for (row, mut dist) in x.rows().into_iter().zip(out.rows_mut()) {
            let features = row.to_vec();
            let mut probs = vec![0.0; n_classes];
            self.predict_row(&features, &mut probs);
            dist.assign(&ArrayView1::from(&probs));
        }
        Ok(out)
    }

    fn classes(&self) -> &[u32] {
        &self.classes
    }

    fn params(&self) -> HashMap<String, f64> {
        HashMap::from([
            ("n_trees".to_string(), self.config.n_trees as f64),
            ("max_depth".to_string(), self.config.max_depth as f64),
            ("min_samples_split".to_string(), self.config.min_samples_split as f64),
            ("threshold_samples".to_string(), self.config.threshold_samples as f64),
        ])
    }
}

struct TreeContext<'a> {
    x: ArrayView2<'a, f64>,
    targets: &'a [usize],
    n_classes: usize,
    features_per_split: usize,
    min_samples_split: usize,
    threshold_samples: usize,
}

#[derive(Debug)]
enum TreeNode {
    Leaf { distribution: Vec<f64> },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

fn class_counts(ctx: &TreeContext, indices: &[usize]) -> Vec<usize> {
    let mut counts = vec![0; ctx.n_classes];
    for &i in indices {
        counts[ctx.targets[i]] += 1;
    }
    counts
}

fn leaf(counts: &[usize]) -> TreeNode {
    let total = counts.iter().sum::<usize>().max(1) as f64;
    TreeNode::Leaf {
        distribution: counts.iter().map(|&c| c as f64 / total).collect(),
    }
}

fn build_tree(ctx: &TreeContext, indices: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> TreeNode {
    let counts = class_counts(ctx, &indices);
    if max_depth == 0 || indices.len() < ctx.min_samples_split {
        return leaf(&counts);
    }

    // Nœud pur
    if counts.iter().filter(|&&c| c > 0).count() <= 1 {
        return leaf(&counts);
    }

    let n_features = ctx.x.ncols();
    // Sélectionner des features aléatoires
    let mut feature_indices: Vec<usize> = (0..n_features).collect();
    feature_indices.shuffle(rng);
    feature_indices.truncate(ctx.features_per_split);

    let mut best_gini = f64::MAX;
    let mut best_feature = 0;
    let mut best_threshold = 0.0;

    for &feat_idx in &feature_indices {
        // Valeurs distinctes triées pour cette feature
        let mut values: Vec<f64> = indices.iter().map(|&i| ctx.x[[i, feat_idx]]).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        values.dedup();

        if values.len() < 2 {
            continue;
        }

        // Seuils entre valeurs consécutives, échantillonnés pour la performance
        let step = (values.len() / ctx.threshold_samples).max(1);
        for i in (0..values.len() - 1).step_by(step) {
            let threshold = (values[i] + values[i + 1]) / 2.0;
            let gini = split_gini(ctx, &indices, feat_idx, threshold);

            if gini < best_gini {
                best_gini = gini;
                best_feature = feat_idx;
                best_threshold = threshold;
            }
        }
    }

    if best_gini >= gini_impurity(&counts) {
        return leaf(&counts);
    }

    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .into_iter()
        .partition(|&i| ctx.x[[i, best_feature]] <= best_threshold);

    if left.is_empty() || right.is_empty() {
        return leaf(&counts);
    }

    TreeNode::Split {
        feature_idx: best_feature,
        threshold: best_threshold,
        left: Box::new(build_tree(ctx, left, max_depth - 1, rng)),
        right: Box::new(build_tree(ctx, right, max_depth - 1, rng)),
    }
}

fn gini_impurity(counts: &[usize]) -> f64 {
    let n: usize = counts.iter().sum();
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
}

fn split_gini(ctx: &TreeContext, indices: &[usize], feature_idx: usize, threshold: f64) -> f64 {
    let mut left = vec![0usize; ctx.n_classes];
    let mut right = vec![0usize; ctx.n_classes];

    for &i in indices {
        if ctx.x[[i, feature_idx]] <= threshold {
            left[ctx.targets[i]] += 1;
        } else {
            right[ctx.targets[i]] += 1;
        }
    }

    let n_left: usize = left.iter().sum();
    let n_right: usize = right.iter().sum();
    if n_left == 0 || n_right == 0 {
        return f64::MAX;
    }

    let n = indices.len() as f64;
    (n_left as f64 / n) * gini_impurity(&left) + (n_right as f64 / n) * gini_impurity(&right)
}

fn predict_tree<'a>(node: &'a TreeNode, features: &[f64]) -> &'a [f64] {
    match node {
        TreeNode::Leaf { distribution } => distribution.as_slice(),
        TreeNode::Split { feature_idx, threshold, left, right } => {
            if features[*feature_idx] <= *threshold {
                predict_tree(left, features)
            } else {
                predict_tree(right, features)
            }
        }
    }
}

/// Données jouets : deux blocs de features séparés, trois classes.
#[cfg(test)]
pub(crate) fn make_test_problem(n: usize) -> (Array2<f64>, Vec<u32>) {
    let x = Array2::from_shape_fn((n, 4), |(i, j)| {
        let class = (i % 3) as f64;
        class * 10.0 + ((i * 7 + j * 3) % 5) as f64 * 0.1
    });
    let y = (0..n).map(|i| [5, 17, 42][i % 3]).collect();
    (x, y)
}
