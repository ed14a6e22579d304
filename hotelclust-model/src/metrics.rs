use std::cmp::Ordering;

use anyhow::{Result, bail};
use ndarray::{ArrayView1, ArrayView2};

/// Nombre de propositions retenues par exemple.
pub const MAP_CUTOFF: usize = 5;

/// Rang (à partir de 1) de la classe attendue dans une ligne de probabilités.
///
/// Une classe passe devant la cible si sa probabilité est plus grande, ou égale
/// avec un identifiant plus grand. Une cible absente de `classes` a une
/// probabilité nulle ; si elle apparaît plusieurs fois, la première colonne
/// fait foi. Le comptage s'arrête dès que le rang dépasse la coupure.
pub fn rank_of_target(row: ArrayView1<f64>, classes: &[u32], target: u32) -> usize {
    let target_prob = classes
        .iter()
        .position(|&c| c == target)
        .map(|j| row[j])
        .unwrap_or(0.0);

    let mut place = 1;
    for (&class, &p) in classes.iter().zip(row.iter()) {
        if p > target_prob || (p == target_prob && class > target) {
            place += 1;
            if place > MAP_CUTOFF {
                break;
            }
        }
    }
    place
}

/// Contribution d'un exemple : 1/rang si la cible est dans les 5 premiers, 0 sinon.
pub fn precision_at_cutoff(place: usize) -> f64 {
    if place <= MAP_CUTOFF { 1.0 / place as f64 } else { 0.0 }
}

/// MAP@5 sur une matrice de probabilités [n_exemples, n_classes].
pub fn mean_average_precision_at_5(probs: ArrayView2<f64>, classes: &[u32], truth: &[u32]) -> Result<f64> {
    if probs.ncols() != classes.len() {
        bail!("{} colonnes de probabilités pour {} classes", probs.ncols(), classes.len());
    }
    if probs.nrows() != truth.len() {
        bail!("{} lignes de probabilités pour {} labels", probs.nrows(), truth.len());
    }
    if truth.is_empty() {
        return Ok(0.0);
    }

    let total: f64 = probs
        .rows()
        .into_iter()
        .zip(truth)
        .map(|(row, &target)| precision_at_cutoff(rank_of_target(row, classes, target)))
        .sum();
    Ok(total / truth.len() as f64)
}

/// Les `k` classes les plus probables, avec le même départage que [`rank_of_target`].
pub fn top_k_classes(row: ArrayView1<f64>, classes: &[u32], k: usize) -> Vec<u32> {
    let mut ranked: Vec<(u32, f64)> = classes.iter().copied().zip(row.iter().copied()).collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.0.cmp(&a.0))
    });
    ranked.into_iter().take(k).map(|(c, _)| c).collect()
}
