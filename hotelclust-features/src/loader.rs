use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result, bail};
use ndarray::{Array1, Array2, s};

use hotelclust_data::columns::RecordKind;
use hotelclust_data::record::check_header;

use crate::extract::FeatureExtractor;

/// Fréquence des messages de progression (en lignes parcourues).
pub const PROGRESS_EVERY: usize = 100_000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Lignes de données lues (hors en-tête).
    pub rows_scanned: usize,
    /// Recherches sans réservation écartées.
    pub excluded: usize,
    pub date_fallbacks: usize,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub features: Array2<f64>,
    /// `None` pour un fichier de scoring.
    pub labels: Option<Array1<u32>>,
    /// Colonne `id` du fichier de scoring.
    pub ids: Option<Vec<String>>,
    pub stats: LoadStats,
}

impl Dataset {
    pub fn n_examples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Découpage déterministe : les premières lignes pour l'entraînement,
    /// la fraction `holdout` finale pour la validation.
    pub fn split_holdout(&self, holdout: f64) -> Result<(Dataset, Dataset)> {
        if !(holdout > 0.0 && holdout < 1.0) {
            bail!("Fraction de validation hors limites : {holdout} (0-1 exclus)");
        }
        let labels = match &self.labels {
            Some(l) => l,
            None => bail!("Découpage impossible sans labels"),
        };
        let n = self.n_examples();
        let n_holdout = (n as f64 * holdout).round() as usize;
        let n_train = n.saturating_sub(n_holdout);
        if n_train == 0 || n_holdout == 0 {
            bail!("Pas assez d'exemples ({n}) pour une validation de {holdout}");
        }

        let part = |rows: std::ops::Range<usize>| Dataset {
            features: self.features.slice(s![rows.clone(), ..]).to_owned(),
            labels: Some(labels.slice(s![rows]).to_owned()),
            ids: None,
            stats: LoadStats::default(),
        };
        Ok((part(0..n_train), part(n_train..n)))
    }
}

pub struct DatasetLoader<'a> {
    extractor: FeatureExtractor<'a>,
}

impl<'a> DatasetLoader<'a> {
    pub fn new(extractor: FeatureExtractor<'a>) -> Self {
        Self { extractor }
    }

    pub fn extractor(&self) -> &FeatureExtractor<'a> {
        &self.extractor
    }

    /// Charge au plus `cap` exemples d'un fichier. Le fichier est fermé au retour,
    /// y compris en cas d'erreur.
    pub fn load(&self, path: &Path, cap: Option<usize>, kind: RecordKind) -> Result<Dataset> {
        let file = File::open(path).with_context(|| format!("Impossible d'ouvrir {:?}", path))?;
        self.load_from_reader(BufReader::new(file), cap, kind)
            .with_context(|| format!("Échec du chargement de {:?}", path))
    }

    pub fn load_from_reader<R: BufRead>(&self, mut reader: R, cap: Option<usize>, kind: RecordKind) -> Result<Dataset> {
        let mut line = String::new();

        if reader.read_line(&mut line).context("Lecture de l'en-tête")? == 0 {
            bail!("Fichier vide : en-tête manquant");
        }
        check_header(&line, kind)?;

        let width = self.extractor.width();
        let mut flat: Vec<f64> = Vec::new();
        let mut labels: Vec<u32> = Vec::new();
        let mut ids: Vec<String> = Vec::new();
        let mut stats = LoadStats::default();
        let mut n_examples = 0usize;

        loop {
            if cap.is_some_and(|c| n_examples >= c) {
                break;
            }
            line.clear();
            if reader.read_line(&mut line).context("Erreur de lecture")? == 0 {
                break;
            }
            if line.trim_end_matches(['\n', '\r']).is_empty() {
                continue;
            }

            stats.rows_scanned += 1;
            let line_no = stats.rows_scanned + 1;

            let example = self
                .extractor
                .extract(&line, kind)
                .with_context(|| format!("Ligne {} invalide", line_no))?;

            if let Some(example) = example {
                if example.features.len() != width {
                    bail!(
                        "Ligne {} : {} features au lieu de {}",
                        line_no,
                        example.features.len(),
                        width
                    );
                }
                stats.date_fallbacks += example.date_fallbacks as usize;
                flat.extend_from_slice(&example.features);
                if let Some(label) = example.label {
                    labels.push(label);
                }
                if let Some(id) = example.id {
                    ids.push(id);
                }
                n_examples += 1;
            } else {
                stats.excluded += 1;
            }

            if stats.rows_scanned % PROGRESS_EVERY == 0 {
                log::info!(
                    "{} lignes parcourues, {} exemples chargés",
                    stats.rows_scanned,
                    n_examples
                );
            }
        }

        if stats.date_fallbacks > 0 {
            log::warn!("{} dates remplacées par la date de repli", stats.date_fallbacks);
        }

        let features = Array2::from_shape_vec((n_examples, width), flat)
            .context("Matrice de features incohérente")?;

        let (labels, ids) = if kind.is_labeled() {
            (Some(Array1::from_vec(labels)), None)
        } else {
            (None, Some(ids))
        };

        Ok(Dataset {
            features,
            labels,
            ids,
            stats,
        })
    }
}
