use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use ndarray::Array2;

use crate::linalg::{Pca, Reducer};

pub const DEFAULT_COMPONENTS: usize = 10;
/// Borne de sécurité sur la largeur des vecteurs bruts (149 dans destinations.csv).
pub const MAX_DESTINATION_DIM: usize = 512;

/// Table srch_destination_id → vecteur réduit de dimension fixe.
///
/// Construite une seule fois au démarrage puis passée par référence à
/// l'extracteur ; immuable ensuite.
#[derive(Debug, Clone)]
pub struct DestinationEmbeddingTable {
    vectors: HashMap<i64, Vec<f64>>,
    dim: usize,
    explained_variance_ratio: Vec<f64>,
}

impl DestinationEmbeddingTable {
    /// Lit destinations.csv et réduit chaque ligne par une ACP commune.
    pub fn build(path: &Path, n_components: usize) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Impossible d'ouvrir {:?}", path))?;
        Self::from_reader(file, n_components)
            .with_context(|| format!("Table des destinations invalide : {:?}", path))
    }

    pub fn from_reader<R: Read>(reader: R, n_components: usize) -> Result<Self> {
        let (ids, rows) = read_destination_rows(reader)?;
        let mut pca = Pca::new(n_components);
        Self::fit_rows(ids, &rows, &mut pca)
    }

    /// Ajuste `reducer` sur toutes les lignes puis projette chacune d'elles.
    pub fn fit_rows<R: Reducer>(ids: Vec<i64>, rows: &Array2<f64>, reducer: &mut R) -> Result<Self> {
        if ids.len() != rows.nrows() {
            bail!("{} identifiants pour {} lignes", ids.len(), rows.nrows());
        }
        reducer.fit(rows)?;
        let projected = reducer.transform(rows)?;
        let dim = reducer.n_components();

        let mut vectors = HashMap::with_capacity(ids.len());
        for (id, row) in ids.into_iter().zip(projected.rows()) {
            if row.len() != dim {
                bail!(
                    "Destination {} : {} composantes après réduction au lieu de {}",
                    id,
                    row.len(),
                    dim
                );
            }
            vectors.insert(id, row.to_vec());
        }

        Ok(Self {
            vectors,
            dim,
            explained_variance_ratio: reducer.explained_variance_ratio(),
        })
    }

    /// Construit une table à partir de vecteurs déjà réduits.
    pub fn from_vectors(vectors: HashMap<i64, Vec<f64>>, dim: usize) -> Result<Self> {
        if let Some((id, v)) = vectors.iter().find(|(_, v)| v.len() != dim) {
            bail!("Destination {} : {} composantes au lieu de {}", id, v.len(), dim);
        }
        Ok(Self {
            vectors,
            dim,
            explained_variance_ratio: Vec::new(),
        })
    }

    /// Les `n` premières composantes (n plafonné à la dimension de la table),
    /// ou un vecteur nul pour une destination inconnue.
    pub fn lookup(&self, destination_id: i64, n: usize) -> Vec<f64> {
        let n = n.min(self.dim);
        match self.vectors.get(&destination_id) {
            Some(v) => v[..n].to_vec(),
            None => vec![0.0; n],
        }
    }

    pub fn contains(&self, destination_id: i64) -> bool {
        self.vectors.contains_key(&destination_id)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn explained_variance_ratio(&self) -> &[f64] {
        &self.explained_variance_ratio
    }

    /// Identifiants triés, pour l'affichage.
    pub fn ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.vectors.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

fn read_destination_rows<R: Read>(reader: R) -> Result<(Vec<i64>, Array2<f64>)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let mut index: HashMap<i64, usize> = HashMap::new();
    let mut ids: Vec<i64> = Vec::new();
    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut width: Option<usize> = None;

    for (line_no, record_result) in reader.records().enumerate() {
        let record = record_result
            .with_context(|| format!("Erreur lecture ligne {}", line_no + 2))?;

        let raw_id = record.get(0).map(str::trim).unwrap_or_default();
        let id: i64 = raw_id
            .parse()
            .with_context(|| format!("Identifiant de destination invalide '{}' (ligne {})", raw_id, line_no + 2))?;

        let values: Vec<f64> = record
            .iter()
            .skip(1)
            .map(|s| {
                let s = s.trim();
                s.parse::<f64>()
                    .with_context(|| format!("Valeur invalide '{}' (destination {})", s, id))
            })
            .collect::<Result<_>>()?;

        let k = *width.get_or_insert(values.len());
        if values.len() != k {
            bail!("Destination {} : {} valeurs au lieu de {}", id, values.len(), k);
        }
        if k == 0 || k > MAX_DESTINATION_DIM {
            bail!("Largeur de vecteur hors limites : {} (1-{})", k, MAX_DESTINATION_DIM);
        }

        match index.get(&id) {
            Some(&pos) => {
                log::warn!("Destination {} en double, la dernière ligne l'emporte", id);
                rows[pos] = values;
            }
            None => {
                index.insert(id, rows.len());
                ids.push(id);
                rows.push(values);
            }
        }
    }

    let k = match width {
        Some(k) => k,
        None => bail!("Aucune destination dans la table"),
    };
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    let matrix = Array2::from_shape_vec((ids.len(), k), flat)
        .context("Matrice des destinations incohérente")?;
    Ok((ids, matrix))
}

/// Table factice : destinations 8250 et 12243 uniquement.
#[cfg(test)]
pub(crate) fn make_test_table(dim: usize) -> DestinationEmbeddingTable {
    let mut map = HashMap::new();
    map.insert(8250, (0..dim).map(|i| 0.5 + i as f64).collect());
    map.insert(12243, (0..dim).map(|i| -(i as f64)).collect());
    DestinationEmbeddingTable::from_vectors(map, dim).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_destinations_csv(n_rows: usize, k: usize) -> String {
        let mut out = String::from("srch_destination_id");
        for j in 1..=k {
            out.push_str(&format!(",d{j}"));
        }
        out.push('\n');
        for i in 0..n_rows {
            out.push_str(&format!("{}", i * 3 + 1));
            for j in 0..k {
                let v = -2.0 - ((i * 7 + j * 13) % 11) as f64 * 0.1 - (i as f64) * 0.05 * (j % 3) as f64;
                out.push_str(&format!(",{v:.6}"));
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn test_build_from_reader() {
        let csv = make_destinations_csv(40, 12);
        let table = DestinationEmbeddingTable::from_reader(csv.as_bytes(), 5).unwrap();
        assert_eq!(table.len(), 40);
        assert_eq!(table.dim(), 5);
        assert_eq!(table.lookup(1, 5).len(), 5);
        assert_eq!(table.explained_variance_ratio().len(), 5);
    }

    #[test]
    fn test_lookup_matches_projection() {
        let csv = make_destinations_csv(30, 8);
        let (ids, rows) = read_destination_rows(csv.as_bytes()).unwrap();
        let mut pca = Pca::new(4);
        let table = DestinationEmbeddingTable::fit_rows(ids.clone(), &rows, &mut pca).unwrap();

        let row = rows.slice(ndarray::s![3..4, ..]).to_owned();
        let expected = pca.transform(&row).unwrap();
        let got = table.lookup(ids[3], 4);
        for (g, e) in got.iter().zip(expected.row(0)) {
            assert!((g - e).abs() < 1e-9, "{g} vs {e}");
        }
    }

    #[test]
    fn test_lookup_unknown_is_zero() {
        let csv = make_destinations_csv(20, 6);
        let table = DestinationEmbeddingTable::from_reader(csv.as_bytes(), 3).unwrap();
        assert!(!table.contains(999_999));
        assert_eq!(table.lookup(999_999, 3), vec![0.0; 3]);
        assert_eq!(table.lookup(999_999, 2), vec![0.0; 2]);
    }

    #[test]
    fn test_lookup_prefix_and_cap() {
        let mut map = HashMap::new();
        map.insert(7, vec![1.0, 2.0, 3.0]);
        let table = DestinationEmbeddingTable::from_vectors(map, 3).unwrap();
        assert_eq!(table.lookup(7, 2), vec![1.0, 2.0]);
        assert_eq!(table.lookup(7, 10), vec![1.0, 2.0, 3.0]);
        assert_eq!(table.lookup(8, 10), vec![0.0; 3]);
    }

    #[test]
    fn test_from_vectors_rejects_ragged() {
        let mut map = HashMap::new();
        map.insert(1, vec![1.0, 2.0]);
        map.insert(2, vec![1.0]);
        assert!(DestinationEmbeddingTable::from_vectors(map, 2).is_err());
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let csv = "srch_destination_id,d1,d2\n1,0.1,0.2\n2,0.3\n";
        assert!(DestinationEmbeddingTable::from_reader(csv.as_bytes(), 1).is_err());
    }

    #[test]
    fn test_bad_value_rejected() {
        let csv = "srch_destination_id,d1,d2\n1,0.1,abc\n2,0.3,0.4\n";
        assert!(DestinationEmbeddingTable::from_reader(csv.as_bytes(), 1).is_err());
    }

    #[test]
    fn test_empty_table_rejected() {
        let csv = "srch_destination_id,d1,d2\n";
        assert!(DestinationEmbeddingTable::from_reader(csv.as_bytes(), 1).is_err());
    }

    #[test]
    fn test_duplicate_id_last_wins() {
        let csv = "srch_destination_id,d1,d2\n1,0.1,0.2\n2,0.3,0.5\n1,0.9,0.1\n3,0.4,0.4\n";
        let (ids, rows) = read_destination_rows(csv.as_bytes()).unwrap();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(rows[[0, 0]], 0.9);
    }

    #[test]
    fn test_build_missing_file() {
        let path = std::env::temp_dir().join("hotelclust_missing_destinations.csv");
        assert!(DestinationEmbeddingTable::build(&path, 2).is_err());
    }
}
