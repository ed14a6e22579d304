use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};

pub const SUBMISSION_HEADER: [&str; 2] = ["id", "hotel_cluster"];

/// Écrit une ligne par exemple : l'identifiant puis les clusters proposés,
/// séparés par des espaces, du plus probable au moins probable.
pub fn write_submission<W: Write>(writer: W, ids: &[String], predictions: &[Vec<u32>]) -> Result<()> {
    if ids.len() != predictions.len() {
        bail!("{} identifiants pour {} prédictions", ids.len(), predictions.len());
    }

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(SUBMISSION_HEADER)?;
    for (id, clusters) in ids.iter().zip(predictions) {
        let joined = clusters
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        wtr.write_record([id.as_str(), joined.as_str()])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn save_submission(path: &Path, ids: &[String], predictions: &[Vec<u32>]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Impossible de créer {:?}", path))?;
    write_submission(file, ids, predictions)
        .with_context(|| format!("Erreur d'écriture de {:?}", path))
}
