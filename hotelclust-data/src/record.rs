use anyhow::{Context, Result, bail};

use crate::columns::{Column, RecordKind, Slot, expected_header};

pub const DELIMITER: char = ',';

/// Ligne découpée : tokens exploitables dans l'ordre de [`Column::ALL`],
/// plus le label (fichier d'entraînement) ou l'id (fichier de scoring).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord<'a> {
    pub tokens: Vec<&'a str>,
    pub label: Option<&'a str>,
    pub id: Option<&'a str>,
}

impl<'a> ParsedRecord<'a> {
    pub fn get(&self, column: Column) -> &'a str {
        self.tokens[column.position()]
    }
}

fn strip_line_terminator(line: &str) -> &str {
    match line.strip_suffix('\n') {
        Some(rest) => rest.strip_suffix('\r').unwrap_or(rest),
        None => line,
    }
}

/// Découpe une ligne selon la disposition de `kind`.
///
/// Retourne `Ok(None)` pour une recherche d'entraînement non suivie d'une
/// réservation (is_booking = 0) : ces lignes sont exclues, ce n'est pas une erreur.
pub fn parse_line(line: &str, kind: RecordKind, is_header: bool) -> Result<Option<ParsedRecord<'_>>> {
    let line = strip_line_terminator(line);
    let raw: Vec<&str> = line.split(DELIMITER).collect();

    if raw.len() != kind.width() {
        bail!(
            "Nombre de colonnes invalide : {} au lieu de {} ({:?})",
            raw.len(),
            kind.width(),
            kind
        );
    }

    if !is_header && kind.is_labeled() {
        if let Some(idx) = kind.position_of(Slot::IsBooking) {
            let flag = raw[idx].trim();
            let is_booking: i64 = flag
                .parse()
                .with_context(|| format!("is_booking invalide : '{}'", flag))?;
            if is_booking == 0 {
                return Ok(None);
            }
        }
    }

    let mut tokens = Vec::with_capacity(Column::ALL.len());
    let mut label = None;
    let mut id = None;

    for (slot, token) in kind.layout().iter().zip(raw) {
        match slot {
            Slot::Feature(_) => tokens.push(token),
            Slot::Label => label = Some(token),
            Slot::Id => id = Some(token),
            // is_booking et cnt n'existent pas au moment du scoring
            Slot::IsBooking | Slot::Count => {}
        }
    }

    Ok(Some(ParsedRecord { tokens, label, id }))
}

/// Vérifie que la ligne d'en-tête correspond exactement aux colonnes attendues,
/// colonnes propres à l'entraînement ou au scoring comprises.
pub fn check_header(line: &str, kind: RecordKind) -> Result<()> {
    let raw = strip_line_terminator(line);
    let expected_raw = kind.raw_header();
    if raw != expected_raw {
        bail!(
            "En-tête inattendu pour {:?} : '{}' (attendu '{}')",
            kind,
            raw,
            expected_raw
        );
    }

    let header = parse_line(line, kind, true)
        .context("En-tête illisible")?
        .context("En-tête exclu")?;
    let expected = expected_header();
    if header.tokens != expected {
        bail!(
            "En-tête inattendu pour {:?} : {:?} (attendu {:?})",
            kind,
            header.tokens,
            expected
        );
    }
    Ok(())
}
