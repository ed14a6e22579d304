use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Weekday};

use hotelclust_data::columns::{Column, RAW_FEATURES, RecordKind};
use hotelclust_data::record::parse_line;

use crate::embedding::DestinationEmbeddingTable;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const DERIVED_FEATURE_NAMES: [&str; 8] = [
    "len_of_stay",
    "weekends",
    "srch_ci_day_of_year",
    "srch_co_day_of_year",
    "srch_ci_month",
    "srch_co_month",
    "srch_ci_week",
    "srch_co_week",
];

/// Date de repli quand srch_ci / srch_co est vide ou mal formée.
pub fn fallback_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default()
}

/// Une ligne transformée en vecteur de features.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub features: Vec<f64>,
    pub label: Option<u32>,
    /// Identifiant de la ligne (fichier de scoring uniquement).
    pub id: Option<String>,
    /// Nombre de dates remplacées par la date de repli (0, 1 ou 2).
    pub date_fallbacks: u32,
}

/// Parse stricte `YYYY-MM-DD` ; `None` si la chaîne est invalide.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

fn date_or_fallback(raw: &str, column: Column, fallbacks: &mut u32) -> NaiveDate {
    match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        Ok(date) => date,
        Err(e) => {
            log::warn!("{} invalide '{}' ({}), repli sur {}", column.name(), raw, e, fallback_date());
            *fallbacks += 1;
            fallback_date()
        }
    }
}

/// Numéro de semaine, lundi premier jour (les jours avant le premier lundi sont en semaine 0).
pub fn monday_week(date: NaiveDate) -> u32 {
    (date.ordinal0() + 7 - date.weekday().num_days_from_monday()) / 7
}

/// Durée du séjour en jours de l'année ; +365 si le séjour passe le 31 décembre.
pub fn len_of_stay(check_in: NaiveDate, check_out: NaiveDate) -> i64 {
    let len = check_out.ordinal() as i64 - check_in.ordinal() as i64;
    if len < 0 { len + 365 } else { len }
}

/// Court séjour (moins de 4 jours) commençant un vendredi ou un samedi.
pub fn is_weekend_trip(check_in: NaiveDate, len_of_stay: i64) -> bool {
    matches!(check_in.weekday(), Weekday::Fri | Weekday::Sat) && len_of_stay < 4
}

pub fn stay_features(check_in: NaiveDate, check_out: NaiveDate) -> [f64; 8] {
    let stay = len_of_stay(check_in, check_out);
    let weekends = if is_weekend_trip(check_in, stay) { 1.0 } else { 0.0 };
    [
        stay as f64,
        weekends,
        check_in.ordinal() as f64,
        check_out.ordinal() as f64,
        check_in.month() as f64,
        check_out.month() as f64,
        monday_week(check_in) as f64,
        monday_week(check_out) as f64,
    ]
}

/// Valeur brute en f64, chaîne vide → 0.0.
pub fn parse_raw(raw: &str, column: Column) -> Result<f64> {
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.trim()
        .parse::<f64>()
        .with_context(|| format!("{} : valeur non numérique '{}'", column.name(), raw))
}

pub struct FeatureExtractor<'a> {
    table: &'a DestinationEmbeddingTable,
    n_components: usize,
}

impl<'a> FeatureExtractor<'a> {
    /// `n_components` est plafonné à la dimension de la table.
    pub fn new(table: &'a DestinationEmbeddingTable, n_components: usize) -> Self {
        Self {
            table,
            n_components: n_components.min(table.dim()),
        }
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Longueur du vecteur : 18 brutes + 8 dérivées + N composantes.
    pub fn width(&self) -> usize {
        RAW_FEATURES.len() + DERIVED_FEATURE_NAMES.len() + self.n_components
    }

    pub fn feature_names(&self) -> Vec<String> {
        RAW_FEATURES
            .iter()
            .map(|c| c.name().to_string())
            .chain(DERIVED_FEATURE_NAMES.iter().map(|s| s.to_string()))
            .chain((0..self.n_components).map(|i| format!("destination_pc{}", i + 1)))
            .collect()
    }

    /// `Ok(None)` quand la ligne est exclue (recherche sans réservation).
    pub fn extract(&self, line: &str, kind: RecordKind) -> Result<Option<Example>> {
        let record = match parse_line(line, kind, false)? {
            Some(r) => r,
            None => return Ok(None),
        };

        let mut date_fallbacks = 0;
        let check_in = date_or_fallback(record.get(Column::SrchCi), Column::SrchCi, &mut date_fallbacks);
        let check_out = date_or_fallback(record.get(Column::SrchCo), Column::SrchCo, &mut date_fallbacks);

        let raw_destination = record.get(Column::SrchDestinationId).trim();
        let destination_id: i64 = raw_destination
            .parse()
            .with_context(|| format!("srch_destination_id invalide : '{}'", raw_destination))?;

        let mut features = Vec::with_capacity(self.width());
        for column in RAW_FEATURES {
            features.push(parse_raw(record.get(column), column)?);
        }
        features.extend_from_slice(&stay_features(check_in, check_out));
        features.extend(self.table.lookup(destination_id, self.n_components));

        let label = match record.label {
            Some(raw) => {
                let raw = raw.trim();
                Some(
                    raw.parse::<u32>()
                        .with_context(|| format!("hotel_cluster invalide : '{}'", raw))?,
                )
            }
            None => None,
        };

        Ok(Some(Example {
            features,
            label,
            id: record.id.map(str::to_string),
            date_fallbacks,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::make_test_table;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    const BOOKED: &str = "2014-08-11 07:46:59,2,3,66,348,48862,2234.2641,12,0,1,9,2014-08-27,2014-08-31,2,0,1,8250,1,1,3,2,50,628,1\n";
    const NOT_BOOKED: &str = "2014-08-11 08:22:12,2,3,66,348,48862,2234.2641,12,0,1,9,2014-08-29,2014-09-02,2,0,1,8250,1,0,1,2,50,628,1\n";
    const MISSING_DISTANCE: &str = "2014-08-11 07:46:59,2,3,66,348,48862,,12,0,1,9,2014-08-27,2014-08-31,2,0,1,8250,1,1,3,2,50,628,41\n";
    const BAD_DATES: &str = "2014-08-11 07:46:59,2,3,66,348,48862,10.5,12,0,1,9,,2161-10-00,2,0,1,8250,1,1,3,2,50,628,41\n";
    const SCORING: &str = "0,2015-09-03 17:09:54,2,3,66,174,37449,5539.0567,1,1,0,3,2016-05-19,2016-05-23,2,0,1,12243,6,6,204,27\n";

    #[test]
    fn test_len_of_stay() {
        assert_eq!(len_of_stay(date("2020-01-01"), date("2020-01-05")), 4);
        // 2020 est bissextile : le 30 décembre est le jour 365
        assert_eq!(len_of_stay(date("2020-12-30"), date("2020-01-02")), 2);
        assert_eq!(len_of_stay(date("2014-12-30"), date("2015-01-02")), 3);
    }

    #[test]
    fn test_weekends() {
        // 2014-08-01 est un vendredi, 2014-08-06 un mercredi
        assert!(is_weekend_trip(date("2014-08-01"), 2));
        assert!(!is_weekend_trip(date("2014-08-01"), 5));
        assert!(is_weekend_trip(date("2014-08-02"), 3));
        assert!(!is_weekend_trip(date("2014-08-06"), 1));

        let f = stay_features(date("2014-08-01"), date("2014-08-03"));
        assert_eq!(f[0], 2.0);
        assert_eq!(f[1], 1.0);
        let f = stay_features(date("2014-08-01"), date("2014-08-06"));
        assert_eq!(f[1], 0.0);
    }

    #[test]
    fn test_monday_week() {
        // 2018-01-01 est un lundi, 2017-01-01 un dimanche
        assert_eq!(monday_week(date("2018-01-01")), 1);
        assert_eq!(monday_week(date("2017-01-01")), 0);
        assert_eq!(monday_week(date("2017-01-02")), 1);
        assert_eq!(monday_week(date("2014-12-31")), 52);
    }

    #[test]
    fn test_stay_features_layout() {
        let f = stay_features(date("2014-08-27"), date("2014-08-31"));
        assert_eq!(f, [4.0, 0.0, 239.0, 243.0, 8.0, 8.0, 34.0, 34.0]);
    }

    #[test]
    fn test_strict_date_parse() {
        assert!(parse_date("2014-08-27").is_some());
        assert!(parse_date("").is_none());
        assert!(parse_date("2161-10-00").is_none());
        assert!(parse_date("27/08/2014").is_none());
    }

    #[test]
    fn test_extract_labeled_width() {
        for n in 1..=10 {
            let table = make_test_table(10);
            let extractor = FeatureExtractor::new(&table, n);
            let ex = extractor.extract(BOOKED, RecordKind::Labeled).unwrap().unwrap();
            assert_eq!(ex.features.len(), 18 + 8 + n);
            assert_eq!(ex.features.len(), extractor.width());
            assert_eq!(ex.label, Some(1));
            assert_eq!(ex.id, None);
            assert_eq!(ex.date_fallbacks, 0);
        }
    }

    #[test]
    fn test_extract_vector_content() {
        let table = make_test_table(3);
        let extractor = FeatureExtractor::new(&table, 3);
        let ex = extractor.extract(BOOKED, RecordKind::Labeled).unwrap().unwrap();
        let expected_raw = [
            2.0, 3.0, 66.0, 348.0, 48862.0, 2234.2641, 12.0, 0.0, 1.0, 9.0, 2.0, 0.0, 1.0,
            8250.0, 1.0, 2.0, 50.0, 628.0,
        ];
        assert_eq!(&ex.features[..18], &expected_raw);
        assert_eq!(&ex.features[18..26], &[4.0, 0.0, 239.0, 243.0, 8.0, 8.0, 34.0, 34.0]);
        assert_eq!(&ex.features[26..], &[0.5, 1.5, 2.5]);
    }

    #[test]
    fn test_empty_field_is_zero() {
        let table = make_test_table(2);
        let extractor = FeatureExtractor::new(&table, 2);
        let ex = extractor.extract(MISSING_DISTANCE, RecordKind::Labeled).unwrap().unwrap();
        let pos = RAW_FEATURES
            .iter()
            .position(|&c| c == Column::OrigDestinationDistance)
            .unwrap();
        assert_eq!(ex.features[pos], 0.0);
        assert_eq!(ex.label, Some(41));
    }

    #[test]
    fn test_bad_dates_fall_back() {
        let table = make_test_table(2);
        let extractor = FeatureExtractor::new(&table, 2);
        let ex = extractor.extract(BAD_DATES, RecordKind::Labeled).unwrap().unwrap();
        assert_eq!(ex.date_fallbacks, 2);
        // 2015-01-01 des deux côtés : séjour nul, jeudi, jour 1, mois 1, semaine 0
        assert_eq!(&ex.features[18..26], &[0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_not_booked_is_excluded() {
        let table = make_test_table(2);
        let extractor = FeatureExtractor::new(&table, 2);
        assert!(extractor.extract(NOT_BOOKED, RecordKind::Labeled).unwrap().is_none());
    }

    #[test]
    fn test_extract_unlabeled() {
        let table = make_test_table(4);
        let extractor = FeatureExtractor::new(&table, 4);
        let ex = extractor.extract(SCORING, RecordKind::Unlabeled).unwrap().unwrap();
        assert_eq!(ex.features.len(), 18 + 8 + 4);
        assert_eq!(ex.label, None);
        assert_eq!(ex.id.as_deref(), Some("0"));
        assert_eq!(&ex.features[26..], &[0.0, -1.0, -2.0, -3.0]);
    }

    #[test]
    fn test_unknown_destination_zero_vector() {
        let table = make_test_table(3);
        let extractor = FeatureExtractor::new(&table, 3);
        let line = BOOKED.replace(",8250,", ",4242,");
        let ex = extractor.extract(&line, RecordKind::Labeled).unwrap().unwrap();
        assert_eq!(&ex.features[26..], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_n_components_capped_by_table() {
        let table = make_test_table(3);
        let extractor = FeatureExtractor::new(&table, 10);
        assert_eq!(extractor.n_components(), 3);
        assert_eq!(extractor.width(), 29);
        assert_eq!(extractor.feature_names().len(), 29);
        assert_eq!(extractor.feature_names()[28], "destination_pc3");
    }

    #[test]
    fn test_malformed_rows_propagate() {
        let table = make_test_table(2);
        let extractor = FeatureExtractor::new(&table, 2);
        let bad_raw = BOOKED.replace(",48862,", ",abc,");
        assert!(extractor.extract(&bad_raw, RecordKind::Labeled).is_err());
        let bad_label = BOOKED.replace(",628,1\n", ",628,x\n");
        assert!(extractor.extract(&bad_label, RecordKind::Labeled).is_err());
        let bad_destination = BOOKED.replace(",8250,", ",,");
        assert!(extractor.extract(&bad_destination, RecordKind::Labeled).is_err());
    }
}
