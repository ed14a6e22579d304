use std::collections::HashMap;

use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use hotelclust_features::embedding::DestinationEmbeddingTable;
use hotelclust_features::loader::Dataset;

pub fn display_embedding(table: &DestinationEmbeddingTable, show: usize) {
    println!(
        "\n== Table des destinations : {} destinations, {} composantes ==\n",
        table.len(),
        table.dim()
    );

    let mut variance = Table::new();
    variance
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Composante", "Variance expliquée", "Cumul"]);

    let mut cumulative = 0.0;
    for (i, ratio) in table.explained_variance_ratio().iter().enumerate() {
        cumulative += ratio;
        variance.add_row(vec![
            Cell::new(format!("pc{}", i + 1)),
            Cell::new(format!("{:.2}%", ratio * 100.0)),
            Cell::new(format!("{:.2}%", cumulative * 100.0)),
        ]);
    }
    println!("{variance}");

    if show == 0 {
        return;
    }

    let mut header = vec!["Destination".to_string()];
    header.extend((1..=table.dim()).map(|i| format!("pc{i}")));
    let mut sample = Table::new();
    sample
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);

    for id in table.ids().into_iter().take(show) {
        let mut row = vec![id.to_string()];
        row.extend(table.lookup(id, table.dim()).iter().map(|v| format!("{v:.3}")));
        sample.add_row(row);
    }
    println!("\n{sample}");
}

pub fn display_load_stats(label: &str, dataset: &Dataset) {
    let stats = &dataset.stats;
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Fichier", "Lignes lues", "Écartées", "Exemples", "Features", "Dates invalides"]);

    let fallbacks = if stats.date_fallbacks > 0 {
        Cell::new(stats.date_fallbacks).fg(Color::Yellow)
    } else {
        Cell::new(stats.date_fallbacks)
    };
    table.add_row(vec![
        Cell::new(label),
        Cell::new(stats.rows_scanned),
        Cell::new(stats.excluded),
        Cell::new(dataset.n_examples()),
        Cell::new(dataset.n_features()),
        fallbacks,
    ]);
    println!("{table}");
}

pub fn display_model(name: &str, params: &HashMap<String, f64>, n_classes: usize) {
    println!("\n== Modèle {name} ({n_classes} classes) ==\n");

    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Paramètre", "Valeur"]);
    for key in keys {
        table.add_row(vec![Cell::new(key), Cell::new(format!("{}", params[key]))]);
    }
    println!("{table}");
}

pub fn display_score(n_train: usize, n_holdout: usize, map5: f64, elapsed_ms: u128) {
    let color = if map5 >= 0.3 {
        Color::Green
    } else if map5 >= 0.1 {
        Color::Yellow
    } else {
        Color::Red
    };

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Entraînement", "Validation", "MAP@5"]);
    table.add_row(vec![
        Cell::new(n_train),
        Cell::new(n_holdout),
        Cell::new(format!("{map5:.4}")).fg(color),
    ]);
    println!("\n{table}");
    println!("\nTemps total : {elapsed_ms} ms");
}
