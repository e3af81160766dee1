use tabled::{settings::Style, Table, Tabled};

use crate::bucket::ObjectInfo;
use crate::document::IndexedDocument;

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Tabled)]
pub struct DocumentRow {
    #[tabled(rename = "Document")]
    pub key: String,
    #[tabled(rename = "Size")]
    pub size: String,
    #[tabled(rename = "Type")]
    pub kind: String,
    #[tabled(rename = "Chunks")]
    pub chunks: String,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &[(&str, String)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

/// Bucket listing joined with index state; `-` marks documents not yet indexed
pub fn documents_table(objects: &[ObjectInfo], indexed: &[IndexedDocument]) -> String {
    if objects.is_empty() {
        return String::new();
    }

    let rows: Vec<DocumentRow> = objects
        .iter()
        .map(|o| {
            let doc = indexed.iter().find(|d| d.key == o.key);
            DocumentRow {
                key: o.key.clone(),
                size: human_bytes(o.size),
                kind: crate::DocumentKind::from_key(&o.key)
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "unsupported".to_string()),
                chunks: doc.map(|d| d.chunks.to_string()).unwrap_or_else(|| "-".to_string()),
            }
        })
        .collect();

    Table::new(&rows).with(Style::rounded()).to_string()
}

pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
