use ndarray::Array1;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Separator between a categorical field and its value in indicator column names.
pub const PREFIX_SEPARATOR: char = '_';

#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error("Failed to read feature schema: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid feature schema: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Feature schema is empty")]
    EmptySchema,
    #[error("Feature schema contains an empty column name")]
    EmptyColumn,
    #[error("Feature schema contains duplicate column: {0}")]
    DuplicateColumn(String),
    #[error("Field '{field}' has unsupported value type: {kind}")]
    UnsupportedValue { field: String, kind: &'static str },
}

/// One-hot encoded form of a single submitted record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedRecord {
    columns: Vec<(String, f64)>,
}

impl EncodedRecord {
    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| *value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Numbers and booleans pass through under their own name, strings become
/// `field_value` indicators, nulls produce nothing.
pub fn encode_record(record: &Map<String, Value>) -> Result<EncodedRecord, FeatureError> {
    let mut columns = Vec::with_capacity(record.len());
    for (field, value) in record {
        match value {
            Value::Null => {}
            Value::Bool(b) => columns.push((field.clone(), if *b { 1.0 } else { 0.0 })),
            Value::Number(n) => {
                // Only arbitrary-precision builds can fail here.
                let v = n.as_f64().ok_or_else(|| FeatureError::UnsupportedValue {
                    field: field.clone(),
                    kind: "number",
                })?;
                columns.push((field.clone(), v));
            }
            Value::String(s) => {
                columns.push((format!("{}{}{}", field, PREFIX_SEPARATOR, s), 1.0));
            }
            Value::Array(_) => {
                return Err(FeatureError::UnsupportedValue {
                    field: field.clone(),
                    kind: "array",
                });
            }
            Value::Object(_) => {
                return Err(FeatureError::UnsupportedValue {
                    field: field.clone(),
                    kind: "object",
                });
            }
        }
    }
    Ok(EncodedRecord { columns })
}

/// The fixed, ordered column list the model was trained on.
#[derive(Debug, Clone)]
pub struct FeatureSchema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Result<Self, FeatureError> {
        if columns.is_empty() {
            return Err(FeatureError::EmptySchema);
        }
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if column.is_empty() {
                return Err(FeatureError::EmptyColumn);
            }
            if !seen.insert(column.as_str()) {
                return Err(FeatureError::DuplicateColumn(column.clone()));
            }
        }
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        Ok(Self { columns, index })
    }

    pub fn load(path: &Path) -> Result<Self, FeatureError> {
        let raw = std::fs::read_to_string(path)?;
        let columns: Vec<String> = serde_json::from_str(&raw)?;
        Self::new(columns)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Reindex an encoded record onto the schema: unknown columns are dropped,
    /// missing ones are zero.
    pub fn align(&self, record: &EncodedRecord) -> AlignedRow<'_> {
        let mut values = Array1::<f64>::zeros(self.columns.len());
        for (name, value) in &record.columns {
            match self.index.get(name) {
                Some(&i) => values[i] = *value,
                None => log::debug!("Dropping column not in feature schema: {}", name),
            }
        }
        AlignedRow {
            columns: &self.columns,
            values,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlignedRow<'a> {
    columns: &'a [String],
    values: Array1<f64>,
}

impl<'a> AlignedRow<'a> {
    pub fn columns(&self) -> &'a [String] {
        self.columns
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i])
    }
}
