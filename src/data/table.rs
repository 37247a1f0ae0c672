use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, Float64Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use super::model::ChannelGroup;
use crate::config::GroupRename;
use crate::error::{Error, Result};
use crate::report::Warning;

// ---------------------------------------------------------------------------
// FlatTable – one row per channel record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Inputs,
    Outputs,
}

impl TableKind {
    /// Suffix of the archive entry, `<name>_in` or `<name>_out`.
    pub fn suffix(&self) -> &'static str {
        match self {
            TableKind::Inputs => "in",
            TableKind::Outputs => "out",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TableKind::Inputs => "inputs",
            TableKind::Outputs => "outputs",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow {
    pub group: String,
    pub index: u32,
    pub description: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub cs_label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatTable {
    pub kind: TableKind,
    pub rows: Vec<FlatRow>,
}

/// Name, size and distinct coordinate system labels of one group of a flat table.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub name: String,
    pub size: usize,
    pub cs_labels: Vec<String>,
}

impl fmt::Display for GroupSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cs_labels.len() > 1 {
            write!(f, "{:>32}: [{:5}]", self.name, self.size)
        } else {
            write!(f, "{:>32}: [{:5}] {:?}", self.name, self.size, self.cs_labels)
        }
    }
}

// ---------------------------------------------------------------------------
// Flattening
// ---------------------------------------------------------------------------

/// Flatten the groups of one channel set into a table.
///
/// Rows follow the group order and the record order within each group. For the outputs
/// table only, groups named in `renames` are renamed first. Records without a location get
/// `(0,0,0)` and a [`Warning::MissingLocation`] pushed onto `warnings`.
pub fn flatten(
    kind: TableKind,
    groups: &[ChannelGroup],
    renames: &[GroupRename],
    warnings: &mut Vec<Warning>,
) -> Result<FlatTable> {
    let renames: &[GroupRename] = match kind {
        TableKind::Inputs => &[],
        TableKind::Outputs => renames,
    };

    let capacity = groups.iter().map(ChannelGroup::size).sum();
    let mut rows = Vec::with_capacity(capacity);
    let mut seen: HashSet<String> = HashSet::with_capacity(groups.len());

    for group in groups {
        let name = match renames.iter().find(|r| r.from == group.name) {
            Some(rename) => {
                log::info!(
                    r#"renaming {kind} group "{}" to "{}""#,
                    group.name,
                    rename.to
                );
                rename.to.clone()
            }
            None => group.name.clone(),
        };
        if !seen.insert(name.clone()) {
            return Err(Error::DuplicateGroup {
                table: kind.name(),
                group: name,
            });
        }

        for (position, record) in group.records.iter().enumerate() {
            let index = record.index().ok_or_else(|| Error::MissingIndex {
                group: group.name.clone(),
                position,
            })?;
            let cs_label = record.cs_label();
            let [x, y, z] = match record.location() {
                Some(location) => location,
                None => {
                    log::warn!(
                        "[{cs_label}] {kind} `{name}` #{index}: missing location, using (0,0,0)"
                    );
                    warnings.push(Warning::MissingLocation {
                        table: kind,
                        group: name.clone(),
                        index,
                        cs_label: cs_label.clone(),
                    });
                    [0.0; 3]
                }
            };
            rows.push(FlatRow {
                group: name.clone(),
                index,
                description: record.descriptions.decode(),
                x,
                y,
                z,
                cs_label,
            });
        }
    }

    log::info!("flattened {} {kind} groups into {} rows", groups.len(), rows.len());
    Ok(FlatTable { kind, rows })
}

impl FlatTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows of the given group.
    pub fn group_rows<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a FlatRow> + 'a {
        self.rows.iter().filter(move |row| row.group == group)
    }

    /// Groups in table order.
    pub fn group_summaries(&self) -> Vec<GroupSummary> {
        let mut summaries: Vec<GroupSummary> = Vec::new();
        for row in &self.rows {
            match summaries.last_mut() {
                Some(last) if last.name == row.group => {
                    last.size += 1;
                    if !last.cs_labels.contains(&row.cs_label) {
                        last.cs_labels.push(row.cs_label.clone());
                    }
                }
                _ => summaries.push(GroupSummary {
                    name: row.group.clone(),
                    size: 1,
                    cs_labels: vec![row.cs_label.clone()],
                }),
            }
        }
        summaries
    }

    /// Group names in table order.
    pub fn group_names(&self) -> Vec<String> {
        self.group_summaries().into_iter().map(|g| g.name).collect()
    }
}

// ---------------------------------------------------------------------------
// Arrow conversion
// ---------------------------------------------------------------------------

/// Schema of the `<name>_in` and `<name>_out` entries.
pub fn table_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("group", DataType::Utf8, false),
        Field::new("index", DataType::UInt32, false),
        Field::new("description", DataType::Utf8, false),
        Field::new("X", DataType::Float64, false),
        Field::new("Y", DataType::Float64, false),
        Field::new("Z", DataType::Float64, false),
        Field::new("csLabel", DataType::Utf8, false),
    ]))
}

impl FlatTable {
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let rows = &self.rows;
        let group = StringArray::from_iter_values(rows.iter().map(|r| r.group.as_str()));
        let index = UInt32Array::from_iter_values(rows.iter().map(|r| r.index));
        let description =
            StringArray::from_iter_values(rows.iter().map(|r| r.description.as_str()));
        let x = Float64Array::from_iter_values(rows.iter().map(|r| r.x));
        let y = Float64Array::from_iter_values(rows.iter().map(|r| r.y));
        let z = Float64Array::from_iter_values(rows.iter().map(|r| r.z));
        let cs_label = StringArray::from_iter_values(rows.iter().map(|r| r.cs_label.as_str()));

        Ok(RecordBatch::try_new(
            table_schema(),
            vec![
                Arc::new(group),
                Arc::new(index),
                Arc::new(description),
                Arc::new(x),
                Arc::new(y),
                Arc::new(z),
                Arc::new(cs_label),
            ],
        )?)
    }

    /// Rebuilds a table from the record batches of a `<name>_in`/`<name>_out` entry.
    pub fn from_record_batches(kind: TableKind, batches: &[RecordBatch]) -> Result<Self> {
        let mut rows = Vec::new();
        for batch in batches {
            let group = read::<StringArray>(batch, "group")?;
            let index = read::<UInt32Array>(batch, "index")?;
            let description = read::<StringArray>(batch, "description")?;
            let x = read::<Float64Array>(batch, "X")?;
            let y = read::<Float64Array>(batch, "Y")?;
            let z = read::<Float64Array>(batch, "Z")?;
            let cs_label = read::<StringArray>(batch, "csLabel")?;
            for i in 0..batch.num_rows() {
                rows.push(FlatRow {
                    group: group.value(i).to_string(),
                    index: index.value(i),
                    description: description.value(i).to_string(),
                    x: x.value(i),
                    y: y.value(i),
                    z: z.value(i),
                    cs_label: cs_label.value(i).to_string(),
                });
            }
        }
        Ok(Self { kind, rows })
    }
}

/// Downcast a named column of `batch` to the concrete array type `T`.
pub(crate) fn read<'a, T>(batch: &'a RecordBatch, col: &str) -> Result<&'a T>
where
    T: Array + 'static,
{
    batch
        .column_by_name(col)
        .and_then(|column| column.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::ReadColumn(col.to_string()))
}
