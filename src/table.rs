use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{Read, Write};

use serde::Serialize;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};

use crate::domain::columns;
use crate::error::SpireError;

const NULL_LITERALS: [&str; 5] = ["NA", "NaN", "nan", "null", "None"];
const DISPLAY_MAX_ROWS: usize = 20;
const DISPLAY_EDGE_ROWS: usize = 5;
const DISPLAY_MAX_WIDTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Join/filter key: the textual form of any non-null value.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Int(value) => Some(value.to_string()),
            Cell::Float(value) => Some(value.to_string()),
            Cell::Text(value) => Some(value.clone()),
        }
    }

    fn to_field(&self) -> String {
        self.as_key().unwrap_or_default()
    }

    fn sort_cmp(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Null, Cell::Null) => Ordering::Equal,
            (Cell::Null, _) => Ordering::Greater,
            (_, Cell::Null) => Ordering::Less,
            (Cell::Int(a), Cell::Int(b)) => a.cmp(b),
            (Cell::Int(a), Cell::Float(b)) => (*a as f64).total_cmp(b),
            (Cell::Float(a), Cell::Int(b)) => a.total_cmp(&(*b as f64)),
            (Cell::Float(a), Cell::Float(b)) => a.total_cmp(b),
            (a, b) => a.to_field().cmp(&b.to_field()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, "null"),
            Cell::Int(value) => write!(f, "{value}"),
            Cell::Float(value) => write!(f, "{value}"),
            Cell::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Float,
    Text,
}

#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    cells: &'a [Cell],
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Cell> {
        self.columns
            .iter()
            .position(|name| name == column)
            .map(|idx| &self.cells[idx])
    }

    pub fn cells(&self) -> &'a [Cell] {
        self.cells
    }
}

/// Column-named, row-major table with per-column inferred types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, SpireError> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(SpireError::Tsv(format!(
                "row {idx} has {} fields, expected {}",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn from_tsv_str(text: &str) -> Result<Self, SpireError> {
        Self::from_tsv_reader(text.as_bytes())
    }

    pub fn from_tsv_reader<R: Read>(reader: R) -> Result<Self, SpireError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .quoting(false)
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let columns = rdr
            .headers()
            .map_err(|err| SpireError::Tsv(err.to_string()))?
            .iter()
            .map(|name| name.trim().trim_start_matches('#').to_string())
            .collect::<Vec<_>>();

        let mut raw = Vec::new();
        for (idx, record) in rdr.records().enumerate() {
            let record = record.map_err(|err| SpireError::Tsv(err.to_string()))?;
            if record.len() > columns.len() {
                return Err(SpireError::Tsv(format!(
                    "row {idx} has {} fields, header has {}",
                    record.len(),
                    columns.len()
                )));
            }
            let mut fields = record.iter().map(str::to_string).collect::<Vec<_>>();
            fields.resize(columns.len(), String::new());
            raw.push(fields);
        }

        let types = columns
            .iter()
            .enumerate()
            .map(|(col, name)| {
                if columns::KEYS.contains(&name.as_str()) {
                    ColumnType::Text
                } else {
                    infer_column_type(raw.iter().map(|row| row[col].as_str()))
                }
            })
            .collect::<Vec<_>>();
        let rows = raw
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(&types)
                    .map(|(field, ty)| parse_cell(&field, *ty))
                    .collect()
            })
            .collect();

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|cells| Row {
            columns: &self.columns,
            cells,
        })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, SpireError> {
        self.column_index(name)
            .ok_or_else(|| SpireError::MissingColumn(name.to_string()))
    }

    pub fn column_type(&self, name: &str) -> Result<ColumnType, SpireError> {
        let idx = self.require_column(name)?;
        let mut ty = None;
        for row in &self.rows {
            match (&row[idx], ty) {
                (Cell::Text(_), _) => return Ok(ColumnType::Text),
                (Cell::Float(_), _) => ty = Some(ColumnType::Float),
                (Cell::Int(_), None) => ty = Some(ColumnType::Int),
                _ => {}
            }
        }
        Ok(ty.unwrap_or(ColumnType::Text))
    }

    pub fn column_values(&self, name: &str) -> Result<Vec<&Cell>, SpireError> {
        let idx = self.require_column(name)?;
        Ok(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Non-null values of `name` as keys, in row order.
    pub fn keys(&self, name: &str) -> Result<Vec<String>, SpireError> {
        Ok(self
            .column_values(name)?
            .into_iter()
            .filter_map(Cell::as_key)
            .collect())
    }

    pub fn filter<F>(&self, mut predicate: F) -> Table
    where
        F: FnMut(Row<'_>) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|cells| {
                predicate(Row {
                    columns: &self.columns,
                    cells,
                })
            })
            .cloned()
            .collect();
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    pub fn filter_not_null(&self, column: &str) -> Result<Table, SpireError> {
        let idx = self.require_column(column)?;
        Ok(self.filter(|row| !row.cells()[idx].is_null()))
    }

    pub fn filter_in(&self, column: &str, keys: &HashSet<String>) -> Result<Table, SpireError> {
        let idx = self.require_column(column)?;
        Ok(self.filter(|row| {
            row.cells()[idx]
                .as_key()
                .map(|key| keys.contains(&key))
                .unwrap_or(false)
        }))
    }

    /// Inner join on a column present in both tables. Right-hand columns that
    /// collide with a left-hand name get a `_right` suffix.
    pub fn inner_join(&self, right: &Table, on: &str) -> Result<Table, SpireError> {
        let left_idx = self.require_column(on)?;
        let right_idx = right.require_column(on)?;

        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (pos, row) in right.rows.iter().enumerate() {
            if let Some(key) = row[right_idx].as_key() {
                index.entry(key).or_default().push(pos);
            }
        }

        let mut columns = self.columns.clone();
        for (idx, name) in right.columns.iter().enumerate() {
            if idx == right_idx {
                continue;
            }
            if self.columns.contains(name) {
                columns.push(format!("{name}_right"));
            } else {
                columns.push(name.clone());
            }
        }

        let mut rows = Vec::new();
        for left in &self.rows {
            let Some(key) = left[left_idx].as_key() else {
                continue;
            };
            let Some(matches) = index.get(&key) else {
                continue;
            };
            for pos in matches {
                let mut joined = left.clone();
                joined.extend(
                    right.rows[*pos]
                        .iter()
                        .enumerate()
                        .filter(|(idx, _)| *idx != right_idx)
                        .map(|(_, cell)| cell.clone()),
                );
                rows.push(joined);
            }
        }

        Ok(Table { columns, rows })
    }

    /// Moves the named columns (those present) to the front, keeping the
    /// relative order of everything else.
    pub fn foreground(&self, names: &[&str]) -> Table {
        let mut order = names
            .iter()
            .filter_map(|name| self.column_index(name))
            .collect::<Vec<_>>();
        order.dedup();
        for idx in 0..self.columns.len() {
            if !order.contains(&idx) {
                order.push(idx);
            }
        }
        self.select_indices(&order)
    }

    pub fn select(&self, names: &[&str]) -> Result<Table, SpireError> {
        let order = names
            .iter()
            .map(|name| self.require_column(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.select_indices(&order))
    }

    /// Stable sort on one column, nulls last.
    pub fn sort_by(&self, column: &str) -> Result<Table, SpireError> {
        let idx = self.require_column(column)?;
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| a[idx].sort_cmp(&b[idx]));
        Ok(Table {
            columns: self.columns.clone(),
            rows,
        })
    }

    pub fn write_tsv<W: Write>(&self, writer: W) -> Result<(), SpireError> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(csv::QuoteStyle::Never)
            .from_writer(writer);
        wtr.write_record(&self.columns)
            .map_err(|err| SpireError::Filesystem(err.to_string()))?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(Cell::to_field))
                .map_err(|err| SpireError::Filesystem(err.to_string()))?;
        }
        wtr.flush()
            .map_err(|err| SpireError::Filesystem(err.to_string()))
    }

    fn select_indices(&self, order: &[usize]) -> Table {
        Table {
            columns: order.iter().map(|idx| self.columns[*idx].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| order.iter().map(|idx| row[*idx].clone()).collect())
                .collect(),
        }
    }
}

fn is_null_field(field: &str) -> bool {
    let trimmed = field.trim();
    trimmed.is_empty() || NULL_LITERALS.contains(&trimmed)
}

fn infer_column_type<'a>(fields: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut ty = ColumnType::Int;
    let mut seen = false;
    for field in fields.filter(|field| !is_null_field(field)) {
        seen = true;
        let field = field.trim();
        if ty == ColumnType::Int && field.parse::<i64>().is_ok() {
            continue;
        }
        if field.parse::<f64>().is_ok() {
            ty = ColumnType::Float;
            continue;
        }
        return ColumnType::Text;
    }
    if seen { ty } else { ColumnType::Text }
}

fn parse_cell(field: &str, ty: ColumnType) -> Cell {
    if is_null_field(field) {
        return Cell::Null;
    }
    let trimmed = field.trim();
    match ty {
        ColumnType::Int => trimmed
            .parse()
            .map(Cell::Int)
            .unwrap_or_else(|_| Cell::Text(trimmed.to_string())),
        ColumnType::Float => trimmed
            .parse()
            .map(Cell::Float)
            .unwrap_or_else(|_| Cell::Text(trimmed.to_string())),
        ColumnType::Text => Cell::Text(trimmed.to_string()),
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in self.rows() {
            seq.serialize_element(&row)?;
        }
        seq.end()
    }
}

impl Serialize for Row<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, cell) in self.columns.iter().zip(self.cells) {
            map.serialize_entry(name, cell)?;
        }
        map.end()
    }
}

fn clip(value: String) -> String {
    if value.chars().count() <= DISPLAY_MAX_WIDTH {
        return value;
    }
    let mut clipped = value
        .chars()
        .take(DISPLAY_MAX_WIDTH - 1)
        .collect::<String>();
    clipped.push('…');
    clipped
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown: Vec<Option<&Vec<Cell>>> = if self.rows.len() > DISPLAY_MAX_ROWS {
            let head = self.rows[..DISPLAY_EDGE_ROWS].iter().map(Some);
            let tail = self.rows[self.rows.len() - DISPLAY_EDGE_ROWS..]
                .iter()
                .map(Some);
            head.chain(std::iter::once(None)).chain(tail).collect()
        } else {
            self.rows.iter().map(Some).collect()
        };

        let header = self
            .columns
            .iter()
            .map(|name| clip(name.clone()))
            .collect::<Vec<_>>();
        let body = shown
            .iter()
            .map(|row| {
                row.map(|cells| {
                    cells
                        .iter()
                        .map(|cell| clip(cell.to_string()))
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();

        let mut widths = header
            .iter()
            .map(|name| name.chars().count())
            .collect::<Vec<_>>();
        for cells in body.iter().flatten() {
            for (width, cell) in widths.iter_mut().zip(cells) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}", width = *width))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        writeln!(f, "{}", line(&header))?;
        for row in &body {
            match row {
                Some(cells) => writeln!(f, "{}", line(cells))?,
                None => writeln!(f, "…")?,
            }
        }
        write!(f, "[{} rows x {} columns]", self.rows.len(), self.columns.len())
    }
}
