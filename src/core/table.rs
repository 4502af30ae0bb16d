use chrono::{DateTime, DurationRound, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub type Timestamp = DateTime<Utc>;

/// Parse an agent timestamp. Agents emit RFC 3339 with a `Z` suffix, older
/// ones omit the offset entirely, which is read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Round to the nearest millisecond
pub fn round_to_millis(ts: Timestamp) -> Timestamp {
    ts.duration_round(TimeDelta::milliseconds(1)).unwrap_or(ts)
}

/// One observed field change for one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub timestamp: Timestamp,
    pub device_id: String,
    pub field_tag: String,
    /// `None` when the element carried no text; never read as zero
    pub value: Option<String>,
}

/// How a field update maps onto a table column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnNaming {
    /// `device:tag`, so every device owns disjoint columns
    #[default]
    Qualified,
    /// Bare element tag; devices reporting the same tag share a column
    Bare,
}

impl ColumnNaming {
    pub fn column_key(&self, update: &FieldUpdate) -> String {
        match self {
            ColumnNaming::Qualified => format!("{}:{}", update.device_id, update.field_tag),
            ColumnNaming::Bare => update.field_tag.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct Column {
    key: String,
    rank: usize,
    seen: u64,
}

/// Sparse timestamp-indexed table built up by merges.
///
/// Rows arrive in whatever order the devices report them. Columns are
/// ordered by the owning device's discovery rank, then by first sighting,
/// which keeps the order independent of worker completion order.
#[derive(Debug, Clone, Default)]
pub struct SparseTable {
    naming: ColumnNaming,
    device_rank: HashMap<String, usize>,
    columns: Vec<Column>,
    column_keys: HashSet<String>,
    rows: HashMap<Timestamp, HashMap<String, String>>,
    arrival: Vec<Timestamp>,
    seen: u64,
}

impl SparseTable {
    pub fn new(naming: ColumnNaming) -> Self {
        Self {
            naming,
            ..Self::default()
        }
    }

    /// Table whose column order follows the given device order
    pub fn for_devices(naming: ColumnNaming, devices: &[String]) -> Self {
        let mut table = Self::new(naming);
        for device in devices {
            table.rank_of(device);
        }
        table
    }

    pub fn naming(&self) -> ColumnNaming {
        self.naming
    }

    /// Apply one update, overwriting any earlier value in the same cell.
    /// A `None` value still registers the row and column.
    pub fn apply(&mut self, update: &FieldUpdate) {
        let key = self.naming.column_key(update);
        let rank = self.rank_of(&update.device_id);

        if self.column_keys.insert(key.clone()) {
            let seen = self.seen;
            self.seen += 1;
            let pos = self
                .columns
                .partition_point(|c| (c.rank, c.seen) < (rank, seen));
            self.columns.insert(pos, Column { key: key.clone(), rank, seen });
        }

        let arrival = &mut self.arrival;
        let row = self.rows.entry(update.timestamp).or_insert_with(|| {
            arrival.push(update.timestamp);
            HashMap::new()
        });

        if let Some(value) = &update.value {
            row.insert(key, value.clone());
        }
    }

    fn rank_of(&mut self, device: &str) -> usize {
        let next = self.device_rank.len();
        *self.device_rank.entry(device.to_string()).or_insert(next)
    }

    /// Column keys in output order
    pub fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.key.as_str()).collect()
    }

    /// Timestamps in arrival order
    pub fn timestamps(&self) -> &[Timestamp] {
        &self.arrival
    }

    pub fn get(&self, timestamp: &Timestamp, column: &str) -> Option<&str> {
        self.rows.get(timestamp)?.get(column).map(String::as_str)
    }

    pub fn row_count(&self) -> usize {
        self.arrival.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrival.is_empty()
    }

    pub(crate) fn take_rows(self) -> (Vec<String>, Vec<Timestamp>, HashMap<Timestamp, HashMap<String, String>>) {
        let columns = self.columns.into_iter().map(|c| c.key).collect();
        (columns, self.arrival, self.rows)
    }
}

impl PartialEq for SparseTable {
    fn eq(&self, other: &Self) -> bool {
        self.columns() == other.columns() && self.rows == other.rows
    }
}

/// One reconstructed row; cells are positional against `DenseTable::columns`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DenseRow {
    pub timestamp: Timestamp,
    pub cells: Vec<Option<String>>,
}

/// Time-sorted table in which every later row carries a full state vector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DenseTable {
    columns: Vec<String>,
    rows: Vec<DenseRow>,
}

impl DenseTable {
    pub fn new(columns: Vec<String>, rows: Vec<DenseRow>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[DenseRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.cells.get(index)?.as_deref()
    }

    /// Copy every unset cell from the row above. Rows must already be in
    /// time order; running it again on a filled table changes nothing.
    pub fn forward_fill(&mut self) {
        for i in 1..self.rows.len() {
            let (done, rest) = self.rows.split_at_mut(i);
            let previous = &done[i - 1];
            for (cell, above) in rest[0].cells.iter_mut().zip(&previous.cells) {
                if cell.is_none() {
                    cell.clone_from(above);
                }
            }
        }
    }

    /// Drop rows stamped before `start`; their values have already been
    /// carried forward into the rows that remain.
    pub fn since(mut self, start: Timestamp) -> Self {
        self.rows.retain(|row| row.timestamp >= start);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn update(device: &str, tag: &str, ms: i64, value: Option<&str>) -> FieldUpdate {
        FieldUpdate {
            timestamp: Utc.timestamp_millis_opt(ms).unwrap(),
            device_id: device.to_string(),
            field_tag: tag.to_string(),
            value: value.map(str::to_string),
        }
    }

    #[test]
    fn test_timestamp_rounding() {
        let ts = parse_timestamp("2024-05-01T12:00:00.123456Z").unwrap();
        let rounded = round_to_millis(ts);
        assert_eq!(rounded.timestamp_subsec_millis(), 123);
        assert_eq!(rounded.timestamp_subsec_nanos(), 123_000_000);

        let up = round_to_millis(parse_timestamp("2024-05-01T12:00:00.123600Z").unwrap());
        assert_eq!(up.timestamp_subsec_millis(), 124);
    }

    #[test]
    fn test_timestamp_without_offset_is_utc() {
        let ts = parse_timestamp("2024-05-01T12:00:00.5").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + TimeDelta::milliseconds(500));
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_column_naming() {
        let u = update("mill-1", "Position", 0, Some("1.5"));
        assert_eq!(ColumnNaming::Qualified.column_key(&u), "mill-1:Position");
        assert_eq!(ColumnNaming::Bare.column_key(&u), "Position");
    }

    #[test]
    fn test_nil_value_registers_row_and_column_only() {
        let mut table = SparseTable::new(ColumnNaming::Bare);
        table.apply(&update("d", "Mode", 10, None));

        assert_eq!(table.columns(), vec!["Mode"]);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.get(&Utc.timestamp_millis_opt(10).unwrap(), "Mode"), None);
    }

    #[test]
    fn test_columns_follow_device_rank() {
        let devices = vec!["a".to_string(), "b".to_string()];
        let mut table = SparseTable::for_devices(ColumnNaming::Qualified, &devices);

        table.apply(&update("b", "Load", 1, Some("3")));
        table.apply(&update("a", "Speed", 1, Some("7")));
        table.apply(&update("b", "Alarm", 2, Some("off")));
        table.apply(&update("a", "Feed", 2, Some("9")));

        assert_eq!(table.columns(), vec!["a:Speed", "a:Feed", "b:Load", "b:Alarm"]);
    }

    #[test]
    fn test_since_keeps_later_rows() {
        let rows = (0..4)
            .map(|ms| DenseRow {
                timestamp: Utc.timestamp_millis_opt(ms).unwrap(),
                cells: vec![Some(ms.to_string())],
            })
            .collect();
        let table = DenseTable::new(vec!["a".to_string()], rows)
            .since(Utc.timestamp_millis_opt(2).unwrap());

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "a"), Some("2"));
    }
}
