use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose};
use chrono::NaiveDateTime;

use crate::error::DbError;
use crate::types::{DbEnum, Value, ValueKind};

/// One column of a result table: the (possibly suffix-disambiguated) name
/// and the kind the driver reported for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    kind: ValueKind,
}

impl Column {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Column {
            name: name.into(),
            kind,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }
}

/// An in-memory table of query results with a movable read cursor.
///
/// Rows are copied out of the driver during population; nothing here holds
/// a connection. The cursor starts before the first row; [`ResultTable::read`]
/// advances it one row at a time and refuses to move past the last row, so
/// `while table.read() { ... }` visits every row exactly once. After the
/// loop the cursor still points at the last row; [`ResultTable::reset_index`]
/// rewinds for a second pass.
///
/// ```rust
/// use mysql_fluent::{Column, ResultTable, Value, ValueKind};
///
/// let mut table = ResultTable::with_columns(
///     "`user`",
///     vec![Column::new("id", ValueKind::Int), Column::new("name", ValueKind::Text)],
/// );
/// table.push_row(vec![Value::Int(1), Value::Text("alice".into())]).unwrap();
///
/// while table.read() {
///     let id = table.get_i64("id").unwrap();
///     let name = table.get_string("name").unwrap();
///     assert_eq!((id, name.as_str()), (1, "alice"));
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    name: String,
    columns: Vec<Column>,
    column_index: HashMap<String, usize>,
    rows: Vec<Vec<Value>>,
    cursor: Option<usize>,
}

impl ResultTable {
    /// An empty table carrying only its source relation's name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        ResultTable {
            name: name.into(),
            ..ResultTable::default()
        }
    }

    /// A table with known columns, ready for [`ResultTable::push_row`].
    #[must_use]
    pub fn with_columns(name: impl Into<String>, columns: Vec<Column>) -> Self {
        let column_index = columns
            .iter()
            .enumerate()
            .map(|(i, col)| (col.name.clone(), i))
            .collect();
        ResultTable {
            name: name.into(),
            columns,
            column_index,
            rows: Vec::new(),
            cursor: None,
        }
    }

    /// Append one row. Rows are append-only; existing rows and columns
    /// never change.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ExecutionError` if the row width does not match
    /// the column count.
    pub fn push_row(&mut self, cells: Vec<Value>) -> Result<(), DbError> {
        if cells.len() != self.columns.len() {
            return Err(DbError::ExecutionError(format!(
                "row width {} does not match column count {}",
                cells.len(),
                self.columns.len()
            )));
        }
        self.rows.push(cells);
        Ok(())
    }

    /// The relation name this table was read from.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Advance the cursor by one row. Returns `false`, without moving,
    /// once the last row has been reached.
    pub fn read(&mut self) -> bool {
        let next = self.cursor.map_or(0, |i| i + 1);
        if next < self.rows.len() {
            self.cursor = Some(next);
            true
        } else {
            false
        }
    }

    /// Rewind the cursor to before the first row for another pass.
    pub fn reset_index(&mut self) {
        self.cursor = None;
    }

    /// The current cursor position, if any row has been read.
    #[must_use]
    pub fn row_index(&self) -> Option<usize> {
        self.cursor
    }

    fn current_row(&self) -> Result<&[Value], DbError> {
        let index = self.cursor.ok_or_else(|| {
            DbError::CursorError("no current row; call read() before accessing values".to_string())
        })?;
        self.rows
            .get(index)
            .map(Vec::as_slice)
            .ok_or_else(|| DbError::CursorError(format!("cursor out of range at row {index}")))
    }

    fn column_position(&self, column: &str) -> Result<usize, DbError> {
        self.column_index
            .get(column)
            .copied()
            .ok_or_else(|| DbError::UnknownColumn(column.to_string()))
    }

    /// The raw cell at the cursor, NULL included as [`Value::Null`].
    ///
    /// # Errors
    ///
    /// `DbError::CursorError` before the first `read()`;
    /// `DbError::UnknownColumn` for a name this table does not have.
    pub fn cell(&self, column: &str) -> Result<&Value, DbError> {
        let row = self.current_row()?;
        let position = self.column_position(column)?;
        row.get(position).ok_or_else(|| {
            DbError::CursorError(format!("row narrower than column set at '{column}'"))
        })
    }

    /// The cell at the cursor with the database NULL marker translated to
    /// `None`, never surfaced as a sentinel value.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ResultTable::cell`].
    pub fn value(&self, column: &str) -> Result<Option<&Value>, DbError> {
        let cell = self.cell(column)?;
        Ok(if cell.is_null() { None } else { Some(cell) })
    }

    /// Whether the current row's cell is non-null, independent of type.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ResultTable::cell`].
    pub fn has_value(&self, column: &str) -> Result<bool, DbError> {
        Ok(!self.cell(column)?.is_null())
    }

    fn non_null(&self, column: &str) -> Result<&Value, DbError> {
        self.value(column)?.ok_or_else(|| {
            DbError::ConversionError(format!("null value in column '{column}'"))
        })
    }

    fn integer(&self, column: &str) -> Result<i128, DbError> {
        let cell = self.non_null(column)?;
        match cell {
            Value::Int(i) => Ok(i128::from(*i)),
            Value::UInt(u) => Ok(i128::from(*u)),
            Value::Bool(b) => Ok(i128::from(*b)),
            Value::Text(s) => s.trim().parse::<i128>().map_err(|_| {
                DbError::ConversionError(format!(
                    "text '{s}' in column '{column}' is not an integer"
                ))
            }),
            other => Err(DbError::ConversionError(format!(
                "{} value in column '{column}' is not an integer",
                other.kind().name()
            ))),
        }
    }

    fn integer_width<T>(&self, column: &str) -> Result<T, DbError>
    where
        T: TryFrom<i128>,
    {
        let wide = self.integer(column)?;
        T::try_from(wide).map_err(|_| {
            DbError::ConversionError(format!(
                "value {wide} in column '{column}' does not fit the requested integer width"
            ))
        })
    }

    /// # Errors
    ///
    /// `ConversionError` on NULL or a non-numeric cell, `CursorError` /
    /// `UnknownColumn` on misuse; the same applies to every typed getter.
    pub fn get_i8(&self, column: &str) -> Result<i8, DbError> {
        self.integer_width(column)
    }

    pub fn get_i16(&self, column: &str) -> Result<i16, DbError> {
        self.integer_width(column)
    }

    pub fn get_i32(&self, column: &str) -> Result<i32, DbError> {
        self.integer_width(column)
    }

    pub fn get_i64(&self, column: &str) -> Result<i64, DbError> {
        self.integer_width(column)
    }

    pub fn get_u8(&self, column: &str) -> Result<u8, DbError> {
        self.integer_width(column)
    }

    pub fn get_u16(&self, column: &str) -> Result<u16, DbError> {
        self.integer_width(column)
    }

    pub fn get_u32(&self, column: &str) -> Result<u32, DbError> {
        self.integer_width(column)
    }

    pub fn get_u64(&self, column: &str) -> Result<u64, DbError> {
        self.integer_width(column)
    }

    pub fn get_f64(&self, column: &str) -> Result<f64, DbError> {
        let cell = self.non_null(column)?;
        match cell {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            Value::UInt(u) => Ok(*u as f64),
            Value::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                DbError::ConversionError(format!("text '{s}' in column '{column}' is not numeric"))
            }),
            other => Err(DbError::ConversionError(format!(
                "{} value in column '{column}' is not numeric",
                other.kind().name()
            ))),
        }
    }

    pub fn get_f32(&self, column: &str) -> Result<f32, DbError> {
        Ok(self.get_f64(column)? as f32)
    }

    pub fn get_bool(&self, column: &str) -> Result<bool, DbError> {
        let cell = self.non_null(column)?;
        cell.as_bool().ok_or_else(|| {
            DbError::ConversionError(format!(
                "{} value in column '{column}' is not a boolean",
                cell.kind().name()
            ))
        })
    }

    pub fn get_string(&self, column: &str) -> Result<String, DbError> {
        let cell = self.non_null(column)?;
        match cell {
            Value::Text(s) => Ok(s.clone()),
            Value::Int(i) => Ok(i.to_string()),
            Value::UInt(u) => Ok(u.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Timestamp(t) => Ok(t.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            Value::Json(j) => Ok(j.to_string()),
            other => Err(DbError::ConversionError(format!(
                "{} value in column '{column}' has no text form",
                other.kind().name()
            ))),
        }
    }

    pub fn get_datetime(&self, column: &str) -> Result<NaiveDateTime, DbError> {
        let cell = self.non_null(column)?;
        cell.as_timestamp().ok_or_else(|| {
            DbError::ConversionError(format!(
                "{} value in column '{column}' is not a datetime",
                cell.kind().name()
            ))
        })
    }

    /// Decode a hash-encoded text cell (see [`ResultTable::get_hash`]).
    /// A NULL cell or an empty encoded value yields `None`.
    ///
    /// # Errors
    ///
    /// `ConversionError` if the cell is non-text or not valid base64.
    pub fn get_from_hash(&self, column: &str) -> Result<Option<String>, DbError> {
        let Some(cell) = self.value(column)? else {
            return Ok(None);
        };
        let encoded = match cell {
            Value::Text(s) => s,
            other => {
                return Err(DbError::ConversionError(format!(
                    "{} value in column '{column}' is not hash-encoded text",
                    other.kind().name()
                )));
            }
        };
        if encoded.is_empty() {
            return Ok(None);
        }
        let bytes = general_purpose::STANDARD.decode(encoded).map_err(|e| {
            DbError::ConversionError(format!("column '{column}' is not valid hash text: {e}"))
        })?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Encode free-form text into the transport-safe form stored by this
    /// layer. This is a reversible base64 encoding, not a digest.
    #[must_use]
    pub fn get_hash(data: &str) -> String {
        general_purpose::STANDARD.encode(data.as_bytes())
    }

    /// Resolve the current row's cell to an enum member: by name when the
    /// cell is text, by ordinal when it is numeric.
    ///
    /// # Errors
    ///
    /// `ConversionError` on NULL, on a cell kind that cannot name a
    /// member, or when no member matches.
    pub fn enum_value<T: DbEnum>(&self, column: &str) -> Result<T, DbError> {
        let cell = self.non_null(column)?;
        match cell {
            Value::Text(name) => T::from_name(name).ok_or_else(|| {
                DbError::ConversionError(format!(
                    "no enum member named '{name}' for column '{column}'"
                ))
            }),
            Value::Int(_) | Value::UInt(_) => {
                let ordinal = cell.as_int().ok_or_else(|| {
                    DbError::ConversionError(format!(
                        "ordinal in column '{column}' exceeds the supported range"
                    ))
                })?;
                T::from_ordinal(ordinal).ok_or_else(|| {
                    DbError::ConversionError(format!(
                        "no enum member with ordinal {ordinal} for column '{column}'"
                    ))
                })
            }
            other => Err(DbError::ConversionError(format!(
                "{} value in column '{column}' cannot select an enum member",
                other.kind().name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultTable {
        let mut table = ResultTable::with_columns(
            "`user`",
            vec![
                Column::new("id", ValueKind::Int),
                Column::new("name", ValueKind::Text),
                Column::new("note", ValueKind::Text),
            ],
        );
        table
            .push_row(vec![
                Value::Int(1),
                Value::Text("alice".into()),
                Value::Null,
            ])
            .unwrap();
        table
            .push_row(vec![
                Value::Int(2),
                Value::Text("bob".into()),
                Value::Text(ResultTable::get_hash("hello")),
            ])
            .unwrap();
        table
    }

    #[derive(Debug, PartialEq)]
    enum Status {
        Active,
        Disabled,
    }

    impl DbEnum for Status {
        fn from_name(name: &str) -> Option<Self> {
            match name {
                "active" => Some(Status::Active),
                "disabled" => Some(Status::Disabled),
                _ => None,
            }
        }

        fn from_ordinal(ordinal: i64) -> Option<Self> {
            match ordinal {
                0 => Some(Status::Active),
                1 => Some(Status::Disabled),
                _ => None,
            }
        }

        fn ordinal(&self) -> i64 {
            match self {
                Status::Active => 0,
                Status::Disabled => 1,
            }
        }
    }

    #[test]
    fn read_visits_each_row_once_then_stops() {
        let mut table = sample();
        let mut seen = 0;
        while table.read() {
            seen += 1;
        }
        assert_eq!(seen, 2);
        // cursor parked on the last row, further reads keep failing
        assert!(!table.read());
        assert_eq!(table.row_index(), Some(1));
        assert_eq!(table.get_i64("id").unwrap(), 2);
    }

    #[test]
    fn reset_allows_second_pass() {
        let mut table = sample();
        while table.read() {}
        table.reset_index();
        assert!(table.read());
        assert_eq!(table.row_index(), Some(0));
        assert_eq!(table.get_i64("id").unwrap(), 1);
    }

    #[test]
    fn access_before_read_is_a_cursor_error() {
        let table = sample();
        match table.get_i64("id") {
            Err(DbError::CursorError(_)) => {}
            other => panic!("expected cursor error, got {other:?}"),
        }
    }

    #[test]
    fn null_cell_distinguished_from_bounds_misuse() {
        let mut table = sample();
        assert!(table.read());
        assert!(!table.has_value("note").unwrap());
        assert_eq!(table.value("note").unwrap(), None);
        match table.get_string("note") {
            Err(DbError::ConversionError(_)) => {}
            other => panic!("expected conversion error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_column_is_its_own_error() {
        let mut table = sample();
        assert!(table.read());
        match table.get_i64("missing") {
            Err(DbError::UnknownColumn(name)) => assert_eq!(name, "missing"),
            other => panic!("expected unknown column, got {other:?}"),
        }
    }

    #[test]
    fn integer_widths_check_range() {
        let mut table = ResultTable::with_columns("`t`", vec![Column::new("n", ValueKind::Int)]);
        table.push_row(vec![Value::Int(300)]).unwrap();
        assert!(table.read());
        assert_eq!(table.get_i16("n").unwrap(), 300);
        assert!(matches!(
            table.get_i8("n"),
            Err(DbError::ConversionError(_))
        ));
        assert_eq!(table.get_u32("n").unwrap(), 300);
    }

    #[test]
    fn textual_numerics_parse() {
        let mut table = ResultTable::with_columns("`t`", vec![Column::new("d", ValueKind::Text)]);
        table.push_row(vec![Value::Text("12.50".into())]).unwrap();
        assert!(table.read());
        assert!((table.get_f64("d").unwrap() - 12.5).abs() < f64::EPSILON);
        assert!(matches!(
            table.get_i32("d"),
            Err(DbError::ConversionError(_))
        ));
    }

    #[test]
    fn hash_round_trip() {
        let mut table = sample();
        assert!(table.read());
        assert!(table.read());
        assert_eq!(table.get_from_hash("note").unwrap().as_deref(), Some("hello"));

        let encoded = ResultTable::get_hash("snowman \u{2603}");
        assert_eq!(
            general_purpose::STANDARD.decode(&encoded).unwrap(),
            "snowman \u{2603}".as_bytes()
        );
    }

    #[test]
    fn empty_hash_text_reads_as_none() {
        let mut table = ResultTable::with_columns("`t`", vec![Column::new("h", ValueKind::Text)]);
        table.push_row(vec![Value::Text(String::new())]).unwrap();
        table.push_row(vec![Value::Null]).unwrap();
        assert!(table.read());
        assert_eq!(table.get_from_hash("h").unwrap(), None);
        assert!(table.read());
        assert_eq!(table.get_from_hash("h").unwrap(), None);
    }

    #[test]
    fn invalid_hash_text_is_a_conversion_error() {
        let mut table = ResultTable::with_columns("`t`", vec![Column::new("h", ValueKind::Text)]);
        table.push_row(vec![Value::Text("%%%not-base64%%%".into())]).unwrap();
        assert!(table.read());
        assert!(matches!(
            table.get_from_hash("h"),
            Err(DbError::ConversionError(_))
        ));
    }

    #[test]
    fn enum_resolves_by_name_and_ordinal() {
        let mut table = ResultTable::with_columns(
            "`t`",
            vec![
                Column::new("by_name", ValueKind::Text),
                Column::new("by_ordinal", ValueKind::Int),
            ],
        );
        table
            .push_row(vec![Value::Text("disabled".into()), Value::Int(0)])
            .unwrap();
        assert!(table.read());
        assert_eq!(table.enum_value::<Status>("by_name").unwrap(), Status::Disabled);
        assert_eq!(table.enum_value::<Status>("by_ordinal").unwrap(), Status::Active);
        assert_eq!(Status::Disabled.ordinal(), 1);
    }

    #[test]
    fn row_width_is_enforced() {
        let mut table = ResultTable::with_columns("`t`", vec![Column::new("a", ValueKind::Int)]);
        assert!(matches!(
            table.push_row(vec![Value::Int(1), Value::Int(2)]),
            Err(DbError::ExecutionError(_))
        ));
    }

    #[test]
    fn empty_table_never_reads() {
        let mut table = ResultTable::new("`empty`");
        assert!(!table.read());
        assert_eq!(table.row_index(), None);
        assert_eq!(table.row_count(), 0);
    }
}
