use crate::error::ParseFailure;
use csv::ReaderBuilder;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub const DEFAULT_CATEGORY_COLUMN: &str = "類別";
pub const DEFAULT_VALUE_COLUMN: &str = "數值";

/// Typed values of a single column. `None` marks a missing value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnData {
    Number(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Number(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnData::Number(_))
    }

    pub fn as_numbers(&self) -> Option<&[Option<f64>]> {
        match self {
            ColumnData::Number(v) => Some(v),
            ColumnData::Text(_) => None,
        }
    }

    /// Display strings for every value, with missing values as ""
    pub fn labels(&self) -> Vec<String> {
        match self {
            ColumnData::Number(v) => v
                .iter()
                .map(|x| x.map(format_number).unwrap_or_default())
                .collect(),
            ColumnData::Text(v) => v.iter().map(|x| x.clone().unwrap_or_default()).collect(),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            ColumnData::Number(v) => Value::Array(
                v.iter()
                    .map(|x| x.map(number_to_json).unwrap_or(Value::Null))
                    .collect(),
            ),
            ColumnData::Text(v) => Value::Array(
                v.iter()
                    .map(|x| x.clone().map(Value::String).unwrap_or(Value::Null))
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Named columns of equal length. Column 0 is the category / x column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnarTable {
    columns: Vec<Column>,
}

impl ColumnarTable {
    pub fn new(columns: Vec<Column>) -> Result<Self, ParseFailure> {
        if let Some(first) = columns.first() {
            let expected = first.data.len();
            if let Some(bad) = columns.iter().find(|c| c.data.len() != expected) {
                return Err(ParseFailure::RaggedColumns {
                    column: bad.name.clone(),
                    expected,
                    found: bad.data.len(),
                });
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.data.len()).unwrap_or(0)
    }

    /// True when there is nothing to plot (no columns or no rows)
    pub fn is_empty(&self) -> bool {
        self.num_columns() == 0 || self.num_rows() == 0
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Build a table from a JSON object of arrays or a JSON array of objects
    pub fn from_json(value: &Value) -> Result<Self, ParseFailure> {
        match value {
            Value::Object(map) => Self::from_json_columns(map),
            Value::Array(items) => Self::from_json_records(items),
            other => Err(ParseFailure::Shape(format!(
                "expected a JSON object of arrays, found {}",
                json_kind(other)
            ))),
        }
    }

    fn from_json_columns(map: &Map<String, Value>) -> Result<Self, ParseFailure> {
        let mut columns = Vec::with_capacity(map.len());
        for (name, values) in map {
            let values = values.as_array().ok_or_else(|| {
                ParseFailure::Shape(format!(
                    "column '{}' must be an array, found {}",
                    name,
                    json_kind(values)
                ))
            })?;

            let cells = values
                .iter()
                .map(|v| Cell::from_json(name, v))
                .collect::<Result<Vec<_>, _>>()?;
            columns.push(infer_column(name.clone(), cells));
        }

        Self::new(columns)
    }

    fn from_json_records(items: &[Value]) -> Result<Self, ParseFailure> {
        let mut objects = Vec::with_capacity(items.len());
        for item in items {
            let obj = item.as_object().ok_or_else(|| {
                ParseFailure::Shape(format!(
                    "items in a JSON array must be objects, found {}",
                    json_kind(item)
                ))
            })?;
            objects.push(obj);
        }

        // Union of keys in first-seen order
        let mut headers: Vec<&String> = Vec::new();
        for obj in &objects {
            for key in obj.keys() {
                if !headers.contains(&key) {
                    headers.push(key);
                }
            }
        }

        let mut columns = Vec::with_capacity(headers.len());
        for header in headers {
            let cells = objects
                .iter()
                .map(|obj| match obj.get(header) {
                    Some(v) => Cell::from_json(header, v),
                    None => Ok(Cell::Missing),
                })
                .collect::<Result<Vec<_>, _>>()?;
            columns.push(infer_column(header.clone(), cells));
        }

        Self::new(columns)
    }

    /// Build a table from CSV text with a header row.
    ///
    /// Standard RFC 4180 dialect: comma separated, double-quote quoting,
    /// every record must have as many fields as the header.
    pub fn from_csv(text: &str) -> Result<Self, csv::Error> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_reader(text.as_bytes());

        let headers = unique_headers(reader.headers()?.iter());

        let mut cells: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
        for result in reader.records() {
            let record = result?;
            for (idx, field) in record.iter().enumerate() {
                cells[idx].push(Cell::from_field(field));
            }
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, cells)| infer_column(name, cells))
            .collect();

        Ok(Self { columns })
    }

    /// Ordered JSON object of arrays, as shown in the data panel
    pub fn to_json(&self) -> Value {
        let mut map = Map::with_capacity(self.columns.len());
        for column in &self.columns {
            map.insert(column.name.clone(), column.data.to_json());
        }
        Value::Object(map)
    }
}

/// Where the table handed to the chart mapper came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataOrigin {
    Provided,
    Default,
}

/// Outcome of [`parse`]: always a usable table, plus the failure that
/// forced the default table, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub table: ColumnarTable,
    pub origin: DataOrigin,
    pub failure: Option<ParseFailure>,
}

/// Decode a payload strictly. JSON is tried first, then CSV.
///
/// Text that is valid JSON but not a table shape fails without a CSV retry.
pub fn parse_table(raw: &str) -> Result<ColumnarTable, ParseFailure> {
    if raw.trim().is_empty() {
        return Err(ParseFailure::Empty);
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(value) => {
            debug!("data payload decoded as JSON");
            ColumnarTable::from_json(&value)
        }
        Err(json_err) => {
            debug!(error = %json_err, "data payload is not JSON, trying CSV");
            ColumnarTable::from_csv(raw).map_err(|csv_err| ParseFailure::Malformed {
                json: json_err.to_string(),
                csv: csv_err.to_string(),
            })
        }
    }
}

/// Decode a payload, substituting the default table when it is blank or
/// cannot be parsed.
pub fn parse(raw: &str) -> Parsed {
    match parse_table(raw) {
        Ok(table) => {
            debug!(
                columns = table.num_columns(),
                rows = table.num_rows(),
                "parsed data table"
            );
            Parsed {
                table,
                origin: DataOrigin::Provided,
                failure: None,
            }
        }
        Err(ParseFailure::Empty) => Parsed {
            table: default_table(),
            origin: DataOrigin::Default,
            failure: None,
        },
        Err(failure) => {
            warn!(%failure, "could not parse data, falling back to default table");
            Parsed {
                table: default_table(),
                origin: DataOrigin::Default,
                failure: Some(failure),
            }
        }
    }
}

/// Built-in table used when no usable data is supplied
pub fn default_table() -> ColumnarTable {
    let categories = ["A", "B", "C", "D", "E"]
        .iter()
        .map(|s| Some(s.to_string()))
        .collect();
    let values = [23.0, 45.0, 56.0, 78.0, 90.0].iter().map(|v| Some(*v)).collect();

    ColumnarTable {
        columns: vec![
            Column::new(DEFAULT_CATEGORY_COLUMN, ColumnData::Text(categories)),
            Column::new(DEFAULT_VALUE_COLUMN, ColumnData::Number(values)),
        ],
    }
}

// === Type inference ===

/// A value before its column's type is decided
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Missing,
    Number(f64),
    Text(String),
}

impl Cell {
    fn from_json(column: &str, value: &Value) -> Result<Self, ParseFailure> {
        match value {
            Value::Null => Ok(Cell::Missing),
            Value::Bool(b) => Ok(Cell::Text(b.to_string())),
            Value::Number(n) => Ok(match n.as_f64() {
                Some(v) => Cell::Number(v),
                None => Cell::Text(n.to_string()),
            }),
            Value::String(s) => Ok(Cell::from_field(s)),
            Value::Array(_) | Value::Object(_) => Err(ParseFailure::Shape(format!(
                "column '{}' contains a nested {}",
                column,
                json_kind(value)
            ))),
        }
    }

    fn from_field(field: &str) -> Self {
        if field.is_empty() {
            Cell::Missing
        } else {
            Cell::Text(field.to_string())
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            Cell::Missing => None,
        }
    }
}

/// Decide a column's type.
///
/// Numeric when every present cell is a number or a string that parses to a
/// finite number; text otherwise. A column with no present cells is numeric.
fn infer_column(name: String, cells: Vec<Cell>) -> Column {
    let numeric = cells
        .iter()
        .all(|c| matches!(c, Cell::Missing) || c.as_number().is_some());

    let data = if numeric {
        ColumnData::Number(cells.iter().map(Cell::as_number).collect())
    } else {
        ColumnData::Text(
            cells
                .into_iter()
                .map(|c| match c {
                    Cell::Missing => None,
                    Cell::Number(v) => Some(format_number(v)),
                    Cell::Text(s) => Some(s),
                })
                .collect(),
        )
    };

    Column { name, data }
}

/// Make repeated header names unique: `a, a, a` becomes `a, a.1, a.2`
fn unique_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for name in raw {
        let mut candidate = name.to_string();
        let mut n = 0;
        while headers.contains(&candidate) {
            n += 1;
            candidate = format!("{}.{}", name, n);
        }
        headers.push(candidate);
    }
    headers
}

fn format_number(v: f64) -> String {
    v.to_string()
}

fn number_to_json(v: f64) -> Value {
    // Integral values print without a fraction, as they were supplied
    if v.fract() == 0.0 && v.abs() < 9_007_199_254_740_992.0 {
        Value::from(v as i64)
    } else {
        serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(values: &[f64]) -> ColumnData {
        ColumnData::Number(values.iter().map(|v| Some(*v)).collect())
    }

    fn texts(values: &[&str]) -> ColumnData {
        ColumnData::Text(values.iter().map(|v| Some(v.to_string())).collect())
    }

    // JSON object of arrays

    #[test]
    fn test_json_columns_keep_order_and_values() {
        let table = parse_table(r#"{"zeta":["A","B","C"],"alpha":[30,50,20]}"#).unwrap();
        assert_eq!(table.headers(), vec!["zeta", "alpha"]);
        assert_eq!(table.column(0).unwrap().data, texts(&["A", "B", "C"]));
        assert_eq!(table.column(1).unwrap().data, numbers(&[30.0, 50.0, 20.0]));
        assert_eq!(table.num_rows(), 3);
    }

    #[test]
    fn test_json_unicode_example() {
        let table = parse_table(r#"{"類別":["A","B","C"],"數值":[30,50,20]}"#).unwrap();
        assert_eq!(table.headers(), vec!["類別", "數值"]);
        assert_eq!(table.column(1).unwrap().data, numbers(&[30.0, 50.0, 20.0]));
    }

    #[test]
    fn test_json_ragged_columns() {
        let err = parse_table(r#"{"x":[1,2,3],"y":[1,2]}"#).unwrap_err();
        assert_eq!(
            err,
            ParseFailure::RaggedColumns {
                column: "y".to_string(),
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn test_json_scalar_is_rejected() {
        let err = parse_table("42").unwrap_err();
        assert!(matches!(err, ParseFailure::Shape(_)));
        assert!(err.to_string().contains("a number"));
    }

    #[test]
    fn test_json_non_array_column_is_rejected() {
        let err = parse_table(r#"{"x":1,"y":2}"#).unwrap_err();
        assert!(err.to_string().contains("column 'x' must be an array"));
    }

    #[test]
    fn test_json_nested_value_is_rejected() {
        let err = parse_table(r#"{"x":[[1],[2]]}"#).unwrap_err();
        assert!(err.to_string().contains("nested"));
    }

    #[test]
    fn test_json_empty_object_gives_empty_table() {
        let table = parse_table("{}").unwrap();
        assert_eq!(table.num_columns(), 0);
        assert!(table.is_empty());
    }

    // JSON records

    #[test]
    fn test_json_records() {
        let table =
            parse_table(r#"[{"name":"a","v":1},{"name":"b","v":2,"extra":true}]"#).unwrap();
        assert_eq!(table.headers(), vec!["name", "v", "extra"]);
        assert_eq!(table.column(1).unwrap().data, numbers(&[1.0, 2.0]));
        assert_eq!(
            table.column(2).unwrap().data,
            ColumnData::Text(vec![None, Some("true".to_string())])
        );
    }

    #[test]
    fn test_json_records_must_be_objects() {
        let err = parse_table("[1,2,3]").unwrap_err();
        assert!(err.to_string().contains("must be objects"));
    }

    // CSV

    #[test]
    fn test_csv_basic() {
        let table = parse_table("category,q1,q2\nA,1,10\nB,2,20\n").unwrap();
        assert_eq!(table.headers(), vec!["category", "q1", "q2"]);
        assert_eq!(table.column(0).unwrap().data, texts(&["A", "B"]));
        assert_eq!(table.column(2).unwrap().data, numbers(&[10.0, 20.0]));
    }

    #[test]
    fn test_csv_matches_json_for_same_data() {
        let from_json = parse_table(r#"{"x":["A","B","C"],"y":[30,50.5,-20]}"#).unwrap();
        let from_csv = parse_table("x,y\nA,30\nB,50.5\nC,-20").unwrap();
        assert_eq!(from_json, from_csv);
    }

    #[test]
    fn test_csv_quoted_fields() {
        let table = parse_table("name,value\n\"Smith, J\",1\n\"say \"\"hi\"\"\",2").unwrap();
        assert_eq!(
            table.column(0).unwrap().data,
            texts(&["Smith, J", "say \"hi\""])
        );
    }

    #[test]
    fn test_csv_ragged_rows_fail() {
        let err = parse_table("x,y,z\n1,2,3\n4,5").unwrap_err();
        match err {
            ParseFailure::Malformed { csv, .. } => assert!(csv.contains("fields")),
            other => panic!("Expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_csv_duplicate_headers_are_renamed() {
        let table = parse_table("value,value,value\n1,2,3").unwrap();
        assert_eq!(table.headers(), vec!["value", "value.1", "value.2"]);
    }

    #[test]
    fn test_csv_header_only() {
        let table = parse_table("x,y\n").unwrap();
        assert_eq!(table.num_columns(), 2);
        assert_eq!(table.num_rows(), 0);
        assert!(table.is_empty());
    }

    // Inference

    #[test]
    fn test_inference_mixed_column_is_text() {
        let table = parse_table(r#"{"x":[1,"a",2.5,true]}"#).unwrap();
        assert_eq!(
            table.column(0).unwrap().data,
            texts(&["1", "a", "2.5", "true"])
        );
    }

    #[test]
    fn test_inference_numeric_strings() {
        let table = parse_table(r#"{"x":["1"," 2 ","3e2"]}"#).unwrap();
        assert_eq!(table.column(0).unwrap().data, numbers(&[1.0, 2.0, 300.0]));
    }

    #[test]
    fn test_inference_missing_values() {
        let table = parse_table("x,y\nA,1\nB,\n,3").unwrap();
        assert_eq!(
            table.column(0).unwrap().data,
            ColumnData::Text(vec![Some("A".to_string()), Some("B".to_string()), None])
        );
        assert_eq!(
            table.column(1).unwrap().data,
            ColumnData::Number(vec![Some(1.0), None, Some(3.0)])
        );
    }

    #[test]
    fn test_inference_nan_is_text() {
        let table = parse_table("x\nNaN\n1").unwrap();
        assert!(!table.column(0).unwrap().data.is_numeric());
    }

    #[test]
    fn test_all_missing_column_is_numeric() {
        let table = parse_table(r#"{"x":[null,null]}"#).unwrap();
        assert_eq!(
            table.column(0).unwrap().data,
            ColumnData::Number(vec![None, None])
        );
    }

    // parse() with default substitution

    #[test]
    fn test_parse_empty_gives_default_table() {
        let parsed = parse("");
        assert_eq!(parsed.origin, DataOrigin::Default);
        assert!(parsed.failure.is_none());
        assert_eq!(parsed.table.num_columns(), 2);
        assert_eq!(parsed.table.num_rows(), 5);
        assert_eq!(parsed.table, default_table());

        assert_eq!(parse("  \n ").table, default_table());
        assert_eq!(parse_table(""), Err(ParseFailure::Empty));
    }

    #[test]
    fn test_parse_failure_keeps_failure_and_substitutes_default() {
        let parsed = parse(r#"{"x":[1],"y":[1,2]}"#);
        assert_eq!(parsed.origin, DataOrigin::Default);
        assert!(matches!(
            parsed.failure,
            Some(ParseFailure::RaggedColumns { .. })
        ));
        assert_eq!(parsed.table, default_table());
    }

    #[test]
    fn test_parse_success() {
        let parsed = parse("a,b\n1,2");
        assert_eq!(parsed.origin, DataOrigin::Provided);
        assert!(parsed.failure.is_none());
    }

    #[test]
    fn test_default_table_contents() {
        let table = default_table();
        assert_eq!(table.headers(), vec![DEFAULT_CATEGORY_COLUMN, DEFAULT_VALUE_COLUMN]);
        assert_eq!(
            table.column(1).unwrap().data,
            numbers(&[23.0, 45.0, 56.0, 78.0, 90.0])
        );
    }

    // Table helpers

    #[test]
    fn test_to_json_restores_integers() {
        let table = parse_table("x,y\nA,30\nB,1.5\nC,").unwrap();
        assert_eq!(
            table.to_json(),
            serde_json::json!({"x": ["A", "B", "C"], "y": [30, 1.5, null]})
        );
    }

    #[test]
    fn test_new_rejects_unequal_columns() {
        let result = ColumnarTable::new(vec![
            Column::new("a", numbers(&[1.0, 2.0])),
            Column::new("b", numbers(&[1.0])),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_labels() {
        assert_eq!(numbers(&[1.0, 2.5]).labels(), vec!["1", "2.5"]);
        assert_eq!(
            ColumnData::Text(vec![Some("a".to_string()), None]).labels(),
            vec!["a", ""]
        );
    }
}
