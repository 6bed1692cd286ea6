//! Chart mapping.
//!
//! Projects a [`ColumnarTable`] onto one of five fixed encodings. Columns are
//! chosen by position: column 0 is the x axis (or slice names), the rest are
//! values.
//!
//! | kind    | x / names | y / values            | mark                  |
//! |---------|-----------|-----------------------|-----------------------|
//! | pie     | column 0  | column 1              | arc                   |
//! | line    | column 0  | columns 1.., a series each | linear line      |
//! | curve   | column 0  | columns 1..           | spline line + markers |
//! | bar     | column 0  | columns 1..           | grouped bars          |
//! | scatter | column 0  | column 1              | points                |

use crate::data::{Column, ColumnData, ColumnarTable};
use crate::error::MappingFailure;
use crate::palette::ColorPalette;
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Bar,
    Line,
    Curve,
    Pie,
    Scatter,
}

impl ChartKind {
    /// Every kind, in selector order
    pub const ALL: [ChartKind; 5] = [
        ChartKind::Bar,
        ChartKind::Line,
        ChartKind::Curve,
        ChartKind::Pie,
        ChartKind::Scatter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Curve => "curve",
            ChartKind::Pie => "pie",
            ChartKind::Scatter => "scatter",
        }
    }

    /// Localized name shown in the chart type selector
    pub fn display_label(&self) -> &'static str {
        match self {
            ChartKind::Bar => "長條圖",
            ChartKind::Line => "折線圖",
            ChartKind::Curve => "曲線圖",
            ChartKind::Pie => "圓餅圖",
            ChartKind::Scatter => "散點圖",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartKind {
    type Err = MappingFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bar" => Ok(ChartKind::Bar),
            "line" => Ok(ChartKind::Line),
            "curve" => Ok(ChartKind::Curve),
            "pie" => Ok(ChartKind::Pie),
            "scatter" => Ok(ChartKind::Scatter),
            _ => Err(MappingFailure::UnsupportedChartType(s.to_string())),
        }
    }
}

/// A column bound to a visual channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    pub values: ColumnData,
}

impl From<&Column> for Field {
    fn from(column: &Column) -> Self {
        Field {
            name: column.name.clone(),
            values: column.data.clone(),
        }
    }
}

/// One y channel with its assigned colour
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub values: ColumnData,
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Linear,
    Spline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mark {
    /// Bars, grouped side by side when there are several series
    Bar,
    Line {
        interpolation: Interpolation,
        markers: bool,
    },
    Point,
    Arc,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Encoding {
    Cartesian {
        x: Field,
        y: Vec<Series>,
        y_title: String,
        legend_title: Option<String>,
    },
    Radial {
        names: Field,
        values: Field,
        colors: Vec<String>,
    },
}

/// Renderer-agnostic description of a chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub mark: Mark,
    pub encoding: Encoding,
    pub palette: Vec<String>,
    pub theme: Theme,
}

/// Which columns after the first feed the y channel
#[derive(Debug, Clone, Copy)]
enum ValueColumns {
    All,
    FirstOnly,
}

/// Build the chart spec for a chart type given by name
pub fn build_spec_for(name: &str, table: &ColumnarTable) -> Result<ChartSpec, MappingFailure> {
    let kind: ChartKind = name.parse()?;
    build_spec(kind, table)
}

/// Map a table onto the encoding for `kind` and attach the fixed styling
pub fn build_spec(kind: ChartKind, table: &ColumnarTable) -> Result<ChartSpec, MappingFailure> {
    if table.is_empty() {
        return Err(MappingFailure::EmptyData);
    }
    if table.num_columns() < 2 {
        return Err(MappingFailure::InsufficientColumns { chart: kind });
    }

    let palette = ColorPalette::pastel();

    let (mark, encoding) = match kind {
        ChartKind::Pie => (Mark::Arc, radial_encoding(kind, table, &palette)?),
        ChartKind::Line => (
            Mark::Line {
                interpolation: Interpolation::Linear,
                markers: false,
            },
            cartesian_encoding(kind, table, ValueColumns::All, &palette)?,
        ),
        ChartKind::Curve => (
            Mark::Line {
                interpolation: Interpolation::Spline,
                markers: true,
            },
            cartesian_encoding(kind, table, ValueColumns::All, &palette)?,
        ),
        ChartKind::Bar => (
            Mark::Bar,
            cartesian_encoding(kind, table, ValueColumns::All, &palette)?,
        ),
        ChartKind::Scatter => (
            Mark::Point,
            cartesian_encoding(kind, table, ValueColumns::FirstOnly, &palette)?,
        ),
    };

    debug!(kind = %kind, columns = table.num_columns(), "built chart spec");

    Ok(ChartSpec {
        kind,
        mark,
        encoding,
        palette: palette.colors().to_vec(),
        theme: Theme::LIGHT,
    })
}

fn require_numeric(kind: ChartKind, column: &Column) -> Result<(), MappingFailure> {
    if column.data.is_numeric() {
        Ok(())
    } else {
        Err(MappingFailure::NonNumericColumn {
            chart: kind,
            column: column.name.clone(),
        })
    }
}

fn cartesian_encoding(
    kind: ChartKind,
    table: &ColumnarTable,
    values: ValueColumns,
    palette: &ColorPalette,
) -> Result<Encoding, MappingFailure> {
    let (x, rest) = table
        .columns()
        .split_first()
        .ok_or(MappingFailure::InsufficientColumns { chart: kind })?;

    let y_columns = match values {
        ValueColumns::All => rest,
        ValueColumns::FirstOnly => &rest[..rest.len().min(1)],
    };
    if y_columns.is_empty() {
        return Err(MappingFailure::InsufficientColumns { chart: kind });
    }

    let mut y = Vec::with_capacity(y_columns.len());
    for (idx, column) in y_columns.iter().enumerate() {
        require_numeric(kind, column)?;
        y.push(Series {
            name: column.name.clone(),
            values: column.data.clone(),
            color: palette.get_color(idx),
        });
    }

    // Wide-form naming: several series share a generic value axis
    let (y_title, legend_title) = match y.as_slice() {
        [only] => (only.name.clone(), None),
        _ => ("value".to_string(), Some("variable".to_string())),
    };

    Ok(Encoding::Cartesian {
        x: Field::from(x),
        y,
        y_title,
        legend_title,
    })
}

fn radial_encoding(
    kind: ChartKind,
    table: &ColumnarTable,
    palette: &ColorPalette,
) -> Result<Encoding, MappingFailure> {
    let (names, values) = match table.columns() {
        [names, values, ..] => (names, values),
        _ => return Err(MappingFailure::InsufficientColumns { chart: kind }),
    };
    require_numeric(kind, values)?;

    Ok(Encoding::Radial {
        names: Field::from(names),
        values: Field::from(values),
        colors: palette.assign(table.num_rows()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{parse_table, Column};

    fn table(json: &str) -> ColumnarTable {
        parse_table(json).unwrap()
    }

    fn three_columns() -> ColumnarTable {
        table(r#"{"x":["A","B","C"],"y1":[1,2,3],"y2":[4,5,6]}"#)
    }

    fn cartesian(spec: &ChartSpec) -> (&Field, &Vec<Series>) {
        match &spec.encoding {
            Encoding::Cartesian { x, y, .. } => (x, y),
            other => panic!("Expected Cartesian encoding, got {:?}", other),
        }
    }

    #[test]
    fn test_chart_kind_from_str() {
        assert_eq!("pie".parse::<ChartKind>().unwrap(), ChartKind::Pie);
        assert_eq!(" Curve ".parse::<ChartKind>().unwrap(), ChartKind::Curve);
        let err = "donut".parse::<ChartKind>().unwrap_err();
        assert_eq!(err.to_string(), "unsupported chart type: donut");
    }

    #[test]
    fn test_chart_kind_labels() {
        let labels: Vec<_> = ChartKind::ALL.iter().map(|k| k.display_label()).collect();
        assert_eq!(labels, vec!["長條圖", "折線圖", "曲線圖", "圓餅圖", "散點圖"]);
        assert_eq!(ChartKind::default(), ChartKind::Bar);
        assert_eq!(ChartKind::Scatter.to_string(), "scatter");
    }

    #[test]
    fn test_pie_requires_two_columns() {
        let err = build_spec(ChartKind::Pie, &table(r#"{"x":[1,2]}"#)).unwrap_err();
        assert_eq!(err, MappingFailure::InsufficientColumns { chart: ChartKind::Pie });
        assert_eq!(err.to_string(), "pie chart requires at least two columns");
    }

    #[test]
    fn test_every_kind_requires_two_columns() {
        let one = table(r#"{"x":[1,2]}"#);
        for kind in ChartKind::ALL {
            let err = build_spec(kind, &one).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("{} chart requires at least two columns", kind)
            );
        }
    }

    #[test]
    fn test_pie_uses_first_two_columns_only() {
        let spec = build_spec(ChartKind::Pie, &three_columns()).unwrap();
        assert_eq!(spec.mark, Mark::Arc);
        match spec.encoding {
            Encoding::Radial {
                names,
                values,
                colors,
            } => {
                assert_eq!(names.name, "x");
                assert_eq!(values.name, "y1");
                assert_eq!(colors, vec!["#66C5CC", "#F6CF71", "#F89C74"]);
            }
            other => panic!("Expected Radial encoding, got {:?}", other),
        }
    }

    #[test]
    fn test_pie_values_must_be_numeric() {
        let err = build_spec(ChartKind::Pie, &table(r#"{"a":[1,2],"b":["x","y"]}"#)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "pie chart requires numeric values in column 'b'"
        );
    }

    #[test]
    fn test_pie_end_to_end_example() {
        let spec = build_spec_for(
            "pie",
            &table(r#"{"類別":["A","B","C"],"數值":[30,50,20]}"#),
        )
        .unwrap();
        match spec.encoding {
            Encoding::Radial { names, values, .. } => {
                assert_eq!(names.values.labels(), vec!["A", "B", "C"]);
                assert_eq!(
                    values.values,
                    ColumnData::Number(vec![Some(30.0), Some(50.0), Some(20.0)])
                );
            }
            other => panic!("Expected Radial encoding, got {:?}", other),
        }
    }

    #[test]
    fn test_line_has_one_series_per_value_column() {
        let spec = build_spec(ChartKind::Line, &three_columns()).unwrap();
        let (x, y) = cartesian(&spec);
        assert_eq!(x.name, "x");
        let names: Vec<_> = y.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["y1", "y2"]);
        assert_eq!(y[0].color, "#66C5CC");
        assert_eq!(y[1].color, "#F6CF71");
        assert_eq!(
            spec.mark,
            Mark::Line {
                interpolation: Interpolation::Linear,
                markers: false
            }
        );
    }

    #[test]
    fn test_curve_matches_line_encoding() {
        let data = three_columns();
        let line = build_spec(ChartKind::Line, &data).unwrap();
        let curve = build_spec(ChartKind::Curve, &data).unwrap();
        assert_eq!(line.encoding, curve.encoding);
        assert_eq!(
            curve.mark,
            Mark::Line {
                interpolation: Interpolation::Spline,
                markers: true
            }
        );
        assert_ne!(line.mark, curve.mark);
    }

    #[test]
    fn test_bar_is_multi_series() {
        let spec = build_spec(ChartKind::Bar, &three_columns()).unwrap();
        assert_eq!(spec.mark, Mark::Bar);
        let (_, y) = cartesian(&spec);
        assert_eq!(y.len(), 2);
        match &spec.encoding {
            Encoding::Cartesian {
                y_title,
                legend_title,
                ..
            } => {
                assert_eq!(y_title, "value");
                assert_eq!(legend_title.as_deref(), Some("variable"));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_scatter_ignores_extra_columns() {
        let spec = build_spec(ChartKind::Scatter, &three_columns()).unwrap();
        assert_eq!(spec.mark, Mark::Point);
        let (x, y) = cartesian(&spec);
        assert_eq!(x.name, "x");
        assert_eq!(y.len(), 1);
        assert_eq!(y[0].name, "y1");
        match &spec.encoding {
            Encoding::Cartesian {
                y_title,
                legend_title,
                ..
            } => {
                assert_eq!(y_title, "y1");
                assert!(legend_title.is_none());
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_non_numeric_series_fails() {
        let data = table(r#"{"x":[1,2],"y":[1,2],"label":["a","b"]}"#);
        let err = build_spec(ChartKind::Bar, &data).unwrap_err();
        assert_eq!(
            err,
            MappingFailure::NonNumericColumn {
                chart: ChartKind::Bar,
                column: "label".to_string()
            }
        );
        // scatter never looks at the third column
        assert!(build_spec(ChartKind::Scatter, &data).is_ok());
    }

    #[test]
    fn test_unsupported_type_fails_for_any_table() {
        for data in [three_columns(), table("{}"), table(r#"{"x":[1]}"#)] {
            let err = build_spec_for("unsupported", &data).unwrap_err();
            assert_eq!(err.to_string(), "unsupported chart type: unsupported");
        }
    }

    #[test]
    fn test_empty_table_fails() {
        assert_eq!(
            build_spec(ChartKind::Bar, &table("{}")).unwrap_err(),
            MappingFailure::EmptyData
        );
        assert_eq!(
            build_spec(ChartKind::Line, &table("x,y\n")).unwrap_err(),
            MappingFailure::EmptyData
        );
    }

    #[test]
    fn test_style_is_uniform() {
        let data = three_columns();
        for kind in ChartKind::ALL {
            let spec = build_spec(kind, &data).unwrap();
            assert_eq!(spec.theme, Theme::LIGHT);
            assert_eq!(spec.palette, ColorPalette::pastel().colors().to_vec());
        }
    }

    #[test]
    fn test_spec_serializes() {
        let data = ColumnarTable::new(vec![
            Column::new("x", ColumnData::Text(vec![Some("a".to_string())])),
            Column::new("y", ColumnData::Number(vec![Some(1.0)])),
        ])
        .unwrap();
        let spec = build_spec(ChartKind::Curve, &data).unwrap();
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["kind"], "curve");
        assert_eq!(json["mark"]["type"], "line");
        assert_eq!(json["mark"]["interpolation"], "spline");
        assert_eq!(json["encoding"]["type"], "cartesian");
        assert_eq!(json["encoding"]["x"]["values"][0], "a");
        assert_eq!(json["encoding"]["y"][0]["values"][0], 1.0);
        assert_eq!(json["theme"]["grid"]["color"], "#E0E0E0");
    }
}
