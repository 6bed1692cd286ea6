use crate::chart::ChartKind;

/// Reasons a data payload could not be turned into a table.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseFailure {
    #[error("no data supplied")]
    Empty,

    #[error("unable to parse data as JSON ({json}) or CSV ({csv})")]
    Malformed { json: String, csv: String },

    #[error("unsupported data layout: {0}")]
    Shape(String),

    #[error("all columns must have the same length: column '{column}' has {found} values, expected {expected}")]
    RaggedColumns {
        column: String,
        expected: usize,
        found: usize,
    },
}

/// Reasons a table could not be projected onto a chart.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MappingFailure {
    #[error("unsupported chart type: {0}")]
    UnsupportedChartType(String),

    #[error("data is empty")]
    EmptyData,

    #[error("{chart} chart requires at least two columns")]
    InsufficientColumns { chart: ChartKind },

    #[error("{chart} chart requires numeric values in column '{column}'")]
    NonNumericColumn { chart: ChartKind, column: String },
}

impl MappingFailure {
    /// Short machine-readable name, used in API error payloads
    pub fn kind(&self) -> &'static str {
        match self {
            MappingFailure::UnsupportedChartType(_) => "UnsupportedChartType",
            MappingFailure::EmptyData => "EmptyData",
            MappingFailure::InsufficientColumns { .. } => "InsufficientColumns",
            MappingFailure::NonNumericColumn { .. } => "NonNumericColumn",
        }
    }
}
