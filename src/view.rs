//! Page model.
//!
//! [`render`] is the whole request cycle: decode parameters, parse the data,
//! map it onto a chart, and collect every message the user should see. It is
//! pure and holds no state between calls.

use crate::chart::{build_spec, ChartKind, ChartSpec};
use crate::data::{self, DataOrigin};
use crate::error::MappingFailure;
use crate::query;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

pub const PAGE_TITLE: &str = "圖表生成器";
pub const SIDEBAR_TITLE: &str = "圖表設置";
pub const SELECTOR_LABEL: &str = "選擇圖表類型";
pub const CURRENT_SETTINGS_TITLE: &str = "當前設置";
pub const DATA_PANEL_TITLE: &str = "數據內容";

const DEFAULT_DATA_NOTICE: &str = "使用默認數據。您可以通過 URL 參數提供自己的數據。";
const DEFAULT_DATA_SHORT: &str = "使用默認數據";
const EXAMPLE_CAPTION: &str =
    "例如: ?data={\"類別\":[\"A\",\"B\",\"C\"],\"數值\":[30,50,20]}&type=pie";

/// Inputs of one render cycle, as read from the query string
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    /// `data` value (JSON or CSV), fully decoded
    pub data: Option<String>,
    /// Raw `type` value
    pub chart_type: Option<String>,
}

impl QueryParams {
    pub fn from_query(raw: &str) -> Self {
        Self::from_pairs(&query::parse_query(raw))
    }

    /// Read parameters from decoded query pairs. Links often carry `data`
    /// encoded twice, so it gets one more decoding pass here.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        QueryParams {
            data: query::last_value(pairs, "data").map(query::unquote),
            chart_type: query::last_value(pairs, "type").map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLevel {
    Error,
    Warning,
    Info,
    Caption,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub level: MessageLevel,
    pub text: String,
}

impl Message {
    fn new(level: MessageLevel, text: impl Into<String>) -> Self {
        Message {
            level,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectorOption {
    pub value: ChartKind,
    pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSelector {
    pub label: &'static str,
    pub options: Vec<SelectorOption>,
    pub selected: ChartKind,
}

impl ChartSelector {
    fn new(selected: ChartKind) -> Self {
        ChartSelector {
            label: SELECTOR_LABEL,
            options: ChartKind::ALL
                .iter()
                .map(|&kind| SelectorOption {
                    value: kind,
                    label: kind.display_label(),
                })
                .collect(),
            selected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PanelContent {
    /// The decoded table as structured text
    Json(Value),
    Notice(String),
}

/// Collapsible panel showing the decoded data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPanel {
    pub title: &'static str,
    pub expanded: bool,
    pub content: PanelContent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewModel {
    pub page_title: &'static str,
    pub sidebar_title: &'static str,
    pub selector: ChartSelector,
    /// User-visible messages in display order
    pub messages: Vec<Message>,
    /// `None` when no chart should be drawn this cycle
    pub chart: Option<ChartSpec>,
    /// Why `chart` is `None`, if mapping failed
    #[serde(skip)]
    pub chart_failure: Option<MappingFailure>,
    pub settings_title: &'static str,
    pub data_panel: DataPanel,
    pub status: String,
}

impl ViewModel {
    pub fn errors(&self) -> impl Iterator<Item = &Message> {
        self.messages
            .iter()
            .filter(|m| m.level == MessageLevel::Error)
    }
}

/// Run one full parse -> map cycle for the given parameters
pub fn render(params: &QueryParams) -> ViewModel {
    let mut messages = Vec::new();

    let kind = match params.chart_type.as_deref().map(str::trim) {
        None | Some("") => ChartKind::default(),
        Some(name) => match name.parse::<ChartKind>() {
            Ok(kind) => kind,
            Err(failure) => {
                warn!(%failure, "falling back to default chart type");
                messages.push(Message::new(
                    MessageLevel::Warning,
                    format!("{}; showing {} instead", failure, ChartKind::default()),
                ));
                ChartKind::default()
            }
        },
    };

    let parsed = data::parse(params.data.as_deref().unwrap_or_default());

    match (&parsed.failure, parsed.origin) {
        (Some(failure), _) => {
            messages.push(Message::new(MessageLevel::Error, failure.to_string()));
            messages.push(Message::new(MessageLevel::Info, DEFAULT_DATA_NOTICE));
        }
        (None, DataOrigin::Default) => {
            messages.push(Message::new(MessageLevel::Info, DEFAULT_DATA_NOTICE));
            messages.push(Message::new(MessageLevel::Caption, EXAMPLE_CAPTION));
        }
        (None, DataOrigin::Provided) => {}
    }

    let (chart, chart_failure) = match build_spec(kind, &parsed.table) {
        Ok(spec) => (Some(spec), None),
        Err(failure) => {
            report_mapping_failure(&failure);
            messages.push(Message::new(MessageLevel::Error, failure.to_string()));
            (None, Some(failure))
        }
    };

    let content = match parsed.origin {
        DataOrigin::Provided => PanelContent::Json(parsed.table.to_json()),
        DataOrigin::Default => PanelContent::Notice(DEFAULT_DATA_SHORT.to_string()),
    };

    ViewModel {
        page_title: PAGE_TITLE,
        sidebar_title: SIDEBAR_TITLE,
        selector: ChartSelector::new(kind),
        messages,
        chart,
        chart_failure,
        settings_title: CURRENT_SETTINGS_TITLE,
        data_panel: DataPanel {
            title: DATA_PANEL_TITLE,
            expanded: false,
            content,
        },
        status: format!("圖表類型：{}", kind),
    }
}

fn report_mapping_failure(failure: &MappingFailure) {
    match failure {
        MappingFailure::EmptyData => debug!("nothing to chart"),
        _ => warn!(%failure, "chart not rendered"),
    }
}
