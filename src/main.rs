use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use urlchart::view::{self, QueryParams, ViewModel};
use urlchart::{graph, server, OutputFormat, RenderOptions};

#[derive(Parser, Debug)]
#[command(name = "urlchart")]
#[command(about = "Generate charts from URL-style data and type parameters", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the page model (messages, chart spec, data panel) as JSON
    View(InputArgs),

    /// Render the chart as an image
    Render {
        #[command(flatten)]
        input: InputArgs,

        /// JSON file with width, height and format
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        #[arg(long)]
        width: Option<u32>,

        #[arg(long)]
        height: Option<u32>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Serve the page model and chart images over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 8501)]
        port: u16,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Query string or URL (e.g., 'type=pie&data=%7B%22a%22%3A%5B1%5D%7D')
    query: Option<String>,

    /// Data as JSON or CSV; overrides `data` from the query
    #[arg(long, conflicts_with = "data_file")]
    data: Option<String>,

    /// Read data from a file, or from stdin with '-'
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Chart type (bar, line, curve, pie, scatter); overrides `type` from the query
    #[arg(short = 't', long = "type")]
    chart_type: Option<String>,
}

impl InputArgs {
    fn params(&self) -> Result<QueryParams> {
        let mut params = self
            .query
            .as_deref()
            .map(QueryParams::from_query)
            .unwrap_or_default();

        if let Some(data) = &self.data {
            params.data = Some(data.clone());
        }
        if let Some(path) = &self.data_file {
            params.data = Some(read_data_file(path)?);
        }
        if let Some(chart_type) = &self.chart_type {
            params.chart_type = Some(chart_type.clone());
        }
        Ok(params)
    }
}

fn read_data_file(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read data from stdin")?;
        Ok(buffer)
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read data file '{}'", path.display()))
    }
}

fn print_messages(view: &ViewModel) {
    for message in &view.messages {
        eprintln!("{:?}: {}", message.level, message.text);
    }
}

fn run_view(input: &InputArgs) -> Result<()> {
    let view = view::render(&input.params()?);
    let json = serde_json::to_string_pretty(&view).context("Failed to serialize view")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", json).context("Failed to write view to stdout")?;
    Ok(())
}

fn run_render(input: &InputArgs, options: RenderOptions, output: Option<&Path>) -> Result<()> {
    let view = view::render(&input.params()?);
    print_messages(&view);

    let spec = view.chart.as_ref().ok_or_else(|| {
        let reasons: Vec<_> = view.errors().map(|m| m.text.as_str()).collect();
        anyhow!("No chart to render: {}", reasons.join("; "))
    })?;

    let bytes = graph::render_chart(spec, &options).context("Failed to render chart")?;

    match output {
        Some(path) => fs::write(path, &bytes)
            .with_context(|| format!("Failed to write '{}'", path.display()))?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(&bytes)
                .context("Failed to write image to stdout")?;
            handle.flush().context("Failed to flush stdout")?;
        }
    }

    Ok(())
}

fn run_serve(host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid host or port: {}:{}", host, port))?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(server::serve(addr))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "urlchart=info,tower_http=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::View(input) => run_view(&input),
        Command::Render {
            input,
            config,
            format,
            width,
            height,
            output,
        } => {
            let mut options = match &config {
                Some(path) => RenderOptions::from_file(path)?,
                None => RenderOptions::default(),
            };
            if let Some(format) = format {
                options.format = format;
            }
            if let Some(width) = width {
                options.width = width;
            }
            if let Some(height) = height {
                options.height = height;
            }
            run_render(&input, options, output.as_deref())
        }
        Command::Serve { host, port } => run_serve(&host, port),
    }
}
