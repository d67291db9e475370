//! Process command - interpret a single document.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use recibo_core::models::{ApiLog, DocumentData, LogKind, ProcessingResult, Section, Zone};

use super::{build_pipeline, load_config, read_input, InputKind};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF, or TXT with already extracted text)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Only read text inside this zone, as "x,y,width,height" in page units
    #[arg(long, value_parser = parse_zone)]
    zone: Option<Zone>,

    /// Section the zone or text holds (defaults to details with --zone)
    #[arg(long, value_parser = parse_section)]
    section: Option<Section>,

    /// Page to read (1-indexed)
    #[arg(long)]
    page: Option<u32>,

    /// Keep line breaks where the baseline changes
    #[arg(long)]
    preserve_lines: bool,

    /// Show extraction confidence and source
    #[arg(long)]
    show_confidence: bool,

    /// Print the API log to stderr
    #[arg(long)]
    show_logs: bool,

    /// Skip the LLM and use only the heuristic parsers
    #[arg(long)]
    offline: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per line item
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

fn parse_zone(s: &str) -> Result<Zone, String> {
    s.parse().map_err(|e: recibo_core::ReciboError| e.to_string())
}

fn parse_section(s: &str) -> Result<Section, String> {
    s.parse().map_err(|e: recibo_core::ReciboError| e.to_string())
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(page) = args.page {
        config.pdf.page = page;
    }
    if args.preserve_lines {
        config.pdf.preserve_lines = true;
    }

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    let (kind, data) = read_input(&args.input)?;
    if kind == InputKind::Text && args.zone.is_some() {
        anyhow::bail!("--zone needs a PDF input; use --section for text files");
    }
    let section = args.section.or(args.zone.map(|_| Section::Details));

    let pipeline = build_pipeline(&config, args.offline)?;
    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(if pipeline.has_llm() {
        "Interpreting with LLM..."
    } else {
        "Parsing document..."
    });
    pb.enable_steady_tick(Duration::from_millis(100));

    let log = ApiLog::new();
    let outcome = match (kind, args.zone, section) {
        (InputKind::Pdf, Some(zone), Some(section)) => {
            pipeline.process_zone(&data, &zone, section, Some(&log)).await
        }
        (InputKind::Pdf, _, _) => pipeline.process_file(&data, Some(&log)).await,
        (InputKind::Text, _, Some(section)) => {
            let text = String::from_utf8_lossy(&data);
            pipeline.process_zone_text(&text, section, Some(&log)).await
        }
        (InputKind::Text, _, None) => {
            let text = String::from_utf8_lossy(&data);
            pipeline.process_text(&text, Some(&log)).await
        }
    };

    pb.finish_and_clear();

    if args.show_logs {
        print_logs(&log)?;
    }

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{} {}", style("✗").red(), e.user_message());
            return Err(e.into());
        }
    };

    let output = format_result(&result, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_confidence {
        println!();
        println!(
            "{} Confidence: {}% ({:?})",
            style("ℹ").blue(),
            result.confidence,
            result.source
        );
        println!(
            "{} Processing time: {}ms",
            style("ℹ").blue(),
            start.elapsed().as_millis()
        );
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

fn print_logs(log: &ApiLog) -> anyhow::Result<()> {
    for entry in log.entries() {
        let kind = match entry.kind {
            LogKind::Request => style("request ").cyan(),
            LogKind::Response => style("response").green(),
            LogKind::Error => style("error   ").red(),
        };
        eprintln!(
            "{} {} {}",
            entry.timestamp.to_rfc3339(),
            kind,
            serde_json::to_string(&entry.data)?
        );
    }
    Ok(())
}

pub fn format_result(result: &ProcessingResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => format_csv(&result.data),
        OutputFormat::Text => Ok(format_text(&result.data)),
    }
}

fn format_csv(data: &DocumentData) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "document_number",
        "date",
        "name",
        "tax_id",
        "item_code",
        "description",
        "unit_of_measure",
        "quantity",
        "gross_price",
        "discount",
        "tax",
        "net_value",
    ])?;

    let header = &data.header;
    for item in &data.details {
        wtr.write_record([
            &header.document_number,
            &header.date,
            &header.name,
            &header.tax_id,
            &item.item_code,
            &item.description,
            &item.unit_of_measure,
            &item.quantity.to_string(),
            &item.gross_price.to_string(),
            &item.discount.to_string(),
            &item.tax.to_string(),
            &item.net_value.to_string(),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(data: &DocumentData) -> String {
    let header = &data.header;
    let mut output = String::new();

    output.push_str(&format!("Document: {}\n", header.document_number));
    output.push_str(&format!("Date: {}\n", header.date));
    output.push_str(&format!("Name: {}\n", header.name));
    if !header.tax_id.is_empty() {
        output.push_str(&format!("Tax ID: {}\n", header.tax_id));
    }
    output.push('\n');

    output.push_str(&format!("Items ({}):\n", data.details.len()));
    for item in &data.details {
        output.push_str(&format!(
            "  {:<8} {} - {} {} x {:.2} = {:.2}\n",
            item.item_code,
            item.description,
            item.quantity,
            item.unit_of_measure,
            item.gross_price,
            item.net_value
        ));
    }
    output.push('\n');
    output.push_str(&format!("Total: {:.2}\n", data.total_net_value()));

    output
}
