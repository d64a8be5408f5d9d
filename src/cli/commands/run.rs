//! `reports run`: execute a stored report and print the output.

use anyhow::{Result, bail};
use clap::Args;
use serde_json::{Map, Value as JsonValue, json};

use crate::cli::output;
use crate::config::Config;
use crate::manager::ReportsManager;

#[derive(Args)]
pub struct RunArgs {
    /// Report slug
    pub slug: String,

    /// Comma-separated key:value parameter pairs (e.g. "department:IT,active:1")
    #[arg(long)]
    pub params: Option<String>,

    /// Output format (table, json, csv, xml, html, jsonapi, datatables)
    #[arg(long, default_value = "table")]
    pub format: String,

    /// Paginate the query
    #[arg(long)]
    pub paginate: bool,

    /// Page number (implies --paginate)
    #[arg(long)]
    pub page: Option<u32>,

    /// Rows per page (implies --paginate)
    #[arg(long)]
    pub per_page: Option<u32>,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let config = Config::from_env()?;
    let manager = ReportsManager::connect(config).await?;

    let params = parse_params(args.params.as_deref());

    let mut options = Map::new();
    if args.paginate || args.page.is_some() || args.per_page.is_some() {
        options.insert("paginate".to_string(), json!(true));
    }
    if let Some(page) = args.page {
        options.insert("page".to_string(), json!(page));
    }
    if let Some(per_page) = args.per_page {
        options.insert("per_page".to_string(), json!(per_page));
    }

    let result = manager
        .report(&args.slug)
        .await?
        .params(params)
        .options(options)
        .run()
        .await?;

    match args.format.as_str() {
        "table" => output::print_table(&result),
        "json" => println!("{}", result.to_json_pretty()),
        "csv" => println!("{}", result.to_csv()),
        "xml" => println!("{}", result.to_xml()),
        "html" => println!("{}", result.to_html_table()),
        "jsonapi" => println!(
            "{}",
            serde_json::to_string_pretty(&result.to_json_api("report-row"))?
        ),
        "datatables" => println!(
            "{}",
            serde_json::to_string_pretty(&result.to_data_tables())?
        ),
        // No document backend ships; the exporter reports what is missing.
        "pdf" => {
            result.exporter().to_pdf()?;
        }
        "docx" | "word" => {
            result.exporter().to_word()?;
        }
        "xlsx" | "excel" => {
            result.exporter().to_excel()?;
        }
        other => bail!("unknown format [{other}]"),
    }

    Ok(())
}

/// Parse `key:value` pairs separated by commas. Entries without a colon are
/// skipped. Values that parse as numbers bind as numbers.
fn parse_params(raw: Option<&str>) -> Map<String, JsonValue> {
    let mut params = Map::new();
    let Some(raw) = raw else {
        return params;
    };

    for part in raw.split(',') {
        let Some((key, value)) = part.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        params.insert(key.to_string(), parse_value(value.trim()));
    }

    params
}

fn parse_value(raw: &str) -> JsonValue {
    if let Ok(i) = raw.parse::<i64>() {
        return json!(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return json!(f);
    }
    json!(raw)
}
