//! `reports list`: show stored report definitions.

use anyhow::Result;
use clap::Args;
use comfy_table::{Table, presets::UTF8_FULL};

use crate::config::Config;
use crate::manager::ReportsManager;

#[derive(Args)]
pub struct ListArgs {
    /// Include inactive reports
    #[arg(long)]
    pub all: bool,
}

pub async fn execute(args: ListArgs) -> Result<()> {
    let config = Config::from_env()?;
    let manager = ReportsManager::connect(config).await?;

    let reports = manager.repository().list(!args.all).await?;

    if reports.is_empty() {
        println!("No reports defined.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["slug", "name", "active", "cache_ttl", "connection"]);

    for report in reports {
        table.add_row(vec![
            report.slug,
            report.name,
            if report.is_active { "yes" } else { "no" }.to_string(),
            report
                .cache_ttl
                .map(|ttl| ttl.to_string())
                .unwrap_or_else(|| "default".to_string()),
            report
                .connection
                .unwrap_or_else(|| "default".to_string()),
        ]);
    }

    println!("{table}");
    Ok(())
}
