use clap::Parser;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use softsell_assistant::core::config::{self, CliOverrides};
use softsell_assistant::core::state::Mode;
use softsell_assistant::tui;
use std::fs::File;

#[derive(Parser)]
#[command(name = "softsell", about = "SoftSell license assistant")]
struct Args {
    /// Answer mode for questions without a canned reply
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Completion model override
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Initialize file logger - writes to softsell.log in current directory
    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();

    if let Ok(log_file) = File::create("softsell.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }

    let file_config = config::load_config()?;
    let resolved = config::resolve(
        &file_config,
        &CliOverrides {
            mode: args.mode,
            model: args.model,
        },
    )?;

    log::info!(
        "SoftSell assistant starting: mode={}, model={}",
        resolved.mode.label(),
        resolved.params.model
    );

    tui::run(resolved).await?;
    Ok(())
}
