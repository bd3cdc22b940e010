//! Window command handler

use anyhow::Result;
use clap::Args;
use colored::*;
use sluice_core::Window;
use sluice_core::time::format_rfc3339;

use super::parse_instant;

/// Arguments of `sluice window`
#[derive(Args, Debug)]
pub struct WindowArgs {
    /// Scheduled instant (RFC 3339)
    #[arg(long)]
    pub scheduled_at: String,

    /// Job spec version whose window rules apply: 1 or 2
    #[arg(long = "window-version", default_value_t = 1)]
    pub version: u32,

    /// Window size, e.g. 24h, 168h or, for version 2, 1M
    #[arg(long, default_value = "24h")]
    pub size: String,

    /// Window offset, positive moves a version 1 window earlier and a version 2 window later
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub offset: String,

    /// Truncation of the window end: h, d, w or M
    #[arg(long, default_value = "d")]
    pub truncate_to: String,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Handle `sluice window`
pub fn handle_window_command(args: WindowArgs) -> Result<()> {
    let scheduled_at = parse_instant(&args.scheduled_at)?;
    let window = Window::parse(args.version, &args.size, &args.offset, &args.truncate_to)?;
    let (start, end) = window.range(scheduled_at)?;

    if args.json {
        let out = serde_json::json!({
            "scheduled_at": format_rfc3339(scheduled_at),
            "version": window.version(),
            "size": window.size(),
            "offset": window.offset(),
            "truncate_to": window.truncate_to(),
            "dstart": format_rfc3339(start),
            "dend": format_rfc3339(end),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "{} v{} size={} offset={} truncate_to={}",
        "Window:".bold(),
        window.version(),
        window.size(),
        window.offset(),
        window.truncate_to()
    );
    println!("  {}  {}", "DSTART".cyan(), format_rfc3339(start));
    println!("  {}    {}", "DEND".cyan(), format_rfc3339(end));

    Ok(())
}
