//! `eva agent` — Probe the automation agent or send it one raw instruction.

use std::io::Write;

use console::style;
use tokio_stream::StreamExt;

use eva_core::state::AppState;

pub fn status(state: &AppState) -> Result<(), String> {
    let config = &state.agent_config;
    let available = state.launcher.is_available();

    println!(
        "{} {}",
        style(state.launcher.display_name()).bold(),
        if available {
            style("available").green()
        } else {
            style("not available").red()
        }
    );
    println!(
        "  Install dir:  {}",
        config
            .install_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "(not configured)".to_string())
    );
    println!(
        "  Command:      {} {} --task {} -r <instruction>",
        config.program,
        config.launcher_args.join(" "),
        config.task_name
    );
    println!("  Idle timeout: {}s", config.idle_timeout.as_secs());
    Ok(())
}

pub async fn exec(state: &AppState, instruction: &str) -> Result<(), String> {
    let mut fragments = state.launcher.launch(instruction);
    let mut stdout = std::io::stdout();

    while let Some(item) = fragments.next().await {
        let fragment = item.map_err(|e| e.to_string())?;
        if fragment.is_unavailable() {
            return Err(fragment.text);
        }
        print!("{}", fragment.text);
        let _ = stdout.flush();
    }
    Ok(())
}
