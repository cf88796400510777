//! `eva project` — Inspect stored projects.

use eva_core::state::AppState;

use super::{print_json, truncate};

pub async fn list(state: &AppState) -> Result<(), String> {
    let projects = state.project_store.list().await;
    if projects.is_empty() {
        println!(
            "No projects in {}",
            state.project_store.path().display()
        );
        return Ok(());
    }

    println!("┌──────────────────────────┬────────┬──────────┬────────────────┐");
    println!("│ Name                     │ Steps  │ Runnable │ Custom prompt  │");
    println!("├──────────────────────────┼────────┼──────────┼────────────────┤");
    for project in &projects {
        println!(
            "│ {:<24} │ {:<6} │ {:<8} │ {:<14} │",
            truncate(&project.name, 24),
            project.steps.len(),
            project.runnable_steps(),
            if project.uses_custom_prompt() { "yes" } else { "no" },
        );
    }
    println!("└──────────────────────────┴────────┴──────────┴────────────────┘");
    Ok(())
}

pub async fn show(state: &AppState, name: &str) -> Result<(), String> {
    let project = state
        .project_store
        .require(name)
        .await
        .map_err(|e| e.to_string())?;
    let value = serde_json::to_value(&project).map_err(|e| e.to_string())?;
    print_json(&value);
    Ok(())
}
