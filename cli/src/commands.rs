use forage_core::gather::MAX_AUTO_RESOURCES;
use forage_core::service::ServiceError;
use forage_core::{AppConfig, Catalog, GatherHandle, GatherView};
use forage_types::formatting::{
    format_combination, format_countdown, format_progress_bar, format_thousands, remaining_secs,
};
use forage_types::{GatherTiming, ResourceId};

use crate::journal::{SharedJournal, render_journal};

const BAR_WIDTH: usize = 24;

fn err(e: ServiceError) -> String {
    format!("error: {e}\n")
}

pub async fn list_resources(handle: &GatherHandle) -> Result<(), String> {
    let catalog = handle.catalog().await.map_err(err)?;
    let view = handle.snapshot().await.map_err(err)?;
    println!("{}", render_resources(&catalog, &view.auto_members));
    Ok(())
}

pub async fn list_elements(handle: &GatherHandle) -> Result<(), String> {
    let catalog = handle.catalog().await.map_err(err)?;
    println!("{}", render_elements(&catalog));
    Ok(())
}

pub async fn select(handle: &GatherHandle, resource: &str, timing: &GatherTiming) -> Result<(), String> {
    if !handle.select_resource(resource).await.map_err(err)? {
        println!("Deselected {resource}");
        return Ok(());
    }
    show_status(handle, timing).await
}

pub async fn toggle(handle: &GatherHandle, element: &str) -> Result<(), String> {
    let selected = handle.toggle_element(element).await.map_err(err)?;
    println!("{} {}", if selected { "Added" } else { "Removed" }, element);
    Ok(())
}

pub async fn add(handle: &GatherHandle, element: &str) -> Result<(), String> {
    handle.add_element(element).await.map_err(err)?;
    println!("Added {element}");
    Ok(())
}

pub async fn remove(handle: &GatherHandle, element: &str) -> Result<(), String> {
    if handle.remove_element(element).await.map_err(err)? {
        println!("Removed {element}");
    } else {
        println!("{element} was not selected");
    }
    Ok(())
}

pub async fn clear(handle: &GatherHandle) -> Result<(), String> {
    handle.clear_selection().await.map_err(err)?;
    println!("Selection cleared");
    Ok(())
}

pub async fn auto_member(handle: &GatherHandle, resource: &str) -> Result<(), String> {
    let added = handle.toggle_auto_member(resource).await.map_err(err)?;
    let view = handle.snapshot().await.map_err(err)?;
    println!(
        "{} {} (auto-gather set: {})",
        if added { "Added" } else { "Removed" },
        resource,
        format_members(&view.auto_members)
    );
    Ok(())
}

pub async fn toggle_auto(handle: &GatherHandle) -> Result<(), String> {
    let running = handle.start_or_stop_auto().await.map_err(err)?;
    if !running {
        println!("Auto-gather stopped");
    }
    Ok(())
}

pub async fn show_status(handle: &GatherHandle, timing: &GatherTiming) -> Result<(), String> {
    println!("{}", status_report(handle, timing).await?);
    Ok(())
}

async fn status_report(handle: &GatherHandle, timing: &GatherTiming) -> Result<String, String> {
    let view = handle.snapshot().await.map_err(err)?;
    let catalog = handle.catalog().await.map_err(err)?;
    Ok(render_status(&view, &catalog, timing))
}

pub fn show_journal(journal: &SharedJournal) -> Result<(), String> {
    let journal = journal.lock().map_err(|_| "journal unavailable".to_string())?;
    println!("{}", render_journal(&journal));
    Ok(())
}

pub fn show_config(config: &AppConfig) {
    match AppConfig::path() {
        Ok(path) => println!("Config file: {}", path.display()),
        Err(e) => println!("Config file: unavailable ({e})"),
    }
    println!("{}", render_config(config));
}

pub async fn exit(handle: &GatherHandle) {
    if let Err(e) = handle.shutdown().await {
        tracing::debug!(error = %e, "Service already stopped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────────────

/// One line per resource. Undiscovered combinations stay hidden.
pub fn render_resources(catalog: &Catalog, auto_members: &[ResourceId]) -> String {
    if catalog.resources().is_empty() {
        return "No resources in catalog".to_string();
    }
    catalog
        .resources()
        .iter()
        .map(|r| {
            let auto = if auto_members.contains(&r.id) { "*" } else { " " };
            let found = if r.discovered { "x" } else { " " };
            let combination = if r.discovered {
                format_combination(&r.required_combination)
            } else {
                "?".repeat(r.required_combination.len())
            };
            format!(
                "{auto}[{found}] {:<16} {:<18} {:<10} {}",
                r.id.as_str(),
                r.name,
                r.rarity.label(),
                combination
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_elements(catalog: &Catalog) -> String {
    if catalog.elements().is_empty() {
        return "No elements in catalog".to_string();
    }
    catalog
        .elements()
        .iter()
        .map(|e| format!("{:>3}  {}", e.icon, e.id))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_status(view: &GatherView, catalog: &Catalog, timing: &GatherTiming) -> String {
    let mut lines = Vec::new();

    match &view.target {
        Some(target) => {
            let name = catalog
                .resource(target)
                .map(|r| r.name.as_str())
                .unwrap_or(target.as_str());
            lines.push(format!("Resource: {name}"));
            lines.push(format!("Selected: {}", format_combination(&view.selected)));
            lines.push(format!(
                "Progress: {} {}",
                format_progress_bar(view.progress, BAR_WIDTH),
                if view.running {
                    format_countdown(remaining_secs(view.progress, timing), "done")
                } else {
                    "idle".to_string()
                }
            ));
        }
        None => lines.push("No resource selected".to_string()),
    }

    if let Some(auto) = &view.auto {
        lines.push(format!(
            "Auto-gather: running (cycle {}, {} gathered, {} failed)",
            auto.stats.cycles_completed + 1,
            format_thousands(auto.stats.total_gathered),
            auto.stats.failed_attempts
        ));
        for id in &auto.original_order {
            let marker = if auto.current.as_ref() == Some(id) { ">" } else { " " };
            lines.push(format!(
                " {marker} {:<16} x{}",
                id.as_str(),
                format_thousands(auto.stats.count(id))
            ));
        }
    } else {
        lines.push(format!(
            "Auto-gather: stopped (set: {})",
            format_members(&view.auto_members)
        ));
    }

    lines.join("\n")
}

pub fn render_config(config: &AppConfig) -> String {
    let t = &config.timing;
    [
        format!("Character:      {}", config.character_id),
        format!("Catalog:        {}", config.catalog_path.display()),
        format!(
            "Discoveries:    {}",
            config.discovery_url.as_deref().unwrap_or("local")
        ),
        format!(
            "Tick:           {}ms x {} ({} ticks per run)",
            t.tick_interval_ms,
            t.progress_step,
            t.ticks_per_run()
        ),
        format!("Reveal delay:   {}ms", t.reveal_delay_ms),
        format!(
            "Auto delays:    {}ms between resources, {}ms between cycles",
            t.inter_resource_delay_ms, t.inter_cycle_delay_ms
        ),
        format!(
            "Auto-gather:    up to {} resources, on failure {:?}",
            t.max_auto_resources.clamp(1, MAX_AUTO_RESOURCES),
            t.auto_failure_policy
        ),
    ]
    .join("\n")
}

fn format_members(members: &[ResourceId]) -> String {
    if members.is_empty() {
        return "empty".to_string();
    }
    members
        .iter()
        .map(ResourceId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use forage_core::gateway::LocalDiscoveryGateway;
    use forage_core::gather::TimerState;
    use forage_core::{Element, GatherService, GatherSessionController, Resource};
    use forage_types::{CharacterId, ElementId, Rarity};

    fn catalog() -> Catalog {
        Catalog::new(
            vec![Element {
                id: ElementId::from("fire"),
                icon: "F".to_string(),
                color: "#ff5500".to_string(),
            }],
            vec![
                Resource {
                    id: ResourceId::from("ember"),
                    name: "Ember".to_string(),
                    rarity: Rarity::Rare,
                    required_combination: vec![ElementId::from("fire"), ElementId::from("fire")],
                    discovered: false,
                },
                Resource {
                    id: ResourceId::from("ash"),
                    name: "Ash".to_string(),
                    rarity: Rarity::Common,
                    required_combination: vec![ElementId::from("fire")],
                    discovered: true,
                },
            ],
        )
    }

    fn idle_view() -> GatherView {
        GatherView {
            target: None,
            selected: Vec::new(),
            progress: 0,
            running: false,
            timer: TimerState::Idle,
            auto_members: Vec::new(),
            auto: None,
        }
    }

    #[test]
    fn test_undiscovered_combination_hidden() {
        let rendered = render_resources(&catalog(), &[ResourceId::from("ash")]);
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[0].starts_with(" [ ] ember"));
        assert!(lines[0].ends_with("??"));
        assert!(lines[1].starts_with("*[x] ash"));
        assert!(lines[1].ends_with("fire"));
    }

    #[test]
    fn test_status_with_running_timer() {
        let view = GatherView {
            target: Some(ResourceId::from("ember")),
            selected: vec![ElementId::from("fire"), ElementId::from("fire")],
            progress: 51,
            running: true,
            timer: TimerState::Accumulating {
                resource: ResourceId::from("ember"),
            },
            ..idle_view()
        };
        let rendered = render_status(&view, &catalog(), &GatherTiming::default());
        assert!(rendered.contains("Resource: Ember"));
        assert!(rendered.contains("Selected: fire + fire"));
        assert!(rendered.contains("51%"));
        assert!(rendered.contains("1.7s"));
        assert!(rendered.contains("Auto-gather: stopped (set: empty)"));
    }

    #[test]
    fn test_config_rendering() {
        let rendered = render_config(&AppConfig::default());
        assert!(rendered.contains("Character:      player"));
        assert!(rendered.contains("Discoveries:    local"));
        assert!(rendered.contains("(34 ticks per run)"));
        assert!(rendered.contains("on failure Skip"));
    }

    #[tokio::test]
    async fn test_status_counts_down_with_configured_timing() {
        let timing = GatherTiming {
            tick_interval_ms: 10_000,
            ..GatherTiming::default()
        };
        let controller =
            GatherSessionController::new(catalog(), CharacterId::from("tester"), timing.clone());
        let (handle, _task) =
            GatherService::spawn(controller, Arc::new(LocalDiscoveryGateway::new()));

        select(&handle, "ember", &timing).await.unwrap();
        handle.add_element("fire").await.unwrap();
        handle.add_element("fire").await.unwrap();

        let report = status_report(&handle, &timing).await.unwrap();
        assert!(report.contains("340.0s"), "{report}");
        assert!(!report.contains("3.4s"));

        select(&handle, "ember", &timing).await.unwrap();
        let report = status_report(&handle, &timing).await.unwrap();
        assert!(report.starts_with("No resource selected"));
        handle.shutdown().await.unwrap();
    }

    #[test]
    fn test_status_without_target() {
        let rendered = render_status(&idle_view(), &catalog(), &GatherTiming::default());
        assert!(rendered.starts_with("No resource selected"));
    }
}
