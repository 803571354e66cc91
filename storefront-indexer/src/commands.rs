//! Command execution.
//!
//! Each command resolves the index it acts on through the catalog, so an unknown
//! index always surfaces as [`IndexingError::IndexNotResolved`].

use chrono::SecondsFormat;
use storefront_indexer_repository::{CatalogSnapshot, IndexCriterion};
use storefront_indexer_shared::IndexVersion;
use tracing::{info, instrument, warn};

use crate::cli::{Command, ImportArgs};
use crate::config::Dependencies;
use crate::IndexingError;

/// Run one CLI command against the wired dependencies.
#[instrument(skip(deps))]
pub async fn run(command: Command, deps: &Dependencies) -> Result<(), IndexingError> {
    match command {
        Command::Info => {
            let snapshot = deps.catalog.snapshot().await?;
            println!("{}", render_snapshot(&snapshot));
        }
        Command::CreateIndex => {
            let version = deps.lifecycle.create_next_index_and_apply_mappings().await?;
            info!(index = %version.name, "Index created with mappings");
        }
        Command::DeleteIndex(args) => {
            let version = resolve(deps, &args.criterion()).await?;
            deps.lifecycle
                .delete_index(&IndexCriterion::Name(version.name.clone()))
                .await
                .map_err(IndexingError::resolution)?;
            info!(index = %version.name, "Index deleted");
        }
        Command::DeleteAllIndices => {
            let deleted = deps.lifecycle.delete_all_indices().await?;
            info!(count = deleted.len(), indices = ?deleted, "All indices deleted");
        }
        Command::Reindex(args) => {
            let outcome = deps.reindex.reindex(args.explicit()).await?;
            info!(
                source = %outcome.source.name,
                destination = %outcome.destination.name,
                task_id = %outcome.task.task_id,
                "Reindex started; follow it with `task {}`",
                outcome.task.task_id
            );
        }
        Command::UpdateMappings(args) => {
            let version = resolve(deps, &args.criterion()).await?;
            deps.lifecycle.put_mappings(&version.name).await?;
            info!(index = %version.name, "Mappings updated");
        }
        Command::SelectIndex(args) => {
            let version = deps
                .catalog
                .select(&args.criterion())
                .await
                .map_err(IndexingError::resolution)?;
            info!(index = %version.name, id = version.id, "Index selected");
        }
        Command::AliasIndex(args) => {
            let version = resolve(deps, &args.criterion()).await?;
            deps.lifecycle.set_alias(&version.name).await?;
            info!(index = %version.name, alias = %deps.catalog.config().alias, "Alias set");
        }
        Command::Task { task_id } => {
            let status = deps.reindex.task_status(&task_id).await?;
            println!(
                "task {}: {} (total {}, created {}, updated {}, failures {})",
                status.task_id,
                if status.completed { "completed" } else { "running" },
                count(status.total),
                count(status.created),
                count(status.updated),
                status.failures
            );
        }
        Command::Import(args) => import(deps, &args).await?,
    }
    Ok(())
}

async fn resolve(
    deps: &Dependencies,
    criterion: &IndexCriterion,
) -> Result<IndexVersion, IndexingError> {
    deps.catalog
        .resolve(criterion)
        .await
        .map_err(IndexingError::resolution)
}

async fn import(deps: &Dependencies, args: &ImportArgs) -> Result<(), IndexingError> {
    let version = resolve(deps, &args.index.criterion()).await?;
    let entity_types = args.target.entity_types(&args.cms);
    let source = deps.document_source(args.target.source_system()).await?;

    let reports = deps
        .importer
        .import_sequence(&entity_types, source.as_ref(), &version.name, &args.options())
        .await?;

    for report in reports {
        if report.records_written == 0 {
            warn!(entity_type = %report.entity_type, "Nothing imported");
        }
        info!(
            entity_type = %report.entity_type,
            index = %version.name,
            pages = report.pages_fetched,
            documents = report.documents_fetched,
            records = report.records_written,
            "Imported"
        );
    }
    Ok(())
}

fn count(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Text shown by `info`.
pub fn render_snapshot(snapshot: &CatalogSnapshot) -> String {
    if snapshot.indices.is_empty() {
        return "No index created yet.".to_string();
    }

    let mut lines = Vec::with_capacity(snapshot.indices.len() + 4);
    for version in &snapshot.indices {
        let mut markers = Vec::new();
        if snapshot.latest.as_ref() == Some(version) {
            markers.push("latest");
        }
        if snapshot.aliased.as_ref() == Some(version) {
            markers.push("aliased");
        }
        if snapshot.selected.as_ref().map(|s| &s.name) == Some(&version.name) {
            markers.push("selected");
        }
        let created = version
            .created_at
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| "-".to_string());
        lines.push(format!(
            "{:<40} {:>6}  {:<20}  {}",
            version.name,
            version.id,
            created,
            markers.join(", ")
        ));
    }

    lines.push(String::new());
    match &snapshot.aliased {
        Some(aliased) => lines.push(format!(
            "Alias '{}' -> {} (version {})",
            snapshot.alias, aliased.name, aliased.id
        )),
        None => lines.push(format!(
            "No index holds alias '{}'. Use alias-index to set one.",
            snapshot.alias
        )),
    }
    match &snapshot.selected {
        Some(selected) => lines.push(format!("Selected index version: {}", selected.id)),
        None => lines.push("No index selected.".to_string()),
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_empty_snapshot() {
        let snapshot = CatalogSnapshot {
            alias: "shop".into(),
            indices: vec![],
            latest: None,
            aliased: None,
            selected: None,
        };
        assert_eq!(render_snapshot(&snapshot), "No index created yet.");
    }

    #[test]
    fn test_render_snapshot_markers() {
        let v1 = IndexVersion::new("shop", 1);
        let v2 = IndexVersion::new("shop", 2);
        let snapshot = CatalogSnapshot {
            alias: "shop".into(),
            indices: vec![v1.clone(), v2.clone()],
            latest: Some(v2.clone()),
            aliased: Some(v1.clone()),
            selected: Some(v2),
        };

        let text = render_snapshot(&snapshot);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("shop_1") && lines[0].ends_with("aliased"));
        assert!(lines[1].ends_with("latest, selected"));
        assert!(text.contains("Alias 'shop' -> shop_1 (version 1)"));
        assert!(text.contains("Selected index version: 2"));
    }
}
