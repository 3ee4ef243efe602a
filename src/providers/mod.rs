use crate::error::AppError;
use crate::models::{Project, UsageMap, UsageRecord, UsageWindow};
use async_trait::async_trait;
use tracing::{info, warn};

pub mod equinix;

/// Upstream billing API: the project list and per-project usage lines.
#[async_trait]
pub trait UsageSource {
    fn name(&self) -> &'static str;

    async fn list_projects(&self) -> Result<Vec<Project>, AppError>;

    async fn project_usages(
        &self,
        project: &Project,
        window: &UsageWindow,
    ) -> Result<Vec<UsageRecord>, AppError>;
}

/// Fetches every project's usage in `window`, one project at a time.
/// The first failing project aborts the whole fetch.
pub async fn fetch_usages(
    source: &(dyn UsageSource + Send + Sync),
    window: &UsageWindow,
    projects: &[Project],
) -> Result<UsageMap, AppError> {
    let mut usages = UsageMap::new();

    for project in projects {
        let records = source.project_usages(project, window).await?;
        info!(
            source = source.name(),
            project = %project.name,
            records = records.len(),
            "fetched usage"
        );

        match usages.get_mut(&project.name) {
            Some(existing) => {
                warn!(project = %project.name, id = %project.id, "duplicate project name, merging usage");
                existing.extend(records);
            }
            None => {
                usages.insert(project.name.clone(), records);
            }
        }
    }

    Ok(usages)
}
