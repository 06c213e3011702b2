use anyhow::{Context, Result};
use fidex_client::{FiscalizaClient, IssueQuery};
use fidex_config::ExtractConfig;
use fidex_core::model::{NormalizedRow, Project, RawIssue};
use fidex_core::normalize::{normalize_issue, FieldRegistry, HistoryFields};
use tracing::{debug, info, warn};

/// Project split produced by discovery: the general-register project, when
/// present, and every other keyword-matching project.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub general_register: Option<Project>,
    pub equipment: Vec<Project>,
}

/// One sheet's worth of rows.
#[derive(Debug, Clone, Default)]
pub struct RowTable {
    pub name: String,
    pub rows: Vec<NormalizedRow>,
}

/// Per-tracker row tables in configured order; that order drives sheet
/// order on export.
#[derive(Debug, Clone, Default)]
pub struct TrackerTables {
    tables: Vec<RowTable>,
}

impl TrackerTables {
    pub fn with_trackers(names: &[String]) -> Self {
        Self {
            tables: names
                .iter()
                .map(|name| RowTable {
                    name: name.clone(),
                    rows: Vec::new(),
                })
                .collect(),
        }
    }

    /// Appends a row to the named tracker's table. Returns false when no
    /// table exists for that tracker.
    pub fn push(&mut self, tracker: &str, row: NormalizedRow) -> bool {
        match self.tables.iter_mut().find(|table| table.name == tracker) {
            Some(table) => {
                table.rows.push(row);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RowTable> {
        self.tables.iter()
    }

    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|table| table.rows.len()).sum()
    }
}

/// Fetches the project list and splits it for the two passes.
pub async fn discover_projects(
    client: &FiscalizaClient,
    cfg: &ExtractConfig,
) -> Result<Discovery> {
    info!("fetching projects...");
    let projects = client
        .fetch_projects(cfg.issue_limit)
        .await
        .context("failed to fetch the project list")?;
    Ok(split_projects(projects, cfg))
}

/// Keeps projects whose name carries the keyword and whose id is not
/// excluded, then pulls the general-register project out of that set.
pub fn split_projects(projects: Vec<Project>, cfg: &ExtractConfig) -> Discovery {
    let mut equipment: Vec<Project> = projects
        .into_iter()
        .filter(|project| {
            project.name.contains(&cfg.project_keyword)
                && !cfg.skip_project_ids.contains(&project.id)
        })
        .collect();

    debug!(
        "matched projects: {}",
        equipment
            .iter()
            .map(|project| format!("{} (ID {})", project.name, project.id))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let general_register = equipment
        .iter()
        .position(|project| project.name == cfg.general_register_project)
        .map(|index| equipment.remove(index));

    Discovery {
        general_register,
        equipment,
    }
}

fn history_fields(cfg: &ExtractConfig) -> HistoryFields {
    HistoryFields {
        cal_date_field_id: cfg.cal_date_field_id.clone(),
        cal_cert_field_id: cfg.cal_cert_field_id.clone(),
    }
}

async fn fetch_project_issues(
    client: &FiscalizaClient,
    cfg: &ExtractConfig,
    project: &Project,
    tracker_id: Option<u64>,
    include_journals: bool,
) -> Result<Vec<RawIssue>> {
    info!(
        "fetching issues for project '{}' (ID {})...",
        project.name, project.id
    );
    let issues = client
        .fetch_issues(&IssueQuery {
            project_id: project.id,
            tracker_id,
            include_journals,
            limit: cfg.issue_limit,
        })
        .await
        .with_context(|| {
            format!(
                "failed to fetch issues for project '{}' (ID {})",
                project.name, project.id
            )
        })?;

    info!(
        "found {} issues in project '{}' (ID {})",
        issues.len(),
        project.name,
        project.id
    );
    if issues.len() as u64 >= cfg.issue_limit {
        warn!(
            "issue count reached the {} limit; results may be truncated",
            cfg.issue_limit
        );
    }

    Ok(issues)
}

/// Walks the general-register project and files each issue into the table
/// matching its tracker. Journals are not requested here; the registry
/// sheets carry no calibration history.
pub async fn general_register_pass(
    client: &FiscalizaClient,
    cfg: &ExtractConfig,
    project: &Project,
    tables: &mut TrackerTables,
    registry: &mut FieldRegistry,
) -> Result<()> {
    let issues = fetch_project_issues(client, cfg, project, None, false).await?;
    let fields = history_fields(cfg);

    let mut processed = 0usize;
    let mut skipped = 0usize;
    for issue in &issues {
        let row = normalize_issue(issue, &fields, registry);
        if tables.push(&issue.tracker.name, row) {
            processed += 1;
        } else {
            debug!(
                "tracker '{}' has no general register table; skipping issue {}",
                issue.tracker.name, issue.id
            );
            skipped += 1;
        }
    }

    info!("processed {processed} issues, skipped {skipped} from the general register");
    Ok(())
}

/// Walks every equipment project, filtered to the equipment tracker with
/// journals included, and collects all rows into one table.
pub async fn equipment_pass(
    client: &FiscalizaClient,
    cfg: &ExtractConfig,
    projects: &[Project],
    registry: &mut FieldRegistry,
) -> Result<Vec<NormalizedRow>> {
    let fields = history_fields(cfg);
    let mut rows = Vec::new();

    for (index, project) in projects.iter().enumerate() {
        if let Some(max) = cfg.max_projects {
            if index >= max {
                info!("project limit {max} reached; skipping the remaining projects");
                break;
            }
        }

        let issues =
            fetch_project_issues(client, cfg, project, Some(cfg.equipment_tracker_id), true)
                .await?;
        info!(
            "processing issues for project '{}' (ID {})...",
            project.name, project.id
        );
        for issue in &issues {
            rows.push(normalize_issue(issue, &fields, registry));
        }
    }

    Ok(rows)
}
