use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Connection settings for the Fiscaliza (Redmine) server.
///
/// Credentials may be left empty in the file; the CLI prompts for whatever
/// is missing before the first request.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FiscalizaConfig {
    #[serde(default = "default_fiscaliza_url")]
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Default for FiscalizaConfig {
    fn default() -> Self {
        Self {
            url: default_fiscaliza_url(),
            username: String::new(),
            password: String::new(),
        }
    }
}

/// Everything that selects which projects, trackers and fields get pulled.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractConfig {
    /// Project holding the shared instrument registry, split out from the
    /// regular equipment projects.
    #[serde(default = "default_general_register_project")]
    pub general_register_project: String,
    /// Substring a project name must contain to be extracted at all.
    #[serde(default = "default_project_keyword")]
    pub project_keyword: String,
    /// Project ids excluded even when their name matches the keyword.
    #[serde(default = "default_skip_project_ids")]
    pub skip_project_ids: Vec<u64>,
    /// Tracker names that get their own sheet in the general register pass.
    #[serde(default = "default_general_register_trackers")]
    pub general_register_trackers: Vec<String>,
    /// Tracker id the equipment pass filters on server side.
    #[serde(default = "default_equipment_tracker_id")]
    pub equipment_tracker_id: u64,
    /// Single-page fetch ceiling; counts at this value are reported as
    /// possible truncation.
    #[serde(default = "default_issue_limit")]
    pub issue_limit: u64,
    /// Custom-field id of the calibration date, as it appears in journals.
    #[serde(default = "default_cal_date_field_id")]
    pub cal_date_field_id: String,
    /// Custom-field id of the calibration certificate number.
    #[serde(default = "default_cal_cert_field_id")]
    pub cal_cert_field_id: String,
    /// Caps how many equipment projects are visited. Unset means all.
    #[serde(default)]
    pub max_projects: Option<usize>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            general_register_project: default_general_register_project(),
            project_keyword: default_project_keyword(),
            skip_project_ids: default_skip_project_ids(),
            general_register_trackers: default_general_register_trackers(),
            equipment_tracker_id: default_equipment_tracker_id(),
            issue_limit: default_issue_limit(),
            cal_date_field_id: default_cal_date_field_id(),
            cal_cert_field_id: default_cal_cert_field_id(),
            max_projects: None,
        }
    }
}

/// Where the workbook lands and how its file name ends.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
    #[serde(default = "default_filename_suffix")]
    pub filename_suffix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            filename_suffix: default_filename_suffix(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub fiscaliza: FiscalizaConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Expands a leading `~` to the current user's home directory.
pub fn expand_path(path: &str) -> String {
    if path == "~" {
        if let Some(home) = std::env::var_os("HOME") {
            return home.to_string_lossy().to_string();
        }
    }
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{}", home.to_string_lossy(), stripped);
        }
    }
    path.to_string()
}

fn home_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".fidex").join("config.toml"))
}

fn repo_default_config_path() -> PathBuf {
    PathBuf::from("config").join("fidex.toml")
}

fn resolve_config_path_with_overrides(
    raw_path: Option<PathBuf>,
    env_keys: &[&str],
    home_path: Option<PathBuf>,
    repo_default: PathBuf,
) -> PathBuf {
    if let Some(path) = raw_path {
        return path;
    }

    for key in env_keys {
        if let Ok(value) = std::env::var(key) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return PathBuf::from(trimmed);
            }
        }
    }

    if let Some(home) = home_path {
        if home.exists() {
            return home;
        }
        if repo_default.exists() {
            return repo_default;
        }
        return home;
    }

    repo_default
}

/// Resolution order: explicit path, then `FIDEX_CONFIG`, then
/// `~/.fidex/config.toml`, then the repo-level `config/fidex.toml`.
pub fn resolve_config_path(raw_path: Option<PathBuf>) -> PathBuf {
    resolve_config_path_with_overrides(
        raw_path,
        &["FIDEX_CONFIG"],
        home_config_path(),
        repo_default_config_path(),
    )
}

fn normalize_config(mut cfg: AppConfig) -> AppConfig {
    cfg.output.dir = expand_path(&cfg.output.dir);
    cfg
}

/// Built-in defaults, with the same path expansion a loaded file gets.
pub fn default_config() -> AppConfig {
    normalize_config(AppConfig::default())
}

pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read config {}", path.as_ref().display()))?;
    let cfg: AppConfig = toml::from_str(&content).context("failed to parse TOML config")?;
    Ok(normalize_config(cfg))
}

fn default_fiscaliza_url() -> String {
    "https://sistemas.anatel.gov.br/fiscaliza".to_string()
}

fn default_general_register_project() -> String {
    "Cadastro-Instrumentos".to_string()
}

fn default_project_keyword() -> String {
    "Instrumentos".to_string()
}

fn default_skip_project_ids() -> Vec<u64> {
    let mut ids = vec![94, 123];
    ids.extend(98..=122);
    ids
}

fn default_general_register_trackers() -> Vec<String> {
    vec![
        "Categoria de instrumento".to_string(),
        "Tipo de instrumento".to_string(),
        "Marca e Modelo".to_string(),
        "Tipo de Acessório".to_string(),
    ]
}

fn default_equipment_tracker_id() -> u64 {
    20
}

fn default_issue_limit() -> u64 {
    1500
}

fn default_cal_date_field_id() -> String {
    "581".to_string()
}

fn default_cal_cert_field_id() -> String {
    "583".to_string()
}

fn default_output_dir() -> String {
    "~".to_string()
}

fn default_filename_suffix() -> String {
    "instrumentos_anatel".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp_config(contents: &str, label: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock before unix epoch")
            .subsec_nanos();
        let path = std::env::temp_dir().join(format!(
            "fidex-config-{}-{}-{}.toml",
            label,
            std::process::id(),
            nanos
        ));
        std::fs::write(&path, contents).expect("write temp config");
        path
    }

    #[test]
    fn empty_file_yields_defaults() {
        let path = write_temp_config("", "defaults");
        let cfg = load_config(&path).expect("load empty config");
        std::fs::remove_file(&path).ok();

        assert_eq!(cfg.fiscaliza.url, "https://sistemas.anatel.gov.br/fiscaliza");
        assert!(cfg.fiscaliza.username.is_empty());
        assert_eq!(cfg.extract.general_register_project, "Cadastro-Instrumentos");
        assert_eq!(cfg.extract.project_keyword, "Instrumentos");
        assert_eq!(cfg.extract.equipment_tracker_id, 20);
        assert_eq!(cfg.extract.issue_limit, 1500);
        assert_eq!(cfg.extract.cal_date_field_id, "581");
        assert_eq!(cfg.extract.cal_cert_field_id, "583");
        assert_eq!(cfg.extract.max_projects, None);
        assert_eq!(cfg.extract.general_register_trackers.len(), 4);
        assert_eq!(cfg.output.filename_suffix, "instrumentos_anatel");
    }

    #[test]
    fn skip_list_covers_the_excluded_range() {
        let ids = default_skip_project_ids();
        assert_eq!(ids.len(), 27);
        assert!(ids.contains(&94));
        assert!(ids.contains(&123));
        assert!(ids.contains(&98));
        assert!(ids.contains(&122));
        assert!(!ids.contains(&97));
    }

    #[test]
    fn overrides_replace_defaults() {
        let path = write_temp_config(
            r#"
[fiscaliza]
url = "http://127.0.0.1:9999"
username = "svc"
password = "secret"

[extract]
issue_limit = 50
max_projects = 3

[output]
dir = "/tmp/fidex-out"
filename_suffix = "inventario"
"#,
            "overrides",
        );
        let cfg = load_config(&path).expect("load override config");
        std::fs::remove_file(&path).ok();

        assert_eq!(cfg.fiscaliza.url, "http://127.0.0.1:9999");
        assert_eq!(cfg.fiscaliza.username, "svc");
        assert_eq!(cfg.extract.issue_limit, 50);
        assert_eq!(cfg.extract.max_projects, Some(3));
        assert_eq!(cfg.output.dir, "/tmp/fidex-out");
        assert_eq!(cfg.output.filename_suffix, "inventario");
        // untouched sections keep their defaults
        assert_eq!(cfg.extract.equipment_tracker_id, 20);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let path = write_temp_config(
            r#"
[extract]
tracker_limit = 10
"#,
            "unknown-field",
        );
        let err = load_config(&path).expect_err("unknown field should fail");
        std::fs::remove_file(&path).ok();

        let msg = format!("{err:#}");
        assert!(msg.contains("unknown field `tracker_limit`"), "got: {msg}");
    }

    #[test]
    fn load_config_errors_when_path_missing() {
        let missing = std::env::temp_dir().join("fidex-config-definitely-missing.toml");
        let err = load_config(&missing).expect_err("missing file should fail");
        assert!(format!("{err:#}").contains("failed to read config"));
    }

    #[test]
    fn output_dir_tilde_is_expanded() {
        let path = write_temp_config(
            r#"
[output]
dir = "~/fidex-exports"
"#,
            "tilde",
        );
        let cfg = load_config(&path).expect("load tilde config");
        std::fs::remove_file(&path).ok();

        assert!(!cfg.output.dir.starts_with('~'));
        assert!(cfg.output.dir.ends_with("/fidex-exports"));
    }

    #[test]
    fn default_output_dir_expands_to_home() {
        let cfg = default_config();
        assert!(!cfg.output.dir.starts_with('~'));
        assert!(!cfg.output.dir.is_empty());
    }

    #[test]
    fn explicit_path_wins_over_everything() {
        let resolved = resolve_config_path_with_overrides(
            Some(PathBuf::from("/explicit/fidex.toml")),
            &["FIDEX_TEST_CONFIG_UNSET"],
            Some(PathBuf::from("/home/none/.fidex/config.toml")),
            PathBuf::from("config/fidex.toml"),
        );
        assert_eq!(resolved, PathBuf::from("/explicit/fidex.toml"));
    }

    #[test]
    fn env_var_wins_when_no_explicit_path() {
        std::env::set_var("FIDEX_TEST_CONFIG_ENV", "/from-env/fidex.toml");
        let resolved = resolve_config_path_with_overrides(
            None,
            &["FIDEX_TEST_CONFIG_ENV"],
            Some(PathBuf::from("/home/none/.fidex/config.toml")),
            PathBuf::from("config/fidex.toml"),
        );
        std::env::remove_var("FIDEX_TEST_CONFIG_ENV");
        assert_eq!(resolved, PathBuf::from("/from-env/fidex.toml"));
    }

    #[test]
    fn blank_env_var_is_ignored() {
        std::env::set_var("FIDEX_TEST_CONFIG_BLANK", "   ");
        let resolved = resolve_config_path_with_overrides(
            None,
            &["FIDEX_TEST_CONFIG_BLANK"],
            None,
            PathBuf::from("config/fidex.toml"),
        );
        std::env::remove_var("FIDEX_TEST_CONFIG_BLANK");
        assert_eq!(resolved, PathBuf::from("config/fidex.toml"));
    }

    #[test]
    fn missing_home_file_falls_back_to_repo_default() {
        let dir = std::env::temp_dir().join(format!(
            "fidex-config-resolve-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock before unix epoch")
                .subsec_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let repo_default = dir.join("fidex.toml");
        std::fs::write(&repo_default, "").expect("write repo default");

        let resolved = resolve_config_path_with_overrides(
            None,
            &["FIDEX_TEST_CONFIG_UNSET"],
            Some(dir.join("absent").join("config.toml")),
            repo_default.clone(),
        );
        assert_eq!(resolved, repo_default);

        std::fs::remove_file(&repo_default).ok();
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn home_path_is_last_resort_even_when_missing() {
        let home = PathBuf::from("/definitely/absent/.fidex/config.toml");
        let resolved = resolve_config_path_with_overrides(
            None,
            &["FIDEX_TEST_CONFIG_UNSET"],
            Some(home.clone()),
            PathBuf::from("/also/absent/fidex.toml"),
        );
        assert_eq!(resolved, home);
    }
}
