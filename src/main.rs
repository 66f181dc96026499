use clap::{Parser, Subcommand};
use dialoguer::console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{FuzzySelect, Input, Select};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::io;
use std::io::IsTerminal;
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use thiserror::Error;

const ROOT_ENV: &str = "FORGE_ROOT";
const LEGACY_ROOT_ENV: &str = "AIDEV_ROOT";
const CONFIG_DIR_ENV: &str = "FORGE_CONFIG_DIR";
const LEGACY_CONFIG_DIR_ENV: &str = "AIDEV_CONFIG_DIR";
const XDG_CONFIG_HOME_ENV: &str = "XDG_CONFIG_HOME";
const APP_NAME: &str = "forge";
const LEGACY_APP_NAME: &str = "aidev";

const BANNER: &str = r#"  __
 / _| ___  _ __ __ _  ___
| |_ / _ \| '__/ _` |/ _ \
|  _| (_) | | | (_| |  __/
|_|  \___/|_|  \__, |\___|
               |___/"#;

#[derive(Parser, Debug)]
#[command(
    name = "forge",
    version,
    about = "Pick a project directory and hand the terminal to an AI coding assistant",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Root directory to scan (overrides the saved default)
    #[arg(long)]
    root: Option<String>,
    /// Root directory to scan (positional alternative to --root)
    dir: Option<String>,
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show or edit the persisted configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommand>,
    },
    /// Show or set the default root (shorthand for the config subcommands)
    Root {
        #[command(subcommand)]
        command: Option<RootCommand>,
    },
    /// Print version information
    Version,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Show the config file path, the saved root, and the launch commands
    Show,
    /// Print the config file path
    Path,
    /// Set the default root (interactive when no directory is given)
    SetRoot { dir: Option<String> },
}

#[derive(Subcommand, Debug)]
enum RootCommand {
    /// Set the default root (interactive when no directory is given)
    Set { dir: Option<String> },
}

#[derive(Debug, Error)]
enum ForgeError {
    #[error("root does not exist: {}", .path.display())]
    RootNotFound { path: PathBuf },
    #[error("root is not a directory: {}", .path.display())]
    RootNotDirectory { path: PathBuf },
    #[error("unable to determine the home directory; set HOME and retry")]
    HomeDirUnavailable,
    #[error("no root configured; pass a directory (`forge <dir>`) or run `forge config set-root <dir>`")]
    NoRootConfigured,
    #[error("failed to enter working directory {}: {source}", .path.display())]
    WorkingDirectory { path: PathBuf, source: io::Error },
    #[error("command not found: {name}; make sure it is installed and on PATH")]
    CommandNotFound { name: String },
    #[error("failed to scan {}: {source}", .path.display())]
    Scan { path: PathBuf, source: io::Error },
    #[error("no project directories under {}", .path.display())]
    NoProjects { path: PathBuf },
    #[error("config error: {0}")]
    Config(String),
    #[error("process error: {0}")]
    Process(String),
    #[error("interactive selection requires a terminal; pass a directory or run `forge config set-root <dir>`")]
    Interaction,
    #[error("selection error: {0}")]
    Prompt(#[from] dialoguer::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Usage(String),
}

impl ForgeError {
    fn exit_code(&self) -> i32 {
        match self {
            ForgeError::Usage(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
struct Config {
    #[serde(default)]
    root: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    commands: Vec<CommandConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    projects: Vec<ProjectConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
struct CommandConfig {
    name: String,
    command: String,
    #[serde(default)]
    args: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
struct ProjectConfig {
    name: String,
    path: String,
}

impl Config {
    fn effective_commands(&self) -> Vec<CommandConfig> {
        if self.commands.is_empty() {
            return default_commands();
        }
        self.commands.clone()
    }
}

fn default_commands() -> Vec<CommandConfig> {
    vec![
        CommandConfig {
            name: "Claude Code".to_string(),
            command: "claude".to_string(),
            args: vec![String::new()],
        },
        CommandConfig {
            name: "Codex".to_string(),
            command: "codex".to_string(),
            args: vec![String::new()],
        },
    ]
}

#[derive(Debug, Serialize)]
struct JsonResult<T: Serialize> {
    ok: bool,
    result: Option<T>,
    error: Option<String>,
}

#[derive(Debug, Clone)]
struct Context {
    config_path: PathBuf,
    legacy_config_path: PathBuf,
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    let ctx = build_context(&cli);

    if let Err(err) = dispatch(cli, &ctx) {
        if ctx.json {
            let payload = JsonResult::<serde_json::Value> {
                ok: false,
                result: None,
                error: Some(err.to_string()),
            };
            if print_json(&payload).is_err() {
                eprintln!("{err}");
            }
        } else {
            eprintln!("{err}");
        }
        std::process::exit(err.exit_code());
    }
}

fn dispatch(cli: Cli, ctx: &Context) -> Result<(), ForgeError> {
    match cli.command {
        Some(Commands::Config { command }) => match command.unwrap_or(ConfigCommand::Show) {
            ConfigCommand::Show => handle_config_show(ctx),
            ConfigCommand::Path => handle_config_path(ctx),
            ConfigCommand::SetRoot { dir } => handle_set_root(ctx, dir.as_deref()),
        },
        Some(Commands::Root { command }) => match command {
            None => handle_config_show(ctx),
            Some(RootCommand::Set { dir }) => handle_set_root(ctx, dir.as_deref()),
        },
        Some(Commands::Version) => handle_version(ctx),
        None => handle_launch(ctx, cli.root.as_deref(), cli.dir.as_deref()),
    }
}

fn build_context(cli: &Cli) -> Context {
    Context {
        config_path: base_config_dir(CONFIG_DIR_ENV)
            .join(APP_NAME)
            .join("config.json"),
        legacy_config_path: base_config_dir(LEGACY_CONFIG_DIR_ENV)
            .join(LEGACY_APP_NAME)
            .join("config.json"),
        json: cli.json,
    }
}

fn base_config_dir(primary_env: &str) -> PathBuf {
    for key in [primary_env, XDG_CONFIG_HOME_ENV] {
        if let Ok(value) = env::var(key) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return PathBuf::from(trimmed);
            }
        }
    }
    home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config")
}

fn load_config(ctx: &Context) -> Result<(Config, bool), ForgeError> {
    match fs::read_to_string(&ctx.config_path) {
        Ok(data) => {
            let cfg: Config = serde_json::from_str(&data).map_err(|err| {
                ForgeError::Config(format!(
                    "failed to parse {}: {err}",
                    ctx.config_path.display()
                ))
            })?;
            Ok((cfg, true))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => load_legacy_config(ctx),
        Err(err) => Err(ForgeError::Config(format!(
            "failed to read {}: {err}",
            ctx.config_path.display()
        ))),
    }
}

// Legacy support is best-effort: any read or parse failure counts as
// "no legacy config".
fn load_legacy_config(ctx: &Context) -> Result<(Config, bool), ForgeError> {
    let Ok(data) = fs::read_to_string(&ctx.legacy_config_path) else {
        return Ok((Config::default(), false));
    };
    let Ok(cfg) = serde_json::from_str::<Config>(&data) else {
        return Ok((Config::default(), false));
    };
    if cfg.root.trim().is_empty() {
        return Ok((Config::default(), false));
    }
    // Forward-migrate to the current path; the legacy copy stays usable if
    // this fails.
    let _ = save_config(ctx, cfg.clone());
    Ok((cfg, true))
}

fn save_config(ctx: &Context, mut cfg: Config) -> Result<PathBuf, ForgeError> {
    if cfg.root.trim().is_empty() {
        return Err(ForgeError::Config("root must not be empty".to_string()));
    }
    // Fill in the built-in commands on first save so the user can see and
    // edit them.
    if cfg.commands.is_empty() {
        cfg.commands = default_commands();
    }

    let path = &ctx.config_path;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            ForgeError::Config(format!(
                "failed to create config directory {}: {err}",
                parent.display()
            ))
        })?;
    }

    let mut data = serde_json::to_string_pretty(&cfg)?;
    data.push('\n');

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &data).map_err(|err| {
        ForgeError::Config(format!("failed to write {}: {err}", tmp.display()))
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600));
    }
    if fs::rename(&tmp, path).is_err() {
        // Rename semantics differ across platforms; fall back to a plain
        // write of the target file.
        let _ = fs::remove_file(&tmp);
        fs::write(path, &data).map_err(|err| {
            ForgeError::Config(format!("failed to write {}: {err}", path.display()))
        })?;
    }
    Ok(path.clone())
}

// Root updates are read-modify-write: stored commands and project bookmarks
// survive. An unreadable config is replaced rather than leaving the user
// stuck with a broken file.
fn save_root(ctx: &Context, root: &str) -> Result<PathBuf, ForgeError> {
    let trimmed = root.trim();
    if trimmed.is_empty() {
        return Err(ForgeError::Config("root must not be empty".to_string()));
    }
    let (mut cfg, _) = load_config(ctx).unwrap_or((Config::default(), false));
    cfg.root = trimmed.to_string();
    save_config(ctx, cfg)
}

fn expand_tilde(path: &str) -> Result<String, ForgeError> {
    if path == "~" {
        let home = home_dir().ok_or(ForgeError::HomeDirUnavailable)?;
        return Ok(home.to_string_lossy().to_string());
    }
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        let home = home_dir().ok_or(ForgeError::HomeDirUnavailable)?;
        return Ok(home.join(rest).to_string_lossy().to_string());
    }
    Ok(path.to_string())
}

// Lexical cleaning of `.`/`..` segments; no symlink resolution.
fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let ends_with_name = matches!(
                    cleaned.components().next_back(),
                    Some(Component::Normal(_))
                );
                let at_root = matches!(
                    cleaned.components().next_back(),
                    Some(Component::RootDir) | Some(Component::Prefix(_))
                );
                if ends_with_name {
                    cleaned.pop();
                } else if !at_root {
                    cleaned.push("..");
                }
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    if cleaned.as_os_str().is_empty() {
        return PathBuf::from(".");
    }
    cleaned
}

fn normalize_root(input: &str) -> Result<PathBuf, ForgeError> {
    let expanded = expand_tilde(input.trim())?;
    let candidate = PathBuf::from(expanded);
    let absolute = if candidate.is_absolute() {
        clean_path(&candidate)
    } else {
        clean_path(&env::current_dir()?.join(candidate))
    };
    match fs::metadata(&absolute) {
        Ok(meta) if meta.is_dir() => Ok(absolute),
        Ok(_) => Err(ForgeError::RootNotDirectory { path: absolute }),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(ForgeError::RootNotFound { path: absolute })
        }
        Err(err) => Err(ForgeError::Io(err)),
    }
}

fn detect_default_root() -> String {
    detect_default_root_from(home_dir())
}

fn detect_default_root_from(home: Option<PathBuf>) -> String {
    let Some(home) = home else {
        return ".".to_string();
    };
    for name in ["Projects", "IdeaProjects"] {
        let candidate = home.join(name);
        if candidate.is_dir() {
            return candidate.to_string_lossy().to_string();
        }
    }
    ".".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ScannedDir {
    name: String,
    path: PathBuf,
}

fn default_ignore_names() -> BTreeSet<String> {
    ["node_modules", "target", "dist", "vendor"]
        .iter()
        .map(|name| name.to_string())
        .collect()
}

fn list_child_dirs(root: &Path, ignore: &BTreeSet<String>) -> Result<Vec<ScannedDir>, ForgeError> {
    let entries = fs::read_dir(root).map_err(|source| ForgeError::Scan {
        path: root.to_path_buf(),
        source,
    })?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ForgeError::Scan {
            path: root.to_path_buf(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || ignore.contains(&name) {
            continue;
        }
        let file_type = entry.file_type().map_err(|source| ForgeError::Scan {
            path: root.to_path_buf(),
            source,
        })?;
        let is_dir = if file_type.is_dir() {
            true
        } else if file_type.is_symlink() {
            // A symlink pointing at a directory counts as a project.
            fs::metadata(entry.path())
                .map(|meta| meta.is_dir())
                .unwrap_or(false)
        } else {
            false
        };
        if !is_dir {
            continue;
        }
        dirs.push(ScannedDir {
            name,
            path: entry.path(),
        });
    }

    dirs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(dirs)
}

fn prompt_cancelled(err: &dialoguer::Error) -> bool {
    match err {
        dialoguer::Error::IO(io_err) => io_err.kind() == io::ErrorKind::Interrupted,
    }
}

fn select_index(
    theme: &ColorfulTheme,
    prompt: &str,
    items: &[String],
) -> Result<Option<usize>, ForgeError> {
    match Select::with_theme(theme)
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact_opt()
    {
        Ok(selection) => Ok(selection),
        Err(err) if prompt_cancelled(&err) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn fuzzy_select_index(
    theme: &ColorfulTheme,
    prompt: &str,
    items: &[String],
) -> Result<Option<usize>, ForgeError> {
    match FuzzySelect::with_theme(theme)
        .with_prompt(prompt)
        .items(items)
        .interact_opt()
    {
        Ok(selection) => Ok(selection),
        Err(err) if prompt_cancelled(&err) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[derive(Debug, Clone)]
enum WorkspaceChoice {
    CurrentDir(PathBuf),
    Project(ProjectConfig),
    BrowseRoot,
    NewRoot,
}

fn select_workspace(
    theme: &ColorfulTheme,
    saved_root: &str,
    projects: &[ProjectConfig],
) -> Result<Option<WorkspaceChoice>, ForgeError> {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let mut items = Vec::new();
    let mut choices = Vec::new();
    items.push(format!("Current directory ({})", cwd.display()));
    choices.push(WorkspaceChoice::CurrentDir(cwd));
    for project in projects {
        items.push(format!("{} ({})", project.name, project.path));
        choices.push(WorkspaceChoice::Project(project.clone()));
    }
    if !saved_root.trim().is_empty() {
        items.push(format!("Browse the saved root ({saved_root})"));
        choices.push(WorkspaceChoice::BrowseRoot);
    }
    items.push("Choose a new root...".to_string());
    choices.push(WorkspaceChoice::NewRoot);

    Ok(select_index(theme, "Select a workspace", &items)?
        .map(|index| choices.swap_remove(index)))
}

fn select_directory(
    theme: &ColorfulTheme,
    dirs: &[ScannedDir],
) -> Result<Option<ScannedDir>, ForgeError> {
    let items: Vec<String> = dirs.iter().map(|dir| dir.name.clone()).collect();
    Ok(
        fuzzy_select_index(theme, "Select a project (type to filter)", &items)?
            .map(|index| dirs[index].clone()),
    )
}

fn command_label(command: &CommandConfig) -> String {
    let mut label = format!("{} ({}", command.name, command.command);
    for arg in &command.args {
        if !arg.is_empty() {
            label.push(' ');
            label.push_str(arg);
        }
    }
    label.push(')');
    label
}

fn select_command(
    theme: &ColorfulTheme,
    commands: &[CommandConfig],
) -> Result<Option<CommandConfig>, ForgeError> {
    let items: Vec<String> = commands.iter().map(command_label).collect();
    let Some(index) = select_index(theme, "Select a launch command", &items)? else {
        return Ok(None);
    };
    let command = commands[index].clone();
    eprintln!("{}", style(format!("launching {}", command.name)).green());
    eprintln!();
    Ok(Some(command))
}

#[derive(Debug, Clone)]
struct RootOption {
    label: String,
    value: String,
    manual: bool,
}

fn push_root_option(options: &mut Vec<RootOption>, label: String, value: &str) {
    if value.is_empty() || options.iter().any(|option| option.value == value) {
        return;
    }
    options.push(RootOption {
        label,
        value: value.to_string(),
        manual: false,
    });
}

fn build_root_options() -> (Vec<RootOption>, String) {
    let detected = detect_default_root();
    let default_input = if detected == "." {
        "~/Projects".to_string()
    } else {
        detected.clone()
    };

    let mut options = Vec::new();
    if detected != "." {
        push_root_option(&mut options, format!("Recommended: {detected}"), &detected);
    }
    if let Some(home) = home_dir() {
        for name in ["Projects", "IdeaProjects"] {
            let candidate = home.join(name);
            if candidate.is_dir() {
                push_root_option(
                    &mut options,
                    format!("~/{name}"),
                    &candidate.to_string_lossy(),
                );
            }
        }
    }
    push_root_option(&mut options, "Current directory (.)".to_string(), ".");
    options.push(RootOption {
        label: "Enter a path manually...".to_string(),
        value: String::new(),
        manual: true,
    });

    (options, default_input)
}

fn select_root(
    theme: &ColorfulTheme,
    prompt: &str,
    options: &[RootOption],
    default_input: &str,
) -> Result<Option<String>, ForgeError> {
    let items: Vec<String> = options.iter().map(|option| option.label.clone()).collect();
    let Some(index) = select_index(theme, prompt, &items)? else {
        return Ok(None);
    };
    let option = &options[index];
    if !option.manual {
        return Ok(Some(option.value.clone()));
    }
    match Input::<String>::with_theme(theme)
        .with_prompt("Root directory path")
        .default(default_input.to_string())
        .interact_text()
    {
        Ok(value) => {
            let value = value.trim().to_string();
            if value.is_empty() {
                Ok(None)
            } else {
                Ok(Some(value))
            }
        }
        Err(err) if prompt_cancelled(&err) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn echo_selected(label: &str, path: &Path) {
    eprintln!("{}", style(format!("✓ selected: {label}")).green().bold());
    eprintln!("{}", style(format!("  {}", path.display())).dim());
    eprintln!();
}

fn print_banner() {
    for line in BANNER.lines() {
        eprintln!("{}", style(line).cyan().bold());
    }
    eprintln!(
        "{}",
        style(format!(
            "forge v{} - hand your terminal to an AI coding assistant",
            env!("CARGO_PKG_VERSION")
        ))
        .dim()
    );
    eprintln!();
}

fn env_root_override() -> Option<String> {
    for key in [ROOT_ENV, LEGACY_ROOT_ENV] {
        if let Ok(value) = env::var(key) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

fn handle_launch(
    ctx: &Context,
    root_flag: Option<&str>,
    dir_arg: Option<&str>,
) -> Result<(), ForgeError> {
    print_banner();
    let theme = ColorfulTheme::default();

    let explicit = root_flag
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| dir_arg.map(str::trim).filter(|value| !value.is_empty()));
    if let Some(explicit) = explicit {
        return launch_with_explicit_root(ctx, &theme, explicit);
    }

    if let Some(env_root) = env_root_override() {
        let root = normalize_root(&env_root)?;
        return scan_and_launch(ctx, &theme, &root);
    }

    let (cfg, _) = match load_config(ctx) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("warning: {err}");
            (Config::default(), false)
        }
    };
    let saved_root = cfg.root.trim().to_string();
    let projects = cfg.projects.clone();

    if saved_root.is_empty() && projects.is_empty() {
        // First run: nothing saved yet.
        if !io::stdin().is_terminal() {
            return Err(ForgeError::NoRootConfigured);
        }
        let Some(root) =
            select_and_persist_root(ctx, &theme, "First run: choose a default root directory")?
        else {
            return Ok(());
        };
        return scan_and_launch(ctx, &theme, &root);
    }

    if !io::stdin().is_terminal() {
        return Err(ForgeError::Interaction);
    }
    let Some(choice) = select_workspace(&theme, &saved_root, &projects)? else {
        return Ok(());
    };

    match choice {
        WorkspaceChoice::CurrentDir(path) => {
            echo_selected("current directory", &path);
            pick_command_and_run(ctx, &theme, &path)
        }
        WorkspaceChoice::Project(project) => {
            let dir = normalize_root(&project.path)?;
            echo_selected(&project.name, &dir);
            pick_command_and_run(ctx, &theme, &dir)
        }
        WorkspaceChoice::BrowseRoot => match normalize_root(&saved_root) {
            Ok(root) => scan_and_launch(ctx, &theme, &root),
            Err(err) => {
                eprintln!("saved root is no longer valid: {err}");
                let Some(root) =
                    select_and_persist_root(ctx, &theme, "Choose a new root directory")?
                else {
                    return Ok(());
                };
                scan_and_launch(ctx, &theme, &root)
            }
        },
        WorkspaceChoice::NewRoot => {
            let Some(root) = select_and_persist_root(ctx, &theme, "Choose a new root directory")?
            else {
                return Ok(());
            };
            scan_and_launch(ctx, &theme, &root)
        }
    }
}

fn launch_with_explicit_root(
    ctx: &Context,
    theme: &ColorfulTheme,
    raw: &str,
) -> Result<(), ForgeError> {
    let root = match normalize_root(raw) {
        Ok(root) => root,
        Err(err) => return Err(ForgeError::Usage(format!("invalid root: {err}"))),
    };

    // First use with an explicit root saves it as the default, unless an
    // environment override is active or a root is already saved.
    if env_root_override().is_none() {
        let persist = match load_config(ctx) {
            Ok((cfg, exists)) => !exists || cfg.root.trim().is_empty(),
            Err(err) => {
                eprintln!("warning: {err}");
                true
            }
        };
        if persist {
            match save_root(ctx, &root.to_string_lossy()) {
                Ok(path) => eprintln!(
                    "saved default root: {} ({})",
                    root.display(),
                    path.display()
                ),
                Err(err) => eprintln!("warning: failed to save default root: {err}"),
            }
        }
    }

    scan_and_launch(ctx, theme, &root)
}

fn select_and_persist_root(
    ctx: &Context,
    theme: &ColorfulTheme,
    prompt: &str,
) -> Result<Option<PathBuf>, ForgeError> {
    if !io::stdin().is_terminal() {
        return Err(ForgeError::Interaction);
    }
    let (options, default_input) = build_root_options();
    loop {
        let Some(raw) = select_root(theme, prompt, &options, &default_input)? else {
            return Ok(None);
        };
        let root = match normalize_root(&raw) {
            Ok(root) => root,
            Err(err) => {
                eprintln!("invalid root: {err}");
                continue;
            }
        };
        match save_root(ctx, &root.to_string_lossy()) {
            Ok(path) => eprintln!(
                "saved default root: {} ({})",
                root.display(),
                path.display()
            ),
            Err(err) => eprintln!("warning: failed to save default root: {err}"),
        }
        return Ok(Some(root));
    }
}

fn scan_and_launch(ctx: &Context, theme: &ColorfulTheme, root: &Path) -> Result<(), ForgeError> {
    let dirs = list_child_dirs(root, &default_ignore_names())?;
    if dirs.is_empty() {
        return Err(ForgeError::NoProjects {
            path: root.to_path_buf(),
        });
    }
    if !io::stdin().is_terminal() {
        return Err(ForgeError::Interaction);
    }
    let Some(dir) = select_directory(theme, &dirs)? else {
        return Ok(());
    };
    echo_selected(&dir.name, &dir.path);
    pick_command_and_run(ctx, theme, &dir.path)
}

fn pick_command_and_run(
    ctx: &Context,
    theme: &ColorfulTheme,
    dir: &Path,
) -> Result<(), ForgeError> {
    let commands = match load_config(ctx) {
        Ok((cfg, _)) => cfg.effective_commands(),
        Err(_) => default_commands(),
    };
    let Some(command) = select_command(theme, &commands)? else {
        return Ok(());
    };

    let launcher = platform_launcher();
    let status = run_command(&command.command, &command.args, dir, launcher.as_ref())?;
    // Only the fallback launcher returns; mirror the child's exit status.
    std::process::exit(status);
}

trait ProcessLauncher {
    /// Hands control to the resolved executable. The replacing variant only
    /// returns on failure; the spawning variant waits for the child and
    /// yields its exit status.
    fn launch(&self, program: &Path, command: &str, args: &[String]) -> Result<i32, ForgeError>;
}

fn replacement_argv(command: &str, args: &[String]) -> Vec<String> {
    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push(command.to_string());
    argv.extend(args.iter().cloned());
    argv
}

#[cfg(unix)]
struct ReplaceLauncher;

#[cfg(unix)]
impl ProcessLauncher for ReplaceLauncher {
    fn launch(&self, program: &Path, command: &str, args: &[String]) -> Result<i32, ForgeError> {
        use std::os::unix::process::CommandExt;
        let argv = replacement_argv(command, args);
        let err = Command::new(program).arg0(&argv[0]).args(&argv[1..]).exec();
        // exec only returns on failure.
        Err(ForgeError::Process(format!(
            "failed to replace process with {}: {err}",
            program.display()
        )))
    }
}

// Selected at startup only on platforms without in-place replacement.
#[cfg_attr(unix, allow(dead_code))]
struct SpawnLauncher;

impl ProcessLauncher for SpawnLauncher {
    fn launch(&self, program: &Path, _command: &str, args: &[String]) -> Result<i32, ForgeError> {
        let status = Command::new(program).args(args).status().map_err(|err| {
            ForgeError::Process(format!("failed to run {}: {err}", program.display()))
        })?;
        Ok(status.code().unwrap_or(1))
    }
}

fn platform_launcher() -> Box<dyn ProcessLauncher> {
    #[cfg(unix)]
    {
        Box::new(ReplaceLauncher)
    }
    #[cfg(not(unix))]
    {
        Box::new(SpawnLauncher)
    }
}

fn run_command(
    command: &str,
    args: &[String],
    work_dir: &Path,
    launcher: &dyn ProcessLauncher,
) -> Result<i32, ForgeError> {
    env::set_current_dir(work_dir).map_err(|source| ForgeError::WorkingDirectory {
        path: work_dir.to_path_buf(),
        source,
    })?;
    let program = which::which(command).map_err(|_| ForgeError::CommandNotFound {
        name: command.to_string(),
    })?;
    launcher.launch(&program, command, args)
}

fn handle_config_show(ctx: &Context) -> Result<(), ForgeError> {
    let (cfg, exists) = load_config(ctx)?;
    let root = cfg.root.trim().to_string();
    let custom = !cfg.commands.is_empty();
    let commands = cfg.effective_commands();

    if ctx.json {
        let saved_root = if exists && !root.is_empty() {
            Some(root.as_str())
        } else {
            None
        };
        return output(
            ctx,
            json!({
                "path": ctx.config_path,
                "root": saved_root,
                "custom_commands": custom,
                "commands": commands,
            }),
        );
    }

    println!("Config file: {}", ctx.config_path.display());
    if !exists || root.is_empty() {
        println!("Default root: unset");
        println!("Set it with: forge config set-root \"~/Projects\"");
    } else {
        println!("Default root: {root}");
    }
    println!();
    if custom {
        println!("Launch commands (custom):");
    } else {
        println!("Launch commands (built-in defaults):");
    }
    for (index, command) in commands.iter().enumerate() {
        println!(
            "  {}. {} -> {} {}",
            index + 1,
            command.name,
            command.command,
            command.args.join(" ")
        );
    }
    Ok(())
}

fn handle_config_path(ctx: &Context) -> Result<(), ForgeError> {
    if ctx.json {
        return output(ctx, json!({"path": ctx.config_path}));
    }
    println!("{}", ctx.config_path.display());
    Ok(())
}

fn handle_set_root(ctx: &Context, dir: Option<&str>) -> Result<(), ForgeError> {
    match dir {
        Some(dir) => {
            let root = normalize_root(dir)
                .map_err(|err| ForgeError::Usage(format!("invalid root: {err}")))?;
            let path = save_root(ctx, &root.to_string_lossy())?;
            if ctx.json {
                return output(ctx, json!({"root": root, "path": path}));
            }
            println!("default root updated: {}", root.display());
            println!("config file: {}", path.display());
            Ok(())
        }
        None => {
            let theme = ColorfulTheme::default();
            let Some(root) =
                select_and_persist_root(ctx, &theme, "Choose a default root directory")?
            else {
                return Ok(());
            };
            println!("default root updated: {}", root.display());
            Ok(())
        }
    }
}

fn handle_version(ctx: &Context) -> Result<(), ForgeError> {
    if ctx.json {
        return output(
            ctx,
            json!({
                "name": APP_NAME,
                "version": env!("CARGO_PKG_VERSION"),
                "os": env::consts::OS,
                "arch": env::consts::ARCH,
            }),
        );
    }
    println!("forge {}", env!("CARGO_PKG_VERSION"));
    println!("os/arch: {}/{}", env::consts::OS, env::consts::ARCH);
    Ok(())
}

fn output(ctx: &Context, payload: serde_json::Value) -> Result<(), ForgeError> {
    if ctx.json {
        let wrapper = JsonResult {
            ok: true,
            result: Some(payload),
            error: None,
        };
        print_json(&wrapper)?;
    } else {
        println!("{payload}");
    }
    Ok(())
}

fn print_json<T: Serialize>(payload: &T) -> Result<(), ForgeError> {
    let text = serde_json::to_string_pretty(payload)?;
    println!("{text}");
    Ok(())
}
