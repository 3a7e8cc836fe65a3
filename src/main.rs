//! `gtd` command-line front end over the record stores.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use gtd_store::activity::TracingActivity;
use gtd_store::cli::perspective::{ExportArgs, PerspectiveCommand};
use gtd_store::cli::task::{AddArgs, ListArgs, ReopenArgs};
use gtd_store::cli::{Cli, Command};
use gtd_store::config::{Config, ConfigLoader, ConfigPaths};
use gtd_store::format::{self, OutputFormat};
use gtd_store::logging::{self, LogTarget};
use gtd_store::perspective::Perspective;
use gtd_store::query::{group_tasks, sort_tasks};
use gtd_store::store::{BoardStore, PerspectiveStore, Record, TaskStore};
use gtd_store::types::Task;
use gtd_store::watcher::{StoreFileEvent, WatcherConfig, start_store_watcher};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::load_with_file(
        ConfigPaths::discover(),
        cli.config.as_deref(),
        |key| std::env::var(key).ok(),
    )?;
    let config = loader.config_mut();
    if let Some(root) = &cli.root {
        config.storage.root = root.clone();
    }
    if let Some(raw) = &cli.format {
        config.output.format =
            OutputFormat::parse(raw).with_context(|| format!("unknown output format '{}'", raw))?;
    }

    logging::init(
        &LogTarget::parse(&cli.log),
        cli.verbose,
        &loader.config().logging.level,
    )?;
    for (tier, path) in loader.sources() {
        debug!(tier = %tier, path = %path.display(), "loaded config");
    }

    let config = loader.into_config();
    let stores = Stores::open(&config).await?;
    let result = run(&stores, &config, cli.command).await;
    stores.flush().await?;
    result
}

/// The three record stores sharing one root.
struct Stores {
    tasks: TaskStore,
    boards: BoardStore,
    perspectives: PerspectiveStore,
    auto_boards: bool,
}

impl Stores {
    async fn open(config: &Config) -> Result<Self> {
        let files = config.file_store();
        files
            .ensure_directory_structure()
            .with_context(|| format!("preparing store root {}", files.root().display()))?;
        let options = config
            .store_options()
            .with_activity(Arc::new(TracingActivity));

        let tasks = TaskStore::open(files.clone(), options.clone()).await?;
        let boards = BoardStore::open(files.clone(), options.clone()).await?;
        let perspectives = PerspectiveStore::open(files, options).await?;

        if config.storage.seed_builtins {
            let seeded = boards.seed_builtins().await + perspectives.seed_builtins().await;
            if seeded > 0 {
                info!(seeded, "seeded built-in records");
            }
        }

        Ok(Self {
            tasks,
            boards,
            perspectives,
            auto_boards: config.storage.auto_boards,
        })
    }

    /// Keep project/context boards in step with the task set.
    async fn sync_boards(&self) {
        if !self.auto_boards {
            return;
        }
        self.boards
            .sync_auto_boards(&self.tasks.projects(), &self.tasks.contexts())
            .await;
        self.boards
            .apply_auto_hide(&self.tasks.all(), Utc::now())
            .await;
    }

    async fn reload(&self) -> Result<()> {
        self.tasks.reload().await?;
        self.boards.reload().await?;
        self.perspectives.reload().await?;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.tasks.flush().await?;
        self.boards.flush().await?;
        self.perspectives.flush().await?;
        Ok(())
    }

    /// Accept a full UUID or an unambiguous prefix of one.
    fn resolve_task(&self, needle: &str) -> Result<Task> {
        if let Ok(id) = Uuid::parse_str(needle)
            && let Some(task) = self.tasks.task(id)
        {
            return Ok(task);
        }
        let needle = needle.to_lowercase();
        let mut found = self
            .tasks
            .filter(|t| t.id.to_string().starts_with(&needle));
        match found.len() {
            0 => bail!("no task matches '{}'", needle),
            1 => Ok(found.remove(0)),
            n => bail!("'{}' is ambiguous ({} tasks match)", needle, n),
        }
    }

    fn resolve_perspective(&self, needle: &str) -> Result<Perspective> {
        if let Ok(id) = Uuid::parse_str(needle)
            && let Some(perspective) = self.perspectives.perspective(id)
        {
            return Ok(perspective);
        }
        self.perspectives
            .by_name(needle)
            .with_context(|| format!("no perspective named '{}'", needle))
    }
}

async fn run(stores: &Stores, config: &Config, command: Command) -> Result<()> {
    let fmt = config.output.format;
    match command {
        Command::Init => {
            println!("Initialized {}", config.storage.root.display());
            Ok(())
        }
        Command::Add(args) => run_add(stores, fmt, args).await,
        Command::List(args) => run_list(stores, fmt, args),
        Command::Search { query } => {
            let mut tasks = stores.tasks.search(&query);
            sort_tasks(&mut tasks, Default::default(), Default::default());
            print_tasks(fmt, &format!("Search: {}", query), &tasks)
        }
        Command::Complete { id } => {
            let task = stores.resolve_task(&id)?;
            let task = stores.tasks.complete(task.id, Utc::now()).await?;
            print_task(fmt, &task)
        }
        Command::Reopen(ReopenArgs { id, status }) => {
            let task = stores.resolve_task(&id)?;
            let task = stores.tasks.reopen(task.id, status, Utc::now()).await?;
            print_task(fmt, &task)
        }
        Command::Delete { ids } => {
            let resolved: Vec<String> = ids
                .iter()
                .map(|id| stores.resolve_task(id).map(|t| t.key()))
                .collect::<Result<_>>()?;
            let refs: Vec<&str> = resolved.iter().map(String::as_str).collect();
            let removed = stores.tasks.delete_many(&refs).await?;
            match fmt {
                OutputFormat::Json => println!("{}", json!({ "deleted": removed })),
                OutputFormat::Markdown => println!("Deleted {} task(s)", removed),
            }
            Ok(())
        }
        Command::Projects => print_names(fmt, "Projects", &stores.tasks.projects()),
        Command::Contexts => print_names(fmt, "Contexts", &stores.tasks.contexts()),
        Command::Check => run_check(stores, fmt),
        Command::Watch => run_watch(stores).await,
        Command::Perspective(cmd) => run_perspective(stores, fmt, cmd).await,
    }
}

async fn run_add(stores: &Stores, fmt: OutputFormat, args: AddArgs) -> Result<()> {
    let task = args.into_task(Utc::now());
    task.validate()?;
    stores.tasks.add(task.clone()).await;
    stores.sync_boards().await;
    print_task(fmt, &task)
}

fn run_list(stores: &Stores, fmt: OutputFormat, args: ListArgs) -> Result<()> {
    let now = Utc::now();
    let filter = args.filter();
    let mut tasks: Vec<Task> = stores
        .tasks
        .matching(&filter)
        .into_iter()
        .filter(|t| {
            if args.actionable {
                t.is_actionable(now)
            } else {
                args.all || filter.status.is_some() || !t.is_terminal()
            }
        })
        .collect();
    sort_tasks(&mut tasks, args.sort, args.direction());

    match args.group_by {
        Some(group_by) => {
            let groups = group_tasks(tasks, group_by);
            match fmt {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&groups)?),
                OutputFormat::Markdown => {
                    print!("{}", format::format_groups_markdown("Tasks", &groups))
                }
            }
            Ok(())
        }
        None => print_tasks(fmt, "Tasks", &tasks),
    }
}

fn run_check(stores: &Stores, fmt: OutputFormat) -> Result<()> {
    let files = stores.tasks.files();
    let reports = [
        ("tasks", files.check::<Task>()?),
        ("boards", files.check::<gtd_store::types::Board>()?),
        ("perspectives", files.check::<Perspective>()?),
    ];
    let total: usize = reports.iter().map(|(_, issues)| issues.len()).sum();
    match fmt {
        OutputFormat::Json => {
            let body: Vec<_> = reports
                .iter()
                .map(|(category, issues)| format::check_to_json(category, issues))
                .collect();
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Markdown => {
            for (category, issues) in &reports {
                print!("{}", format::format_check_markdown(category, issues));
            }
        }
    }
    if total > 0 {
        bail!("{} record file(s) failed to load", total);
    }
    Ok(())
}

async fn run_watch(stores: &Stores) -> Result<()> {
    let mut handle = start_store_watcher(
        stores.tasks.files().layout().clone(),
        WatcherConfig::default(),
    )?;
    info!("Watching for external edits, Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping watcher");
                return Ok(());
            }
            event = handle.wait_for_change() => {
                let Some(event) = event else {
                    warn!("Store watcher stopped");
                    return Ok(());
                };
                if let StoreFileEvent::Error(e) = &event {
                    warn!("Watcher error: {}", e);
                    continue;
                }
                debug!(paths = event.affected_paths().len(), "reloading after external edit");
                stores.reload().await?;
                stores.sync_boards().await;
                info!(
                    tasks = stores.tasks.len(),
                    boards = stores.boards.len(),
                    perspectives = stores.perspectives.len(),
                    "Reloaded"
                );
            }
        }
    }
}

async fn run_perspective(stores: &Stores, fmt: OutputFormat, cmd: PerspectiveCommand) -> Result<()> {
    match cmd {
        PerspectiveCommand::List => {
            let mut perspectives = stores.perspectives.all();
            perspectives.sort_by(|a, b| b.built_in.cmp(&a.built_in).then(a.name.cmp(&b.name)));
            match fmt {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&perspectives)?)
                }
                OutputFormat::Markdown => {
                    print!("{}", format::format_perspectives_markdown(&perspectives))
                }
            }
            Ok(())
        }
        PerspectiveCommand::Show { perspective } => {
            let perspective = stores.resolve_perspective(&perspective)?;
            let groups = perspective.apply_grouped(&stores.tasks.all(), Utc::now());
            match fmt {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&groups)?),
                OutputFormat::Markdown => {
                    print!("{}", format::format_groups_markdown(&perspective.name, &groups))
                }
            }
            Ok(())
        }
        PerspectiveCommand::Export(args) => run_export(stores, args),
        PerspectiveCommand::Import { input } => {
            let bytes = std::fs::read(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let perspective = stores.perspectives.import(&bytes).await?;
            match fmt {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&perspective)?),
                OutputFormat::Markdown => {
                    println!("Imported '{}' as {}", perspective.name, perspective.id)
                }
            }
            Ok(())
        }
    }
}

fn run_export(stores: &Stores, args: ExportArgs) -> Result<()> {
    let perspective = stores.resolve_perspective(&args.perspective)?;
    let bytes = if args.should_compress() {
        stores.perspectives.export_gzip(perspective.id)?
    } else {
        stores.perspectives.export(perspective.id)?
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Exported '{}' to {}", perspective.name, path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            if !args.should_compress() {
                writeln!(stdout)?;
            }
        }
    }
    Ok(())
}

fn print_task(fmt: OutputFormat, task: &Task) -> Result<()> {
    match fmt {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(task)?),
        OutputFormat::Markdown => print!("{}", format::format_task_markdown(task)),
    }
    Ok(())
}

fn print_tasks(fmt: OutputFormat, title: &str, tasks: &[Task]) -> Result<()> {
    match fmt {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(tasks)?),
        OutputFormat::Markdown => print!("{}", format::format_tasks_markdown(title, tasks)),
    }
    Ok(())
}

fn print_names(fmt: OutputFormat, title: &str, names: &[String]) -> Result<()> {
    match fmt {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(names)?),
        OutputFormat::Markdown => print!("{}", format::format_names_markdown(title, names)),
    }
    Ok(())
}
