use crate::catalog::CatalogUpdater;
use crate::changes::ChangeSet;
use crate::config::Config;
use crate::engine::UpdateEngine;
use crate::error::{DeppyError, Result};
use crate::exclusion::{ExclusionEntry, ExclusionStrategy, parse_raw_list};
use crate::gradle::{GradleConfigParser, GradleServicesClient, WrapperUpdater};
use crate::npm::{ManifestUpdater, NcuProposer};
use crate::process::{CommandRunner, TokioCommandRunner};
use crate::reconciler::{Reconciler, RunOutcome};
use crate::repository::RepositoryFactory;
use crate::scheduler::{
    PushDebouncer, RunBody, UpdateScheduler, spawn_periodic, watch_main_branch,
};
use crate::scm::{GitCheckout, GitHubClient, SourceControl, WorkingTree};
use crate::storage::{JsonFileStorage, Storage};
use crate::worktree::WorkTree;
use async_trait::async_trait;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

/// Builds the engines for a freshly prepared tree.
#[async_trait]
pub trait EngineProvider: Send + Sync {
    async fn engines(&self, tree: &WorkTree) -> Result<Vec<Arc<dyn UpdateEngine>>>;
}

/// Catalog, wrapper and manifest engines wired from configuration. Maven
/// repositories are discovered from the checkout's Gradle scripts.
pub struct ConfiguredEngines {
    config: Config,
    runner: Arc<dyn CommandRunner>,
}

impl ConfiguredEngines {
    pub fn new(config: Config, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }
}

impl ConfiguredEngines {
    async fn catalog_engine(&self, tree: &WorkTree) -> Result<Arc<dyn UpdateEngine>> {
        let registries = &self.config.registries;
        let repositories = GradleConfigParser::discover(tree).await?;
        tracing::debug!(repositories = repositories.len(), "Discovered Maven repositories");
        let libraries = RepositoryFactory::create_maven(repositories)?;
        let plugins = RepositoryFactory::create_plugin_portal(&registries.plugin_portal)?;
        Ok(Arc::new(
            CatalogUpdater::new(libraries, plugins, self.config.catalogs.clone())
                .with_concurrency(registries.concurrency),
        ))
    }

    fn wrapper_engine(&self) -> Result<Arc<dyn UpdateEngine>> {
        let distributions =
            Arc::new(GradleServicesClient::new(&self.config.registries.gradle_versions)?);
        Ok(Arc::new(WrapperUpdater::new(
            distributions,
            self.config.wrapper.properties.clone(),
        )))
    }

    fn manifest_engine(&self) -> Arc<dyn UpdateEngine> {
        let proposer = Arc::new(NcuProposer::new(
            self.runner.clone(),
            self.config.manifest.ncu_command.clone(),
        ));
        Arc::new(ManifestUpdater::new(
            proposer,
            self.runner.clone(),
            self.config.manifest.clone(),
        ))
    }
}

#[async_trait]
impl EngineProvider for ConfiguredEngines {
    /// An engine that cannot be set up is logged and left out; the others
    /// still run.
    async fn engines(&self, tree: &WorkTree) -> Result<Vec<Arc<dyn UpdateEngine>>> {
        let candidates = [
            ("version-catalog", self.catalog_engine(tree).await),
            ("gradle-wrapper", self.wrapper_engine()),
            ("npm-manifest", Ok(self.manifest_engine())),
        ];

        let mut engines = Vec::with_capacity(candidates.len());
        for (name, built) in candidates {
            match built {
                Ok(engine) => engines.push(engine),
                Err(e) => {
                    tracing::error!(engine = name, error = %e, "Could not set up engine, skipping")
                }
            }
        }
        Ok(engines)
    }
}

/// One complete update pass: drift check, fresh checkout, engines, landing.
pub struct UpdateRun {
    storage: Arc<dyn Storage>,
    working_tree: Arc<dyn WorkingTree>,
    reconciler: Reconciler,
    engines: Arc<dyn EngineProvider>,
}

impl UpdateRun {
    pub fn new(
        storage: Arc<dyn Storage>,
        working_tree: Arc<dyn WorkingTree>,
        reconciler: Reconciler,
        engines: Arc<dyn EngineProvider>,
    ) -> Self {
        Self {
            storage,
            working_tree,
            reconciler,
            engines,
        }
    }

    pub async fn run(&self) -> Result<RunOutcome> {
        if let Some(drift) = self.reconciler.check_drift().await? {
            return Ok(drift);
        }

        let tree = self.working_tree.prepare().await?;
        let settings = self.storage.settings().await?;
        let exclusions = ExclusionStrategy::from_settings(&settings);

        let mut changes = ChangeSet::new();
        for engine in self.engines.engines(&tree).await? {
            changes.extend(engine.run(&tree, &exclusions).await);
        }

        if changes.is_empty() {
            tracing::info!("No updates found");
            return Ok(RunOutcome::NoChanges);
        }
        tracing::info!(updates = changes.len(), "Updaters found updates, landing them");
        for record in changes.records() {
            tracing::info!(%record, "Update");
        }

        let files = self.working_tree.dirty_files(&tree).await?;
        self.reconciler.land(&tree, &files, &changes).await
    }
}

#[async_trait]
impl RunBody for UpdateRun {
    async fn execute(&self) -> Result<()> {
        let outcome = self.run().await?;
        tracing::info!(%outcome, "Update run finished");
        Ok(())
    }
}

struct Remote {
    run: UpdateRun,
    scm: Arc<dyn SourceControl>,
}

fn build_remote(config: &Config) -> Result<Remote> {
    let scm: Arc<dyn SourceControl> = Arc::new(GitHubClient::new(
        &config.github.api_url,
        config.require_repo()?,
        config.require_token()?,
    )?);
    let storage: Arc<dyn Storage> = Arc::new(JsonFileStorage::new(&config.state_file));
    let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner);
    let checkout = Arc::new(GitCheckout::new(
        runner.clone(),
        config.clone_url()?,
        config.main_branch.clone(),
        &config.checkout_dir,
    )?);
    let reconciler = Reconciler::new(
        scm.clone(),
        storage.clone(),
        config.main_branch.clone(),
        config.integration_branch.clone(),
    );
    let engines = Arc::new(ConfiguredEngines::new(config.clone(), runner));

    Ok(Remote {
        run: UpdateRun::new(storage, checkout, reconciler, engines),
        scm,
    })
}

/// Performs a single update run in the foreground.
pub async fn execute_run(config: &Config) -> Result<()> {
    let remote = build_remote(config)?;
    println!(
        "{}",
        format!("Checking {} for dependency updates...", config.repo)
            .cyan()
            .bold()
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Resolving updates");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let outcome = remote.run.run().await;
    spinner.finish_and_clear();

    match outcome? {
        RunOutcome::NoChanges => println!("{}", "✓ Everything is up to date".green()),
        RunOutcome::Landed { commit } => {
            println!(
                "{}",
                format!("✓ Updates pushed to '{}' at {commit}", config.integration_branch)
                    .green()
                    .bold()
            );
        }
        drift @ RunOutcome::Drift { .. } => {
            println!("{} {}", "⚠".yellow(), drift.to_string().yellow());
            println!(
                "  {}",
                "Merge or delete the integration branch to resume automatic updates.".dimmed()
            );
        }
    }
    Ok(())
}

/// Runs on a schedule and after pushes to the main branch until interrupted.
pub async fn execute_serve(config: &Config) -> Result<()> {
    let remote = build_remote(config)?;
    let scheduler = Arc::new(UpdateScheduler::new(Arc::new(remote.run)));

    let periodic = spawn_periodic(scheduler.clone(), config.schedule.interval());
    let debouncer = Arc::new(PushDebouncer::new(
        scheduler.clone(),
        &config.main_branch,
        config.schedule.push_debounce(),
    ));
    let watcher = watch_main_branch(
        remote.scm,
        config.main_branch.clone(),
        config.schedule.poll_interval(),
        debouncer,
    );

    println!(
        "{} {} {}",
        "Serving".cyan().bold(),
        config.repo.bright_cyan(),
        format!(
            "(every {}s, push debounce {}s)",
            config.schedule.interval_secs, config.schedule.push_debounce_secs
        )
        .dimmed()
    );
    tracing::info!(repo = %config.repo, "deppy started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    periodic.abort();
    watcher.abort();
    Ok(())
}

/// Prints the exclusion lists and the tracked integration branch head.
pub async fn execute_status(config: &Config) -> Result<()> {
    let storage = JsonFileStorage::new(&config.state_file);
    let settings = storage.settings().await?;

    println!("{}", "Excluded dependencies".cyan().bold());
    print_entries(&settings.excluded_dependencies);
    println!("\n{}", "Excluded dependency patterns".cyan().bold());
    print_entries(&settings.excluded_dependency_patterns);

    println!("\n{}", "Integration branch".cyan().bold());
    match settings.updates_branch_head.as_deref() {
        Some(head) => println!("   {} at {}", config.integration_branch, head.bright_cyan()),
        None => println!("   {}", "not created by deppy yet".dimmed()),
    }
    Ok(())
}

fn print_entries(entries: &[ExclusionEntry]) {
    if entries.is_empty() {
        println!("   {}", "none".dimmed());
        return;
    }
    for entry in entries {
        println!("   • {}:{}", entry.name.bright_cyan(), entry.version);
    }
}

/// Adds `name:version` entries from a free-form list to the exclusions.
pub async fn execute_exclude(config: &Config, raw: &str, pattern: bool) -> Result<()> {
    let entries = parse_entries(raw)?;
    let requested = entries.len();
    let storage = JsonFileStorage::new(&config.state_file);
    tracing::info!(raw, pattern, "Request to exclude dependencies");

    let added = storage.exclude(entries, pattern).await?;
    println!(
        "{}",
        format!("✓ Excluded {added} {}", list_name(pattern)).green()
    );
    if added < requested {
        println!("   {}", format!("{} already excluded", requested - added).dimmed());
    }
    Ok(())
}

/// Removes `name:version` entries from the exclusions.
pub async fn execute_include(config: &Config, raw: &str, pattern: bool) -> Result<()> {
    let entries = parse_entries(raw)?;
    let storage = JsonFileStorage::new(&config.state_file);
    tracing::info!(raw, pattern, "Request to include dependencies");

    let removed = storage.include(&entries, pattern).await?;
    println!(
        "{}",
        format!("✓ Removed {removed} {}", list_name(pattern)).green()
    );
    Ok(())
}

fn parse_entries(raw: &str) -> Result<Vec<ExclusionEntry>> {
    let entries = parse_raw_list(raw);
    if entries.is_empty() {
        return Err(DeppyError::Config(format!(
            "No 'name:version' entries found in '{raw}'"
        )));
    }
    Ok(entries)
}

fn list_name(pattern: bool) -> &'static str {
    if pattern {
        "pattern exclusion(s)"
    } else {
        "exclusion(s)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradle::DistributionRelease;
    use crate::storage::Settings;
    use crate::testing::{
        FakeDistributions, FakeSourceControl, FakeWorkingTree, MemoryStorage, RecordingRunner,
        StaticEngines,
    };
    use tempfile::tempdir;

    const PROPERTIES_PATH: &str = "gradle/wrapper/gradle-wrapper.properties";
    const PROPERTIES: &str =
        "distributionUrl=https\\://services.gradle.org/distributions/gradle-7.4-bin.zip\n";

    fn releases() -> Vec<DistributionRelease> {
        [
            ("7.6", "20221125133510+0000"),
            ("7.5", "20220714124815+0000"),
            ("7.4", "20220208110000+0000"),
        ]
        .into_iter()
        .map(|(version, built)| DistributionRelease {
            version: version.to_string(),
            build_time: Some(built.to_string()),
            ..Default::default()
        })
        .collect()
    }

    struct Harness {
        scm: Arc<FakeSourceControl>,
        storage: Arc<MemoryStorage>,
        tree: Arc<FakeWorkingTree>,
        run: UpdateRun,
    }

    fn harness(scm: FakeSourceControl, storage: MemoryStorage) -> Harness {
        let scm = Arc::new(scm);
        let storage = Arc::new(storage);
        let tree = Arc::new(FakeWorkingTree::new(&[(PROPERTIES_PATH, PROPERTIES)]));
        let wrapper: Arc<dyn UpdateEngine> = Arc::new(WrapperUpdater::new(
            Arc::new(FakeDistributions::new(releases())),
            PROPERTIES_PATH,
        ));
        let engines = Arc::new(StaticEngines::new(vec![wrapper]));
        let reconciler = Reconciler::new(
            scm.clone(),
            storage.clone(),
            "master",
            "dependencies-update",
        );
        let run = UpdateRun::new(storage.clone(), tree.clone(), reconciler, engines);
        Harness {
            scm,
            storage,
            tree,
            run,
        }
    }

    #[tokio::test]
    async fn lands_updates_and_tracks_the_new_head() {
        let h = harness(
            FakeSourceControl::new().with_branch("master", "main-head"),
            MemoryStorage::default(),
        );

        let outcome = h.run.run().await.unwrap();

        let RunOutcome::Landed { commit } = outcome else {
            panic!("expected landed outcome, got {outcome:?}");
        };
        assert_eq!(h.storage.branch_head().await.unwrap(), Some(commit.clone()));
        let commits = h.scm.created_commits();
        assert_eq!(commits.len(), 1);
        assert!(commits[0].message.contains("### Build System\n* Gradle updated from `7.4` to `7.6`"));
        assert_eq!(h.scm.created_trees()[0].1[0].path, PROPERTIES_PATH);
        assert_eq!(h.scm.pull_requests().len(), 1);
    }

    #[tokio::test]
    async fn exclusions_are_read_from_storage() {
        let h = harness(
            FakeSourceControl::new().with_branch("master", "main-head"),
            MemoryStorage::with_settings(Settings {
                excluded_dependencies: vec![ExclusionEntry::new("gradle", "7.6")],
                ..Default::default()
            }),
        );

        h.run.run().await.unwrap();

        let commits = h.scm.created_commits();
        assert!(commits[0].message.contains("Gradle updated from `7.4` to `7.5`"));
    }

    #[tokio::test]
    async fn drift_stops_before_any_work() {
        let h = harness(
            FakeSourceControl::new()
                .with_branch("master", "main-head")
                .with_branch("dependencies-update", "def456"),
            MemoryStorage::with_head("abc123"),
        );

        let outcome = h.run.run().await.unwrap();

        assert!(matches!(outcome, RunOutcome::Drift { .. }));
        assert_eq!(h.tree.prepared(), 0);
        assert!(h.scm.mutations().is_empty());
    }

    #[tokio::test]
    async fn up_to_date_tree_is_not_landed() {
        let h = harness(
            FakeSourceControl::new().with_branch("master", "main-head"),
            MemoryStorage::with_settings(Settings {
                excluded_dependency_patterns: vec![ExclusionEntry::new("^gradle$", "^7\\.[56]$")],
                ..Default::default()
            }),
        );

        let outcome = h.run.run().await.unwrap();

        assert_eq!(outcome, RunOutcome::NoChanges);
        assert_eq!(h.tree.prepared(), 1);
        assert!(h.scm.mutations().is_empty());
    }

    fn engine_names(engines: &[Arc<dyn UpdateEngine>]) -> Vec<&'static str> {
        engines.iter().map(|engine| engine.name()).collect()
    }

    #[tokio::test]
    async fn local_repositories_do_not_disable_engines() {
        let dir = tempdir().unwrap();
        let tree = WorkTree::new(dir.path()).unwrap();
        tree.write_text(
            "settings.gradle.kts",
            "dependencyResolutionManagement {\n    repositories {\n        mavenCentral()\n        maven { url = uri(\"file:///opt/local-repo\") }\n    }\n}\n",
        )
        .await
        .unwrap();
        let provider = ConfiguredEngines::new(Config::default(), Arc::new(RecordingRunner::new(Vec::new())));

        let engines = provider.engines(&tree).await.unwrap();

        assert_eq!(
            engine_names(&engines),
            vec!["version-catalog", "gradle-wrapper", "npm-manifest"]
        );
    }

    #[tokio::test]
    async fn failing_engine_setup_leaves_the_others() {
        let dir = tempdir().unwrap();
        let tree = WorkTree::new(dir.path()).unwrap();
        let mut config = Config::default();
        config.registries.gradle_versions = "http://localhost:8080/versions/all".to_string();
        let provider = ConfiguredEngines::new(config, Arc::new(RecordingRunner::new(Vec::new())));

        let engines = provider.engines(&tree).await.unwrap();

        assert_eq!(engine_names(&engines), vec!["version-catalog", "npm-manifest"]);
    }

    #[tokio::test]
    async fn exclude_and_include_round_trip_through_state_file() {
        let dir = tempdir().unwrap();
        let config = Config {
            state_file: dir.path().join("state.json"),
            ..Config::default()
        };

        execute_exclude(&config, "left-pad:1.4.0, com.google:guava:33.0", false)
            .await
            .unwrap();
        execute_exclude(&config, "left-pad:1.4.0", false).await.unwrap();
        let storage = JsonFileStorage::new(&config.state_file);
        assert_eq!(storage.settings().await.unwrap().excluded_dependencies.len(), 2);

        execute_include(&config, "left-pad:1.4.0 com.google:guava:33.0", false)
            .await
            .unwrap();
        let storage = JsonFileStorage::new(&config.state_file);
        assert!(storage.settings().await.unwrap().excluded_dependencies.is_empty());

        assert!(matches!(
            execute_exclude(&config, "no-version-here", true).await,
            Err(DeppyError::Config(_))
        ));
    }
}
