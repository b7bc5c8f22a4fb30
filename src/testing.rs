//! In-memory stand-ins for the network, process and storage seams.

use crate::engine::UpdateEngine;
use crate::error::{DeppyError, Result};
use crate::exclusion::ExclusionEntry;
use crate::gradle::{DistributionClient, DistributionRelease};
use crate::npm::UpdateProposer;
use crate::process::{CommandOutput, CommandRunner};
use crate::repository::{Coordinate, RepositoryClient};
use crate::scm::{BranchRef, PullRequest, SourceControl, TreeEntry, WorkingTree};
use crate::storage::{Settings, Storage};
use crate::worktree::WorkTree;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub struct FakeDistributions {
    releases: Vec<DistributionRelease>,
}

impl FakeDistributions {
    pub fn new(releases: Vec<DistributionRelease>) -> Self {
        Self { releases }
    }
}

#[async_trait]
impl DistributionClient for FakeDistributions {
    async fn fetch_releases(&self) -> Result<Vec<DistributionRelease>> {
        Ok(self.releases.clone())
    }
}

/// Registry answering from a fixed table and recording every lookup.
#[derive(Default)]
pub struct FakeRepository {
    versions: HashMap<Coordinate, Vec<String>>,
    failing: HashSet<Coordinate>,
    queried: Mutex<Vec<Coordinate>>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, coordinate: Coordinate, versions: &[&str]) -> Self {
        self.versions
            .insert(coordinate, versions.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn failing(mut self, coordinate: Coordinate) -> Self {
        self.failing.insert(coordinate);
        self
    }

    pub fn queried(&self) -> Vec<Coordinate> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepositoryClient for FakeRepository {
    async fn fetch_available_versions(&self, coordinate: &Coordinate) -> Result<Vec<String>> {
        self.queried.lock().unwrap().push(coordinate.clone());
        if self.failing.contains(coordinate) {
            return Err(DeppyError::Registry(format!("{coordinate} unavailable")));
        }
        Ok(self.versions.get(coordinate).cloned().unwrap_or_default())
    }
}

type Effect = Box<dyn Fn(&str, &Path) + Send + Sync>;

/// Records command lines and replays queued outputs, succeeding once the
/// queue is empty.
pub struct RecordingRunner {
    responses: Mutex<VecDeque<CommandOutput>>,
    commands: Mutex<Vec<String>>,
    effect: Option<Effect>,
}

impl RecordingRunner {
    pub fn new(responses: Vec<CommandOutput>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            commands: Mutex::new(Vec::new()),
            effect: None,
        }
    }

    /// Side effect applied in the command's directory before it "exits".
    pub fn with_effect(mut self, effect: impl Fn(&str, &Path) + Send + Sync + 'static) -> Self {
        self.effect = Some(Box::new(effect));
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    fn respond(&self, command: String, dir: &Path) -> CommandOutput {
        if let Some(effect) = &self.effect {
            effect(&command, dir);
        }
        self.commands.lock().unwrap().push(command);
        self.responses.lock().unwrap().pop_front().unwrap_or_default()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, program: &str, args: &[&str], dir: &Path) -> Result<CommandOutput> {
        let mut command = program.to_string();
        for arg in args {
            command.push(' ');
            command.push_str(arg);
        }
        Ok(self.respond(command, dir))
    }

    async fn run_shell(&self, command_line: &str, dir: &Path) -> Result<CommandOutput> {
        Ok(self.respond(command_line.to_string(), dir))
    }
}

/// Writes a prepared manifest and reports fixed proposals.
pub struct FakeProposer {
    manifest_after: String,
    proposals: Vec<(String, String)>,
    calls: AtomicUsize,
}

impl FakeProposer {
    pub fn new(manifest_after: String, proposals: Vec<(String, String)>) -> Self {
        Self {
            manifest_after,
            proposals,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpdateProposer for FakeProposer {
    async fn propose(&self, dir: &Path) -> Result<Vec<(String, String)>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(dir.join("package.json"), &self.manifest_after).await?;
        Ok(self.proposals.clone())
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    settings: Mutex<Settings>,
}

impl MemoryStorage {
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }

    pub fn with_head(head: &str) -> Self {
        Self::with_settings(Settings {
            updates_branch_head: Some(head.to_string()),
            ..Default::default()
        })
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn settings(&self) -> Result<Settings> {
        Ok(self.settings.lock().unwrap().clone())
    }

    async fn exclude(&self, entries: Vec<ExclusionEntry>, pattern: bool) -> Result<usize> {
        Ok(self.settings.lock().unwrap().exclude(entries, pattern))
    }

    async fn include(&self, entries: &[ExclusionEntry], pattern: bool) -> Result<usize> {
        Ok(self.settings.lock().unwrap().include(entries, pattern))
    }

    async fn set_branch_head(&self, commit: &str) -> Result<()> {
        self.settings.lock().unwrap().updates_branch_head = Some(commit.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub sha: String,
    pub message: String,
    pub tree: String,
    pub parents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRecord {
    pub number: u64,
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
}

#[derive(Default)]
struct HostedState {
    branches: HashMap<String, String>,
    trees: Vec<(String, Vec<TreeEntry>)>,
    commits: Vec<CommitRecord>,
    pulls: Vec<PullRecord>,
    mutations: Vec<String>,
}

/// Hosted repository kept in memory. Every write is logged in `mutations`.
#[derive(Default)]
pub struct FakeSourceControl {
    state: Mutex<HostedState>,
}

impl FakeSourceControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_branch(self, name: &str, head: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .branches
            .insert(name.to_string(), head.to_string());
        self
    }

    pub fn with_open_pull_request(self, head: &str, base: &str, body: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let number = state.pulls.len() as u64 + 1;
            state.pulls.push(PullRecord {
                number,
                title: "Dependencies update".to_string(),
                head: head.to_string(),
                base: base.to_string(),
                body: body.to_string(),
            });
        }
        self
    }

    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().unwrap().mutations.clone()
    }

    pub fn branch_head(&self, name: &str) -> Option<String> {
        self.state.lock().unwrap().branches.get(name).cloned()
    }

    pub fn created_trees(&self) -> Vec<(String, Vec<TreeEntry>)> {
        self.state.lock().unwrap().trees.clone()
    }

    pub fn created_commits(&self) -> Vec<CommitRecord> {
        self.state.lock().unwrap().commits.clone()
    }

    pub fn pull_requests(&self) -> Vec<PullRecord> {
        self.state.lock().unwrap().pulls.clone()
    }
}

#[async_trait]
impl SourceControl for FakeSourceControl {
    async fn find_branch(&self, name: &str) -> Result<Option<BranchRef>> {
        Ok(self.branch_head(name).map(|head| BranchRef {
            name: name.to_string(),
            head,
        }))
    }

    async fn commit_tree(&self, commit: &str) -> Result<String> {
        Ok(format!("tree-of-{commit}"))
    }

    async fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.trees.push((base_tree.to_string(), entries.to_vec()));
        let sha = format!("tree-{}", state.trees.len());
        state.mutations.push(format!("create tree {sha}"));
        Ok(sha)
    }

    async fn create_commit(&self, message: &str, tree: &str, parents: &[String]) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        let sha = format!("commit-{}", state.commits.len() + 1);
        state.commits.push(CommitRecord {
            sha: sha.clone(),
            message: message.to_string(),
            tree: tree.to_string(),
            parents: parents.to_vec(),
        });
        state.mutations.push(format!("create commit {sha}"));
        Ok(sha)
    }

    async fn upsert_branch(&self, name: &str, commit: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.branches.insert(name.to_string(), commit.to_string());
        state.mutations.push(format!("move {name} to {commit}"));
        Ok(())
    }

    async fn find_open_pull_request(&self, head: &str, base: &str) -> Result<Option<PullRequest>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .pulls
            .iter()
            .find(|pull| pull.head == head && pull.base == base)
            .map(|pull| PullRequest {
                number: pull.number,
            }))
    }

    async fn create_pull_request(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<PullRequest> {
        let mut state = self.state.lock().unwrap();
        let number = state.pulls.len() as u64 + 1;
        state.pulls.push(PullRecord {
            number,
            title: title.to_string(),
            head: head.to_string(),
            base: base.to_string(),
            body: body.to_string(),
        });
        state.mutations.push(format!("open pull request #{number}"));
        Ok(PullRequest { number })
    }

    async fn update_pull_request_body(&self, number: u64, body: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let pull = state
            .pulls
            .iter_mut()
            .find(|pull| pull.number == number)
            .ok_or_else(|| DeppyError::SourceControl(format!("No pull request #{number}")))?;
        pull.body = body.to_string();
        state.mutations.push(format!("update pull request #{number}"));
        Ok(())
    }
}

/// Checkout backed by a temporary directory, re-seeded on every `prepare`.
/// Dirty files are the seeded files whose content changed.
pub struct FakeWorkingTree {
    dir: TempDir,
    seeds: Vec<(String, String)>,
    prepared: AtomicUsize,
}

impl FakeWorkingTree {
    pub fn new(seeds: &[(&str, &str)]) -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            seeds: seeds
                .iter()
                .map(|(path, content)| (path.to_string(), content.to_string()))
                .collect(),
            prepared: AtomicUsize::new(0),
        }
    }

    pub fn prepared(&self) -> usize {
        self.prepared.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkingTree for FakeWorkingTree {
    async fn prepare(&self) -> Result<WorkTree> {
        self.prepared.fetch_add(1, Ordering::SeqCst);
        let tree = WorkTree::new(self.dir.path())?;
        for (path, content) in &self.seeds {
            tree.write_text(path, content).await?;
        }
        Ok(tree)
    }

    async fn dirty_files(&self, tree: &WorkTree) -> Result<Vec<String>> {
        let mut dirty = Vec::new();
        for (path, seeded) in &self.seeds {
            if tree.read_optional(path).await?.as_deref() != Some(seeded.as_str()) {
                dirty.push(path.clone());
            }
        }
        Ok(dirty)
    }
}

/// Provider handing out a fixed set of engines.
pub struct StaticEngines {
    engines: Vec<Arc<dyn UpdateEngine>>,
}

impl StaticEngines {
    pub fn new(engines: Vec<Arc<dyn UpdateEngine>>) -> Self {
        Self { engines }
    }
}

#[async_trait]
impl crate::workflow::EngineProvider for StaticEngines {
    async fn engines(&self, _tree: &WorkTree) -> Result<Vec<Arc<dyn UpdateEngine>>> {
        Ok(self.engines.clone())
    }
}
