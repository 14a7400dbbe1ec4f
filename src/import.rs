use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::config::TournamentProfile;
use crate::error::{IngestError, StoreError};
use crate::graph::{Label, Node, NodeRef, RelKind, Relationship, Upsert};
use crate::record::load_match;
use crate::season::{SeasonAggregator, SeasonDelta};
use crate::store::{GraphStore, apply_all};
use crate::transform::transform_match;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPhase {
    Idle,
    Dispatching,
    AwaitingCompletion,
    Aggregating,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub kind: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub files_total: usize,
    pub files_imported: usize,
    pub upserts_applied: usize,
    pub unresolved: usize,
    pub seasons_written: Vec<String>,
    pub failures: Vec<FileFailure>,
    pub season_failures: Vec<String>,
}

impl ImportSummary {
    pub fn error_lines(&self) -> Vec<String> {
        let files = self
            .failures
            .iter()
            .map(|f| format!("{} [{}]: {}", f.path.display(), f.kind, f.reason));
        files.chain(self.season_failures.iter().cloned()).collect()
    }
}

struct ImportedFile {
    season: String,
    delta: SeasonDelta,
    upserts: usize,
    unresolved: usize,
}

/// Lists the `*.json` files of every directory, sorted, each path once.
pub fn discover_files(dirs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = BTreeSet::new();
    for dir in dirs {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "source directory not found, skipping");
            continue;
        }
        let pattern = dir.join("*.json");
        let pattern = pattern.to_string_lossy();
        let entries =
            glob::glob(&pattern).with_context(|| format!("invalid glob pattern {pattern}"))?;
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => {
                    files.insert(path);
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "unreadable directory entry"),
            }
        }
    }
    Ok(files.into_iter().collect())
}

/// Drives one import run: file tasks on a bounded pool, then a single season
/// write after every task has returned.
pub struct Importer<'a, S: GraphStore> {
    store: &'a S,
    tournament: &'a TournamentProfile,
    workers: usize,
    phase: ImportPhase,
}

impl<'a, S: GraphStore> Importer<'a, S> {
    pub fn new(store: &'a S, tournament: &'a TournamentProfile, workers: usize) -> Self {
        Self {
            store,
            tournament,
            workers: workers.max(1),
            phase: ImportPhase::Idle,
        }
    }

    pub fn phase(&self) -> ImportPhase {
        self.phase
    }

    fn enter(&mut self, phase: ImportPhase) {
        info!(from = ?self.phase, to = ?phase, "import phase");
        self.phase = phase;
    }

    /// Per-file problems end up in the summary. The only error returned is a
    /// failure to write the tournament root, before any file is dispatched.
    pub fn run(&mut self, files: &[PathBuf]) -> Result<ImportSummary, StoreError> {
        let tournament_node = Node::Tournament(self.tournament.to_node());
        let tournament_ref = tournament_node.node_ref();
        self.store.upsert(&Upsert::Node(tournament_node))?;

        let mut summary = ImportSummary {
            files_total: files.len(),
            ..ImportSummary::default()
        };
        let mut aggregator = SeasonAggregator::new();

        self.enter(ImportPhase::Dispatching);
        let outcomes = self.dispatch(files);

        self.enter(ImportPhase::Aggregating);
        for (path, outcome) in outcomes {
            match outcome {
                Ok(imported) => {
                    summary.files_imported += 1;
                    summary.upserts_applied += imported.upserts;
                    summary.unresolved += imported.unresolved;
                    aggregator.merge(&imported.season, &imported.delta);
                }
                Err(err) => summary.failures.push(FileFailure {
                    path,
                    kind: err.kind(),
                    reason: err.to_string(),
                }),
            }
        }
        summary.failures.sort_by(|a, b| a.path.cmp(&b.path));

        for year in aggregator.years().map(str::to_string).collect::<Vec<_>>() {
            let Some(stats) = aggregator.finalize(&year) else {
                continue;
            };
            let season = Node::Season(stats.to_node(Some(&self.tournament.format)));
            let link = Relationship::new(
                tournament_ref.clone(),
                RelKind::HasSeason,
                NodeRef::new(Label::Season, year.clone()),
            );
            let written = self
                .store
                .upsert(&Upsert::Node(season))
                .and_then(|()| self.store.upsert(&Upsert::Relationship(link)));
            match written {
                Ok(()) => {
                    info!(
                        season = %year,
                        matches = stats.matches,
                        runs = stats.total_runs,
                        winner = %stats.winner,
                        "season written"
                    );
                    summary.upserts_applied += 2;
                    summary.seasons_written.push(year);
                }
                Err(err) => {
                    error!(season = %year, error = %err, "season write failed");
                    summary.season_failures.push(format!("season {year}: {err}"));
                }
            }
        }

        self.enter(ImportPhase::Done);
        info!(
            files = summary.files_total,
            imported = summary.files_imported,
            failed = summary.failures.len(),
            seasons = summary.seasons_written.len(),
            "import finished"
        );
        Ok(summary)
    }

    fn dispatch(
        &mut self,
        files: &[PathBuf],
    ) -> Vec<(PathBuf, Result<ImportedFile, IngestError>)> {
        let store = self.store;
        let tournament = self.tournament;
        let (tx, rx) = mpsc::channel();

        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|idx| format!("ingest-{idx}"))
            .build()
        {
            Ok(pool) => pool.scope(|scope| {
                for path in files {
                    let tx = tx.clone();
                    scope.spawn(move |_| {
                        let outcome = import_file(store, tournament, path);
                        tx.send((path.clone(), outcome)).ok();
                    });
                }
                self.enter(ImportPhase::AwaitingCompletion);
            }),
            Err(err) => {
                warn!(error = %err, "worker pool unavailable, importing on the calling thread");
                for path in files {
                    tx.send((path.clone(), import_file(store, tournament, path)))
                        .ok();
                }
                self.enter(ImportPhase::AwaitingCompletion);
            }
        }
        drop(tx);
        rx.into_iter().collect()
    }
}

fn import_file<S: GraphStore>(
    store: &S,
    tournament: &TournamentProfile,
    path: &Path,
) -> Result<ImportedFile, IngestError> {
    let outcome = load_match(path).and_then(|m| {
        let batch = transform_match(&m, tournament);
        for issue in &batch.unresolved {
            warn!(file = %path.display(), match_id = %batch.match_id, "{issue}");
        }
        let upserts = apply_all(store, &batch.upserts)?;
        Ok((batch, upserts))
    });

    match outcome {
        Ok((batch, upserts)) => {
            info!(
                file = %path.display(),
                match_id = %batch.match_id,
                season = %batch.season,
                upserts,
                "match imported"
            );
            Ok(ImportedFile {
                season: batch.season,
                delta: batch.delta,
                upserts,
                unresolved: batch.unresolved.len(),
            })
        }
        Err(err) => {
            error!(file = %path.display(), kind = err.kind(), error = %err, "match skipped");
            Err(err)
        }
    }
}
