use std::path::PathBuf;

use anyhow::{Result, anyhow};

use crate::graph::Tournament;

const CACHE_DIR: &str = "cricket_graph";
const DB_FILE: &str = "cricket_graph.sqlite";
const DEFAULT_TOURNAMENT: &str = "Indian Premier League";
const DEFAULT_WORKERS: usize = 8;
const MAX_WORKERS: usize = 64;

/// Descriptive attributes of the tournament root node.
#[derive(Debug, Clone, PartialEq)]
pub struct TournamentProfile {
    pub name: String,
    pub country: String,
    pub format: String,
    pub governing_body: String,
    pub founded: i32,
    pub inaugural_season: i32,
    pub gender: String,
    pub match_type: String,
    pub overs: u32,
    pub balls_per_over: u32,
    pub website: Option<String>,
    pub logo: Option<String>,
}

impl Default for TournamentProfile {
    fn default() -> Self {
        Self {
            name: DEFAULT_TOURNAMENT.to_string(),
            country: "India".to_string(),
            format: "T20".to_string(),
            governing_body: "BCCI".to_string(),
            founded: 2007,
            inaugural_season: 2008,
            gender: "male".to_string(),
            match_type: "T20".to_string(),
            overs: 20,
            balls_per_over: 6,
            website: Some("https://www.iplt20.com".to_string()),
            logo: Some("https://www.iplt20.com/assets/images/ipl-logo.png".to_string()),
        }
    }
}

impl TournamentProfile {
    pub fn to_node(&self) -> Tournament {
        Tournament {
            name: self.name.clone(),
            country: Some(self.country.clone()),
            format: Some(self.format.clone()),
            governing_body: Some(self.governing_body.clone()),
            founded: Some(self.founded),
            inaugural_season: Some(self.inaugural_season),
            gender: Some(self.gender.clone()),
            match_type: Some(self.match_type.clone()),
            overs: Some(self.overs),
            balls_per_over: Some(self.balls_per_over),
            website: self.website.clone(),
            logo: self.logo.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub db_path: PathBuf,
    pub source_dirs: Vec<PathBuf>,
    pub tournament: TournamentProfile,
    pub workers: usize,
    pub log_file: Option<PathBuf>,
}

impl ImportConfig {
    /// Command-line flags win over environment values.
    pub fn resolve(args: &[String], env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let db_path = flag_value(args, "--db")
            .or_else(|| env("CRICKET_GRAPH_DB"))
            .map(PathBuf::from)
            .or_else(|| default_db_path(&env))
            .ok_or_else(|| anyhow!("unable to resolve sqlite path (set CRICKET_GRAPH_DB or --db)"))?;

        let mut source_dirs = flag_values(args, "--dirs")
            .iter()
            .flat_map(|raw| split_list(raw))
            .collect::<Vec<_>>();
        if source_dirs.is_empty()
            && let Some(raw) = env("CRICKET_JSON_DIRS")
        {
            source_dirs = split_list(&raw);
        }
        if source_dirs.is_empty() {
            return Err(anyhow!(
                "no source directories given (set CRICKET_JSON_DIRS or --dirs)"
            ));
        }

        let mut tournament = TournamentProfile::default();
        if let Some(name) = flag_value(args, "--tournament").or_else(|| env("TOURNAMENT_NAME")) {
            tournament.name = name;
        }
        if let Some(country) = env("TOURNAMENT_COUNTRY") {
            tournament.country = country;
        }
        if let Some(format) = env("TOURNAMENT_FORMAT") {
            tournament.format = format;
        }
        if let Some(body) = env("TOURNAMENT_GOVERNING_BODY") {
            tournament.governing_body = body;
        }
        if let Some(founded) = env("TOURNAMENT_FOUNDED").and_then(|v| v.parse::<i32>().ok()) {
            tournament.founded = founded;
        }

        let workers = flag_value(args, "--workers")
            .or_else(|| env("IMPORT_PARALLELISM"))
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_WORKERS)
            .clamp(1, MAX_WORKERS);

        Ok(Self {
            db_path,
            source_dirs,
            tournament,
            workers,
            log_file: env("IMPORT_LOG_FILE").map(PathBuf::from),
        })
    }
}

fn default_db_path(env: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(base) = env("XDG_CACHE_HOME") {
        return Some(PathBuf::from(base).join(CACHE_DIR).join(DB_FILE));
    }
    let home = env("HOME")?;
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR).join(DB_FILE))
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    flag_values(args, flag).into_iter().next()
}

fn flag_values(args: &[String], flag: &str) -> Vec<String> {
    let prefix = format!("{flag}=");
    let mut out = Vec::new();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                out.push(trimmed.to_string());
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                out.push(next.trim().to_string());
            }
        }
    }
    out
}

fn split_list(raw: &str) -> Vec<PathBuf> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(PathBuf::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn flags_override_environment() {
        let cfg = ImportConfig::resolve(
            &args(&["--db", "/tmp/a.sqlite", "--dirs=/data/s1,/data/s2", "--workers", "3"]),
            env_of(&[
                ("CRICKET_GRAPH_DB", "/tmp/env.sqlite"),
                ("CRICKET_JSON_DIRS", "/env/dir"),
                ("IMPORT_PARALLELISM", "12"),
            ]),
        )
        .expect("config resolves");
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/a.sqlite"));
        assert_eq!(
            cfg.source_dirs,
            vec![PathBuf::from("/data/s1"), PathBuf::from("/data/s2")]
        );
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.tournament.name, "Indian Premier League");
    }

    #[test]
    fn environment_fills_in_and_workers_are_clamped() {
        let cfg = ImportConfig::resolve(
            &[],
            env_of(&[
                ("HOME", "/home/u"),
                ("CRICKET_JSON_DIRS", "/a; /b"),
                ("IMPORT_PARALLELISM", "500"),
                ("TOURNAMENT_NAME", "Big Bash League"),
                ("TOURNAMENT_COUNTRY", "Australia"),
            ]),
        )
        .expect("config resolves");
        assert_eq!(
            cfg.db_path,
            PathBuf::from("/home/u/.cache/cricket_graph/cricket_graph.sqlite")
        );
        assert_eq!(cfg.source_dirs.len(), 2);
        assert_eq!(cfg.workers, MAX_WORKERS);
        assert_eq!(cfg.tournament.name, "Big Bash League");
        assert_eq!(cfg.tournament.country, "Australia");
        assert!(cfg.log_file.is_none());
    }

    #[test]
    fn missing_source_dirs_is_an_error() {
        let err = ImportConfig::resolve(&[], env_of(&[("HOME", "/home/u")])).unwrap_err();
        assert!(err.to_string().contains("no source directories"));
    }
}
