use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use cricket_graph::config::TournamentProfile;
use cricket_graph::error::StoreError;
use cricket_graph::graph::{Label, Node, NodeRef, RelKind, Relationship, Upsert};
use cricket_graph::import::{ImportPhase, ImportSummary, Importer, discover_files};
use cricket_graph::season::PENDING_WINNER;
use cricket_graph::store::{GraphStore, SqliteGraph};

const RELS: [RelKind; 19] = [
    RelKind::HasSeason,
    RelKind::ParticipatesIn,
    RelKind::PlayedIn,
    RelKind::PlaysFor,
    RelKind::HasPlayer,
    RelKind::OfficiatedBy,
    RelKind::PlayedAt,
    RelKind::HasMatch,
    RelKind::HasInnings,
    RelKind::HasOver,
    RelKind::HasDelivery,
    RelKind::HasPhase,
    RelKind::BowledBy,
    RelKind::BattedBy,
    RelKind::ResultsIn,
    RelKind::FieldedBy,
    RelKind::WonBy,
    RelKind::HasPlayerPerformance,
    RelKind::PerformanceOf,
];

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn edited_fixture(name: &str, edit: impl FnOnce(&mut Value)) -> String {
    let mut doc: Value = serde_json::from_str(&read_fixture(name)).expect("fixture json");
    edit(&mut doc);
    doc.to_string()
}

fn write_corpus(dir: &Path, files: &[(&str, String)]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|(name, raw)| {
            let path = dir.join(name);
            fs::write(&path, raw).expect("write corpus file");
            path
        })
        .collect()
}

fn import(store: &SqliteGraph, files: &[PathBuf], workers: usize) -> ImportSummary {
    let profile = TournamentProfile::default();
    let mut importer = Importer::new(store, &profile, workers);
    let summary = importer.run(files).expect("tournament root written");
    assert_eq!(importer.phase(), ImportPhase::Done);
    summary
}

fn snapshot(store: &SqliteGraph) -> (Vec<u64>, Vec<u64>) {
    let nodes = Label::ALL
        .iter()
        .map(|l| store.node_count(*l).expect("count"))
        .collect();
    let rels = RELS
        .iter()
        .map(|k| store.relationship_count(*k).expect("count"))
        .collect();
    (nodes, rels)
}

fn season(store: &SqliteGraph, year: &str) -> Value {
    store
        .node_properties(Label::Season, year)
        .expect("query")
        .expect("season node")
}

#[test]
fn imports_corpus_and_isolates_bad_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let no_season = edited_fixture("final_match.json", |doc| {
        doc["info"].as_object_mut().expect("info").remove("season");
    });
    write_corpus(
        dir.path(),
        &[
            ("final.json", read_fixture("final_match.json")),
            ("legacy.json", read_fixture("legacy_match.json")),
            ("broken.json", "{\"info\": ".to_string()),
            ("no_season.json", no_season),
        ],
    );
    let files = discover_files(&[dir.path().to_path_buf()]).expect("discover");
    assert_eq!(files.len(), 4);

    let store = SqliteGraph::open_in_memory().expect("store");
    let summary = import(&store, &files, 4);

    assert_eq!(summary.files_total, 4);
    assert_eq!(summary.files_imported, 2);
    assert_eq!(summary.unresolved, 0);
    assert_eq!(summary.seasons_written, vec!["2008", "2024"]);
    assert!(summary.season_failures.is_empty());

    let kinds = summary
        .failures
        .iter()
        .map(|f| {
            let name = f.path.file_name().expect("file name").to_string_lossy().to_string();
            (name, f.kind)
        })
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![
            ("broken.json".to_string(), "DecodeError"),
            ("no_season.json".to_string(), "MissingRequiredField"),
        ]
    );

    assert_eq!(store.node_count(Label::Tournament).unwrap(), 1);
    assert_eq!(store.node_count(Label::Match).unwrap(), 2);
    assert_eq!(store.node_count(Label::Season).unwrap(), 2);
    assert_eq!(store.node_count(Label::Delivery).unwrap(), 50);
    // Same registry ids in both files merge into one node each.
    assert_eq!(store.node_count(Label::Player).unwrap(), 7);
    assert_eq!(store.node_count(Label::Team).unwrap(), 2);

    let s = season(&store, "2024");
    assert_eq!(s["total_runs"], 27);
    assert_eq!(s["total_wickets"], 1);
    assert_eq!(s["number_of_matches"], 1);
    assert_eq!(s["highest_team_score"], 17);
    assert_eq!(s["lowest_team_score"], 10);
    assert_eq!(s["total_fours"], 2);
    assert_eq!(s["total_sixes"], 1);
    assert_eq!(s["number_of_teams"], 2);
    assert_eq!(s["winner"], "Alpha Kings");
    assert_eq!(s["format"], "T20");

    let tournament = NodeRef::new(Label::Tournament, "Indian Premier League");
    assert_eq!(
        store.targets(&tournament, RelKind::HasSeason).unwrap(),
        vec!["2008".to_string(), "2024".to_string()]
    );
    assert!(
        store
            .has_relationship(&Relationship::new(
                NodeRef::new(Label::Season, "2024"),
                RelKind::HasMatch,
                NodeRef::new(Label::Match, "74_2024-05-26"),
            ))
            .unwrap()
    );
}

#[test]
fn second_run_changes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = write_corpus(
        dir.path(),
        &[
            ("final.json", read_fixture("final_match.json")),
            ("legacy.json", read_fixture("legacy_match.json")),
        ],
    );
    let store = SqliteGraph::open(&dir.path().join("graph.sqlite")).expect("store");

    import(&store, &files, 3);
    let first = snapshot(&store);
    let match_props = store.node_properties(Label::Match, "74_2024-05-26").unwrap();
    let season_props = season(&store, "2024");

    import(&store, &files, 3);
    assert_eq!(snapshot(&store), first);
    assert_eq!(
        store.node_properties(Label::Match, "74_2024-05-26").unwrap(),
        match_props
    );
    assert_eq!(season(&store, "2024"), season_props);
}

fn season_corpus(dir: &Path) -> Vec<PathBuf> {
    let league = edited_fixture("final_match.json", |doc| {
        doc["info"]["event"]["match_number"] = Value::from(10);
        doc["info"]["event"]["stage"] = Value::from("Group Stage");
        doc["info"]["dates"] = serde_json::json!(["2024-04-02"]);
        doc["info"]["outcome"] = serde_json::json!({"winner": "Beta Riders", "by": {"wickets": 8}});
        doc["innings"][0]["overs"][0]["deliveries"][0]["runs"] =
            serde_json::json!({"batter": 4, "extras": 0, "total": 4});
    });
    let replay = edited_fixture("final_match.json", |doc| {
        doc["info"]["event"]["match_number"] = Value::from(75);
        doc["info"]["dates"] = serde_json::json!(["2024-05-27"]);
        doc["info"]["outcome"] = serde_json::json!({"eliminator": "Beta Riders", "result": "tie"});
        doc["info"]["outcome"]["method"] = Value::from("D/L");
    });
    write_corpus(
        dir,
        &[
            ("a.json", read_fixture("final_match.json")),
            ("b.json", league),
            ("c.json", replay),
        ],
    )
}

#[test]
fn season_totals_do_not_depend_on_file_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = season_corpus(dir.path());
    let orders = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    let mut seen = Vec::new();
    for order in orders {
        let ordered = order.iter().map(|i| files[*i].clone()).collect::<Vec<_>>();
        let store = SqliteGraph::open_in_memory().expect("store");
        let summary = import(&store, &ordered, 1);
        assert_eq!(summary.files_imported, 3);
        seen.push(season(&store, "2024"));
    }
    for s in &seen[1..] {
        assert_eq!(s, &seen[0]);
    }

    let s = &seen[0];
    assert_eq!(s["number_of_matches"], 3);
    assert_eq!(s["total_runs"], 27 + 31 + 27);
    assert_eq!(s["highest_team_score"], 21);
    assert_eq!(s["lowest_team_score"], 10);
    assert_eq!(s["total_fours"], 7);
    assert_eq!(s["super_over_matches"], 1);
    assert_eq!(s["duckworth_lewis_matches"], 1);
    // The later of the two finals decides the season.
    assert_eq!(s["winner"], "Beta Riders");
}

#[test]
fn season_without_final_keeps_placeholder_winner() {
    let dir = tempfile::tempdir().expect("tempdir");
    let group = edited_fixture("final_match.json", |doc| {
        doc["info"]["event"]["stage"] = Value::from("Group Stage");
    });
    let files = write_corpus(dir.path(), &[("group.json", group)]);
    let store = SqliteGraph::open_in_memory().expect("store");
    import(&store, &files, 2);

    assert_eq!(season(&store, "2024")["winner"], PENDING_WINNER);
    let m = store
        .node_properties(Label::Match, "74_2024-05-26")
        .unwrap()
        .expect("match");
    assert_eq!(m["playoffs"], false);
}

/// Fails every write that touches one match, the way an unreachable store would.
struct FailingOn<'a> {
    inner: &'a SqliteGraph,
    match_id: &'a str,
}

impl GraphStore for FailingOn<'_> {
    fn upsert(&self, op: &Upsert) -> Result<(), StoreError> {
        if let Upsert::Node(Node::Match(m)) = op
            && m.match_id == self.match_id
        {
            return Err(StoreError::Poisoned);
        }
        self.inner.upsert(op)
    }
}

#[test]
fn store_failure_skips_file_and_its_season_delta() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = season_corpus(dir.path());
    let sqlite = SqliteGraph::open_in_memory().expect("store");
    let store = FailingOn {
        inner: &sqlite,
        match_id: "10_2024-04-02",
    };
    let profile = TournamentProfile::default();
    let summary = Importer::new(&store, &profile, 3)
        .run(&files)
        .expect("tournament root written");

    assert_eq!(summary.files_imported, 2);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].kind, "StoreWriteError");
    assert!(summary.failures[0].path.ends_with("b.json"));

    let s = season(&sqlite, "2024");
    assert_eq!(s["number_of_matches"], 2);
    assert_eq!(s["total_runs"], 54);
    assert!(sqlite.node_properties(Label::Match, "10_2024-04-02").unwrap().is_none());
}
