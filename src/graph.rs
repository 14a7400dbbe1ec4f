//! Node and relationship records produced by the transformer.
//!
//! Each label has a fixed field set. `None` means "not set by this write": unset
//! fields are left out of the serialized properties, so an upsert never clears
//! a value written earlier.

use serde::Serialize;
use serde_json::Value;

use crate::scoring::{DeliveryKind, Phase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    Tournament,
    Season,
    Team,
    Venue,
    Official,
    Player,
    Match,
    Innings,
    Over,
    Delivery,
    Dismissal,
    PlayerMatchPerformance,
    Phase,
}

impl Label {
    pub const ALL: [Label; 13] = [
        Label::Tournament,
        Label::Season,
        Label::Team,
        Label::Venue,
        Label::Official,
        Label::Player,
        Label::Match,
        Label::Innings,
        Label::Over,
        Label::Delivery,
        Label::Dismissal,
        Label::PlayerMatchPerformance,
        Label::Phase,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Tournament => "Tournament",
            Label::Season => "Season",
            Label::Team => "Team",
            Label::Venue => "Venue",
            Label::Official => "Official",
            Label::Player => "Player",
            Label::Match => "Match",
            Label::Innings => "Innings",
            Label::Over => "Over",
            Label::Delivery => "Delivery",
            Label::Dismissal => "Dismissal",
            Label::PlayerMatchPerformance => "PlayerMatchPerformance",
            Label::Phase => "Phase",
        }
    }

    /// Property holding the merge key.
    pub fn key_field(self) -> &'static str {
        match self {
            Label::Tournament | Label::Team | Label::Venue | Label::Official => "name",
            Label::Season => "year",
            Label::Player => "registry_id",
            Label::Match => "match_id",
            Label::Innings => "innings_key",
            Label::Over => "over_key",
            Label::Delivery => "delivery_key",
            Label::Dismissal => "wicket_key",
            Label::PlayerMatchPerformance => "performance_key",
            Label::Phase => "phase_key",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelKind {
    HasSeason,
    ParticipatesIn,
    PlayedIn,
    PlaysFor,
    HasPlayer,
    OfficiatedBy,
    PlayedAt,
    HasMatch,
    HasInnings,
    HasOver,
    HasDelivery,
    HasPhase,
    BowledBy,
    BattedBy,
    ResultsIn,
    FieldedBy,
    WonBy,
    HasPlayerPerformance,
    PerformanceOf,
}

impl RelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RelKind::HasSeason => "HAS_SEASON",
            RelKind::ParticipatesIn => "PARTICIPATES_IN",
            RelKind::PlayedIn => "PLAYED_IN",
            RelKind::PlaysFor => "PLAYS_FOR",
            RelKind::HasPlayer => "HAS_PLAYER",
            RelKind::OfficiatedBy => "OFFICIATED_BY",
            RelKind::PlayedAt => "PLAYED_AT",
            RelKind::HasMatch => "HAS_MATCH",
            RelKind::HasInnings => "HAS_INNINGS",
            RelKind::HasOver => "HAS_OVER",
            RelKind::HasDelivery => "HAS_DELIVERY",
            RelKind::HasPhase => "HAS_PHASE",
            RelKind::BowledBy => "BOWLED_BY",
            RelKind::BattedBy => "BATTED_BY",
            RelKind::ResultsIn => "RESULTS_IN",
            RelKind::FieldedBy => "FIELDED_BY",
            RelKind::WonBy => "WON_BY",
            RelKind::HasPlayerPerformance => "HAS_PLAYER_PERFORMANCE",
            RelKind::PerformanceOf => "PERFORMANCE_OF",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub label: Label,
    pub key: String,
}

impl NodeRef {
    pub fn new(label: Label, key: impl Into<String>) -> Self {
        Self {
            label,
            key: key.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relationship {
    pub kind: RelKind,
    pub from: NodeRef,
    pub to: NodeRef,
}

impl Relationship {
    pub fn new(from: NodeRef, kind: RelKind, to: NodeRef) -> Self {
        Self { kind, from, to }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Tournament {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub governing_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub founded: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inaugural_season: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balls_per_over: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Season {
    pub year: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_runs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_wickets: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_matches: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highest_team_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lowest_team_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_sixes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_fours: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_teams: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub super_over_matches: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duckworth_lewis_matches: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Team {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Venue {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Official {
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Player {
    pub registry_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Match {
    pub match_id: String,
    pub date: String,
    pub season: String,
    pub match_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tournament: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_overs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balls_per_over: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toss_winner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toss_decision: Option<String>,
    pub player_of_match: Vec<String>,
    pub result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub won_by_runs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub won_by_wickets: Option<u32>,
    pub had_super_over: bool,
    pub duckworth_lewis: bool,
    pub playoffs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Innings {
    pub innings_key: String,
    pub match_id: String,
    pub innings_number: u32,
    pub team: String,
    pub runs: u32,
    pub wickets: u32,
    pub total_overs: u32,
    pub legal_balls: u32,
    pub is_super_over: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Over {
    pub over_key: String,
    pub match_id: String,
    pub innings_number: u32,
    pub number: u32,
    pub team: String,
    pub runs: u32,
    pub legal_balls: u32,
    pub wickets: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub delivery_key: String,
    pub match_id: String,
    pub innings_number: u32,
    pub over_number: u32,
    pub ball_number: String,
    pub delivery_index: u32,
    pub legal_ball_in_over: u32,
    pub batter: String,
    pub bowler: String,
    pub non_striker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batter_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bowler_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub non_striker_id: Option<String>,
    pub runs_batter: u32,
    pub runs_extras: u32,
    pub total_runs: u32,
    pub is_legal: bool,
    pub is_wicket: bool,
    pub delivery_type: DeliveryKind,
    // Absent for super-over deliveries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dismissal {
    pub wicket_key: String,
    pub match_id: String,
    pub innings_number: u32,
    pub over_number: u32,
    pub ball_number: String,
    pub kind: String,
    pub player_out: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_out_id: Option<String>,
    pub fielders: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseSummary {
    pub phase_key: String,
    pub innings_key: String,
    pub phase: Phase,
    pub runs: u32,
    pub balls: u32,
    pub wickets: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Discipline {
    Batting,
    Bowling,
    Fielding,
}

impl Discipline {
    pub fn as_str(self) -> &'static str {
        match self {
            Discipline::Batting => "Batting",
            Discipline::Bowling => "Bowling",
            Discipline::Fielding => "Fielding",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BattingFigures {
    pub runs: u32,
    pub balls_faced: u32,
    pub fours: u32,
    pub sixes: u32,
    pub strike_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BowlingFigures {
    pub balls_bowled: u32,
    pub runs_conceded: u32,
    pub wickets: u32,
    pub wides: u32,
    pub no_balls: u32,
    pub economy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldingFigures {
    pub catches: u32,
    pub run_outs: u32,
    pub stumpings: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Figures {
    Batting(BattingFigures),
    Bowling(BowlingFigures),
    Fielding(FieldingFigures),
}

impl Figures {
    pub fn discipline(&self) -> Discipline {
        match self {
            Figures::Batting(_) => Discipline::Batting,
            Figures::Bowling(_) => Discipline::Bowling,
            Figures::Fielding(_) => Discipline::Fielding,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerMatchPerformance {
    pub performance_key: String,
    pub match_id: String,
    pub player_id: String,
    #[serde(rename = "type")]
    pub discipline: Discipline,
    #[serde(flatten)]
    pub figures: Figures,
}

impl PlayerMatchPerformance {
    pub fn new(match_id: &str, player_id: &str, figures: Figures) -> Self {
        let discipline = figures.discipline();
        Self {
            performance_key: format!("{match_id}_{player_id}_{}", discipline.as_str()),
            match_id: match_id.to_string(),
            player_id: player_id.to_string(),
            discipline,
            figures,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Tournament(Tournament),
    Season(Season),
    Team(Team),
    Venue(Venue),
    Official(Official),
    Player(Player),
    Match(Match),
    Innings(Innings),
    Over(Over),
    Delivery(Delivery),
    Dismissal(Dismissal),
    Performance(PlayerMatchPerformance),
    Phase(PhaseSummary),
}

impl Node {
    pub fn label(&self) -> Label {
        match self {
            Node::Tournament(_) => Label::Tournament,
            Node::Season(_) => Label::Season,
            Node::Team(_) => Label::Team,
            Node::Venue(_) => Label::Venue,
            Node::Official(_) => Label::Official,
            Node::Player(_) => Label::Player,
            Node::Match(_) => Label::Match,
            Node::Innings(_) => Label::Innings,
            Node::Over(_) => Label::Over,
            Node::Delivery(_) => Label::Delivery,
            Node::Dismissal(_) => Label::Dismissal,
            Node::Performance(_) => Label::PlayerMatchPerformance,
            Node::Phase(_) => Label::Phase,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Node::Tournament(n) => &n.name,
            Node::Season(n) => &n.year,
            Node::Team(n) => &n.name,
            Node::Venue(n) => &n.name,
            Node::Official(n) => &n.name,
            Node::Player(n) => &n.registry_id,
            Node::Match(n) => &n.match_id,
            Node::Innings(n) => &n.innings_key,
            Node::Over(n) => &n.over_key,
            Node::Delivery(n) => &n.delivery_key,
            Node::Dismissal(n) => &n.wicket_key,
            Node::Performance(n) => &n.performance_key,
            Node::Phase(n) => &n.phase_key,
        }
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.label(), self.key())
    }

    pub fn properties(&self) -> serde_json::Result<Value> {
        match self {
            Node::Tournament(n) => serde_json::to_value(n),
            Node::Season(n) => serde_json::to_value(n),
            Node::Team(n) => serde_json::to_value(n),
            Node::Venue(n) => serde_json::to_value(n),
            Node::Official(n) => serde_json::to_value(n),
            Node::Player(n) => serde_json::to_value(n),
            Node::Match(n) => serde_json::to_value(n),
            Node::Innings(n) => serde_json::to_value(n),
            Node::Over(n) => serde_json::to_value(n),
            Node::Delivery(n) => serde_json::to_value(n),
            Node::Dismissal(n) => serde_json::to_value(n),
            Node::Performance(n) => serde_json::to_value(n),
            Node::Phase(n) => serde_json::to_value(n),
        }
    }
}

/// One unit of work for the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Upsert {
    Node(Node),
    Relationship(Relationship),
}
