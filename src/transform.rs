//! Maps one validated match record onto graph upserts.
//!
//! The walk over innings, overs and deliveries happens once; every derived field
//! (ball numbering, phase, legality, player figures, season delta) is computed
//! on the way. Structural problems below the match level are collected as
//! [`Unresolved`] entries and never abort the transformation.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::config::TournamentProfile;
use crate::graph::{
    BattingFigures, BowlingFigures, Delivery, Dismissal, FieldingFigures, Figures, Innings, Label,
    Match, Node, NodeRef, Official, Over, PhaseSummary, Player, PlayerMatchPerformance, RelKind,
    Relationship, Season, Team, Upsert, Venue,
};
use crate::record::{Outcome, RawDelivery, RawInnings, RawOver, ValidatedMatch};
use crate::scoring::{
    self, DeliveryKind, FieldingCredit, LEGAL_BALLS_PER_OVER, Phase, bowler_conceded,
    credits_bowler, fielding_credit,
};
use crate::season::{FinalResult, SeasonDelta};

/// Everything one match file contributes to the store and to its season.
#[derive(Debug, Clone)]
pub struct MatchBatch {
    pub match_id: String,
    pub season: String,
    pub upserts: Vec<Upsert>,
    pub delta: SeasonDelta,
    pub unresolved: Vec<Unresolved>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Unresolved {
    MalformedInnings { innings: u32, reason: String },
    MissingInningsTeam { innings: u32 },
    UnknownTeam { team: String },
    UnregisteredPlayer { name: String },
    UnknownParticipant { role: &'static str, name: String, ball: String },
    MissingOverNumber { innings: u32 },
    CarriedDeliveries { innings: u32, from_over: u32, count: usize },
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unresolved::MalformedInnings { innings, reason } => {
                write!(f, "innings {innings} skipped: {reason}")
            }
            Unresolved::MissingInningsTeam { innings } => {
                write!(f, "innings {innings} skipped: missing team name")
            }
            Unresolved::UnknownTeam { team } => write!(f, "team '{team}' is not one of the match teams"),
            Unresolved::UnregisteredPlayer { name } => {
                write!(f, "no registry id for player '{name}'")
            }
            Unresolved::UnknownParticipant { role, name, ball } => {
                write!(f, "{role} '{name}' at ball {ball} is not a known player")
            }
            Unresolved::MissingOverNumber { innings } => {
                write!(f, "over without number in innings {innings} skipped")
            }
            Unresolved::CarriedDeliveries {
                innings,
                from_over,
                count,
            } => write!(
                f,
                "{count} deliveries past the sixth legal ball of over {from_over} (innings {innings}) moved to the next over"
            ),
        }
    }
}

pub fn transform_match(m: &ValidatedMatch, tournament: &TournamentProfile) -> MatchBatch {
    let info = &m.record.info;
    let match_id = m.match_id();
    let mut out = Emitter::default();
    let mut delta = SeasonDelta {
        matches: 1,
        ..SeasonDelta::default()
    };

    let tournament_ref = NodeRef::new(Label::Tournament, tournament.name.clone());
    let season_ref = out.node(Node::Season(Season {
        year: m.season.clone(),
        ..Season::default()
    }));
    out.link(&tournament_ref, RelKind::HasSeason, &season_ref);

    let mut team_refs = BTreeMap::new();
    for team in &m.teams {
        let team_ref = out.node(Node::Team(Team { name: team.clone() }));
        out.link(&team_ref, RelKind::ParticipatesIn, &tournament_ref);
        delta.teams.insert(team.clone());
        team_refs.insert(team.as_str(), team_ref);
    }

    let parsed_innings = m
        .record
        .innings
        .iter()
        .enumerate()
        .map(|(idx, raw)| (idx as u32 + 1, normalize_innings(raw)))
        .collect::<Vec<_>>();
    let has_super_over_innings = parsed_innings
        .iter()
        .any(|(_, parsed)| matches!(parsed, Ok(inn) if inn.super_over));

    let outcome = resolve_outcome(&info.outcome);
    let duckworth_lewis = info.outcome.method.as_deref() == Some("D/L");
    if outcome.by_super_over {
        delta.super_over_matches += 1;
    }
    if duckworth_lewis {
        delta.duckworth_lewis_matches += 1;
    }

    let stage = info.event.stage.clone();
    let match_ref = out.node(Node::Match(Match {
        match_id: match_id.clone(),
        date: m.date.clone(),
        season: m.season.clone(),
        match_number: m.match_number.clone(),
        tournament: Some(
            info.event
                .name
                .clone()
                .unwrap_or_else(|| tournament.name.clone()),
        ),
        stage: stage.clone(),
        venue: info.venue.clone(),
        city: info.city.clone(),
        match_type: info.match_type.clone(),
        gender: info.gender.clone(),
        total_overs: info.overs,
        balls_per_over: info.balls_per_over,
        toss_winner: info.toss.winner.clone(),
        toss_decision: info.toss.decision.clone(),
        player_of_match: info
            .player_of_match
            .clone()
            .map(|p| p.into_vec())
            .unwrap_or_default(),
        result: outcome.result.clone(),
        winner: outcome.winner.clone(),
        won_by_runs: outcome.winner.as_ref().and(info.outcome.by.runs),
        won_by_wickets: outcome.winner.as_ref().and(info.outcome.by.wickets),
        had_super_over: outcome.by_super_over || has_super_over_innings,
        duckworth_lewis,
        playoffs: stage
            .as_deref()
            .is_some_and(|s| !s.trim().eq_ignore_ascii_case("group stage")),
        data_version: m.record.meta.data_version.clone(),
        created: m.record.meta.created.clone(),
        revision: m.record.meta.revision,
    }));
    out.link(&season_ref, RelKind::HasMatch, &match_ref);

    if let Some(venue) = info.venue.as_ref().filter(|v| !v.trim().is_empty()) {
        let venue_ref = out.node(Node::Venue(Venue {
            name: venue.clone(),
            city: info.city.clone(),
        }));
        out.link(&match_ref, RelKind::PlayedAt, &venue_ref);
    }

    for (role, names) in &info.officials {
        for name in names {
            let official_ref = out.node(Node::Official(Official {
                name: name.clone(),
                role: role.clone(),
            }));
            out.link(&match_ref, RelKind::OfficiatedBy, &official_ref);
        }
    }

    for team_ref in team_refs.values() {
        out.link(team_ref, RelKind::PlayedIn, &match_ref);
    }
    if let Some(winner) = outcome.winner.as_deref()
        && let Some(team_ref) = team_refs.get(winner)
    {
        out.link(&match_ref, RelKind::WonBy, team_ref);
    }

    let mut players = HashMap::new();
    for (team, names) in &info.players {
        let Some(team_ref) = team_refs.get(team.as_str()) else {
            out.unresolved(Unresolved::UnknownTeam { team: team.clone() });
            continue;
        };
        for name in names {
            let Some(registry_id) = info.registry.people.get(name) else {
                out.unresolved(Unresolved::UnregisteredPlayer { name: name.clone() });
                continue;
            };
            let player_ref = out.node(Node::Player(Player {
                registry_id: registry_id.clone(),
                name: name.clone(),
            }));
            out.link(&player_ref, RelKind::PlaysFor, team_ref);
            out.link(team_ref, RelKind::HasPlayer, &player_ref);
            players.insert(name.clone(), registry_id.clone());
        }
    }

    let ctx = MatchContext {
        match_id: &match_id,
        match_ref: &match_ref,
        players: &players,
        duckworth_lewis,
    };
    let mut tallies: BTreeMap<String, PlayerTally> = BTreeMap::new();
    for (innings_no, parsed) in &parsed_innings {
        let innings = match parsed {
            Ok(innings) => innings,
            Err(reason) => {
                out.unresolved(Unresolved::MalformedInnings {
                    innings: *innings_no,
                    reason: reason.clone(),
                });
                continue;
            }
        };
        let Some(team) = innings.team.as_deref().filter(|t| !t.trim().is_empty()) else {
            out.unresolved(Unresolved::MissingInningsTeam {
                innings: *innings_no,
            });
            continue;
        };
        if !team_refs.contains_key(team) {
            out.unresolved(Unresolved::UnknownTeam {
                team: team.to_string(),
            });
            continue;
        }
        walk_innings(
            &ctx,
            *innings_no,
            team,
            innings,
            &mut out,
            &mut tallies,
            &mut delta,
        );
    }

    emit_performances(&ctx, &tallies, &mut out);

    if stage
        .as_deref()
        .is_some_and(|s| s.trim().eq_ignore_ascii_case("final"))
        && let Some(winner) = outcome.winner.clone()
    {
        delta.final_result = Some(FinalResult {
            date: m.date.clone(),
            match_id: match_id.clone(),
            winner,
        });
    }

    MatchBatch {
        match_id,
        season: m.season.clone(),
        upserts: out.upserts,
        delta,
        unresolved: out.unresolved,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOutcome {
    pub result: String,
    pub winner: Option<String>,
    pub by_super_over: bool,
}

/// Explicit winner first, then a super-over eliminator, then the source's own result text.
pub fn resolve_outcome(outcome: &Outcome) -> ResolvedOutcome {
    let named = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());

    if let Some(winner) = named(&outcome.winner) {
        let result = match (outcome.by.runs, outcome.by.wickets) {
            (Some(runs), _) if runs > 0 => format!("{winner} won by {runs} runs"),
            (_, Some(wickets)) if wickets > 0 => format!("{winner} won by {wickets} wickets"),
            _ => format!("{winner} won"),
        };
        return ResolvedOutcome {
            result,
            winner: Some(winner),
            by_super_over: false,
        };
    }
    if let Some(eliminator) = named(&outcome.eliminator) {
        return ResolvedOutcome {
            result: format!("{eliminator} won by super over"),
            winner: Some(eliminator),
            by_super_over: true,
        };
    }
    ResolvedOutcome {
        result: outcome
            .result
            .clone()
            .unwrap_or_else(|| "No result".to_string()),
        winner: None,
        by_super_over: false,
    }
}

/// Accepts both `{"1st innings": {...}}` and the flat `{"team": ..., "overs": [...]}` shape.
pub fn normalize_innings(raw: &Value) -> Result<RawInnings, String> {
    let Some(obj) = raw.as_object() else {
        return Err("innings entry is not an object".to_string());
    };
    let body = if obj.contains_key("team") {
        raw
    } else if obj.len() == 1 {
        match obj.values().next() {
            Some(inner) if inner.is_object() => inner,
            _ => return Err("wrapped innings is not an object".to_string()),
        }
    } else {
        return Err("unrecognized innings shape".to_string());
    };
    RawInnings::deserialize(body).map_err(|err| err.to_string())
}

/// One over as bowled: at most six legal deliveries.
#[derive(Debug, Clone)]
pub struct OverSlice<'a> {
    pub index: u32,
    pub deliveries: Vec<&'a RawDelivery>,
}

/// Splits the source overs so that no over holds more than six legal deliveries.
/// Surplus records move to the front of the following over; after the last source
/// over they open a new one.
pub fn split_overs<'a>(
    overs: &'a [RawOver],
    innings_no: u32,
    unresolved: &mut Vec<Unresolved>,
) -> Vec<OverSlice<'a>> {
    let mut out: Vec<OverSlice<'a>> = Vec::with_capacity(overs.len());
    let mut carry: Vec<&'a RawDelivery> = Vec::new();

    for raw in overs {
        let Some(index) = raw.over else {
            unresolved.push(Unresolved::MissingOverNumber { innings: innings_no });
            continue;
        };
        let queue = carry.drain(..).chain(raw.deliveries.iter()).collect::<Vec<_>>();
        let (taken, rest) = take_legal_over(queue);
        out.push(OverSlice {
            index,
            deliveries: taken,
        });
        if !rest.is_empty() {
            unresolved.push(Unresolved::CarriedDeliveries {
                innings: innings_no,
                from_over: index + 1,
                count: rest.len(),
            });
        }
        carry = rest;
    }

    while !carry.is_empty() {
        let index = out.last().map_or(0, |o| o.index + 1);
        let (taken, rest) = take_legal_over(std::mem::take(&mut carry));
        out.push(OverSlice {
            index,
            deliveries: taken,
        });
        carry = rest;
    }
    out
}

fn take_legal_over(queue: Vec<&RawDelivery>) -> (Vec<&RawDelivery>, Vec<&RawDelivery>) {
    let mut legal = 0;
    let mut split_at = queue.len();
    for (idx, d) in queue.iter().enumerate() {
        if DeliveryKind::of(&d.extras).is_legal() {
            legal += 1;
            if legal == LEGAL_BALLS_PER_OVER {
                split_at = idx + 1;
                break;
            }
        }
    }
    let mut taken = queue;
    let rest = taken.split_off(split_at);
    (taken, rest)
}

struct MatchContext<'a> {
    match_id: &'a str,
    match_ref: &'a NodeRef,
    players: &'a HashMap<String, String>,
    duckworth_lewis: bool,
}

impl MatchContext<'_> {
    fn player(&self, name: &str) -> Option<&str> {
        self.players.get(name).map(String::as_str)
    }
}

#[derive(Default)]
struct Emitter {
    upserts: Vec<Upsert>,
    unresolved: Vec<Unresolved>,
}

impl Emitter {
    fn node(&mut self, node: Node) -> NodeRef {
        let node_ref = node.node_ref();
        self.upserts.push(Upsert::Node(node));
        node_ref
    }

    fn link(&mut self, from: &NodeRef, kind: RelKind, to: &NodeRef) {
        self.upserts.push(Upsert::Relationship(Relationship::new(
            from.clone(),
            kind,
            to.clone(),
        )));
    }

    fn unresolved(&mut self, issue: Unresolved) {
        self.unresolved.push(issue);
    }
}

#[derive(Debug, Clone, Default)]
struct PlayerTally {
    runs: u32,
    balls_faced: u32,
    fours: u32,
    sixes: u32,
    balls_bowled: u32,
    runs_conceded: u32,
    wickets: u32,
    wides: u32,
    no_balls: u32,
    catches: u32,
    run_outs: u32,
    stumpings: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    runs: u32,
    legal_balls: u32,
    wickets: u32,
}

impl Totals {
    fn add(&mut self, d: &RawDelivery, legal: bool) {
        self.runs += d.runs.total;
        self.wickets += d.wickets.len() as u32;
        if legal {
            self.legal_balls += 1;
        }
    }
}

fn walk_innings(
    ctx: &MatchContext<'_>,
    innings_no: u32,
    team: &str,
    innings: &RawInnings,
    out: &mut Emitter,
    tallies: &mut BTreeMap<String, PlayerTally>,
    delta: &mut SeasonDelta,
) {
    let match_id = ctx.match_id;
    let super_over = innings.super_over;
    let innings_key = format!(
        "{match_id}_{innings_no}_{team}_{}",
        if super_over { "super_over" } else { "regular" }
    );
    let innings_ref = NodeRef::new(Label::Innings, innings_key.clone());

    let slices = split_overs(&innings.overs, innings_no, &mut out.unresolved);

    // Over/delivery upserts are buffered so the Innings node, which needs the
    // final totals, precedes them in the batch.
    let mut body = Emitter::default();
    let mut innings_totals = Totals::default();
    let mut phases: BTreeMap<Phase, Totals> = Phase::ALL
        .iter()
        .map(|p| (*p, Totals::default()))
        .collect();

    for slice in &slices {
        let over_number = slice.index + 1;
        let over_key = format!("{match_id}_{innings_no}_{over_number}_{team}");
        let over_ref = NodeRef::new(Label::Over, over_key.clone());
        let mut over_totals = Totals::default();
        let mut over_body = Emitter::default();
        let mut legal_in_over = 0u32;

        for (delivery_index, d) in slice.deliveries.iter().enumerate() {
            let kind = DeliveryKind::of(&d.extras);
            let legal = kind.is_legal();
            let ball = legal_in_over + 1;
            let ball_number = format!("{}.{}", slice.index, ball);
            let phase = (!super_over).then(|| Phase::classify(over_number, ball));

            over_totals.add(d, legal);
            innings_totals.add(d, legal);
            if let Some(phase) = phase
                && let Some(t) = phases.get_mut(&phase)
            {
                t.add(d, legal);
            }
            match d.runs.batter {
                4 => delta.total_fours += 1,
                6 => delta.total_sixes += 1,
                _ => {}
            }
            delta.total_wickets += d.wickets.len() as u64;

            let batter_id =
                resolve_participant(ctx, "batter", &d.batter, &ball_number, &mut out.unresolved);
            let bowler_id =
                resolve_participant(ctx, "bowler", &d.bowler, &ball_number, &mut out.unresolved);
            let non_striker_id = resolve_participant(
                ctx,
                "non-striker",
                &d.non_striker,
                &ball_number,
                &mut out.unresolved,
            );

            let delivery_ref = over_body.node(Node::Delivery(Delivery {
                delivery_key: format!("{match_id}_{innings_no}_{ball_number}_{delivery_index}"),
                match_id: match_id.to_string(),
                innings_number: innings_no,
                over_number,
                ball_number: ball_number.clone(),
                delivery_index: delivery_index as u32 + 1,
                legal_ball_in_over: ball,
                batter: d.batter.clone(),
                bowler: d.bowler.clone(),
                non_striker: d.non_striker.clone(),
                batter_id: batter_id.map(str::to_string),
                bowler_id: bowler_id.map(str::to_string),
                non_striker_id: non_striker_id.map(str::to_string),
                runs_batter: d.runs.batter,
                runs_extras: d.runs.extras,
                total_runs: d.runs.total,
                is_legal: legal,
                is_wicket: !d.wickets.is_empty(),
                delivery_type: kind,
                phase,
            }));
            over_body.link(&over_ref, RelKind::HasDelivery, &delivery_ref);

            if let Some(id) = bowler_id {
                let bowler_ref = NodeRef::new(Label::Player, id);
                over_body.link(&delivery_ref, RelKind::BowledBy, &bowler_ref);
                let tally = tallies.entry(d.bowler.clone()).or_default();
                match kind {
                    DeliveryKind::Wide => tally.wides += 1,
                    DeliveryKind::NoBall => tally.no_balls += 1,
                    _ => tally.balls_bowled += 1,
                }
                tally.runs_conceded += bowler_conceded(d.runs.total, &d.extras);
                tally.wickets += d
                    .wickets
                    .iter()
                    .filter(|w| credits_bowler(&w.kind))
                    .count() as u32;
            }
            if let Some(id) = batter_id {
                let batter_ref = NodeRef::new(Label::Player, id);
                over_body.link(&delivery_ref, RelKind::BattedBy, &batter_ref);
                let tally = tallies.entry(d.batter.clone()).or_default();
                if kind != DeliveryKind::Wide {
                    tally.balls_faced += 1;
                }
                tally.runs += d.runs.batter;
                match d.runs.batter {
                    4 => tally.fours += 1,
                    6 => tally.sixes += 1,
                    _ => {}
                }
            }

            // Every wicket entry gets its own Dismissal; keys differ by player out.
            for wicket in &d.wickets {
                let fielders = wicket
                    .fielders
                    .iter()
                    .filter_map(|f| f.name.clone())
                    .filter(|n| !n.trim().is_empty())
                    .collect::<Vec<_>>();
                let dismissal_ref = over_body.node(Node::Dismissal(Dismissal {
                    wicket_key: format!(
                        "{match_id}_{innings_no}_{ball_number}_{}",
                        wicket.player_out
                    ),
                    match_id: match_id.to_string(),
                    innings_number: innings_no,
                    over_number,
                    ball_number: ball_number.clone(),
                    kind: wicket.kind.clone(),
                    player_out: wicket.player_out.clone(),
                    player_out_id: ctx.player(&wicket.player_out).map(str::to_string),
                    fielders: fielders.clone(),
                }));
                over_body.link(&delivery_ref, RelKind::ResultsIn, &dismissal_ref);

                let credit = fielding_credit(&wicket.kind);
                for fielder in &fielders {
                    let Some(id) = resolve_participant(
                        ctx,
                        "fielder",
                        fielder,
                        &ball_number,
                        &mut out.unresolved,
                    ) else {
                        continue;
                    };
                    over_body.link(
                        &dismissal_ref,
                        RelKind::FieldedBy,
                        &NodeRef::new(Label::Player, id),
                    );
                    let tally = tallies.entry(fielder.clone()).or_default();
                    match credit {
                        FieldingCredit::Catch => tally.catches += 1,
                        FieldingCredit::RunOut => tally.run_outs += 1,
                        FieldingCredit::Stumping => tally.stumpings += 1,
                    }
                }
            }

            if legal {
                legal_in_over += 1;
            }
        }

        body.node(Node::Over(Over {
            over_key,
            match_id: match_id.to_string(),
            innings_number: innings_no,
            number: over_number,
            team: team.to_string(),
            runs: over_totals.runs,
            legal_balls: over_totals.legal_balls,
            wickets: over_totals.wickets,
        }));
        body.link(&innings_ref, RelKind::HasOver, &over_ref);
        body.upserts.append(&mut over_body.upserts);
    }

    out.node(Node::Innings(Innings {
        innings_key: innings_key.clone(),
        match_id: match_id.to_string(),
        innings_number: innings_no,
        team: team.to_string(),
        runs: innings_totals.runs,
        wickets: innings_totals.wickets,
        total_overs: slices.len() as u32,
        legal_balls: innings_totals.legal_balls,
        is_super_over: super_over,
    }));
    out.link(ctx.match_ref, RelKind::HasInnings, &innings_ref);
    out.upserts.append(&mut body.upserts);

    if !super_over {
        for (phase, totals) in &phases {
            let phase_ref = out.node(Node::Phase(PhaseSummary {
                phase_key: format!("{innings_key}_{}", phase.as_str()),
                innings_key: innings_key.clone(),
                phase: *phase,
                runs: totals.runs,
                balls: totals.legal_balls,
                wickets: totals.wickets,
            }));
            out.link(&innings_ref, RelKind::HasPhase, &phase_ref);
        }
    }

    delta.total_runs += u64::from(innings_totals.runs);
    let eligible_for_lowest =
        !super_over && !ctx.duckworth_lewis && innings_totals.legal_balls > 0;
    delta.observe_team_score(innings_totals.runs, eligible_for_lowest);
}

fn resolve_participant<'c>(
    ctx: &MatchContext<'c>,
    role: &'static str,
    name: &str,
    ball: &str,
    unresolved: &mut Vec<Unresolved>,
) -> Option<&'c str> {
    let id = ctx.players.get(name).map(String::as_str);
    if id.is_none() {
        unresolved.push(Unresolved::UnknownParticipant {
            role,
            name: name.to_string(),
            ball: ball.to_string(),
        });
    }
    id
}

fn emit_performances(
    ctx: &MatchContext<'_>,
    tallies: &BTreeMap<String, PlayerTally>,
    out: &mut Emitter,
) {
    for (name, t) in tallies {
        let Some(player_id) = ctx.player(name) else {
            continue;
        };
        let mut figures = Vec::new();
        if t.balls_faced > 0 {
            figures.push(Figures::Batting(BattingFigures {
                runs: t.runs,
                balls_faced: t.balls_faced,
                fours: t.fours,
                sixes: t.sixes,
                strike_rate: scoring::strike_rate(t.runs, t.balls_faced),
            }));
        }
        if t.balls_bowled > 0 {
            figures.push(Figures::Bowling(BowlingFigures {
                balls_bowled: t.balls_bowled,
                runs_conceded: t.runs_conceded,
                wickets: t.wickets,
                wides: t.wides,
                no_balls: t.no_balls,
                economy: scoring::economy(t.runs_conceded, t.balls_bowled),
            }));
        }
        if t.catches > 0 || t.run_outs > 0 || t.stumpings > 0 {
            figures.push(Figures::Fielding(FieldingFigures {
                catches: t.catches,
                run_outs: t.run_outs,
                stumpings: t.stumpings,
            }));
        }

        let player_ref = NodeRef::new(Label::Player, player_id);
        for f in figures {
            let perf_ref = out.node(Node::Performance(PlayerMatchPerformance::new(
                ctx.match_id,
                player_id,
                f,
            )));
            out.link(ctx.match_ref, RelKind::HasPlayerPerformance, &perf_ref);
            out.link(&perf_ref, RelKind::PerformanceOf, &player_ref);
        }
    }
}
