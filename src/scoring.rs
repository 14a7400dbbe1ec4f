use serde::Serialize;

use crate::record::RawExtras;

pub const LEGAL_BALLS_PER_OVER: u32 = 6;

const POWERPLAY_LAST: (u32, u32) = (5, 6);
const MIDDLE_LAST: (u32, u32) = (15, 6);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Phase {
    #[serde(rename = "Powerplay")]
    Powerplay,
    #[serde(rename = "Middle Overs")]
    MiddleOvers,
    #[serde(rename = "Death Overs")]
    DeathOvers,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Powerplay, Phase::MiddleOvers, Phase::DeathOvers];

    /// Classifies the `over.ball` position, where `over` is the 1-based over number
    /// and `ball` the legal-ball counter inside it. Overs 1-5 are the powerplay.
    pub fn classify(over: u32, ball: u32) -> Phase {
        let position = (over, ball);
        if position <= POWERPLAY_LAST {
            Phase::Powerplay
        } else if position <= MIDDLE_LAST {
            Phase::MiddleOvers
        } else {
            Phase::DeathOvers
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Powerplay => "Powerplay",
            Phase::MiddleOvers => "Middle Overs",
            Phase::DeathOvers => "Death Overs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryKind {
    Regular,
    Wide,
    NoBall,
    LegBye,
    Bye,
}

impl DeliveryKind {
    /// Illegal extras take precedence over byes, so a no-ball with leg-byes is a `NoBall`.
    pub fn of(extras: &RawExtras) -> DeliveryKind {
        if extras.wides.is_some() {
            DeliveryKind::Wide
        } else if extras.noballs.is_some() {
            DeliveryKind::NoBall
        } else if extras.legbyes.is_some() {
            DeliveryKind::LegBye
        } else if extras.byes.is_some() {
            DeliveryKind::Bye
        } else {
            DeliveryKind::Regular
        }
    }

    pub fn is_legal(self) -> bool {
        !matches!(self, DeliveryKind::Wide | DeliveryKind::NoBall)
    }
}

/// Runs charged to the bowler: everything except byes and leg-byes.
pub fn bowler_conceded(total_runs: u32, extras: &RawExtras) -> u32 {
    let unattributed = extras.legbyes.unwrap_or(0) + extras.byes.unwrap_or(0);
    total_runs.saturating_sub(unattributed)
}

pub fn strike_rate(runs: u32, balls_faced: u32) -> f64 {
    if balls_faced == 0 {
        return 0.0;
    }
    f64::from(runs) * 100.0 / f64::from(balls_faced)
}

pub fn economy(runs_conceded: u32, legal_balls: u32) -> f64 {
    if legal_balls == 0 {
        return 0.0;
    }
    f64::from(runs_conceded) / (f64::from(legal_balls) / f64::from(LEGAL_BALLS_PER_OVER))
}

/// Whether a dismissal of this kind goes into the bowler's wicket column.
pub fn credits_bowler(kind: &str) -> bool {
    !matches!(
        kind.trim().to_ascii_lowercase().as_str(),
        "run out" | "retired hurt" | "retired out" | "retired not out" | "obstructing the field"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldingCredit {
    Catch,
    RunOut,
    Stumping,
}

pub fn fielding_credit(kind: &str) -> FieldingCredit {
    match kind.trim().to_ascii_lowercase().as_str() {
        "run out" => FieldingCredit::RunOut,
        "stumped" => FieldingCredit::Stumping,
        _ => FieldingCredit::Catch,
    }
}
