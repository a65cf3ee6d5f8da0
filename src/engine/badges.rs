use serde::{Deserialize, Serialize};

use crate::engine::rules::Rule;
use crate::store::schema::LearnerState;

pub const PERFECTIONIST: &str = "perfectionist";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeDefinition {
    pub id: String,
    pub rule: Rule,
}

impl BadgeDefinition {
    pub fn new(id: &str, rule: Rule) -> Self {
        Self {
            id: id.to_string(),
            rule,
        }
    }
}

/// Badges not yet owned whose rule holds.
///
/// Runs to a fixpoint on a probe copy: badges granted here count toward
/// collector rules in the same call, so evaluating the result-applied state
/// again yields nothing.
pub fn evaluate(badges: &[BadgeDefinition], state: &LearnerState) -> Vec<String> {
    let mut probe = state.clone();
    let mut earned = Vec::new();
    loop {
        let fresh: Vec<String> = badges
            .iter()
            .filter(|b| b.rule.is_evaluated())
            .filter(|b| !probe.badges.contains(&b.id) && b.rule.holds(&probe))
            .map(|b| b.id.clone())
            .collect();
        if fresh.is_empty() {
            return earned;
        }
        probe.badges.extend(fresh.iter().cloned());
        earned.extend(fresh);
    }
}

// Legend and formation badges whose unlock paths were never built. The ids stay
// reserved so documents that mention them keep resolving.
const RESERVED: &[&str] = &[
    "catenaccio",
    "trequartista",
    "libero",
    "regista",
    "mezzala",
    "pele",
    "maradona",
    "cruyff",
    "beckenbauer",
    "zidane",
    "ronaldo",
    "messi",
    "maldini",
    "bobbyMoore",
    "garrincha",
    "puskas",
    "yashin",
];

pub fn default_badges() -> Vec<BadgeDefinition> {
    use Rule::*;

    let quiz = |id: &str| QuizCompleted {
        quiz_id: id.to_string(),
    };
    let mut badges = vec![
        BadgeDefinition::new("welcome", Always),
        BadgeDefinition::new("quizRookie", QuizzesCompleted { min: 1 }),
        BadgeDefinition::new("quizAdept", QuizzesCompleted { min: 3 }),
        BadgeDefinition::new("quizPro", QuizzesCompleted { min: 5 }),
        BadgeDefinition::new("rulesExpert", quiz("rules_1")),
        BadgeDefinition::new("historyBuff", quiz("history_1")),
        BadgeDefinition::new("nutritionGuru", quiz("nutrition_1")),
        BadgeDefinition::new("tacticsExpert", quiz("tactics_1")),
        // needs the full tactics quiz catalog
        BadgeDefinition::new("tacticsMaster", Disabled),
        BadgeDefinition::new(PERFECTIONIST, Granted),
        BadgeDefinition::new("xp100", XpAtLeast { min: 100 }),
        BadgeDefinition::new("xp500", XpAtLeast { min: 500 }),
        BadgeDefinition::new("xp1000", XpAtLeast { min: 1000 }),
        BadgeDefinition::new("xp2500", XpAtLeast { min: 2500 }),
        BadgeDefinition::new("xp5000", XpAtLeast { min: 5000 }),
        BadgeDefinition::new("xp10000", XpAtLeast { min: 10000 }),
        BadgeDefinition::new("level2", LevelAtLeast { min: 2 }),
        BadgeDefinition::new("level5", LevelAtLeast { min: 5 }),
        BadgeDefinition::new("level10", LevelAtLeast { min: 10 }),
        BadgeDefinition::new("streak3", StreakAtLeast { min: 3 }),
        BadgeDefinition::new("streak7", StreakAtLeast { min: 7 }),
        BadgeDefinition::new("streak14", StreakAtLeast { min: 14 }),
        BadgeDefinition::new("streak30", StreakAtLeast { min: 30 }),
        BadgeDefinition::new("collector", BadgesAtLeast { min: 10 }),
        BadgeDefinition::new("seniorCollector", BadgesAtLeast { min: 20 }),
        BadgeDefinition::new("masterCollector", BadgesAtLeast { min: 30 }),
        BadgeDefinition::new("ultraCollector", BadgesAtLeast { min: 40 }),
        BadgeDefinition::new("legendaryCollector", BadgesAtLeast { min: 50 }),
    ];
    badges.extend(RESERVED.iter().map(|id| BadgeDefinition::new(id, Disabled)));
    badges.push(BadgeDefinition::new("hatTrick", QuizzesCompleted { min: 3 }));
    badges.push(BadgeDefinition::new("unstoppable", StreakAtLeast { min: 5 }));
    badges
}
