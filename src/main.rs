use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use campione::config::Config;
use campione::store::json_store::JsonStore;
use campione::store::schema::{Foot, Identity, Position};
use campione::{ProfilePatch, Progression, ProgressionError, QuizCompletion, StatsPatch};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PositionArg {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

impl From<PositionArg> for Position {
    fn from(arg: PositionArg) -> Self {
        match arg {
            PositionArg::Goalkeeper => Position::Goalkeeper,
            PositionArg::Defender => Position::Defender,
            PositionArg::Midfielder => Position::Midfielder,
            PositionArg::Forward => Position::Forward,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FootArg {
    Left,
    Right,
}

impl From<FootArg> for Foot {
    fn from(arg: FootArg) -> Self {
        match arg {
            FootArg::Left => Foot::Left,
            FootArg::Right => Foot::Right,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "campione", version, about = "Learner progression for the football rules quiz")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding learner documents
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Learner document key
    #[arg(short, long, default_value = "local")]
    learner: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the learner document if it does not exist
    Seed {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        photo_url: Option<String>,
    },
    /// Show state and derived stats
    Show,
    /// Show mission progress
    Missions,
    /// Record a finished quiz
    Quiz {
        quiz_id: String,
        score: u32,
        total_questions: u32,
        xp_gained: u64,
    },
    /// Record a correctly guessed glossary term
    Term { term_id: String },
    /// Record a login (defaults to today)
    Login {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Edit profile fields
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        team: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
        #[arg(long)]
        team_logo: Option<String>,
        #[arg(long, value_enum)]
        position: Option<PositionArg>,
        #[arg(long, value_enum)]
        foot: Option<FootArg>,
    },
    /// Patch streak, login date, penalty counters or terms
    Patch {
        #[arg(long)]
        streak: Option<u32>,
        #[arg(long)]
        last_login_date: Option<NaiveDate>,
        #[arg(long)]
        penalties_taken: Option<u32>,
        #[arg(long)]
        penalties_scored: Option<u32>,
        #[arg(long)]
        penalties_faced: Option<u32>,
        #[arg(long)]
        penalties_saved: Option<u32>,
        /// Term ids to add (comma-separated)
        #[arg(long, value_delimiter = ',')]
        terms: Vec<String>,
    },
    /// Set or clear the unread messages flag
    Unread {
        #[arg(action = clap::ArgAction::Set)]
        unread: bool,
    },
    /// Print the active catalog as TOML
    Catalog,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    let mut config = Config::load_from(&config_path)?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.to_string_lossy().to_string();
    }
    log::debug!("using config {config:?}");

    let catalog = Arc::new(config.load_catalog()?);
    if let Command::Catalog = cli.command {
        print!("{}", catalog.to_toml_string()?);
        return Ok(());
    }

    let store = JsonStore::with_base_dir(PathBuf::from(&config.data_dir))
        .with_context(|| format!("opening data directory {}", config.data_dir))?;
    let progression = Progression::new(store, catalog, config.policy());
    let learner = cli.learner.as_str();
    let today = Local::now().date_naive();

    match cli.command {
        Command::Seed { name, photo_url } => {
            let identity = Identity {
                display_name: name,
                photo_url,
            };
            print_json(&progression.seed(learner, &identity, today))
        }
        Command::Show => print_json(&progression.view(learner)),
        Command::Missions => print_json(&progression.mission_board(learner)),
        Command::Quiz {
            quiz_id,
            score,
            total_questions,
            xp_gained,
        } => print_json(&progression.complete_quiz(
            learner,
            QuizCompletion {
                quiz_id,
                score,
                xp_gained,
                total_questions,
            },
        )),
        Command::Term { term_id } => print_json(&progression.complete_term_guess(learner, &term_id)),
        Command::Login { date } => {
            print_json(&progression.record_login(learner, date.unwrap_or(today)))
        }
        Command::Profile {
            name,
            team,
            avatar,
            team_logo,
            position,
            foot,
        } => {
            let patch = ProfilePatch {
                name,
                team,
                avatar,
                team_logo,
                position: position.map(Position::from),
                preferred_foot: foot.map(Foot::from),
            };
            print_json(&progression.update_profile(learner, patch))
        }
        Command::Patch {
            streak,
            last_login_date,
            penalties_taken,
            penalties_scored,
            penalties_faced,
            penalties_saved,
            terms,
        } => {
            let patch = StatsPatch {
                streak,
                last_login_date,
                penalties_taken,
                penalties_scored,
                penalties_faced,
                penalties_saved,
                correctly_answered_terms: terms.into_iter().collect(),
            };
            print_json(&progression.patch_fields(learner, patch))
        }
        Command::Unread { unread } => {
            progression.set_unread_messages(learner, unread)?;
            Ok(())
        }
        Command::Catalog => Ok(()),
    }
}

fn print_json<T: Serialize>(result: &Result<T, ProgressionError>) -> Result<()> {
    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(value)?);
            Ok(())
        }
        Err(ProgressionError::Conflict {
            last_known: Some(view),
            attempts,
            ..
        }) => {
            println!("{}", serde_json::to_string_pretty(view)?);
            bail!("update not saved after {attempts} attempts; showing last known state")
        }
        Err(err) if err.is_recoverable() => bail!("{err} (try again)"),
        Err(err) => bail!("{err}"),
    }
}
