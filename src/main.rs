//! Asclepius CLI
//!
//! Local operation of the wellness engine against a libSQL database file:
//! define parameters, record readings (which runs the analysis/alerting
//! pipeline), and inspect trends, insights, and alerts.

use anyhow::Context;
use asclepius_core::{
    AlertId, CircleKind, ConnectionMode, LibsqlStorage, ParameterId, TrackingConfig, UserId,
    WellnessService,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Default database path under the platform data directory
fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("asclepius")
        .join("asclepius.db")
}

#[derive(Parser)]
#[command(name = "asclepius", about = "Wellness trend-detection and alerting engine")]
struct Cli {
    /// Database file path
    #[arg(long, env = "ASCLEPIUS_DB_PATH")]
    db: Option<PathBuf>,

    /// Optional TOML config file with engine thresholds
    #[arg(long, env = "ASCLEPIUS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database and schema
    Init,
    /// Define a tracked parameter
    Define {
        #[arg(long)]
        user: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        unit: Option<String>,
        #[arg(long)]
        min: Option<f64>,
        #[arg(long)]
        max: Option<f64>,
    },
    /// List a user's parameters
    Params {
        #[arg(long)]
        user: String,
    },
    /// Record a reading and run the analysis pipeline
    Record {
        #[arg(long)]
        user: String,
        #[arg(long)]
        parameter: String,
        #[arg(long)]
        value: f64,
        #[arg(long)]
        note: Option<String>,
    },
    /// Analyze one parameter's recent window
    Analyze {
        #[arg(long)]
        user: String,
        #[arg(long)]
        parameter: String,
    },
    /// Insights report over a window of days
    Insights {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
    /// List a user's alerts
    Alerts {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        per_page: usize,
    },
    /// Mark an alert as read
    Read {
        #[arg(long)]
        user: String,
        #[arg(long)]
        alert: String,
    },
    /// Record a follow edge (setup helper)
    Follow {
        #[arg(long)]
        follower: String,
        #[arg(long)]
        followed: String,
    },
    /// Add a member to a circle (setup helper)
    Circle {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        kind: CircleKind,
        #[arg(long)]
        member: String,
    },
}

fn parse_user(s: &str) -> anyhow::Result<UserId> {
    UserId::from_string(s).with_context(|| format!("invalid user id: {}", s))
}

fn parse_parameter(s: &str) -> anyhow::Result<ParameterId> {
    ParameterId::from_string(s).with_context(|| format!("invalid parameter id: {}", s))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or_else(default_db_path);
    let config = TrackingConfig::load(cli.config.as_deref())?;

    let storage = Arc::new(
        LibsqlStorage::new(ConnectionMode::Local(
            db_path.to_string_lossy().to_string(),
        ))
        .await?,
    );
    let service = WellnessService::new(storage.clone(), storage.clone(), None, config);

    match cli.command {
        Command::Init => {
            println!("initialized database at {}", db_path.display());
        }
        Command::Define {
            user,
            name,
            unit,
            min,
            max,
        } => {
            let parameter = service
                .define_parameter(parse_user(&user)?, &name, unit, min, max)
                .await?;
            println!("defined '{}' with id {}", parameter.name, parameter.id);
        }
        Command::Params { user } => {
            for parameter in service.list_parameters(parse_user(&user)?).await? {
                let state = if parameter.active { "" } else { " (inactive)" };
                println!("{}  {}{}", parameter.id, parameter.name, state);
            }
        }
        Command::Record {
            user,
            parameter,
            value,
            note,
        } => {
            let reading = service
                .record_reading(parse_user(&user)?, parse_parameter(&parameter)?, value, note)
                .await?;
            println!("recorded {} at {}", reading.value, reading.recorded_at);
        }
        Command::Analyze { user, parameter } => {
            match service
                .analyze(parse_user(&user)?, parse_parameter(&parameter)?)
                .await?
            {
                Some(trend) => println!(
                    "{} ({:+.1}% over {} readings, confidence {:.0})",
                    trend.direction, trend.percent_change, trend.window_len, trend.confidence
                ),
                None => println!("not enough readings yet"),
            }
        }
        Command::Insights { user, days } => {
            let insights = service.get_insights(parse_user(&user)?, days).await?;
            if insights.is_empty() {
                println!("nothing noteworthy in the last {} days", days);
            }
            for insight in insights {
                println!("[{:?}] {}", insight.kind, insight.message);
            }
        }
        Command::Alerts {
            user,
            page,
            per_page,
        } => {
            let page = service
                .get_alerts(parse_user(&user)?, page, per_page)
                .await?;
            println!(
                "{} unread, page {}/{}",
                page.unread_count,
                page.pagination.page,
                page.pagination.pages
            );
            for alert in page.alerts {
                let marker = if alert.read { " " } else { "*" };
                println!("{} [{}] {}  {}", marker, alert.priority, alert.id, alert.message);
            }
        }
        Command::Read { user, alert } => {
            let alert_id =
                AlertId::from_string(&alert).with_context(|| format!("invalid alert id: {}", alert))?;
            if service.mark_alert_read(parse_user(&user)?, alert_id).await? {
                println!("marked read");
            } else {
                println!("no such alert for this user");
            }
        }
        Command::Follow { follower, followed } => {
            storage
                .add_follow(parse_user(&follower)?, parse_user(&followed)?)
                .await?;
            println!("follow recorded");
        }
        Command::Circle {
            owner,
            kind,
            member,
        } => {
            storage
                .add_circle_member(parse_user(&owner)?, kind, parse_user(&member)?)
                .await?;
            println!("added to {} circle", kind);
        }
    }

    Ok(())
}
