use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dots_screentime_common::config::ControlConfig;
use dots_screentime_common::{ActionOnLimit, FocusListType, FocusMode};
use dots_screentime_proto::dto::ExportFormat;
use dots_screentime_proto::ControlClient;
use uuid::Uuid;

mod auth;
mod commands;
mod format;

#[derive(Parser)]
#[command(name = "dots-screentime-ctl")]
#[command(about = "DOTS Screen Time CLI control tool", long_about = None)]
struct Cli {
    #[arg(long, global = true, help = "Path of the daemon control socket")]
    socket: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the daemon is running
    Ping,

    /// Usage summary for today
    Today,

    /// Usage summary for one day
    Usage {
        #[arg(help = "Local date, YYYY-MM-DD")]
        date: NaiveDate,
    },

    /// Seven-day summary
    Week {
        #[arg(help = "First day of the week, defaults to the last Sunday")]
        start: Option<NaiveDate>,
    },

    /// Details for one app
    App { app_id: Uuid },

    /// Most recent sessions, newest first
    Sessions {
        #[arg(long)]
        app: Option<Uuid>,
        #[arg(short = 'n', long, default_value_t = 20)]
        count: u32,
    },

    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },

    Focus {
        #[command(subcommand)]
        action: FocusAction,
    },

    /// Give an app more time today
    ExtraTime { app_id: Uuid, minutes: i64 },

    /// Show and clear pending notifications
    Notifications,

    /// Write all data to a file
    Export {
        #[arg(long, value_enum, default_value = "csv")]
        format: FormatArg,
    },

    /// Delete all usage history
    Clear,

    Pin {
        #[command(subcommand)]
        action: PinAction,
    },
}

#[derive(Subcommand)]
enum RulesAction {
    List,
    Set {
        app_id: Uuid,
        #[arg(long, help = "Daily limit in minutes")]
        limit: Option<i64>,
        #[arg(long, help = "Curfew start, HH:MM")]
        curfew_start: Option<String>,
        #[arg(long, help = "Curfew end, HH:MM")]
        curfew_end: Option<String>,
        #[arg(long, value_enum, default_value = "notify")]
        action: LimitActionArg,
        #[arg(long, help = "Store the rule disabled")]
        disabled: bool,
    },
}

#[derive(Subcommand)]
enum FocusAction {
    Start {
        #[arg(help = "Duration in minutes")]
        minutes: i64,
        #[arg(long = "app", help = "App id on the list, repeatable")]
        apps: Vec<Uuid>,
        #[arg(long, help = "Block the listed apps instead of allowing only them")]
        blacklist: bool,
        #[arg(long, value_enum, default_value = "normal")]
        mode: FocusModeArg,
        #[arg(long)]
        label: Option<String>,
    },
    Stop,
    Status,
}

#[derive(Subcommand)]
enum PinAction {
    Verify,
    Set,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum FormatArg {
    Csv,
    Json,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum LimitActionArg {
    Notify,
    BlockNew,
    ForceClose,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum FocusModeArg {
    Normal,
    Pomodoro,
    DeepWork,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

impl From<LimitActionArg> for ActionOnLimit {
    fn from(value: LimitActionArg) -> Self {
        match value {
            LimitActionArg::Notify => ActionOnLimit::NotifyOnly,
            LimitActionArg::BlockNew => ActionOnLimit::BlockNew,
            LimitActionArg::ForceClose => ActionOnLimit::ForceClose,
        }
    }
}

impl From<FocusModeArg> for FocusMode {
    fn from(value: FocusModeArg) -> Self {
        match value {
            FocusModeArg::Normal => FocusMode::Normal,
            FocusModeArg::Pomodoro => FocusMode::Pomodoro,
            FocusModeArg::DeepWork => FocusMode::DeepWork,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ControlConfig::default();
    if let Some(socket) = cli.socket {
        config.socket_path = socket;
    }
    let client = ControlClient::new(&config);

    match cli.command {
        Commands::Ping => commands::status::ping(&client).await?,
        Commands::Today => commands::usage::today(&client).await?,
        Commands::Usage { date } => commands::usage::by_date(&client, date).await?,
        Commands::Week { start } => commands::usage::week(&client, start).await?,
        Commands::App { app_id } => commands::usage::app(&client, app_id).await?,
        Commands::Sessions { app, count } => commands::usage::sessions(&client, app, count).await?,
        Commands::Rules { action } => match action {
            RulesAction::List => commands::rules::list(&client).await?,
            RulesAction::Set { app_id, limit, curfew_start, curfew_end, action, disabled } => {
                let rule = commands::rules::RuleArgs {
                    app_id,
                    daily_limit_minutes: limit,
                    curfew_start,
                    curfew_end,
                    action: action.into(),
                    enabled: !disabled,
                };
                commands::rules::set(&client, rule).await?
            }
        },
        Commands::Focus { action } => match action {
            FocusAction::Start { minutes, apps, blacklist, mode, label } => {
                let list_type =
                    if blacklist { FocusListType::Blacklist } else { FocusListType::Whitelist };
                commands::focus::start(&client, minutes, apps, list_type, mode.into(), label)
                    .await?
            }
            FocusAction::Stop => commands::focus::stop(&client).await?,
            FocusAction::Status => commands::focus::status(&client).await?,
        },
        Commands::ExtraTime { app_id, minutes } => {
            commands::rules::extra_time(&client, app_id, minutes).await?
        }
        Commands::Notifications => commands::data::notifications(&client).await?,
        Commands::Export { format } => commands::data::export(&client, format.into()).await?,
        Commands::Clear => commands::data::clear(&client).await?,
        Commands::Pin { action } => match action {
            PinAction::Verify => commands::pin::verify(&client).await?,
            PinAction::Set => commands::pin::set(&client).await?,
        },
    }

    Ok(())
}
