use chrono::{Datelike, Duration, Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use medtrack_core::report::{adherence, month_overview, DaySummary};
use medtrack_core::*;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "medtrack")]
#[command(about = "Medication adherence tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (defaults to $XDG_CONFIG_HOME/medtrack/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API root, e.g. http://127.0.0.1:8787/api
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// User id sent as X-User-ID
    #[arg(long, global = true)]
    user: Option<String>,

    /// Work directly on the local data directory instead of the API
    #[arg(long, global = true)]
    local: bool,

    /// Override data directory (with --local)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List medications
    Meds,

    /// Add a medication
    Add {
        /// Display name
        #[arg(long)]
        name: String,

        /// Id to store it under (generated if omitted)
        #[arg(long)]
        id: Option<String>,

        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=MAX_DOSES_PER_DAY as i64))]
        times_per_day: u32,

        #[arg(long, value_enum, default_value_t = FrequencyArg::Daily)]
        frequency: FrequencyArg,

        /// Weekdays for weekly medications, 0 = Sunday (e.g. 1,3)
        #[arg(long, value_delimiter = ',', value_parser = clap::value_parser!(u8).range(0..=6))]
        days: Vec<u8>,

        #[arg(long)]
        color: Option<String>,
    },

    /// Remove a medication (its history is kept)
    Remove {
        /// Medication id or name
        medication: String,
    },

    /// Record a dose as taken (or missed)
    Take {
        /// Medication id or name
        medication: String,

        #[command(flatten)]
        slot: SlotArgs,

        /// Record the dose as missed instead of taken
        #[arg(long)]
        missed: bool,

        /// ISO-8601 timestamp (defaults to now)
        #[arg(long)]
        at: Option<String>,
    },

    /// Change when a recorded dose was taken
    Retime {
        /// Medication id or name
        medication: String,

        #[command(flatten)]
        slot: SlotArgs,

        /// New ISO-8601 timestamp
        #[arg(long)]
        at: String,
    },

    /// Clear a recorded dose
    Clear {
        /// Medication id or name
        medication: String,

        #[command(flatten)]
        slot: SlotArgs,
    },

    /// Show what is scheduled on a day (default)
    Day {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Summarise every day of a month
    Month {
        /// Month as YYYY-MM, defaults to the current month
        #[arg(long, value_parser = parse_month)]
        month: Option<(i32, u32)>,
    },

    /// Adherence rate over a date range
    Stats {
        /// First day (defaults to 30 days ago)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day (defaults to today)
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Export every recorded dose to CSV
    Export {
        /// Output file
        path: PathBuf,
    },
}

#[derive(clap::Args)]
struct SlotArgs {
    /// Date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Dose number within the day, starting at 1
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=MAX_DOSES_PER_DAY as i64))]
    dose: u32,
}

impl SlotArgs {
    fn date(&self) -> NaiveDate {
        self.date.unwrap_or_else(today)
    }

    fn index(&self) -> usize {
        (self.dose - 1) as usize
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FrequencyArg {
    Daily,
    EveryOtherDay,
    Weekly,
}

impl From<FrequencyArg> for Frequency {
    fn from(arg: FrequencyArg) -> Self {
        match arg {
            FrequencyArg::Daily => Frequency::Daily,
            FrequencyArg::EveryOtherDay => Frequency::EveryOtherDay,
            FrequencyArg::Weekly => Frequency::Weekly,
        }
    }
}

fn main() -> ExitCode {
    // Initialize logging quietly so command output stays readable
    medtrack_core::logging::init_with_level("warn");

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = e.user_message();
            eprintln!("✗ {}", message);
            let detail = e.to_string();
            if !message.contains(&detail) {
                eprintln!("  {}", detail);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(Config::default_config_path);
    let mut config = Config::load_or_default(&config_path)?;
    let user_id = resolve_user_id(cli.user.clone(), &mut config, &config_path)?;

    let remote: Box<dyn Remote> = if cli.local {
        let data_dir = cli.data_dir.clone().unwrap_or_else(|| config.store.data_dir.clone());
        tracing::debug!("Using local store at {:?} as {}", data_dir, user_id);
        Box::new(LocalRemote::new(FileStore::open(data_dir.join("kv"))?, user_id))
    } else {
        let api_url = cli.api_url.clone().unwrap_or_else(|| config.client.api_url.clone());
        tracing::debug!("Using API at {} as {}", api_url, user_id);
        Box::new(HttpRemote::new(&api_url, user_id)?)
    };
    let mut tracker = Tracker::load(remote.as_ref())?;

    match cli.command.unwrap_or(Commands::Day { date: None }) {
        Commands::Meds => cmd_meds(tracker.state()),
        Commands::Add {
            name,
            id,
            times_per_day,
            frequency,
            days,
            color,
        } => {
            let medication = Medication {
                id: id.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string()),
                name,
                times_per_day,
                frequency: frequency.into(),
                days_of_week: days.into_iter().collect(),
                color,
            };
            let (id, name) = (medication.id.clone(), medication.name.clone());
            tracker.add_medication(medication)?;
            println!("✓ Added {} ({})", name, id);
            Ok(())
        }
        Commands::Remove { medication } => {
            let id = known_medication(tracker.state(), &medication)?;
            tracker.delete_medication(&id)?;
            println!("✓ Removed {} (history kept)", id);
            Ok(())
        }
        Commands::Take {
            medication,
            slot,
            missed,
            at,
        } => {
            let id = known_medication(tracker.state(), &medication)?;
            let date = slot.date();
            let dose = Dose {
                taken: !missed,
                timestamp: at.unwrap_or_else(partition::now_timestamp),
            };
            tracker.record_dose_at(date, &id, slot.index(), dose)?;
            let verb = if missed { "missed" } else { "taken" };
            println!("✓ Dose {} of {} on {} marked {}", slot.dose, id, date, verb);
            Ok(())
        }
        Commands::Retime {
            medication,
            slot,
            at,
        } => {
            let id = medication_id(tracker.state(), &medication);
            let date = slot.date();
            tracker.edit_dose_time(date, &id, slot.index(), &at)?;
            println!("✓ Dose {} of {} on {} now at {}", slot.dose, id, date, at);
            Ok(())
        }
        Commands::Clear { medication, slot } => {
            let id = medication_id(tracker.state(), &medication);
            let date = slot.date();
            tracker.clear_dose(date, &id, slot.index())?;
            println!("✓ Cleared dose {} of {} on {}", slot.dose, id, date);
            Ok(())
        }
        Commands::Day { date } => {
            cmd_day(tracker.state(), date.unwrap_or_else(today));
            Ok(())
        }
        Commands::Month { month } => {
            let (year, month) = month.unwrap_or_else(|| {
                let now = today();
                (now.year(), now.month())
            });
            cmd_month(tracker.state(), year, month);
            Ok(())
        }
        Commands::Stats { from, to } => {
            let to = to.unwrap_or_else(today);
            let from = match from {
                Some(from) => from,
                None => default_stats_start(to)?,
            };
            cmd_stats(tracker.state(), from, to);
            Ok(())
        }
        Commands::Export { path } => {
            let state = tracker.state();
            let count = export::export_csv(&path, &state.medications, &state.entries)?;
            println!("✓ Exported {} doses to {}", count, path.display());
            Ok(())
        }
    }
}

/// Pick the user id: flag, then config, then a new one saved back to the config
fn resolve_user_id(
    flag: Option<String>,
    config: &mut Config,
    config_path: &std::path::Path,
) -> Result<String> {
    if let Some(user) = flag.or_else(|| config.client.user_id.clone()) {
        return Ok(user);
    }

    let user = format!("user-{}", uuid::Uuid::new_v4());
    config.client.user_id = Some(user.clone());
    config.save_to(config_path)?;
    eprintln!("Created user id {} (saved to {})", user, config_path.display());
    Ok(user)
}

fn known_medication(state: &TrackerState, query: &str) -> Result<String> {
    state
        .find_medication(query)
        .map(|m| m.id.clone())
        .ok_or_else(|| Error::InvalidInput(format!("unknown medication {:?}", query)))
}

/// Like `known_medication`, but falls back to the raw id so history of
/// removed medications can still be edited
fn medication_id(state: &TrackerState, query: &str) -> String {
    state
        .find_medication(query)
        .map(|m| m.id.clone())
        .unwrap_or_else(|| query.to_string())
}

/// Thirty days before `to`
fn default_stats_start(to: NaiveDate) -> Result<NaiveDate> {
    to.checked_sub_signed(Duration::days(30))
        .ok_or_else(|| Error::InvalidInput(format!("no date 30 days before {}", to)))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn parse_month(s: &str) -> std::result::Result<(i32, u32), String> {
    let (year, month) = s
        .split_once('-')
        .ok_or_else(|| format!("expected YYYY-MM, got {:?}", s))?;
    let year: i32 = year.parse().map_err(|_| format!("bad year in {:?}", s))?;
    let month: u32 = month.parse().map_err(|_| format!("bad month in {:?}", s))?;
    if !(1..=12).contains(&month) {
        return Err(format!("month must be 1-12, got {}", month));
    }
    Ok((year, month))
}

fn describe_frequency(medication: &Medication) -> String {
    const DAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
    match medication.frequency {
        Frequency::Daily => "daily".into(),
        Frequency::EveryOtherDay => "every other day".into(),
        Frequency::Weekly => {
            let days: Vec<&str> = medication
                .days_of_week
                .iter()
                .filter_map(|&d| DAYS.get(d as usize).copied())
                .collect();
            format!("weekly ({})", days.join(", "))
        }
    }
}

fn cmd_meds(state: &TrackerState) -> Result<()> {
    if state.medications.is_empty() {
        println!("No medications yet. Add one with `medtrack add --name ...`.");
        return Ok(());
    }
    for m in &state.medications {
        println!(
            "  {}  {} × {}/day, {}",
            m.id,
            m.name,
            m.times_per_day,
            describe_frequency(m)
        );
    }
    Ok(())
}

fn cmd_day(state: &TrackerState, date: NaiveDate) {
    println!("{} {}", date.format("%A"), date);
    let statuses = state.day_status(date);
    if statuses.is_empty() {
        println!("  Nothing scheduled.");
        return;
    }
    for status in statuses {
        let slots: Vec<String> = status
            .slots
            .iter()
            .map(|s| s.symbol().to_string())
            .collect();
        println!("  {:<24} {}", status.name, slots.join(" "));
    }
}

fn cmd_month(state: &TrackerState, year: i32, month: u32) {
    let overview = month_overview(&state.medications, &state.entries, year, month);
    let Some(first) = overview.keys().next() else {
        return;
    };
    println!("{}", first.format("%B %Y"));
    for (date, summary) in &overview {
        let (symbol, label) = match summary {
            DaySummary::NoneScheduled => (' ', "none scheduled"),
            DaySummary::Complete => ('✓', "complete"),
            DaySummary::Partial => ('~', "partial"),
            DaySummary::Missed => ('✗', "missed"),
            DaySummary::Pending => ('·', "pending"),
        };
        println!("  {} {}  {} {}", date.format("%d"), date.format("%a"), symbol, label);
    }
}

fn cmd_stats(state: &TrackerState, from: NaiveDate, to: NaiveDate) {
    let report = adherence(&state.entries, from, to);
    println!("Adherence {} to {}", from, to);
    match report.overall.rate() {
        Some(rate) => println!(
            "  Overall: {:.1}% ({} taken, {} missed)",
            rate, report.overall.taken, report.overall.missed
        ),
        None => println!("  No doses recorded."),
    }
    for (id, stats) in &report.by_medication {
        let name = state.medication(id).map(|m| m.name.as_str()).unwrap_or(id.as_str());
        if let Some(rate) = stats.rate() {
            println!(
                "  {:<24} {:.1}% ({}/{})",
                name,
                rate,
                stats.taken,
                stats.recorded()
            );
        }
    }
}
