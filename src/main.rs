use clap::{Args, Parser, Subcommand};
use slotscout::api::{ApiClient, Platform};
use slotscout::billing::BillingService;
use slotscout::config::AppConfig;
use slotscout::domain::{DateStatus, SlotDate, TestCentre, MAX_SELECTED_CENTRES};
use slotscout::error::AppError;
use slotscout::notifications::{self, NotificationFeed};
use slotscout::poller::{AvailabilityPoller, PollOutcome};
use slotscout::session::LoginFlow;
use slotscout::store::{FileStore, ProfileStore};
use slotscout::telemetry;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "slotscout",
    about = "Watch the driving-test backend for appointment openings",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in with licence and application reference
    Login(LoginArgs),
    /// Run the background availability watcher (default command)
    Watch,
    /// Force one availability check now, bypassing the cooldown
    Refresh,
    /// Show the stored profile and current centre openings
    Status,
    /// List or select test centres
    Centres {
        #[command(subcommand)]
        command: CentresCommand,
    },
    /// Show or edit watched dates and preferred time slots
    Availability {
        #[command(subcommand)]
        command: AvailabilityCommand,
    },
    /// Show or edit onboarding details on the stored profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
    /// List notifications or mark them read
    Notifications {
        #[command(subcommand)]
        command: NotificationsCommand,
    },
    /// Verify a purchase receipt and record the premium upgrade
    Premium(PremiumArgs),
    /// Forget the stored profile
    Logout,
}

#[derive(Args, Debug)]
struct LoginArgs {
    /// Driving licence number (16 characters)
    #[arg(long)]
    licence: String,
    /// Application reference / theory test number (8 digits)
    #[arg(long)]
    application_ref: String,
}

#[derive(Subcommand, Debug)]
enum CentresCommand {
    /// List every centre the backend knows about
    List,
    /// Select up to three centres by name
    Select {
        /// Centre names as shown by `centres list`
        names: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum AvailabilityCommand {
    /// Show the watched dates and their preferred slots
    Show,
    /// Set the preferred time slots for one date
    Set {
        /// Date in DD/MM/YY form
        #[arg(long)]
        date: String,
        /// Time-slot labels, e.g. "Morning" "Afternoon"
        #[arg(long, num_args = 1.., required = true)]
        slots: Vec<String>,
    },
    /// Stop watching one date
    Remove {
        /// Date in DD/MM/YY form
        #[arg(long)]
        date: String,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    /// Show the stored onboarding details
    Show,
    /// Update onboarding details; only the given fields change
    Set(ProfileSetArgs),
}

#[derive(Args, Debug)]
struct ProfileSetArgs {
    /// Contact email
    #[arg(long)]
    email: Option<String>,
    /// Test type, e.g. "car"
    #[arg(long)]
    test_type: Option<String>,
    /// Special requirement labels
    #[arg(long, num_args = 1..)]
    special_requirements: Option<Vec<String>>,
    /// Vehicle details as a JSON object
    #[arg(long)]
    vehicle: Option<String>,
}

#[derive(Subcommand, Debug)]
enum NotificationsCommand {
    /// List notifications, optionally unread or newly created only
    List {
        #[arg(long)]
        unread: bool,
        /// Only notifications created since the last delivery sweep
        #[arg(long, conflicts_with = "unread")]
        new: bool,
    },
    /// Show notifications matched against the watched dates and centres
    Matched,
    /// Mark notifications read by id
    MarkRead { ids: Vec<String> },
}

#[derive(Args, Debug)]
struct PremiumArgs {
    /// Store receipt or purchase token
    #[arg(long)]
    receipt: String,
    /// Store platform the receipt came from: ios or android
    #[arg(long)]
    platform: Platform,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Watch);

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let api = Arc::new(ApiClient::new(&config.api)?);
    let store = Arc::new(FileStore::new(config.storage.profile_path.clone()));

    match command {
        Command::Login(args) => run_login(api, store, &config, args).await,
        Command::Watch => run_watch(api, store, &config).await,
        Command::Refresh => run_refresh(api, store, &config).await,
        Command::Status => run_status(api, store).await,
        Command::Centres { command } => run_centres(api, store, command).await,
        Command::Availability { command } => run_availability(api, store, command).await,
        Command::Profile { command } => run_profile(api, store, command).await,
        Command::Notifications { command } => run_notifications(api, store, command).await,
        Command::Premium(args) => run_premium(api, store, args).await,
        Command::Logout => run_logout(store),
    }
}

async fn run_login(
    api: Arc<ApiClient>,
    store: Arc<FileStore>,
    config: &AppConfig,
    args: LoginArgs,
) -> Result<(), AppError> {
    let flow = LoginFlow::new(api, store, &config.poll);
    let outcome = flow.login(&args.licence, &args.application_ref).await?;

    if outcome.created {
        println!("Welcome! A new account was registered for this licence.");
    }
    println!(
        "Logged in as {}.",
        outcome
            .profile
            .license_number
            .as_deref()
            .unwrap_or("<unknown licence>")
    );
    if outcome.premium {
        println!("Premium is active; automatic booking is available.");
    } else {
        println!("Free tier: slot alerts only. Run `slotscout premium` to upgrade.");
    }
    Ok(())
}

async fn run_watch(
    api: Arc<ApiClient>,
    store: Arc<FileStore>,
    config: &AppConfig,
) -> Result<(), AppError> {
    let profile = store.load()?;
    if !profile.map_or(false, |p| p.has_credentials()) {
        return Err(AppError::Usage(
            "no stored credentials; run `slotscout login` first".to_string(),
        ));
    }

    info!(
        interval_secs = config.poll.background_interval.as_secs(),
        "starting availability watcher"
    );
    let poller = AvailabilityPoller::new(api, store, config.poll.clone());
    poller.run().await;
    Ok(())
}

async fn run_refresh(
    api: Arc<ApiClient>,
    store: Arc<FileStore>,
    config: &AppConfig,
) -> Result<(), AppError> {
    let poller = AvailabilityPoller::new(api, store, config.poll.clone());
    match poller.refresh().await? {
        PollOutcome::Started { task_id, dates } => {
            println!("Availability check submitted (job {task_id}); waiting for results...");
            poller.watch_task(&task_id, &dates).await;
            render_statuses(&poller.statuses());
        }
        PollOutcome::Skipped(reason) => {
            println!("Check not started: {}.", reason.describe());
        }
    }
    Ok(())
}

async fn run_status(api: Arc<ApiClient>, store: Arc<FileStore>) -> Result<(), AppError> {
    let profile = store
        .load()?
        .ok_or_else(|| AppError::Usage("no stored profile; run `slotscout login` first".to_string()))?;
    let licence = profile.license_number.as_deref().ok_or_else(|| {
        AppError::Usage("stored profile has no licence number; log in again".to_string())
    })?;

    let user = api.get_user(licence).await?;
    let centres = api.test_centres().await?;

    println!("Licence: {licence}");
    println!(
        "Premium: {}",
        if user.is_premium { "yes" } else { "no" }
    );

    if user.selected_centres.is_empty() {
        println!("No test centres selected.");
    }
    if user.availability.is_empty() {
        println!("No watched dates.");
        return Ok(());
    }

    for (date, slots) in &user.availability {
        println!("\n{} (preferred: {})", date.long(), slots.join(", "));
        for selection in &user.selected_centres {
            let Some(listing) = centres.iter().find(|centre| centre.matches(selection)) else {
                println!("- {}: not in the current listing", selection.name);
                continue;
            };
            render_centre_openings(listing, *date);
        }
    }
    Ok(())
}

fn render_centre_openings(listing: &TestCentre, date: SlotDate) {
    let openings = listing.slots_on(date);
    if openings.is_empty() {
        println!("- {}: no openings on this date", listing.name);
    } else {
        let times: Vec<&str> = openings.iter().map(|slot| slot.time.as_str()).collect();
        println!("- {}: {}", listing.name, times.join(", "));
    }
    if let Some(updated) = &listing.test_date {
        match SlotDate::parse_flexible(updated) {
            Ok(updated) => println!("  last updated {}", updated.long()),
            Err(_) => println!("  last updated {updated}"),
        }
    }
}

async fn run_centres(
    api: Arc<ApiClient>,
    store: Arc<FileStore>,
    command: CentresCommand,
) -> Result<(), AppError> {
    match command {
        CentresCommand::List => {
            let centres = api.test_centres().await?;
            for centre in centres {
                println!(
                    "{} ({}) - {} published openings",
                    centre.name,
                    centre.postal_code,
                    centre.available_dates.len()
                );
            }
            Ok(())
        }
        CentresCommand::Select { names } => {
            if names.is_empty() {
                return Err(AppError::Usage("name at least one centre".to_string()));
            }
            if names.len() > MAX_SELECTED_CENTRES {
                return Err(AppError::Usage(format!(
                    "at most {MAX_SELECTED_CENTRES} centres can be watched"
                )));
            }

            let listing = api.test_centres().await?;
            let mut selected = Vec::with_capacity(names.len());
            for name in &names {
                let wanted = name.trim().to_lowercase();
                let found = listing
                    .iter()
                    .find(|centre| centre.name.trim().to_lowercase() == wanted)
                    .ok_or_else(|| {
                        AppError::Usage(format!("'{name}' is not a known test centre"))
                    })?;
                selected.push(slotscout::domain::SelectedCentre {
                    name: found.name.clone(),
                    postal_code: found.postal_code.clone(),
                });
            }

            let profile = store.update(&|profile| profile.selected_centres = selected.clone())?;
            let licence = profile.license_number.as_deref().ok_or_else(|| {
                AppError::Usage("stored profile has no licence number; log in first".to_string())
            })?;
            api.update_centres(licence, &selected).await?;
            println!("Watching {} centre(s).", selected.len());
            Ok(())
        }
    }
}

async fn run_availability(
    api: Arc<ApiClient>,
    store: Arc<FileStore>,
    command: AvailabilityCommand,
) -> Result<(), AppError> {
    match command {
        AvailabilityCommand::Show => {
            let profile = store.load()?.unwrap_or_default();
            if profile.availability.is_empty() {
                println!("No watched dates.");
            }
            for (date, slots) in &profile.availability {
                println!("{} ({}): {}", date.short(), date.long(), slots.join(", "));
            }
            Ok(())
        }
        AvailabilityCommand::Set { date, slots } => {
            let date = SlotDate::parse_short(&date)
                .map_err(|err| AppError::Usage(err.to_string()))?;
            push_availability(&api, &store, &|profile| {
                profile.availability.insert(date, slots.clone());
            })
            .await?;
            println!("Watching {}.", date.long());
            Ok(())
        }
        AvailabilityCommand::Remove { date } => {
            let date = SlotDate::parse_short(&date)
                .map_err(|err| AppError::Usage(err.to_string()))?;
            push_availability(&api, &store, &|profile| {
                profile.availability.remove(&date);
            })
            .await?;
            println!("Stopped watching {}.", date.long());
            Ok(())
        }
    }
}

/// Apply an availability edit locally, then mirror it to the server.
async fn push_availability(
    api: &ApiClient,
    store: &FileStore,
    apply: &dyn Fn(&mut slotscout::store::UserProfile),
) -> Result<(), AppError> {
    let profile = store.update(apply)?;
    let licence = profile.license_number.as_deref().ok_or_else(|| {
        AppError::Usage("stored profile has no licence number; log in first".to_string())
    })?;
    api.update_user_availability(licence, &profile.availability)
        .await?;
    Ok(())
}

async fn run_profile(
    api: Arc<ApiClient>,
    store: Arc<FileStore>,
    command: ProfileCommand,
) -> Result<(), AppError> {
    match command {
        ProfileCommand::Show => {
            let profile = store.load()?.unwrap_or_default();
            println!("Email: {}", profile.email.as_deref().unwrap_or("-"));
            println!("Test type: {}", profile.test_type.as_deref().unwrap_or("-"));
            if profile.special_requirements.is_empty() {
                println!("Special requirements: -");
            } else {
                println!(
                    "Special requirements: {}",
                    profile.special_requirements.join(", ")
                );
            }
            match &profile.vehicle {
                Some(vehicle) => println!("Vehicle: {vehicle}"),
                None => println!("Vehicle: -"),
            }
            Ok(())
        }
        ProfileCommand::Set(args) => {
            if args.email.is_none()
                && args.test_type.is_none()
                && args.special_requirements.is_none()
                && args.vehicle.is_none()
            {
                return Err(AppError::Usage(
                    "nothing to change; pass at least one --option".to_string(),
                ));
            }
            let vehicle: Option<serde_json::Value> = match &args.vehicle {
                Some(raw) => Some(serde_json::from_str(raw).map_err(|err| {
                    AppError::Usage(format!("--vehicle must be a JSON object: {err}"))
                })?),
                None => None,
            };

            let profile = store.update(&|profile| {
                if let Some(email) = &args.email {
                    profile.email = Some(email.clone());
                }
                if let Some(test_type) = &args.test_type {
                    profile.test_type = Some(test_type.clone());
                }
                if let Some(requirements) = &args.special_requirements {
                    profile.special_requirements = requirements.clone();
                }
                if let Some(vehicle) = &vehicle {
                    profile.vehicle = Some(vehicle.clone());
                }
            })?;
            if profile.license_number.is_none() {
                return Err(AppError::Usage(
                    "stored profile has no licence number; log in first".to_string(),
                ));
            }
            api.update_user_with_details(&profile).await?;
            println!("Profile updated.");
            Ok(())
        }
    }
}

async fn run_notifications(
    api: Arc<ApiClient>,
    store: Arc<FileStore>,
    command: NotificationsCommand,
) -> Result<(), AppError> {
    let feed = NotificationFeed::new(api, store);
    match command {
        NotificationsCommand::List { unread, new } => {
            let records = if new {
                feed.fetch_new().await?
            } else {
                feed.fetch_all().await?
            };
            if unread {
                for record in notifications::unread(&records) {
                    render_notification(record);
                }
            } else {
                for record in &records {
                    render_notification(record);
                }
            }
            Ok(())
        }
        NotificationsCommand::Matched => {
            let notices = feed.fetch_matched().await?;
            if notices.is_empty() {
                println!("No watched dates.");
            }
            for notice in notices {
                match notice.text {
                    Some(text) => println!("{}: {}", notice.date.long(), text),
                    None => println!("{}: no notifications", notice.date.long()),
                }
            }
            Ok(())
        }
        NotificationsCommand::MarkRead { ids } => {
            if ids.is_empty() {
                return Err(AppError::Usage("name at least one notification id".to_string()));
            }
            feed.mark_read(&ids).await?;
            println!("Marked {} notification(s) read.", ids.len());
            Ok(())
        }
    }
}

fn render_notification(record: &slotscout::api::NotificationRecord) {
    let flags = match (record.read, record.read_app) {
        (true, true) => "read",
        _ => "unread",
    };
    let when = record.date.as_deref().unwrap_or("-");
    println!("[{}] {} ({}) {}", flags, record.id, when, record.text);
}

async fn run_premium(
    api: Arc<ApiClient>,
    store: Arc<FileStore>,
    args: PremiumArgs,
) -> Result<(), AppError> {
    let billing = BillingService::new(api, store);
    billing.redeem(&args.receipt, args.platform).await?;
    println!("Premium is now active.");
    Ok(())
}

fn run_logout(store: Arc<FileStore>) -> Result<(), AppError> {
    store.clear()?;
    println!("Stored profile removed.");
    Ok(())
}

fn render_statuses(statuses: &std::collections::BTreeMap<SlotDate, DateStatus>) {
    if statuses.is_empty() {
        println!("No results yet.");
        return;
    }
    for (date, status) in statuses {
        match status {
            DateStatus::Available { time_slots } => {
                println!("{}: available ({})", date.long(), time_slots.join(", "));
            }
            other => println!("{}: {}", date.long(), other.label()),
        }
    }
}
