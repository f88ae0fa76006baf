use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use riskcare_core::{
    resolve_data_dir, CallerContext, CoreConfig, Disease, DoctorProfile, NewAccount,
    NewPredictionResult, NonEmptyText, Platform, ReviewStatus, Role, StorageBackend, UserAccount,
};
use std::collections::BTreeMap;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "riskcare")]
#[command(about = "RiskCare early risk review CLI")]
struct Cli {
    /// Data directory (default: $RISKCARE_DATA_DIR, then ./risk_data)
    #[arg(long, global = true)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a patient or doctor account
    AddUser {
        username: String,
        email: String,
        /// patient or doctor
        #[arg(long, default_value = "patient")]
        role: String,
        /// Name shown in the directory, e.g. "Dr. Jane Doe" (doctors only)
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        specialization: Option<String>,
        #[arg(long, default_value_t = 0)]
        experience_years: u32,
        #[arg(long)]
        hospital: Option<String>,
        #[arg(long)]
        contact: Option<String>,
        #[arg(long)]
        licence: Option<String>,
        /// Mark the doctor as verified
        #[arg(long)]
        verified: bool,
    },
    /// Populate an empty doctor directory with the built-in doctors
    SeedDoctors,
    /// List doctors
    ListDoctors {
        #[arg(long)]
        verified_only: bool,
    },
    /// Record a prediction result for a patient
    RecordResult {
        /// Patient username
        username: String,
        /// heart_disease or diabetes
        disease: String,
        /// Classifier label, e.g. "High Risk"
        prediction: String,
        #[arg(long)]
        probability: Option<f64>,
        /// Input feature as name=value (repeatable)
        #[arg(long = "feature", value_parser = parse_feature)]
        features: Vec<(String, f64)>,
    },
    /// List review requests sent (patients) or received (doctors)
    ListRequests {
        username: String,
        /// pending, accepted, rejected or completed
        #[arg(long)]
        status: Option<String>,
    },
    /// Show a user's notifications
    Notifications {
        username: String,
        /// Mark every notification as read afterwards
        #[arg(long)]
        mark_all_read: bool,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("riskcare_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'riskcare --help' for commands");
        return Ok(());
    };

    let data_dir = resolve_data_dir(
        cli.data_dir
            .or_else(|| std::env::var("RISKCARE_DATA_DIR").ok()),
    );
    let config = CoreConfig::new(data_dir, StorageBackend::Files)?;
    let platform = Platform::from_config(&config)?;

    match command {
        Commands::AddUser {
            username,
            email,
            role,
            display_name,
            specialization,
            experience_years,
            hospital,
            contact,
            licence,
            verified,
        } => {
            let role: Role = role.parse()?;
            let doctor_profile = match role {
                Role::Patient => None,
                Role::Doctor => Some(DoctorProfile {
                    display_name: display_name.map(NonEmptyText::new).transpose()?,
                    specialization: required(specialization, "--specialization")?,
                    experience_years,
                    hospital: required(hospital, "--hospital")?,
                    contact_number: required(contact, "--contact")?,
                    licence_number: licence.map(NonEmptyText::new).transpose()?,
                    verified,
                }),
            };
            let user = platform.accounts.register(NewAccount {
                username,
                email,
                role,
                doctor_profile,
            })?;
            println!("Registered {} {} with ID: {}", user.role, user.username, user.id);
        }
        Commands::SeedDoctors => {
            let created = platform.accounts.seed_doctors()?;
            if created == 0 {
                println!("Doctors already exist; nothing seeded.");
            } else {
                println!("Seeded {} doctors.", created);
            }
        }
        Commands::ListDoctors { verified_only } => {
            let doctors = platform.accounts.list_doctors(verified_only)?;
            if doctors.is_empty() {
                println!("No doctors found.");
            }
            for doctor in doctors.iter() {
                print_doctor(doctor);
            }
        }
        Commands::RecordResult {
            username,
            disease,
            prediction,
            probability,
            features,
        } => {
            let caller = caller_for(&platform, &username)?;
            let result = platform.results.record_result(
                &caller,
                NewPredictionResult {
                    disease: Some(disease.parse::<Disease>()?),
                    prediction: Some(prediction),
                    probability,
                    timestamp: None,
                    features: features.into_iter().collect::<BTreeMap<_, _>>(),
                },
            )?;
            println!("Recorded {} result with ID: {}", result.disease, result.id);
        }
        Commands::ListRequests { username, status } => {
            let caller = caller_for(&platform, &username)?;
            let status = status.map(|s| s.parse::<ReviewStatus>()).transpose()?;
            let requests = match caller.role {
                Role::Doctor => platform.reviews.list_doctor_requests(&caller, status)?,
                Role::Patient => platform
                    .reviews
                    .list_patient_requests(&caller)?
                    .into_iter()
                    .filter(|r| status.is_none_or(|s| r.status == s))
                    .collect(),
            };
            if requests.is_empty() {
                println!("No review requests found.");
            }
            for request in requests {
                println!(
                    "ID: {}, Status: {}, Patient: {}, Doctor: {}, Updated: {}",
                    request.id,
                    request.status,
                    request.patient_id,
                    request.doctor_id,
                    request.updated_at
                );
                if let Some(notes) = request.doctor_notes {
                    println!("    Notes: {}", notes);
                }
            }
        }
        Commands::Notifications {
            username,
            mark_all_read,
        } => {
            let caller = caller_for(&platform, &username)?;
            let notifications = platform.notifications.list(&caller)?;
            if notifications.is_empty() {
                println!("No notifications.");
            }
            for notification in notifications.iter() {
                let marker = if notification.is_read { " " } else { "*" };
                println!(
                    "{} {} {}",
                    marker, notification.created_at, notification.message
                );
            }
            if mark_all_read {
                let updated = platform.notifications.mark_all_read(&caller)?;
                println!("Marked {} notifications as read.", updated);
            }
        }
    }

    Ok(())
}

/// Resolves a username to the caller context the core services expect.
fn caller_for(platform: &Platform, username: &str) -> anyhow::Result<CallerContext> {
    let user = platform
        .accounts
        .find_by_username(username)?
        .ok_or_else(|| anyhow!("no user named {}", username))?;
    Ok(CallerContext::new(user.id, user.role))
}

fn required(value: Option<String>, flag: &str) -> anyhow::Result<NonEmptyText> {
    let value = value.with_context(|| format!("{} is required for doctor accounts", flag))?;
    Ok(NonEmptyText::new(value)?)
}

fn print_doctor(doctor: &UserAccount) {
    let Some(profile) = &doctor.doctor_profile else {
        return;
    };
    let name = profile
        .display_name
        .as_ref()
        .map(|n| n.as_str())
        .unwrap_or(doctor.username.as_str());
    println!(
        "ID: {}, Name: {}, {} ({} years), {}, {}{}",
        doctor.id,
        name,
        profile.specialization,
        profile.experience_years,
        profile.hospital,
        profile.contact_number,
        if profile.verified { "" } else { " [unverified]" }
    );
}

/// Parses `name=value` into a feature entry.
fn parse_feature(input: &str) -> Result<(String, f64), String> {
    let (name, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", input))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("feature name missing in '{}'", input));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for {}: {}", name, e))?;
    Ok((name.to_string(), value))
}
