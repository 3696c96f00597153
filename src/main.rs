use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use nutricare_lib::commands::patient::{add_patient, list_patients, NewPatient};
use nutricare_lib::commands::report::{
    list_reports, process_pending_reports, process_report, recover_stalled, reprocess_report,
    show_report, upload_and_process, upload_report,
};
use nutricare_lib::commands::{to_json, CommandContext};
use nutricare_lib::config::{Settings, APP_VERSION};
use nutricare_lib::pipeline::processor::ReportProcessor;

#[derive(Parser, Debug)]
#[command(name = "nutricare")]
#[command(version, about = "Extract health metrics and clinician notes from medical reports", long_about = None)]
struct Cli {
    /// Database file (overrides NUTRICARE_DATABASE)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage patients
    Patient {
        #[command(subcommand)]
        action: PatientAction,
    },

    /// Upload a report file for a patient
    Upload {
        /// Patient id
        patient: String,

        /// Report file (PDF, PNG, JPEG, TIFF, BMP or plain text)
        file: PathBuf,

        /// Run extraction right after the upload
        #[arg(short, long)]
        process: bool,
    },

    /// Extract an uploaded report
    Process {
        /// Report id
        report: String,
    },

    /// Retry extraction of a failed report
    Reprocess {
        /// Report id
        report: String,
    },

    /// Extract every report still waiting in `uploaded`
    ProcessPending {
        /// Reports processed in parallel (default from NUTRICARE_BATCH_JOBS)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Fail reports stuck in `extracting` so they can be reprocessed
    Recover {
        /// Only reports claimed at least this many seconds ago
        /// (default from NUTRICARE_STALLED_AFTER_SECS)
        #[arg(long)]
        older_than: Option<u64>,
    },

    /// List reports
    Reports {
        /// Only this patient's reports
        #[arg(short, long)]
        patient: Option<String>,

        /// Only reports in this status (uploaded, extracting, extracted, failed)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show a report with its extracted text, metrics and notes
    Show {
        /// Report id
        report: String,
    },
}

#[derive(Subcommand, Debug)]
enum PatientAction {
    /// Add a patient
    Add {
        /// Full name
        name: String,

        /// Date of birth, YYYY-MM-DD
        #[arg(long)]
        dob: Option<String>,

        #[arg(long)]
        gender: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        /// Known allergy (repeatable)
        #[arg(long = "allergy")]
        allergies: Vec<String>,

        /// Dietary preference (repeatable)
        #[arg(long = "diet")]
        dietary_preferences: Vec<String>,
    },

    /// List patients
    List,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut settings = Settings::from_env();
    if let Some(database) = cli.database.clone() {
        settings.database_path = database;
    }
    nutricare_lib::init_tracing(&settings);
    tracing::debug!(version = APP_VERSION, database = %settings.database_path.display(), "NutriCare starting");

    match run(cli.command, settings).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, settings: Settings) -> Result<String, String> {
    let ctx = CommandContext::open(settings)?;

    match command {
        Commands::Patient { action } => match action {
            PatientAction::Add {
                name,
                dob,
                gender,
                email,
                phone,
                allergies,
                dietary_preferences,
            } => {
                let patient = add_patient(
                    &ctx,
                    NewPatient {
                        full_name: name,
                        date_of_birth: dob,
                        gender,
                        email,
                        phone,
                        allergies,
                        dietary_preferences,
                    },
                )?;
                to_json(&patient)
            }
            PatientAction::List => to_json(&list_patients(&ctx)?),
        },
        Commands::Upload {
            patient,
            file,
            process,
        } => {
            if process {
                let processor = ReportProcessor::from_settings(&ctx.settings);
                to_json(&upload_and_process(&ctx, &processor, &patient, &file)?)
            } else {
                to_json(&upload_report(&ctx, &patient, &file)?)
            }
        }
        Commands::Process { report } => {
            let processor = ReportProcessor::from_settings(&ctx.settings);
            to_json(&process_report(&ctx, &processor, &report)?)
        }
        Commands::Reprocess { report } => {
            let processor = ReportProcessor::from_settings(&ctx.settings);
            to_json(&reprocess_report(&ctx, &processor, &report)?)
        }
        Commands::ProcessPending { jobs } => {
            let processor = Arc::new(ReportProcessor::from_settings(&ctx.settings));
            to_json(&process_pending_reports(&ctx, processor, jobs).await?)
        }
        Commands::Recover { older_than } => {
            let older_than = older_than.map(Duration::from_secs);
            to_json(&recover_stalled(&ctx, older_than)?)
        }
        Commands::Reports { patient, status } => {
            to_json(&list_reports(&ctx, patient.as_deref(), status.as_deref())?)
        }
        Commands::Show { report } => to_json(&show_report(&ctx, &report)?),
    }
}
