use clap::Parser;
use client::acquisition::{AcquireOutcome, FilePicker, ImageSource};
use client::config::AppConfig;
use client::predict::PredictionClient;
use client::preprocess::Preprocessor;
use client::report::SessionReport;
use client::session::{Completion, Diagnoser};
use shared::BackendKind;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "leafscan", about = "Diagnose plant leaf photos with remote models")]
struct Args {
    /// Photo picked from the gallery.
    #[arg(long, conflicts_with = "capture")]
    image: Option<PathBuf>,

    /// Photo taken with the camera.
    #[arg(long)]
    capture: Option<PathBuf>,

    /// Backend to analyze with; repeat to run both.
    #[arg(long = "backend", default_value = "tensorflow")]
    backends: Vec<BackendKind>,

    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the detail screen payload for this diagnosis.
    #[arg(long)]
    details: Option<usize>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref())?;

    let source = if args.capture.is_some() {
        ImageSource::Camera
    } else {
        ImageSource::Gallery
    };
    let picker = FilePicker::new(args.capture.clone(), args.image.clone());
    let predictor = PredictionClient::from_config(&config)?;
    let diagnoser = Diagnoser::new(picker, Preprocessor::jpeg(&config.work_dir), predictor)
        .with_specs(config.preprocess_specs());

    for backend in &args.backends {
        diagnoser.select(*backend);

        match diagnoser.acquire(source).await {
            Ok(AcquireOutcome::Acquired(_)) => {}
            Ok(AcquireOutcome::Cancelled) => {
                log::info!("No photo given for {}", backend);
                continue;
            }
            Err(e) => {
                eprintln!("{}", e.user_message());
                continue;
            }
        }

        match diagnoser.analyze().await {
            Ok(Completion::Applied) => {}
            Ok(other) => log::warn!("{} outcome was not recorded: {:?}", backend, other),
            Err(e) => log::error!("{} analysis failed: {}", backend, e),
        }
        let session = diagnoser.active_session();
        print!(
            "{}",
            SessionReport {
                backend: *backend,
                session: &session,
            }
        );

        if let Some(index) = args.details {
            match diagnoser.disease_details(index) {
                Some(request) => println!("{}", serde_json::to_string_pretty(&request)?),
                None => eprintln!("No diagnosis #{} for {}", index, backend),
            }
        }
    }

    Ok(())
}
