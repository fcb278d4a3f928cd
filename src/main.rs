use anyhow::Context;
use clap::{Parser, Subcommand};
use parcelshot::automation::{CaptureController, StartOutcome};
use parcelshot::browser::{ChromeDriver, ChromeViewer, ConnectionMode};
use parcelshot::capture::{CaptureService, DiskSink};
use parcelshot::settings::{Settings, SettingsStore};
use parcelshot::viewer::Viewer;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use warp::Filter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Attach to a Chrome started with --remote-debugging-port instead of launching one
    #[arg(long)]
    debug_port: Option<u16>,

    /// Chrome executable for a launched browser
    #[arg(long)]
    chrome_path: Option<String>,

    #[arg(long)]
    no_sandbox: bool,

    #[arg(long)]
    headless: bool,

    /// Open this URL before doing anything else
    #[arg(long)]
    url: Option<String>,

    /// Pick the first tab whose URL contains this text
    #[arg(long)]
    page_hint: Option<String>,

    /// Settings file (default: <config dir>/parcelshot/settings.json)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Base directory for captures (default: the download directory)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the control API (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 9669)]
        port: u16,
    },
    /// Capture the current image once
    Capture,
    /// Run the auto-capture loop until it ends or Ctrl+C
    Run,
    /// Print the inferred context without capturing
    Inspect,
}

struct AppState {
    controller: Arc<CaptureController>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let controller = Arc::new(build_controller(&args).await?);

    match args.command.unwrap_or(Command::Serve { port: 9669 }) {
        Command::Serve { port } => serve(controller, port).await,
        Command::Capture => {
            let record = controller.capture_once().await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Command::Run => run_until_done(controller).await,
        Command::Inspect => {
            let context = controller.service().discover_context().await?;
            println!("{}", serde_json::to_string_pretty(&context)?);
            Ok(())
        }
    }
}

async fn build_controller(args: &Args) -> anyhow::Result<CaptureController> {
    let mode = match args.debug_port {
        Some(port) => ConnectionMode::DebugPort(port),
        None => ConnectionMode::Sandboxed {
            chrome_path: args.chrome_path.clone(),
            no_sandbox: args.no_sandbox,
            headless: args.headless,
        },
    };
    let mut driver = ChromeDriver::new(mode)
        .await
        .context("Failed to start a Chrome session")?;
    if let Some(hint) = &args.page_hint {
        driver = driver.with_page_hint(hint.clone());
    }
    if let Some(url) = &args.url {
        driver.navigate(url).await.context("Failed to open the viewer")?;
    }

    let settings_path = args.settings.clone().or_else(SettingsStore::default_path);
    let settings = match settings_path {
        Some(path) => {
            log::info!("Settings file: {}", path.display());
            SettingsStore::new(path)
        }
        None => SettingsStore::fixed(Default::default()),
    };
    let sink = match &args.output_dir {
        Some(dir) => DiskSink::new(dir),
        None => DiskSink::downloads(),
    };
    log::info!("Saving captures under {}", sink.base_dir().display());

    let viewer: Arc<dyn Viewer> = Arc::new(ChromeViewer::new(driver));
    let service = CaptureService::new(viewer, Arc::new(settings), sink);
    Ok(CaptureController::new(Arc::new(service)))
}

async fn run_until_done(controller: Arc<CaptureController>) -> anyhow::Result<()> {
    if controller.start() == StartOutcome::AlreadyRunning {
        anyhow::bail!("Auto capture is already running");
    }

    while controller.is_running() {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Ctrl+C received, finishing the current step");
                controller.stop();
            }
            _ = tokio::time::sleep(Duration::from_millis(500)) => {}
        }
    }

    let status = controller.status().await;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn serve(controller: Arc<CaptureController>, port: u16) -> anyhow::Result<()> {
    log::info!("Starting parcelshot on port {}", port);

    let state = Arc::new(AppState { controller });
    let state_filter = warp::any().map(move || state.clone());

    let health =
        warp::path("health").map(|| warp::reply::json(&serde_json::json!({ "status": "ok" })));

    let status = warp::path("status")
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(handle_status);

    let start = warp::path("start")
        .and(warp::post())
        .and(state_filter.clone())
        .and_then(handle_start);

    let stop = warp::path("stop")
        .and(warp::post())
        .and(state_filter.clone())
        .and_then(handle_stop);

    let capture = warp::path("capture")
        .and(warp::post())
        .and(state_filter.clone())
        .and_then(handle_capture);

    let context = warp::path("context")
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(handle_context);

    let settings = warp::path("settings")
        .and(warp::path::end())
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(handle_settings);

    let update = warp::path("settings")
        .and(warp::path::end())
        .and(warp::put())
        .and(warp::body::json())
        .and(state_filter.clone())
        .and_then(handle_settings_update);

    let reload = warp::path!("settings" / "reload")
        .and(warp::post())
        .and(state_filter)
        .and_then(handle_settings_reload);

    let routes = health
        .or(status)
        .or(start)
        .or(stop)
        .or(capture)
        .or(context)
        .or(settings)
        .or(update)
        .or(reload);

    // Bind manually to handle "port in use" error gracefully
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            log::info!("Listening on http://{}", addr);
            warp::serve(routes)
                .run_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
                .await;
            Ok(())
        }
        Err(e) => {
            log::error!("Failed to bind to port {}: {}", port, e);
            eprintln!("Error: Port {} is already in use or unavailable.", port);
            std::process::exit(1);
        }
    }
}

fn error_reply(message: String) -> warp::reply::Json {
    warp::reply::json(&serde_json::json!({ "status": "error", "message": message }))
}

async fn handle_status(state: Arc<AppState>) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&state.controller.status().await))
}

async fn handle_start(state: Arc<AppState>) -> Result<impl warp::Reply, warp::Rejection> {
    let outcome = state.controller.start();
    log::info!("Start requested: {:?}", outcome);
    Ok(warp::reply::json(&serde_json::json!({ "status": outcome })))
}

async fn handle_stop(state: Arc<AppState>) -> Result<impl warp::Reply, warp::Rejection> {
    state.controller.stop();
    Ok(warp::reply::json(&serde_json::json!({ "status": "stopping" })))
}

async fn handle_capture(state: Arc<AppState>) -> Result<impl warp::Reply, warp::Rejection> {
    match state.controller.capture_once().await {
        Ok(record) => Ok(warp::reply::json(&record)),
        Err(e) => Ok(error_reply(e.to_string())),
    }
}

async fn handle_context(state: Arc<AppState>) -> Result<impl warp::Reply, warp::Rejection> {
    match state.controller.service().discover_context().await {
        Ok(context) => Ok(warp::reply::json(&context)),
        Err(e) => Ok(error_reply(e.to_string())),
    }
}

async fn handle_settings(state: Arc<AppState>) -> Result<impl warp::Reply, warp::Rejection> {
    let settings = state.controller.service().settings().get().await;
    Ok(warp::reply::json(&settings))
}

async fn handle_settings_update(
    settings: Settings,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let store = state.controller.service().settings();
    match store.save(&settings).await {
        Ok(()) => {
            log::info!("Settings updated");
            Ok(warp::reply::json(&store.get().await))
        }
        Err(e) => Ok(error_reply(e.to_string())),
    }
}

async fn handle_settings_reload(state: Arc<AppState>) -> Result<impl warp::Reply, warp::Rejection> {
    let store = state.controller.service().settings();
    store.invalidate().await;
    Ok(warp::reply::json(&store.get().await))
}
