//! Entry point for the devicedash TUI. Parses args, resolves the profile and runs the App.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use devicedash::app::App;
use devicedash::config::{ClientConfig, DEFAULT_API_URL, DEFAULT_POLL_SECS};
use devicedash::profiles::{
    config_dir, load_profiles, save_profiles, ProfileEntry, ProfileRequest, ResolveProfile,
};
use devicedash::session::{FileTokenStore, MemoryTokenStore, Session, TokenStore};
use devicedash::transport::HttpTransport;
use devicedash::types::DEFAULT_PAGE_SIZE;
use devicedash::ApiClient;

const DEMO_PORT: u16 = 3231;
const DEMO_EMAIL: &str = "demo@devicedash.local";
const DEMO_PASSWORD: &str = "demo1234";

#[derive(Parser, Debug)]
#[command(
    name = "devicedash",
    version,
    about = "Terminal dashboard for IoT devices behind a GraphQL API"
)]
struct Cli {
    /// API base URL, e.g. http://HOST:PORT (ws:// and bare HOST:PORT are accepted)
    url: Option<String>,

    /// PEM certificate to trust for https/wss
    #[arg(short = 't', long = "tls-ca", value_name = "CERT_PEM")]
    tls_ca: Option<String>,

    /// Named connection profile
    #[arg(short = 'P', long, value_name = "NAME")]
    profile: Option<String>,

    /// Overwrite an existing profile without asking
    #[arg(long)]
    save: bool,

    /// Start a local demo API and connect to it
    #[arg(long)]
    demo: bool,

    /// Seconds between background refreshes
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_POLL_SECS,
          value_parser = clap::value_parser!(u64).range(1..))]
    poll_secs: u64,

    /// Devices per page
    #[arg(long, value_name = "N", default_value_t = DEFAULT_PAGE_SIZE,
          value_parser = clap::value_parser!(u32).range(1..=500))]
    page_size: u32,

    /// Do not open the deviceUpdated subscription; rely on polling only
    #[arg(long)]
    no_live: bool,

    /// Print the resolved endpoints and exit
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    // Demo mode short-circuit (ignore other args except conflicting ones)
    if cli.demo || matches!(cli.profile.as_deref(), Some("demo")) {
        return run_demo_mode(&cli).await;
    }

    let Some((url, tls_ca)) = resolve_connection(&cli)? else {
        return Ok(());
    };

    let config = ClientConfig::new(&url)
        .with_context(|| format!("invalid API URL '{url}'"))?
        .with_tls_ca(tls_ca.map(PathBuf::from))
        .with_poll_interval(Duration::from_secs(cli.poll_secs))
        .with_page_size(cli.page_size);

    if cli.dry_run {
        print_dry_run(&config);
        return Ok(());
    }

    let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::default_location());
    run_app(config, Session::restore(store), !cli.no_live, None).await
}

/// Turn CLI args + saved profiles into (url, tls_ca). `None` means the user aborted a prompt.
fn resolve_connection(cli: &Cli) -> anyhow::Result<Option<(String, Option<String>)>> {
    let profiles_file = load_profiles();
    let req = ProfileRequest {
        profile_name: cli.profile.clone(),
        api_url: cli.url.clone(),
        tls_ca: cli.tls_ca.clone(),
    };
    let resolved = req.resolve(&profiles_file);

    // Determine final connection parameters (and maybe mutated profiles to persist)
    let mut profiles_mut = profiles_file.clone();
    let conn = match resolved {
        ResolveProfile::Direct(u, t) => {
            if let Some(name) = cli.profile.as_ref() {
                let entry = ProfileEntry {
                    api_url: u.clone(),
                    tls_ca: t.clone(),
                };
                let write = match profiles_mut.profiles.get(name) {
                    // New profile: auto-save immediately
                    None => true,
                    Some(existing) if *existing != entry => {
                        cli.save
                            || prompt_yes_no(&format!("Overwrite existing profile '{name}'? [y/N]: "))
                    }
                    Some(_) => false,
                };
                if write {
                    profiles_mut.profiles.insert(name.clone(), entry);
                    save_profiles(&profiles_mut).context("saving profiles")?;
                }
            }
            (u, t)
        }
        ResolveProfile::Loaded(u, t) => (u, t.or_else(|| cli.tls_ca.clone())),
        ResolveProfile::PromptSelect(mut names) => {
            // Always offer the demo as the last choice
            if !names.iter().any(|n| n == "demo") {
                names.push("demo".into());
            }
            eprintln!("Select profile:");
            for (i, n) in names.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, n);
            }
            let line = prompt_string("Enter number (or blank to use the default URL): ")?;
            let line = line.trim();
            if line.is_empty() {
                (DEFAULT_API_URL.to_string(), cli.tls_ca.clone())
            } else {
                let Some(name) = line
                    .parse::<usize>()
                    .ok()
                    .and_then(|idx| idx.checked_sub(1))
                    .and_then(|idx| names.get(idx))
                else {
                    eprintln!("No such profile.");
                    return Ok(None);
                };
                if name == "demo" {
                    eprintln!("Use --demo to start the demo API.");
                    return Ok(None);
                }
                match profiles_mut.profiles.get(name) {
                    Some(entry) => (entry.api_url.clone(), entry.tls_ca.clone()),
                    None => return Ok(None),
                }
            }
        }
        ResolveProfile::PromptCreate(name) => {
            eprintln!("Profile '{name}' does not exist yet.");
            let url = prompt_string("Enter API URL (http://HOST:PORT or https://...): ")?;
            if url.trim().is_empty() {
                return Ok(None);
            }
            let ca = prompt_string("Enter TLS CA path (or leave blank): ")?;
            let ca_opt = Some(ca.trim().to_string()).filter(|c| !c.is_empty());
            profiles_mut.profiles.insert(
                name,
                ProfileEntry {
                    api_url: url.trim().to_string(),
                    tls_ca: ca_opt.clone(),
                },
            );
            save_profiles(&profiles_mut).context("saving profiles")?;
            (url.trim().to_string(), ca_opt)
        }
        ResolveProfile::Default => (DEFAULT_API_URL.to_string(), cli.tls_ca.clone()),
    };
    Ok(Some(conn))
}

fn print_dry_run(config: &ClientConfig) {
    println!("api_url: {}", config.api_url);
    println!("graphql: {}", config.graphql_endpoint());
    println!("subscription: {}", config.subscription_endpoint());
    if let Some(ca) = config.tls_ca.as_ref() {
        println!("tls_ca: {}", ca.display());
    }
    println!("poll_secs: {}", config.poll_interval.as_secs());
    println!("page_size: {}", config.page_size);
}

async fn run_app(
    config: ClientConfig,
    session: Session,
    live: bool,
    login_hint: Option<(&str, &str)>,
) -> anyhow::Result<()> {
    let transport = HttpTransport::new(&config).context("building HTTP client")?;
    info!(endpoint = %transport.endpoint(), "starting dashboard");
    let api = ApiClient::new(Arc::new(transport), session);
    let mut app = App::new(api, config).with_live_updates(live);
    if let Some((email, password)) = login_hint {
        app = app.with_login_hint(email, password);
    }
    app.run().await
}

/// Logs go to a file only when DEVICEDASH_LOG is set; the TUI owns the terminal.
fn init_logging() {
    let Ok(filter) = std::env::var("DEVICEDASH_LOG") else {
        return;
    };
    let dir = config_dir();
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("devicedash.log"))
    else {
        return;
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .try_init();
}

fn prompt_yes_no(prompt: &str) -> bool {
    eprint!("{prompt}");
    let _ = io::stderr().flush();
    let mut line = String::new();
    if io::stdin().read_line(&mut line).is_ok() {
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    } else {
        false
    }
}

fn prompt_string(prompt: &str) -> io::Result<String> {
    eprint!("{prompt}");
    let _ = io::stderr().flush();
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}

// --- Demo Mode ---

async fn run_demo_mode(cli: &Cli) -> anyhow::Result<()> {
    let url = format!("http://127.0.0.1:{DEMO_PORT}");
    let config = ClientConfig::new(&url)?
        .with_poll_interval(Duration::from_secs(cli.poll_secs))
        .with_page_size(cli.page_size);
    if cli.dry_run {
        print_dry_run(&config);
        return Ok(());
    }
    let _guard = spawn_demo_api(DEMO_PORT).await?;
    // Demo tokens never touch the saved session
    let session = Session::restore(Arc::new(MemoryTokenStore::default()));
    run_app(
        config,
        session,
        !cli.no_live,
        Some((DEMO_EMAIL, DEMO_PASSWORD)),
    )
    .await
}

/// Kills the demo API when dropped.
struct DemoGuard(std::process::Child);

impl Drop for DemoGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

async fn spawn_demo_api(port: u16) -> anyhow::Result<DemoGuard> {
    let exe = find_demo_executable();
    let child = std::process::Command::new(&exe)
        .arg("--port")
        .arg(port.to_string())
        .env("RUST_LOG", "warn")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .with_context(|| format!("starting demo API ({})", exe.display()))?;
    let guard = DemoGuard(child);

    // Wait until it accepts connections
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return Ok(guard);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    anyhow::bail!("demo API did not start listening on port {port}")
}

fn find_demo_executable() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            #[cfg(windows)]
            let name = "devicedash_demo.exe";
            #[cfg(not(windows))]
            let name = "devicedash_demo";
            let candidate = parent.join(name);
            if candidate.exists() {
                return candidate;
            }
        }
    }
    // Fallback to relying on PATH
    PathBuf::from("devicedash_demo")
}
