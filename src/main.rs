use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};

use airpods_sanity::audio::{self, Device, Role, find_by_name};
use airpods_sanity::config::{Config, ConfigLoader};
use airpods_sanity::logging::{self, LoggingConfig};
use airpods_sanity::notifications::NotificationManager;
use airpods_sanity::priority::PriorityStore;
use airpods_sanity::service::{ServiceManager, SignalHandler};
use airpods_sanity::simulate;
use airpods_sanity::status::PreferenceStatus;
use airpods_sanity::system::{DeviceCatalog, FileSystemInterface, StandardFileSystem};

#[derive(Parser)]
#[command(name = "airpods-sanity")]
#[command(about = "Keeps macOS from switching your microphone to AirPods")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run in daemon mode (default)
    Daemon,
    /// List all available audio devices
    ListDevices {
        /// Show device ids as well
        #[arg(short = 'l', long)]
        long: bool,
    },
    /// Show current default devices and what the next pass would do
    Status,
    /// Validate configuration file
    CheckConfig,
    /// Turn automatic switching on
    Enable,
    /// Turn automatic switching off
    Disable,
    /// Inspect or edit the priority lists
    Priority {
        #[command(subcommand)]
        action: PriorityAction,
    },
    /// Switch to a specific device
    Switch {
        /// Device name to switch to
        #[arg(short, long)]
        device: String,
        /// Switch input device instead of output
        #[arg(short, long)]
        input: bool,
    },
    /// Replay an AirPods connect/disconnect against simulated devices
    Simulate,
    /// Send a test desktop notification
    TestNotification,
}

#[derive(Subcommand)]
enum PriorityAction {
    /// Show both priority lists
    List,
    /// Append a device at the lowest priority
    Add(DeviceArg),
    /// Remove a device from its list
    Remove(DeviceArg),
    /// Move a device one place up
    Up(DeviceArg),
    /// Move a device one place down
    Down(DeviceArg),
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct DeviceArg {
    /// Input device name
    #[arg(long)]
    input: Option<String>,
    /// Output device name
    #[arg(long)]
    output: Option<String>,
}

impl DeviceArg {
    fn role_and_name(&self) -> Result<(Role, &str)> {
        match (self.input.as_deref(), self.output.as_deref()) {
            (Some(name), _) => Ok((Role::Input, name)),
            (None, Some(name)) => Ok((Role::Output, name)),
            (None, None) => Err(anyhow::anyhow!("Either --input or --output is required")),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = ConfigLoader::from_cli_path(cli.config.as_deref())?;
    // The configured subscriber depends on the file, so loading it logs to the console
    let config = logging::with_bootstrap_logging(cli.verbose, || loader.load_config())?;

    let command = cli.command.unwrap_or(Commands::Daemon);
    let logging_config = if matches!(command, Commands::Daemon) {
        LoggingConfig::for_daemon(&config, cli.verbose)
    } else {
        LoggingConfig::for_command(&config, cli.verbose)
    };
    let (_guard, log_dir) = logging::initialize_logging(logging_config)?;

    if let Some(log_dir) = &log_dir {
        info!("Logging to {}", log_dir.display());
        if let Err(e) = logging::cleanup_old_logs(log_dir, config.logging.keep_days) {
            warn!("Failed to clean up old logs: {}", e);
        }
    }

    match command {
        Commands::Daemon => run_daemon(loader, config).await,
        Commands::ListDevices { long } => list_devices(long),
        Commands::Status => show_status(&config),
        Commands::CheckConfig => check_config(&loader, &config),
        Commands::Enable => set_enabled(loader, true),
        Commands::Disable => set_enabled(loader, false),
        Commands::Priority { action } => edit_priorities(loader, action),
        Commands::Switch { device, input } => switch_device(&device, input),
        Commands::Simulate => run_simulation(),
        Commands::TestNotification => {
            NotificationManager::new(&config.notifications).test_notification()
        }
    }
}

async fn run_daemon(loader: ConfigLoader<StandardFileSystem>, config: Config) -> Result<()> {
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    let catalog = audio::system_catalog()?;
    let notifications = NotificationManager::new(&config.notifications);

    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    SignalHandler::new(signal_tx).spawn();

    println!("AirPods Sanity daemon started");
    println!("  Config: {}", loader.get_config_path().display());
    println!("  Press Ctrl+C to stop");

    let mut service = ServiceManager::new(loader, config);
    service.run(catalog, notifications, signal_rx).await?;

    println!("Daemon stopped");
    Ok(())
}

fn list_devices(long: bool) -> Result<()> {
    let catalog = audio::system_catalog()?;

    for role in [Role::Output, Role::Input] {
        let devices = catalog.list_devices(role)?;
        println!("{} devices:", capitalize(role.as_str()));
        if devices.is_empty() {
            println!("  No {} devices found!", role);
        }
        for device in &devices {
            print_device(device, long);
        }
    }

    Ok(())
}

fn print_device(device: &Device, long: bool) {
    let marker = if device.is_default { " [Default]" } else { "" };
    if long {
        println!("  {} {}{}", device.id, device.name, marker);
    } else {
        println!("  {}{}", device.name, marker);
    }
}

fn show_status(config: &Config) -> Result<()> {
    let catalog = audio::system_catalog()?;
    let status = PreferenceStatus::collect(&catalog, &config.preferences)?;

    println!(
        "Automatic switching: {}",
        if config.preferences.enabled { "enabled" } else { "disabled" }
    );
    println!("{}", status);
    if status.is_settled() {
        println!("✓ Devices match your preferences");
    }
    Ok(())
}

fn check_config<F: FileSystemInterface>(loader: &ConfigLoader<F>, config: &Config) -> Result<()> {
    println!("Configuration validation:");
    println!("  ✓ {} parsed successfully", loader.get_config_path().display());
    println!(
        "  ✓ Automatic switching {}",
        if config.preferences.enabled { "enabled" } else { "disabled" }
    );
    println!("  ✓ Priority outputs: {}", config.preferences.priority_outputs.len());
    println!("  ✓ Priority inputs: {}", config.preferences.priority_inputs.len());

    let warnings = config.warnings();
    for warning in &warnings {
        println!("  ⚠ {}", warning);
    }
    if warnings.is_empty() {
        println!("  ✓ No problems found");
    }
    Ok(())
}

fn set_enabled(loader: ConfigLoader<StandardFileSystem>, enabled: bool) -> Result<()> {
    let mut store = PriorityStore::load(loader)?;
    let changed = store.set_enabled(enabled)?;
    let state = if enabled { "enabled" } else { "disabled" };

    if changed {
        println!("✓ Automatic switching {}", state);
    } else {
        println!("Automatic switching was already {}", state);
    }
    Ok(())
}

fn edit_priorities(
    loader: ConfigLoader<StandardFileSystem>,
    action: PriorityAction,
) -> Result<()> {
    let mut store = PriorityStore::load(loader)?;

    let (changed, role, name, verb) = match &action {
        PriorityAction::List => {
            print_priorities(&store);
            return Ok(());
        }
        PriorityAction::Add(device) => {
            let (role, name) = device.role_and_name()?;
            (store.append(role, name)?, role, name, "added")
        }
        PriorityAction::Remove(device) => {
            let (role, name) = device.role_and_name()?;
            (store.remove(role, name)?, role, name, "removed")
        }
        PriorityAction::Up(device) => {
            let (role, name) = device.role_and_name()?;
            (store.move_up(role, name)?, role, name, "moved up")
        }
        PriorityAction::Down(device) => {
            let (role, name) = device.role_and_name()?;
            (store.move_down(role, name)?, role, name, "moved down")
        }
    };

    if changed {
        println!("✓ '{}' {}", name, verb);
    } else {
        println!("No change to the {} list", role);
    }
    print_priorities(&store);
    Ok(())
}

fn print_priorities<F: FileSystemInterface>(store: &PriorityStore<F>) {
    for role in [Role::Output, Role::Input] {
        println!("Priority {}s:", role);
        let list = store.priority_list(role);
        if list.is_empty() {
            println!("  (none)");
        }
        for (i, name) in list.iter().enumerate() {
            println!("  {}. {}", i + 1, name);
        }
    }
}

fn switch_device(device_name: &str, is_input: bool) -> Result<()> {
    let role = if is_input { Role::Input } else { Role::Output };
    info!("Manual device switch requested: {} ({})", device_name, role);

    let catalog = audio::system_catalog()?;
    let devices = catalog.list_devices(role)?;
    let device = find_by_name(&devices, device_name).ok_or_else(|| {
        anyhow::anyhow!("{} device '{}' not found", capitalize(role.as_str()), device_name)
    })?;

    match catalog.set_default_device(role, device.id) {
        Ok(()) => {
            println!("✓ Successfully switched {} device to: {}", role, device_name);
            Ok(())
        }
        Err(e) => {
            println!("✗ Failed to switch device: {}", e);
            Err(e)
        }
    }
}

fn run_simulation() -> Result<()> {
    println!(
        "Simulating with priority outputs [{}] and priority inputs [{}]",
        simulate::AIRPODS,
        simulate::BUILT_IN_INPUT
    );

    let report = simulate::run_airpods_scenario(simulate::simulation_preferences())?;
    for line in &report.lines {
        println!("{}", line);
    }
    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
