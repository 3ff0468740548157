use anyhow::{anyhow, bail, Context};
use clap::{ArgAction, Args, Parser, Subcommand};
use proxied::platform::current_os;
use proxied::settings::{self, ProxiedSettings};
use proxied::{
    logging, Authentication, DisableProxyRequest, LinuxProxied, LinuxProxyConfig,
    LinuxProxyType, MacProxied, MacProxyConfig, MacProxyType, ProxiedError, ProxyEndpoint,
    SystemProxy, WindowsProxied, WindowsProxyConfig, WindowsProxyType,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

/// Proxied - read and change the system proxy settings
#[derive(Parser, Debug)]
#[command(name = "proxied")]
#[command(about = "Read and change the operating system proxy settings", long_about = None)]
struct Cli {
    /// Raise the log level (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file (defaults to ~/.proxied/settings.jsonc)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current proxy settings as JSON (`null` when disabled)
    Status,
    /// Turn the proxy on
    Enable(EnableArgs),
    /// Turn the proxy off, or only some types
    Disable(DisableArgs),
    /// List the network services (macOS)
    Services,
}

#[derive(Args, Debug, Default)]
struct EnableArgs {
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Proxy type to set; on Linux defaults to http and https
    #[arg(long = "type")]
    types: Vec<String>,

    /// Host excluded from proxying
    #[arg(long)]
    bypass: Vec<String>,

    /// Network service (macOS)
    #[arg(long)]
    service: Vec<String>,

    #[arg(long, requires = "password")]
    username: Option<String>,

    #[arg(long, requires = "username")]
    password: Option<String>,
}

#[derive(Args, Debug, Default)]
struct DisableArgs {
    /// Only disable these types (macOS, Windows)
    #[arg(long = "type")]
    types: Vec<String>,

    /// Only disable on these network services (macOS)
    #[arg(long)]
    service: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let os = current_os();
    debug!("Running on {}", os);

    match os {
        "linux" => run_linux(&cli),
        "macos" => run_macos(&cli),
        "windows" => run_windows(&cli),
        other => Err(ProxiedError::UnsupportedPlatform(other.to_string()).into()),
    }
}

fn load_settings(cli: &Cli) -> anyhow::Result<ProxiedSettings> {
    settings::load(cli.config.as_deref()).context("Failed to load settings")
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_linux(cli: &Cli) -> anyhow::Result<()> {
    let proxied = LinuxProxied::from_env()?;
    match &cli.command {
        Command::Status => print_json(&proxied.status()?),
        Command::Enable(args) => {
            let config = linux_config(load_settings(cli)?.linux, args)?;
            proxied.enable(&config)?;
            Ok(())
        }
        Command::Disable(args) => {
            if !args.types.is_empty() || !args.service.is_empty() {
                bail!("--type and --service are not supported on Linux");
            }
            proxied.disable(None)?;
            Ok(())
        }
        Command::Services => Err(ProxiedError::unsupported_feature(
            "network services only exist on macOS",
        )
        .into()),
    }
}

fn run_macos(cli: &Cli) -> anyhow::Result<()> {
    let proxied = MacProxied::system();
    match &cli.command {
        Command::Status => print_json(&proxied.status()?),
        Command::Services => print_json(&proxied.list_network_services()?),
        Command::Enable(args) => {
            let config = macos_config(load_settings(cli)?.macos, args)?;
            proxied.enable(&config)?;
            Ok(())
        }
        Command::Disable(args) if args.types.is_empty() && args.service.is_empty() => {
            proxied.disable(None)?;
            Ok(())
        }
        Command::Disable(args) => {
            let network_service_names = if args.service.is_empty() {
                proxied
                    .list_network_services()?
                    .into_iter()
                    .map(|service| service.name)
                    .collect()
            } else {
                args.service.clone()
            };
            let types = if args.types.is_empty() {
                MacProxyType::ALL.to_vec()
            } else {
                parse_types(&args.types, MacProxyType::parse)?
            };
            proxied.disable(Some(&DisableProxyRequest {
                network_service_names,
                types,
            }))?;
            Ok(())
        }
    }
}

fn run_windows(cli: &Cli) -> anyhow::Result<()> {
    let proxied = WindowsProxied::system();
    match &cli.command {
        Command::Status => print_json(&proxied.status()?),
        Command::Enable(args) => {
            let config = windows_config(load_settings(cli)?.windows, args)?;
            proxied.enable(&config)?;
            Ok(())
        }
        Command::Disable(args) if args.types.is_empty() => {
            proxied.disable(None)?;
            Ok(())
        }
        Command::Disable(args) => {
            let types = parse_types(&args.types, WindowsProxyType::parse)?;
            proxied.disable(Some(types.as_slice()))?;
            Ok(())
        }
        Command::Services => Err(ProxiedError::unsupported_feature(
            "network services only exist on macOS",
        )
        .into()),
    }
}

fn parse_types<T>(values: &[String], parse: fn(&str) -> Option<T>) -> anyhow::Result<Vec<T>> {
    values
        .iter()
        .map(|value| parse(value).ok_or_else(|| anyhow!("Unknown proxy type: {value}")))
        .collect()
}

fn credentials(args: &EnableArgs) -> Option<Authentication> {
    match (&args.username, &args.password) {
        (Some(username), Some(password)) => Some(Authentication {
            username: username.clone(),
            password: password.clone(),
        }),
        _ => None,
    }
}

/// Settings profile with the command-line flags applied on top
fn linux_config(
    profile: Option<LinuxProxyConfig>,
    args: &EnableArgs,
) -> anyhow::Result<LinuxProxyConfig> {
    let mut config = profile.unwrap_or_default();

    if args.host.is_some() || args.port.is_some() {
        let kinds = if args.types.is_empty() {
            vec![LinuxProxyType::Http, LinuxProxyType::Https]
        } else {
            parse_types(&args.types, LinuxProxyType::parse)?
        };
        for kind in kinds {
            let current = config.endpoint(kind).cloned();
            let endpoint = ProxyEndpoint::new(
                args.host
                    .clone()
                    .or_else(|| current.as_ref().map(|e| e.hostname.clone()))
                    .unwrap_or_default(),
                args.port.or(current.map(|e| e.port)).unwrap_or_default(),
            );
            config.set_endpoint(kind, Some(endpoint));
        }
    }
    if !args.bypass.is_empty() {
        config.no_proxy = Some(args.bypass.clone());
    }
    if let Some(auth) = credentials(args) {
        config.authentication = Some(auth);
    }
    Ok(config)
}

fn macos_config(profile: Option<MacProxyConfig>, args: &EnableArgs) -> anyhow::Result<MacProxyConfig> {
    let mut config = profile.unwrap_or_default();

    if let Some(host) = &args.host {
        config.hostname = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if !args.types.is_empty() {
        config.types = Some(parse_types(&args.types, MacProxyType::parse)?);
    }
    if !args.bypass.is_empty() {
        config.pass_domains = Some(args.bypass.clone());
    }
    if !args.service.is_empty() {
        config.network_service_names = Some(args.service.clone());
    }
    if let Some(auth) = credentials(args) {
        config.authentication = Some(auth);
    }
    Ok(config)
}

fn windows_config(
    profile: Option<WindowsProxyConfig>,
    args: &EnableArgs,
) -> anyhow::Result<WindowsProxyConfig> {
    let mut config = profile.unwrap_or_default();

    if let Some(host) = &args.host {
        config.hostname = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if !args.types.is_empty() {
        config.types = parse_types(&args.types, WindowsProxyType::parse)?;
    }
    if !args.bypass.is_empty() {
        config.r#override = Some(args.bypass.clone());
    }
    Ok(config)
}
