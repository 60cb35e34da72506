//! hostforge create - Provision a new machine

use std::time::Duration;

use anyhow::{Result, bail};
use clap::Args;
use console::style;
use hostforge_core::host::{CertPaths, EngineOptions, SwarmOptions};
use hostforge_core::{Config, DriverFlags, FlagValue, HostRequest, Provisioner};
use tokio_util::sync::CancellationToken;

use crate::output::{CreateSpinner, show_provision_error};

/// Arguments for the create command
#[derive(Args)]
pub struct CreateArgs {
    /// Name of the new machine (letters, digits, '-' and '.')
    pub name: String,

    /// Driver to provision with
    #[arg(short, long, default_value = "none")]
    pub driver: String,

    /// Driver option as KEY=VALUE; repeat a key to pass a list
    #[arg(short = 'o', long = "driver-opt", value_name = "KEY=VALUE")]
    pub driver_opt: Vec<String>,

    /// Engine URL to adopt (shorthand for `-o url=...` with the none driver)
    #[arg(long)]
    pub url: Option<String>,

    /// Storage root for the machine
    #[arg(long)]
    pub store_path: Option<String>,

    /// CA certificate
    #[arg(long)]
    pub tls_ca_cert: Option<String>,

    /// CA private key
    #[arg(long)]
    pub tls_ca_key: Option<String>,

    /// Client certificate
    #[arg(long)]
    pub tls_client_cert: Option<String>,

    /// Client private key
    #[arg(long)]
    pub tls_client_key: Option<String>,

    /// Server certificate (default: in the machine directory)
    #[arg(long)]
    pub tls_server_cert: Option<String>,

    /// Server private key (default: in the machine directory)
    #[arg(long)]
    pub tls_server_key: Option<String>,

    /// Extra subject alternative name for the server certificate
    #[arg(long = "tls-san")]
    pub tls_san: Vec<String>,

    /// Arbitrary flag passed to the engine
    #[arg(long = "engine-opt")]
    pub engine_opt: Vec<String>,

    /// Environment variable set on the engine
    #[arg(long = "engine-env")]
    pub engine_env: Vec<String>,

    /// Insecure registry allowed by the engine
    #[arg(long = "engine-insecure-registry")]
    pub engine_insecure_registry: Vec<String>,

    /// Label attached to the engine
    #[arg(long = "engine-label")]
    pub engine_label: Vec<String>,

    /// Registry mirror used by the engine
    #[arg(long = "engine-registry-mirror")]
    pub engine_registry_mirror: Vec<String>,

    /// Engine storage driver
    #[arg(long)]
    pub engine_storage_driver: Option<String>,

    /// Engine install script URL
    #[arg(long)]
    pub engine_install_url: Option<String>,

    /// Disable TLS verification on the engine
    #[arg(long)]
    pub engine_no_tls_verify: bool,

    /// Join a swarm
    #[arg(long)]
    pub swarm: bool,

    /// Make this machine the swarm master
    #[arg(long)]
    pub swarm_master: bool,

    /// Swarm discovery URL, e.g. token://<id>
    #[arg(long)]
    pub swarm_discovery: Option<String>,

    /// Swarm image
    #[arg(long)]
    pub swarm_image: Option<String>,

    /// Swarm scheduling strategy
    #[arg(long)]
    pub swarm_strategy: Option<String>,

    /// Arbitrary flag passed to swarm
    #[arg(long = "swarm-opt")]
    pub swarm_opt: Vec<String>,

    /// Give up after this long, e.g. "10m" (default: from config)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,
}

impl CreateArgs {
    /// Build the creation request from the command line
    pub fn to_request(&self) -> Result<HostRequest> {
        let mut driver_options = parse_driver_opts(&self.driver_opt)?;
        if let Some(url) = &self.url {
            driver_options.insert("url", url.as_str());
        }

        let defaults = EngineOptions::default();
        let engine = EngineOptions {
            arbitrary_flags: self.engine_opt.clone(),
            env: self.engine_env.clone(),
            insecure_registry: self.engine_insecure_registry.clone(),
            labels: self.engine_label.clone(),
            registry_mirror: self.engine_registry_mirror.clone(),
            storage_driver: self.engine_storage_driver.clone().unwrap_or_default(),
            install_url: self
                .engine_install_url
                .clone()
                .unwrap_or(defaults.install_url),
            tls_verify: !self.engine_no_tls_verify,
        };

        let swarm = SwarmOptions {
            is_swarm: self.swarm || self.swarm_master,
            master: self.swarm_master,
            agent: self.swarm,
            discovery: self.swarm_discovery.clone().unwrap_or_default(),
            image: self.swarm_image.clone().unwrap_or_default(),
            strategy: self.swarm_strategy.clone().unwrap_or_default(),
            arbitrary_flags: self.swarm_opt.clone(),
            ..Default::default()
        };

        Ok(HostRequest {
            name: self.name.clone(),
            driver_name: self.driver.clone(),
            store_path: self.store_path.clone(),
            cert_paths: CertPaths {
                ca: self.tls_ca_cert.clone(),
                ca_key: self.tls_ca_key.clone(),
                client: self.tls_client_cert.clone(),
                client_key: self.tls_client_key.clone(),
                server: self.tls_server_cert.clone(),
                server_key: self.tls_server_key.clone(),
            },
            server_cert_sans: self.tls_san.clone(),
            engine,
            swarm,
            driver_options,
        })
    }
}

/// Parse repeated `KEY=VALUE` driver options
///
/// `true`/`false` become booleans and integers become ints. A key given more
/// than once collects its values into a list.
fn parse_driver_opts(opts: &[String]) -> Result<DriverFlags> {
    let mut flags = DriverFlags::new();

    for opt in opts {
        let Some((key, raw)) = opt.split_once('=') else {
            bail!("Invalid driver option '{}': expected KEY=VALUE", opt);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Invalid driver option '{}': empty key", opt);
        }

        let value = match flags.get(key) {
            Some(FlagValue::StringSlice(existing)) => {
                let mut list = existing.clone();
                list.push(raw.to_string());
                FlagValue::StringSlice(list)
            }
            Some(FlagValue::String(existing)) => {
                FlagValue::StringSlice(vec![existing.clone(), raw.to_string()])
            }
            Some(_) => bail!("Driver option '{}' given more than once", key),
            None => parse_flag_value(raw),
        };
        flags.insert(key, value);
    }

    Ok(flags)
}

fn parse_flag_value(raw: &str) -> FlagValue {
    match raw {
        "true" => FlagValue::Bool(true),
        "false" => FlagValue::Bool(false),
        _ => raw
            .parse::<i64>()
            .map(FlagValue::Int)
            .unwrap_or_else(|_| FlagValue::String(raw.to_string())),
    }
}

/// Create a machine
///
/// Ctrl-C cancels the request at whatever step it has reached. A failed
/// request prints its error screen and exits with status 1.
pub async fn cmd_create(args: &CreateArgs, config: &Config, quiet: bool) -> Result<()> {
    let request = args.to_request()?;

    let mut provisioner = Provisioner::from_config(config)?;
    if let Some(timeout) = args.timeout {
        provisioner = provisioner.with_create_timeout(timeout);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let spinner = CreateSpinner::start(&request.name, &request.driver_name, quiet);

    match provisioner.create_host(&request, &cancel).await {
        Ok(host) => {
            spinner.created(&host.name);
            if !quiet {
                println!();
                println!(
                    "  {} {}",
                    style("Machine directory:").dim(),
                    provisioner.machine_dir(&host.name).display()
                );
                println!(
                    "  {} {}",
                    style("Client certificate:").dim(),
                    host.host_options.auth.client_cert_path.display()
                );
            }
            Ok(())
        }
        Err(e) => {
            spinner.failed(&request.name, e.kind());
            show_provision_error(&e, &provisioner.registry().names());
            std::process::exit(1);
        }
    }
}
