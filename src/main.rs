//! subflow-sched CLI.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tokio::signal;

use subflow_sched::cli::*;
use subflow_sched::config::{init_logging, Config};
use subflow_sched::error::Result;
use subflow_sched::metrics::{LinkMetrics, LinkSampler, LinkSnapshot};
use subflow_sched::multipath::{Decision, LinkContext, Policy, Scheduler};
use subflow_sched::types::LinkClass;
use subflow_sched::util::{self, InterfaceClassifier};
use subflow_sched::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config if specified
    let config = if let Some(ref path) = cli.config {
        Config::load(path)?
    } else if Config::default_path().exists() {
        Config::load(Config::default_path())?
    } else {
        Config::default()
    };

    init_logging(&cli.logging(&config.logging))?;

    if cli.no_color {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Decide(args) => run_decide(args, &config),
        Commands::Interfaces(args) => {
            run_interfaces(&args);
            Ok(())
        }
        Commands::Sample(args) => run_sample(args, config).await,
        Commands::Config(args) => run_config(args),
        Commands::Policies => {
            run_policies(&config);
            Ok(())
        }
    }
}

/// Run the scheduler over a scenario file
fn run_decide(args: DecideArgs, config: &Config) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let policy = args.policy.unwrap_or(config.scheduler.policy);

    let metrics = Arc::new(LinkMetrics::new());
    if let Some(ref link) = scenario.link {
        metrics.publish_batch(&[
            (LinkClass::Wifi, link.wifi_bps),
            (LinkClass::Cellular, link.cellular_bps),
        ]);
    }

    // Without a class table, classify by the host's own interfaces
    let classifier = if scenario.classes.is_empty() {
        InterfaceClassifier::from_system()
    } else {
        scenario.classifier()
    };

    let mut scheduler = Scheduler::with_policy(policy, &config.scheduler).with_link_context(LinkContext {
        metrics: metrics.clone(),
        classifier: Arc::new(classifier),
        max_age: config.link_metrics.max_age,
    });

    println!(
        "{} {} v{}",
        "Scheduling".bright_white().bold(),
        args.scenario.display(),
        VERSION
    );
    println!("  Policy:      {}", policy.to_string().cyan());
    println!(
        "  HoL guard:   {}",
        if policy.uses_blocking_estimator() { "on".green() } else { "off".dimmed() }
    );
    println!("  Paths:       {}", scenario.paths.len());
    println!("  Send window: {} bytes", scenario.connection.send_window);
    print_snapshot(&metrics.snapshot());
    println!();

    for round in 1..=args.rounds {
        let decision = scheduler.select(&scenario.paths, &scenario.connection);
        let marker = match decision {
            Decision::Scheduled(_) => "✓".green(),
            Decision::Rejected => "✗".red(),
        };
        println!(
            "  {} round {:>3}: {}  (lambda {:.3})",
            marker,
            round,
            decision,
            scheduler.state().lambda.multiplier()
        );
    }

    let stats = scheduler.stats();
    println!();
    println!(
        "{} decisions, {} rejected, {} HoL-prevented",
        stats.decisions, stats.rejected, stats.hol_prevented
    );
    scheduler.release();

    Ok(())
}

/// List interfaces with their guessed link class
fn run_interfaces(args: &InterfacesArgs) {
    let interfaces = if args.all {
        util::get_network_interfaces()
    } else {
        util::get_usable_interfaces()
    };

    println!("{}", "Network Interfaces:".bright_white().bold());
    if interfaces.is_empty() {
        println!("  {} none found", "⚠".yellow());
        return;
    }

    for iface in interfaces {
        let class = iface
            .link_class
            .map_or_else(|| "-".dimmed().to_string(), |c| c.to_string().cyan().to_string());
        let state = if iface.is_up { "up".green() } else { "down".red() };
        println!(
            "  {:<12} {:<40} {:<9} {}",
            iface.name, iface.address, class, state
        );
    }
}

/// Run the link sampler and print snapshots
async fn run_sample(args: SampleArgs, mut config: Config) -> Result<()> {
    if args.wifi.is_some() {
        config.link_metrics.wifi_interface = args.wifi;
    }
    if args.cellular_bps.is_some() {
        config.link_metrics.cellular_interface = None;
        config.link_metrics.cellular_bitrate_bps = args.cellular_bps;
    }
    config.link_metrics.validate()?;

    let metrics = Arc::new(LinkMetrics::new());
    let (sampler, _cellular) = LinkSampler::from_config(&config.link_metrics, metrics.clone());
    let sampler = Arc::new(sampler);
    let interval = sampler.interval();

    println!(
        "{} every {:?} for {}s (Ctrl+C to stop)",
        "Sampling link bitrates".bright_white().bold(),
        interval,
        args.duration
    );

    let handle = sampler.clone().spawn();
    let deadline = tokio::time::sleep(Duration::from_secs(args.duration));
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => print_snapshot(&metrics.snapshot()),
            () = &mut deadline => break,
            _ = signal::ctrl_c() => {
                println!("{} Interrupted", "⚠".yellow());
                break;
            }
        }
    }

    sampler.stop();
    let _ = handle.await;
    Ok(())
}

/// Print or validate configuration
fn run_config(args: ConfigArgs) -> Result<()> {
    if let Some(ref path) = args.validate {
        Config::load(path)?;
        println!("{} {} is valid", "✓".green(), path.display());
        return Ok(());
    }

    let config = if args.example {
        Config::example()
    } else {
        Config::default()
    };
    let output = toml::to_string_pretty(&config)
        .map_err(|e| subflow_sched::Error::Config(format!("Failed to serialize config: {e}")))?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &output)?;
        println!(
            "{} Configuration written to {}",
            "✓".green(),
            path.display()
        );
    } else {
        println!("{output}");
    }

    Ok(())
}

/// List policies
fn run_policies(config: &Config) {
    println!("{}", "Scheduling policies:".bright_white().bold());
    for policy in Policy::ALL {
        let description = match policy {
            Policy::MinRtt => "lowest smoothed RTT",
            Policy::RoundRobin => "cycle through available paths",
            Policy::Redundant => "duplicate on every available path",
            Policy::Blest => "highest delivery rate, HoL-blocking guarded",
            Policy::CrossLayer => "highest link bitrate, HoL-blocking guarded",
        };
        let marker = if policy == config.scheduler.policy { "*".green() } else { " ".normal() };
        println!("  {} {:<11} {}", marker, policy.to_string().cyan(), description);
    }
}

fn print_snapshot(snapshot: &LinkSnapshot) {
    let fmt_rate = |class| {
        snapshot
            .bitrate(class)
            .map_or_else(|| "unknown".dimmed().to_string(), |bps| format!("{:.1} Mbit/s", bps as f64 / 1e6))
    };
    println!(
        "  {} wifi {}  cellular {}",
        "→".cyan(),
        fmt_rate(LinkClass::Wifi),
        fmt_rate(LinkClass::Cellular)
    );
}
