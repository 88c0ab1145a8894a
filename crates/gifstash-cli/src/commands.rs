use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use gifstash_gate::{bootstrap, AccountStore, FileTokenSink, PolicyEngine};
use gifstash_server::{GifstashServer, ServiceConfig};
use gifstash_store::{Database, StoreError};
use tracing::debug;

use crate::cli::{Cli, Command, ServeArgs, SetRuleArgs};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args),
        Command::Bootstrap => cmd_bootstrap(&config),
        Command::SetRule(args) => cmd_set_rule(&config, args),
        Command::Rules => cmd_rules(&config),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ServiceConfig> {
    let mut config = match &cli.config {
        Some(path) => ServiceConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServiceConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

/// Open the configuration store without starting the server.
fn open_config_store(config: &ServiceConfig) -> anyhow::Result<(AccountStore, PolicyEngine)> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating {}", config.data_dir.display()))?;
    let path = config.config_store_path();
    let db = Database::create(&path)
        .map_err(StoreError::from)
        .with_context(|| format!("opening {}", path.display()))?;
    debug!(path = %path.display(), "opened configuration store");
    let db = Arc::new(db);
    let accounts = AccountStore::open(db.clone())?;
    let policy = PolicyEngine::open(db)?;
    Ok((accounts, policy))
}

fn cmd_serve(mut config: ServiceConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    println!(
        "gifstash on {} (data: {})",
        config.bind_addr.to_string().bold(),
        config.data_dir.display()
    );
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(GifstashServer::new(config).serve())?;
    Ok(())
}

fn cmd_bootstrap(config: &ServiceConfig) -> anyhow::Result<()> {
    let (accounts, policy) = open_config_store(config)?;
    let token_path = config.admin_token_path();
    let report = bootstrap(&accounts, &policy, &config.rules, &FileTokenSink::new(&token_path))
        .context("bootstrap failed")?;

    if report.seeded_rules > 0 {
        println!("{} Seeded {} rules", "✓".green(), report.seeded_rules);
    }
    match report.created_admin {
        Some(id) => {
            println!("{} Created administrator {}", "✓".green().bold(), id.yellow());
            println!("  Token written to {}", token_path.display().to_string().cyan());
        }
        None => println!("Administrator already provisioned."),
    }
    Ok(())
}

fn cmd_set_rule(config: &ServiceConfig, args: SetRuleArgs) -> anyhow::Result<()> {
    let (_, policy) = open_config_store(config)?;
    policy.set_rule(&args.pattern, &args.scope)?;
    println!("{} {} -> {}", "✓".green(), args.pattern.yellow(), args.scope.cyan());
    Ok(())
}

fn cmd_rules(config: &ServiceConfig) -> anyhow::Result<()> {
    let (_, policy) = open_config_store(config)?;
    let rules = policy.rules()?;
    if rules.is_empty() {
        println!("No rules.");
    }
    for rule in rules {
        println!("{}  {}", rule.pattern.yellow(), rule.scope.cyan());
    }
    Ok(())
}
