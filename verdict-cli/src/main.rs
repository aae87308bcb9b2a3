//! # Verdict CLI
//!
//! Command-line interface for running resolver-voted prediction markets against a
//! local JSON state file.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, Level};
use verdict_core::{
    clock::format_timestamp, Address, Amount, Clock, Direction, Engine, EngineConfig,
    EngineSnapshot, Finalization, InMemoryVault, ManualClock, MarketId, MarketInfo, Outcome,
    Settlement, SystemClock, Timestamp, RESOLVER_STAKE_AMOUNT,
};

#[derive(Parser)]
#[command(name = "verdict")]
#[command(about = "Binary prediction markets resolved by bonded resolvers")]
#[command(version)]
struct Cli {
    /// State file holding markets, resolvers and balances
    #[arg(long, global = true, default_value = "verdict-state.json")]
    state: PathBuf,
    /// Pin the clock to this Unix timestamp
    #[arg(long, global = true)]
    now: Option<Timestamp>,
    /// Log engine activity
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Side {
    Yes,
    No,
}

impl From<Side> for Direction {
    fn from(side: Side) -> Self {
        match side {
            Side::Yes => Direction::Yes,
            Side::No => Direction::No,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Choice {
    Yes,
    No,
    Invalid,
}

impl From<Choice> for Outcome {
    fn from(choice: Choice) -> Self {
        match choice {
            Choice::Yes => Outcome::Yes,
            Choice::No => Outcome::No,
            Choice::Invalid => Outcome::Invalid,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a fresh state file
    Init {
        /// JSON engine configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Owner address (prompted when omitted)
        #[arg(short, long)]
        owner: Option<String>,
        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },
    /// Open a new market
    Open {
        #[arg(long)]
        from: String,
        /// Market question or description
        #[arg(short, long)]
        metadata: String,
        /// Betting window start (Unix timestamp)
        #[arg(long)]
        start: Timestamp,
        /// Betting window end (Unix timestamp)
        #[arg(long)]
        end: Timestamp,
        /// Creator fee in basis points
        #[arg(long, default_value = "0")]
        fee_bps: u32,
    },
    /// Buy shares on one side of a market
    Buy {
        #[arg(long)]
        from: String,
        market_id: MarketId,
        side: Side,
        shares: u128,
        /// Attached value in native units (defaults to the exact cost)
        #[arg(long)]
        value: Option<Amount>,
    },
    /// Close a market whose betting window has ended
    Close { market_id: MarketId },
    /// Close every expired market
    CloseExpired,
    /// Bond the resolver stake
    Stake {
        #[arg(long)]
        from: String,
        /// Attached value in native units (defaults to the required stake)
        #[arg(long)]
        value: Option<Amount>,
    },
    /// Withdraw the resolver stake
    Unstake {
        #[arg(long)]
        from: String,
    },
    /// Vote on a closed market
    Vote {
        #[arg(long)]
        from: String,
        market_id: MarketId,
        choice: Choice,
    },
    /// Claim winnings from a resolved market
    Claim {
        #[arg(long)]
        from: String,
        market_id: MarketId,
    },
    /// Re-run bulk distribution for a resolved market (owner)
    Distribute {
        #[arg(long)]
        from: String,
        market_id: MarketId,
    },
    /// Set the share price in native units (owner)
    SetSharePrice {
        #[arg(long)]
        from: String,
        price: Amount,
    },
    /// Set the platform fee in basis points (owner)
    SetPlatformFee {
        #[arg(long)]
        from: String,
        fee_bps: u32,
    },
    /// Set the platform fee recipient (owner)
    SetPlatformAddress {
        #[arg(long)]
        from: String,
        address: String,
    },
    /// Hand the owner role to another address (owner)
    TransferOwnership {
        #[arg(long)]
        from: String,
        new_owner: String,
    },
    /// Show one market, or the configuration and every market
    Info { market_id: Option<MarketId> },
    /// Show the vote tally of a market
    Votes { market_id: MarketId },
    /// Show a user's position and what it would pay
    Shares { market_id: MarketId, user: String },
    /// List the bettors of a market
    Bettors { market_id: MarketId },
    /// List every known resolver
    Resolvers,
    /// Print the event log
    Events {
        /// Only events of this market
        #[arg(short, long)]
        market: Option<MarketId>,
    },
    /// Credit an account with ether
    Fund { account: String, ether: f64 },
    /// Make an account refuse incoming transfers
    Reject {
        account: String,
        /// Accept transfers again
        #[arg(long)]
        undo: bool,
    },
}

/// One persisted event, pre-serialized.
#[derive(Serialize, Deserialize)]
struct EventRecord {
    market_id: Option<MarketId>,
    json: String,
}

/// Everything the CLI keeps between invocations.
#[derive(Serialize, Deserialize)]
struct State {
    engine: EngineSnapshot,
    vault: InMemoryVault,
    #[serde(default)]
    events: Vec<EventRecord>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_target(false)
        .init();

    let clock: Arc<dyn Clock> = match cli.now {
        Some(now) => Arc::new(ManualClock::new(now)),
        None => Arc::new(SystemClock),
    };

    if let Commands::Init {
        config,
        owner,
        force,
    } = &cli.command
    {
        return init(&cli.state, config.as_deref(), owner.clone(), *force, clock).await;
    }

    let state = load(&cli.state).await?;
    let mut engine = Engine::restore(state.engine, state.vault, clock);
    let mut log = state.events;

    let mutated = run(&mut engine, &log, cli.command)?;
    if mutated {
        for event in engine.drain_events() {
            log.push(EventRecord {
                market_id: event.market_id(),
                json: serde_json::to_string(&event)?,
            });
        }
        save(&cli.state, &engine, log).await?;
    }
    Ok(())
}

async fn init(
    path: &Path,
    config: Option<&Path>,
    owner: Option<String>,
    force: bool,
    clock: Arc<dyn Clock>,
) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, pass --force to overwrite", path.display());
    }

    let mut config = match config {
        Some(file) => EngineConfig::from_file(file)
            .with_context(|| format!("loading config {}", file.display()))?,
        None => EngineConfig::default(),
    };
    config.owner = match owner {
        Some(owner) => Address::from(owner),
        None => {
            let default = config.owner.to_string();
            inquire::Text::new("Owner address:")
                .with_default(&default)
                .prompt()?
                .into()
        }
    };

    let engine = Engine::new(&config, InMemoryVault::new(), clock)?;
    save(path, &engine, Vec::new()).await?;

    let config = engine.config();
    println!("{}", "Engine initialized".green().bold());
    println!("{}", "═".repeat(50).bright_black());
    println!("{}: {}", "State File".yellow().bold(), path.display());
    println!("{}: {}", "Owner".yellow().bold(), config.owner);
    println!("{}: {}", "Share Price".yellow().bold(), ether(config.share_price));
    println!("{}: {}", "Platform Fee".yellow().bold(), config.platform_fee);
    println!("{}: {}", "Platform Address".yellow().bold(), config.platform_address);
    println!("{}", "═".repeat(50).bright_black());
    Ok(())
}

async fn load(path: &Path) -> Result<State> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}, run `verdict init` first", path.display()))?;
    let state = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    debug!(path = %path.display(), "state loaded");
    Ok(state)
}

async fn save(path: &Path, engine: &Engine, events: Vec<EventRecord>) -> Result<()> {
    let state = State {
        engine: engine.snapshot(),
        vault: engine.vault().clone(),
        events,
    };
    tokio::fs::write(path, serde_json::to_string_pretty(&state)?).await?;
    debug!(path = %path.display(), "state saved");
    Ok(())
}

/// Execute one command. Returns whether state must be written back.
fn run(engine: &mut Engine, log: &[EventRecord], command: Commands) -> Result<bool> {
    match command {
        Commands::Init { .. } => bail!("state is already initialized"),

        Commands::Open {
            from,
            metadata,
            start,
            end,
            fee_bps,
        } => {
            let id = engine.open_market(&from.into(), metadata, start, end, fee_bps)?;
            println!("{}", "Market Created Successfully!".green().bold());
            print_market(&engine.market_info(id)?);
        }

        Commands::Buy {
            from,
            market_id,
            side,
            shares,
            value,
        } => {
            let cost = shares
                .checked_mul(engine.config().share_price)
                .context("cost overflows")?;
            let paid = value.unwrap_or(cost);
            engine.buy_shares(&from.clone().into(), market_id, side.into(), shares, paid)?;
            println!(
                "{}: {} bought {} {:?} shares for {}",
                "Shares Bought".green().bold(),
                from.cyan(),
                shares.to_string().yellow(),
                Direction::from(side),
                ether(paid)
            );
        }

        Commands::Close { market_id } => {
            engine.close_market(market_id)?;
            println!("{}: market {} closed", "Closed".green().bold(), market_id);
        }

        Commands::CloseExpired => {
            let closed = engine.close_expired_markets()?;
            if closed.is_empty() {
                println!("{}", "No expired markets".bright_black());
            }
            for id in closed {
                println!("{}: market {} closed", "Closed".green().bold(), id);
            }
        }

        Commands::Stake { from, value } => {
            let attached = value.unwrap_or(RESOLVER_STAKE_AMOUNT);
            engine.stake(&from.clone().into(), attached)?;
            println!(
                "{}: {} bonded {}",
                "Staked".green().bold(),
                from.cyan(),
                ether(attached)
            );
        }

        Commands::Unstake { from } => {
            let amount = engine.unstake(&from.clone().into())?;
            println!(
                "{}: {} withdrew {}",
                "Unstaked".green().bold(),
                from.cyan(),
                ether(amount)
            );
        }

        Commands::Vote {
            from,
            market_id,
            choice,
        } => {
            let choice = Outcome::from(choice);
            let finalization = engine.vote(&from.clone().into(), market_id, choice)?;
            println!(
                "{}: {} voted {} on market {}",
                "Vote Cast".green().bold(),
                from.cyan(),
                choice.to_string().yellow(),
                market_id
            );
            match finalization {
                Finalization::Resolve(outcome) => println!(
                    "{}: market {} resolved {}",
                    "Resolved".green().bold(),
                    market_id,
                    outcome.to_string().cyan().bold()
                ),
                Finalization::Deferred(reason) => println!(
                    "{}: {:?}",
                    "Still Open".bright_blue(),
                    reason
                ),
            }
        }

        Commands::Claim { from, market_id } => {
            let amount = engine.claim(&from.clone().into(), market_id)?;
            println!(
                "{}: {} received {}",
                "Claimed".green().bold(),
                from.cyan(),
                ether(amount)
            );
        }

        Commands::Distribute { from, market_id } => {
            let report = engine.force_distribute(&from.into(), market_id)?;
            println!("{}", "Distribution Complete".green().bold());
            println!("{}: {}", "Positions Settled".yellow().bold(), report.settled);
            println!("{}: {}", "Paid".yellow().bold(), ether(report.paid));
            println!("{}: {}", "Fees".yellow().bold(), ether(report.fees));
            println!("{}: {}", "Forfeited".red().bold(), ether(report.forfeited));
        }

        Commands::SetSharePrice { from, price } => {
            engine.set_share_price(&from.into(), price)?;
            println!("{}: {}", "Share Price".green().bold(), ether(price));
        }

        Commands::SetPlatformFee { from, fee_bps } => {
            engine.set_platform_fee_percent(&from.into(), fee_bps)?;
            println!("{}: {}", "Platform Fee".green().bold(), engine.config().platform_fee);
        }

        Commands::SetPlatformAddress { from, address } => {
            engine.set_platform_address(&from.into(), &address.clone().into())?;
            println!("{}: {}", "Platform Address".green().bold(), address.cyan());
        }

        Commands::TransferOwnership { from, new_owner } => {
            engine.transfer_ownership(&from.into(), &new_owner.clone().into())?;
            println!("{}: {}", "New Owner".green().bold(), new_owner.cyan());
        }

        Commands::Info { market_id: Some(id) } => {
            print_market(&engine.market_info(id)?);
            return Ok(false);
        }

        Commands::Info { market_id: None } => {
            let config = engine.config();
            println!("{}", "Engine".green().bold());
            println!("{}: {}", "Owner".yellow().bold(), config.owner);
            println!("{}: {}", "Share Price".yellow().bold(), ether(config.share_price));
            println!("{}: {}", "Platform Fee".yellow().bold(), config.platform_fee);
            println!("{}: {}", "Platform Address".yellow().bold(), config.platform_address);
            println!("{}: {}", "Now".yellow().bold(), format_timestamp(engine.now()));
            println!(
                "{}: {} ({} active)",
                "Markets".yellow().bold(),
                engine.market_count(),
                engine.active_market_count()
            );
            for id in 0..engine.market_count() as MarketId {
                print_market(&engine.market_info(id)?);
            }
            return Ok(false);
        }

        Commands::Votes { market_id } => {
            let votes = engine.market_votes(market_id)?;
            println!("{}", format!("Votes on market {market_id}").green().bold());
            println!("{}: {}", "Yes".yellow().bold(), votes.yes);
            println!("{}: {}", "No".yellow().bold(), votes.no);
            println!("{}: {}", "Invalid".yellow().bold(), votes.invalid);
            println!(
                "{}: {}",
                "Required".cyan().bold(),
                engine.required_votes(market_id)?
            );
            println!(
                "{}: {}",
                "Eligible Resolvers".cyan().bold(),
                engine.eligible_resolver_count(market_id)?
            );
            println!(
                "{}: {}",
                "Voter Stake".cyan().bold(),
                ether(engine.voter_stake_value(market_id)?)
            );
            return Ok(false);
        }

        Commands::Shares { market_id, user } => {
            let user = Address::from(user);
            let position = engine.user_shares(market_id, &user)?;
            println!("{}", format!("{user} in market {market_id}").green().bold());
            println!("{}: {}", "Yes Shares".yellow().bold(), position.yes_shares);
            println!("{}: {}", "No Shares".yellow().bold(), position.no_shares);
            if let Ok(settlement) = engine.preview_payout(market_id, &user) {
                let label = match settlement {
                    Settlement::Refund(_) => "Refund",
                    Settlement::Win(_) => "Winnings",
                    Settlement::Nothing => "Payout",
                };
                println!(
                    "{}: {}",
                    label.cyan().bold(),
                    ether(settlement.bettor_amount())
                );
            }
            return Ok(false);
        }

        Commands::Bettors { market_id } => {
            for bettor in engine.bettors_of(market_id)? {
                let position = engine.user_shares(market_id, &bettor)?;
                println!(
                    "{} yes={} no={}",
                    bettor.to_string().cyan(),
                    position.yes_shares,
                    position.no_shares
                );
            }
            return Ok(false);
        }

        Commands::Resolvers => {
            for resolver in engine.resolvers() {
                let status = if resolver.is_active {
                    "active".green()
                } else {
                    "inactive".bright_black()
                };
                println!(
                    "{} {} staked {} since {}",
                    resolver.address.to_string().cyan(),
                    status,
                    ether(resolver.staked_amount),
                    format_timestamp(resolver.staking_time)
                );
            }
            return Ok(false);
        }

        Commands::Events { market } => {
            for record in log
                .iter()
                .filter(|r| market.is_none() || r.market_id == market)
            {
                println!("{}", record.json);
            }
            return Ok(false);
        }

        Commands::Fund { account, ether: amount } => {
            let units = verdict_core::ether_to_units(amount);
            engine.vault_mut().fund(&account.clone().into(), units);
            println!(
                "{}: {} now holds {}",
                "Funded".green().bold(),
                account.cyan(),
                ether(engine.vault().balance_of(&account.into()))
            );
        }

        Commands::Reject { account, undo } => {
            let address = Address::from(account);
            if undo {
                engine.vault_mut().accept(&address);
                println!("{}: {} accepts transfers", "Vault".green().bold(), address);
            } else {
                engine.vault_mut().reject(&address);
                println!("{}: {} rejects transfers", "Vault".red().bold(), address);
            }
        }
    }

    Ok(true)
}

fn ether(units: Amount) -> String {
    format!("{} ETH", verdict_core::units_to_ether(units))
}

fn print_market(info: &MarketInfo) {
    println!();
    println!("{}", "═".repeat(50).bright_black());
    println!("{}: {}", "Market ID".yellow().bold(), info.id);
    println!("{}: {}", "Question".yellow().bold(), info.metadata);
    println!("{}: {}", "Creator".yellow().bold(), info.creator);
    println!("{}: {}", "Opens".yellow().bold(), format_timestamp(info.start_time));
    println!("{}: {}", "Closes".yellow().bold(), format_timestamp(info.end_time));
    println!("{}: {} bps", "Creator Fee".yellow().bold(), info.creator_fee_bps);
    println!("{}: {}", "Status".yellow().bold(), info.status);
    if info.final_result != Outcome::None {
        println!("{}: {}", "Result".cyan().bold(), info.final_result);
    }
    println!(
        "{}: {} yes / {} no",
        "Shares".yellow().bold(),
        info.total_yes_shares,
        info.total_no_shares
    );
    println!("{}: {}", "Pool".yellow().bold(), ether(info.pool_value));
    println!("{}: {}", "Bettors".yellow().bold(), info.bettor_count);
    println!("{}", "═".repeat(50).bright_black());
}
