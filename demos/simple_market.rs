//! Simple prediction market example
//!
//! This example walks a single market through its whole life: resolvers bond,
//! bettors buy shares, the market closes, resolvers vote, and the pool is paid out.

use anyhow::Result;
use std::sync::Arc;
use verdict_core::{
    clock::format_timestamp, units_to_ether, Address, Direction, Engine, EngineConfig,
    Finalization, InMemoryVault, ManualClock, Outcome, ONE_ETHER, RESOLVER_STAKE_AMOUNT,
};

fn main() -> Result<()> {
    println!("Simple Prediction Market Example");
    println!("═══════════════════════════════════\n");

    let start = 1_735_689_600; // January 1, 2025
    let end = start + 86_400;
    let clock = ManualClock::new(start - 3_600);
    let mut engine = Engine::new(
        &EngineConfig::default(),
        InMemoryVault::new(),
        Arc::new(clock.clone()),
    )?;

    let alice = Address::from("alice");
    let bob = Address::from("bob");
    let resolvers: Vec<Address> = (1..=3).map(|i| Address::new(format!("resolver-{i}"))).collect();
    for account in resolvers.iter().chain([&alice, &bob]) {
        engine.vault_mut().fund(account, 10 * ONE_ETHER);
    }

    // 1. Resolvers bond before the market opens
    println!("1. Bonding resolvers...");
    for resolver in &resolvers {
        engine.stake(resolver, RESOLVER_STAKE_AMOUNT)?;
        println!("   {} staked {} ETH", resolver, units_to_ether(RESOLVER_STAKE_AMOUNT));
    }
    println!();

    // 2. Open the market with a 1% creator fee
    println!("2. Creating a new prediction market...");
    let market_id = engine.open_market(
        &"creator".into(),
        "Will it rain tomorrow in San Francisco?",
        start,
        end,
        100,
    )?;
    let info = engine.market_info(market_id)?;
    println!("   Market ID: {}", info.id);
    println!("   Question: {}", info.metadata);
    println!("   Betting: {} to {}", format_timestamp(start), format_timestamp(end));
    println!();

    // 3. Place bets during the window
    println!("3. Placing bets...");
    clock.set(start);
    let price = engine.config().share_price;
    engine.buy_shares(&alice, market_id, Direction::Yes, 3, 3 * price)?;
    engine.buy_shares(&bob, market_id, Direction::No, 2, 2 * price)?;
    let info = engine.market_info(market_id)?;
    println!("   Alice: 3 Yes shares");
    println!("   Bob: 2 No shares");
    println!("   Pool: {} ETH", units_to_ether(info.pool_value));
    println!(
        "   Votes required: {}",
        engine.required_votes(market_id)?
    );
    println!();

    // 4. Close and vote
    println!("4. Closing and voting...");
    clock.set(end);
    engine.close_market(market_id)?;
    for resolver in &resolvers {
        match engine.vote(resolver, market_id, Outcome::Yes)? {
            Finalization::Deferred(reason) => println!("   {resolver} voted Yes, pending: {reason:?}"),
            Finalization::Resolve(outcome) => println!("   {resolver} voted Yes, market resolved {outcome}"),
        }
    }
    println!();

    // 5. Payouts were distributed at resolution
    println!("5. Final balances...");
    let creator = Address::from("creator");
    let platform = engine.config().platform_address.clone();
    for account in [&alice, &bob, &creator, &platform] {
        println!(
            "   {}: {} ETH",
            account,
            units_to_ether(engine.vault().balance_of(account))
        );
    }
    println!();

    println!("Events emitted: {}", engine.events().len());
    Ok(())
}
