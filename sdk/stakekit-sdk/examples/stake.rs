// Example: Staking tokens from a local keypair
//
// This example demonstrates how to:
// 1. Load the client configuration from a TOML file
// 2. Connect over JSON-RPC with a keypair signer
// 3. Read balances, then stake (registering first if needed)
// 4. Watch status updates while the transaction confirms
//
// Usage: cargo run --example stake -- <config.toml> <keypair.json> <amount>

use solana_sdk::signature::read_keypair_file;
use stakekit_sdk::{KeypairSigner, StakeClientConfig, StakingClient, TracingLogSink};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(config_path), Some(keypair_path), Some(amount)) = (args.next(), args.next(), args.next())
    else {
        eprintln!("usage: stake <config.toml> <keypair.json> <amount>");
        return Ok(());
    };

    // 1. Configuration, e.g.
    //    rpc_url = "https://api.devnet.solana.com"
    //    program_id = "..."
    //    token_mint = "..."
    let config = StakeClientConfig::from_path(&config_path)?;

    // 2. Client for the keypair's owner
    let keypair = read_keypair_file(&keypair_path)?;
    let client = StakingClient::connect(config, Arc::new(KeypairSigner::new(keypair)))?
        .with_log_sink(Arc::new(TracingLogSink));

    // 3. Current balances
    let balances = client.refresh_balances().await?;
    println!("Owner: {}", client.owner());
    println!("  Wallet:  {}", balances.token_balance_ui());
    println!("  Staked:  {}", balances.staked_ui());
    println!("  Rewards: {}", balances.pending_rewards_ui());

    // 4. Stake, printing every status change
    let mut updates = client.subscribe();
    let watcher = tokio::spawn(async move {
        while let Ok(update) = updates.recv().await {
            println!("  [{}] {:?}", update.action, update.status);
        }
    });

    let receipt = client.stake(&amount).await?;
    println!("\nStaked {amount} in {}", receipt.signature);
    if let Some(registration) = receipt.registration {
        println!("  Registered in {registration}");
    }
    if let Some(balances) = receipt.balances {
        println!("  Staked now: {}", balances.staked_ui());
    }

    drop(client);
    let _ = watcher.await;
    Ok(())
}
