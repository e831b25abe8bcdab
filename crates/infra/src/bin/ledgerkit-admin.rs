use std::sync::Arc;

use anyhow::{Context, bail};
use ledgerkit_core::{RequestContext, TenantId, UserId};
use ledgerkit_infra::{AccountDirectory, LedgerConfig, LedgerEngine, PostgresLedgerStore};

const USAGE: &str = "usage:
  ledgerkit-admin migrate
  ledgerkit-admin bootstrap <tenant-uuid> <user-uuid>
  ledgerkit-admin stats <tenant-uuid>";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    ledgerkit_observability::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!("missing command\n{USAGE}");
    };

    let config = LedgerConfig::from_env()?;
    if config.database_url.is_none() {
        bail!("DATABASE_URL must be set for ledgerkit-admin");
    }
    let store = Arc::new(
        PostgresLedgerStore::connect(&config)
            .await
            .context("failed to connect to the ledger database")?,
    );

    match (command.as_str(), &args[1..]) {
        ("migrate", []) => {
            store.migrate().await?;
            tracing::info!("schema applied");
        }
        ("bootstrap", [tenant, user]) => {
            let ctx = RequestContext::new(parse_tenant(tenant)?, user.parse::<UserId>()?);
            let accounts = AccountDirectory::new(store).bootstrap_default_chart(&ctx).await?;
            println!("{}", serde_json::to_string_pretty(&accounts)?);
        }
        ("stats", [tenant]) => {
            // Stats are read-only; the acting user is never recorded.
            let ctx = RequestContext::new(parse_tenant(tenant)?, UserId::default());
            let engine = LedgerEngine::new(store).with_numbering(config.numbering);
            let stats = engine.get_journal_entry_stats(&ctx).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        _ => bail!("unrecognized arguments: {}\n{USAGE}", args.join(" ")),
    }

    Ok(())
}

fn parse_tenant(raw: &str) -> anyhow::Result<TenantId> {
    raw.parse::<TenantId>().with_context(|| format!("invalid tenant id {raw:?}"))
}
