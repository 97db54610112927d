// cli.rs - operator utility for tenant administration
use std::env;
use std::io;
use std::io::Write;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::core;
use crate::db;
use crate::db::TenantId;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid tenant identifier: {0}")]
    InvalidTenantId(String),

    #[error("Listing tenants failed")]
    ListFailed { #[source] source: db::StoreError },

    #[error("Migrating tenant namespace failed")]
    MigrateFailed { #[source] source: sqlx::Error },

    #[error("Offboarding tenant failed")]
    OffboardFailed { #[source] source: db::StoreError },

    #[error("Database connection failed")]
    ConnectionFailed { #[source] source: sqlx::Error },

    #[error("An unexpected CLI error occurred: {0}")]
    Other(String),
}

#[derive(Parser)]
#[command(name = "tenant")]
#[command(about = "Tenant administration utility", long_about = None)]
struct Cli {
    #[command(subcommand)]
    tenant_sub_command: TenantSubCommands,
}

#[derive(Subcommand)]
enum TenantSubCommands {
    /// List all tenants in the catalog
    List,
    /// Re-apply the tenant-scoped schema to a namespace
    Migrate {
        /// Tenant schema name
        schema: String,
    },
    /// Drop a tenant namespace with all its data and disable the tenant
    Offboard {
        /// Tenant schema name
        schema: String,
        /// Skip the interactive confirmation
        #[arg(long)]
        yes: bool,
    },
}

/// Runs the tenant administration CLI when the process was started with the
/// `tenant` argument; otherwise returns immediately so the server can boot.
/// Exits the process after a handled command.
pub async fn run_cli(context: &core::ArcContext) -> Result<(), CliError> {
    let args: Vec<String> = env::args().collect();

    // Only run if this is explicitly called with the right arguments
    if args.len() < 2 || args[1] != "tenant" {
        return Ok(());
    }

    // Rewrite args for clap to parse correctly (remove the "tenant" argument)
    let mut cli_args = vec![args[0].clone()];
    cli_args.extend(args.iter().skip(2).cloned());

    let cli = Cli::parse_from(cli_args);

    match cli.tenant_sub_command {
        TenantSubCommands::List => {
            let tenants = db::list_tenants(&context.db)
                .await
                .map_err(|e| CliError::ListFailed { source: e })?;
            if tenants.is_empty() {
                println!("No tenants found.");
            } else {
                println!("{:<32} {:<32} {:<8} {}", "SCHEMA", "NAME", "ACTIVE", "CREATED");
                for tenant in tenants {
                    println!(
                        "{:<32} {:<32} {:<8} {}",
                        tenant.schema_name,
                        tenant.name,
                        tenant.active,
                        tenant.created_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }
        TenantSubCommands::Migrate { schema } => {
            let tenant = parse_tenant(&schema)?;
            let mut conn = context
                .db
                .acquire()
                .await
                .map_err(|e| CliError::ConnectionFailed { source: e })?;
            db::migrate_namespace(&mut conn, &tenant)
                .await
                .map_err(|e| CliError::MigrateFailed { source: e })?;
            println!("Namespace '{tenant}' migrated successfully.");
        }
        TenantSubCommands::Offboard { schema, yes } => {
            let tenant = parse_tenant(&schema)?;
            if !yes {
                print!("This permanently deletes all data in '{tenant}'. Retype the schema name to confirm: ");
                io::stdout().flush().map_err(|e| CliError::Other(e.to_string()))?;
                let mut confirmation = String::new();
                io::stdin()
                    .read_line(&mut confirmation)
                    .map_err(|e| CliError::Other(e.to_string()))?;
                if confirmation.trim() != tenant.as_str() {
                    return Err(CliError::Other("Confirmation did not match, aborting".to_string()));
                }
            }
            offboard_tenant(context, &tenant).await?;
            println!("Tenant '{tenant}' offboarded.");
        }
    }

    // Exit the process since this is a CLI command
    std::process::exit(0);
}

fn parse_tenant(raw: &str) -> Result<TenantId, CliError> {
    raw.parse().map_err(|_| CliError::InvalidTenantId(raw.to_string()))
}

/// Drops the namespace and soft-disables the catalog row. The catalog row and
/// memberships are kept for audit; only the tenant's data is destroyed.
async fn offboard_tenant(context: &core::ArcContext, tenant: &TenantId) -> Result<(), CliError> {
    let mut conn = context
        .db
        .acquire()
        .await
        .map_err(|e| CliError::ConnectionFailed { source: e })?;
    db::drop_namespace(&mut conn, tenant)
        .await
        .map_err(|e| CliError::OffboardFailed { source: db::StoreError::Database(e) })?;
    db::set_tenant_active(&context.db, tenant.as_str(), false)
        .await
        .map_err(|e| CliError::OffboardFailed { source: e })?;
    Ok(())
}
