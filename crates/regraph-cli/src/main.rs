use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use regraph_core::{DatasetId, MigrationJob, OrganizationId};
use regraph_engine::export::{ExporterConfig, SubprocessExporter};
use regraph_engine::migrate::Migrator;
use regraph_engine::reconcile;
use regraph_stores::{MigrationSession, Session, SshTunnelService};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod settings;

use settings::Settings;

#[derive(Parser)]
#[command(name = "regraph")]
#[command(about = "Dataset reconciliation and graph-store migration", long_about = None)]
struct Cli {
    /// Jumpbox host alias used for all tunnels
    #[arg(long, default_value = "non-prod")]
    jumpbox: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete graph data for datasets no longer live in the relational store
    Reconcile(ReconcileArgs),
    /// Migrate datasets from the legacy bulk graph into the partitioned store
    Migrate(MigrateArgs),
}

#[derive(Args)]
struct ReconcileArgs {
    /// Organization to reconcile
    #[arg(
        long,
        conflicts_with = "all_organizations",
        required_unless_present = "all_organizations"
    )]
    organization: Option<i64>,
    /// Reconcile every organization the relational store knows about
    #[arg(long)]
    all_organizations: bool,
    /// Actually delete orphaned graph data instead of only reporting it
    #[arg(long)]
    execute: bool,
}

#[derive(Args)]
struct MigrateArgs {
    #[arg(long)]
    organization: i64,
    /// Explicit dataset ids; omit to migrate every live dataset in the
    /// organization
    #[arg(long = "dataset")]
    datasets: Vec<i64>,
    /// Drop previously imported data for the target dataset first
    #[arg(long)]
    remove_existing: bool,
    /// Remap identifiers on import
    #[arg(long)]
    remap_ids: bool,
    /// Skip generating smoke-test samples during export
    #[arg(long)]
    no_smoke_test: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let tunnels = SshTunnelService::new(cli.jumpbox);

    match cli.command {
        Commands::Reconcile(args) => run_reconcile(&tunnels, &settings, args),
        Commands::Migrate(args) => run_migrate(&tunnels, &settings, args),
    }
}

fn run_reconcile(
    tunnels: &SshTunnelService,
    settings: &Settings,
    args: ReconcileArgs,
) -> Result<()> {
    let dry_run = !args.execute;
    let session = Session::open(tunnels, &settings.session_config())?;

    if args.all_organizations {
        reconcile::reconcile_all_organizations(&session.relational, &session.graph, dry_run)?;
    } else if let Some(organization) = args.organization {
        reconcile::reconcile_organization(
            &session.relational,
            &session.graph,
            OrganizationId(organization),
            dry_run,
        )?;
    }
    Ok(())
}

fn run_migrate(tunnels: &SshTunnelService, settings: &Settings, args: MigrateArgs) -> Result<()> {
    let job = MigrationJob {
        organization: OrganizationId(args.organization),
        datasets: if args.datasets.is_empty() {
            None
        } else {
            Some(args.datasets.into_iter().map(DatasetId).collect())
        },
        remove_existing: args.remove_existing,
        smoke_test: !args.no_smoke_test,
        remap_ids: args.remap_ids,
    };
    // Invalid flag combinations are rejected before any tunnel is opened.
    job.validate()?;

    let session = MigrationSession::open(tunnels, &settings.session_config())?;
    let exporter = SubprocessExporter::new(ExporterConfig {
        program: settings.export_program.clone(),
        args: settings.export_args.clone(),
        export_bucket: settings.export_bucket.clone(),
        relational: session.stores.relational_endpoint(),
        relational_user: settings.relational_user.clone(),
        relational_password: settings.relational_password.clone(),
        source_graph: session.source_graph_endpoint(),
        cache: session.cache_endpoint(),
    });

    let migrator = Migrator::new(
        &session.stores.relational,
        &session.stores.graph,
        &exporter,
        &session.stores.graph,
        settings.export_bucket.clone(),
    );
    let report = migrator.run(&job)?;

    for outcome in &report.outcomes {
        info!(dataset = %outcome.dataset, phase = %outcome.phase, "terminal state");
    }
    if report.cutover {
        info!(organization = %report.organization, "organization is cut over");
    }
    Ok(())
}
