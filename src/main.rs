//! migraudit binary: load everything, run the audit, print the report.

use migraudit::audit::{AuditReport, Auditor};
use migraudit::config::{DatabaseConfig, ReportFormat, Settings};
use migraudit::project::SchemaProjector;
use migraudit::rules::RuleRegistry;
use migraudit::schema::TypeMap;
use migraudit::{introspect, loader};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting migration audit...");

    // Load configuration
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    // Scripts and graph come straight from disk; no database needed yet
    let scripts = loader::load_scripts(&settings.migrations.dir)?;
    let graph = loader::build_graph(scripts)?;
    info!("📦 Dependency graph built with {} migrations", graph.node_count());

    // Initialize database pool - REQUIRED (both rule families read the recorder table)
    let pool = match init_database_pool(&settings.database).await {
        Ok(pool) => {
            info!("✅ Database pool created successfully");
            pool
        }
        Err(e) => {
            error!("❌ FATAL: Failed to initialize database pool: {}", e);
            error!("DATABASE_URL must be set in .env and the database must be accessible");
            return Err(e);
        }
    };

    let history =
        loader::load_history(&pool, &graph, &settings.migrations.recorder_table).await?;

    let types = TypeMap::standard();
    let actual = if settings.audit.scope.includes_schema() {
        // The recorder table itself is never part of the modeled schema
        let mut exclude = settings.audit.exclude_tables.clone();
        exclude.push(settings.migrations.recorder_table.clone());
        Some(introspect::introspect_schema(&pool, &types, &exclude).await?)
    } else {
        None
    };

    let auditor = Auditor::new(
        SchemaProjector::new(types),
        RuleRegistry::from_config(&settings.audit),
    );
    let report = auditor.run(settings.audit.scope, &graph, &history, actual.as_ref())?;

    match settings.audit.format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        ReportFormat::Text => print_report(&report),
    }

    if report.summary.errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,migraudit=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Initialize the database pool from loaded settings
async fn init_database_pool(database: &DatabaseConfig) -> anyhow::Result<deadpool_postgres::Pool> {
    // Managed providers such as Neon refuse plaintext connections
    let use_tls = database.host.contains("neon.tech")
        || std::env::var("DATABASE_URL")
            .map(|url| url.contains("sslmode=require"))
            .unwrap_or(false);

    use deadpool_postgres::{Config, ManagerConfig, PoolConfig, RecyclingMethod};

    let mut cfg = Config::new();
    cfg.host = Some(database.host.clone());
    cfg.port = Some(database.port);
    cfg.user = Some(database.user.clone());
    cfg.password = Some(database.password.clone());
    cfg.dbname = Some(database.database.clone());
    cfg.pool = Some(PoolConfig::new(database.max_pool_size));
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    // Create pool with TLS support if needed
    let pool = if use_tls {
        let certs = rustls_native_certs::load_native_certs();
        let mut root_store = rustls::RootCertStore::empty();
        for cert in certs.certs {
            root_store.add(cert).ok();
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

        cfg.create_pool(Some(deadpool_postgres::Runtime::Tokio1), tls)
            .map_err(|e| anyhow::anyhow!("Failed to create TLS pool: {}", e))?
    } else {
        cfg.create_pool(Some(deadpool_postgres::Runtime::Tokio1), tokio_postgres::NoTls)
            .map_err(|e| anyhow::anyhow!("Failed to create pool: {}", e))?
    };

    // Test the connection
    let client = pool
        .get()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to get pool connection: {}", e))?;

    let _row = client
        .query_one("SELECT 1 as ok", &[])
        .await
        .map_err(|e| anyhow::anyhow!("Failed to verify database connection: {}", e))?;

    info!("✅ Database connection successful (TLS: {})", use_tls);
    Ok(pool)
}

/// Human-readable report; the JSON format carries the same fields
fn print_report(report: &AuditReport) {
    println!();
    println!("=== Migration Audit ===");
    println!("Scope: {}", report.scope);
    println!();
    println!("Applied migrations: {}", report.applied);
    println!("Migration files on disk: {}", report.on_disk);
    println!("Missing files: {}", report.missing.len());
    println!("Squashed replacements: {}", report.squash_replacements);
    println!("Pending migrations: {}", report.pending.len());

    if report.scope.includes_schema() {
        println!();
        println!("Expected tables: {}", report.expected_tables);
        println!("Actual tables: {}", report.actual_tables);
        let in_sync = report.expected_fingerprint == report.actual_fingerprint;
        println!("Fingerprints match: {}", if in_sync { "yes" } else { "no" });
    }

    println!();
    println!("=== Summary ===");
    if report.is_clean() {
        println!("✅ No violations found! Migration state is consistent.");
        return;
    }

    println!("❌ Found {} violation(s):", report.summary.total);
    println!("   Errors: {}", report.summary.errors);
    println!("   Warnings: {}", report.summary.warnings);
    println!("   Infos: {}", report.summary.infos);
    println!();
    for violation in &report.violations {
        println!("  {}", violation);
    }
}
