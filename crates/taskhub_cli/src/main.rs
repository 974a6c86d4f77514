//! Bootstrap entry point.
//!
//! # Responsibility
//! - Read configuration from the environment and start file logging.
//! - Open and migrate the database, then seed the permission catalog.
//! - Print a deterministic status summary for local sanity checks.

use log::{error, info};
use std::error::Error;
use std::process::ExitCode;
use taskhub_core::db::migrations::current_user_version;
use taskhub_core::{
    core_version, init_logging_from_config, open_db, AuthorizationEngine, CoreConfig,
    PermissionService, ProjectListQuery, ProjectService,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_exit module=cli status=error error={err}");
            eprintln!("taskhub: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = CoreConfig::from_env();
    let file_logging = init_logging_from_config(&config)?;
    let policy = config.load_policy()?;
    let engine = AuthorizationEngine::new(policy.clone());

    let mut conn = open_db(&config.db_path)?;
    let seeded = PermissionService::try_new(&mut conn)?.seed_defaults(&policy)?;
    let permissions = PermissionService::try_new(&mut conn)?.list()?.len();
    let projects = ProjectService::try_new(&mut conn, engine)?
        .list_projects(&ProjectListQuery::default())?
        .len();
    info!(
        "event=cli_status module=cli status=ok seeded={seeded} permissions={permissions} projects={projects}"
    );

    println!("taskhub_core version={}", core_version());
    println!("db_path={}", config.db_path.display());
    println!("schema_version={}", current_user_version(&conn)?);
    println!("file_logging={file_logging}");
    println!("permissions={permissions} seeded={seeded}");
    println!("projects={projects}");
    Ok(())
}
