use anyhow::Context;
use clap::Parser;

use lesson_judge::config::{CliArgs, Config};
use lesson_judge::database as db;
use lesson_judge::grading::{Grader, SubmissionGate};
use lesson_judge::sandbox::create_executor;
use lesson_judge::web_server::build_server;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let Config {
        server: server_config,
        runner: runner_config,
        grading: grading_config,
    } = cli.to_config().context("Failed to load configuration")?;

    let db_path = match &cli.database {
        Some(path) => path.clone(),
        None => db::get_db_path()?,
    };
    if cli.flush_data {
        db::remove_db(&db_path);
    }

    let db_pool = db::init_db(&db_path)
        .await
        .context("Failed to initialize database")?;
    if cli.seed_demo {
        db::seed_demo_data(&db_pool)
            .await
            .context("Failed to seed demo data")?;
    }

    // ======= PREPARATION END, EXECUTION START =======

    let executor = create_executor(&runner_config);
    let grader = Grader::new(executor, runner_config);
    let gate = SubmissionGate::new(db_pool.clone(), grader, grading_config.min_test_cases);

    let server =
        build_server(server_config, db_pool.clone(), gate).context("Failed to build server")?;
    let server_handle = server.handle();
    let server_task = actix_web::rt::spawn(server);

    // ===== EXECUTION END, WAITING FOR SHUTDOWN ======

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("Ctrl-c received, shutting down...");
        }
        res_server = server_task => {
            log::error!("Server terminated unexpectedly: {:?}", res_server);
        }
    }

    // In-flight submissions finish grading before the server stops
    server_handle.stop(true).await;
    db_pool.close().await;

    log::info!("Shutdown complete");
    Ok(())
}
