use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use log::{debug, error, info};
use sci_bat_ui::{ClientSession, config::AppConfig, poller::LogSink};
use std::io::Write;

fn main() {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => {
            eprintln!("{}", record.args());
            Ok(())
        }
        _ => {
            writeln!(f, "{}", record.args())
        }
    });

    builder.target(Target::Stdout).init();

    info!("module version: {}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run() {
        error!("application error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create runtime")?;

    runtime.block_on(async {
        let ClientSession {
            mut dashboard,
            mut status,
            ..
        } = ClientSession::connect(&config)?;

        let mut dashboard_sink = LogSink::new("dashboard");
        let mut status_sink = LogSink::new("status");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("ctrl-c");
            },
            _ = dashboard.run(&mut dashboard_sink) => {
                debug!("dashboard poller stopped");
            },
            _ = status.run(&mut status_sink) => {
                debug!("status poller stopped");
            }
        }

        debug!("good bye");
        Ok::<(), anyhow::Error>(())
    })
}
