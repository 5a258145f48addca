mod args;

use std::cell::RefCell;
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::task::LocalSet;
use tokio::{select, signal};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};

use crate::args::Args;
use mx_queued_rs::auth::CredentialStore;
use mx_queued_rs::connection;
use mx_queued_rs::engine::Engine;
use mx_queued_rs::snapshot::{loader, SnapshotConfig, SnapshotEngine};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    if args.daemon {
        warn!("unsupported configuration: daemonization not yet implemented");
    }

    let local = LocalSet::new();
    match local.run_until(run(args)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "fatal startup error");
            ExitCode::from(111)
        },
    }
}

fn init_logging(args: &Args) {
    let level = if args.debug {
        Level::TRACE
    } else {
        match args.log_level.as_str() {
            "error" => Level::ERROR,
            "debug" => Level::DEBUG,
            _ => Level::INFO, // "notice" has no tracing equivalent
        }
    };

    let builder = tracing_subscriber::fmt().with_max_level(level);

    let result = if let Some(path) = &args.log_path {
        match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.json().with_writer(move || file.try_clone().expect("clone log file")).try_init()
            },
            Err(error) => {
                eprintln!("failed to open log path {}: {error}", path.display());
                builder.json().try_init()
            },
        }
    } else if args.debug {
        builder.try_init()
    } else {
        builder.json().try_init()
    };

    if let Err(error) = result {
        eprintln!("failed to install logging subscriber: {error}");
    }
}

async fn run(args: Args) -> Result<()> {
    let engine = Rc::new(RefCell::new(Engine::new(args.recycle_timeout)));

    if args.bgsave_enabled() {
        loader::load(&args.bgsave_path, &mut engine.borrow_mut())
            .context("loading snapshot at startup")?;
    }

    let creds = Rc::new(match &args.auth_file {
        Some(path) => Some(CredentialStore::load(path).context("loading credential file")?),
        None => None,
    });

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::task::spawn_local(async move {
            if let Err(error) = signal::ctrl_c().await {
                warn!(%error, "something strange with ctrl-c handling!");
            }
            cancel.cancel();
        });
    }

    {
        let engine = engine.clone();
        let cancel = cancel.clone();
        let mut snapshot = SnapshotEngine::new(SnapshotConfig {
            enabled: args.bgsave_enabled(),
            path: args.bgsave_path.clone(),
            interval_secs: args.bgsave_interval,
            changes_threshold: args.bgsave_changes,
        });
        tokio::task::spawn_local(async move {
            let mut tick = tokio::time::interval(Duration::from_millis(100));
            loop {
                select! {
                    _ = tick.tick() => {
                        engine.borrow_mut().tick();
                        snapshot.tick(&mut engine.borrow_mut());
                    },
                    _ = cancel.cancelled() => return,
                }
            }
        });
    }

    let listener = TcpListener::bind((args.listen, args.port))
        .await
        .context("failed to listen for connections")?;
    info!(addr = %listener.local_addr()?, "listening");

    loop {
        let accepted = select! {
            accept = listener.accept() => accept,
            _ = cancel.cancelled() => return Ok(()),
        };

        match accepted {
            Ok((conn, peer)) => {
                debug!(%peer, "accepted connection");
                let _ = conn.set_nodelay(true);
                let engine = engine.clone();
                let creds = creds.clone();
                tokio::task::spawn_local(async move {
                    if let Err(error) = connection::drive(conn, engine, creds).await {
                        warn!(%error, %peer, "connection ended with error");
                    }
                });
            },
            Err(error) => {
                warn!(%error, "failed to accept connection");
                continue;
            },
        }
    }
}
