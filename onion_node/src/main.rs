#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

mod keys;
mod node_config;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, Context, Error};
use futures::channel::mpsc;
use futures::{Future, FutureExt};
use tokio::net::UdpSocket;
use tokio::runtime;
use onion_crypto::*;
use onion_core::onion::Onion;
use onion_core::socket::run_socket;
use onion_core::stats::Stats;
use onion_core::udp::Dispatcher;
#[cfg(unix)]
use syslog::Facility;

use crate::keys::load_or_gen_keys;
use crate::node_config::*;

/// Channel size for packets that onion handlers send to the socket.
const ONION_CHANNEL_SIZE: usize = 64;

/// Bind a UDP listener to the socket address.
async fn bind_socket(addr: SocketAddr) -> Result<UdpSocket, Error> {
    UdpSocket::bind(&addr).await
        .with_context(|| format!("Failed to bind UDP socket to {}", addr))
}

/// Run a future with the runtime specified by config.
fn run<F>(future: F, threads: Threads) -> Result<(), Error>
    where F: Future<Output = Result<(), Error>>
{
    let runtime = if threads == Threads::N(1) {
        runtime::Builder::new_current_thread()
            .enable_all()
            .build()
    } else {
        let mut builder = runtime::Builder::new_multi_thread();
        match threads {
            Threads::N(n) => { builder.worker_threads(n as usize); },
            Threads::Auto => { }, // builder will detect number of cores automatically
        }
        builder
            .enable_all()
            .build()
    }.context("Failed to create runtime")?;

    runtime.block_on(future)
}

/// Periodically write packet counters to log.
async fn log_stats(stats: Stats, interval: Duration) -> Result<(), Error> {
    if interval.is_zero() {
        return futures::future::pending().await
    }

    let mut wakeups = tokio::time::interval(interval);
    loop {
        wakeups.tick().await;
        info!(
            "Onion packets: {} incoming, {} outgoing, {} dropped",
            stats.counters.incoming(),
            stats.counters.outgoing(),
            stats.counters.dropped(),
        );
    }
}

async fn run_udp(config: &NodeConfig, dht_sk: SecretKey) -> Result<(), Error> {
    let socket = bind_socket(config.udp_addr).await?;
    let stats = Stats::new();

    // Create a channel for onion handlers to communicate with network
    let (tx, rx) = mpsc::channel(ONION_CHANNEL_SIZE);

    let mut onion = Onion::new(dht_sk, Box::new(tx), &config.onion_config());
    let mut dispatcher = Dispatcher::new();
    Onion::register_handlers(&mut dispatcher);

    info!("Running onion relay on {}", config.udp_addr);

    let onion_future = run_socket(&mut onion, &dispatcher, socket, rx, stats.clone());

    futures::select! {
        res = onion_future.fuse() => res.map_err(Error::from),
        res = log_stats(stats, config.stats_interval).fuse() => res,
    }
}

fn init_logger(log_type: LogType) -> Result<(), Error> {
    match log_type {
        LogType::Stderr => {
            let env = env_logger::Env::default()
                .filter_or("RUST_LOG", "info");
            env_logger::Builder::from_env(env)
                .init();
        },
        LogType::Stdout => {
            let env = env_logger::Env::default()
                .filter_or("RUST_LOG", "info");
            env_logger::Builder::from_env(env)
                .target(env_logger::fmt::Target::Stdout)
                .init();
        },
        #[cfg(unix)]
        LogType::Syslog => {
            syslog::init(Facility::LOG_USER, log::LevelFilter::Info, None)
                .map_err(|e| anyhow!("Failed to initialize syslog backend: {}", e))?;
        },
        LogType::None => { },
    }
    Ok(())
}

fn main() -> Result<(), Error> {
    let config = match cli_parse()? {
        CliCommand::DerivePk(pk) => {
            println!("{}", hex::encode(pk.as_bytes()).to_uppercase());
            return Ok(())
        },
        CliCommand::Run(config) => config,
    };

    init_logger(config.log_type)?;

    for key in config.unused.keys() {
        warn!("Unused configuration key: {:?}", key);
    }

    let (dht_pk, dht_sk) = if let Some(ref sk) = config.sk {
        (sk.public_key(), sk.clone())
    } else if let Some(ref keys_file) = config.keys_file {
        load_or_gen_keys(keys_file)?
    } else {
        return Err(anyhow!("Neither secret key nor keys file is specified"))
    };

    if config.sk_passed_as_arg {
        warn!("You should not pass the secret key via arguments due to \
               security reasons. Use the environment variable instead");
    }

    info!("DHT public key: {}", hex::encode(dht_pk.as_bytes()).to_uppercase());

    let threads = config.threads;
    run(async move { run_udp(&config, dht_sk).await }, threads)
}
