/*
 *  main.rs
 *
 *  SchoolRing - the day at a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Headless face host: config, logging, companion seed and signals
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use anyhow::Context;
use chrono::Local;
use env_logger::Env;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};

use schoolring::config;
use schoolring::host::{assemble, HostedFace};
use schoolring::render::Bounds;
use schoolring::runtime::{FaceHandle, SystemClock};
use schoolring::scheduler::next_tick_delay;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Asynchronously waits for a SIGINT, SIGTERM, or SIGHUP signal.
async fn signal_handler() -> Result<(), std::io::Error> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

/// Stands in for the platform's once-a-minute time tick.
async fn minute_ticker(handle: FaceHandle) {
    let minute = Duration::from_secs(60);
    loop {
        let delay = next_tick_delay(Local::now().timestamp_millis(), minute);
        tokio::time::sleep(delay).await;
        if handle.time_tick().is_err() {
            break;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load().context("loading configuration")?;

    let level = cfg.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();

    info!("{} - the day at a glance", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let HostedFace { runtime, handle, capabilities: caps } =
        assemble(&cfg, Arc::new(SystemClock)).context("assembling face")?;
    let face_task = tokio::spawn(runtime.run());

    handle.bounds_changed(Bounds::new(caps.width, caps.height), caps.round)?;
    handle.properties_changed(caps.low_bit_ambient, false)?;
    handle.activate()?;
    handle.set_visible(true)?;
    let ticker = tokio::spawn(minute_ticker(handle.clone()));

    if let Err(e) = signal_handler().await {
        error!("Signal handler failed: {}", e);
    }

    handle.deactivate()?;
    ticker.abort();
    face_task.await.context("face runtime panicked")?;
    info!("Shutdown complete");
    Ok(())
}
