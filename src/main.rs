// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Timetable-Sync command line
//!
//! Loads a timetable feed (or the one stored in a profile), applies the
//! profile's overrides and breaks, and prints the resulting schedule.

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use timetable_sync::{
    config::{parse_timezone, Config},
    db::{DocumentStore, FirestoreDocumentStore, IdentityProvider, MemoryDocumentStore},
    services::IdentityToolkitAuth,
    time_utils::format_time,
    ServiceContext,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Parser)]
#[command(name = "timetable-sync", about = "Print a class timetable from an ICS feed")]
struct Cli {
    /// Feed URL, or `__TEST__` for the synthetic feed. Defaults to the profile's feed.
    source: Option<String>,

    /// Load overrides and breaks from this identity's stored profile
    #[arg(long)]
    profile_uid: Option<String>,

    /// Timezone for dates and times-of-day (overrides TIMETABLE_TZ)
    #[arg(long)]
    tz: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging();

    let cli = Cli::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(name) = &cli.tz {
        config.timezone = parse_timezone(name)?;
    }
    tracing::info!(timezone = %config.timezone, "Starting timetable-sync");

    let (identity, documents): (Arc<dyn IdentityProvider>, Arc<dyn DocumentStore>) =
        match &cli.profile_uid {
            Some(uid) => {
                let store =
                    FirestoreDocumentStore::new(&config.gcp_project_id, &config.profile_collection)
                        .await?;
                let auth = IdentityToolkitAuth::with_uid(config.firebase_api_key.clone(), uid);
                (Arc::new(auth), Arc::new(store))
            }
            None => {
                let auth = IdentityToolkitAuth::new(config.firebase_api_key.clone());
                (Arc::new(auth), Arc::new(MemoryDocumentStore::new()))
            }
        };

    let ctx = ServiceContext::from_config(config, identity, documents);

    let profile = ctx.profile.settled().await;
    match cli.source {
        Some(source) => ctx.feed.set_source(Some(source)),
        None => ctx.follow_profile_feed(),
    }

    let (feed, _) = ctx.settled().await;
    if let Some(error) = feed.error {
        anyhow::bail!("Failed to load timetable: {}", error);
    }
    if feed.data.is_none() {
        anyhow::bail!("No timetable feed given and none stored in the profile");
    }

    let schedule = ctx.schedule();
    tracing::info!(
        sessions = schedule.len(),
        has_profile = profile.data.is_some(),
        "Schedule ready"
    );

    for session in &schedule {
        println!(
            "{} {} {:>7} {:>4}m  {} {}",
            session.start,
            WEEKDAYS[usize::from(session.day) % 7],
            format_time(&session.time),
            session.duration,
            session.course,
            session.activity
        );
    }

    Ok(())
}

/// Initialize structured JSON logging on stderr.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("timetable_sync=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
