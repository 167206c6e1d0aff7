// download.rs from rustiiu (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustiiu
//
// Code for running a batch of title downloads in the rustiiu CLI.

use std::time::Duration;
use anyhow::{bail, Context, Result};
use log::{error, info};
use rustiiu::nus::download::{Downloader, DownloaderConfig, HttpTransport};
use rustiiu::nus::keysite::KeyDatabase;
use rustiiu::nus::plan::BatchRequest;
use rustiiu::nus::progress::{bytes_to_human, ConsoleProgress};
use rustiiu::nus::retrieve::{RetrieveOptions, RetrieveOutcome, Retriever, TicketSource};
use rustiiu::title::ticket::PatchOptions;
use crate::Cli;

pub fn run(cli: &Cli) -> Result<()> {
    let request = BatchRequest {
        titles: cli.source.titles.clone(),
        keys: cli.keys.clone(),
        regions: cli.source.regions.clone(),
        online_keys: cli.online_keys,
        online_tickets: cli.online_tickets,
        keysite: cli.keysite.clone(),
    };
    // Catch bad input before anything touches the network.
    request.validate()?;

    let transport = HttpTransport::new(
        Duration::from_secs(cli.connect_timeout),
        Duration::from_secs(cli.timeout),
    ).with_context(|| "The HTTP client could not be created.")?;
    let config = DownloaderConfig { retry_count: cli.retry_count, ..Default::default() };
    let downloader = Downloader::new(transport, config).with_observer(Box::new(ConsoleProgress));

    let db = if request.needs_key_database() {
        let keysite = match &cli.keysite {
            Some(keysite) => keysite,
            None => bail!("A key site must be specified with --keysite."),
        };
        info!("Downloading/updating data from {}", keysite);
        let db = KeyDatabase::download(&downloader, keysite, &cli.key_db)
            .with_context(|| format!("Could not download data from {}, cannot continue.", keysite))?;
        info!("Downloaded data from {}", keysite);
        Some(db)
    } else {
        None
    };
    let jobs = request.plan(db.as_ref())?;
    if jobs.is_empty() {
        bail!("There are no titles to download.");
    }

    let options = RetrieveOptions {
        cdn: cli.cdn.clone(),
        keysite: cli.keysite.clone(),
        online_tickets: cli.online_tickets,
        patches: PatchOptions { demo: cli.patch_demo, dlc: cli.patch_dlc },
        tickets_only: cli.tickets_only,
        simulate: cli.simulate,
    };
    let retriever = Retriever::new(&downloader, &options);
    let mut failed = 0;
    for job in &jobs {
        match retriever.retrieve(job, &cli.out_dir) {
            Ok(RetrieveOutcome::Simulated(_)) => {},
            Ok(RetrieveOutcome::Complete(report)) => {
                let ticket = match report.ticket_source {
                    TicketSource::Cdn => "downloaded from the CDN",
                    TicketSource::Keysite => "downloaded from the key site",
                    TicketSource::Generated => "generated",
                };
                println!("Title {} finished: \"{}\"", job.title_id, report.dir.display());
                println!("  Ticket: {}", ticket);
                if report.contents_downloaded {
                    println!("  Contents: {} ({})", report.num_contents, bytes_to_human(report.total_size));
                } else {
                    println!("  Contents: {} ({}), not downloaded", report.num_contents, bytes_to_human(report.total_size));
                }
            },
            Err(e) => {
                // The rest of the batch still gets downloaded.
                error!("Title {} could not be downloaded: {:#}", job.title_id, anyhow::Error::new(e));
                failed += 1;
            },
        }
    }
    if failed > 0 {
        bail!("{} of {} titles could not be downloaded.", failed, jobs.len());
    }
    info!("Done!");
    Ok(())
}
