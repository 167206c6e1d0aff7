// nus/retrieve.rs from rustiiu (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustiiu
//
// Implements downloading a complete title from the CDN: the TMD, a Ticket (downloaded or
// generated), the certificate chain, and every content listed in the TMD.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use log::info;
use thiserror::Error;
use crate::nus::download::{DownloadError, DownloadTask, Downloader, Transport};
use crate::nus::keysite;
use crate::nus::layout::{self, CdnUrls};
use crate::nus::plan::TitleJob;
use crate::nus::progress::bytes_to_human;
use crate::title::{cert, ticket, TitleCategory};
use crate::title::ticket::{PatchOptions, TicketError};
use crate::title::tmd::{TMD, TMDError};

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("no Title Key is available to generate a Ticket with")]
    NoTitleKey,
    #[error("online tickets were requested, but no key site was specified")]
    NoKeysite,
    #[error("could not create the output directory `{}`", .0.display())]
    CreateDir(PathBuf, #[source] io::Error),
    #[error("could not download the TMD (maybe connections to the CDN are being blocked?)")]
    DownloadTMD(#[source] DownloadError),
    #[error("could not read the downloaded TMD `{}`", .0.display())]
    ReadTMD(PathBuf, #[source] io::Error),
    #[error("the downloaded TMD is invalid")]
    ParseTMD(#[from] TMDError),
    #[error("could not download the Ticket from the CDN")]
    DownloadCdnTicket(#[source] DownloadError),
    #[error("could not download the Ticket from the key site")]
    DownloadKeysiteTicket(#[source] DownloadError),
    #[error("the Ticket could not be generated")]
    Ticket(#[from] TicketError),
    #[error("could not write `{}`", .0.display())]
    Write(PathBuf, #[source] io::Error),
    #[error("could not download content {content_id} ({index} of {count})")]
    Content {
        content_id: String,
        index: usize,
        count: usize,
        #[source]
        source: DownloadError,
    },
    #[error("could not download the h3 file for content {content_id}")]
    H3 {
        content_id: String,
        #[source]
        source: DownloadError,
    },
}

/// Where a title's Ticket comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketSource {
    /// Updates have a common Ticket on the CDN, which is always used.
    Cdn,
    /// A premade Ticket from the key site.
    Keysite,
    /// Generated from the template with the Title Key.
    Generated,
}

impl TicketSource {
    pub fn select(category: TitleCategory, online_tickets: bool) -> Self {
        match category {
            TitleCategory::Update => TicketSource::Cdn,
            _ if online_tickets => TicketSource::Keysite,
            _ => TicketSource::Generated,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    /// The base URL of the CDN download endpoint.
    pub cdn: String,
    pub keysite: Option<String>,
    pub online_tickets: bool,
    pub patches: PatchOptions,
    /// Stop after the TMD, Ticket and certificate chain.
    pub tickets_only: bool,
    /// Only report the directory that would be used, without touching the network or disk.
    pub simulate: bool,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        RetrieveOptions {
            cdn: layout::DEFAULT_CDN.to_string(),
            keysite: None,
            online_tickets: false,
            patches: PatchOptions::default(),
            tickets_only: false,
            simulate: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleReport {
    pub dir: PathBuf,
    pub ticket_source: TicketSource,
    pub num_contents: usize,
    pub total_size: u64,
    /// False when only the Ticket, TMD and certificate chain were saved.
    pub contents_downloaded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrieveOutcome {
    /// Simulation only; holds the directory that would have been used.
    Simulated(PathBuf),
    Complete(TitleReport),
}

pub struct Retriever<'a, T: Transport> {
    downloader: &'a Downloader<T>,
    options: &'a RetrieveOptions,
}

impl<'a, T: Transport> Retriever<'a, T> {
    pub fn new(downloader: &'a Downloader<T>, options: &'a RetrieveOptions) -> Self {
        Retriever { downloader, options }
    }

    /// Downloads the title described by `job` into its own directory under `output_dir`. Files
    /// that were already downloaded are left in place if this fails partway through.
    pub fn retrieve(&self, job: &TitleJob, output_dir: &Path) -> Result<RetrieveOutcome, RetrieveError> {
        let title_id = job.title_id;
        let dir = layout::title_dir(output_dir, title_id, job.name.as_deref(), job.region.as_deref());
        if self.options.simulate {
            info!("Simulate: Would start work in: \"{}\"", dir.display());
            return Ok(RetrieveOutcome::Simulated(dir));
        }
        // Make sure the Ticket can be obtained before anything gets downloaded.
        let ticket_source = TicketSource::select(title_id.category(), self.options.online_tickets);
        match ticket_source {
            TicketSource::Generated if job.title_key.is_none() => return Err(RetrieveError::NoTitleKey),
            TicketSource::Keysite if self.options.keysite.is_none() => return Err(RetrieveError::NoKeysite),
            _ => {},
        }
        info!("Starting work in: \"{}\"", dir.display());
        fs::create_dir_all(&dir).map_err(|e| RetrieveError::CreateDir(dir.clone(), e))?;
        let urls = CdnUrls::new(&self.options.cdn, title_id);

        info!("Downloading TMD...");
        let tmd_path = dir.join(layout::TMD_FILE);
        self.downloader.fetch(&DownloadTask::new(urls.tmd(), &tmd_path)).map_err(RetrieveError::DownloadTMD)?;
        let tmd_data = fs::read(&tmd_path).map_err(|e| RetrieveError::ReadTMD(tmd_path.clone(), e))?;
        let tmd = TMD::from_bytes(&tmd_data)?;

        let ticket_path = dir.join(layout::TICKET_FILE);
        match ticket_source {
            TicketSource::Cdn => {
                info!("This is an update, so the legit Ticket is downloaded straight from the CDN.");
                self.downloader.fetch(&DownloadTask::new(urls.ticket(), &ticket_path))
                    .map_err(RetrieveError::DownloadCdnTicket)?;
            },
            TicketSource::Keysite => {
                let keysite = self.options.keysite.as_deref().ok_or(RetrieveError::NoKeysite)?;
                info!("Downloading Ticket from {}...", keysite);
                self.downloader.fetch(&DownloadTask::new(keysite::ticket_url(keysite, title_id), &ticket_path))
                    .map_err(RetrieveError::DownloadKeysiteTicket)?;
            },
            TicketSource::Generated => {
                let title_key = job.title_key.ok_or(RetrieveError::NoTitleKey)?;
                info!("Generating Ticket...");
                let ticket = ticket::synthesize(title_id, title_key, tmd.title_version(), self.options.patches)?;
                fs::write(&ticket_path, ticket.to_bytes()).map_err(|e| RetrieveError::Write(ticket_path.clone(), e))?;
            },
        }

        let cert_path = dir.join(layout::CERT_FILE);
        cert::write_cert_chain(&cert_path).map_err(|e| RetrieveError::Write(cert_path.clone(), e))?;

        let mut report = TitleReport {
            dir: dir.clone(),
            ticket_source,
            num_contents: tmd.num_contents(),
            total_size: tmd.total_content_size(),
            contents_downloaded: false,
        };
        if self.options.tickets_only {
            info!("Ticket, TMD, and CERT completed. Not downloading contents.");
            return Ok(RetrieveOutcome::Complete(report));
        }

        info!("Downloading Contents...");
        info!("Total size is {}", bytes_to_human(report.total_size));
        let count = tmd.num_contents();
        for (i, record) in tmd.content_records().iter().enumerate() {
            info!("Downloading {} of {}.", i + 1, count);
            let content_id = record.content_id_hex();
            let task = DownloadTask::new(urls.content(record), dir.join(layout::content_file(record)))
                .expect_size(record.content_size);
            self.downloader.fetch(&task).map_err(|source| RetrieveError::Content {
                content_id: content_id.clone(),
                index: i + 1,
                count,
                source,
            })?;
            // Not every content has an h3 file, so a 404 here is fine.
            let task = DownloadTask::new(urls.h3(record), dir.join(layout::h3_file(record))).optional();
            self.downloader.fetch(&task).map_err(|source| RetrieveError::H3 { content_id, source })?;
        }
        report.contents_downloaded = true;
        info!("Title download complete in \"{}\"", dir.display());
        Ok(RetrieveOutcome::Complete(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nus::download::DownloaderConfig;
    use crate::nus::download::testing::{FakeTransport, Reply};
    use crate::title::record::{self, layout as offsets};
    use crate::title::tmd::tests::build_tmd;
    use crate::title::{TitleId, TitleKey};

    const CDN: &str = "http://cdn.test";
    const KEY: &str = "00112233445566778899aabbccddeeff";

    fn downloader(transport: &FakeTransport) -> Downloader<FakeTransport> {
        Downloader::new(transport.clone(), DownloaderConfig { retry_count: 2, chunk_size: 512 })
    }

    fn options() -> RetrieveOptions {
        RetrieveOptions { cdn: CDN.to_string(), ..Default::default() }
    }

    fn job(title_id: &str, key: Option<&str>) -> TitleJob {
        TitleJob::new(title_id.parse().unwrap(), key.map(|k| k.parse().unwrap()))
    }

    /// Serves a title with contents 0000000c (1024 bytes) and 0000000e (2048 bytes), neither of
    /// which has an h3 file.
    fn serve_title(transport: &FakeTransport, title_id: &str) -> Vec<u8> {
        let tmd = build_tmd([0x00, 0x10], &[([0, 0, 0, 0x0C], 1024), ([0, 0, 0, 0x0E], 2048)]);
        transport.serve(&format!("{CDN}/{title_id}/tmd"), &tmd);
        transport.serve(&format!("{CDN}/{title_id}/0000000c"), &[0xAA; 1024]);
        transport.serve(&format!("{CDN}/{title_id}/0000000e"), &[0xBB; 2048]);
        transport.reply(&format!("{CDN}/{title_id}/0000000c.h3"), vec![Reply::NotFound]);
        transport.reply(&format!("{CDN}/{title_id}/0000000e.h3"), vec![Reply::NotFound]);
        tmd
    }

    fn complete(outcome: RetrieveOutcome) -> TitleReport {
        match outcome {
            RetrieveOutcome::Complete(report) => report,
            other => panic!("title was not downloaded: {:?}", other),
        }
    }

    #[test]
    fn test_ticket_source() {
        assert_eq!(TicketSource::select(TitleCategory::Update, true), TicketSource::Cdn);
        assert_eq!(TicketSource::select(TitleCategory::Update, false), TicketSource::Cdn);
        assert_eq!(TicketSource::select(TitleCategory::Base, true), TicketSource::Keysite);
        assert_eq!(TicketSource::select(TitleCategory::Dlc, false), TicketSource::Generated);
    }

    #[test]
    fn test_download_title() {
        let out = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new();
        let tid = "0005000010101a00";
        let tmd = serve_title(&transport, tid);
        let downloader = downloader(&transport);
        let options = options();
        let report = complete(Retriever::new(&downloader, &options).retrieve(&job(tid, Some(KEY)), out.path()).unwrap());

        assert_eq!(transport.requests(), vec![
            format!("{CDN}/{tid}/tmd"),
            format!("{CDN}/{tid}/0000000c"),
            format!("{CDN}/{tid}/0000000c.h3"),
            format!("{CDN}/{tid}/0000000e"),
            format!("{CDN}/{tid}/0000000e.h3"),
        ]);
        let dir = out.path().join("0005000010101A00");
        assert_eq!(report, TitleReport {
            dir: dir.clone(),
            ticket_source: TicketSource::Generated,
            num_contents: 2,
            total_size: 3072,
            contents_downloaded: true,
        });
        assert_eq!(fs::read(dir.join("title.tmd")).unwrap(), tmd);
        assert_eq!(fs::read(dir.join("title.cert")).unwrap(), cert::cert_chain());
        assert_eq!(fs::read(dir.join("0000000c.app")).unwrap(), vec![0xAA; 1024]);
        assert_eq!(fs::read(dir.join("0000000e.app")).unwrap(), vec![0xBB; 2048]);
        assert!(!dir.join("0000000c.h3").exists());

        let ticket = ticket::Ticket::from_bytes(&fs::read(dir.join("title.tik")).unwrap()).unwrap();
        assert_eq!(ticket.title_id().unwrap(), tid.parse::<TitleId>().unwrap());
        assert_eq!(ticket.title_key().unwrap(), KEY.parse::<TitleKey>().unwrap());
        assert_eq!(ticket.title_version().unwrap(), [0x00, 0x10]);
    }

    #[test]
    fn test_resume_title() {
        let out = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new();
        let tid = "0005000010101a00";
        serve_title(&transport, tid);
        let downloader = downloader(&transport);
        let options = options();
        let retriever = Retriever::new(&downloader, &options);
        retriever.retrieve(&job(tid, Some(KEY)), out.path()).unwrap();
        let first = transport.requests().len();
        retriever.retrieve(&job(tid, Some(KEY)), out.path()).unwrap();
        // Only the TMD and the h3 files are requested again; the contents are already complete.
        let again: Vec<String> = transport.requests()[first..].to_vec();
        assert_eq!(again, vec![
            format!("{CDN}/{tid}/tmd"),
            format!("{CDN}/{tid}/0000000c.h3"),
            format!("{CDN}/{tid}/0000000e.h3"),
        ]);
    }

    #[test]
    fn test_update_uses_cdn_ticket() {
        let out = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new();
        let tid = "0004000e001d1a00";
        serve_title(&transport, tid);
        transport.serve(&format!("{CDN}/{tid}/cetk"), b"legit ticket");
        let downloader = downloader(&transport);
        let mut options = options();
        options.patches = PatchOptions { demo: true, dlc: true };
        options.online_tickets = true;
        options.keysite = Some(String::from("http://keys.test"));
        let report = complete(Retriever::new(&downloader, &options).retrieve(&job(tid, Some(KEY)), out.path()).unwrap());
        assert_eq!(report.ticket_source, TicketSource::Cdn);
        assert_eq!(report.dir, out.path().join("0004000E001D1A00_Update"));
        assert_eq!(fs::read(report.dir.join("title.tik")).unwrap(), b"legit ticket");
        assert_eq!(transport.requests()[1], format!("{CDN}/{tid}/cetk"));
        assert!(!transport.requests().iter().any(|x| x.starts_with("http://keys.test")));
    }

    #[test]
    fn test_keysite_ticket() {
        let out = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new();
        let tid = "0005000010101a00";
        serve_title(&transport, tid);
        transport.serve(&format!("http://keys.test/ticket/{tid}.tik"), b"premade ticket");
        let downloader = downloader(&transport);
        let mut options = options();
        options.online_tickets = true;
        options.keysite = Some(String::from("http://keys.test"));
        let report = complete(Retriever::new(&downloader, &options).retrieve(&job(tid, None), out.path()).unwrap());
        assert_eq!(report.ticket_source, TicketSource::Keysite);
        assert_eq!(fs::read(report.dir.join("title.tik")).unwrap(), b"premade ticket");
    }

    #[test]
    fn test_dlc_ticket_is_patched() {
        let out = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new();
        let tid = "0005000c10101a00";
        serve_title(&transport, tid);
        let downloader = downloader(&transport);
        let mut options = options();
        options.patches = PatchOptions { demo: false, dlc: true };
        options.tickets_only = true;
        let report = complete(Retriever::new(&downloader, &options).retrieve(&job(tid, Some(KEY)), out.path()).unwrap());
        let data = fs::read(report.dir.join("title.tik")).unwrap();
        let expected = ticket::synthesize(tid.parse().unwrap(), KEY.parse().unwrap(), [0x00, 0x10], options.patches).unwrap();
        assert_eq!(data, expected.to_bytes());
        assert_eq!(
            record::read(&data, offsets::TICKET_DLC_ACCESS).unwrap(),
            &include_bytes!("../title/assets/dlc_unlock.bin")[..]
        );
    }

    #[test]
    fn test_tickets_only() {
        let out = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new();
        let tid = "0005000010101a00";
        serve_title(&transport, tid);
        let downloader = downloader(&transport);
        let mut options = options();
        options.tickets_only = true;
        let report = complete(Retriever::new(&downloader, &options).retrieve(&job(tid, Some(KEY)), out.path()).unwrap());
        assert!(!report.contents_downloaded);
        assert_eq!(report.num_contents, 2);
        assert_eq!(transport.requests(), vec![format!("{CDN}/{tid}/tmd")]);
        for file in ["title.tmd", "title.tik", "title.cert"] {
            assert!(report.dir.join(file).exists());
        }
        assert!(!report.dir.join("0000000c.app").exists());
    }

    #[test]
    fn test_simulate() {
        let out = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new();
        let downloader = downloader(&transport);
        let mut options = options();
        options.simulate = true;
        let mut job = job("0005000010101a00", Some(KEY));
        job.name = Some(String::from("Some Game"));
        job.region = Some(String::from("USA"));
        let outcome = Retriever::new(&downloader, &options).retrieve(&job, out.path()).unwrap();
        let dir = out.path().join("USA_Some_Game_0005000010101A00");
        assert_eq!(outcome, RetrieveOutcome::Simulated(dir.clone()));
        assert!(transport.requests().is_empty());
        assert!(!dir.exists());
    }

    #[test]
    fn test_missing_key() {
        let out = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new();
        serve_title(&transport, "0005000010101a00");
        let downloader = downloader(&transport);
        let options = options();
        let result = Retriever::new(&downloader, &options).retrieve(&job("0005000010101a00", None), out.path());
        assert!(matches!(result, Err(RetrieveError::NoTitleKey)));
        assert!(transport.requests().is_empty());
        assert!(!out.path().join("0005000010101A00").exists());
    }

    #[test]
    fn test_tmd_failure() {
        let out = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new();
        let downloader = downloader(&transport);
        let options = options();
        let result = Retriever::new(&downloader, &options).retrieve(&job("0005000010101a00", Some(KEY)), out.path());
        assert!(matches!(result, Err(RetrieveError::DownloadTMD(DownloadError::RetriesExhausted { attempts: 2, .. }))));
        assert_eq!(transport.requests().len(), 2);
    }

    #[test]
    fn test_truncated_tmd() {
        let out = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new();
        let tid = "0005000010101a00";
        let mut tmd = build_tmd([0, 1], &[([0, 0, 0, 1], 16), ([0, 0, 0, 2], 16)]);
        tmd.truncate(tmd.len() - 1);
        transport.serve(&format!("{CDN}/{tid}/tmd"), &tmd);
        let downloader = downloader(&transport);
        let options = options();
        let result = Retriever::new(&downloader, &options).retrieve(&job(tid, Some(KEY)), out.path());
        assert!(matches!(result, Err(RetrieveError::ParseTMD(_))));
        // A corrupt TMD is not downloaded again.
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn test_content_failure_stops_title() {
        let out = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new();
        let tid = "0005000010101a00";
        serve_title(&transport, tid);
        // The first content is short every time.
        transport.serve(&format!("{CDN}/{tid}/0000000c"), &[0xAA; 1000]);
        let downloader = downloader(&transport);
        let options = options();
        let result = Retriever::new(&downloader, &options).retrieve(&job(tid, Some(KEY)), out.path());
        match result {
            Err(RetrieveError::Content { content_id, index, count, .. }) => {
                assert_eq!((content_id.as_str(), index, count), ("0000000c", 1, 2));
            },
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!transport.requests().iter().any(|x| x.contains("0000000e")));
    }

    #[test]
    fn test_h3_failure_stops_title() {
        let out = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new();
        let tid = "0005000010101a00";
        serve_title(&transport, tid);
        transport.reply(&format!("{CDN}/{tid}/0000000c.h3"), vec![Reply::Status(500)]);
        let downloader = downloader(&transport);
        let options = options();
        let result = Retriever::new(&downloader, &options).retrieve(&job(tid, Some(KEY)), out.path());
        assert!(matches!(result, Err(RetrieveError::H3 { .. })));
        // The content that was already downloaded stays on disk.
        assert!(out.path().join("0005000010101A00").join("0000000c.app").exists());
        assert!(!transport.requests().iter().any(|x| x.contains("0000000e")));
    }
}
