// nus/plan.rs from rustiiu (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustiiu
//
// Turns the titles, keys and regions requested by the user into the list of titles to download.
// Every check that can stop the whole batch happens here, before anything is downloaded.

use log::error;
use thiserror::Error;
use crate::nus::keysite::{KeyDatabase, KeyRecord};
use crate::title::{TitleCategory, TitleId, TitleIdError, TitleKey};

/// Regions that titles in the key database can belong to. "ALL" marks region-free titles.
pub const ALL_REGIONS: [&str; 4] = ["ALL", "EUR", "USA", "JPN"];
/// Type-checks of the titles that are downloaded in region mode (games, DLC and updates).
pub const DOWNLOAD_TYPES: [u16; 3] = [0x0000, 0x000C, 0x000E];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("when downloading by region, Title IDs and keys can't be given as well (all titles come from the key site)")]
    RegionsWithTitles,
    #[error("the number of keys ({keys}) does not match the number of Title IDs ({titles})")]
    KeyCountMismatch { titles: usize, keys: usize },
    #[error("Title Keys are required unless online keys or online tickets are used")]
    NoKeySource,
    #[error("a key site is required to use online keys, online tickets, or regions")]
    NoKeysite,
    #[error("the key database is required but was not loaded")]
    NoKeyDatabase,
    #[error(transparent)]
    InvalidInput(#[from] TitleIdError),
    #[error("no Ticket is available on the key site for title {0}")]
    TicketUnavailable(TitleId),
}

/// Everything the user asked for.
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    pub titles: Vec<String>,
    pub keys: Vec<String>,
    pub regions: Vec<String>,
    pub online_keys: bool,
    pub online_tickets: bool,
    pub keysite: Option<String>,
}

/// A single title to download, with whatever is known about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleJob {
    pub title_id: TitleId,
    pub title_key: Option<TitleKey>,
    pub name: Option<String>,
    pub region: Option<String>,
}

impl TitleJob {
    pub fn new(title_id: TitleId, title_key: Option<TitleKey>) -> Self {
        TitleJob { title_id, title_key, name: None, region: None }
    }

    fn with_record(mut self, record: &KeyRecord) -> Self {
        self.name = record.name.clone();
        self.region = record.region.clone();
        self
    }
}

impl BatchRequest {
    pub fn needs_key_database(&self) -> bool {
        !self.regions.is_empty() || self.online_keys || self.online_tickets
    }

    /// Checks the request for problems that make the whole batch impossible, including malformed
    /// Title IDs and keys.
    pub fn validate(&self) -> Result<(), PlanError> {
        if !self.regions.is_empty() && (!self.titles.is_empty() || !self.keys.is_empty()) {
            return Err(PlanError::RegionsWithTitles);
        }
        if !self.keys.is_empty() && self.keys.len() != self.titles.len() {
            return Err(PlanError::KeyCountMismatch { titles: self.titles.len(), keys: self.keys.len() });
        }
        if !self.titles.is_empty() && self.keys.is_empty() && !self.online_keys && !self.online_tickets {
            return Err(PlanError::NoKeySource);
        }
        if self.needs_key_database() && self.keysite.is_none() {
            return Err(PlanError::NoKeysite);
        }
        for title in &self.titles {
            title.parse::<TitleId>()?;
        }
        for key in &self.keys {
            key.parse::<TitleKey>()?;
        }
        Ok(())
    }

    /// Builds the list of titles to download. `db` must be provided if the request needs the key
    /// database. Titles that can't be downloaded are logged and left out; problems that affect
    /// the whole batch are returned as errors.
    pub fn plan(&self, db: Option<&KeyDatabase>) -> Result<Vec<TitleJob>, PlanError> {
        self.validate()?;
        let db = match db {
            Some(db) => Some(db),
            None if self.needs_key_database() => return Err(PlanError::NoKeyDatabase),
            None => None,
        };
        let mut jobs = self.plan_titles(db)?;
        if !self.regions.is_empty() {
            if let Some(db) = db {
                jobs.extend(self.plan_regions(db));
            }
        }
        Ok(jobs)
    }

    fn plan_titles(&self, db: Option<&KeyDatabase>) -> Result<Vec<TitleJob>, PlanError> {
        let keysite = self.keysite.as_deref().unwrap_or_default();
        let mut jobs = Vec::with_capacity(self.titles.len());
        for (i, title) in self.titles.iter().enumerate() {
            let title_id: TitleId = title.parse()?;
            let is_update = title_id.category() == TitleCategory::Update;
            let mut job = TitleJob::new(title_id, None);
            if let Some(key) = self.keys.get(i) {
                job.title_key = Some(key.parse()?);
            } else if let Some(db) = db {
                let record = db.find(title_id);
                if !is_update {
                    match record {
                        None => {
                            error!("Could not find data on {} for {}, skipping", keysite, title_id);
                            continue;
                        },
                        Some(record) if self.online_tickets => {
                            if !record.has_ticket() {
                                return Err(PlanError::TicketUnavailable(title_id));
                            }
                        },
                        Some(record) if self.online_keys => {
                            match record.title_key.as_deref().map(str::parse::<TitleKey>) {
                                Some(Ok(key)) => job.title_key = Some(key),
                                Some(Err(e)) => {
                                    error!("The key for {} on {} is not usable ({}), skipping", title_id, keysite, e);
                                    continue;
                                },
                                None => {},
                            }
                        },
                        Some(_) => {},
                    }
                }
                if let Some(record) = record {
                    job = job.with_record(record);
                }
            }
            if job.title_key.is_none() && !self.online_tickets && !is_update {
                error!("Could not find title or ticket for {}", title_id);
                continue;
            }
            jobs.push(job);
        }
        Ok(jobs)
    }

    fn plan_regions(&self, db: &KeyDatabase) -> Vec<TitleJob> {
        let mut jobs = Vec::new();
        for record in db.records() {
            let region = record.region.as_deref();
            if let Some(region) = region {
                if !ALL_REGIONS.contains(&region) {
                    error!("Found unknown region `{}` for titleid: {}", region, record.title_id);
                }
            }
            if !region.is_some_and(|r| self.regions.iter().any(|x| x == r)) {
                continue;
            }
            let title_id: TitleId = match record.title_id.parse() {
                Ok(title_id) => title_id,
                Err(e) => {
                    error!("Skipping key database entry: {}", e);
                    continue;
                },
            };
            if !DOWNLOAD_TYPES.contains(&title_id.type_check()) {
                continue;
            }
            if self.online_tickets && !record.has_ticket() {
                continue;
            }
            if self.online_keys && record.title_key.is_none() {
                continue;
            }
            let title_key = match record.title_key.as_deref().map(str::parse::<TitleKey>).transpose() {
                Ok(title_key) => title_key,
                Err(e) => {
                    error!("Skipping {}: {}", title_id, e);
                    continue;
                },
            };
            if title_key.is_none() && !self.online_tickets && title_id.category() != TitleCategory::Update {
                continue;
            }
            jobs.push(TitleJob::new(title_id, title_key).with_record(record));
        }
        jobs
    }
}
