// nus/keysite.rs from rustiiu (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustiiu
//
// Implements reading the title key database published by a key site.

use std::fs;
use std::path::{Path, PathBuf};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use crate::nus::download::{DownloadError, DownloadTask, Downloader, Transport};
use crate::title::TitleId;

#[derive(Debug, Error)]
pub enum KeysiteError {
    #[error("the key database could not be downloaded")]
    Download(#[from] DownloadError),
    #[error("the key database at `{}` could not be read", .0.display())]
    Read(PathBuf, #[source] std::io::Error),
    #[error("the key database is not in a valid format")]
    Parse(#[from] serde_json::Error),
}

/// One entry in the key database.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct KeyRecord {
    #[serde(rename = "titleID")]
    pub title_id: String,
    #[serde(rename = "titleKey", default)]
    pub title_key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    ticket: Option<Value>,
}

impl KeyRecord {
    /// Whether the key site has a premade Ticket for this title.
    pub fn has_ticket(&self) -> bool {
        match &self.ticket {
            Some(Value::String(s)) => !s.is_empty() && s != "0",
            Some(Value::Number(n)) => n.as_u64() != Some(0),
            Some(Value::Bool(b)) => *b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeyDatabase {
    records: Vec<KeyRecord>,
}

impl KeyDatabase {
    pub fn from_json(data: &[u8]) -> Result<Self, KeysiteError> {
        let records: Vec<KeyRecord> = serde_json::from_slice(data)?;
        Ok(KeyDatabase { records })
    }

    pub fn from_file(path: &Path) -> Result<Self, KeysiteError> {
        let data = fs::read(path).map_err(|e| KeysiteError::Read(path.to_path_buf(), e))?;
        Self::from_json(&data)
    }

    /// Downloads `{keysite}/json` to `path`, replacing any older copy, and loads it.
    pub fn download<T: Transport>(downloader: &Downloader<T>, keysite: &str, path: &Path) -> Result<Self, KeysiteError> {
        let url = format!("{}/json", keysite.trim_end_matches('/'));
        downloader.fetch(&DownloadTask::new(url, path))?;
        Self::from_file(path)
    }

    pub fn records(&self) -> &[KeyRecord] {
        &self.records
    }

    pub fn find(&self, title_id: TitleId) -> Option<&KeyRecord> {
        let tid = title_id.to_string();
        self.records.iter().find(|x| x.title_id.eq_ignore_ascii_case(&tid))
    }
}

/// The URL of the premade Ticket for a title on the key site.
pub fn ticket_url(keysite: &str, title_id: TitleId) -> String {
    format!("{}/ticket/{}.tik", keysite.trim_end_matches('/'), title_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nus::download::DownloaderConfig;
    use crate::nus::download::testing::FakeTransport;

    const JSON: &str = r#"[
        {"titleID": "0005000010101a00", "titleKey": "00112233445566778899aabbccddeeff", "name": "Some Game", "region": "USA", "ticket": "1"},
        {"titleID": "0005000C10101A00", "titleKey": null, "name": null, "region": "EUR", "ticket": "0"},
        {"titleID": "0005000e10101a00", "ticket": 1},
        {"titleID": "00050000101b2c00"}
    ]"#;

    fn tid(s: &str) -> TitleId {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_records() {
        let db = KeyDatabase::from_json(JSON.as_bytes()).unwrap();
        assert_eq!(db.records().len(), 4);
        let game = db.find(tid("0005000010101a00")).unwrap();
        assert_eq!(game.title_key.as_deref(), Some("00112233445566778899aabbccddeeff"));
        assert_eq!(game.name.as_deref(), Some("Some Game"));
        assert_eq!(game.region.as_deref(), Some("USA"));
        assert!(game.has_ticket());
    }

    #[test]
    fn test_find_ignores_case() {
        let db = KeyDatabase::from_json(JSON.as_bytes()).unwrap();
        let dlc = db.find(tid("0005000c10101a00")).unwrap();
        assert_eq!(dlc.title_key, None);
        assert!(!dlc.has_ticket());
        assert!(db.find(tid("0005000010101a01")).is_none());
    }

    #[test]
    fn test_ticket_flag() {
        let db = KeyDatabase::from_json(JSON.as_bytes()).unwrap();
        assert!(db.find(tid("0005000e10101a00")).unwrap().has_ticket());
        assert!(!db.find(tid("00050000101b2c00")).unwrap().has_ticket());
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(KeyDatabase::from_json(b"{\"titleID\": 1}"), Err(KeysiteError::Parse(_))));
    }

    #[test]
    fn test_download() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new();
        transport.serve("http://keys.test/json", JSON.as_bytes());
        let downloader = Downloader::new(transport.clone(), DownloaderConfig::default());
        let path = dir.path().join("titlekeys.json");
        let db = KeyDatabase::download(&downloader, "http://keys.test/", &path).unwrap();
        assert_eq!(db.records().len(), 4);
        assert!(path.exists());
        assert_eq!(transport.requests(), vec!["http://keys.test/json"]);
    }

    #[test]
    fn test_ticket_url() {
        assert_eq!(ticket_url("https://keys.test", tid("0005000010101A00")), "https://keys.test/ticket/0005000010101a00.tik");
    }
}
