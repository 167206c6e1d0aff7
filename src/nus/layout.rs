// nus/layout.rs from rustiiu (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustiiu
//
// Names the directories and files that a downloaded title is written to, and the CDN URLs that
// they are downloaded from.

use std::path::{Path, PathBuf};
use deunicode::deunicode;
use crate::title::{TitleCategory, TitleId};
use crate::title::tmd::ContentRecord;

pub const DEFAULT_CDN: &str = "http://ccs.cdn.c.shop.nintendowifi.net/ccs/download";

pub const TMD_FILE: &str = "title.tmd";
pub const CERT_FILE: &str = "title.cert";
pub const TICKET_FILE: &str = "title.tik";

/// Strips any characters that aren't safe to use in a path. Letters and digits in any script are
/// kept, along with spaces, periods and underscores.
pub fn safe_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c.is_alphanumeric() || " ._".contains(c) { c } else { '_' };
        // Runs of underscores collapse into one.
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches(|c| c == '_' || c == ' ').to_string()
}

/// Builds the (unsanitized) name of the directory for a title, like `USA_Some_Game_0005000010101A00`
/// or `0005000E10101A00_Update`. Names are transliterated to ASCII.
pub fn title_dir_name(title_id: TitleId, name: Option<&str>, region: Option<&str>) -> String {
    let mut dir_name = match name {
        Some(name) => format!(
            "{}_{}_{}",
            region.unwrap_or("None"),
            deunicode(&name.replace(' ', "_").replace('.', "")),
            title_id.to_upper_hex()
        ),
        None => title_id.to_upper_hex(),
    };
    match title_id.category() {
        TitleCategory::Dlc => dir_name.push_str("_DLC"),
        TitleCategory::Update => dir_name.push_str("_Update"),
        _ => {},
    }
    dir_name
}

/// The directory that a title is downloaded into under `output_dir`.
pub fn title_dir(output_dir: &Path, title_id: TitleId, name: Option<&str>, region: Option<&str>) -> PathBuf {
    output_dir.join(safe_filename(&title_dir_name(title_id, name, region)))
}

pub fn content_file(record: &ContentRecord) -> String {
    format!("{}.app", record.content_id_hex())
}

pub fn h3_file(record: &ContentRecord) -> String {
    format!("{}.h3", record.content_id_hex())
}

/// Builds the URLs for a title's files on the CDN.
#[derive(Debug, Clone)]
pub struct CdnUrls {
    base: String,
}

impl CdnUrls {
    pub fn new(cdn: &str, title_id: TitleId) -> Self {
        CdnUrls { base: format!("{}/{}", cdn.trim_end_matches('/'), title_id) }
    }

    pub fn tmd(&self) -> String {
        format!("{}/tmd", self.base)
    }

    pub fn ticket(&self) -> String {
        format!("{}/cetk", self.base)
    }

    pub fn content(&self, record: &ContentRecord) -> String {
        format!("{}/{}", self.base, record.content_id_hex())
    }

    pub fn h3(&self, record: &ContentRecord) -> String {
        format!("{}/{}.h3", self.base, record.content_id_hex())
    }
}
