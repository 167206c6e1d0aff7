// title/tmd.rs from rustiiu (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustiiu
//
// Implements the parts of TMD parsing required to find and download a title's content.

use thiserror::Error;
use crate::title::record::{self, layout, RecordError};

#[derive(Debug, Error)]
pub enum TMDError {
    #[error("TMD data is truncated or otherwise not in a valid format")]
    Record(#[from] RecordError),
}

/// One content record from a TMD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRecord {
    pub content_id: [u8; 4],
    pub content_size: u64,
}

impl ContentRecord {
    /// The Content ID as it appears in CDN URLs and file names (8 lowercase hex characters).
    pub fn content_id_hex(&self) -> String {
        hex::encode(self.content_id)
    }
}

/// Reads the title version and the ordered list of content records from raw TMD data. Nothing is
/// validated beyond the data being long enough to hold every record it declares.
pub fn parse_content_list(data: &[u8]) -> Result<([u8; 2], Vec<ContentRecord>), TMDError> {
    let title_version = record::read_array::<2>(data, layout::TMD_TITLE_VERSION)?;
    let num_contents = record::read_u16(data, layout::TMD_NUM_CONTENTS)?;
    let mut content_records = Vec::with_capacity(num_contents as usize);
    for i in 0..num_contents as usize {
        let content_id = record::read_array::<4>(data, layout::content_record_field(i, layout::CONTENT_RECORD_ID))?;
        let content_size = record::read_u64(data, layout::content_record_field(i, layout::CONTENT_RECORD_SIZE_FIELD))?;
        content_records.push(ContentRecord { content_id, content_size });
    }
    Ok((title_version, content_records))
}

#[derive(Debug, Clone)]
/// A TMD as downloaded from the CDN. The raw bytes are kept so that the TMD can be written
/// back out exactly as it was received, signature and all.
pub struct TMD {
    data: Vec<u8>,
    title_version: [u8; 2],
    content_records: Vec<ContentRecord>,
}

impl TMD {
    pub fn from_bytes(data: &[u8]) -> Result<Self, TMDError> {
        let (title_version, content_records) = parse_content_list(data)?;
        Ok(TMD {
            data: data.to_vec(),
            title_version,
            content_records,
        })
    }

    pub fn to_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The raw title version. This gets copied straight into generated Tickets.
    pub fn title_version(&self) -> [u8; 2] {
        self.title_version
    }

    pub fn num_contents(&self) -> usize {
        self.content_records.len()
    }

    pub fn content_records(&self) -> &[ContentRecord] {
        &self.content_records
    }

    /// Gets the combined size of every content listed in the TMD, in bytes.
    pub fn total_content_size(&self) -> u64 {
        self.content_records.iter().map(|x| x.content_size).sum()
    }
}
