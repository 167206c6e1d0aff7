// title/mod.rs from rustiiu (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustiiu
//
// Root for all title-related modules and implementation of the Title ID, Title Key and title
// category types shared by them.

pub mod cert;
pub mod record;
pub mod ticket;
pub mod tmd;

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

static TITLE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"^[0-9a-f]{16}$").case_insensitive(true).build().unwrap()
});
static TITLE_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"^[0-9a-f]{32}$").case_insensitive(true).build().unwrap()
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TitleIdError {
    #[error("Title ID `{0}` is invalid (Title IDs must be 16 hexadecimal characters long)")]
    InvalidTitleId(String),
    #[error("Title Key `{0}` is invalid (Title Keys must be 32 hexadecimal characters long)")]
    InvalidTitleKey(String),
}

/// The category of a title, taken from the second 16-bit field of the lower half of its Title ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleCategory {
    Base,
    Demo,
    Dlc,
    Update,
}

impl TitleCategory {
    pub fn from_type_check(type_check: u16) -> Self {
        match type_check {
            0x0002 => TitleCategory::Demo,
            0x000C => TitleCategory::Dlc,
            0x000E => TitleCategory::Update,
            _ => TitleCategory::Base,
        }
    }
}

impl fmt::Display for TitleCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TitleCategory::Base => write!(f, "Game"),
            TitleCategory::Demo => write!(f, "Demo"),
            TitleCategory::Dlc => write!(f, "DLC"),
            TitleCategory::Update => write!(f, "Update"),
        }
    }
}

/// A 64-bit Title ID, always displayed as 16 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TitleId([u8; 8]);

impl TitleId {
    pub fn new(bytes: [u8; 8]) -> Self {
        TitleId(bytes)
    }

    pub fn bytes(&self) -> [u8; 8] {
        self.0
    }

    /// The type-check field, characters 4..8 of the hex Title ID.
    pub fn type_check(&self) -> u16 {
        u16::from_be_bytes([self.0[2], self.0[3]])
    }

    pub fn category(&self) -> TitleCategory {
        TitleCategory::from_type_check(self.type_check())
    }

    pub fn to_upper_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl FromStr for TitleId {
    type Err = TitleIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !TITLE_ID_RE.is_match(s) {
            return Err(TitleIdError::InvalidTitleId(s.to_string()));
        }
        let mut bytes = [0u8; 8];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| TitleIdError::InvalidTitleId(s.to_string()))?;
        Ok(TitleId(bytes))
    }
}

impl fmt::Display for TitleId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// An encrypted Title Key. This is passed through into Tickets untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleKey([u8; 16]);

impl TitleKey {
    pub fn new(bytes: [u8; 16]) -> Self {
        TitleKey(bytes)
    }

    pub fn bytes(&self) -> [u8; 16] {
        self.0
    }
}

impl FromStr for TitleKey {
    type Err = TitleIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !TITLE_KEY_RE.is_match(s) {
            return Err(TitleIdError::InvalidTitleKey(s.to_string()));
        }
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| TitleIdError::InvalidTitleKey(s.to_string()))?;
        Ok(TitleKey(bytes))
    }
}

impl fmt::Display for TitleKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
