// title/ticket.rs from rustiiu (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustiiu
//
// Implements generation of Tickets for titles that don't have a common Ticket available on the
// CDN.

use thiserror::Error;
use crate::title::record::{self, layout, RecordError};
use crate::title::{TitleCategory, TitleId, TitleKey};

/// The Ticket that every generated Ticket starts from. Its signature is a placeholder and is not
/// valid for any title.
static TICKET_TEMPLATE: &[u8] = include_bytes!("assets/ticket_template.bin");
/// Content access permissions that grant access to every piece of DLC for a title.
static DLC_UNLOCK: &[u8] = include_bytes!("assets/dlc_unlock.bin");

pub const TICKET_SIZE: usize = 0x350;

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("Ticket data is not 0x350 bytes long (got {0:#X})")]
    BadSize(usize),
    #[error("Ticket data is not in a valid format")]
    Record(#[from] RecordError),
}

/// Which optional patches the caller has allowed. Whether one actually gets applied depends on
/// the category of the title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchOptions {
    pub demo: bool,
    pub dlc: bool,
}

/// The single patch applied to a generated Ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketPatch {
    None,
    /// Clears the play limits of a demo.
    DemoLimits,
    /// Unlocks every piece of DLC.
    DlcUnlock,
}

impl TicketPatch {
    pub fn select(category: TitleCategory, options: PatchOptions) -> Self {
        match category {
            TitleCategory::Dlc if options.dlc => TicketPatch::DlcUnlock,
            TitleCategory::Demo if options.demo => TicketPatch::DemoLimits,
            _ => TicketPatch::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    data: Vec<u8>,
}

impl Ticket {
    /// Creates a new Ticket from an independent copy of the built-in template.
    pub fn from_template() -> Self {
        Ticket { data: TICKET_TEMPLATE.to_vec() }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, TicketError> {
        if data.len() != TICKET_SIZE {
            return Err(TicketError::BadSize(data.len()));
        }
        Ok(Ticket { data: data.to_vec() })
    }

    pub fn to_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn title_id(&self) -> Result<TitleId, TicketError> {
        Ok(TitleId::new(record::read_array(&self.data, layout::TICKET_TITLE_ID)?))
    }

    pub fn set_title_id(&mut self, title_id: TitleId) -> Result<(), TicketError> {
        record::write(&mut self.data, layout::TICKET_TITLE_ID, &title_id.bytes())?;
        Ok(())
    }

    pub fn title_key(&self) -> Result<TitleKey, TicketError> {
        Ok(TitleKey::new(record::read_array(&self.data, layout::TICKET_TITLE_KEY)?))
    }

    pub fn set_title_key(&mut self, title_key: TitleKey) -> Result<(), TicketError> {
        record::write(&mut self.data, layout::TICKET_TITLE_KEY, &title_key.bytes())?;
        Ok(())
    }

    pub fn title_version(&self) -> Result<[u8; 2], TicketError> {
        Ok(record::read_array(&self.data, layout::TICKET_TITLE_VERSION)?)
    }

    pub fn set_title_version(&mut self, title_version: [u8; 2]) -> Result<(), TicketError> {
        record::write(&mut self.data, layout::TICKET_TITLE_VERSION, &title_version)?;
        Ok(())
    }

    pub fn apply_patch(&mut self, patch: TicketPatch) -> Result<(), TicketError> {
        match patch {
            TicketPatch::None => {},
            TicketPatch::DemoLimits => record::fill(&mut self.data, layout::TICKET_DEMO_LIMITS, 0)?,
            TicketPatch::DlcUnlock => record::write(&mut self.data, layout::TICKET_DLC_ACCESS, DLC_UNLOCK)?,
        }
        Ok(())
    }
}

/// Generates a Ticket for the given title from the template. The Ticket is not signed; the
/// template's placeholder signature is carried over as-is.
pub fn synthesize(title_id: TitleId, title_key: TitleKey, title_version: [u8; 2], options: PatchOptions) -> Result<Ticket, TicketError> {
    let mut ticket = Ticket::from_template();
    ticket.set_title_version(title_version)?;
    ticket.set_title_id(title_id)?;
    ticket.set_title_key(title_key)?;
    // The byte at 0xB3 (0 in the template, 5 in some retail Tickets) is left alone.
    ticket.apply_patch(TicketPatch::select(title_id.category(), options))?;
    Ok(ticket)
}
