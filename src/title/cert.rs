// title/cert.rs from rustiiu (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustiiu
//
// Provides the certificate chain that accompanies every title downloaded from the CDN.

use std::fs;
use std::io;
use std::path::Path;

/// The retail certificate chain (CA00000003, CP0000000b and XS0000000c). This is identical for
/// every title, so it is never downloaded or parsed.
static CERT_CHAIN: &[u8] = include_bytes!("assets/title.cert");

pub fn cert_chain() -> &'static [u8] {
    CERT_CHAIN
}

/// Writes the certificate chain to the specified path, replacing anything already there.
pub fn write_cert_chain(path: &Path) -> Result<(), io::Error> {
    fs::write(path, CERT_CHAIN)
}
