// nus/mod.rs from rustiiu (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustiiu
//
// Root for all NUS (CDN) related modules.

pub mod download;
pub mod keysite;
pub mod layout;
pub mod plan;
pub mod progress;
pub mod retrieve;
