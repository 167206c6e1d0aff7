// lib.rs from rustiiu (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustiiu
//
// Root level module that imports the feature modules.

pub mod nus;
pub mod title;
