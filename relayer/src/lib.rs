pub mod beacon;
pub mod cli;
pub mod config;
pub mod hex_utils;
pub mod import_execution_header;
pub mod keypair;
pub mod parachain;
