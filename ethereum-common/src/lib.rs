pub mod beacon;
pub mod merkle;
pub mod network;
pub mod utils;

use core::str::FromStr;

pub use ethereum_types::{H160, U256};
use parity_scale_codec::{Decode, Encode};
use serde::{de, Deserialize};
pub use tree_hash::{self, Hash256};
use tree_hash::TreeHash;

pub const SLOTS_PER_EPOCH: u64 = 32;
pub const SLOTS_PER_HISTORICAL_ROOT: u64 = 8_192;

pub type Slot = u64;
