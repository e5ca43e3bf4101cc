use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use sp_core::{
    crypto::{SecretStringError, Ss58AddressFormat, Ss58Codec},
    sr25519, Pair as _,
};
use subxt::{
    config::PolkadotConfig,
    tx::Signer,
    utils::{AccountId32, MultiAddress, MultiSignature},
};

/// Address format of the generic Substrate network.
pub const SS58_PREFIX: u16 = 42;

const MAX_SS58_PREFIX: u16 = 16_383;

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Failed to read key file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Key file {0:?} is empty")]
    Empty(PathBuf),
    #[error("Failed to parse key file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: SuriError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SuriError {
    #[error("Invalid secret URI: {0}")]
    Secret(#[from] SecretStringError),
    #[error("SS58 prefix {0} is out of range")]
    Ss58Prefix(u16),
}

/// Relayer signing key. Signs extrinsics on behalf of the relayer account.
#[derive(Clone)]
pub struct Keypair {
    pair: sr25519::Pair,
    ss58_format: Ss58AddressFormat,
}

impl Keypair {
    /// Derives the keypair from a Substrate URI: a mnemonic phrase, a hex seed or
    /// a dev account (e.g., "//Alice"), optionally followed by a derivation path
    /// and a `///password`.
    pub fn from_suri(suri: &str, ss58_prefix: u16) -> Result<Self, SuriError> {
        if ss58_prefix > MAX_SS58_PREFIX {
            return Err(SuriError::Ss58Prefix(ss58_prefix));
        }

        let pair = sr25519::Pair::from_string(suri, None)?;

        Ok(Self {
            pair,
            ss58_format: Ss58AddressFormat::custom(ss58_prefix),
        })
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.pair.public().0
    }

    /// SS58 encoded address of the public key.
    pub fn address(&self) -> String {
        self.pair
            .public()
            .to_ss58check_with_version(self.ss58_format)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .finish()
    }
}

impl Signer<PolkadotConfig> for Keypair {
    fn account_id(&self) -> AccountId32 {
        AccountId32(self.public_key())
    }

    fn address(&self) -> MultiAddress<AccountId32, ()> {
        MultiAddress::Id(<Self as Signer<PolkadotConfig>>::account_id(self))
    }

    fn sign(&self, signer_payload: &[u8]) -> MultiSignature {
        MultiSignature::Sr25519(self.pair.sign(signer_payload).0)
    }
}

/// Reads the first line of the file as a seed URI and derives the keypair from it.
pub fn load(path: &Path, ss58_prefix: u16) -> Result<Keypair, KeyError> {
    let contents = fs::read_to_string(path).map_err(|source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let suri = contents
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| KeyError::Empty(path.to_path_buf()))?;

    Keypair::from_suri(suri, ss58_prefix).map_err(|source| KeyError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
