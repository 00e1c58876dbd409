pub mod context;
pub mod crypto_line;
pub mod key;
pub mod profile;

pub use context::{SrtpContext, SrtpContextStore};
pub use crypto_line::{add_crypto_to_sdp, build_crypto_line, parse_crypto_line, CryptoLine};
pub use key::{generate_key_material, Mki, SrtpKeyMaterial};
pub use profile::SrtpProfile;
