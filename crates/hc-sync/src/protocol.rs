use hc_blockchain::Blockchain;

use crate::Peer;

/// Path every node serves its full chain on.
pub const CHAIN_PATH: &str = "/blockchain";

/// URL used to fetch `peer`'s chain.
pub fn chain_url(peer: &Peer) -> String {
    format!("http://{}{CHAIN_PATH}", peer.address)
}

/// Encode a chain in its wire form, `{"blocks":[...]}`.
pub fn encode_chain(chain: &Blockchain) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(chain)
}

/// Decode a chain received from a peer.  Decoding checks shape only; the
/// chain's hashes are not verified here.
pub fn decode_chain(bytes: &[u8]) -> Result<Blockchain, serde_json::Error> {
    serde_json::from_slice(bytes)
}
