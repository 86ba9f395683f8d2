/*! A pair of `SocketAddr` & `PublicKey`.
*/

use std::net::SocketAddr;

use onion_crypto::*;

/** Address and long term `PublicKey` of a DHT node.

Onion paths are built from three of them. How they are picked is up to the
caller.
*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackedNode {
    /// Socket addr of node.
    pub saddr: SocketAddr,
    /// Public Key of the node.
    pub pk: PublicKey,
}

impl PackedNode {
    /// Create new `PackedNode`.
    pub fn new(saddr: SocketAddr, pk: PublicKey) -> Self {
        PackedNode { saddr, pk }
    }
}
