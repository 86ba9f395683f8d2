/*!
Onion routing layer of the [Tox protocol](https://zetok.github.io/tox-spec).

It builds onion paths, relays onion requests through three nodes and sends
responses back using encrypted return addresses.

Repo: https://github.com/tox-rs/tox

*/

#![forbid(unsafe_code)]
#![doc(html_logo_url = "https://raw.githubusercontent.com/tox-rs/logo/master/logo.png")]
// Remove it when it will be fixed in nom parser
#![allow(clippy::redundant_closure)]

#[macro_use]
extern crate log;

pub mod time;
pub mod stats;
pub mod shared_key_cache;
pub mod onion;
pub mod udp;
pub mod codec;
pub mod socket;
