/*!
Encoding and decoding of packets used by the onion routing layer of the
[Tox protocol](https://zetok.github.io/tox-spec).
*/

#![forbid(unsafe_code)]
#![doc(html_logo_url = "https://raw.githubusercontent.com/tox-rs/logo/master/logo.png")]
// Remove it when it will be fixed in nom parser
#![allow(clippy::redundant_closure)]

#[macro_use]
extern crate cookie_factory;

pub mod errors;
pub mod ip_port;
pub mod packed_node;
pub mod packet_kind;
pub mod onion;
pub mod relay;
