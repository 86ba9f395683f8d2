/*! Onion packets carried by TCP relays.
*/

mod onion_request;

pub use self::onion_request::OnionRequest;

/// Kind byte of the `OnionRequest` packet in a TCP stream.
pub const TCP_ONION_REQUEST_KIND: u8 = 0x08;
