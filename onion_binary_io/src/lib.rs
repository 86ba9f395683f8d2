/*! Binary (de)serialization traits shared by onion crates.

Parsers are written with `nom`, generators with `cookie_factory`.
*/

#![forbid(unsafe_code)]

use std::convert::TryInto;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

pub use nom::IResult;
pub use cookie_factory::GenError;

use cookie_factory::gen_slice;
use nom::bytes::complete::take;
use nom::combinator::{map, map_opt};

#[cfg(feature = "crypto")]
mod crypto;

/// The trait provides method to deserialize struct from raw bytes
pub trait FromBytes: Sized {
    /// Deserialize struct using `nom` from raw bytes
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self>;
}

/// The trait provides method to serialize struct into raw bytes
pub trait ToBytes: Sized {
    /// Serialize struct into raw bytes using `cookie_factory`
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError>;
}

impl<const N: usize> FromBytes for [u8; N] {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        map_opt(take(N), |bytes: &[u8]| bytes.try_into().ok())(input)
    }
}

impl FromBytes for Ipv4Addr {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        map(<[u8; 4]>::from_bytes, Ipv4Addr::from)(input)
    }
}

impl FromBytes for Ipv6Addr {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        map(<[u8; 16]>::from_bytes, Ipv6Addr::from)(input)
    }
}

impl ToBytes for Ipv4Addr {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        gen_slice!(buf, &self.octets())
    }
}

impl ToBytes for Ipv6Addr {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        gen_slice!(buf, &self.octets())
    }
}

impl ToBytes for IpAddr {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        match *self {
            IpAddr::V4(ref addr) => addr.to_bytes(buf),
            IpAddr::V6(ref addr) => addr.to_bytes(buf),
        }
    }
}

/// Generator that always fails with the given custom error code. Used with
/// `gen_cond!` to reject values that must not be serialized.
pub fn gen_error(_buf: (&mut [u8], usize), error: u32) -> Result<(&mut [u8], usize), GenError> {
    Err(GenError::CustomError(error))
}

/// Generator that fails if the number of bytes written so far exceeds `limit`.
pub fn gen_len_limit(buf: (&mut [u8], usize), limit: usize) -> Result<(&mut [u8], usize), GenError> {
    if buf.1 <= limit {
        Ok(buf)
    } else {
        Err(GenError::BufferTooSmall(buf.1))
    }
}

/// Generate a test that serializes the value, parses it back and compares
/// both. Requires `FromBytes` and `ToBytes` to be in scope.
#[macro_export]
macro_rules! encode_decode_test (
    ($test:ident, $value:expr) => (
        #[test]
        fn $test() {
            let value = $value;
            let mut buf = [0; 1024 * 1024];
            let (_, size) = value.to_bytes((&mut buf, 0)).unwrap();
            assert!(size <= 1024 * 1024);
            let (rest, decoded_value) = FromBytes::from_bytes(&buf[..size]).unwrap();
            // this helps compiler to infer type of decoded_value
            // i.e. it means that decoded_value has the same type as value
            fn infer<T>(_: &T, _: &T) { }
            infer(&decoded_value, &value);
            assert!(rest.is_empty());
            assert_eq!(decoded_value, value);
        }
    )
);
