use nom::IResult;
use nom::combinator::map;

use crypto_box::{PublicKey, KEY_SIZE};

use super::FromBytes;

impl FromBytes for PublicKey {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        map(<[u8; KEY_SIZE]>::from_bytes, PublicKey::from)(input)
    }
}
