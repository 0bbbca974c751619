//! IP addresses and UUIDs.
//!
//! - `IPv4`: the address as a little-endian `u32` (octets reversed)
//! - `IPv6`: the 16 octets unmodified
//! - `UUID`: both 64-bit halves little-endian, most significant half first

use std::net::IpAddr;

use bytes::BufMut;

use super::primitive::mismatch;
use crate::error::ValueError;
use crate::types::Value;

pub(crate) fn encode_ipv4<B: BufMut + ?Sized>(
    value: Value<'_>,
    buf: &mut B,
) -> Result<(), ValueError> {
    let addr = match value {
        Value::Ip(IpAddr::V4(addr)) => addr,
        Value::Ip(IpAddr::V6(addr)) => addr.to_ipv4_mapped().ok_or_else(|| {
            ValueError::mismatch(format!("IPv6 address {addr} cannot be written to IPv4"))
        })?,
        other => return Err(mismatch("IPv4", other)),
    };
    buf.put_u32_le(u32::from(addr));
    Ok(())
}

pub(crate) fn encode_ipv6<B: BufMut + ?Sized>(
    value: Value<'_>,
    buf: &mut B,
) -> Result<(), ValueError> {
    let addr = match value {
        Value::Ip(IpAddr::V6(addr)) => addr,
        Value::Ip(IpAddr::V4(addr)) => addr.to_ipv6_mapped(),
        other => return Err(mismatch("IPv6", other)),
    };
    buf.put_slice(&addr.octets());
    Ok(())
}

pub(crate) fn encode_uuid<B: BufMut + ?Sized>(
    value: Value<'_>,
    buf: &mut B,
) -> Result<(), ValueError> {
    match value {
        Value::Uuid(uuid) => {
            let (high, low) = uuid.as_u64_pair();
            buf.put_u64_le(high);
            buf.put_u64_le(low);
            Ok(())
        }
        other => Err(mismatch("UUID", other)),
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_ipv4_reversed() {
        let mut buf = Vec::new();
        encode_ipv4(Value::Ip(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10))), &mut buf).unwrap();
        assert_eq!(buf, [10, 1, 168, 192]);
    }

    #[test]
    fn test_ipv6_unmodified() {
        let addr: Ipv6Addr = "2001:db8::1".parse().unwrap();
        let mut buf = Vec::new();
        encode_ipv6(Value::Ip(IpAddr::V6(addr)), &mut buf).unwrap();
        assert_eq!(buf, addr.octets());
    }

    #[test]
    fn test_cross_family() {
        let v4 = Ipv4Addr::new(10, 0, 0, 1);
        let mut buf = Vec::new();
        encode_ipv6(Value::Ip(IpAddr::V4(v4)), &mut buf).unwrap();
        assert_eq!(buf, v4.to_ipv6_mapped().octets());

        buf.clear();
        encode_ipv4(Value::Ip(IpAddr::V6(v4.to_ipv6_mapped())), &mut buf).unwrap();
        assert_eq!(buf, [1, 0, 0, 10]);

        let v6: Ipv6Addr = "2001:db8::1".parse().unwrap();
        assert!(encode_ipv4(Value::Ip(IpAddr::V6(v6)), &mut buf).is_err());
    }

    #[test]
    fn test_uuid_permutation() {
        let uuid = Uuid::parse_str("00112233-4455-6677-8899-aabbccddeeff").unwrap();
        let mut buf = Vec::new();
        encode_uuid(Value::Uuid(uuid), &mut buf).unwrap();
        assert_eq!(
            buf,
            [
                0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11, 0x00, 0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA,
                0x99, 0x88
            ]
        );

        // Same bytes as the field-order permutation of the mixed-endian layout.
        let g = uuid.to_bytes_le();
        let mut tail = g[8..].to_vec();
        tail.reverse();
        let mut expected = Vec::new();
        expected.extend_from_slice(&g[6..8]);
        expected.extend_from_slice(&g[4..6]);
        expected.extend_from_slice(&g[0..4]);
        expected.extend_from_slice(&tail);
        assert_eq!(buf, expected);
    }
}
