//! mDNS messages for the board
//!
//! Host lookups go out as a one-question A query for `<host>.local` and the
//! first matching A record in any response wins. While it listens, the board
//! also answers A queries for its own identity so it can be found on the LAN.
//! Messages are built and parsed with the `domain` crate that edge-mdns
//! re-exports.

use core::net::{Ipv4Addr, Ipv6Addr};
use edge_mdns::domain::base::iana::{Class, Rtype};
use edge_mdns::domain::base::name::{Name, NameBuilder, ToName};
use edge_mdns::domain::base::{Message, MessageBuilder, Record, Ttl};
use edge_mdns::domain::rdata::A;
use edge_mdns::host::Host;
use heapless::Vec;

/// mDNS multicast group
pub const MDNS_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// mDNS UDP port
pub const MDNS_PORT: u16 = 5353;

/// Maximum mDNS packet size
pub const MAX_MDNS_PACKET_SIZE: usize = 1500;

/// Largest message we build
pub const MAX_MESSAGE_SIZE: usize = 512;

/// TTL of the board's own A record
pub const HOST_TTL_SECS: u32 = 120;

const CLASS_IN: u16 = 1;
const CLASS_MASK: u16 = 0x7fff;
/// QU bit in a question, cache-flush bit in a record
const CLASS_TOP_BIT: u16 = 0x8000;

pub type MessageBuf = Vec<u8, MAX_MESSAGE_SIZE>;
type NameBuf = Vec<u8, 255>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MdnsError {
    #[error("host name has an empty or oversized label")]
    InvalidName,
    #[error("message does not fit the packet buffer")]
    PacketTooLarge,
}

/// The board's own host record for `identity`
pub fn host_record(identity: &str, ip: Ipv4Addr) -> Host<'_> {
    Host {
        hostname: identity,
        ipv4: ip,
        ipv6: Ipv6Addr::UNSPECIFIED,
        ttl: Ttl::from_secs(HOST_TTL_SECS),
    }
}

/// `<host>.local.` as a wire name
fn local_name(host: &str) -> Result<Name<NameBuf>, MdnsError> {
    let mut builder = NameBuilder::<NameBuf>::new();
    for label in host.split('.').chain(core::iter::once("local")) {
        if label.is_empty() {
            return Err(MdnsError::InvalidName);
        }
        builder
            .append_label(label.as_bytes())
            .map_err(|_| MdnsError::InvalidName)?;
    }
    builder.into_name().map_err(|_| MdnsError::InvalidName)
}

/// Encode an A record query for `<host>.local`, asking for a unicast reply
pub fn encode_query(id: u16, host: &str) -> Result<MessageBuf, MdnsError> {
    let name = local_name(host)?;

    let mut builder =
        MessageBuilder::from_target(MessageBuf::new()).map_err(|_| MdnsError::PacketTooLarge)?;
    builder.header_mut().set_id(id);

    let mut question = builder.question();
    question
        .push((&name, Rtype::A, Class::from_int(CLASS_IN | CLASS_TOP_BIT)))
        .map_err(|_| MdnsError::PacketTooLarge)?;
    Ok(question.finish())
}

/// Unsolicited response carrying the host's A record
pub fn encode_announcement(host: &Host<'_>) -> Result<MessageBuf, MdnsError> {
    encode_host_response(0, host)
}

fn encode_host_response(id: u16, host: &Host<'_>) -> Result<MessageBuf, MdnsError> {
    let name = local_name(host.hostname)?;
    let [a, b, c, d] = host.ipv4.octets();

    let mut builder =
        MessageBuilder::from_target(MessageBuf::new()).map_err(|_| MdnsError::PacketTooLarge)?;
    let header = builder.header_mut();
    header.set_id(id);
    header.set_qr(true);
    header.set_aa(true);

    let mut answer = builder.answer();
    answer
        .push(Record::new(
            &name,
            Class::from_int(CLASS_IN | CLASS_TOP_BIT),
            host.ttl,
            A::from_octets(a, b, c, d),
        ))
        .map_err(|_| MdnsError::PacketTooLarge)?;
    Ok(answer.finish())
}

/// Response to `packet` when it is a query for the host's A record
pub fn answer_query(packet: &[u8], host: &Host<'_>) -> Option<MessageBuf> {
    let name = local_name(host.hostname).ok()?;
    let message = Message::from_octets(packet).ok()?;
    if message.header().qr() {
        return None;
    }

    let asked = message
        .question()
        .map_while(Result::ok)
        .any(|question| question.qtype() == Rtype::A && question.qname().name_eq(&name));
    if !asked {
        return None;
    }
    encode_host_response(message.header().id(), host).ok()
}

/// Find the A record for `<host>.local` in an mDNS response
///
/// Returns `None` for queries, truncated packets and responses about other
/// hosts, so callers can keep listening.
pub fn parse_a_record(packet: &[u8], host: &str) -> Option<Ipv4Addr> {
    let name = local_name(host).ok()?;
    let message = Message::from_octets(packet).ok()?;
    if !message.header().qr() {
        return None;
    }

    let answers = message.answer().ok()?.limit_to::<A>();
    let additional = message
        .additional()
        .into_iter()
        .flat_map(|section| section.limit_to::<A>());

    answers
        .chain(additional)
        .map_while(Result::ok)
        .find(|record| {
            record.class().to_int() & CLASS_MASK == CLASS_IN && record.owner().name_eq(&name)
        })
        .map(|record| Ipv4Addr::from(record.data().addr().octets()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_name(out: &mut std::vec::Vec<u8>, name: &str) {
        for label in name.split('.') {
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
        out.push(0);
    }

    fn record_header(out: &mut std::vec::Vec<u8>, rtype: u16, rdlen: u16) {
        out.extend_from_slice(&rtype.to_be_bytes());
        out.extend_from_slice(&0x8001u16.to_be_bytes()); // IN with cache flush
        out.extend_from_slice(&120u32.to_be_bytes());
        out.extend_from_slice(&rdlen.to_be_bytes());
    }

    /// Response with a PTR record, then an A record whose name is a pointer
    fn response(host: &str, ip: [u8; 4]) -> std::vec::Vec<u8> {
        let mut out = vec![0, 0, 0x84, 0, 0, 0, 0, 2, 0, 0, 0, 0];

        encode_name(&mut out, "_http._tcp.local");
        let target = std::format!("{}.local", host);
        let mut rdata = std::vec::Vec::new();
        encode_name(&mut rdata, &target);
        record_header(&mut out, 12, rdata.len() as u16);
        let target_offset = out.len();
        out.extend_from_slice(&rdata);

        out.push(0xc0);
        out.push(target_offset as u8);
        record_header(&mut out, 1, 4);
        out.extend_from_slice(&ip);
        out
    }

    const IDENTITY: &str = "24:0A:C4:12:AB:EF";

    #[test]
    fn query_layout() {
        let packet = encode_query(0, "influx").unwrap();
        let expected: &[u8] = &[
            0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, // header
            6, b'i', b'n', b'f', b'l', b'u', b'x', 5, b'l', b'o', b'c', b'a', b'l', 0,
            0, 1, // A
            0x80, 1, // IN, unicast response
        ];
        assert_eq!(packet.as_slice(), expected);
    }

    #[test]
    fn query_rejects_bad_labels() {
        assert_eq!(encode_query(0, "").unwrap_err(), MdnsError::InvalidName);
        assert_eq!(encode_query(0, "a..b").unwrap_err(), MdnsError::InvalidName);
        let long = "x".repeat(64);
        assert_eq!(encode_query(0, &long).unwrap_err(), MdnsError::InvalidName);
    }

    #[test]
    fn finds_compressed_a_record() {
        let packet = response("influx", [192, 168, 1, 50]);
        assert_eq!(
            parse_a_record(&packet, "influx"),
            Some(Ipv4Addr::new(192, 168, 1, 50))
        );
        assert_eq!(
            parse_a_record(&packet, "INFLUX"),
            Some(Ipv4Addr::new(192, 168, 1, 50))
        );
    }

    #[test]
    fn ignores_other_hosts_and_queries() {
        let packet = response("grafana", [192, 168, 1, 51]);
        assert_eq!(parse_a_record(&packet, "influx"), None);

        let query = encode_query(0, "influx").unwrap();
        assert_eq!(parse_a_record(&query, "influx"), None);
    }

    #[test]
    fn unspecified_answer_is_passed_through() {
        let packet = response("influx", [0, 0, 0, 0]);
        assert_eq!(parse_a_record(&packet, "influx"), Some(Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn truncated_packets_are_rejected() {
        let packet = response("influx", [192, 168, 1, 50]);
        for cut in 0..packet.len() {
            assert_eq!(parse_a_record(&packet[..cut], "influx"), None, "cut at {}", cut);
        }
    }

    #[test]
    fn answers_queries_for_own_identity() {
        let ip = Ipv4Addr::new(192, 168, 1, 77);
        let host = host_record(IDENTITY, ip);

        let query = encode_query(0x1234, IDENTITY).unwrap();
        let reply = answer_query(&query, &host).unwrap();
        assert_eq!(&reply[..2], &[0x12, 0x34]);
        assert_eq!(parse_a_record(&reply, IDENTITY), Some(ip));
        assert_eq!(parse_a_record(&reply, "24:0a:c4:12:ab:ef"), Some(ip));
    }

    #[test]
    fn stays_quiet_for_other_names_and_responses() {
        let host = host_record(IDENTITY, Ipv4Addr::new(192, 168, 1, 77));

        let other = encode_query(0, "influx").unwrap();
        assert_eq!(answer_query(&other, &host), None);

        let response = response(IDENTITY, [10, 0, 0, 1]);
        assert_eq!(answer_query(&response, &host), None);
        assert_eq!(answer_query(&[0, 0, 0], &host), None);
    }

    #[test]
    fn announcement_carries_the_host_address() {
        let ip = Ipv4Addr::new(10, 0, 0, 9);
        let packet = encode_announcement(&host_record(IDENTITY, ip)).unwrap();
        assert_eq!(parse_a_record(&packet, IDENTITY), Some(ip));
        assert_eq!(parse_a_record(&packet, "influx"), None);
    }
}
