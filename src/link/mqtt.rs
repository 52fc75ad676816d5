//! MQTT 3.1.1 packets, QoS 0 only.
//!
//! Just what a device that subscribes to one command topic and publishes
//! telemetry needs: CONNECT, SUBSCRIBE, PUBLISH, PINGREQ and DISCONNECT out,
//! CONNACK, SUBACK, PUBLISH and PINGRESP in.
use alloc::vec::Vec;
use log::warn;
use thiserror::Error;

use crate::config::Credentials;

const CONNECT: u8 = 0x10;
const CONNACK: u8 = 0x20;
const PUBLISH: u8 = 0x30;
const SUBSCRIBE: u8 = 0x82;
const SUBACK: u8 = 0x90;
const PINGREQ: u8 = 0xC0;
const PINGRESP: u8 = 0xD0;
const DISCONNECT: u8 = 0xE0;

const PROTOCOL_LEVEL: u8 = 4;
const CLEAN_SESSION: u8 = 0x02;
const PASSWORD_FLAG: u8 = 0x40;
const USERNAME_FLAG: u8 = 0x80;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MqttError {
    #[error("remaining length is longer than 4 bytes")]
    MalformedLength,

    #[error("packet body is shorter than its fields")]
    Malformed,

    #[error("topic is not valid utf-8")]
    InvalidUtf8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet<'a> {
    ConnAck { session_present: bool, return_code: u8 },
    SubAck { packet_id: u16, granted_qos: u8 },
    Publish { topic: &'a str, payload: &'a [u8] },
    PingResp,
    /// Anything else the broker may send; carries the packet type nibble.
    Other(u8),
}

fn put_len(buf: &mut Vec<u8>, mut len: usize) {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if len == 0 {
            break;
        }
    }
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_bytes(buf, s.as_bytes());
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    buf.extend_from_slice(bytes);
}

fn frame(header: u8, body: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(body.len() + 5);
    packet.push(header);
    put_len(&mut packet, body.len());
    packet.extend_from_slice(body);
    packet
}

pub fn connect(client_id: &str, credentials: Option<&Credentials>, keep_alive_secs: u16) -> Vec<u8> {
    let mut body = Vec::new();
    put_str(&mut body, "MQTT");
    body.push(PROTOCOL_LEVEL);
    let mut flags = CLEAN_SESSION;
    if credentials.is_some() {
        flags |= USERNAME_FLAG | PASSWORD_FLAG;
    }
    body.push(flags);
    body.extend_from_slice(&keep_alive_secs.to_be_bytes());
    put_str(&mut body, client_id);
    if let Some(c) = credentials {
        put_str(&mut body, &c.username);
        put_bytes(&mut body, c.password.as_bytes());
    }
    frame(CONNECT, &body)
}

pub fn subscribe(packet_id: u16, topic: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&packet_id.to_be_bytes());
    put_str(&mut body, topic);
    body.push(0); // QoS 0
    frame(SUBSCRIBE, &body)
}

pub fn publish(topic: &str, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(topic.len() + payload.len() + 2);
    put_str(&mut body, topic);
    body.extend_from_slice(payload);
    frame(PUBLISH, &body)
}

pub fn pingreq() -> [u8; 2] {
    [PINGREQ, 0]
}

pub fn disconnect() -> [u8; 2] {
    [DISCONNECT, 0]
}

/// Decodes the remaining-length varint at the start of `buf`.
/// `Ok(None)` means more bytes are needed.
fn take_len(buf: &[u8]) -> Result<Option<(usize, usize)>, MqttError> {
    let mut len = 0usize;
    for (i, &byte) in buf.iter().enumerate() {
        if i == 4 {
            return Err(MqttError::MalformedLength);
        }
        len += ((byte & 0x7F) as usize) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(Some((len, i + 1)));
        }
    }
    if buf.len() >= 4 {
        return Err(MqttError::MalformedLength);
    }
    Ok(None)
}

fn be_u16(bytes: &[u8]) -> Result<u16, MqttError> {
    match bytes {
        [hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => Err(MqttError::Malformed),
    }
}

/// Total size of the packet at the start of `buf`, known as soon as its
/// fixed header is complete.
pub fn frame_len(buf: &[u8]) -> Result<Option<usize>, MqttError> {
    let Some(rest) = buf.get(1..) else {
        return Ok(None);
    };
    Ok(take_len(rest)?.map(|(len, len_bytes)| 1 + len_bytes + len))
}

/// Reassembles packets from socket reads.
///
/// Packets longer than `limit` are never buffered: their bytes are
/// discarded as they arrive and the stream resumes at the next packet.
#[derive(Debug)]
pub struct PacketBuffer {
    pending: Vec<u8>,
    skip: usize,
    limit: usize,
}

impl PacketBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            skip: 0,
            limit,
        }
    }

    /// Bytes held for a packet that is not complete yet.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    pub fn extend(&mut self, mut bytes: &[u8]) {
        if self.skip > 0 {
            let n = self.skip.min(bytes.len());
            self.skip -= n;
            bytes = &bytes[n..];
        }
        self.pending.extend_from_slice(bytes);
    }

    /// Hands every complete packet to `on_packet`, in order.
    pub fn drain<F>(&mut self, mut on_packet: F) -> Result<(), MqttError>
    where
        F: FnMut(Packet<'_>),
    {
        let mut used = 0;
        let result = loop {
            let rest = &self.pending[used..];
            match frame_len(rest) {
                Ok(Some(len)) if len > self.limit => {
                    warn!("[NET] skipping {len} byte packet, limit is {}", self.limit);
                    let held = rest.len().min(len);
                    used += held;
                    self.skip = len - held;
                    continue;
                }
                Ok(_) => {}
                Err(e) => break Err(e),
            }
            match decode(rest) {
                Ok(Some((packet, len))) => {
                    used += len;
                    on_packet(packet);
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.pending.drain(..used);
        result
    }
}

/// Decodes the first complete packet in `buf`.
///
/// Returns the packet and the number of bytes it used, or `Ok(None)` when
/// `buf` holds only part of a packet.
pub fn decode(buf: &[u8]) -> Result<Option<(Packet<'_>, usize)>, MqttError> {
    let Some(&header) = buf.first() else {
        return Ok(None);
    };
    let Some((len, len_bytes)) = take_len(&buf[1..])? else {
        return Ok(None);
    };
    let start = 1 + len_bytes;
    let end = start + len;
    if buf.len() < end {
        return Ok(None);
    }
    let body = &buf[start..end];

    let packet = match header & 0xF0 {
        CONNACK => match body {
            [ack_flags, code, ..] => Packet::ConnAck {
                session_present: ack_flags & 0x01 != 0,
                return_code: *code,
            },
            _ => return Err(MqttError::Malformed),
        },
        SUBACK => Packet::SubAck {
            packet_id: be_u16(body)?,
            granted_qos: *body.get(2).ok_or(MqttError::Malformed)?,
        },
        PUBLISH => {
            let topic_len = be_u16(body)? as usize;
            let topic_end = 2 + topic_len;
            let topic = body.get(2..topic_end).ok_or(MqttError::Malformed)?;
            let topic = core::str::from_utf8(topic).map_err(|_| MqttError::InvalidUtf8)?;
            // QoS 1 and 2 carry a packet id before the payload
            let qos = (header >> 1) & 0x03;
            let payload_start = if qos > 0 { topic_end + 2 } else { topic_end };
            let payload = body.get(payload_start..).ok_or(MqttError::Malformed)?;
            Packet::Publish { topic, payload }
        }
        PINGRESP => Packet::PingResp,
        other => Packet::Other(other >> 4),
    };
    Ok(Some((packet, end)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_without_credentials() {
        let packet = connect("hand", None, 60);
        assert_eq!(
            packet,
            [
                0x10, 16, // header, remaining length
                0, 4, b'M', b'Q', b'T', b'T', 4, 0x02, 0, 60, // variable header
                0, 4, b'h', b'a', b'n', b'd',
            ]
        );
    }

    #[test]
    fn connect_with_credentials_sets_flags() {
        let creds = Credentials::new("u", "pw");
        let packet = connect("id", Some(&creds), 30);
        assert_eq!(packet[9], 0x02 | 0x80 | 0x40);
        assert!(packet.ends_with(&[0, 1, b'u', 0, 2, b'p', b'w']));
        assert_eq!(packet[1] as usize, packet.len() - 2);
    }

    #[test]
    fn subscribe_requests_qos0() {
        assert_eq!(
            subscribe(7, "a/b"),
            [0x82, 8, 0, 7, 0, 3, b'a', b'/', b'b', 0]
        );
    }

    #[test]
    fn long_publish_uses_multibyte_length() {
        let payload = [b'x'; 200];
        let packet = publish("t", &payload);
        // 3 bytes of topic + 200 of payload = 203 = 0xCB 0x01
        assert_eq!(&packet[..3], &[0x30, 0xCB, 0x01]);
        assert_eq!(packet.len(), 3 + 203);

        let (decoded, used) = decode(&packet).unwrap().unwrap();
        assert_eq!(used, packet.len());
        assert_eq!(
            decoded,
            Packet::Publish {
                topic: "t",
                payload: &payload
            }
        );
    }

    #[test]
    fn decodes_broker_packets() {
        assert_eq!(
            decode(&[0x20, 2, 0, 0]).unwrap(),
            Some((
                Packet::ConnAck {
                    session_present: false,
                    return_code: 0
                },
                4
            ))
        );
        assert_eq!(
            decode(&[0x90, 3, 0, 1, 0]).unwrap(),
            Some((
                Packet::SubAck {
                    packet_id: 1,
                    granted_qos: 0
                },
                5
            ))
        );
        assert_eq!(decode(&[0xD0, 0]).unwrap(), Some((Packet::PingResp, 2)));
        assert_eq!(decode(&[0xB0, 2, 0, 1]).unwrap(), Some((Packet::Other(0xB), 4)));
    }

    #[test]
    fn qos1_publish_skips_packet_id() {
        let packet = [0x32, 7, 0, 1, b't', 0, 9, b'o', b'k'];
        let (decoded, _) = decode(&packet).unwrap().unwrap();
        assert_eq!(
            decoded,
            Packet::Publish {
                topic: "t",
                payload: b"ok"
            }
        );
    }

    #[test]
    fn partial_input_needs_more_bytes() {
        let packet = publish("robohand/x/cmd/servo", br#"{"gesture":"fist"}"#);
        assert_eq!(decode(&[]).unwrap(), None);
        assert_eq!(decode(&packet[..1]).unwrap(), None);
        assert_eq!(decode(&packet[..packet.len() - 1]).unwrap(), None);

        let mut two = packet.clone();
        two.extend_from_slice(&[0xD0, 0]);
        let (_, used) = decode(&two).unwrap().unwrap();
        assert_eq!(decode(&two[used..]).unwrap(), Some((Packet::PingResp, 2)));
    }

    #[test]
    fn rejects_malformed_packets() {
        assert_eq!(
            decode(&[0x30, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
            Err(MqttError::MalformedLength)
        );
        assert_eq!(decode(&[0x20, 1, 0]), Err(MqttError::Malformed));
        assert_eq!(
            decode(&[0x30, 4, 0, 2, 0xFF, 0xFE]),
            Err(MqttError::InvalidUtf8)
        );
        assert_eq!(decode(&[0x30, 3, 0, 9, b'a']), Err(MqttError::Malformed));
    }

    #[test]
    fn frame_len_is_known_before_the_body() {
        assert_eq!(frame_len(&[]), Ok(None));
        assert_eq!(frame_len(&[0x30]), Ok(None));
        assert_eq!(frame_len(&[0x30, 0xCB]), Ok(None));
        assert_eq!(frame_len(&[0x30, 0xCB, 0x01]), Ok(Some(206)));
        assert_eq!(frame_len(&[0x30, 0xFF, 0xFF, 0xFF, 0x7F]), Ok(Some(268_435_460)));
    }

    #[test]
    fn buffer_reassembles_split_packets() {
        let packet = publish("t", b"hello");
        let mut buffer = PacketBuffer::new(64);
        let mut seen = Vec::new();

        buffer.extend(&packet[..4]);
        buffer.drain(|p| seen.push(format!("{p:?}"))).unwrap();
        assert!(seen.is_empty());
        assert_eq!(buffer.buffered(), 4);

        buffer.extend(&packet[4..]);
        buffer.extend(&[0xD0, 0]);
        buffer.drain(|p| seen.push(format!("{p:?}"))).unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].contains("PingResp"));
        assert_eq!(buffer.buffered(), 0);
    }

    #[test]
    fn oversized_packets_are_skipped_without_buffering() {
        let mut buffer = PacketBuffer::new(64);
        let big = publish("robohand/x/cmd/servo", &[b'x'; 4_000]);
        let small = publish("robohand/x/cmd/servo", br#"{"gesture":"fist"}"#);
        let mut delivered = 0;

        for chunk in big.chunks(100) {
            buffer.extend(chunk);
            buffer.drain(|_| delivered += 1).unwrap();
            assert!(buffer.buffered() <= 64);
        }
        buffer.extend(&small);
        let mut payloads = Vec::new();
        buffer
            .drain(|p| {
                if let Packet::Publish { payload, .. } = p {
                    payloads.push(payload.to_vec());
                }
            })
            .unwrap();

        assert_eq!(delivered, 0);
        assert_eq!(payloads, [br#"{"gesture":"fist"}"#.to_vec()]);
        assert_eq!(buffer.buffered(), 0);
    }

    #[test]
    fn oversized_header_in_the_same_read_as_a_small_packet() {
        let mut buffer = PacketBuffer::new(16);
        let mut stream = publish("t", &[0u8; 40]);
        stream.extend_from_slice(&[0xD0, 0]);

        buffer.extend(&stream);
        let mut seen = Vec::new();
        buffer.drain(|p| seen.push(p == Packet::PingResp)).unwrap();
        assert_eq!(seen, [true]);
    }
}
