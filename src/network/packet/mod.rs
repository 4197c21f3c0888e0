pub mod ethernet;
pub mod ipv4;
pub mod ipv6;
pub mod tcp;
pub mod udp;

use crate::error::DecodeError;
use crate::network::packet::ethernet::EthernetHeader;
use crate::network::packet::ipv4::IPv4Header;
use crate::network::packet::ipv6::IPv6Header;
use crate::network::packet::tcp::TCPHeader;
use crate::network::packet::udp::UDPHeader;
use crate::network::resolver::HostResolver;
use chrono::{DateTime, Utc};
use log::warn;
use pnet::packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::vlan::VlanPacket;
use pnet::packet::Packet as PnetPacket;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// キャプチャハンドルのリンク層の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Ethernet,
    /// リンク層ヘッダーなしでIPから始まるフレーム
    RawIp,
    /// Linux cooked capture v1 (`any` デバイスなど)
    LinuxSll,
    LinuxSll2,
    /// BSDループバック。先頭4バイトがアドレスファミリ
    Loopback,
    Unsupported(i32),
}

const SLL_HEADER_LEN: usize = 16;
const SLL_PROTOCOL_OFFSET: usize = 14;
const SLL2_HEADER_LEN: usize = 20;
const LOOPBACK_HEADER_LEN: usize = 4;

// ループバックヘッダーのアドレスファミリ (OSごとにAF_INET6の値が異なる)
const AF_INET: u32 = 2;
const AF_INET6_LINUX: u32 = 10;
const AF_INET6_BSD: u32 = 24;
const AF_INET6_FREEBSD: u32 = 28;
const AF_INET6_DARWIN: u32 = 30;

/// 1フレーム分のデコード結果。存在しないレイヤーのフィールドは未設定のまま
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub eth: Option<EthernetHeader>,
    pub ipv4: Option<IPv4Header>,
    pub ipv6: Option<IPv6Header>,
    pub tcp: Option<TCPHeader>,
    pub udp: Option<UDPHeader>,
    pub src_host: Vec<String>,
    pub dst_host: Vec<String>,
    pub payload: String,
    /// 変換前のペイロードのバイト数
    pub payload_length: usize,
    pub metadata: PacketMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PacketMetadata {
    pub timestamp: DateTime<Utc>,
    pub interface: String,
    /// ワイヤ上の長さ
    pub length: u32,
    /// 実際にキャプチャされた長さ (スナップ長で切り詰められる)
    pub captured_length: u32,
}

impl Packet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ip_addresses(&self) -> Option<(IpAddr, IpAddr)> {
        if let Some(ipv4) = &self.ipv4 {
            return Some((IpAddr::V4(ipv4.source), IpAddr::V4(ipv4.destination)));
        }
        self.ipv6
            .as_ref()
            .map(|ipv6| (IpAddr::V6(ipv6.source), IpAddr::V6(ipv6.destination)))
    }

    pub fn ip_protocol(&self) -> Option<IpNextHeaderProtocol> {
        match (&self.ipv4, &self.ipv6) {
            (Some(ipv4), _) => Some(ipv4.next_protocol()),
            (None, Some(ipv6)) => Some(ipv6.next_protocol()),
            (None, None) => None,
        }
    }
}

/// フレームの各レイヤーをデコードし、パケット情報を組み立てる
///
/// デコードエラーはログに出力するだけで、途中まで埋まった結果をそのまま返す。
pub fn get_packet_info(
    link: LinkType,
    data: &[u8],
    metadata: PacketMetadata,
    resolver: &mut dyn HostResolver,
) -> Packet {
    let (mut packet, errors) = decode_layers(link, data);
    for e in &errors {
        warn!("パケットの一部のデコードに失敗しました: {}", e);
    }

    packet.metadata = metadata;

    if let Some((src, dst)) = packet.ip_addresses() {
        packet.src_host = resolver.lookup(src);
        packet.dst_host = resolver.lookup(dst);
    }

    packet
}

/// 名前解決を行わないデコード処理
pub fn decode_layers(link: LinkType, data: &[u8]) -> (Packet, Vec<DecodeError>) {
    let mut packet = Packet::new();
    let mut errors = Vec::new();

    match link {
        LinkType::Ethernet => decode_ethernet(data, &mut packet, &mut errors),
        LinkType::RawIp => decode_raw_ip(data, &mut packet, &mut errors),
        LinkType::LinuxSll => {
            if data.len() < SLL_HEADER_LEN {
                errors.push(DecodeError::TruncatedLinuxSll(data.len()));
            } else {
                let protocol = u16::from_be_bytes([data[SLL_PROTOCOL_OFFSET], data[SLL_PROTOCOL_OFFSET + 1]]);
                decode_network(EtherType(protocol), &data[SLL_HEADER_LEN..], &mut packet, &mut errors);
            }
        }
        LinkType::LinuxSll2 => {
            if data.len() < SLL2_HEADER_LEN {
                errors.push(DecodeError::TruncatedLinuxSll(data.len()));
            } else {
                let protocol = u16::from_be_bytes([data[0], data[1]]);
                decode_network(EtherType(protocol), &data[SLL2_HEADER_LEN..], &mut packet, &mut errors);
            }
        }
        LinkType::Loopback => decode_loopback(data, &mut packet, &mut errors),
        LinkType::Unsupported(code) => errors.push(DecodeError::UnsupportedLinkType(code)),
    }

    (packet, errors)
}

fn decode_raw_ip(data: &[u8], packet: &mut Packet, errors: &mut Vec<DecodeError>) {
    match data.first().map(|b| b >> 4) {
        Some(4) => decode_ipv4(data, packet, errors),
        Some(6) => decode_ipv6(data, packet, errors),
        Some(version) => errors.push(DecodeError::InvalidIpVersion(version)),
        None => errors.push(DecodeError::TruncatedIpv4(0)),
    }
}

fn decode_loopback(data: &[u8], packet: &mut Packet, errors: &mut Vec<DecodeError>) {
    if data.len() < LOOPBACK_HEADER_LEN {
        errors.push(DecodeError::TruncatedLoopback(data.len()));
        return;
    }

    // キャプチャしたホストのバイトオーダーで書かれている
    let header = [data[0], data[1], data[2], data[3]];
    let family = if header[0] == 0 && header[1] == 0 {
        u32::from_be_bytes(header)
    } else {
        u32::from_le_bytes(header)
    };

    let payload = &data[LOOPBACK_HEADER_LEN..];
    match family {
        AF_INET => decode_ipv4(payload, packet, errors),
        AF_INET6_LINUX | AF_INET6_BSD | AF_INET6_FREEBSD | AF_INET6_DARWIN => decode_ipv6(payload, packet, errors),
        other => errors.push(DecodeError::UnknownAddressFamily(other)),
    }
}

fn decode_ethernet(data: &[u8], packet: &mut Packet, errors: &mut Vec<DecodeError>) {
    let ethernet = match EthernetPacket::new(data) {
        Some(ethernet) => ethernet,
        None => {
            errors.push(DecodeError::TruncatedEthernet(data.len()));
            return;
        }
    };

    let mut header = EthernetHeader::from_packet(&ethernet);

    // 802.1Qタグは1段だけ外す
    if ethernet.get_ethertype() == EtherTypes::Vlan {
        match VlanPacket::new(ethernet.payload()) {
            Some(vlan) => {
                header.vlan_id = Some(vlan.get_vlan_identifier());
                header.ethertype = vlan.get_ethertype().0;
                packet.eth = Some(header);
                decode_network(vlan.get_ethertype(), vlan.payload(), packet, errors);
            }
            None => {
                errors.push(DecodeError::TruncatedVlan(ethernet.payload().len()));
                packet.eth = Some(header);
            }
        }
        return;
    }

    packet.eth = Some(header);
    decode_network(ethernet.get_ethertype(), ethernet.payload(), packet, errors);
}

fn decode_network(ethertype: EtherType, data: &[u8], packet: &mut Packet, errors: &mut Vec<DecodeError>) {
    match ethertype {
        EtherTypes::Ipv4 => decode_ipv4(data, packet, errors),
        EtherTypes::Ipv6 => decode_ipv6(data, packet, errors),
        _ => {}
    }
}

fn decode_ipv4(data: &[u8], packet: &mut Packet, errors: &mut Vec<DecodeError>) {
    let ip = match Ipv4Packet::new(data) {
        Some(ip) => ip,
        None => {
            errors.push(DecodeError::TruncatedIpv4(data.len()));
            return;
        }
    };

    if ip.get_version() != 4 {
        errors.push(DecodeError::InvalidIpVersion(ip.get_version()));
        return;
    }
    if ip.get_header_length() < 5 {
        errors.push(DecodeError::InvalidIpv4HeaderLength(ip.get_header_length()));
        return;
    }
    if ip.get_header_length() as usize * 4 > data.len() {
        errors.push(DecodeError::TruncatedIpv4(data.len()));
        return;
    }

    let header = IPv4Header::from_packet(&ip);
    let first_fragment = header.fragment_offset == 0;
    packet.ipv4 = Some(header);

    // 先頭以外のフラグメントにはトランスポートヘッダーがない
    if first_fragment {
        decode_transport(ip.get_next_level_protocol(), ip.payload(), packet, errors);
    }
}

fn decode_ipv6(data: &[u8], packet: &mut Packet, errors: &mut Vec<DecodeError>) {
    let ip = match Ipv6Packet::new(data) {
        Some(ip) => ip,
        None => {
            errors.push(DecodeError::TruncatedIpv6(data.len()));
            return;
        }
    };

    if ip.get_version() != 6 {
        errors.push(DecodeError::InvalidIpVersion(ip.get_version()));
        return;
    }

    packet.ipv6 = Some(IPv6Header::from_packet(&ip));
    decode_transport(ip.get_next_header(), ip.payload(), packet, errors);
}

fn decode_transport(
    protocol: IpNextHeaderProtocol,
    data: &[u8],
    packet: &mut Packet,
    errors: &mut Vec<DecodeError>,
) {
    match protocol {
        IpNextHeaderProtocols::Tcp => {
            let tcp = match TcpPacket::new(data) {
                Some(tcp) => tcp,
                None => {
                    errors.push(DecodeError::TruncatedTcp(data.len()));
                    return;
                }
            };
            let data_offset = tcp.get_data_offset();
            if data_offset < 5 {
                errors.push(DecodeError::InvalidTcpDataOffset(data_offset));
                return;
            }
            if data_offset as usize * 4 > data.len() {
                errors.push(DecodeError::TruncatedTcp(data.len()));
                return;
            }
            packet.tcp = Some(TCPHeader::from_packet(&tcp));
            set_payload(packet, tcp.payload());
        }
        IpNextHeaderProtocols::Udp => {
            let udp = match UdpPacket::new(data) {
                Some(udp) => udp,
                None => {
                    errors.push(DecodeError::TruncatedUdp(data.len()));
                    return;
                }
            };
            packet.udp = Some(UDPHeader::from_packet(&udp));
            set_payload(packet, udp.payload());
        }
        _ => {}
    }
}

fn set_payload(packet: &mut Packet, payload: &[u8]) {
    if !payload.is_empty() {
        packet.payload = String::from_utf8_lossy(payload).into_owned();
        packet.payload_length = payload.len();
    }
}
