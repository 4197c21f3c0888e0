use crate::app::config::OutputFormat;
use crate::error::CaptureResult;
use crate::network::packet::Packet;
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use std::io::Write;

impl Packet {
    /// 1行の要約。イーサタイプとIPプロトコルで表示を切り替える
    pub fn summary(&self) -> String {
        let body = match &self.eth {
            Some(eth) if eth.is_ipv4() => self.ip_line("IP"),
            Some(eth) if eth.is_ipv6() => self.ip_line("IP6"),
            Some(eth) if eth.is_arp() => "ARP".to_string(),
            // リンク層ヘッダーのないキャプチャ
            None if self.ipv4.is_some() => self.ip_line("IP"),
            None if self.ipv6.is_some() => self.ip_line("IP6"),
            _ => "unknown".to_string(),
        };
        format!("{} {}", self.metadata.timestamp.format("%H:%M:%S%.6f"), body)
    }

    fn ip_line(&self, label: &str) -> String {
        let (src, dst) = match self.ip_addresses() {
            Some(addresses) => addresses,
            None => return format!("{} (truncated)", label),
        };
        let protocol = self
            .ip_protocol()
            .map(protocol_name)
            .unwrap_or_else(|| "unknown".to_string());

        format!(
            "{} {} > {} , {} length: {}",
            label, src, dst, protocol, self.payload_length
        )
    }

    pub fn to_json(&self) -> CaptureResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

pub fn protocol_name(protocol: IpNextHeaderProtocol) -> String {
    match protocol {
        IpNextHeaderProtocols::Tcp => "TCP".to_string(),
        IpNextHeaderProtocols::Udp => "UDP".to_string(),
        IpNextHeaderProtocols::Icmp => "ICMP".to_string(),
        IpNextHeaderProtocols::Icmpv6 => "ICMPv6".to_string(),
        other => format!("proto-{}", other.0),
    }
}

/// 出力形式に従ってパケットを書き出す
pub fn write_packet<W: Write>(out: &mut W, packet: &Packet, format: OutputFormat) -> CaptureResult<()> {
    match format {
        OutputFormat::Pretty => writeln!(out, "{}", packet.summary())?,
        OutputFormat::Json => writeln!(out, "{}", packet.to_json()?)?,
    }
    Ok(())
}
