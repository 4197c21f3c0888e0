use pnet::packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use pnet::util::MacAddr;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthernetHeader {
    pub source: [u8; 6],
    pub destination: [u8; 6],
    /// VLANタグがある場合は内側のイーサタイプ
    pub ethertype: u16,
    pub vlan_id: Option<u16>,
}

impl EthernetHeader {
    pub fn from_packet(packet: &EthernetPacket) -> Self {
        Self {
            source: mac_octets(packet.get_source()),
            destination: mac_octets(packet.get_destination()),
            ethertype: packet.get_ethertype().0,
            vlan_id: None,
        }
    }

    pub fn ether_type(&self) -> EtherType {
        EtherType(self.ethertype)
    }

    pub fn is_ipv4(&self) -> bool {
        self.ether_type() == EtherTypes::Ipv4
    }

    pub fn is_ipv6(&self) -> bool {
        self.ether_type() == EtherTypes::Ipv6
    }

    pub fn is_arp(&self) -> bool {
        self.ether_type() == EtherTypes::Arp
    }
}

fn mac_octets(mac: MacAddr) -> [u8; 6] {
    [mac.0, mac.1, mac.2, mac.3, mac.4, mac.5]
}
