use pnet::packet::tcp::{TcpFlags, TcpPacket};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TCPHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence_number: u32,
    pub acknowledgment_number: u32,
    pub data_offset: u8,
    pub flags: TCPFlags,
    pub window_size: u16,
    pub checksum: u16,
    pub urgent_pointer: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TCPFlags {
    pub cwr: bool,
    pub ece: bool,
    pub urg: bool,
    pub ack: bool,
    pub psh: bool,
    pub rst: bool,
    pub syn: bool,
    pub fin: bool,
}

impl TCPHeader {
    pub fn from_packet(packet: &TcpPacket) -> Self {
        let raw = packet.get_flags();
        let flags = TCPFlags {
            cwr: raw & TcpFlags::CWR != 0,
            ece: raw & TcpFlags::ECE != 0,
            urg: raw & TcpFlags::URG != 0,
            ack: raw & TcpFlags::ACK != 0,
            psh: raw & TcpFlags::PSH != 0,
            rst: raw & TcpFlags::RST != 0,
            syn: raw & TcpFlags::SYN != 0,
            fin: raw & TcpFlags::FIN != 0,
        };

        Self {
            source_port: packet.get_source(),
            destination_port: packet.get_destination(),
            sequence_number: packet.get_sequence(),
            acknowledgment_number: packet.get_acknowledgement(),
            data_offset: packet.get_data_offset(),
            flags,
            window_size: packet.get_window(),
            checksum: packet.get_checksum(),
            urgent_pointer: packet.get_urgent_ptr(),
        }
    }
}
