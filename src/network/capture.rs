use crate::app::config::CaptureConfig;
use crate::error::{CaptureError, CaptureResult};
use crate::network::packet::{LinkType, PacketMetadata};
use chrono::{DateTime, Utc};
use log::{info, warn};
use pcap::{Activated, Capture, Linktype};
use std::path::Path;

// リンク層ヘッダーなしでIPから始まるリンクタイプ
const DLT_RAW_BSD: i32 = 12;
const DLT_RAW_OPENBSD: i32 = 14;
const LINKTYPE_RAW: i32 = 101;
const LINKTYPE_IPV4: i32 = 228;
const LINKTYPE_IPV6: i32 = 229;

const LINKTYPE_NULL: i32 = 0;
const LINKTYPE_LOOP: i32 = 108;
const LINKTYPE_LINUX_SLL: i32 = 113;
const LINKTYPE_LINUX_SLL2: i32 = 276;

/// キャプチャされた1フレーム
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub metadata: PacketMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStats {
    pub received: u32,
    pub dropped: u32,
    pub if_dropped: u32,
}

/// 生フレームの供給元
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> CaptureResult<Frame>;
    fn link_type(&self) -> LinkType;
    fn stats(&mut self) -> Option<CaptureStats>;
}

pub struct PacketCapture {
    handle: Capture<dyn Activated>,
    interface: String,
    link_type: LinkType,
    live: bool,
}

impl PacketCapture {
    pub fn open_live(device: &str, config: &CaptureConfig) -> CaptureResult<Self> {
        let handle = Capture::from_device(device)?
            .snaplen(config.snaplen)
            .promisc(config.promiscuous)
            .timeout(config.timeout_ms)
            .open()?;

        info!(
            "キャプチャを開始しました: device={} snaplen={} promiscuous={} timeout={}ms",
            device, config.snaplen, config.promiscuous, config.timeout_ms
        );
        Self::with_handle(handle.into(), device.to_string(), &config.filter, true)
    }

    pub fn open_file(path: &Path, filter: &str) -> CaptureResult<Self> {
        let handle = Capture::from_file(path)?;
        info!("pcapファイルを読み込みます: {}", path.display());
        Self::with_handle(handle.into(), path.display().to_string(), filter, false)
    }

    pub fn open(config: &CaptureConfig, device: Option<&str>) -> CaptureResult<Self> {
        match (&config.read_file, device) {
            (Some(path), _) => Self::open_file(path, &config.filter),
            (None, Some(device)) => Self::open_live(device, config),
            (None, None) => Err(CaptureError::Config(
                "キャプチャするデバイスが指定されていません".to_string(),
            )),
        }
    }

    fn with_handle(
        mut handle: Capture<dyn Activated>,
        interface: String,
        filter: &str,
        live: bool,
    ) -> CaptureResult<Self> {
        if !filter.trim().is_empty() {
            handle.filter(filter, true)?;
            info!("BPFフィルタを設定しました: {}", filter);
        }

        let link_type = link_type_of(handle.get_datalink());
        if let LinkType::Unsupported(code) = link_type {
            warn!("未対応のリンクタイプです ({})。レイヤーはデコードされません", code);
        }

        Ok(Self {
            handle,
            interface,
            link_type,
            live,
        })
    }
}

impl FrameSource for PacketCapture {
    fn next_frame(&mut self) -> CaptureResult<Frame> {
        let packet = self.handle.next_packet()?;
        let ts = packet.header.ts;
        let timestamp = DateTime::<Utc>::from_timestamp(ts.tv_sec as i64, (ts.tv_usec as u32).saturating_mul(1000))
            .unwrap_or_default();

        Ok(Frame {
            data: packet.data.to_vec(),
            metadata: PacketMetadata {
                timestamp,
                interface: self.interface.clone(),
                length: packet.header.len,
                captured_length: packet.header.caplen,
            },
        })
    }

    fn link_type(&self) -> LinkType {
        self.link_type
    }

    fn stats(&mut self) -> Option<CaptureStats> {
        if !self.live {
            return None;
        }
        self.handle.stats().ok().map(|stat| CaptureStats {
            received: stat.received,
            dropped: stat.dropped,
            if_dropped: stat.if_dropped,
        })
    }
}

pub fn link_type_of(linktype: Linktype) -> LinkType {
    match linktype {
        Linktype::ETHERNET => LinkType::Ethernet,
        Linktype(LINKTYPE_RAW | LINKTYPE_IPV4 | LINKTYPE_IPV6 | DLT_RAW_BSD | DLT_RAW_OPENBSD) => LinkType::RawIp,
        Linktype(LINKTYPE_LINUX_SLL) => LinkType::LinuxSll,
        Linktype(LINKTYPE_LINUX_SLL2) => LinkType::LinuxSll2,
        Linktype(LINKTYPE_NULL | LINKTYPE_LOOP) => LinkType::Loopback,
        Linktype(other) => LinkType::Unsupported(other),
    }
}

/// 読み込みの終端 (pcapファイルの末尾) かどうか
pub fn is_end_of_capture(error: &CaptureError) -> bool {
    matches!(error, CaptureError::Pcap(pcap::Error::NoMorePackets))
}

pub fn is_timeout(error: &CaptureError) -> bool {
    matches!(error, CaptureError::Pcap(pcap::Error::TimeoutExpired))
}
