use crate::app::config::CaptureConfig;
use crate::error::{CaptureError, CaptureResult};
use crate::network::capture::{is_end_of_capture, is_timeout, FrameSource, PacketCapture};
use crate::network::packet::{get_packet_info, Packet};
use crate::network::resolver::HostResolver;
use log::{debug, info, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// キャプチャループとデコード結果の受け渡しチャネルの容量
pub const CHANNEL_CAPACITY: usize = 1;

/// バックグラウンドでキャプチャを回し、デコード済みパケットをチャネルに流す
pub struct PacketPipeline {
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<u64>>,
}

impl PacketPipeline {
    /// キャプチャハンドルを開いてループを開始する
    ///
    /// ハンドルのオープンに失敗した場合はループを開始せずにエラーを返す。
    pub fn open(
        config: &CaptureConfig,
        device: Option<&str>,
        resolver: Box<dyn HostResolver>,
    ) -> CaptureResult<(Self, mpsc::Receiver<Packet>)> {
        let capture = PacketCapture::open(config, device)?;
        Ok(Self::start(Box::new(capture), resolver, config.max_packets))
    }

    pub fn start(
        source: Box<dyn FrameSource>,
        resolver: Box<dyn HostResolver>,
        max_packets: Option<u64>,
    ) -> (Self, mpsc::Receiver<Packet>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let running = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&running);
        let task = tokio::task::spawn_blocking(move || capture_loop(source, resolver, tx, flag, max_packets));

        (
            Self {
                running,
                task: Some(task),
            },
            rx,
        )
    }

    /// ループの停止を要求する。次の読み込み後にハンドルとチャネルが閉じられる
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("キャプチャの停止を要求しました");
        }
    }

    /// ループの終了を待ち、送出したパケット数を返す
    pub async fn join(mut self) -> CaptureResult<u64> {
        match self.task.take() {
            Some(task) => task.await.map_err(|e| CaptureError::Task(e.to_string())),
            None => Ok(0),
        }
    }
}

fn capture_loop(
    mut source: Box<dyn FrameSource>,
    mut resolver: Box<dyn HostResolver>,
    tx: mpsc::Sender<Packet>,
    running: Arc<AtomicBool>,
    max_packets: Option<u64>,
) -> u64 {
    let link_type = source.link_type();
    let mut sent = 0u64;

    while running.load(Ordering::SeqCst) {
        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) if is_end_of_capture(&e) => {
                info!("キャプチャの終端に達しました");
                break;
            }
            Err(e) if is_timeout(&e) => {
                trace!("読み込みタイムアウト");
                continue;
            }
            Err(e) => {
                debug!("パケットの読み取りをスキップしました: {}", e);
                continue;
            }
        };

        let packet = get_packet_info(link_type, &frame.data, frame.metadata, resolver.as_mut());
        if tx.blocking_send(packet).is_err() {
            debug!("受信側が閉じられたためキャプチャを終了します");
            break;
        }

        sent += 1;
        if max_packets.is_some_and(|limit| sent >= limit) {
            info!("{} パケットのキャプチャ上限に達しました", sent);
            break;
        }
    }

    running.store(false, Ordering::SeqCst);

    if let Some(stats) = source.stats() {
        info!(
            "キャプチャ統計: received={} dropped={} if_dropped={}",
            stats.received, stats.dropped, stats.if_dropped
        );
    }
    info!("キャプチャループを終了しました ({} パケット)", sent);

    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::capture::{CaptureStats, Frame};
    use crate::network::packet::tests::{ipv4_tcp_frame, FixedResolver};
    use crate::network::packet::{LinkType, PacketMetadata};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    enum Step {
        Frame(Vec<u8>),
        Timeout,
        Failure,
    }

    /// 事前に用意した結果を順番に返し、尽きたら終端を返す
    struct ScriptedSource {
        steps: VecDeque<Step>,
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> CaptureResult<Frame> {
            match self.steps.pop_front() {
                Some(Step::Frame(data)) => Ok(Frame {
                    metadata: PacketMetadata {
                        length: data.len() as u32,
                        captured_length: data.len() as u32,
                        ..Default::default()
                    },
                    data,
                }),
                Some(Step::Timeout) => Err(CaptureError::Pcap(pcap::Error::TimeoutExpired)),
                Some(Step::Failure) => Err(CaptureError::Pcap(pcap::Error::PcapError("read failed".to_string()))),
                None => Err(CaptureError::Pcap(pcap::Error::NoMorePackets)),
            }
        }

        fn link_type(&self) -> LinkType {
            LinkType::Ethernet
        }

        fn stats(&mut self) -> Option<CaptureStats> {
            None
        }
    }

    /// 停止されるまで同じフレームを返し続ける
    struct EndlessSource {
        reads: Arc<AtomicUsize>,
    }

    impl FrameSource for EndlessSource {
        fn next_frame(&mut self) -> CaptureResult<Frame> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(Frame {
                data: ipv4_tcp_frame(b"loop"),
                metadata: PacketMetadata::default(),
            })
        }

        fn link_type(&self) -> LinkType {
            LinkType::Ethernet
        }

        fn stats(&mut self) -> Option<CaptureStats> {
            Some(CaptureStats {
                received: 0,
                dropped: 0,
                if_dropped: 0,
            })
        }
    }

    #[tokio::test]
    async fn test_read_errors_are_skipped() {
        let source = ScriptedSource {
            steps: VecDeque::from(vec![
                Step::Timeout,
                Step::Frame(ipv4_tcp_frame(b"first")),
                Step::Failure,
                Step::Timeout,
                Step::Frame(ipv4_tcp_frame(b"second")),
            ]),
        };
        let (pipeline, mut rx) = PacketPipeline::start(Box::new(source), Box::new(FixedResolver), None);

        let mut payloads = Vec::new();
        while let Some(packet) = rx.recv().await {
            assert!(packet.tcp.is_some());
            payloads.push(packet.payload);
        }

        assert_eq!(payloads, vec!["first".to_string(), "second".to_string()]);
        assert_eq!(pipeline.join().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_stop_closes_the_channel() {
        let reads = Arc::new(AtomicUsize::new(0));
        let source = EndlessSource {
            reads: Arc::clone(&reads),
        };
        let (pipeline, mut rx) = PacketPipeline::start(Box::new(source), Box::new(FixedResolver), None);

        let first = rx.recv().await.expect("最初のパケットが届きません");
        assert_eq!(first.payload, "loop");

        pipeline.stop();

        // 停止後はチャネルが閉じるまで残りを読み捨てる
        let mut drained = 0;
        while rx.recv().await.is_some() {
            drained += 1;
        }
        assert!(drained <= CHANNEL_CAPACITY + 1);

        let sent = pipeline.join().await.unwrap();
        assert!(sent >= 1);
        assert!(reads.load(Ordering::SeqCst) as u64 >= sent);
    }

    #[tokio::test]
    async fn test_max_packets_limit() {
        let source = EndlessSource {
            reads: Arc::new(AtomicUsize::new(0)),
        };
        let (pipeline, mut rx) = PacketPipeline::start(Box::new(source), Box::new(FixedResolver), Some(3));

        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }

        assert_eq!(received, 3);
        assert_eq!(pipeline.join().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_dropping_receiver_ends_loop() {
        let source = EndlessSource {
            reads: Arc::new(AtomicUsize::new(0)),
        };
        let (pipeline, rx) = PacketPipeline::start(Box::new(source), Box::new(FixedResolver), None);
        drop(rx);

        // バッファに入った1件を除き送出できない
        let sent = pipeline.join().await.unwrap();
        assert!(sent <= CHANNEL_CAPACITY as u64);
    }
}
