use crate::app::{CaptureConfig, PacketPipeline};
use crate::error::CaptureError;
use crate::network::resolver::{DnsResolver, HostResolver, LiteralResolver};
use crate::printer::write_packet;
use crate::select_device::select_device;
use crate::setup_logger::setup_logger;
use log::{error, info, warn};
use std::io;

mod app;
mod error;
mod network;
mod printer;
mod select_device;
mod setup_logger;

#[tokio::main]
async fn main() -> Result<(), CaptureError> {
    let config = CaptureConfig::from_env()?;
    setup_logger(config.log_file.as_deref())?;

    // デバイスの選択 (pcapファイルを読む場合は不要)
    let device = match (&config.read_file, &config.device) {
        (Some(_), _) => None,
        (None, Some(device)) => Some(device.clone()),
        (None, None) => Some(select_device()?),
    };

    let resolver: Box<dyn HostResolver> = if config.resolve_hosts {
        Box::new(DnsResolver::new())
    } else {
        Box::new(LiteralResolver)
    };

    // オープンに失敗した場合はここで終了する
    let (pipeline, mut rx) = PacketPipeline::open(&config, device.as_deref(), resolver)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            result = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                match result {
                    Ok(()) => {
                        info!("割り込みを受信しました。キャプチャを停止します");
                        pipeline.stop();
                    }
                    Err(e) => warn!("シグナルハンドラの登録に失敗しました: {}", e),
                }
            }
            packet = rx.recv() => match packet {
                Some(packet) => {
                    if let Err(e) = write_packet(&mut io::stdout().lock(), &packet, config.output) {
                        error!("パケットの出力に失敗しました: {}", e);
                        pipeline.stop();
                        break;
                    }
                }
                None => break,
            },
        }
    }

    // 送信待ちのループを解放してから終了を待つ
    drop(rx);
    let sent = pipeline.join().await?;
    info!("{} パケットを出力しました", sent);

    Ok(())
}
