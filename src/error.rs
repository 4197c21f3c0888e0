use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("デバイス選択エラー: {0}")]
    DeviceSelection(String),

    #[error("ロガーのセットアップに失敗しました: {0}")]
    Logger(String),

    #[error("キャプチャエラー: {0}")]
    Pcap(#[from] pcap::Error),

    #[error("出力エラー: {0}")]
    Output(#[from] serde_json::Error),

    #[error("入出力エラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("キャプチャタスクのエラー: {0}")]
    Task(String),
}

pub type CaptureResult<T> = Result<T, CaptureError>;

// レイヤーのデコードエラー (ログに出すだけで処理は続行する)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("未対応のリンクタイプです: {0}")]
    UnsupportedLinkType(i32),

    #[error("イーサネットヘッダーが短すぎます ({0} バイト)")]
    TruncatedEthernet(usize),

    #[error("VLANタグが短すぎます ({0} バイト)")]
    TruncatedVlan(usize),

    #[error("Linux cookedヘッダーが短すぎます ({0} バイト)")]
    TruncatedLinuxSll(usize),

    #[error("ループバックヘッダーが短すぎます ({0} バイト)")]
    TruncatedLoopback(usize),

    #[error("未対応のアドレスファミリです: {0}")]
    UnknownAddressFamily(u32),

    #[error("IPv4ヘッダーのパースに失敗しました ({0} バイト)")]
    TruncatedIpv4(usize),

    #[error("IPv4ヘッダー長が不正です: {0}")]
    InvalidIpv4HeaderLength(u8),

    #[error("IPv6ヘッダーのパースに失敗しました ({0} バイト)")]
    TruncatedIpv6(usize),

    #[error("IPバージョンが不正です: {0}")]
    InvalidIpVersion(u8),

    #[error("TCPヘッダーのパースに失敗しました ({0} バイト)")]
    TruncatedTcp(usize),

    #[error("TCPデータオフセットが不正です: {0}")]
    InvalidTcpDataOffset(u8),

    #[error("UDPヘッダーのパースに失敗しました ({0} バイト)")]
    TruncatedUdp(usize),
}
