use crate::error::{CaptureError, CaptureResult};
use env_logger::{Builder, Env, Target};
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub fn setup_logger(log_file: Option<&Path>) -> CaptureResult<()> {
    // RUST_LOG が未設定ならinfo
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    // タイムスタンプ付きのフォーマット
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    // パケットは標準出力に出すので、ログはファイルか標準エラーへ
    match log_file {
        Some(path) => {
            let file = File::create(path)?;
            builder.target(Target::Pipe(Box::new(file)));
        }
        None => {
            builder.target(Target::Stderr);
        }
    }

    builder
        .try_init()
        .map_err(|e| CaptureError::Logger(e.to_string()))
}
