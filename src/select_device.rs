use crate::error::{CaptureError, CaptureResult};
use pcap::Device;
use std::io::{self, BufRead, Write};

pub fn select_device() -> CaptureResult<String> {
    let devices = Device::list()?;
    if devices.is_empty() {
        return Err(CaptureError::DeviceSelection(
            "利用可能なデバイスがありません".to_string(),
        ));
    }

    eprintln!("利用可能なデバイス:");
    for (index, device) in devices.iter().enumerate() {
        match device.desc.as_deref() {
            Some(desc) => eprintln!("{}. {} ({})", index + 1, device.name, desc),
            None => eprintln!("{}. {}", index + 1, device.name),
        }
    }

    eprint!("キャプチャするデバイスの番号を入力してください: ");
    io::stderr().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;

    let names: Vec<String> = devices.into_iter().map(|device| device.name).collect();
    let selected = pick_device(&names, &input)?;
    eprintln!("選択されたデバイス: {}", selected);

    Ok(selected)
}

fn pick_device(names: &[String], input: &str) -> CaptureResult<String> {
    let device_index: usize = input
        .trim()
        .parse()
        .map_err(|_| CaptureError::DeviceSelection(format!("数値を入力してください: {:?}", input.trim())))?;

    if device_index == 0 || device_index > names.len() {
        return Err(CaptureError::DeviceSelection("無効なデバイス番号です".to_string()));
    }

    Ok(names[device_index - 1].clone())
}
