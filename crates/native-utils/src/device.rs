use anyhow::Context;
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Finds the output device with the given name, or the host's default output.
pub fn get_or_default_output(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());

    let Some(target) = device_name else {
        return host
            .default_output_device()
            .context("No default output device");
    };

    let output_devices = host
        .output_devices()
        .context("Failed to enumerate output devices")?;
    for out_device in output_devices {
        if out_device.name().is_ok_and(|name| name == target) {
            return Ok(out_device);
        }
    }
    Err(anyhow::anyhow!("No output device named '{}'", target))
}

/// One line per output device with its default channel count and rate.
pub fn get_available_outputs() -> anyhow::Result<String> {
    for host in cpal::available_hosts() {
        tracing::debug!("Available host: {:?}", host);
    }

    let host = get_host();
    let default_device = host
        .default_output_device()
        .and_then(|device| device.name().ok());

    let mut device_names: Vec<String> = Vec::new();
    let output_devices = host
        .output_devices()
        .context("Failed to enumerate output devices")?;
    for out_device in output_devices {
        let Ok(d_name) = out_device.name() else {
            continue;
        };
        let mut d = match out_device.default_output_config() {
            Ok(d_cfg) => format!(
                " * {}({}ch, {}hz)",
                d_name,
                d_cfg.channels(),
                d_cfg.sample_rate().0
            ),
            Err(_) => format!(" * {}(no default config)", d_name),
        };
        if default_device.as_deref() == Some(d_name.as_str()) {
            d.push_str(" [default]");
        }
        device_names.push(d);
    }
    Ok(device_names.join("\n"))
}
