//! Transient microphone access check

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

/// Open the default input device, start a stream, and drop it right away
///
/// Resolves true only if a stream could actually be started. The stream
/// never outlives this call.
pub async fn probe_default_input() -> bool {
    match tokio::task::spawn_blocking(open_and_release).await {
        Ok(granted) => granted,
        Err(e) => {
            tracing::warn!(error = %e, "microphone probe panicked");
            false
        }
    }
}

fn open_and_release() -> bool {
    let host = cpal::default_host();

    let Some(device) = host.default_input_device() else {
        tracing::debug!("no input device available");
        return false;
    };

    let config = match device.default_input_config() {
        Ok(config) => config.config(),
        Err(e) => {
            tracing::debug!(error = %e, "no usable input config");
            return false;
        }
    };

    let stream = match device.build_input_stream(
        &config,
        |_data: &[f32], _: &cpal::InputCallbackInfo| {},
        |err| {
            tracing::debug!(error = %err, "microphone probe stream error");
        },
        None,
    ) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::debug!(error = %e, "microphone access refused");
            return false;
        }
    };

    let granted = stream.play().is_ok();
    drop(stream);

    tracing::debug!(
        device = %device.name().unwrap_or_default(),
        granted,
        "microphone probed"
    );
    granted
}
