use candle::Device;

use crate::error::InferenceResult;

/// Pick the compute device: CUDA when available and not explicitly disabled,
/// otherwise CPU.
pub fn select_device(force_cpu: bool) -> InferenceResult<Device> {
    if force_cpu {
        return Ok(Device::Cpu);
    }

    let device = Device::cuda_if_available(0)?;
    if !device.is_cuda() {
        tracing::info!("CUDA not available, running inference on CPU");
    }
    Ok(device)
}
