use candle_core::Device;

/// First available accelerator compiled in (`cuda`, then `metal`), else CPU.
/// `APP_FORCE_CPU=1` skips accelerator probing.
pub fn select_device() -> Device {
    if std::env::var("APP_FORCE_CPU").is_ok_and(|v| v == "1") { tracing::info!("device: CPU (forced)"); return Device::Cpu; }
    #[cfg(feature = "cuda")]
    {
        if let Ok(dev) = Device::new_cuda(0) { tracing::info!("device: CUDA 0"); return dev; }
    }
    #[cfg(feature = "metal")]
    {
        if let Ok(dev) = Device::new_metal(0) { tracing::info!("device: Metal"); return dev; }
    }
    tracing::info!("device: CPU");
    Device::Cpu
}
