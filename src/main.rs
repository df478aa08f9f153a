#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use std::path::Path;

    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use kiosk::boards::esp32::{self, Esp32Board, EspUploader};
    use kiosk::{KioskConfig, ModeController};

    const STORAGE_ROOT: &str = "/storage";

    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    let peripherals = esp_idf_svc::hal::prelude::Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = esp_idf_svc::nvs::EspDefaultNvsPartition::take()
        .map_err(|e| log::error!("Failed to take NVS partition: {:?}", e))
        .ok();

    // 存储不可用时队列视为空，门户仍然可以运行
    if let Err(e) = esp32::mount_storage(c"/storage", c"storage") {
        log::error!("Failed to mount storage: {:?}", e);
    }

    let config = KioskConfig::load(Path::new(STORAGE_ROOT));
    log::info!("AP SSID: {:?}", config.ap.ssid);
    log::info!("Uplink SSID: {:?}", config.uplink.ssid);
    log::info!("Sync URL: {}", config.endpoint.url());
    log::info!("Wipe policy: {:?}", config.sync.wipe_policy);

    let board = Esp32Board::new(
        peripherals.modem,
        peripherals.pins.gpio0.into(),
        sysloop,
        nvs,
        &config.ap,
    )?;

    let mut controller = ModeController::new(board, EspUploader::new(), config);
    if let Err(e) = controller.run() {
        log::error!("Kiosk failed: {:?}", e);
        std::thread::sleep(std::time::Duration::from_secs(2));
    }

    unsafe { esp_idf_svc::sys::esp_restart() }
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    anyhow::bail!("kiosk firmware only runs on ESP-IDF targets")
}
