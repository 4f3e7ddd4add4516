// Run an acquisition without hardware
//
// A simulated board prints a slow ramp. Useful to try the engine and the
// CSV output on a machine with nothing plugged in.

use serial_acq::simulated::{usb_port, ScriptedLine, SimulatedBackend};
use serial_acq::{load_recording, AcquisitionConfig, AcquisitionEngine};
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let script = (0..500u64)
        .map(|i| ScriptedLine::new(Duration::from_millis(i * 4), format!("{}\r\n", i % 1024)))
        .collect();
    let backend = SimulatedBackend::new(script)
        .with_ports(vec![usb_port("/dev/ttyACM0", "Arduino (www.arduino.cc)")]);

    let config = AcquisitionConfig::new(9600, 250, Duration::from_millis(100));
    let mut engine = AcquisitionEngine::with_backend(config, backend)?;
    engine.setup()?;
    println!("Connected to simulated board at {:?}", engine.port());

    let dest = std::env::temp_dir().join("serial_acq_simulated");
    engine.run(Duration::from_secs(1), &dest)?;
    engine.finish()?;

    let df = load_recording(serial_acq::recording::destination_path(&dest))?;
    println!("{}", df.head(Some(5)));
    println!("Captured {} samples", df.height());
    Ok(())
}
