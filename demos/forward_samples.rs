// Forward samples to another thread while recording
//
// The callback pushes every sample onto a channel. A consumer thread
// stands in for whatever processes the stream live.

use serial_acq::{AcquisitionConfig, AcquisitionEngine, Sample};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let (tx, rx) = mpsc::channel::<Sample>();

    let consumer = thread::spawn(move || {
        let mut received = 0usize;
        let mut gaps = 0usize;
        for sample in rx {
            received += 1;
            if sample.is_no_data() {
                gaps += 1;
            }
        }
        (received, gaps)
    });

    let mut engine = AcquisitionEngine::new(AcquisitionConfig::default())?;
    engine.setup()?;

    let result = engine.run_with_callback(Duration::from_secs(10), "forwarded", |sample| {
        tx.send(sample.clone())
    });
    engine.finish()?;
    result?;

    drop(tx);
    let (received, gaps) = consumer.join().map_err(|_| "consumer thread panicked")?;
    println!("Consumer received {} samples ({} without data)", received, gaps);
    Ok(())
}
