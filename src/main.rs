use std::thread;
use std::time::Duration;

use later::{asap, deferred, schedule, soon};

const DEMO_WAIT: Duration = Duration::from_millis(400);

fn main() {
    env_logger::init();

    asap(|| println!("[asap] ran ahead of every slower tier"));
    soon(|| println!("[soon] ran on the next reactor pass"));

    let kept = schedule(150, || println!("[timer] fired after 150ms"));

    let dropped = schedule(250, || println!("[timer] this one never fires"));
    dropped.cancel();
    println!(
        "[cancel] cancelled={} completed={}",
        dropped.is_cancelled(),
        dropped.is_completed()
    );

    let mut pause = deferred(100);
    futures::executor::block_on(&mut pause);
    println!("[deferred] settled: completed={}", pause.is_completed());

    thread::sleep(DEMO_WAIT);
    println!("[timer] kept handle completed={}", kept.is_completed());
}
