use std::{thread, time::Duration};

use slot_wheel::{TimeWheel, TimerResult};

fn main() -> TimerResult<()> {
    env_logger::init();

    let wheel = TimeWheel::<String>::new(Duration::from_secs(1), 5, "sample")?;
    wheel.start()?;

    let callback = |content: String| println!("received [{}]", content);

    for (delay, pause) in [(1000, 2), (3000, 5), (10000, 15)] {
        for i in 0..10 {
            wheel.add_task(delay, format!("instance {}ms {}", delay, i), callback)?;
        }
        println!("added 10 tasks of {}ms, slot {}", delay, wheel.current_index());
        thread::sleep(Duration::from_secs(pause));
    }

    wheel.stop();
    println!("{:?}", wheel.stats());

    Ok(())
}
