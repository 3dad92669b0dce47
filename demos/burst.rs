use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use rand::Rng;
use slot_wheel::{TimeWheel, TimerResult};

#[derive(Debug)]
struct Entity {
    inserted: Instant,
    delay_ms: u64,
}

fn main() -> TimerResult<()> {
    env_logger::init();

    const PRODUCERS: usize = 10;
    const TASK_COUNT: usize = 5000;
    const UNIT: u64 = 10;

    let wheel = Arc::new(TimeWheel::<Entity>::new(
        Duration::from_millis(UNIT),
        64,
        "burst",
    )?);
    wheel.start()?;

    let fired = Arc::new(AtomicUsize::new(0));
    let late_ms = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let wheel = Arc::clone(&wheel);
            let fired = Arc::clone(&fired);
            let late_ms = Arc::clone(&late_ms);
            thread::spawn(move || -> TimerResult<()> {
                let mut rng = rand::thread_rng();
                for _ in 0..TASK_COUNT {
                    let delay_ms = rng.gen_range(0..=2000);
                    let entity = Entity {
                        inserted: Instant::now(),
                        delay_ms,
                    };
                    let fired = Arc::clone(&fired);
                    let late_ms = Arc::clone(&late_ms);
                    wheel.add_task(delay_ms, entity, move |entity| {
                        let elapsed = entity.inserted.elapsed().as_millis() as u64;
                        let late = elapsed.saturating_sub(entity.delay_ms);
                        late_ms.fetch_add(late as usize, Ordering::Relaxed);
                        fired.fetch_add(1, Ordering::Relaxed);
                    })?;
                }
                Ok(())
            })
        })
        .collect();

    for (i, producer) in producers.into_iter().enumerate() {
        match producer.join() {
            Ok(result) => result?,
            Err(_) => println!("producer {} panicked", i),
        }
    }

    thread::sleep(Duration::from_millis(2000 + 3 * UNIT));
    wheel.stop();

    let fired = fired.load(Ordering::Relaxed);
    println!("fired {} of {}", fired, PRODUCERS * TASK_COUNT);
    if fired > 0 {
        println!("avg late: {}ms", late_ms.load(Ordering::Relaxed) / fired);
    }

    Ok(())
}
