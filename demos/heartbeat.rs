//! Instance TTL expiry: every heartbeat re-arms a check on the wheel, the
//! previous check is cancelled, and an instance that deregisters cleanly
//! cancels its pending check instead of waiting for it to expire.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use slot_wheel::{TaskHandle, TimeWheel, TimerResult};

const TTL_MS: u64 = 1500;

struct Registry {
    wheel: TimeWheel<String>,
    checks: Mutex<HashMap<String, TaskHandle>>,
}

impl Registry {
    fn heartbeat(self: &Arc<Self>, instance: &str) -> TimerResult<()> {
        let registry = Arc::clone(self);
        let handle = self
            .wheel
            .add_task(TTL_MS, instance.to_string(), move |instance| {
                registry.expire(&instance)
            })?;

        let mut checks = self.checks.lock().unwrap();
        if let Some(previous) = checks.insert(instance.to_string(), handle) {
            previous.cancel();
        }
        Ok(())
    }

    fn deregister(&self, instance: &str) {
        if let Some(check) = self.checks.lock().unwrap().remove(instance) {
            check.cancel();
            println!("{} deregistered", instance);
        }
    }

    fn expire(&self, instance: &str) {
        self.checks.lock().unwrap().remove(instance);
        println!("{} missed its heartbeat, marked unhealthy", instance);
    }
}

fn main() -> TimerResult<()> {
    env_logger::init();

    let registry = Arc::new(Registry {
        wheel: TimeWheel::new(Duration::from_millis(100), 16, "heartbeat")?,
        checks: Mutex::new(HashMap::new()),
    });
    registry.wheel.start()?;

    for instance in ["svc-a:8080", "svc-b:8080", "svc-c:8080"] {
        registry.heartbeat(instance)?;
    }

    // a keeps beating, b goes quiet, c leaves cleanly
    for _ in 0..4 {
        thread::sleep(Duration::from_millis(700));
        registry.heartbeat("svc-a:8080")?;
    }
    registry.deregister("svc-c:8080");

    thread::sleep(Duration::from_millis(2000));
    registry.wheel.stop();
    println!("{:?}", registry.wheel.stats());

    Ok(())
}
