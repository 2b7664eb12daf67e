// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! The periodic probing thread of one discovery engine.
//!
//! The thread is owned here and explicitly joined on `stop()`, so tearing
//! a switch down never leaves a stray timer firing at a dead engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::debug;

use elements::physical::PhysicalNetwork;

use crate::engine::SwitchDiscovery;

pub struct DiscoveryRunner {
    engine: Arc<SwitchDiscovery>,
    net: Arc<PhysicalNetwork>,
    run: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DiscoveryRunner {
    #[must_use]
    pub fn new(engine: Arc<SwitchDiscovery>, net: Arc<PhysicalNetwork>) -> Self {
        DiscoveryRunner {
            engine,
            net,
            run: Arc::new(AtomicBool::new(true)),
            handle: None,
        }
    }

    /// Start ticking every `interval` until stopped.
    pub fn start(&mut self, interval: Duration) {
        if self.handle.is_some() {
            return;
        }
        self.run.store(true, Ordering::Relaxed);
        let run = Arc::clone(&self.run);
        let engine = Arc::clone(&self.engine);
        let net = Arc::clone(&self.net);
        let handle = thread::spawn(move || {
            while run.load(Ordering::Relaxed) {
                engine.tick(&net);
                // parked rather than slept so stop() can interrupt the wait
                thread::park_timeout(interval);
            }
        });
        self.handle = Some(handle);
    }

    /// Stop the probing thread and wait for it to exit. Returns as soon as
    /// the thread notices the flag, not after the current interval elapses.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!(
                dpid = format_args!("{:#x}", self.engine.dpid()),
                "stopping discovery runner"
            );
            self.run.store(false, Ordering::Relaxed);
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

impl Drop for DiscoveryRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use elements::channel::RecordingChannel;
    use elements::physical::PhysicalSwitch;
    use elements::port::{PhysicalPort, PortLocator};
    use net::eth::Mac;
    use pretty_assertions::assert_eq;

    fn wired_net() -> (Arc<PhysicalNetwork>, Arc<RecordingChannel>) {
        let net = Arc::new(PhysicalNetwork::new());
        let channel = Arc::new(RecordingChannel::new("dp"));
        let sw = PhysicalSwitch::new(1, Arc::clone(&channel) as _);
        sw.add_port(PhysicalPort {
            locator: PortLocator::new(1, 1),
            hw_addr: Mac([0, 0, 0, 0, 1, 1]),
            name: "eth1".to_string(),
        });
        net.add_switch(Arc::new(sw));
        (net, channel)
    }

    #[test]
    fn runner_ticks_until_stopped() {
        let (net, channel) = wired_net();
        let engine = Arc::new(SwitchDiscovery::new(1));
        engine.add_port(&net, 1);
        let before = channel.sent_count();

        let mut runner = DiscoveryRunner::new(Arc::clone(&engine), Arc::clone(&net));
        runner.start(Duration::from_millis(5));
        while channel.sent_count() == before {
            thread::sleep(Duration::from_millis(1));
        }
        runner.stop();
        let settled = channel.sent_count();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(channel.sent_count(), settled);
    }

    #[test]
    fn stop_interrupts_the_probe_wait() {
        let (net, _channel) = wired_net();
        let engine = Arc::new(SwitchDiscovery::new(1));

        let mut runner = DiscoveryRunner::new(engine, net);
        runner.start(Duration::from_secs(3600));
        thread::sleep(Duration::from_millis(50));
        let begin = Instant::now();
        runner.stop();
        assert!(
            begin.elapsed() < Duration::from_millis(500),
            "stop() waited out the probe interval: {:?}",
            begin.elapsed()
        );
    }
}
