use std::env;
use std::error::Error;
use std::path::Path;
use std::thread;
use std::time::Duration;

use log::{error, info};
use paxos_bridge::config::LauncherConfig;
use paxos_bridge::network::node::{self, BridgeNode};

/// Starts one bridge plus a randomized cluster of proposers, acceptors and
/// learners, then waits for every learner to report the chosen value.
///
/// Usage: `paxos-bridge [config.json]`
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => LauncherConfig::load(Path::new(&path))?,
        None => LauncherConfig::default(),
    };

    let mut rng = rand::rng();
    let proposers = config.proposers.sample(&mut rng);
    let acceptors = config.acceptors.sample(&mut rng);
    let learners = config.learners.sample(&mut rng);
    info!(
        "launching cluster: {} proposer(s), {} acceptor(s), {} learner(s)",
        proposers, acceptors, learners
    );

    let bridge = BridgeNode::bind()?;
    let bridge_port = bridge.port();
    thread::spawn(move || {
        if let Err(e) = bridge.run() {
            error!("bridge stopped: {}", e);
        }
    });

    for _ in 0..acceptors {
        thread::spawn(move || {
            if let Err(e) = node::run_acceptor(bridge_port) {
                error!("acceptor stopped: {}", e);
            }
        });
    }

    let mut learner_handles = Vec::new();
    for _ in 0..learners {
        learner_handles.push(thread::spawn(move || node::run_learner(bridge_port)));
    }

    let settle = Duration::from_millis(config.settle_ms);
    let mut proposer_handles = Vec::new();
    for _ in 0..proposers {
        let value = config.value.clone();
        proposer_handles.push(thread::spawn(move || {
            node::run_proposer(bridge_port, value, settle)
        }));
    }

    for handle in proposer_handles {
        if let Err(e) = handle.join().expect("proposer thread panicked") {
            error!("proposer failed: {}", e);
        }
    }
    for handle in learner_handles {
        match handle.join().expect("learner thread panicked") {
            Ok(chosen) => info!("consensus: '{}' under proposal {}", chosen.value, chosen.id),
            Err(e) => error!("learner failed: {}", e),
        }
    }
    Ok(())
}
