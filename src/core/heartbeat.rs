// Periodic heartbeat. The task only posts `Heartbeat` onto the trigger queue;
// the dispatcher does the actual re-evaluation, so tracker state is never
// touched from the timer.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::coordinator::CoordinatorEvent;

pub const FULL_HEARTBEAT_PERIOD: Duration = Duration::from_secs(10);
pub const STATUS_ONLY_PERIOD: Duration = Duration::from_secs(60);

pub struct HeartbeatScheduler {
    period: Duration,
    initial_delay: Duration,
    tx: mpsc::Sender<CoordinatorEvent>,
    task: Option<JoinHandle<()>>,
}

impl HeartbeatScheduler {
    pub fn new(
        period: Duration,
        initial_delay: Duration,
        tx: mpsc::Sender<CoordinatorEvent>,
    ) -> Self {
        Self {
            period,
            initial_delay,
            tx,
            task: None,
        }
    }

    /// First firing immediately, then every 10 s.
    pub fn full(tx: mpsc::Sender<CoordinatorEvent>) -> Self {
        Self::new(FULL_HEARTBEAT_PERIOD, Duration::ZERO, tx)
    }

    /// First firing one period after scheduling.
    pub fn status_only(tx: mpsc::Sender<CoordinatorEvent>) -> Self {
        Self::new(STATUS_ONLY_PERIOD, STATUS_ONLY_PERIOD, tx)
    }

    /// Starts the timer, cancelling any previous instance first.
    /// Must be called from within a tokio runtime.
    pub fn schedule(&mut self) {
        self.cancel();

        let tx = self.tx.clone();
        let period = self.period;
        let initial_delay = self.initial_delay;
        self.task = Some(tokio::spawn(async move {
            if !initial_delay.is_zero() {
                tokio::time::sleep(initial_delay).await;
            }
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if tx.send(CoordinatorEvent::Heartbeat).await.is_err() {
                    log::debug!("Trigger queue closed, heartbeat stopping");
                    break;
                }
            }
        }));
        log::debug!("Heartbeat scheduled every {:?}", period);
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            log::debug!("Heartbeat cancelled");
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
