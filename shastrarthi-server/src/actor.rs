use anyhow::Result;
use shastrarthi::{
    LimitError, PeriodicStore, ProbabilisticStore, RateLimitOptions, RateLimitResult, RateLimiter,
};
use std::time::SystemTime;
use tokio::sync::{mpsc, oneshot};

/// Message types for the rate limiter actor
pub enum RateLimiterMessage {
    Check {
        key: String,
        options: RateLimitOptions,
        timestamp: SystemTime,
        response_tx: oneshot::Sender<Result<RateLimitResult>>,
    },
    TrackedKeys {
        response_tx: oneshot::Sender<usize>,
    },
}

/// Handle to communicate with the rate limiter actor
///
/// Every check goes through the actor's single task, so concurrent requests
/// for the same key are counted one at a time.
#[derive(Clone)]
pub struct RateLimiterHandle {
    tx: mpsc::Sender<RateLimiterMessage>,
}

impl RateLimiterHandle {
    /// Count a request for `key` at the current time
    pub async fn check(&self, key: String, options: RateLimitOptions) -> Result<RateLimitResult> {
        self.check_at(key, options, SystemTime::now()).await
    }

    /// Count a request for `key` at an explicit time
    pub async fn check_at(
        &self,
        key: String,
        options: RateLimitOptions,
        timestamp: SystemTime,
    ) -> Result<RateLimitResult> {
        let (response_tx, response_rx) = oneshot::channel();

        self.tx
            .send(RateLimiterMessage::Check {
                key,
                options,
                timestamp,
                response_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("Rate limiter actor has shut down"))?;

        response_rx
            .await
            .map_err(|_| anyhow::anyhow!("Rate limiter actor dropped response channel"))?
    }

    /// Number of keys currently held by the store
    pub async fn tracked_keys(&self) -> Result<usize> {
        let (response_tx, response_rx) = oneshot::channel();

        self.tx
            .send(RateLimiterMessage::TrackedKeys { response_tx })
            .await
            .map_err(|_| anyhow::anyhow!("Rate limiter actor has shut down"))?;

        response_rx
            .await
            .map_err(|_| anyhow::anyhow!("Rate limiter actor dropped response channel"))
    }
}

/// The rate limiter actor
pub struct RateLimiterActor;

impl RateLimiterActor {
    /// Spawn a new rate limiter actor with a periodic store
    pub fn spawn_periodic(buffer_size: usize, store: PeriodicStore) -> RateLimiterHandle {
        let (tx, rx) = mpsc::channel(buffer_size);

        tokio::spawn(async move {
            let store_type = StoreType::Periodic(RateLimiter::new(store));
            run_actor(rx, store_type).await;
        });

        RateLimiterHandle { tx }
    }

    /// Spawn a new rate limiter actor with a probabilistic store
    pub fn spawn_probabilistic(buffer_size: usize, store: ProbabilisticStore) -> RateLimiterHandle {
        let (tx, rx) = mpsc::channel(buffer_size);

        tokio::spawn(async move {
            let store_type = StoreType::Probabilistic(RateLimiter::new(store));
            run_actor(rx, store_type).await;
        });

        RateLimiterHandle { tx }
    }
}

/// Internal enum to handle different store types
enum StoreType {
    Periodic(RateLimiter<PeriodicStore>),
    Probabilistic(RateLimiter<ProbabilisticStore>),
}

impl StoreType {
    fn check(
        &mut self,
        key: &str,
        options: &RateLimitOptions,
        timestamp: SystemTime,
    ) -> Result<RateLimitResult, LimitError> {
        match self {
            StoreType::Periodic(limiter) => limiter.check(key, options, timestamp),
            StoreType::Probabilistic(limiter) => limiter.check(key, options, timestamp),
        }
    }

    fn tracked_keys(&self) -> usize {
        match self {
            StoreType::Periodic(limiter) => limiter.tracked_keys(),
            StoreType::Probabilistic(limiter) => limiter.tracked_keys(),
        }
    }
}

async fn run_actor(mut rx: mpsc::Receiver<RateLimiterMessage>, mut store_type: StoreType) {
    while let Some(msg) = rx.recv().await {
        match msg {
            RateLimiterMessage::Check {
                key,
                options,
                timestamp,
                response_tx,
            } => {
                let response = store_type
                    .check(&key, &options, timestamp)
                    .map_err(|e| anyhow::anyhow!("Rate limit check failed: {}", e));
                // Ignore send errors - receiver may have gone away
                let _ = response_tx.send(response);
            }
            RateLimiterMessage::TrackedKeys { response_tx } => {
                let _ = response_tx.send(store_type.tracked_keys());
            }
        }
    }

    tracing::info!("Rate limiter actor shutting down");
}
