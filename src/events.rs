use std::{future::Future, time::Duration};

use tokio::sync::mpsc::Receiver;

#[derive(Debug, Clone, Copy)]
pub struct Refresh;

/// Sends `emit()` every `interval`, starting immediately. A slow consumer
/// delays the next tick instead of causing a burst.
pub fn emit_on_timer<M: 'static + Send>(interval: Duration, emit: fn() -> M) -> Receiver<M> {
    let (tx, rx) = tokio::sync::mpsc::channel(1);

    let mut interval = tokio::time::interval(interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tokio::task::spawn(async move {
        loop {
            interval.tick().await;
            if tx.send(emit()).await.is_err() {
                tracing::debug!("Refresh receiver dropped, stopping timer");
                break;
            }
        }
    });

    rx
}

/// Runs `refresh` once per message from `ticks` until `shutdown` resolves or
/// the ticks stop. `shutdown` is polled for the whole run, so it also cuts a
/// refresh short.
///
/// # Errors
/// The first error a refresh returns.
pub async fn run_until<M, E, F, Fut>(
    mut ticks: Receiver<M>,
    shutdown: impl Future<Output = ()>,
    mut refresh: F,
) -> Result<(), E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            tick = ticks.recv() => {
                if tick.is_none() {
                    return Ok(());
                }
                tokio::select! {
                    result = refresh() => result?,
                    () = &mut shutdown => break,
                }
            }
            () = &mut shutdown => break,
        }
    }

    tracing::info!("Stopping");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::{sleep, Instant};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_until_receiver_drops() {
        let mut rx = emit_on_timer(Duration::from_secs(60), || Refresh);
        let start = tokio::time::Instant::now();
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
        assert_eq!(start.elapsed(), Duration::from_secs(60));
        drop(rx);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_a_running_refresh() {
        let runs = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<(), ()> = run_until(
            emit_on_timer(Duration::from_secs(60), || Refresh),
            sleep(Duration::from_secs(5)),
            || {
                runs.fetch_add(1, Ordering::SeqCst);
                async {
                    sleep(Duration::from_secs(300)).await;
                    Ok(())
                }
            },
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_on_every_tick_until_shutdown() {
        let runs = AtomicU32::new(0);

        let result: Result<(), ()> = run_until(
            emit_on_timer(Duration::from_secs(60), || Refresh),
            sleep(Duration::from_secs(150)),
            || {
                runs.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            },
        )
        .await;

        assert!(result.is_ok());
        // Ticks at 0s, 60s and 120s.
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn refresh_errors_end_the_run() {
        let result = run_until(
            emit_on_timer(Duration::from_secs(60), || Refresh),
            std::future::pending(),
            || async { Err("refresh failed") },
        )
        .await;
        assert_eq!(result, Err("refresh failed"));
    }
}
